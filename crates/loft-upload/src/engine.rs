//! Per-connection upload state machine
//!
//! One engine drives one connection's logical uploads: `Idle → Initializing →
//! Receiving → Finalizing → Closed`, with `Errored` absorbing protocol and
//! storage failures. Chunk frames carry no session id; they bind to the
//! connection's single active session, so a connection carries at most one
//! upload at a time. Multiplexed uploads over one connection are not
//! supported.
//!
//! Chunks are buffered in memory and written to disk exactly once, at
//! finalize. A disconnect mid-upload leaves the session orphaned in the
//! store; the periodic eviction sweep reclaims it.

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use loft_core::models::FileKind;
use loft_core::{FinalizedUpload, UploadLifecycle};
use loft_storage::{UrlPolicy, VolumeSelector};
use uuid::Uuid;

use crate::checksum;
use crate::protocol::{parse_chunk_frame, ClientEvent, ServerReply};
use crate::session::{SessionError, SessionStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Initializing,
    Receiving,
    Finalizing,
    Closed,
    Errored,
}

pub struct UploadEngine {
    sessions: Arc<SessionStore>,
    selector: VolumeSelector,
    url_policy: UrlPolicy,
    base_url: String,
    lifecycle: Arc<dyn UploadLifecycle>,
    /// Owner of the connection, when the transport layer authenticated one.
    owner_id: Option<Uuid>,
    state: EngineState,
    active_session: Option<Uuid>,
}

impl UploadEngine {
    pub fn new(
        sessions: Arc<SessionStore>,
        selector: VolumeSelector,
        url_policy: UrlPolicy,
        base_url: String,
        lifecycle: Arc<dyn UploadLifecycle>,
        owner_id: Option<Uuid>,
    ) -> Self {
        Self {
            sessions,
            selector,
            url_policy,
            base_url,
            lifecycle,
            owner_id,
            state: EngineState::Idle,
            active_session: None,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Handle a JSON control message.
    pub async fn handle_message(&mut self, text: &str) -> ServerReply {
        match ClientEvent::parse(text) {
            Ok(ClientEvent::InitializeFileName { filename }) => self.initialize(filename),
            Ok(ClientEvent::FinishedUpload { session_id }) => self.finish(session_id).await,
            Err(err) => self.fail(err.to_string()),
        }
    }

    /// Handle a binary chunk frame.
    pub async fn handle_frame(&mut self, frame: Bytes) -> ServerReply {
        if !matches!(self.state, EngineState::Initializing | EngineState::Receiving) {
            return ServerReply::chunk_error("no_active_session", "no upload in progress");
        }

        let (declared, payload) = match parse_chunk_frame(&frame) {
            Ok(parsed) => parsed,
            Err(err) => return self.fail(err.to_string()),
        };

        if !checksum::validate(&payload, declared) {
            tracing::warn!(declared, size_bytes = payload.len(), "Chunk checksum mismatch, requesting retry");
            return ServerReply::checksum_mismatch();
        }

        let Some(session_id) = self.active_session else {
            return ServerReply::chunk_error("no_active_session", "no upload in progress");
        };

        match self.sessions.append_chunk(session_id, payload) {
            Ok(outcome) => {
                self.state = EngineState::Receiving;
                tracing::debug!(
                    session_id = %session_id,
                    chunks_received = outcome.chunks_received,
                    total_size = outcome.total_size,
                    "Chunk appended to session"
                );
                ServerReply::chunk_received(session_id, outcome.chunks_received)
            }
            Err(SessionError::NotFound) => {
                // Evicted out from under us; the upload must restart.
                self.active_session = None;
                self.state = EngineState::Errored;
                ServerReply::chunk_error("no_active_session", "upload session expired")
            }
            Err(SessionError::TooLarge) => {
                self.sessions.remove(session_id);
                self.active_session = None;
                self.state = EngineState::Errored;
                tracing::warn!(session_id = %session_id, "Upload exceeded the session size limit");
                ServerReply::chunk_error("session_too_large", "upload exceeds the configured size limit")
            }
        }
    }

    fn initialize(&mut self, filename: String) -> ServerReply {
        match self.state {
            EngineState::Idle | EngineState::Closed | EngineState::Errored => {}
            EngineState::Initializing | EngineState::Receiving | EngineState::Finalizing => {
                return self.fail("initialize received while an upload is in progress");
            }
        }

        let handle = self.sessions.create(&filename);
        self.active_session = Some(handle.session_id);
        self.state = EngineState::Initializing;

        tracing::info!(
            filename = %filename,
            session_id = %handle.session_id,
            file_id = %handle.file_id,
            "Initializing file upload"
        );

        ServerReply::initialized(handle.session_id, handle.file_id)
    }

    async fn finish(&mut self, session_id: Uuid) -> ServerReply {
        let Some(session) = self.sessions.remove(session_id) else {
            tracing::warn!(session_id = %session_id, "Finish for unknown upload session");
            return ServerReply::finish_error("session_not_found", "session_not_found");
        };

        self.state = EngineState::Finalizing;
        if self.active_session == Some(session_id) {
            self.active_session = None;
        }

        let assembled = session.assemble();
        let total_size = session.total_size();
        tracing::info!(
            session_id = %session_id,
            filename = %session.filename,
            size_bytes = assembled.len(),
            chunks = session.chunks_received(),
            "Assembled complete file"
        );

        let volume = match self.selector.select_volume().await {
            Ok(volume) => volume,
            Err(err) => {
                tracing::error!(error = %err, "Volume selection failed");
                self.state = EngineState::Errored;
                return ServerReply::finish_error("storage_io", "save_failed");
            }
        };

        let stored_name = stored_filename(session.file_id, &session.filename);
        let path = match volume.write_file(&stored_name, &assembled).await {
            Ok(path) => path,
            Err(err) => {
                tracing::error!(error = %err, volume = %volume.name(), "Failed to persist assembled file");
                self.state = EngineState::Errored;
                return ServerReply::finish_error("storage_io", "save_failed");
            }
        };

        let url = self
            .url_policy
            .file_url(&self.base_url, volume.name(), &stored_name, session.file_id);

        let finalized = FinalizedUpload {
            file_id: session.file_id,
            owner_id: self.owner_id,
            filename: session.filename.clone(),
            kind: FileKind::from_filename(&session.filename),
            volume: volume.name().to_string(),
            path,
            url: url.clone(),
            size_bytes: total_size,
        };

        if let Err(err) = self.lifecycle.upload_finalized(&finalized).await {
            tracing::error!(error = %err, file_id = %finalized.file_id, "Upload lifecycle hook failed");
            self.state = EngineState::Errored;
            return ServerReply::finish_error("registration_failed", "save_failed");
        }

        self.state = EngineState::Closed;
        tracing::info!(
            file_id = %finalized.file_id,
            url = %url,
            total_size = finalized.size_bytes,
            "Upload completed"
        );

        ServerReply::completed(session.filename, url, total_size)
    }

    /// Protocol failure: the logical upload terminates and its session is
    /// removed; the client must restart from initialize.
    fn fail(&mut self, message: impl Into<String>) -> ServerReply {
        let message = message.into();
        tracing::warn!(message = %message, "Upload protocol error");
        if let Some(session_id) = self.active_session.take() {
            self.sessions.remove(session_id);
        }
        self.state = EngineState::Errored;
        ServerReply::protocol_error(message)
    }
}

/// Finalized files are named by file id plus the declared filename's
/// extension.
fn stored_filename(file_id: Uuid, declared_filename: &str) -> String {
    match Path::new(declared_filename).extension() {
        Some(ext) => format!("{}.{}", file_id, ext.to_string_lossy()),
        None => file_id.to_string(),
    }
}
