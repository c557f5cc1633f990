//! Wire messages
//!
//! Control events travel as JSON text envelopes (`{"event": ..., "data":
//! ...}`); chunk payloads travel as binary frames whose first 8 bytes are the
//! big-endian checksum of the remainder. Replies reuse the envelope of the
//! event that triggered them, with a `status` discriminating success from
//! error so nothing escapes to the client unstructured.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Bytes reserved at the front of a chunk frame for the checksum.
pub const CHUNK_PREFIX_LEN: usize = 8;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    MalformedMessage(String),
    #[error("malformed chunk frame: {0}")]
    MalformedFrame(String),
}

/// Control events a client can send.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    InitializeFileName { filename: String },
    FinishedUpload { session_id: Uuid },
}

impl ClientEvent {
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(|e| ProtocolError::MalformedMessage(e.to_string()))
    }
}

/// Split a binary chunk frame into its declared checksum and payload.
///
/// The wire reserves 8 bytes for the checksum; CRC32 cannot exceed
/// `u32::MAX`, so larger declared values are malformed rather than merely
/// mismatched.
pub fn parse_chunk_frame(frame: &Bytes) -> Result<(u32, Bytes), ProtocolError> {
    if frame.len() < CHUNK_PREFIX_LEN {
        return Err(ProtocolError::MalformedFrame(format!(
            "frame of {} bytes is shorter than the {}-byte checksum prefix",
            frame.len(),
            CHUNK_PREFIX_LEN
        )));
    }

    let mut prefix = [0u8; CHUNK_PREFIX_LEN];
    prefix.copy_from_slice(&frame[..CHUNK_PREFIX_LEN]);
    let declared = u64::from_be_bytes(prefix);

    let declared = u32::try_from(declared).map_err(|_| {
        ProtocolError::MalformedFrame(format!("declared checksum {} exceeds u32 range", declared))
    })?;

    Ok((declared, frame.slice(CHUNK_PREFIX_LEN..)))
}

/// Build a chunk frame for a payload. The server never sends these; clients
/// and tests do.
pub fn encode_chunk_frame(checksum: u32, payload: &[u8]) -> Bytes {
    let mut frame = Vec::with_capacity(CHUNK_PREFIX_LEN + payload.len());
    frame.extend_from_slice(&(checksum as u64).to_be_bytes());
    frame.extend_from_slice(payload);
    Bytes::from(frame)
}

/// Payload common to every reply envelope; irrelevant fields are omitted
/// from the wire.
#[derive(Debug, Clone, Serialize, PartialEq, Default)]
pub struct ReplyData {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunks_received: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_required: Option<bool>,
}

/// Replies the server emits, enveloped under the triggering event.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerReply {
    InitializeFileName(ReplyData),
    UploadFileChunk(ReplyData),
    FinishedUpload(ReplyData),
    ProtocolError(ReplyData),
}

impl ServerReply {
    pub fn initialized(session_id: Uuid, file_id: Uuid) -> Self {
        ServerReply::InitializeFileName(ReplyData {
            status: "initialized",
            session_id: Some(session_id),
            file_id: Some(file_id),
            ..Default::default()
        })
    }

    pub fn chunk_received(session_id: Uuid, chunks_received: usize) -> Self {
        ServerReply::UploadFileChunk(ReplyData {
            status: "success",
            session_id: Some(session_id),
            chunks_received: Some(chunks_received),
            ..Default::default()
        })
    }

    pub fn checksum_mismatch() -> Self {
        ServerReply::UploadFileChunk(ReplyData {
            status: "error",
            error_type: Some("checksum_mismatch"),
            message: Some("checksum does not match, please retry the chunk".to_string()),
            retry_required: Some(true),
            ..Default::default()
        })
    }

    pub fn chunk_error(error_type: &'static str, message: impl Into<String>) -> Self {
        ServerReply::UploadFileChunk(ReplyData {
            status: "error",
            error_type: Some(error_type),
            message: Some(message.into()),
            ..Default::default()
        })
    }

    pub fn completed(filename: String, file_path: String, total_size: u64) -> Self {
        ServerReply::FinishedUpload(ReplyData {
            status: "completed",
            filename: Some(filename),
            file_path: Some(file_path),
            total_size: Some(total_size),
            ..Default::default()
        })
    }

    pub fn finish_error(error_type: &'static str, message: impl Into<String>) -> Self {
        ServerReply::FinishedUpload(ReplyData {
            status: "error",
            error_type: Some(error_type),
            message: Some(message.into()),
            ..Default::default()
        })
    }

    pub fn protocol_error(message: impl Into<String>) -> Self {
        ServerReply::ProtocolError(ReplyData {
            status: "error",
            error_type: Some("protocol_error"),
            message: Some(message.into()),
            ..Default::default()
        })
    }

    pub fn data(&self) -> &ReplyData {
        match self {
            ServerReply::InitializeFileName(data)
            | ServerReply::UploadFileChunk(data)
            | ServerReply::FinishedUpload(data)
            | ServerReply::ProtocolError(data) => data,
        }
    }

    pub fn to_json(&self) -> String {
        // ReplyData serialization cannot fail.
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}
