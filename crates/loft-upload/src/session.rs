//! In-flight upload sessions
//!
//! The store is shared process-wide: sessions from different connections
//! coexist in one registry. DashMap gives per-key exclusion without blocking
//! access to other session ids. Sessions the owning connection abandons are
//! reclaimed by a periodic [`SessionStore::evict_stale`] sweep, and a
//! per-session byte ceiling bounds memory held for any single upload.

use std::time::{Duration, Instant};

use bytes::Bytes;
use dashmap::DashMap;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("upload session not found")]
    NotFound,
    #[error("upload session exceeds the configured size limit")]
    TooLarge,
}

#[derive(Debug, Clone, Copy)]
pub struct SessionLimits {
    /// Sessions older than this are evicted by the sweep.
    pub max_age: Duration,
    /// Ceiling on buffered bytes for one session.
    pub max_session_bytes: u64,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(3600),
            max_session_bytes: 1024 * 1024 * 1024,
        }
    }
}

/// Server-side state for one file's in-progress chunked transfer.
#[derive(Debug)]
pub struct UploadSession {
    pub session_id: Uuid,
    pub file_id: Uuid,
    /// Declared original filename; only its extension is used.
    pub filename: String,
    chunks: Vec<Bytes>,
    total_size: u64,
    active: bool,
    created_at: Instant,
}

impl UploadSession {
    pub fn chunks_received(&self) -> usize {
        self.chunks.len()
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Concatenate the buffered chunks in arrival order.
    pub fn assemble(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.total_size as usize);
        for chunk in &self.chunks {
            out.extend_from_slice(chunk);
        }
        out
    }
}

/// Identifiers handed back from [`SessionStore::create`].
#[derive(Debug, Clone, Copy)]
pub struct SessionHandle {
    pub session_id: Uuid,
    pub file_id: Uuid,
}

/// Outcome of a successful chunk append.
#[derive(Debug, Clone, Copy)]
pub struct AppendOutcome {
    pub chunks_received: usize,
    pub total_size: u64,
}

/// Process-wide registry of in-flight uploads.
pub struct SessionStore {
    sessions: DashMap<Uuid, UploadSession>,
    limits: SessionLimits,
}

impl SessionStore {
    pub fn new(limits: SessionLimits) -> Self {
        Self {
            sessions: DashMap::new(),
            limits,
        }
    }

    /// Register a new session for `filename` and allocate its file id.
    /// Both ids are time-ordered, so sessions sort by creation.
    pub fn create(&self, filename: &str) -> SessionHandle {
        let handle = SessionHandle {
            session_id: Uuid::now_v7(),
            file_id: Uuid::now_v7(),
        };

        self.sessions.insert(
            handle.session_id,
            UploadSession {
                session_id: handle.session_id,
                file_id: handle.file_id,
                filename: filename.to_string(),
                chunks: Vec::new(),
                total_size: 0,
                active: true,
                created_at: Instant::now(),
            },
        );

        handle
    }

    /// Append a verified chunk to a session's buffer.
    pub fn append_chunk(&self, session_id: Uuid, chunk: Bytes) -> Result<AppendOutcome, SessionError> {
        let mut session = self
            .sessions
            .get_mut(&session_id)
            .ok_or(SessionError::NotFound)?;

        let new_total = session.total_size + chunk.len() as u64;
        if new_total > self.limits.max_session_bytes {
            return Err(SessionError::TooLarge);
        }

        session.total_size = new_total;
        session.chunks.push(chunk);

        Ok(AppendOutcome {
            chunks_received: session.chunks.len(),
            total_size: session.total_size,
        })
    }

    /// Read a session in place without removing it.
    pub fn with_session<R>(
        &self,
        session_id: Uuid,
        f: impl FnOnce(&UploadSession) -> R,
    ) -> Option<R> {
        self.sessions.get(&session_id).map(|session| f(&session))
    }

    /// Remove a session from the registry, marking it inactive.
    pub fn remove(&self, session_id: Uuid) -> Option<UploadSession> {
        self.sessions.remove(&session_id).map(|(_, mut session)| {
            session.active = false;
            session
        })
    }

    /// Drop sessions older than the configured maximum age. Returns how many
    /// were evicted.
    pub fn evict_stale(&self) -> usize {
        let before = self.sessions.len();
        let max_age = self.limits.max_age;
        self.sessions.retain(|_, session| session.created_at.elapsed() <= max_age);
        let evicted = before - self.sessions.len();

        if evicted > 0 {
            tracing::info!(evicted, remaining = self.sessions.len(), "Evicted stale upload sessions");
        }

        evicted
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SessionStore {
        SessionStore::new(SessionLimits::default())
    }

    #[test]
    fn create_append_remove_round_trip() {
        let store = store();
        let handle = store.create("report.pdf");

        let first = store
            .append_chunk(handle.session_id, Bytes::from_static(b"abc"))
            .unwrap();
        assert_eq!(first.chunks_received, 1);
        assert_eq!(first.total_size, 3);

        let second = store
            .append_chunk(handle.session_id, Bytes::from_static(b"de"))
            .unwrap();
        assert_eq!(second.chunks_received, 2);
        assert_eq!(second.total_size, 5);

        let (filename, active) = store
            .with_session(handle.session_id, |s| (s.filename.clone(), s.is_active()))
            .unwrap();
        assert_eq!(filename, "report.pdf");
        assert!(active);

        let session = store.remove(handle.session_id).unwrap();
        assert!(!session.is_active());
        assert_eq!(session.assemble(), b"abcde");
        assert!(store.is_empty());
    }

    #[test]
    fn append_to_unknown_session_is_not_found() {
        let store = store();
        let result = store.append_chunk(Uuid::now_v7(), Bytes::from_static(b"x"));
        assert_eq!(result.unwrap_err(), SessionError::NotFound);
    }

    #[test]
    fn size_limit_rejects_the_overflowing_chunk() {
        let store = SessionStore::new(SessionLimits {
            max_session_bytes: 4,
            ..Default::default()
        });
        let handle = store.create("big.bin");

        store
            .append_chunk(handle.session_id, Bytes::from_static(b"abcd"))
            .unwrap();
        let result = store.append_chunk(handle.session_id, Bytes::from_static(b"e"));
        assert_eq!(result.unwrap_err(), SessionError::TooLarge);

        // The session itself is untouched; termination is the engine's call.
        let session = store.remove(handle.session_id).unwrap();
        assert_eq!(session.total_size(), 4);
    }

    #[test]
    fn evict_stale_reclaims_abandoned_sessions() {
        let store = SessionStore::new(SessionLimits {
            max_age: Duration::from_secs(0),
            ..Default::default()
        });
        store.create("a.bin");
        store.create("b.bin");

        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(store.evict_stale(), 2);
        assert!(store.is_empty());
    }

    #[test]
    fn eviction_spares_recent_sessions() {
        let store = store();
        let handle = store.create("keep.bin");

        assert_eq!(store.evict_stale(), 0);
        assert!(store.remove(handle.session_id).is_some());
    }
}
