//! Chunked upload protocol
//!
//! One logical upload travels over a single bidirectional connection as an
//! initialize event, a sequence of checksum-prefixed binary chunk frames, and
//! a finish event. Chunks are buffered in memory until finish, which
//! assembles them, places the file on the least-utilized storage volume, and
//! hands the result to the configured [`loft_core::UploadLifecycle`].

pub mod checksum;
pub mod engine;
pub mod protocol;
pub mod session;

pub use engine::{EngineState, UploadEngine};
pub use protocol::{ClientEvent, ProtocolError, ServerReply};
pub use session::{SessionError, SessionLimits, SessionStore, UploadSession};
