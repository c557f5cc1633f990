//! Post-processing
//!
//! After a successful upload of a recognized media file, a background
//! transcode compresses it onto a freshly selected volume and deletes the
//! original. The work is fire-and-forget: it never touches the upload's
//! already-surfaced success, and a failure is logged and dropped.

pub mod dispatcher;
pub mod media;
pub mod transcode;

pub use dispatcher::{TranscodeDispatcher, TranscodeJob};
pub use transcode::{FfmpegTranscoder, Transcode, TranscodeError};
