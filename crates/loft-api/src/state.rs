//! Application state shared across connections.

use std::sync::Arc;

use loft_core::{Config, UploadLifecycle};
use loft_services::FileService;
use loft_storage::{UrlPolicy, VolumeSelector};
use loft_upload::SessionStore;

pub struct AppState {
    pub config: Config,
    /// Process-wide registry of in-flight uploads, shared by all connections.
    pub sessions: Arc<SessionStore>,
    pub selector: VolumeSelector,
    pub url_policy: UrlPolicy,
    pub lifecycle: Arc<dyn UploadLifecycle>,
    /// Absent when no metadata store is configured.
    pub files: Option<Arc<FileService>>,
}
