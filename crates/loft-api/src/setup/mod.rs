//! Application setup and initialization
//!
//! All wiring lives here so main.rs stays a thin entry point.

pub mod routes;
pub mod server;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use loft_core::Config;
use loft_db::PgMetadataStore;
use loft_processing::{FfmpegTranscoder, TranscodeDispatcher};
use loft_services::FileService;
use loft_storage::{UrlPolicy, VolumeSelector, VolumeSet};
use loft_upload::{SessionLimits, SessionStore};
use sqlx::postgres::PgPoolOptions;

use crate::lifecycle::ApiUploadLifecycle;
use crate::state::AppState;

const DB_MAX_CONNECTIONS: u32 = 20;
const DB_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    let volumes = VolumeSet::open(&config.volumes)
        .await
        .context("Failed to open storage volumes")?;
    let selector = VolumeSelector::new(Arc::new(volumes));

    let sessions = Arc::new(SessionStore::new(SessionLimits {
        max_age: Duration::from_secs(config.max_session_age_secs),
        max_session_bytes: config.max_session_bytes,
    }));
    spawn_session_sweeper(sessions.clone());

    let files = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(DB_MAX_CONNECTIONS)
                .acquire_timeout(DB_CONNECT_TIMEOUT)
                .connect(url)
                .await
                .context("Failed to connect to the metadata database")?;
            Some(Arc::new(FileService::new(Arc::new(PgMetadataStore::new(
                pool,
            )))))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, uploads will not be registered in the metadata store");
            None
        }
    };

    let transcoder = Arc::new(FfmpegTranscoder::new(config.ffmpeg_path.clone()));
    let dispatcher = Arc::new(TranscodeDispatcher::new(
        transcoder,
        selector.clone(),
        config.max_concurrent_transcodes,
        config.job_queue_size,
    ));

    let lifecycle = Arc::new(ApiUploadLifecycle::new(files.clone(), dispatcher));

    let state = Arc::new(AppState {
        url_policy: UrlPolicy::from_environment(&config.environment),
        config,
        sessions,
        selector,
        lifecycle,
        files,
    });

    let router = routes::build_router(state.clone());

    Ok((state, router))
}

/// Reclaim sessions whose connection went away without finishing.
fn spawn_session_sweeper(sessions: Arc<SessionStore>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            sessions.evict_stale();
        }
    });
}
