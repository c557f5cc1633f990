//! Ownership-checked file delivery
//!
//! In production, file URLs point here instead of at the static file tree:
//! the caller must own the record, and the file is located by scanning the
//! configured volumes for the id-derived filename.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use crate::state::AppState;

pub async fn secure_file(
    Path(file_id): Path<Uuid>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    // Outside production the static file tree is exposed directly and this
    // endpoint stays dark.
    if !state.config.is_production() {
        return StatusCode::NOT_FOUND.into_response();
    }

    let Some(files) = &state.files else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let Some(owner_id) = headers
        .get("x-user-id")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| Uuid::parse_str(value).ok())
    else {
        return StatusCode::UNAUTHORIZED.into_response();
    };

    let record = match files.get_file(owner_id, file_id).await {
        Ok(Some(record)) => record,
        Ok(None) => return StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            tracing::error!(error = %err, file_id = %file_id, "Secure file lookup failed");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let stored = match std::path::Path::new(&record.name).extension() {
        Some(ext) => format!("{}.{}", file_id, ext.to_string_lossy()),
        None => file_id.to_string(),
    };

    for volume in state.selector.volume_set().volumes() {
        let path = volume.path().join(&stored);
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                return (
                    [(header::CONTENT_TYPE, "application/octet-stream")],
                    bytes,
                )
                    .into_response();
            }
            Err(_) => continue,
        }
    }

    tracing::warn!(file_id = %file_id, "File record exists but no volume holds its bytes");
    StatusCode::NOT_FOUND.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;
    use async_trait::async_trait;
    use axum::http::HeaderValue;
    use chrono::Utc;
    use loft_core::models::{FileKind, FileRecord};
    use loft_core::AppError;
    use loft_db::MetadataStore;
    use loft_services::FileService;
    use tempfile::TempDir;

    /// Store holding exactly one record; mutations are never reached here.
    struct OneFileStore {
        record: FileRecord,
    }

    #[async_trait]
    impl MetadataStore for OneFileStore {
        async fn insert_file(&self, _record: &FileRecord) -> Result<(), AppError> {
            Err(AppError::Internal("not used in this test".to_string()))
        }

        async fn get_file(
            &self,
            owner_id: Uuid,
            id: Uuid,
        ) -> Result<Option<FileRecord>, AppError> {
            Ok((self.record.owner_id == owner_id && self.record.id == id)
                .then(|| self.record.clone()))
        }

        async fn list_files(
            &self,
            _owner_id: Uuid,
            _parent_directory_id: Option<Uuid>,
            _page: u32,
            _page_size: u32,
        ) -> Result<Vec<FileRecord>, AppError> {
            Err(AppError::Internal("not used in this test".to_string()))
        }

        async fn rename_file(
            &self,
            _owner_id: Uuid,
            _id: Uuid,
            _name: &str,
        ) -> Result<FileRecord, AppError> {
            Err(AppError::Internal("not used in this test".to_string()))
        }

        async fn move_files(
            &self,
            _owner_id: Uuid,
            _ids: &[Uuid],
            _parent_directory_id: Option<Uuid>,
        ) -> Result<Vec<FileRecord>, AppError> {
            Err(AppError::Internal("not used in this test".to_string()))
        }

        async fn delete_files(&self, _owner_id: Uuid, _ids: &[Uuid]) -> Result<(), AppError> {
            Err(AppError::Internal("not used in this test".to_string()))
        }
    }

    fn record(owner_id: Uuid, file_id: Uuid) -> FileRecord {
        let now = Utc::now();
        FileRecord {
            id: file_id,
            owner_id,
            parent_directory_id: None,
            kind: FileKind::Pdf,
            url: None,
            name: "report.pdf".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    fn user_header(owner_id: Uuid) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-user-id", HeaderValue::from_str(&owner_id.to_string()).unwrap());
        headers
    }

    fn service_with(record: FileRecord) -> Arc<FileService> {
        Arc::new(FileService::new(Arc::new(OneFileStore { record })))
    }

    #[tokio::test]
    async fn dark_outside_production() {
        let dir = TempDir::new().unwrap();
        let owner = Uuid::now_v7();
        let file_id = Uuid::now_v7();
        let files = service_with(record(owner, file_id));
        let state = test_support::state_with("development", Some(files), &dir).await;

        let response = secure_file(Path(file_id), user_header(owner), State(state)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unauthenticated_requests_are_rejected() {
        let dir = TempDir::new().unwrap();
        let owner = Uuid::now_v7();
        let file_id = Uuid::now_v7();
        let files = service_with(record(owner, file_id));
        let state = test_support::state_with("production", Some(files), &dir).await;

        let response = secure_file(Path(file_id), HeaderMap::new(), State(state)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn serves_owned_files_from_whichever_volume_holds_them() {
        let dir = TempDir::new().unwrap();
        let owner = Uuid::now_v7();
        let file_id = Uuid::now_v7();
        let files = service_with(record(owner, file_id));
        let state = test_support::state_with("production", Some(files), &dir).await;

        // The bytes live on the second volume.
        std::fs::write(
            dir.path().join("2").join(format!("{}.pdf", file_id)),
            b"pdf bytes",
        )
        .unwrap();

        let response = secure_file(Path(file_id), user_header(owner), State(state)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"pdf bytes");
    }

    #[tokio::test]
    async fn other_owners_cannot_reach_the_file() {
        let dir = TempDir::new().unwrap();
        let owner = Uuid::now_v7();
        let file_id = Uuid::now_v7();
        let files = service_with(record(owner, file_id));
        let state = test_support::state_with("production", Some(files), &dir).await;

        let response = secure_file(Path(file_id), user_header(Uuid::now_v7()), State(state)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn record_without_bytes_is_not_found() {
        let dir = TempDir::new().unwrap();
        let owner = Uuid::now_v7();
        let file_id = Uuid::now_v7();
        let files = service_with(record(owner, file_id));
        let state = test_support::state_with("production", Some(files), &dir).await;

        let response = secure_file(Path(file_id), user_header(owner), State(state)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

