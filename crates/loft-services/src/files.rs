use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use loft_cache::QueryCache;
use loft_core::models::{FilePage, FileRecord};
use loft_core::AppError;
use loft_db::MetadataStore;
use uuid::Uuid;

/// How long cached listings and records stay valid when the owner's file set
/// is not mutated.
const FILE_CACHE_TTL: Duration = Duration::from_secs(60);

pub struct FileService {
    store: Arc<dyn MetadataStore>,
    list_cache: QueryCache<FilePage>,
    record_cache: QueryCache<Option<FileRecord>>,
}

impl FileService {
    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        Self {
            store,
            list_cache: QueryCache::new(),
            record_cache: QueryCache::new(),
        }
    }

    pub async fn list_files(
        &self,
        owner_id: Uuid,
        parent_directory_id: Option<Uuid>,
        page: u32,
        page_size: u32,
    ) -> Result<FilePage, AppError> {
        let key = list_key(owner_id, parent_directory_id, page, page_size);
        self.list_cache
            .get_or_compute(&key, FILE_CACHE_TTL, || async {
                let files = self
                    .store
                    .list_files(owner_id, parent_directory_id, page, page_size)
                    .await?;
                Ok(FilePage {
                    files,
                    page,
                    page_size,
                })
            })
            .await
    }

    pub async fn get_file(
        &self,
        owner_id: Uuid,
        id: Uuid,
    ) -> Result<Option<FileRecord>, AppError> {
        let key = format!("files:{}:file:{}", owner_id, id);
        self.record_cache
            .get_or_compute(&key, FILE_CACHE_TTL, || self.store.get_file(owner_id, id))
            .await
    }

    /// Register a finalized upload's record.
    #[tracing::instrument(skip(self, record), fields(file_id = %record.id, owner_id = %record.owner_id))]
    pub async fn register_uploaded_file(&self, record: FileRecord) -> Result<(), AppError> {
        let owner_id = record.owner_id;
        self.store.insert_file(&record).await?;
        self.invalidate_owner(owner_id);
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(file_id = %id, owner_id = %owner_id))]
    pub async fn rename_file(
        &self,
        owner_id: Uuid,
        id: Uuid,
        new_name: &str,
    ) -> Result<FileRecord, AppError> {
        if new_name.trim().is_empty() {
            return Err(AppError::InvalidInput("file name must not be empty".to_string()));
        }

        let renamed = self.store.rename_file(owner_id, id, new_name).await?;
        self.invalidate_owner(owner_id);
        Ok(renamed)
    }

    /// Move files into another directory. Each id is validated in parallel;
    /// the updates apply as one atomic batch only after every validation
    /// passed.
    #[tracing::instrument(skip(self, ids), fields(owner_id = %owner_id, batch_size = ids.len()))]
    pub async fn move_files(
        &self,
        owner_id: Uuid,
        ids: &[Uuid],
        parent_directory_id: Option<Uuid>,
    ) -> Result<Vec<FileRecord>, AppError> {
        self.validate_batch(owner_id, ids, |file| {
            if file.parent_directory_id == parent_directory_id {
                Err(AppError::InvalidInput(format!(
                    "file {} is already in the target directory",
                    file.id
                )))
            } else {
                Ok(())
            }
        })
        .await?;

        let moved = self
            .store
            .move_files(owner_id, ids, parent_directory_id)
            .await?;
        self.invalidate_owner(owner_id);
        Ok(moved)
    }

    /// Delete files. Same batch discipline as [`FileService::move_files`].
    #[tracing::instrument(skip(self, ids), fields(owner_id = %owner_id, batch_size = ids.len()))]
    pub async fn delete_files(&self, owner_id: Uuid, ids: &[Uuid]) -> Result<(), AppError> {
        self.validate_batch(owner_id, ids, |_| Ok(())).await?;

        self.store.delete_files(owner_id, ids).await?;
        self.invalidate_owner(owner_id);
        Ok(())
    }

    /// Fetch every id concurrently and run `check` on each, joining all
    /// outcomes before reporting. The first failure is surfaced; the rest are
    /// logged.
    async fn validate_batch(
        &self,
        owner_id: Uuid,
        ids: &[Uuid],
        check: impl Fn(&FileRecord) -> Result<(), AppError>,
    ) -> Result<(), AppError> {
        let check = &check;
        let lookups = join_all(ids.iter().map(|id| {
            let id = *id;
            async move {
                let file = self
                    .store
                    .get_file(owner_id, id)
                    .await?
                    .ok_or_else(|| AppError::NotFound(format!("File not found: {}", id)))?;
                check(&file)
            }
        }))
        .await;

        let mut failures = lookups.into_iter().filter_map(Result::err);
        if let Some(first) = failures.next() {
            for other in failures {
                tracing::warn!(error = %other, "Additional batch validation failure");
            }
            return Err(first);
        }
        Ok(())
    }

    fn invalidate_owner(&self, owner_id: Uuid) {
        let prefix = format!("files:{}:", owner_id);
        self.list_cache.invalidate_prefix(&prefix);
        self.record_cache.invalidate_prefix(&prefix);
    }
}

fn list_key(owner_id: Uuid, parent: Option<Uuid>, page: u32, page_size: u32) -> String {
    let parent = parent.map(|p| p.to_string()).unwrap_or_else(|| "root".to_string());
    format!("files:{}:list:{}:{}:{}", owner_id, parent, page, page_size)
}
