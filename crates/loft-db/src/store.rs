use async_trait::async_trait;
use loft_core::models::FileRecord;
use loft_core::AppError;
use uuid::Uuid;

/// Operations the file services need from the metadata store.
///
/// The batch operations are atomic: either every id is applied or none is.
/// Per-item validation happens above this trait, behind a join barrier; the
/// store only sees batches that already passed it.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn insert_file(&self, record: &FileRecord) -> Result<(), AppError>;

    async fn get_file(&self, owner_id: Uuid, id: Uuid) -> Result<Option<FileRecord>, AppError>;

    async fn list_files(
        &self,
        owner_id: Uuid,
        parent_directory_id: Option<Uuid>,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<FileRecord>, AppError>;

    async fn rename_file(
        &self,
        owner_id: Uuid,
        id: Uuid,
        name: &str,
    ) -> Result<FileRecord, AppError>;

    /// Re-parent all `ids` in one transaction.
    async fn move_files(
        &self,
        owner_id: Uuid,
        ids: &[Uuid],
        parent_directory_id: Option<Uuid>,
    ) -> Result<Vec<FileRecord>, AppError>;

    /// Delete all `ids` in one transaction.
    async fn delete_files(&self, owner_id: Uuid, ids: &[Uuid]) -> Result<(), AppError>;
}
