use async_trait::async_trait;
use chrono::{DateTime, Utc};
use loft_core::models::{FileKind, FileRecord};
use loft_core::AppError;
use sqlx::{FromRow, PgPool, Postgres};
use uuid::Uuid;

use crate::MetadataStore;

/// Database row shape for the `files` table; `kind` is stored as text.
#[derive(Debug, FromRow)]
struct FileRow {
    id: Uuid,
    user_id: Uuid,
    parent_directory_id: Option<Uuid>,
    kind: String,
    url: Option<String>,
    name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<FileRow> for FileRecord {
    fn from(row: FileRow) -> Self {
        FileRecord {
            id: row.id,
            owner_id: row.user_id,
            parent_directory_id: row.parent_directory_id,
            kind: FileKind::parse(&row.kind),
            url: row.url,
            name: row.name,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const FILE_COLUMNS: &str =
    "id, user_id, parent_directory_id, kind, url, name, created_at, updated_at";

/// Postgres-backed metadata store.
#[derive(Clone)]
pub struct PgMetadataStore {
    pool: PgPool,
}

impl PgMetadataStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MetadataStore for PgMetadataStore {
    #[tracing::instrument(skip(self, record), fields(db.table = "files", db.operation = "insert", db.record_id = %record.id))]
    async fn insert_file(&self, record: &FileRecord) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO files (id, user_id, parent_directory_id, kind, url, name, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(record.id)
        .bind(record.owner_id)
        .bind(record.parent_directory_id)
        .bind(record.kind.as_str())
        .bind(&record.url)
        .bind(&record.name)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "select", db.record_id = %id))]
    async fn get_file(&self, owner_id: Uuid, id: Uuid) -> Result<Option<FileRecord>, AppError> {
        let row = sqlx::query_as::<Postgres, FileRow>(&format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE user_id = $1 AND id = $2"
        ))
        .bind(owner_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(FileRecord::from))
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "select"))]
    async fn list_files(
        &self,
        owner_id: Uuid,
        parent_directory_id: Option<Uuid>,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<FileRecord>, AppError> {
        let offset = i64::from(page) * i64::from(page_size);

        let rows = match parent_directory_id {
            Some(parent) => {
                sqlx::query_as::<Postgres, FileRow>(&format!(
                    r#"
                    SELECT {FILE_COLUMNS} FROM files
                    WHERE user_id = $1 AND parent_directory_id = $2
                    ORDER BY id ASC
                    LIMIT $3 OFFSET $4
                    "#
                ))
                .bind(owner_id)
                .bind(parent)
                .bind(i64::from(page_size))
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<Postgres, FileRow>(&format!(
                    r#"
                    SELECT {FILE_COLUMNS} FROM files
                    WHERE user_id = $1 AND parent_directory_id IS NULL
                    ORDER BY id ASC
                    LIMIT $2 OFFSET $3
                    "#
                ))
                .bind(owner_id)
                .bind(i64::from(page_size))
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows.into_iter().map(FileRecord::from).collect())
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "update", db.record_id = %id))]
    async fn rename_file(
        &self,
        owner_id: Uuid,
        id: Uuid,
        name: &str,
    ) -> Result<FileRecord, AppError> {
        let row = sqlx::query_as::<Postgres, FileRow>(&format!(
            r#"
            UPDATE files SET name = $3, updated_at = now()
            WHERE user_id = $1 AND id = $2
            RETURNING {FILE_COLUMNS}
            "#
        ))
        .bind(owner_id)
        .bind(id)
        .bind(name)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    #[tracing::instrument(skip(self, ids), fields(db.table = "files", db.operation = "update", batch_size = ids.len()))]
    async fn move_files(
        &self,
        owner_id: Uuid,
        ids: &[Uuid],
        parent_directory_id: Option<Uuid>,
    ) -> Result<Vec<FileRecord>, AppError> {
        let mut tx = self.pool.begin().await?;
        let mut moved = Vec::with_capacity(ids.len());

        for id in ids {
            let row = sqlx::query_as::<Postgres, FileRow>(&format!(
                r#"
                UPDATE files SET parent_directory_id = $3, updated_at = now()
                WHERE user_id = $1 AND id = $2
                RETURNING {FILE_COLUMNS}
                "#
            ))
            .bind(owner_id)
            .bind(id)
            .bind(parent_directory_id)
            .fetch_one(&mut *tx)
            .await?;

            moved.push(FileRecord::from(row));
        }

        tx.commit().await?;

        Ok(moved)
    }

    #[tracing::instrument(skip(self, ids), fields(db.table = "files", db.operation = "delete", batch_size = ids.len()))]
    async fn delete_files(&self, owner_id: Uuid, ids: &[Uuid]) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        for id in ids {
            let result = sqlx::query("DELETE FROM files WHERE user_id = $1 AND id = $2")
                .bind(owner_id)
                .bind(id)
                .execute(&mut *tx)
                .await?;

            if result.rows_affected() == 0 {
                return Err(AppError::NotFound(format!("File not found: {}", id)));
            }
        }

        tx.commit().await?;

        Ok(())
    }
}
