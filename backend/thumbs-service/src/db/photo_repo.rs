/// Photo repository - database operations for photos and their thumbnails
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::{debug, info};

use super::{PhotoRepository, RepositoryError, RepositoryResult};
use crate::config::DatabaseConfig;
use crate::models::{PhotoRecord, ThumbnailRef};

/// PostgreSQL-backed [`PhotoRepository`]
#[derive(Clone)]
pub struct PgPhotoRepository {
    pool: PgPool,
}

impl PgPhotoRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a connection pool and verify the database is reachable
    pub async fn connect(config: &DatabaseConfig) -> RepositoryResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(config.connect_options())
            .await?;

        info!(
            host = %config.host,
            database = %config.name,
            max_connections = config.max_connections,
            "Database connection pool created"
        );

        Ok(Self::new(pool))
    }

    /// Apply embedded schema migrations
    pub async fn migrate(&self) -> RepositoryResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations applied");
        Ok(())
    }
}

#[async_trait]
impl PhotoRepository for PgPhotoRepository {
    async fn save(&self, record: &PhotoRecord) -> RepositoryResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO photos (filename)
            VALUES ($1)
            ON CONFLICT (filename) DO UPDATE SET updated_at = NOW()
            "#,
        )
        .bind(&record.filename)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM thumbnails WHERE photo_filename = $1")
            .bind(&record.filename)
            .execute(&mut *tx)
            .await?;

        let filenames: Vec<String> = record
            .thumbnails
            .iter()
            .map(|t| t.filename.clone())
            .collect();
        let dimensions = record
            .thumbnails
            .iter()
            .map(|t| {
                i32::try_from(t.dimension)
                    .map_err(|_| RepositoryError::Corrupt(format!("dimension {} out of range", t.dimension)))
            })
            .collect::<RepositoryResult<Vec<i32>>>()?;

        sqlx::query(
            r#"
            INSERT INTO thumbnails (filename, photo_filename, dimension)
            SELECT t.filename, $1, t.dimension
            FROM UNNEST($2::TEXT[], $3::INTEGER[]) AS t(filename, dimension)
            ON CONFLICT (filename) DO UPDATE
            SET photo_filename = EXCLUDED.photo_filename,
                dimension = EXCLUDED.dimension
            "#,
        )
        .bind(&record.filename)
        .bind(&filenames)
        .bind(&dimensions)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(
            filename = %record.filename,
            thumbnails = record.thumbnails.len(),
            "Photo record saved"
        );
        Ok(())
    }

    async fn find(&self, filename: &str) -> RepositoryResult<Option<PhotoRecord>> {
        let photo = sqlx::query("SELECT filename, updated_at FROM photos WHERE filename = $1")
            .bind(filename)
            .fetch_optional(&self.pool)
            .await?;

        let Some(photo) = photo else {
            return Ok(None);
        };

        let rows = sqlx::query(
            r#"
            SELECT filename, dimension
            FROM thumbnails
            WHERE photo_filename = $1
            ORDER BY dimension ASC
            "#,
        )
        .bind(filename)
        .fetch_all(&self.pool)
        .await?;

        let thumbnails = rows
            .into_iter()
            .map(|row| {
                let dimension: i32 = row.try_get("dimension")?;
                Ok(ThumbnailRef {
                    filename: row.try_get("filename")?,
                    dimension: u32::try_from(dimension).map_err(|_| {
                        RepositoryError::Corrupt(format!("negative dimension {dimension}"))
                    })?,
                })
            })
            .collect::<RepositoryResult<Vec<_>>>()?;

        Ok(Some(PhotoRecord {
            filename: photo.try_get("filename")?,
            thumbnails,
            updated_at: Some(photo.try_get("updated_at")?),
        }))
    }
}
