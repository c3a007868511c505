//! Postgres-backed submission store
//!
//! Runtime-checked sqlx queries against the schema in `migrations/`.
//! Creation is a single `ON CONFLICT DO NOTHING` insert; each aggregate
//! commit runs in one transaction (metadata update, table replace,
//! version bump), so readers never observe a half-populated aggregate.

use async_trait::async_trait;
use hepsync_common::ids::{InspireId, RecordId};
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::{CreateOutcome, Result, StoreError, SubmissionStore};
use crate::submission::models::{
    DataTable, PublicationRecord, Submission, SubmissionStatus,
};

/// Postgres [`SubmissionStore`] implementation.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the embedded schema migrations.
    pub async fn migrate(pool: &PgPool) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(pool).await?;
        Ok(())
    }
}

#[async_trait]
impl SubmissionStore for PgStore {
    async fn find(&self, id: &InspireId) -> Result<Option<RecordId>> {
        let row: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM submissions WHERE inspire_id = $1")
                .bind(id.as_str())
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(id,)| RecordId::from(id)))
    }

    async fn create_if_absent(
        &self,
        id: &InspireId,
        publication: &PublicationRecord,
    ) -> Result<CreateOutcome> {
        let recid = RecordId::new();
        let inserted: Option<(Uuid,)> = sqlx::query_as(
            r#"
            INSERT INTO submissions (
                id, inspire_id, title, authors, abstract,
                doi, arxiv_id, collaboration, status, version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'draft', 0)
            ON CONFLICT (inspire_id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(recid.as_uuid())
        .bind(id.as_str())
        .bind(&publication.title)
        .bind(Json(&publication.authors))
        .bind(&publication.abstract_text)
        .bind(&publication.doi)
        .bind(&publication.arxiv_id)
        .bind(&publication.collaboration)
        .fetch_optional(&self.pool)
        .await?;

        match inserted {
            Some((id,)) => Ok(CreateOutcome::Created(RecordId::from(id))),
            None => match self.find(id).await? {
                Some(existing) => Ok(CreateOutcome::Exists(existing)),
                // The conflicting row vanished between the two statements.
                None => Err(StoreError::Duplicate(id.clone())),
            },
        }
    }

    async fn load(&self, recid: RecordId) -> Result<Option<Submission>> {
        let row = sqlx::query(
            r#"
            SELECT inspire_id, title, authors, abstract, doi, arxiv_id,
                   collaboration, status, version, created_at, updated_at
            FROM submissions WHERE id = $1
            "#,
        )
        .bind(recid.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let status: String = row.try_get("status")?;
        let status: SubmissionStatus = status.parse().map_err(StoreError::Invalid)?;
        let authors: Json<Vec<String>> = row.try_get("authors")?;
        let version: i64 = row.try_get("version")?;

        let table_rows = sqlx::query(
            "SELECT position, name, payload FROM data_tables \
             WHERE submission_id = $1 ORDER BY position",
        )
        .bind(recid.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        let mut tables = Vec::with_capacity(table_rows.len());
        for table_row in table_rows {
            let position: i32 = table_row.try_get("position")?;
            tables.push(DataTable {
                index: position as usize,
                name: table_row.try_get("name")?,
                payload: table_row.try_get("payload")?,
            });
        }

        Ok(Some(Submission {
            recid,
            inspire_id: InspireId::new(row.try_get::<String, _>("inspire_id")?),
            publication: PublicationRecord {
                inspire_id: InspireId::new(row.try_get::<String, _>("inspire_id")?),
                title: row.try_get("title")?,
                authors: authors.0,
                abstract_text: row.try_get("abstract")?,
                doi: row.try_get("doi")?,
                arxiv_id: row.try_get("arxiv_id")?,
                collaboration: row.try_get("collaboration")?,
            },
            tables,
            status,
            version: version as u64,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        }))
    }

    async fn commit(
        &self,
        recid: RecordId,
        publication: &PublicationRecord,
        tables: Vec<DataTable>,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE submissions
            SET title = $2, authors = $3, abstract = $4, doi = $5,
                arxiv_id = $6, collaboration = $7,
                version = version + 1, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(recid.as_uuid())
        .bind(&publication.title)
        .bind(Json(&publication.authors))
        .bind(&publication.abstract_text)
        .bind(&publication.doi)
        .bind(&publication.arxiv_id)
        .bind(&publication.collaboration)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(StoreError::UnknownRecord(recid));
        }

        sqlx::query("DELETE FROM data_tables WHERE submission_id = $1")
            .bind(recid.as_uuid())
            .execute(&mut *tx)
            .await?;

        for table in &tables {
            sqlx::query(
                "INSERT INTO data_tables (submission_id, position, name, payload) \
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(recid.as_uuid())
            .bind(table.index as i32)
            .bind(&table.name)
            .bind(&table.payload)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn update_publication(
        &self,
        recid: RecordId,
        publication: &PublicationRecord,
    ) -> Result<()> {
        let updated = sqlx::query(
            r#"
            UPDATE submissions
            SET title = $2, authors = $3, abstract = $4, doi = $5,
                arxiv_id = $6, collaboration = $7,
                version = version + 1, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(recid.as_uuid())
        .bind(&publication.title)
        .bind(Json(&publication.authors))
        .bind(&publication.abstract_text)
        .bind(&publication.doi)
        .bind(&publication.arxiv_id)
        .bind(&publication.collaboration)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(StoreError::UnknownRecord(recid));
        }
        Ok(())
    }

    async fn mark_finished(&self, recid: RecordId) -> Result<()> {
        let updated =
            sqlx::query("UPDATE submissions SET status = 'finished', updated_at = now() WHERE id = $1")
                .bind(recid.as_uuid())
                .execute(&self.pool)
                .await?;
        if updated.rows_affected() == 0 {
            return Err(StoreError::UnknownRecord(recid));
        }
        Ok(())
    }

    async fn remove(&self, recid: RecordId) -> Result<()> {
        // data_tables rows go with the submission (ON DELETE CASCADE).
        sqlx::query("DELETE FROM submissions WHERE id = $1")
            .bind(recid.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Round-trip against a live database; run with
    // DATABASE_URL=postgres://... cargo test -- --ignored
    #[tokio::test]
    #[ignore]
    async fn test_postgres_round_trip() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let pool = PgPool::connect(&url).await.unwrap();
        PgStore::migrate(&pool).await.unwrap();
        let store = PgStore::new(pool);

        let id = InspireId::new(format!("ins-test-{}", Uuid::new_v4()));
        let publication = PublicationRecord {
            inspire_id: id.clone(),
            title: "Round trip".to_string(),
            authors: vec!["A. Author".to_string()],
            abstract_text: Some("Abstract".to_string()),
            doi: None,
            arxiv_id: None,
            collaboration: None,
        };

        let CreateOutcome::Created(recid) =
            store.create_if_absent(&id, &publication).await.unwrap()
        else {
            panic!("expected creation");
        };
        assert!(matches!(
            store.create_if_absent(&id, &publication).await.unwrap(),
            CreateOutcome::Exists(existing) if existing == recid
        ));

        let tables = vec![DataTable {
            index: 1,
            name: "Table 1".to_string(),
            payload: serde_json::json!({"independent_variables": []}),
        }];
        store.commit(recid, &publication, tables).await.unwrap();

        let submission = store.load(recid).await.unwrap().unwrap();
        assert_eq!(submission.version, 1);
        assert_eq!(submission.tables.len(), 1);

        store.remove(recid).await.unwrap();
        assert!(store.find(&id).await.unwrap().is_none());
    }
}
