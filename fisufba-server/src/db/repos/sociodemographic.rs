//! Sociodemographic evaluation form repository
//!
//! Unlike patient information, a patient may have several of these.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection};

use crate::db::StorageError;
use crate::models::{SociodemographicFields, SociodemographicPatch};

const COLUMNS: &str = r#"
    id, user_id, civil_status, lives_with_status, education, occupational_status,
    current_job, last_job, is_sick, diseases, is_medicated, medicines,
    created_at, updated_at
"#;

/// Row from `forms_sociodemographic_evaluation`
#[derive(Debug, Clone, FromRow)]
pub struct SociodemographicEvaluation {
    pub id: i64,
    pub user_id: i64,
    pub civil_status: String,
    pub lives_with_status: String,
    pub education: String,
    pub occupational_status: String,
    pub current_job: Option<String>,
    pub last_job: Option<String>,
    pub is_sick: bool,
    pub diseases: Option<Vec<String>>,
    pub is_medicated: bool,
    pub medicines: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

pub struct SociodemographicRepo<'a> {
    conn: &'a mut PgConnection,
}

impl<'a> SociodemographicRepo<'a> {
    pub fn new(conn: &'a mut PgConnection) -> Self {
        Self { conn }
    }

    pub async fn create(
        &mut self,
        user_id: i64,
        fields: &SociodemographicFields,
    ) -> Result<SociodemographicEvaluation, StorageError> {
        let form = sqlx::query_as::<_, SociodemographicEvaluation>(&format!(
            r#"
            INSERT INTO forms_sociodemographic_evaluation
                (user_id, civil_status, lives_with_status, education, occupational_status,
                 current_job, last_job, is_sick, diseases, is_medicated, medicines)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(fields.civil_status.as_str())
        .bind(fields.lives_with_status.as_str())
        .bind(fields.education.as_str())
        .bind(fields.occupational_status.as_str())
        .bind(fields.current_job.as_deref())
        .bind(fields.last_job.as_deref())
        .bind(fields.is_sick)
        .bind(fields.diseases.as_deref())
        .bind(fields.is_medicated)
        .bind(fields.medicines.as_deref())
        .fetch_one(&mut *self.conn)
        .await?;

        tracing::debug!(form_id = form.id, user_id, "sociodemographic evaluation created");
        Ok(form)
    }

    pub async fn get(&mut self, id: i64) -> Result<SociodemographicEvaluation, StorageError> {
        sqlx::query_as::<_, SociodemographicEvaluation>(&format!(
            "SELECT {COLUMNS} FROM forms_sociodemographic_evaluation WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?
        .ok_or_else(|| StorageError::not_found("sociodemographic evaluation", id))
    }

    pub async fn get_for_update(
        &mut self,
        id: i64,
    ) -> Result<SociodemographicEvaluation, StorageError> {
        sqlx::query_as::<_, SociodemographicEvaluation>(&format!(
            "SELECT {COLUMNS} FROM forms_sociodemographic_evaluation WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?
        .ok_or_else(|| StorageError::not_found("sociodemographic evaluation", id))
    }

    /// Nullable columns take a `set` flag so a patch can clear them.
    pub async fn update(
        &mut self,
        id: i64,
        patch: &SociodemographicPatch,
    ) -> Result<SociodemographicEvaluation, StorageError> {
        sqlx::query_as::<_, SociodemographicEvaluation>(&format!(
            r#"
            UPDATE forms_sociodemographic_evaluation SET
                civil_status        = COALESCE($2, civil_status),
                lives_with_status   = COALESCE($3, lives_with_status),
                education           = COALESCE($4, education),
                occupational_status = COALESCE($5, occupational_status),
                current_job         = CASE WHEN $6 THEN $7 ELSE current_job END,
                last_job            = CASE WHEN $8 THEN $9 ELSE last_job END,
                is_sick             = COALESCE($10, is_sick),
                diseases            = CASE WHEN $11 THEN $12::text[] ELSE diseases END,
                is_medicated        = COALESCE($13, is_medicated),
                medicines           = CASE WHEN $14 THEN $15::text[] ELSE medicines END,
                updated_at          = NOW()
            WHERE id = $1
            RETURNING {COLUMNS}
            "#
        ))
        .bind(id)
        .bind(patch.civil_status.map(|v| v.as_str()))
        .bind(patch.lives_with_status.map(|v| v.as_str()))
        .bind(patch.education.map(|v| v.as_str()))
        .bind(patch.occupational_status.map(|v| v.as_str()))
        .bind(patch.current_job.is_some())
        .bind(patch.current_job.clone().flatten())
        .bind(patch.last_job.is_some())
        .bind(patch.last_job.clone().flatten())
        .bind(patch.is_sick)
        .bind(patch.diseases.is_some())
        .bind(patch.diseases.clone().flatten())
        .bind(patch.is_medicated)
        .bind(patch.medicines.is_some())
        .bind(patch.medicines.clone().flatten())
        .fetch_optional(&mut *self.conn)
        .await?
        .ok_or_else(|| StorageError::not_found("sociodemographic evaluation", id))
    }

    pub async fn delete(&mut self, id: i64) -> Result<(), StorageError> {
        let result = sqlx::query("DELETE FROM forms_sociodemographic_evaluation WHERE id = $1")
            .bind(id)
            .execute(&mut *self.conn)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::not_found("sociodemographic evaluation", id));
        }
        tracing::debug!(form_id = id, "sociodemographic evaluation deleted");
        Ok(())
    }
}
