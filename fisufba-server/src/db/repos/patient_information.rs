//! Patient information form repository

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgConnection};

use crate::db::StorageError;
use crate::models::{PatientInformationFields, PatientInformationPatch, Phone};

/// Row from `forms_patient_information`
#[derive(Debug, Clone, FromRow)]
pub struct PatientInformation {
    pub id: i64,
    pub user_id: i64,
    pub gender: String,
    pub birthday: NaiveDate,
    pub acquaintance_phone: String,
    pub address: String,
    pub neighborhood: String,
    pub city: String,
    pub country: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

pub struct PatientInformationRepo<'a> {
    conn: &'a mut PgConnection,
}

impl<'a> PatientInformationRepo<'a> {
    pub fn new(conn: &'a mut PgConnection) -> Self {
        Self { conn }
    }

    /// Insert the form for `user_id`. A second form for the same user
    /// violates the unique constraint on `user_id`.
    pub async fn create(
        &mut self,
        user_id: i64,
        fields: &PatientInformationFields,
    ) -> Result<PatientInformation, StorageError> {
        let form = sqlx::query_as::<_, PatientInformation>(
            r#"
            INSERT INTO forms_patient_information
                (user_id, gender, birthday, acquaintance_phone, address, neighborhood, city, country)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, user_id, gender, birthday, acquaintance_phone, address,
                      neighborhood, city, country, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(fields.gender.as_str())
        .bind(fields.birthday)
        .bind(fields.acquaintance_phone.as_str())
        .bind(&fields.address)
        .bind(&fields.neighborhood)
        .bind(&fields.city)
        .bind(&fields.country)
        .fetch_one(&mut *self.conn)
        .await?;

        tracing::debug!(form_id = form.id, user_id, "patient information created");
        Ok(form)
    }

    pub async fn get(&mut self, id: i64) -> Result<PatientInformation, StorageError> {
        sqlx::query_as::<_, PatientInformation>(
            r#"
            SELECT id, user_id, gender, birthday, acquaintance_phone, address,
                   neighborhood, city, country, created_at, updated_at
            FROM forms_patient_information
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?
        .ok_or_else(|| StorageError::not_found("patient information", id))
    }

    pub async fn get_for_update(&mut self, id: i64) -> Result<PatientInformation, StorageError> {
        sqlx::query_as::<_, PatientInformation>(
            r#"
            SELECT id, user_id, gender, birthday, acquaintance_phone, address,
                   neighborhood, city, country, created_at, updated_at
            FROM forms_patient_information
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?
        .ok_or_else(|| StorageError::not_found("patient information", id))
    }

    pub async fn update(
        &mut self,
        id: i64,
        patch: &PatientInformationPatch,
    ) -> Result<PatientInformation, StorageError> {
        sqlx::query_as::<_, PatientInformation>(
            r#"
            UPDATE forms_patient_information SET
                gender             = COALESCE($2, gender),
                birthday           = COALESCE($3, birthday),
                acquaintance_phone = COALESCE($4, acquaintance_phone),
                address            = COALESCE($5, address),
                neighborhood       = COALESCE($6, neighborhood),
                city               = COALESCE($7, city),
                country            = COALESCE($8, country),
                updated_at         = NOW()
            WHERE id = $1
            RETURNING id, user_id, gender, birthday, acquaintance_phone, address,
                      neighborhood, city, country, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(patch.gender.map(|g| g.as_str()))
        .bind(patch.birthday)
        .bind(patch.acquaintance_phone.as_ref().map(Phone::as_str))
        .bind(patch.address.as_deref())
        .bind(patch.neighborhood.as_deref())
        .bind(patch.city.as_deref())
        .bind(patch.country.as_deref())
        .fetch_optional(&mut *self.conn)
        .await?
        .ok_or_else(|| StorageError::not_found("patient information", id))
    }

    pub async fn delete(&mut self, id: i64) -> Result<(), StorageError> {
        let result = sqlx::query("DELETE FROM forms_patient_information WHERE id = $1")
            .bind(id)
            .execute(&mut *self.conn)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::not_found("patient information", id));
        }
        tracing::debug!(form_id = id, "patient information deleted");
        Ok(())
    }
}
