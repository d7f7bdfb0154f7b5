//! Patient information form endpoints

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{form_owner, require_patient, self_link};
use crate::db::{PatientInformation, PatientInformationRepo};
use crate::http::auth::Principal;
use crate::http::error::ApiError;
use crate::http::extractors::{SessionToken, ValidId, ValidJson};
use crate::http::server::AppState;
use crate::models::patient::{birthday, text_field};
use crate::models::{
    Gender, PatientInformationFields, PatientInformationPatch, Permission, Phone, ValidationError,
};

/// Create form request
#[derive(Deserialize)]
pub struct CreatePatientInformationRequest {
    pub user_id: i64,
    pub gender: String,
    pub birthday: String,
    pub acquaintance_phone: String,
    pub address: String,
    pub neighborhood: String,
    pub city: String,
    pub country: String,
}

impl CreatePatientInformationRequest {
    fn validate(&self, today: NaiveDate) -> Result<PatientInformationFields, ValidationError> {
        form_owner(self.user_id)?;
        Ok(PatientInformationFields {
            gender: Gender::parse(&self.gender)?,
            birthday: birthday(&self.birthday, today)?,
            acquaintance_phone: Phone::with_field(&self.acquaintance_phone, "acquaintance_phone")?,
            address: text_field(&self.address, "address")?,
            neighborhood: text_field(&self.neighborhood, "neighborhood")?,
            city: text_field(&self.city, "city")?,
            country: text_field(&self.country, "country")?,
        })
    }
}

/// Partial update request
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdatePatientInformationRequest {
    pub gender: Option<String>,
    pub birthday: Option<String>,
    pub acquaintance_phone: Option<String>,
    pub address: Option<String>,
    pub neighborhood: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
}

impl UpdatePatientInformationRequest {
    fn validate(&self, today: NaiveDate) -> Result<PatientInformationPatch, ValidationError> {
        let patch = PatientInformationPatch {
            gender: self.gender.as_deref().map(Gender::parse).transpose()?,
            birthday: self
                .birthday
                .as_deref()
                .map(|b| birthday(b, today))
                .transpose()?,
            acquaintance_phone: self
                .acquaintance_phone
                .as_deref()
                .map(|p| Phone::with_field(p, "acquaintance_phone"))
                .transpose()?,
            address: optional_field(&self.address, "address")?,
            neighborhood: optional_field(&self.neighborhood, "neighborhood")?,
            city: optional_field(&self.city, "city")?,
            country: optional_field(&self.country, "country")?,
        };
        if patch.is_empty() {
            return Err(ValidationError::Empty { field: "body" });
        }
        Ok(patch)
    }
}

fn optional_field(
    value: &Option<String>,
    field: &'static str,
) -> Result<Option<String>, ValidationError> {
    value.as_deref().map(|v| text_field(v, field)).transpose()
}

/// Form response
#[derive(Serialize)]
pub struct PatientInformationResponse {
    #[serde(rename = "_links")]
    pub links: Value,
    pub id: i64,
    pub user_id: i64,
    pub gender: String,
    pub birthday: NaiveDate,
    pub acquaintance_phone: String,
    pub address: String,
    pub neighborhood: String,
    pub city: String,
    pub country: String,
    pub created_at: String,
    pub updated_at: Option<String>,
}

impl From<PatientInformation> for PatientInformationResponse {
    fn from(form: PatientInformation) -> Self {
        Self {
            links: self_link(format!("/forms/patient-information/{}", form.id)),
            id: form.id,
            user_id: form.user_id,
            gender: form.gender,
            birthday: form.birthday,
            acquaintance_phone: form.acquaintance_phone,
            address: form.address,
            neighborhood: form.neighborhood,
            city: form.city,
            country: form.country,
            created_at: form.created_at.to_rfc3339(),
            updated_at: form.updated_at.map(|t| t.to_rfc3339()),
        }
    }
}

/// POST /forms/patient-information - fill in the form for a patient
async fn create_form(
    State(state): State<Arc<AppState>>,
    token: SessionToken,
    ValidJson(req): ValidJson<CreatePatientInformationRequest>,
) -> Result<(StatusCode, Json<PatientInformationResponse>), ApiError> {
    let fields = req.validate(Utc::now().date_naive())?;
    let user_id = req.user_id;

    let form = state
        .gateway
        .transact(move |conn| {
            Box::pin(async move {
                let principal = Principal::authenticate(&mut *conn, &token).await?;
                principal.require(Permission::CreateForm)?;

                require_patient(&mut *conn, user_id).await?;

                let form = PatientInformationRepo::new(&mut *conn)
                    .create(user_id, &fields)
                    .await?;
                tracing::info!(
                    form_id = form.id,
                    user_id,
                    created_by = principal.user_id,
                    "patient information created"
                );
                Ok::<_, ApiError>(form)
            })
        })
        .await?;

    Ok((StatusCode::CREATED, Json(form.into())))
}

/// GET /forms/patient-information/{id} - own form, or with read_form_data
async fn get_form(
    State(state): State<Arc<AppState>>,
    token: SessionToken,
    ValidId(id): ValidId,
) -> Result<Json<PatientInformationResponse>, ApiError> {
    let form = state
        .gateway
        .transact(move |conn| {
            Box::pin(async move {
                let principal = Principal::authenticate(&mut *conn, &token).await?;
                let form = PatientInformationRepo::new(&mut *conn).get(id).await?;
                if form.user_id != principal.user_id {
                    principal.require(Permission::ReadFormData)?;
                }
                Ok::<_, ApiError>(form)
            })
        })
        .await?;

    Ok(Json(form.into()))
}

/// PATCH /forms/patient-information/{id}
async fn update_form(
    State(state): State<Arc<AppState>>,
    token: SessionToken,
    ValidId(id): ValidId,
    ValidJson(req): ValidJson<UpdatePatientInformationRequest>,
) -> Result<Json<PatientInformationResponse>, ApiError> {
    let patch = req.validate(Utc::now().date_naive())?;

    let form = state
        .gateway
        .transact(move |conn| {
            Box::pin(async move {
                let principal = Principal::authenticate(&mut *conn, &token).await?;
                let mut forms = PatientInformationRepo::new(&mut *conn);
                forms.get_for_update(id).await?;
                principal.require(Permission::ChangeFormData)?;
                let form = forms.update(id, &patch).await?;
                tracing::info!(form_id = id, changed_by = principal.user_id, "patient information updated");
                Ok::<_, ApiError>(form)
            })
        })
        .await?;

    Ok(Json(form.into()))
}

/// DELETE /forms/patient-information/{id}
async fn delete_form(
    State(state): State<Arc<AppState>>,
    token: SessionToken,
    ValidId(id): ValidId,
) -> Result<StatusCode, ApiError> {
    state
        .gateway
        .transact(move |conn| {
            Box::pin(async move {
                let principal = Principal::authenticate(&mut *conn, &token).await?;
                let mut forms = PatientInformationRepo::new(&mut *conn);
                forms.get_for_update(id).await?;
                principal.require(Permission::ChangeFormData)?;
                forms.delete(id).await?;
                tracing::info!(form_id = id, deleted_by = principal.user_id, "patient information deleted");
                Ok::<_, ApiError>(())
            })
        })
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Patient information routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/forms/patient-information", post(create_form))
        .route(
            "/forms/patient-information/{id}",
            get(get_form).patch(update_form).delete(delete_form),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    fn create_request() -> CreatePatientInformationRequest {
        CreatePatientInformationRequest {
            user_id: 3,
            gender: "Feminino".into(),
            birthday: "1990-02-28".into(),
            acquaintance_phone: "71988887777".into(),
            address: "Rua A, 10".into(),
            neighborhood: "Ondina".into(),
            city: "Salvador".into(),
            country: "Brasil".into(),
        }
    }

    #[test]
    fn valid_create_request() {
        let fields = create_request().validate(today()).unwrap();
        assert_eq!(fields.gender, Gender::Feminine);
        assert_eq!(fields.city, "Salvador");
    }

    #[test]
    fn create_request_field_errors() {
        let mut req = create_request();
        req.gender = "X".into();
        assert!(matches!(
            req.validate(today()).unwrap_err(),
            ValidationError::InvalidVariant { field: "gender", .. }
        ));

        let mut req = create_request();
        req.acquaintance_phone = "71 9888".into();
        assert!(matches!(
            req.validate(today()).unwrap_err(),
            ValidationError::InvalidFormat { field: "acquaintance_phone", .. }
        ));

        let mut req = create_request();
        req.user_id = 0;
        assert!(req.validate(today()).is_err());
    }

    #[test]
    fn empty_update_is_rejected() {
        let req: UpdatePatientInformationRequest = serde_json::from_str("{}").unwrap();
        assert!(matches!(
            req.validate(today()).unwrap_err(),
            ValidationError::Empty { field: "body" }
        ));

        let req: UpdatePatientInformationRequest =
            serde_json::from_str(r#"{"city": "Feira de Santana"}"#).unwrap();
        let patch = req.validate(today()).unwrap();
        assert_eq!(patch.city.as_deref(), Some("Feira de Santana"));
    }
}
