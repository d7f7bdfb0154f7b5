//! Sociodemographic evaluation form endpoints

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{form_owner, nullable, require_patient, self_link};
use crate::db::{SociodemographicEvaluation, SociodemographicRepo};
use crate::http::auth::Principal;
use crate::http::error::ApiError;
use crate::http::extractors::{SessionToken, ValidId, ValidJson};
use crate::http::server::AppState;
use crate::models::patient::text_field;
use crate::models::sociodemographic::text_list;
use crate::models::{
    CivilStatus, Education, LivesWith, OccupationalStatus, Permission, SociodemographicFields,
    SociodemographicPatch, ValidationError,
};

/// Create form request. Nullable fields may be omitted.
#[derive(Deserialize)]
pub struct CreateSociodemographicRequest {
    pub user_id: i64,
    pub civil_status: String,
    pub lives_with_status: String,
    pub education: String,
    pub occupational_status: String,
    #[serde(default)]
    pub current_job: Option<String>,
    #[serde(default)]
    pub last_job: Option<String>,
    pub is_sick: bool,
    #[serde(default)]
    pub diseases: Option<Vec<String>>,
    pub is_medicated: bool,
    #[serde(default)]
    pub medicines: Option<Vec<String>>,
}

impl CreateSociodemographicRequest {
    fn validate(&self) -> Result<SociodemographicFields, ValidationError> {
        form_owner(self.user_id)?;
        Ok(SociodemographicFields {
            civil_status: CivilStatus::parse(&self.civil_status)?,
            lives_with_status: LivesWith::parse(&self.lives_with_status)?,
            education: Education::parse(&self.education)?,
            occupational_status: OccupationalStatus::parse(&self.occupational_status)?,
            current_job: job(&self.current_job, "current_job")?,
            last_job: job(&self.last_job, "last_job")?,
            is_sick: self.is_sick,
            diseases: list(&self.diseases, "diseases")?,
            is_medicated: self.is_medicated,
            medicines: list(&self.medicines, "medicines")?,
        })
    }
}

/// Partial update request; `null` clears a nullable field.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateSociodemographicRequest {
    pub civil_status: Option<String>,
    pub lives_with_status: Option<String>,
    pub education: Option<String>,
    pub occupational_status: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub current_job: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub last_job: Option<Option<String>>,
    pub is_sick: Option<bool>,
    #[serde(default, deserialize_with = "nullable")]
    pub diseases: Option<Option<Vec<String>>>,
    pub is_medicated: Option<bool>,
    #[serde(default, deserialize_with = "nullable")]
    pub medicines: Option<Option<Vec<String>>>,
}

impl UpdateSociodemographicRequest {
    fn validate(&self) -> Result<SociodemographicPatch, ValidationError> {
        let patch = SociodemographicPatch {
            civil_status: self.civil_status.as_deref().map(CivilStatus::parse).transpose()?,
            lives_with_status: self
                .lives_with_status
                .as_deref()
                .map(LivesWith::parse)
                .transpose()?,
            education: self.education.as_deref().map(Education::parse).transpose()?,
            occupational_status: self
                .occupational_status
                .as_deref()
                .map(OccupationalStatus::parse)
                .transpose()?,
            current_job: self
                .current_job
                .as_ref()
                .map(|v| job(v, "current_job"))
                .transpose()?,
            last_job: self.last_job.as_ref().map(|v| job(v, "last_job")).transpose()?,
            is_sick: self.is_sick,
            diseases: self.diseases.as_ref().map(|v| list(v, "diseases")).transpose()?,
            is_medicated: self.is_medicated,
            medicines: self
                .medicines
                .as_ref()
                .map(|v| list(v, "medicines"))
                .transpose()?,
        };
        if patch.is_empty() {
            return Err(ValidationError::Empty { field: "body" });
        }
        Ok(patch)
    }
}

fn job(value: &Option<String>, field: &'static str) -> Result<Option<String>, ValidationError> {
    value.as_deref().map(|v| text_field(v, field)).transpose()
}

fn list(
    value: &Option<Vec<String>>,
    field: &'static str,
) -> Result<Option<Vec<String>>, ValidationError> {
    value.as_deref().map(|v| text_list(v, field)).transpose()
}

/// Form response
#[derive(Serialize)]
pub struct SociodemographicResponse {
    #[serde(rename = "_links")]
    pub links: Value,
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
    pub created_at: String,
    pub updated_at: Option<String>,
}

impl From<SociodemographicEvaluation> for SociodemographicResponse {
    fn from(form: SociodemographicEvaluation) -> Self {
        Self {
            links: self_link(format!("/forms/sociodemographic-evaluation/{}", form.id)),
            id: form.id,
            user_id: form.user_id,
            civil_status: form.civil_status,
            lives_with_status: form.lives_with_status,
            education: form.education,
            occupational_status: form.occupational_status,
            current_job: form.current_job,
            last_job: form.last_job,
            is_sick: form.is_sick,
            diseases: form.diseases,
            is_medicated: form.is_medicated,
            medicines: form.medicines,
            created_at: form.created_at.to_rfc3339(),
            updated_at: form.updated_at.map(|t| t.to_rfc3339()),
        }
    }
}

/// POST /forms/sociodemographic-evaluation
async fn create_form(
    State(state): State<Arc<AppState>>,
    token: SessionToken,
    ValidJson(req): ValidJson<CreateSociodemographicRequest>,
) -> Result<(StatusCode, Json<SociodemographicResponse>), ApiError> {
    let fields = req.validate()?;
    let user_id = req.user_id;

    let form = state
        .gateway
        .transact(move |conn| {
            Box::pin(async move {
                let principal = Principal::authenticate(&mut *conn, &token).await?;
                principal.require(Permission::CreateForm)?;
                require_patient(&mut *conn, user_id).await?;

                let form = SociodemographicRepo::new(&mut *conn)
                    .create(user_id, &fields)
                    .await?;
                tracing::info!(
                    form_id = form.id,
                    user_id,
                    created_by = principal.user_id,
                    "sociodemographic evaluation created"
                );
                Ok::<_, ApiError>(form)
            })
        })
        .await?;

    Ok((StatusCode::CREATED, Json(form.into())))
}

/// GET /forms/sociodemographic-evaluation/{id}
async fn get_form(
    State(state): State<Arc<AppState>>,
    token: SessionToken,
    ValidId(id): ValidId,
) -> Result<Json<SociodemographicResponse>, ApiError> {
    let form = state
        .gateway
        .transact(move |conn| {
            Box::pin(async move {
                let principal = Principal::authenticate(&mut *conn, &token).await?;
                let form = SociodemographicRepo::new(&mut *conn).get(id).await?;
                if form.user_id != principal.user_id {
                    principal.require(Permission::ReadFormData)?;
                }
                Ok::<_, ApiError>(form)
            })
        })
        .await?;

    Ok(Json(form.into()))
}

/// PATCH /forms/sociodemographic-evaluation/{id}
async fn update_form(
    State(state): State<Arc<AppState>>,
    token: SessionToken,
    ValidId(id): ValidId,
    ValidJson(req): ValidJson<UpdateSociodemographicRequest>,
) -> Result<Json<SociodemographicResponse>, ApiError> {
    let patch = req.validate()?;

    let form = state
        .gateway
        .transact(move |conn| {
            Box::pin(async move {
                let principal = Principal::authenticate(&mut *conn, &token).await?;
                let mut forms = SociodemographicRepo::new(&mut *conn);
                forms.get_for_update(id).await?;
                principal.require(Permission::ChangeFormData)?;
                let form = forms.update(id, &patch).await?;
                tracing::info!(form_id = id, changed_by = principal.user_id, "sociodemographic evaluation updated");
                Ok::<_, ApiError>(form)
            })
        })
        .await?;

    Ok(Json(form.into()))
}

/// DELETE /forms/sociodemographic-evaluation/{id}
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
                let mut forms = SociodemographicRepo::new(&mut *conn);
                forms.get_for_update(id).await?;
                principal.require(Permission::ChangeFormData)?;
                forms.delete(id).await?;
                tracing::info!(form_id = id, deleted_by = principal.user_id, "sociodemographic evaluation deleted");
                Ok::<_, ApiError>(())
            })
        })
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/forms/sociodemographic-evaluation", post(create_form))
        .route(
            "/forms/sociodemographic-evaluation/{id}",
            get(get_form).patch(update_form).delete(delete_form),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn create_request() -> CreateSociodemographicRequest {
        serde_json::from_value(json!({
            "user_id": 3,
            "civil_status": "Casado(a)",
            "lives_with_status": "Cônjuge",
            "education": "Segundo Grau",
            "occupational_status": "Aposentado(a)",
            "last_job": "Motorista",
            "is_sick": true,
            "diseases": ["Hipertensão"],
            "is_medicated": false
        }))
        .unwrap()
    }

    #[test]
    fn omitted_nullable_fields_are_null() {
        let fields = create_request().validate().unwrap();
        assert_eq!(fields.civil_status, CivilStatus::Married);
        assert_eq!(fields.current_job, None);
        assert_eq!(fields.last_job.as_deref(), Some("Motorista"));
        assert_eq!(fields.medicines, None);
    }

    #[test]
    fn create_request_field_errors() {
        let mut req = create_request();
        req.education = "Doutorado".into();
        assert!(matches!(
            req.validate().unwrap_err(),
            ValidationError::InvalidVariant { field: "education", .. }
        ));

        let mut req = create_request();
        req.medicines = Some(vec![]);
        assert!(matches!(
            req.validate().unwrap_err(),
            ValidationError::Empty { field: "medicines" }
        ));

        let mut req = create_request();
        req.current_job = Some("   ".into());
        assert!(req.validate().is_err());

        let mut req = create_request();
        req.user_id = -4;
        assert!(req.validate().is_err());
    }

    #[test]
    fn non_boolean_flag_is_rejected_when_decoding() {
        let result = serde_json::from_value::<CreateSociodemographicRequest>(json!({
            "user_id": 3,
            "civil_status": "Casado(a)",
            "lives_with_status": "Cônjuge",
            "education": "Segundo Grau",
            "occupational_status": "Aposentado(a)",
            "is_sick": "sim",
            "is_medicated": false
        }));
        assert!(result.is_err());
    }

    #[test]
    fn update_can_clear_a_list() {
        let req: UpdateSociodemographicRequest =
            serde_json::from_value(json!({ "is_sick": false, "diseases": null })).unwrap();
        let patch = req.validate().unwrap();
        assert_eq!(patch.is_sick, Some(false));
        assert_eq!(patch.diseases, Some(None));
        assert_eq!(patch.medicines, None);
    }

    #[test]
    fn empty_or_unknown_update_is_rejected() {
        let req: UpdateSociodemographicRequest = serde_json::from_str("{}").unwrap();
        assert!(matches!(
            req.validate().unwrap_err(),
            ValidationError::Empty { field: "body" }
        ));

        assert!(serde_json::from_str::<UpdateSociodemographicRequest>(r#"{"gender": "Feminino"}"#).is_err());
    }
}
