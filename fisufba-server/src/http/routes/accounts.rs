//! Account endpoints

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::self_link;
use crate::db::{NewUser, PatientSearch, User, UserPatch, UserRepo};
use crate::http::auth::Principal;
use crate::http::error::ApiError;
use crate::http::extractors::{SessionToken, ValidId, ValidJson, ValidQuery};
use crate::http::server::AppState;
use crate::models::{
    Cpf, DisplayName, Email, GroupName, Paginated, Pagination, PaginationParams, Password,
    PasswordHash, Permission, Phone, SearchPrefix, ValidationError,
};

/// Create account request
#[derive(Deserialize)]
pub struct CreateAccountRequest {
    pub cpf: String,
    pub password: String,
    pub display_name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub groups: Vec<String>,
}

/// Partial update; an explicit `null` clears `phone` or `email`
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateAccountRequest {
    pub cpf: Option<String>,
    pub password: Option<String>,
    pub display_name: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub email: Option<Option<String>>,
}

/// Distinguish a missing field (`None`) from an explicit null (`Some(None)`).
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Search query parameters
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub cpf: Option<String>,
    pub phone: Option<String>,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Account response
#[derive(Serialize)]
pub struct AccountResponse {
    #[serde(rename = "_links")]
    pub links: Value,
    pub id: i64,
    pub cpf: String,
    pub display_name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub is_active: bool,
    pub is_verified: bool,
    pub last_login: Option<String>,
    pub created_at: String,
    pub groups: Vec<GroupName>,
}

impl AccountResponse {
    fn new(user: User, groups: BTreeSet<GroupName>) -> Self {
        Self {
            links: self_link(format!("/accounts/{}", user.id)),
            id: user.id,
            cpf: user.cpf().masked(),
            display_name: user.display_name,
            phone: user.phone,
            email: user.email,
            is_active: user.is_active,
            is_verified: user.verified_at.is_some(),
            last_login: user.last_login.map(|t| t.to_rfc3339()),
            created_at: user.created_at.to_rfc3339(),
            groups: groups.into_iter().collect(),
        }
    }
}

/// One search hit
#[derive(Serialize)]
pub struct PatientSummary {
    pub id: i64,
    pub cpf: String,
    pub display_name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl From<User> for PatientSummary {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            cpf: user.cpf().masked(),
            display_name: user.display_name,
            phone: user.phone,
            email: user.email,
        }
    }
}

/// Parse group names, rejecting unknown and repeated ones.
fn parse_groups(names: &[String]) -> Result<BTreeSet<GroupName>, ValidationError> {
    if names.is_empty() {
        return Err(ValidationError::Empty { field: "groups" });
    }
    let mut groups = BTreeSet::new();
    for name in names {
        let group: GroupName = name.parse()?;
        if !groups.insert(group) {
            return Err(ValidationError::Duplicate {
                field: "groups",
                value: name.clone(),
            });
        }
    }
    Ok(groups)
}

fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

async fn hash_password(password: Password) -> Result<PasswordHash, ApiError> {
    tokio::task::spawn_blocking(move || password.hash())
        .await
        .map_err(|e| ApiError::internal(format!("password hashing panicked: {e}")))?
        .map_err(|e| ApiError::internal(format!("password hashing failed: {e}")))
}

/// Validated create request; the password is hashed once authorized
struct NewAccount {
    cpf: Cpf,
    password: Password,
    display_name: DisplayName,
    phone: Option<Phone>,
    email: Option<Email>,
    groups: BTreeSet<GroupName>,
}

impl TryFrom<CreateAccountRequest> for NewAccount {
    type Error = ValidationError;

    fn try_from(req: CreateAccountRequest) -> Result<Self, Self::Error> {
        Ok(Self {
            cpf: Cpf::new(&req.cpf)?,
            password: Password::new(&req.password)?,
            display_name: DisplayName::new(&req.display_name)?,
            phone: req.phone.as_deref().map(Phone::new).transpose()?,
            email: req.email.as_deref().map(Email::new).transpose()?,
            groups: parse_groups(&req.groups)?,
        })
    }
}

/// POST /accounts - create an account in one or more groups
async fn create_account(
    State(state): State<Arc<AppState>>,
    token: SessionToken,
    ValidJson(req): ValidJson<CreateAccountRequest>,
) -> Result<(StatusCode, Json<AccountResponse>), ApiError> {
    let account = NewAccount::try_from(req)?;

    let response = state
        .gateway
        .transact(move |conn| {
            Box::pin(async move {
                let principal = Principal::authenticate(&mut *conn, &token).await?;
                principal.require_all(account.groups.iter().copied().map(Permission::Create))?;

                let new = NewUser {
                    cpf: account.cpf,
                    password: hash_password(account.password).await?,
                    display_name: account.display_name,
                    phone: account.phone,
                    email: account.email,
                };
                let mut users = UserRepo::new(&mut *conn);
                let user = users.create(&new).await?;
                users.add_to_groups(user.id, &account.groups).await?;

                tracing::info!(
                    user_id = user.id,
                    created_by = principal.user_id,
                    groups = ?account.groups,
                    "account created"
                );
                Ok::<_, ApiError>(AccountResponse::new(user, account.groups))
            })
        })
        .await?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /accounts/{id} - own account, or any account the caller may read
async fn get_account(
    State(state): State<Arc<AppState>>,
    token: SessionToken,
    ValidId(id): ValidId,
) -> Result<Json<AccountResponse>, ApiError> {
    let response = state
        .gateway
        .transact(move |conn| {
            Box::pin(async move {
                let principal = Principal::authenticate(&mut *conn, &token).await?;
                let mut users = UserRepo::new(&mut *conn);
                let user = users.get(id).await?;
                let groups = users.group_names(id).await?;
                if principal.user_id != id {
                    principal.require_all(groups.iter().copied().map(Permission::ReadData))?;
                }
                Ok::<_, ApiError>(AccountResponse::new(user, groups))
            })
        })
        .await?;

    Ok(Json(response))
}

/// PATCH /accounts/{id} - partial update
async fn update_account(
    State(state): State<Arc<AppState>>,
    token: SessionToken,
    ValidId(id): ValidId,
    ValidJson(req): ValidJson<UpdateAccountRequest>,
) -> Result<Json<AccountResponse>, ApiError> {
    let cpf = req.cpf.as_deref().map(Cpf::new).transpose()?;
    let password = req.password.as_deref().map(Password::new).transpose()?;
    let display_name = req.display_name.as_deref().map(DisplayName::new).transpose()?;
    let phone = req
        .phone
        .map(|p| p.as_deref().map(Phone::new).transpose())
        .transpose()?;
    let email = req
        .email
        .map(|e| e.as_deref().map(Email::new).transpose())
        .transpose()?;

    let mut patch = UserPatch {
        cpf,
        password: None,
        display_name,
        phone,
        email,
    };
    if patch.is_empty() && password.is_none() {
        return Err(ValidationError::Empty { field: "body" }.into());
    }

    let response = state
        .gateway
        .transact(move |conn| {
            Box::pin(async move {
                let principal = Principal::authenticate(&mut *conn, &token).await?;
                let mut users = UserRepo::new(&mut *conn);
                users.get_for_update(id).await?;
                let groups = users.group_names(id).await?;
                principal.require_all(groups.iter().copied().map(Permission::ChangeData))?;

                if let Some(password) = password {
                    patch.password = Some(hash_password(password).await?);
                }
                let user = users.update(id, &patch).await?;

                tracing::info!(user_id = id, changed_by = principal.user_id, "account updated");
                Ok::<_, ApiError>(AccountResponse::new(user, groups))
            })
        })
        .await?;

    Ok(Json(response))
}

/// DELETE /accounts/{id}
async fn delete_account(
    State(state): State<Arc<AppState>>,
    token: SessionToken,
    ValidId(id): ValidId,
) -> Result<StatusCode, ApiError> {
    state
        .gateway
        .transact(move |conn| {
            Box::pin(async move {
                let principal = Principal::authenticate(&mut *conn, &token).await?;
                let mut users = UserRepo::new(&mut *conn);
                users.get_for_update(id).await?;
                let groups = users.group_names(id).await?;
                principal.require_all(groups.iter().copied().map(Permission::ChangeData))?;
                users.delete(id).await?;

                tracing::info!(user_id = id, deleted_by = principal.user_id, "account deleted");
                Ok::<_, ApiError>(())
            })
        })
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// GET /accounts/search - patients by cpf/phone prefix or name/email substring
async fn search_patients(
    State(state): State<Arc<AppState>>,
    token: SessionToken,
    ValidQuery(params): ValidQuery<SearchParams>,
) -> Result<Json<Paginated<PatientSummary>>, ApiError> {
    let filter = PatientSearch {
        cpf: optional_text(params.cpf)
            .map(|s| SearchPrefix::new(&s, "cpf"))
            .transpose()?,
        phone: optional_text(params.phone)
            .map(|s| SearchPrefix::new(&s, "phone"))
            .transpose()?,
        display_name: optional_text(params.display_name),
        email: optional_text(params.email),
    };
    let page = Pagination::from(PaginationParams {
        page: params.page,
        per_page: params.per_page,
    });

    let result = state
        .gateway
        .transact(move |conn| {
            Box::pin(async move {
                let principal = Principal::authenticate(&mut *conn, &token).await?;
                principal.require(Permission::SearchPatient)?;
                let found = UserRepo::new(&mut *conn)
                    .search_patients(&filter, page)
                    .await?;
                Ok::<_, ApiError>(found)
            })
        })
        .await?;

    Ok(Json(result.map(PatientSummary::from)))
}

/// Account routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/accounts", post(create_account))
        .route("/accounts/search", get(search_patients))
        .route(
            "/accounts/{id}",
            get(get_account).patch(update_account).delete(delete_account),
        )
}
