//! Route handlers organized by resource

pub mod index;
pub mod health;
pub mod sessions;
pub mod accounts;
pub mod patient_information;
pub mod sociodemographic;

use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};
use sqlx::PgConnection;

use crate::db::UserRepo;
use crate::http::error::ApiError;
use crate::models::{GroupName, ValidationError};

/// HAL `_links` object with just a `self` link
pub(crate) fn self_link(href: impl Into<String>) -> Value {
    json!({ "self": { "href": href.into() } })
}

/// Forms are only ever filled in for patient accounts.
pub(crate) async fn require_patient(conn: &mut PgConnection, user_id: i64) -> Result<(), ApiError> {
    let mut users = UserRepo::new(conn);
    users.get(user_id).await?;
    if !users.group_names(user_id).await?.contains(&GroupName::Patient) {
        return Err(ValidationError::InvalidFormat {
            field: "user_id",
            reason: "must reference a patient account",
        }
        .into());
    }
    Ok(())
}

/// `user_id` in a form body must be a positive integer.
pub(crate) fn form_owner(user_id: i64) -> Result<i64, ValidationError> {
    if user_id <= 0 {
        return Err(ValidationError::InvalidFormat {
            field: "user_id",
            reason: "must be a positive integer",
        });
    }
    Ok(user_id)
}

/// Tell an explicit `null` (`Some(None)`) apart from an absent field (`None`).
/// Pair with `#[serde(default)]`.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "nullable")]
        job: Option<Option<String>>,
    }

    #[test]
    fn nullable_distinguishes_null_from_absent() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.job, None);
        let null: Patch = serde_json::from_str(r#"{"job": null}"#).unwrap();
        assert_eq!(null.job, Some(None));
        let set: Patch = serde_json::from_str(r#"{"job": "Pedreiro"}"#).unwrap();
        assert_eq!(set.job, Some(Some("Pedreiro".into())));
    }

    #[test]
    fn form_owner_must_be_positive() {
        assert_eq!(form_owner(3).unwrap(), 3);
        assert!(form_owner(0).is_err());
        assert!(form_owner(-1).is_err());
    }
}
