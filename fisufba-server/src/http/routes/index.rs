//! API index

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};

/// GET / - HAL links to the top-level resources
async fn index() -> Json<Value> {
    Json(json!({
        "_links": {
            "self": { "href": "/" },
            "health": { "href": "/health" },
            "login": { "href": "/accounts/login" },
            "logout": { "href": "/accounts/logout" },
            "accounts": { "href": "/accounts" },
            "account": { "href": "/accounts/{id}", "templated": true },
            "search": { "href": "/accounts/search{?cpf,phone,display_name,email,page,per_page}", "templated": true },
            "forms": { "href": "/forms" }
        }
    }))
}

/// GET /forms - HAL links to every form resource
async fn forms_index() -> Json<Value> {
    Json(json!({
        "_links": {
            "self": { "href": "/forms" },
            "patient_information": { "href": "/forms/patient-information" },
            "patient_information_view": { "href": "/forms/patient-information/{id}", "templated": true },
            "sociodemographic_evaluation": { "href": "/forms/sociodemographic-evaluation" },
            "sociodemographic_evaluation_view": {
                "href": "/forms/sociodemographic-evaluation/{id}",
                "templated": true
            }
        }
    }))
}

pub fn router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/", get(index))
        .route("/forms", get(forms_index))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn index_links_itself() {
        let Json(body) = index().await;
        assert_eq!(body["_links"]["self"]["href"], "/");
        assert_eq!(body["_links"]["account"]["templated"], true);
        assert_eq!(body["_links"]["forms"]["href"], "/forms");
    }

    #[tokio::test]
    async fn forms_index_lists_each_form() {
        let Json(body) = forms_index().await;
        let links = body["_links"].as_object().unwrap();
        for rel in ["patient_information", "sociodemographic_evaluation"] {
            assert!(links.contains_key(rel), "{rel}");
            let view = &links[&format!("{rel}_view")];
            assert_eq!(view["templated"], true);
            assert!(view["href"].as_str().unwrap().ends_with("/{id}"));
        }
    }
}
