//! Token introspection endpoint handler (RFC 7662).
//!
//! ```text
//! POST /oauth2.0/introspect
//! Authorization: Basic <client_credentials>
//!
//! token=<token>&token_type_hint=access_token
//! ```
//!
//! Unknown, expired or undecodable tokens are reported as `{"active": false}`.

use axum::{
    Form,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Response,
};
use serde::Deserialize;

use super::{OAuthState, client_credentials, error_response, no_store};
use crate::error::AuthError;

/// Form parameters for the introspection endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct IntrospectionForm {
    #[serde(default)]
    pub token: String,

    /// Accepted and ignored; access tokens are looked up first either way.
    #[serde(default)]
    pub token_type_hint: Option<String>,

    #[serde(default)]
    pub client_id: Option<String>,

    #[serde(default)]
    pub client_secret: Option<String>,
}

pub async fn introspect_handler(
    State(state): State<OAuthState>,
    headers: HeaderMap,
    Form(form): Form<IntrospectionForm>,
) -> Response {
    if form.token.is_empty() {
        return error_response(&AuthError::invalid_request(
            "Missing required 'token' parameter",
        ));
    }
    let credentials = match client_credentials(&headers, form.client_id, form.client_secret) {
        Ok(credentials) => credentials,
        Err(e) => return error_response(&e),
    };
    match state.engine.introspect(&credentials, &form.token).await {
        Ok(response) => no_store(StatusCode::OK, response),
        Err(e) => error_response(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{WEB_SECRET, app, basic, send};
    use super::*;

    #[tokio::test]
    async fn test_introspection_over_http() {
        let app = app();
        let auth = basic("web", WEB_SECRET);
        let (_, _, body) = send(
            &app,
            "POST",
            "/token",
            Some(&auth),
            "grant_type=client_credentials&service=https%3A%2F%2Fweb.example.com%2Fapi",
        )
        .await;
        let token = body["access_token"].as_str().unwrap().to_string();

        let (status, _, body) =
            send(&app, "POST", "/introspect", Some(&auth), &format!("token={token}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["active"], true);
        assert_eq!(body["client_id"], "web");
        assert_eq!(body["sub"], "web");
        assert_eq!(body["token_type"], "access_token");
        assert!(body["exp"].as_i64().unwrap() > body["iat"].as_i64().unwrap());

        let (status, _, body) =
            send(&app, "POST", "/introspect", Some(&auth), "token=AT-unknown").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({ "active": false }));
    }

    #[tokio::test]
    async fn test_introspection_requires_client_auth() {
        let app = app();
        let (status, _, body) = send(
            &app,
            "POST",
            "/introspect",
            Some(&basic("web", "wrong")),
            "token=AT-1",
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "invalid_client");

        let (status, _, body) = send(&app, "POST", "/introspect", None, "client_id=tv").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_request");
    }
}
