use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use reqwest::StatusCode;
use serde_json::Value;
use tessera_auth::types::{GrantType, ResponseType};
use tessera_server::{AppConfig, BootstrapClient, BootstrapUser, ServerBuilder};

const DEVICE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";

fn client(id: &str, secret: Option<&str>, pattern: &str) -> BootstrapClient {
    BootstrapClient {
        client_id: id.into(),
        secret: secret.map(Into::into),
        name: None,
        service_id_pattern: pattern.into(),
        allowed_grant_types: BTreeSet::new(),
        allowed_response_types: BTreeSet::new(),
        scopes: Vec::new(),
        jwt_access_token: false,
        generate_refresh_token: true,
        renew_refresh_token: false,
    }
}

fn config() -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.auth.signing.algorithm = "ES384".into();
    cfg.auth.oauth.device_token.refresh_interval = Duration::ZERO;

    let mut web = client("web", Some("web-secret"), "https://web\\.example\\.com/.*");
    web.allowed_grant_types = BTreeSet::from([GrantType::ClientCredentials]);
    web.jwt_access_token = true;

    let mut tv = client("tv", None, "urn:tv");
    tv.allowed_grant_types = BTreeSet::from([GrantType::DeviceCode, GrantType::RefreshToken]);
    tv.allowed_response_types = BTreeSet::from([ResponseType::DeviceCode]);

    cfg.bootstrap.clients = vec![web, tv];
    cfg.bootstrap.users = vec![BootstrapUser {
        username: "alice".into(),
        password: "wonderland".into(),
        attributes: BTreeMap::from([(
            "email".to_string(),
            Value::String("alice@example.com".into()),
        )]),
    }];
    cfg
}

/// Starts the server on an ephemeral port and returns its base URL.
async fn spawn_server() -> String {
    let server = ServerBuilder::new()
        .with_config(config())
        .build()
        .expect("server builds");
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let app = server.router();
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn client_credentials_jwt_introspection_and_revocation() {
    let base = spawn_server().await;
    let http = reqwest::Client::new();

    let health = http.get(format!("{base}/healthz")).send().await.unwrap();
    assert_eq!(health.status(), StatusCode::OK);

    let res = http
        .post(format!("{base}/oauth2.0/token"))
        .basic_auth("web", Some("web-secret"))
        .form(&[
            ("grant_type", "client_credentials"),
            ("service", "https://web.example.com/api"),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["cache-control"], "no-store");
    let body: Value = res.json().await.unwrap();
    let token = body["access_token"].as_str().unwrap().to_string();
    assert_eq!(token.split('.').count(), 3);
    assert!(body.get("refresh_token").is_none());

    let introspect = |token: String| {
        let http = http.clone();
        let url = format!("{base}/oauth2.0/introspect");
        async move {
            http.post(url)
                .basic_auth("web", Some("web-secret"))
                .form(&[("token", token.as_str())])
                .send()
                .await
                .unwrap()
                .json::<Value>()
                .await
                .unwrap()
        }
    };

    let info = introspect(token.clone()).await;
    assert_eq!(info["active"], true);
    assert_eq!(info["client_id"], "web");
    assert!(info["jti"].as_str().unwrap().starts_with("AT-"));

    let jwks: Value = http
        .get(format!("{base}/oauth2.0/jwks"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(jwks["keys"][0]["alg"], "ES384");

    let res = http
        .post(format!("{base}/oauth2.0/revoke"))
        .basic_auth("web", Some("web-secret"))
        .form(&[("token", token.as_str())])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(introspect(token).await["active"], false);
}

#[tokio::test]
async fn device_flow_end_to_end() {
    let base = spawn_server().await;
    let http = reqwest::Client::new();

    let device: Value = http
        .post(format!("{base}/oauth2.0/device"))
        .form(&[("client_id", "tv"), ("scope", "openid")])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let device_code = device["device_code"].as_str().unwrap().to_string();
    let user_code = device["user_code"].as_str().unwrap().to_string();
    assert_eq!(
        device["verification_uri"],
        "http://localhost:8443/sso/oauth2.0/device"
    );

    let poll = || {
        http.post(format!("{base}/oauth2.0/token")).form(&[
            ("grant_type", DEVICE_GRANT),
            ("client_id", "tv"),
            ("device_code", device_code.as_str()),
        ])
    };

    let res = poll().send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let err: Value = res.json().await.unwrap();
    assert_eq!(err["error"], "authorization_pending");

    let res = http
        .post(format!("{base}/oauth2.0/device/approve"))
        .basic_auth("alice", Some("wonderland"))
        .form(&[("user_code", user_code.as_str())])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = poll().send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let tokens: Value = res.json().await.unwrap();
    assert_eq!(tokens["scope"], "openid");
    assert!(tokens["refresh_token"].as_str().unwrap().starts_with("RT-"));
    let access_token = tokens["access_token"].as_str().unwrap();

    let profile: Value = http
        .get(format!("{base}/oauth2.0/profile"))
        .bearer_auth(access_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(profile["id"], "alice");
    assert_eq!(profile["client_id"], "tv");
    assert_eq!(profile["attributes"]["email"], "alice@example.com");

    // the device code is single use
    let res = poll().send().await.unwrap();
    let err: Value = res.json().await.unwrap();
    assert_eq!(err["error"], "invalid_grant");
}
