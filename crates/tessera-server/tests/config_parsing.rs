use std::{env, fs, time::Duration};

use tessera_auth::types::GrantType;
use tessera_server::config::loader::load_config;

#[test]
fn config_parsing_and_env_overrides_and_validation() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("tessera.toml");

    let toml_content = r#"
[server]
host = "127.0.0.1"
port = 8081
body_limit_bytes = 4096

[logging]
level = "debug"

[auth]
issuer = "https://sso.example.com/cas"

[auth.signing]
algorithm = "ES384"

[auth.oauth.access_token]
time_to_kill = "30m"
sovereign = false

[auth.oauth.device_token]
refresh_interval = "5s"

[[bootstrap.clients]]
client_id = "web"
secret = "web-secret"
service_id_pattern = "https://web\\.example\\.com/.*"
allowed_grant_types = ["authorization_code", "refresh_token"]
jwt_access_token = true

[[bootstrap.clients]]
client_id = "tv"
service_id_pattern = "urn:tv"
allowed_grant_types = ["urn:ietf:params:oauth:grant-type:device_code"]

[[bootstrap.users]]
username = "alice"
password = "wonderland"
"#;
    fs::write(&path, toml_content).expect("write toml");

    // 1) Valid config parses
    let cfg = load_config(path.to_str()).expect("should parse config");
    assert_eq!(cfg.server.port, 8081);
    assert_eq!(cfg.server.body_limit_bytes, 4096);
    assert_eq!(cfg.logging.level, "debug");
    assert_eq!(cfg.auth.issuer, "https://sso.example.com/cas");
    assert_eq!(cfg.auth.signing.algorithm, "ES384");
    assert_eq!(
        cfg.auth.oauth.access_token.time_to_kill,
        Duration::from_secs(30 * 60)
    );
    assert!(!cfg.auth.oauth.access_token.sovereign);
    assert_eq!(
        cfg.auth.oauth.device_token.refresh_interval,
        Duration::from_secs(5)
    );
    // untouched sections keep their defaults
    assert_eq!(cfg.auth.oauth.code.time_to_kill, Duration::from_secs(30));
    assert_eq!(cfg.auth.oauth.device_user_code.user_code_length, 8);

    assert_eq!(cfg.bootstrap.clients.len(), 2);
    let web = &cfg.bootstrap.clients[0];
    assert_eq!(web.secret.as_deref(), Some("web-secret"));
    assert!(web.allowed_grant_types.contains(&GrantType::RefreshToken));
    assert!(web.generate_refresh_token);
    assert!(
        cfg.bootstrap.clients[1]
            .allowed_grant_types
            .contains(&GrantType::DeviceCode)
    );
    assert_eq!(cfg.bootstrap.users[0].username, "alice");

    // 2) Env override should win over file
    unsafe {
        env::set_var("TESSERA__SERVER__PORT", "9090");
    }
    let cfg_env = load_config(path.to_str()).expect("should parse config with env overrides");
    assert_eq!(cfg_env.server.port, 9090);
    unsafe {
        env::remove_var("TESSERA__SERVER__PORT");
    }

    // 3) Missing file falls back to defaults
    let missing = dir.path().join("missing.toml");
    let defaults = load_config(missing.to_str()).expect("defaults should validate");
    assert_eq!(defaults.server.port, 8443);

    // 4) Invalid auth config should error
    let invalid_path = dir.path().join("invalid.toml");
    let invalid_toml = r#"
[auth.oauth.device_user_code]
user_code_length = 2
"#;
    fs::write(&invalid_path, invalid_toml).expect("write invalid toml");
    let err = load_config(invalid_path.to_str()).expect_err("expected validation error");
    assert!(err.contains("user_code_length"));

    let invalid_path = dir.path().join("zero.toml");
    fs::write(&invalid_path, "[auth.oauth.code]\ntime_to_kill = \"0s\"\n").expect("write");
    let err = load_config(invalid_path.to_str()).expect_err("expected validation error");
    assert!(err.contains("oauth.code.time_to_kill"));
}
