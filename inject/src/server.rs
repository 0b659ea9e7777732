use crate::config::Config;
use crate::error::{InjectError, Result};
use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use inject_api::OptionStore;
use inject_domain::Limits;
use inject_infra::{
    Cache, CooldownRateLimiter, IpAllowList, JsonFileOptionStore, LocalScriptStorage, MemoryCache,
    NetworkOptionStore, RateLimiter, RedisCache, ScriptStorage,
};
use inject_service::{
    AccountService, AuthService, DefaultAccountService, DefaultPasswordService, DefaultScriptService,
    ManageCapabilityChecker, PasswordService, ScriptService, ScriptServiceSettings,
};
use inject_web::{AppState, BasicAuthProvider};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// 创建应用路由
pub fn create_router(state: AppState) -> Router {
    // ServiceBuilder中先添加的层在外：IP白名单 -> 认证 -> handler
    let api = api_routes().layer(
        ServiceBuilder::new()
            .layer(from_fn_with_state(state.clone(), inject_web::ip_allow_middleware))
            .layer(from_fn_with_state(state.clone(), inject_web::auth_middleware))
            .layer(DefaultBodyLimit::max(state.body_limit)),
    );

    Router::new()
        .route("/health", get(inject_web::health))
        .nest("/api/v1", api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// REST API路由，挂载在 `/api/v1` 下
fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/scripts/:location", get(inject_web::get_script).put(inject_web::save_script))
        .route("/scripts/:location/history", get(inject_web::script_history))
        .route("/scripts/:location/rollback", post(inject_web::rollback_script))
        .route("/urls/:location", get(inject_web::get_urls).put(inject_web::save_urls))
        .route("/urls/:location/history", get(inject_web::urls_history))
        .route("/urls/:location/rollback", post(inject_web::rollback_urls))
        .route("/files", get(inject_web::list_files).post(inject_web::save_file))
        .route("/files/upload", post(inject_web::upload_file))
        .route("/files/:id", get(inject_web::get_file).delete(inject_web::delete_file))
        .route("/files/:id/history", get(inject_web::file_history))
        .route("/files/:id/rollback", post(inject_web::rollback_file))
        .route("/activity", get(inject_web::list_activity).delete(inject_web::clear_activity))
}

/// 打开选项存储；配置了网络默认值时叠加一层只读回退
async fn open_option_store(config: &Config) -> Result<Arc<dyn OptionStore>> {
    let site: Arc<dyn OptionStore> = Arc::new(JsonFileOptionStore::open(config.storage.options_path()).await?);
    match &config.storage.network_defaults {
        Some(path) => {
            let network = Arc::new(JsonFileOptionStore::open(path.clone()).await?);
            info!(path = %path.display(), "Network defaults enabled");
            Ok(Arc::new(NetworkOptionStore::new(site, network)))
        }
        None => Ok(site),
    }
}

fn open_cache(config: &Config) -> Result<Arc<dyn Cache>> {
    match config.cache.cache_type.as_str() {
        "memory" => Ok(Arc::new(MemoryCache::new(config.cache.memory_max_size))),
        "redis" => {
            let cache = RedisCache::open(&config.cache.redis_url).map_err(|e| InjectError::Cache(e.to_string()))?;
            Ok(Arc::new(cache))
        }
        other => Err(InjectError::Cache(format!("unknown cache type: {}", other))),
    }
}

/// 初始化应用状态
pub async fn init_app_state(config: &Config) -> Result<AppState> {
    let limits = Limits::from(&config.limits);
    let options = open_option_store(config).await?;

    // 托管文件存储
    let storage: Arc<dyn ScriptStorage> = Arc::new(LocalScriptStorage::new(config.storage.files_dir.clone()));

    // 保存冷却
    let rate_limiter: Arc<dyn RateLimiter> =
        Arc::new(CooldownRateLimiter::new(open_cache(config)?, limits.rate_limit_seconds));

    let script_service: Arc<dyn ScriptService> = Arc::new(DefaultScriptService::new(
        options.clone(),
        storage,
        rate_limiter,
        Arc::new(ManageCapabilityChecker),
        ScriptServiceSettings {
            limits,
            files_base_url: config.storage.files_base_url.clone(),
        },
    )?);

    // 账户与应用密码
    let password_service: Arc<dyn PasswordService> = Arc::new(
        DefaultPasswordService::new(config.security.password_algorithm)
            .with_bcrypt_cost(config.security.bcrypt_cost),
    );
    let account_service: Arc<dyn AccountService> =
        Arc::new(DefaultAccountService::new(options, password_service));
    if let Some(password) = account_service.ensure_admin(&config.security.admin_login).await? {
        warn!(
            login = %config.security.admin_login,
            application_password = %password,
            "No accounts found, created administrator; store this application password now"
        );
    }

    let auth_service =
        Arc::new(AuthService::new().with_provider(Box::new(BasicAuthProvider::new(account_service))));

    let ip_allow_list = Arc::new(IpAllowList::parse(&config.security.allowed_ips)?);
    if !config.security.rest_enabled {
        warn!("REST API is disabled by configuration");
    }

    Ok(AppState {
        script_service,
        auth_service,
        ip_allow_list,
        rest_enabled: config.security.rest_enabled,
        trust_proxy_headers: config.security.trust_proxy_headers,
        body_limit: config.server.max_request_body_size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use axum::response::Response;
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use inject_api::MANAGE_CAPABILITY;
    use inject_service::PasswordAlgorithm;
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;

    struct TestApp {
        _dir: TempDir,
        router: Router,
        authorization: String,
    }

    fn test_config(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.storage.data_dir = dir.path().join("data");
        config.storage.files_dir = dir.path().join("files");
        config.storage.files_base_url = "https://example.com/inject-files".to_string();
        config.security.bcrypt_cost = 4;
        config
    }

    /// 预先创建一个带管理权限的账户，再按配置初始化
    async fn setup_with(configure: impl FnOnce(&mut Config)) -> TestApp {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir);
        configure(&mut config);

        let options = Arc::new(JsonFileOptionStore::open(config.storage.options_path()).await.unwrap());
        let accounts = DefaultAccountService::new(
            options,
            Arc::new(DefaultPasswordService::new(PasswordAlgorithm::Bcrypt).with_bcrypt_cost(4)),
        );
        accounts
            .create_account("editor", "Editor", vec![MANAGE_CAPABILITY.to_string()])
            .await
            .unwrap();
        let (plain, _) = accounts.create_application_password("editor", "tests").await.unwrap();

        let state = init_app_state(&config).await.unwrap();
        TestApp {
            _dir: dir,
            router: create_router(state),
            authorization: format!("Basic {}", STANDARD.encode(format!("editor:{}", plain))),
        }
    }

    async fn setup() -> TestApp {
        setup_with(|_| {}).await
    }

    impl TestApp {
        async fn send(&self, method: &str, uri: &str, body: Option<Value>) -> Response {
            let mut builder = Request::builder()
                .method(method)
                .uri(uri)
                .header(header::AUTHORIZATION, &self.authorization);
            let body = match body {
                Some(value) => {
                    builder = builder.header(header::CONTENT_TYPE, "application/json");
                    Body::from(value.to_string())
                }
                None => Body::empty(),
            };
            self.router.clone().oneshot(builder.body(body).unwrap()).await.unwrap()
        }
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_needs_no_credentials() {
        let app = setup().await;
        let response = app
            .router
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_missing_or_wrong_credentials_are_rejected() {
        let app = setup().await;
        let response = app
            .router
            .clone()
            .oneshot(Request::builder().uri("/api/v1/scripts/head").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));
        assert_eq!(json_body(response).await["code"], "unauthorized");

        let wrong = format!("Basic {}", STANDARD.encode("editor:not-the-password"));
        let response = app
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/scripts/head")
                    .header(header::AUTHORIZATION, wrong)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_save_and_read_script() {
        let app = setup().await;

        let response = app
            .send(
                "PUT",
                "/api/v1/scripts/head",
                Some(json!({
                    "content": "<script>console.log('hi');</script>",
                    "conditions": "{\"logic\":\"and\",\"rules\":[{\"type\":\"logged_in\"}]}"
                })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["content"], "console.log('hi');");
        assert_eq!(body["warnings"].as_array().map(Vec::len), Some(2));
        assert!(body["message"].as_str().unwrap().contains("saved"));

        let body = json_body(app.send("GET", "/api/v1/scripts/head", None).await).await;
        assert_eq!(body["content"], "console.log('hi');");
        assert_eq!(body["location"], "head");

        let body = json_body(app.send("GET", "/api/v1/scripts/head/history", None).await).await;
        assert_eq!(body["entries"].as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn test_structured_errors() {
        let app = setup().await;

        let response = app.send("GET", "/api/v1/scripts/sidebar", None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["code"], "invalid_location");

        let response = app
            .send("POST", "/api/v1/scripts/head/rollback", Some(json!({ "index": 0 })))
            .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = json_body(response).await;
        assert_eq!(body["code"], "current_state");
        assert_eq!(body["httpStatus"], 409);

        let response = app
            .send("PUT", "/api/v1/scripts/footer", Some(json!({ "content": "<?php echo 1; ?>" })))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["code"], "invalid_content");

        let response = app.send("GET", "/api/v1/files/missing", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_rate_limit_sets_retry_after() {
        let app = setup().await;
        let first = app
            .send("PUT", "/api/v1/scripts/footer", Some(json!({ "content": "a();" })))
            .await;
        assert_eq!(first.status(), StatusCode::OK);

        let second = app
            .send("PUT", "/api/v1/scripts/footer", Some(json!({ "content": "b();" })))
            .await;
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(second.headers().contains_key(header::RETRY_AFTER));
        let body = json_body(second).await;
        assert_eq!(body["code"], "rate_limited");
        assert!(body["retryAfter"].as_u64().unwrap() >= 1);
    }

    #[tokio::test]
    async fn test_file_lifecycle_over_http() {
        let app = setup_with(|config| config.limits.rate_limit_seconds = 0).await;

        let response = app
            .send(
                "POST",
                "/api/v1/files",
                Some(json!({ "label": "Tracker", "location": "footer", "content": "track();" })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["created"], true);
        assert_eq!(body["filename"], "tracker.js");
        let id = body["id"].as_str().unwrap().to_string();

        let body = json_body(app.send("GET", &format!("/api/v1/files/{}", id), None).await).await;
        assert_eq!(body["content"], "track();");

        let response = app.send("DELETE", &format!("/api/v1/files/{}", id), None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(app.send("GET", "/api/v1/files", None).await).await;
        assert_eq!(body["files"].as_array().map(Vec::len), Some(0));

        let response = app
            .send("POST", &format!("/api/v1/files/{}/rollback", id), Some(json!({ "index": 1 })))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(app.send("GET", &format!("/api/v1/files/{}", id), None).await).await;
        assert_eq!(body["content"], "track();");

        let body = json_body(app.send("GET", "/api/v1/activity", None).await).await;
        assert_eq!(body["entries"].as_array().map(Vec::len), Some(3));
    }

    #[tokio::test]
    async fn test_multipart_upload() {
        let app = setup().await;
        let boundary = "inject-boundary";
        let payload = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"location\"\r\n\r\nhead\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"Vendor Bundle.js\"\r\n\
             Content-Type: application/javascript\r\n\r\nvendor();\r\n--{b}--\r\n",
            b = boundary
        );
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/files/upload")
            .header(header::AUTHORIZATION, &app.authorization)
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", boundary))
            .body(Body::from(payload))
            .unwrap();
        let response = app.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["location"], "head");
        assert_eq!(body["label"], "Vendor Bundle");
        assert_eq!(body["content"], "vendor();");
    }

    #[tokio::test]
    async fn test_ip_allow_list_and_rest_switch() {
        let app = setup_with(|config| config.security.allowed_ips = vec!["10.0.0.0/8".to_string()]).await;
        let response = app.send("GET", "/api/v1/scripts/head", None).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(json_body(response).await["code"], "ip_not_allowed");

        let app = setup_with(|config| {
            config.security.allowed_ips = vec!["10.0.0.0/8".to_string()];
            config.security.trust_proxy_headers = true;
        })
        .await;
        let request = Request::builder()
            .uri("/api/v1/scripts/head")
            .header(header::AUTHORIZATION, &app.authorization)
            .header("x-forwarded-for", "10.1.2.3")
            .body(Body::empty())
            .unwrap();
        assert_eq!(app.router.clone().oneshot(request).await.unwrap().status(), StatusCode::OK);

        let app = setup_with(|config| config.security.rest_enabled = false).await;
        let response = app.send("GET", "/api/v1/scripts/head", None).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(json_body(response).await["code"], "rest_disabled");
    }

    #[tokio::test]
    async fn test_admin_bootstrap_on_empty_store() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        init_app_state(&config).await.unwrap();

        let options = Arc::new(JsonFileOptionStore::open(config.storage.options_path()).await.unwrap());
        let accounts = DefaultAccountService::new(
            options,
            Arc::new(DefaultPasswordService::new(PasswordAlgorithm::Bcrypt).with_bcrypt_cost(4)),
        );
        let admin = accounts.find_by_login("admin").await.unwrap().unwrap();
        assert!(admin.capabilities.iter().any(|c| c == MANAGE_CAPABILITY));
        assert_eq!(admin.application_passwords.len(), 1);
    }
}
