//! 集成测试共用的工具

#![allow(dead_code)]

use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header, encode};
use mfi_resilience::auth::{
    CredentialStore, HttpAuthApi, LoginRedirect, Navigator, TokenLifecycleManager,
};
use mfi_resilience::config::AuthConfig;
use serde_json::json;
use std::sync::{Arc, Mutex, Once};
use wiremock::MockServer;

static INIT: Once = Once::new();

/// 初始化测试日志
pub fn init_test_env() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// 用 HS256 签发一个 `secs` 秒后过期的令牌（客户端不校验签名）
pub fn mint_token(secs: i64, role: &str) -> String {
    let claims = json!({
        "exp": Utc::now().timestamp() + secs,
        "sub": "42",
        "email": "officer@mfi.example",
        "role": role,
        "branch": "Kampala Central",
        "state": "active",
    });
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(b"integration-test-secret"),
    )
    .unwrap()
}

/// 一小时后过期
pub fn fresh_token() -> String {
    mint_token(3600, "loan_officer")
}

/// 已进入 5 分钟缓冲区
pub fn expiring_token() -> String {
    mint_token(60, "loan_officer")
}

/// 记录跳转的导航器，跳转后停在登录页
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    path: Mutex<Option<String>>,
    visits: Mutex<Vec<LoginRedirect>>,
}

impl RecordingNavigator {
    pub fn at(path: &str) -> Self {
        Self {
            path: Mutex::new(Some(path.to_string())),
            visits: Mutex::new(Vec::new()),
        }
    }

    pub fn visits(&self) -> Vec<LoginRedirect> {
        self.visits.lock().unwrap().clone()
    }

    pub fn move_to(&self, path: &str) {
        *self.path.lock().unwrap() = Some(path.to_string());
    }
}

impl Navigator for RecordingNavigator {
    fn current_path(&self) -> Option<String> {
        self.path.lock().unwrap().clone()
    }

    fn navigate(&self, target: &LoginRedirect) {
        self.visits.lock().unwrap().push(target.clone());
        self.move_to(&target.login_route);
    }
}

/// 指向 mock 服务器的认证配置
pub fn auth_config(server: &MockServer) -> AuthConfig {
    AuthConfig {
        base_url: format!("{}/api", server.uri()),
        ..AuthConfig::default()
    }
}

/// 使用真实 HTTP 认证后端、内存凭证存储的生命周期管理器
pub fn http_lifecycle(
    server: &MockServer,
    navigator: Arc<RecordingNavigator>,
) -> (TokenLifecycleManager, CredentialStore) {
    init_test_env();
    let config = auth_config(server);
    let store = CredentialStore::in_memory();
    let manager = TokenLifecycleManager::new(
        store.clone(),
        Arc::new(HttpAuthApi::new(&config)),
        navigator,
        config,
    );
    (manager, store)
}
