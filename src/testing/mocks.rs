//! # 测试 Mock 对象

use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crate::auth::{AuthApi, LoginRedirect, Navigator};
use crate::error::{ClientError, Result};

/// mock 端点的预设应答
#[derive(Debug, Clone)]
pub enum MockReply {
    /// 2xx + JSON 响应体
    Json(Value),
    /// 非 2xx 状态码
    Status(u16),
    /// 传输层失败
    Network,
}

impl MockReply {
    fn into_result(self) -> Result<Value> {
        match self {
            Self::Json(body) => Ok(body),
            Self::Status(status) => Err(ClientError::http(status, "mock status")),
            Self::Network => Err(ClientError::network("mock connection refused")),
        }
    }
}

/// 可编排的认证后端，记录每个端点的调用次数
#[derive(Debug)]
pub struct MockAuthApi {
    login_reply: Mutex<MockReply>,
    refresh_reply: Mutex<MockReply>,
    logout_reply: Mutex<MockReply>,
    refresh_delay: Duration,
    logout_delay: Duration,
    login_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
    logout_calls: AtomicUsize,
}

impl Default for MockAuthApi {
    fn default() -> Self {
        Self {
            login_reply: Mutex::new(MockReply::Status(401)),
            refresh_reply: Mutex::new(MockReply::Status(401)),
            logout_reply: Mutex::new(MockReply::Json(Value::Null)),
            refresh_delay: Duration::ZERO,
            logout_delay: Duration::ZERO,
            login_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
        }
    }
}

impl MockAuthApi {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_login(self, reply: MockReply) -> Self {
        *self.login_reply.lock().unwrap_or_else(PoisonError::into_inner) = reply;
        self
    }

    #[must_use]
    pub fn with_refresh(self, reply: MockReply) -> Self {
        *self.refresh_reply.lock().unwrap_or_else(PoisonError::into_inner) = reply;
        self
    }

    #[must_use]
    pub fn with_logout(self, reply: MockReply) -> Self {
        *self.logout_reply.lock().unwrap_or_else(PoisonError::into_inner) = reply;
        self
    }

    #[must_use]
    pub const fn with_refresh_delay(mut self, delay: Duration) -> Self {
        self.refresh_delay = delay;
        self
    }

    #[must_use]
    pub const fn with_logout_delay(mut self, delay: Duration) -> Self {
        self.logout_delay = delay;
        self
    }

    /// 替换后续刷新调用的应答
    pub fn set_refresh(&self, reply: MockReply) {
        *self.refresh_reply.lock().unwrap_or_else(PoisonError::into_inner) = reply;
    }

    pub fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn logout_calls(&self) -> usize {
        self.logout_calls.load(Ordering::SeqCst)
    }

    fn reply(slot: &Mutex<MockReply>) -> MockReply {
        slot.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl AuthApi for MockAuthApi {
    async fn login(&self, _email: &str, _password: &str) -> Result<Value> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        Self::reply(&self.login_reply).into_result()
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<Value> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if !self.refresh_delay.is_zero() {
            tokio::time::sleep(self.refresh_delay).await;
        }
        Self::reply(&self.refresh_reply).into_result()
    }

    async fn logout(&self, _access_token: Option<&str>) -> Result<()> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        if !self.logout_delay.is_zero() {
            tokio::time::sleep(self.logout_delay).await;
        }
        Self::reply(&self.logout_reply).into_result().map(|_| ())
    }
}

/// 记录所有跳转的导航器
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    current: Mutex<Option<String>>,
    visits: Mutex<Vec<LoginRedirect>>,
}

impl RecordingNavigator {
    /// 停留在 `path` 的交互式导航器
    #[must_use]
    pub fn at(path: &str) -> Self {
        Self {
            current: Mutex::new(Some(path.to_string())),
            visits: Mutex::new(Vec::new()),
        }
    }

    /// 非交互环境
    #[must_use]
    pub fn headless() -> Self {
        Self::default()
    }

    pub fn visits(&self) -> Vec<LoginRedirect> {
        self.visits
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// 用户重新登录后回到 `path`
    pub fn move_to(&self, path: &str) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(path.to_string());
    }
}

impl Navigator for RecordingNavigator {
    fn current_path(&self) -> Option<String> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn navigate(&self, target: &LoginRedirect) {
        self.visits
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(target.clone());
        self.move_to(&target.login_route);
    }
}
