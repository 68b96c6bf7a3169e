//! # 令牌生命周期管理
//!
//! 会话状态机：`Absent → Valid → Expiring → Refreshing → Valid | LoggedOut → Absent`。
//!
//! - 每次取认证头都先检查令牌是否进入过期缓冲区，进入则主动刷新；
//! - 同一时刻最多只有一次刷新在途，所有并发调用方共享同一个结果；
//! - 刷新失败（传输错误、4xx、没有刷新令牌）清空凭证并跳转登录页，
//!   每次失败的刷新只跳转一次。刷新本身从不重试；
//! - 在途句柄在凭证写入或清空之后才释放。

use chrono::{DateTime, Utc};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use super::api::AuthApi;
use super::credential_store::CredentialStore;
use super::jwt::{SessionUser, decode_user, is_expired_at};
use super::navigation::{LoginRedirect, Navigator, is_auth_route};
use super::response::normalize_token_response;
use crate::auth_error;
use crate::config::AuthConfig;
use crate::error::{ClientError, Result};
use crate::logging::{LogComponent, LogStage};
use crate::{ldebug, linfo, lwarn};

/// 会话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// 没有令牌
    Absent,
    /// 令牌有效且不在缓冲区内
    Valid,
    /// 令牌已进入过期缓冲区（或无法解码）
    Expiring,
    /// 刷新在途
    Refreshing,
    /// 强制登出进行中，跳转完成后回到 `Absent`
    LoggedOut,
}

/// 在途刷新的失败结果，所有等待方共享
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshFailure {
    message: String,
    status: Option<u16>,
}

impl RefreshFailure {
    fn missing_refresh_token() -> Self {
        Self {
            message: "没有可用的刷新令牌".to_string(),
            status: None,
        }
    }

    fn empty_response() -> Self {
        Self {
            message: "刷新响应中没有访问令牌".to_string(),
            status: None,
        }
    }

    fn from_error(err: &ClientError) -> Self {
        Self {
            message: err.to_string(),
            status: err.status(),
        }
    }

    /// 刷新端点返回的状态码
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        self.status
    }
}

impl fmt::Display for RefreshFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl From<RefreshFailure> for ClientError {
    fn from(failure: RefreshFailure) -> Self {
        Self::authentication(format!("令牌刷新失败: {failure}"))
    }
}

type RefreshHandle = Shared<BoxFuture<'static, std::result::Result<String, RefreshFailure>>>;

/// 登录结果
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    /// 从访问令牌解出的用户身份
    pub user: Option<SessionUser>,
    /// 登录响应里附带的用户对象
    pub user_payload: Option<Value>,
    pub access_token: String,
    pub refresh_token: Option<String>,
}

struct Inner {
    store: CredentialStore,
    api: Arc<dyn AuthApi>,
    navigator: Arc<dyn Navigator>,
    config: AuthConfig,
    in_flight: Mutex<Option<RefreshHandle>>,
    redirecting: AtomicBool,
}

impl Inner {
    fn in_flight(&self) -> std::sync::MutexGuard<'_, Option<RefreshHandle>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn run_refresh(self: Arc<Self>) -> std::result::Result<String, RefreshFailure> {
        let outcome = self.exchange().await;

        match &outcome {
            Ok(_) => {
                linfo!(
                    "system",
                    LogStage::Authentication,
                    LogComponent::TokenLifecycle,
                    "refresh_ok",
                    "访问令牌刷新成功"
                );
            }
            Err(failure) => {
                lwarn!(
                    "system",
                    LogStage::Authentication,
                    LogComponent::TokenLifecycle,
                    "refresh_failed",
                    &format!("访问令牌刷新失败，强制登出: {failure}"),
                    status = ?failure.status()
                );
                self.handle_authentication_failure();
            }
        }
        self.in_flight().take();
        outcome
    }

    async fn exchange(&self) -> std::result::Result<String, RefreshFailure> {
        let refresh_token = self
            .store
            .read()
            .and_then(|c| c.refresh_token)
            .ok_or_else(RefreshFailure::missing_refresh_token)?;

        let body = self
            .api
            .refresh(&refresh_token)
            .await
            .map_err(|e| RefreshFailure::from_error(&e))?;

        let envelope = normalize_token_response(&body).ok_or_else(RefreshFailure::empty_response)?;
        self.store
            .write(&envelope.access_token, envelope.refresh_token.as_deref());
        Ok(envelope.access_token)
    }

    fn handle_authentication_failure(&self) {
        self.store.clear();
        // 跳转期间的并发失败只清凭证，不重复跳转
        if self.redirecting.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Some(target) = self.login_redirect() {
            linfo!(
                "system",
                LogStage::Authentication,
                LogComponent::TokenLifecycle,
                "redirect_to_login",
                &format!("会话已失效，跳转到 {target}")
            );
            self.navigator.navigate(&target);
        }
        self.redirecting.store(false, Ordering::SeqCst);
    }

    /// 非交互环境或已在认证页面时不跳转
    fn login_redirect(&self) -> Option<LoginRedirect> {
        let path = self.navigator.current_path()?;
        if is_auth_route(&path, &self.config.auth_route_prefixes) {
            return None;
        }
        Some(LoginRedirect::session_expired(&self.config.login_route, &path))
    }
}

/// 令牌生命周期管理器
///
/// 克隆开销很小，所有克隆共享同一个会话。
#[derive(Clone)]
pub struct TokenLifecycleManager {
    inner: Arc<Inner>,
}

impl fmt::Debug for TokenLifecycleManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenLifecycleManager")
            .field("store", &self.inner.store)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl TokenLifecycleManager {
    /// 创建管理器
    #[must_use]
    pub fn new(
        store: CredentialStore,
        api: Arc<dyn AuthApi>,
        navigator: Arc<dyn Navigator>,
        config: AuthConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                api,
                navigator,
                config,
                in_flight: Mutex::new(None),
                redirecting: AtomicBool::new(false),
            }),
        }
    }

    /// 底层凭证存储
    #[must_use]
    pub fn store(&self) -> &CredentialStore {
        &self.inner.store
    }

    /// 认证配置
    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.inner.config
    }

    /// 当前会话状态
    #[must_use]
    pub fn state(&self) -> SessionState {
        if self.inner.redirecting.load(Ordering::SeqCst) {
            return SessionState::LoggedOut;
        }
        if self.inner.in_flight().is_some() {
            return SessionState::Refreshing;
        }
        match self.inner.store.access_token() {
            Some(token) if self.is_token_expired(&token) => SessionState::Expiring,
            Some(_) => SessionState::Valid,
            None => SessionState::Absent,
        }
    }

    /// 令牌是否已过期（含缓冲区）
    #[must_use]
    pub fn is_token_expired(&self, token: &str) -> bool {
        self.is_token_expired_at(token, Utc::now())
    }

    /// 在指定时刻判断令牌是否已过期（含缓冲区）
    #[must_use]
    pub fn is_token_expired_at(&self, token: &str, now: DateTime<Utc>) -> bool {
        is_expired_at(token, now, self.inner.config.expiry_buffer())
    }

    /// 当前请求应携带的认证头
    ///
    /// 从不失败：没有令牌或刷新失败时返回空集合（刷新失败时已经触发登出）。
    /// 令牌有效时不会挂起。
    pub async fn get_auth_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let Some(token) = self.current_token().await else {
            return headers;
        };

        match HeaderValue::from_str(&format!("Bearer {token}")) {
            Ok(mut value) => {
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
            }
            Err(e) => {
                lwarn!(
                    "system",
                    LogStage::Authentication,
                    LogComponent::TokenLifecycle,
                    "invalid_header_value",
                    &format!("令牌包含非法字符，无法放入请求头: {e}")
                );
            }
        }
        headers
    }

    async fn current_token(&self) -> Option<String> {
        let token = self.inner.store.access_token()?;
        if !self.is_token_expired(&token) {
            return Some(token);
        }

        ldebug!(
            "system",
            LogStage::Authentication,
            LogComponent::TokenLifecycle,
            "token_expiring",
            "访问令牌已进入过期缓冲区，开始刷新"
        );
        self.refresh().await.ok()
    }

    /// 刷新访问令牌（single-flight）
    ///
    /// 第一个调用方发起交换，其余调用方等待同一个结果；结果落定后句柄被清除，
    /// 下一次刷新会重新发起。
    pub async fn refresh(&self) -> Result<String> {
        let handle = {
            let mut slot = self.inner.in_flight();
            match slot.as_ref() {
                Some(existing) if existing.peek().is_none() => {
                    ldebug!(
                        "system",
                        LogStage::Authentication,
                        LogComponent::TokenLifecycle,
                        "refresh_join",
                        "已有刷新在途，等待其结果"
                    );
                    existing.clone()
                }
                _ => {
                    let handle = Inner::run_refresh(Arc::clone(&self.inner))
                        .boxed()
                        .shared();
                    *slot = Some(handle.clone());
                    handle
                }
            }
        };

        handle.await.map_err(ClientError::from)
    }

    /// 用户名密码登录
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome> {
        let body = self.inner.api.login(email, password).await?;
        let envelope =
            normalize_token_response(&body).ok_or_else(|| auth_error!("登录响应中没有访问令牌"))?;

        self.inner.store.clear();
        self.inner
            .store
            .write(&envelope.access_token, envelope.refresh_token.as_deref());

        let user = decode_user(&envelope.access_token);
        linfo!(
            "system",
            LogStage::Authentication,
            LogComponent::TokenLifecycle,
            "login_ok",
            "登录成功",
            role = ?user.as_ref().and_then(|u| u.role.as_deref()),
            has_refresh_token = envelope.refresh_token.is_some()
        );

        Ok(LoginOutcome {
            user,
            user_payload: envelope.user,
            access_token: envelope.access_token,
            refresh_token: envelope.refresh_token,
        })
    }

    /// 登出：尽力通知服务端（有超时上限，失败忽略），然后无条件清除本地凭证
    pub async fn logout(&self) {
        let token = self.inner.store.access_token();
        let notify = self.inner.api.logout(token.as_deref());

        match tokio::time::timeout(self.inner.config.logout_timeout(), notify).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                ldebug!(
                    "system",
                    LogStage::Authentication,
                    LogComponent::TokenLifecycle,
                    "logout_notify_failed",
                    &format!("登出通知失败，已忽略: {e}")
                );
            }
            Err(_) => {
                ldebug!(
                    "system",
                    LogStage::Authentication,
                    LogComponent::TokenLifecycle,
                    "logout_notify_timeout",
                    "登出通知超时，已忽略"
                );
            }
        }

        self.inner.store.clear();
        linfo!(
            "system",
            LogStage::Authentication,
            LogComponent::TokenLifecycle,
            "logout",
            "本地凭证已清除"
        );
    }

    /// 认证失败处理：清除凭证并（在交互环境中）跳转登录页
    ///
    /// 跳转完成后状态回到 `Absent`。跳转进行中的重复调用不会再次跳转。
    pub fn handle_authentication_failure(&self) {
        self.inner.handle_authentication_failure();
    }

    /// 是否持有未过期的访问令牌
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner
            .store
            .access_token()
            .is_some_and(|token| !self.is_token_expired(&token))
    }

    /// 从当前访问令牌解出的用户
    #[must_use]
    pub fn get_current_user(&self) -> Option<SessionUser> {
        self.inner
            .store
            .access_token()
            .and_then(|token| decode_user(&token))
    }
}
