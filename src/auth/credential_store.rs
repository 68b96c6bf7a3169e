//! # 凭证存储
//!
//! 把访问令牌/刷新令牌对写入两个相互独立的后端（主键值存储 + cookie jar），
//! 页面重载或某个后端不可用时仍能找回令牌。
//!
//! 读：主存储优先，未命中再查 cookie（包括旧的 `token` cookie）；
//! 写：两个后端各自尽力而为，不回滚；后端错误一律吞掉并按"无值"处理。
//! 会话是否有效只由 [`TokenLifecycleManager`](super::TokenLifecycleManager) 判断。

use std::fmt;
use std::sync::Arc;

use super::backends::{CookieJarBackend, MemoryBackend, NoopBackend, StorageBackend};
use super::jwt::is_token_shaped;
use crate::ldebug;
use crate::logging::{LogComponent, LogStage};

/// 访问令牌键
pub const ACCESS_TOKEN_KEY: &str = "auth-token";
/// 刷新令牌键
pub const REFRESH_TOKEN_KEY: &str = "auth-refresh-token";
/// 旧版本缓存的用户身份键，只在清理时删除
pub const USER_KEY: &str = "auth-user";
/// 旧版本使用的 cookie 名，只在读路径上兼容
pub const LEGACY_TOKEN_COOKIE: &str = "token";

/// 持久化的令牌对
#[derive(Clone, PartialEq, Eq)]
pub struct StoredCredentials {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

impl fmt::Debug for StoredCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredCredentials")
            .field("access_token", &format_args!("<{} bytes>", self.access_token.len()))
            .field("has_refresh_token", &self.refresh_token.is_some())
            .finish()
    }
}

/// 双后端凭证存储
#[derive(Debug, Clone)]
pub struct CredentialStore {
    primary: Arc<dyn StorageBackend>,
    cookies: Arc<dyn StorageBackend>,
}

impl CredentialStore {
    /// 使用给定的主存储和 cookie 后端创建
    #[must_use]
    pub fn new(primary: Arc<dyn StorageBackend>, cookies: Arc<dyn StorageBackend>) -> Self {
        Self { primary, cookies }
    }

    /// 内存主存储 + 空 cookie jar
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryBackend::new()),
            Arc::new(CookieJarBackend::new()),
        )
    }

    /// 完全不持久化
    #[must_use]
    pub fn ephemeral() -> Self {
        Self::new(Arc::new(NoopBackend), Arc::new(NoopBackend))
    }

    /// 读取当前令牌对；两个后端都未命中或值不可解析时返回 `None`
    #[must_use]
    pub fn read(&self) -> Option<StoredCredentials> {
        let access_token = Self::lookup_token(self.primary.as_ref(), ACCESS_TOKEN_KEY)
            .or_else(|| Self::lookup_token(self.cookies.as_ref(), ACCESS_TOKEN_KEY))
            .or_else(|| Self::lookup_token(self.cookies.as_ref(), LEGACY_TOKEN_COOKIE))?;

        let refresh_token = Self::get_quiet(self.primary.as_ref(), REFRESH_TOKEN_KEY)
            .or_else(|| Self::get_quiet(self.cookies.as_ref(), REFRESH_TOKEN_KEY))
            .filter(|t| !t.trim().is_empty());

        Some(StoredCredentials {
            access_token,
            refresh_token,
        })
    }

    /// 当前访问令牌
    #[must_use]
    pub fn access_token(&self) -> Option<String> {
        self.read().map(|c| c.access_token)
    }

    /// 写入令牌对；`refresh_token` 为 `None` 时保留已有的刷新令牌
    pub fn write(&self, access_token: &str, refresh_token: Option<&str>) {
        for backend in [self.primary.as_ref(), self.cookies.as_ref()] {
            Self::set_quiet(backend, ACCESS_TOKEN_KEY, access_token);
            if let Some(refresh_token) = refresh_token {
                Self::set_quiet(backend, REFRESH_TOKEN_KEY, refresh_token);
            }
        }
    }

    /// 清除两个后端中的所有认证数据
    pub fn clear(&self) {
        for backend in [self.primary.as_ref(), self.cookies.as_ref()] {
            for key in [
                ACCESS_TOKEN_KEY,
                REFRESH_TOKEN_KEY,
                USER_KEY,
                LEGACY_TOKEN_COOKIE,
            ] {
                if let Err(e) = backend.remove(key) {
                    ldebug!(
                        "system",
                        LogStage::Storage,
                        LogComponent::CredentialStore,
                        "remove_failed",
                        &format!("删除 {key} 失败，已忽略: {e}"),
                        backend = backend.name()
                    );
                }
            }
        }
    }

    fn lookup_token(backend: &dyn StorageBackend, key: &str) -> Option<String> {
        let value = Self::get_quiet(backend, key)?;
        if is_token_shaped(value.trim()) {
            Some(value.trim().to_string())
        } else {
            ldebug!(
                "system",
                LogStage::Storage,
                LogComponent::CredentialStore,
                "unparsable_token",
                &format!("{key} 的值不是令牌格式，按未命中处理"),
                backend = backend.name()
            );
            None
        }
    }

    fn get_quiet(backend: &dyn StorageBackend, key: &str) -> Option<String> {
        match backend.get(key) {
            Ok(value) => value,
            Err(e) => {
                ldebug!(
                    "system",
                    LogStage::Storage,
                    LogComponent::CredentialStore,
                    "read_failed",
                    &format!("读取 {key} 失败，按未命中处理: {e}"),
                    backend = backend.name()
                );
                None
            }
        }
    }

    fn set_quiet(backend: &dyn StorageBackend, key: &str, value: &str) {
        if let Err(e) = backend.set(key, value) {
            ldebug!(
                "system",
                LogStage::Storage,
                LogComponent::CredentialStore,
                "write_failed",
                &format!("写入 {key} 失败，已忽略: {e}"),
                backend = backend.name()
            );
        }
    }
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::in_memory()
    }
}
