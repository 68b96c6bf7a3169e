//! # 客户端配置结构定义

use crate::ensure_config;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// 会话核心主配置结构
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// 认证端点与令牌策略
    pub auth: AuthConfig,
    /// 默认重试策略
    pub retry: RetryConfig,
    /// 聚合数据缓存
    pub cache: CacheConfig,
    /// 凭证持久化
    pub storage: StorageConfig,
}

/// 认证配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// API 根地址
    pub base_url: String,
    /// 登录端点路径
    pub login_path: String,
    /// 刷新端点路径
    pub refresh_path: String,
    /// 登出端点路径
    pub logout_path: String,
    /// 过期缓冲（秒），进入缓冲区即触发刷新
    pub expiry_buffer_secs: u64,
    /// 单次 HTTP 请求超时（秒）
    pub request_timeout_secs: u64,
    /// 登出通知的等待上限（秒）
    pub logout_timeout_secs: u64,
    /// 强制登出时跳转的登录路由
    pub login_route: String,
    /// 视为"认证页面"的路由前缀，位于这些页面时不再重定向
    pub auth_route_prefixes: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000/api".to_string(),
            login_path: "/auth/login".to_string(),
            refresh_path: "/auth/refresh".to_string(),
            logout_path: "/auth/logout".to_string(),
            expiry_buffer_secs: 300, // 5分钟
            request_timeout_secs: 30,
            logout_timeout_secs: 5,
            login_route: "/login".to_string(),
            auth_route_prefixes: vec![
                "/login".to_string(),
                "/register".to_string(),
                "/forgot-password".to_string(),
                "/reset-password".to_string(),
            ],
        }
    }
}

impl AuthConfig {
    /// 过期缓冲
    #[must_use]
    pub const fn expiry_buffer(&self) -> Duration {
        Duration::from_secs(self.expiry_buffer_secs)
    }

    /// 请求超时
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// 登出通知超时
    #[must_use]
    pub const fn logout_timeout(&self) -> Duration {
        Duration::from_secs(self.logout_timeout_secs)
    }

    /// 拼接端点完整地址
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// 重试配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 10000,
            jitter: true,
        }
    }
}

/// 缓存配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// 默认过期时间（秒）
    pub default_ttl_secs: u64,
    /// 过期条目清理间隔（秒），0 表示不启动清理任务
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: 300,
            sweep_interval_secs: 300,
        }
    }
}

impl CacheConfig {
    /// 默认 TTL
    #[must_use]
    pub const fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    /// 清理间隔；`None` 表示关闭
    #[must_use]
    pub const fn sweep_interval(&self) -> Option<Duration> {
        if self.sweep_interval_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.sweep_interval_secs))
        }
    }
}

/// 凭证存储后端类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackendType {
    /// 进程内存
    #[default]
    Memory,
    /// JSON 文件
    File,
    /// 不持久化
    None,
}

/// 凭证存储配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// 主存储后端
    pub backend: StorageBackendType,
    /// 文件后端路径（仅 `file` 时使用）
    pub path: Option<PathBuf>,
    /// 初始 Cookie 头（模拟浏览器的 cookie jar）
    pub cookie_header: Option<String>,
}

impl ClientConfig {
    /// 验证配置的有效性
    pub fn validate(&self) -> Result<()> {
        ensure_config!(!self.auth.base_url.is_empty(), "auth.base_url 不能为空");
        ensure_config!(
            url::Url::parse(&self.auth.base_url).is_ok(),
            "auth.base_url 不是合法的URL: {}",
            self.auth.base_url
        );
        ensure_config!(
            self.auth.login_route.starts_with('/'),
            "auth.login_route 必须以 / 开头: {}",
            self.auth.login_route
        );
        ensure_config!(self.auth.request_timeout_secs > 0, "auth.request_timeout_secs 必须大于0");
        ensure_config!(self.retry.base_delay_ms > 0, "retry.base_delay_ms 必须大于0");
        ensure_config!(
            self.retry.max_delay_ms >= self.retry.base_delay_ms,
            "retry.max_delay_ms ({}) 不能小于 retry.base_delay_ms ({})",
            self.retry.max_delay_ms,
            self.retry.base_delay_ms
        );
        ensure_config!(self.cache.default_ttl_secs > 0, "cache.default_ttl_secs 必须大于0");
        if self.storage.backend == StorageBackendType::File {
            ensure_config!(
                self.storage.path.is_some(),
                "storage.backend = \"file\" 时必须提供 storage.path"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ClientConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.auth.expiry_buffer(), Duration::from_secs(300));
        assert_eq!(config.retry.max_retries, 3);
    }

    #[test]
    fn test_endpoint_join() {
        let auth = AuthConfig {
            base_url: "https://ops.example.com/api/".to_string(),
            ..AuthConfig::default()
        };
        assert_eq!(auth.endpoint("/auth/refresh"), "https://ops.example.com/api/auth/refresh");
        assert_eq!(auth.endpoint("auth/login"), "https://ops.example.com/api/auth/login");
    }

    #[test]
    fn test_file_backend_requires_path() {
        let mut config = ClientConfig::default();
        config.storage.backend = StorageBackendType::File;
        assert!(config.validate().is_err());

        config.storage.path = Some(PathBuf::from("/tmp/credentials.json"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_retry_bounds_rejected() {
        let mut config = ClientConfig::default();
        config.retry.max_delay_ms = 10;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("retry.max_delay_ms"));
    }

    #[test]
    fn test_sweep_interval_zero_disables() {
        let cache = CacheConfig {
            sweep_interval_secs: 0,
            ..CacheConfig::default()
        };
        assert!(cache.sweep_interval().is_none());
    }
}
