//! # 错误类型定义

use thiserror::Error;

/// 会话核心主要错误类型
#[derive(Debug, Error)]
pub enum ClientError {
    /// 配置相关错误
    #[error("配置错误: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 传输层错误（没有 HTTP 状态码）
    #[error("网络错误: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 服务端返回了非 2xx 状态码
    #[error("HTTP错误 {status}: {message}")]
    Http { status: u16, message: String },

    /// 认证错误（令牌缺失、刷新失败、登录响应无令牌）
    #[error("认证错误: {message}")]
    Authentication {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 凭证存储后端错误
    #[error("存储错误: {message}")]
    Storage {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 序列化/反序列化错误
    #[error("序列化错误: {message}")]
    Serialization {
        message: String,
        #[source]
        source: anyhow::Error,
    },

    /// IO相关错误
    #[error("IO错误: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// 调用方取消了操作
    #[error("操作已取消: {message}")]
    Cancelled { message: String },

    /// 系统内部错误
    #[error("内部错误: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 附加上下文的错误
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<ClientError>,
    },
}

impl ClientError {
    /// 创建配置错误
    pub fn config<T: Into<String>>(message: T) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的配置错误
    pub fn config_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建网络错误
    pub fn network<T: Into<String>>(message: T) -> Self {
        Self::Network {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的网络错误
    pub fn network_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Network {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建 HTTP 状态错误
    pub fn http<T: Into<String>>(status: u16, message: T) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    /// 创建认证错误
    pub fn authentication<T: Into<String>>(message: T) -> Self {
        Self::Authentication {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的认证错误
    pub fn authentication_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Authentication {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建存储错误
    pub fn storage<T: Into<String>>(message: T) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的存储错误
    pub fn storage_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建取消错误
    pub fn cancelled<T: Into<String>>(message: T) -> Self {
        Self::Cancelled {
            message: message.into(),
        }
    }

    /// 创建内部错误
    pub fn internal<T: Into<String>>(message: T) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的内部错误
    pub fn internal_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// HTTP 状态码（如果有），会穿透 `Context` 包装
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Context { source, .. } => source.status(),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<toml::de::Error> for ClientError {
    fn from(err: toml::de::Error) -> Self {
        Self::config_with_source("TOML解析失败", err)
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: "JSON处理失败".to_string(),
            source: err.into(),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::http(status.as_u16(), err.to_string());
        }
        if err.is_decode() {
            return Self::Serialization {
                message: "响应体解析失败".to_string(),
                source: err.into(),
            };
        }
        if err.is_builder() || err.is_redirect() {
            return Self::internal_with_source(format!("请求构建失败: {err}"), err);
        }
        Self::network_with_source(err.to_string(), err)
    }
}
