//! # 错误分类器
//!
//! 把原始失败映射到 network / auth / server / validation / conflict / unknown
//! 分类，重试执行器用它判断可重试性。

use super::ClientError;

/// 会被默认重试策略视为瞬时故障的 HTTP 状态码
pub const RETRYABLE_STATUS_CODES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// 错误分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Transport-level failure, no HTTP status.
    Network,
    /// 401/403, invalid or expired credentials.
    Auth,
    /// 5xx.
    Server,
    /// 400/422.
    Validation,
    /// 409.
    Conflict,
    /// Anything else, including cancellation.
    Unknown,
}

impl ErrorKind {
    /// 稳定的字符串标识，供日志和 UI 层的消息映射使用
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Auth => "auth",
            Self::Server => "server",
            Self::Validation => "validation",
            Self::Conflict => "conflict",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 分类结果：类别 + 原始状态码
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub kind: ErrorKind,
    pub status: Option<u16>,
}

impl Classification {
    /// 传输层失败
    #[must_use]
    pub const fn network() -> Self {
        Self {
            kind: ErrorKind::Network,
            status: None,
        }
    }

    /// 按状态码分类
    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        Self {
            kind: classify_status(status),
            status: Some(status),
        }
    }

    /// 无法归类
    #[must_use]
    pub const fn unknown() -> Self {
        Self {
            kind: ErrorKind::Unknown,
            status: None,
        }
    }

    /// 默认可重试判断：网络错误总是可重试；带状态码的错误只有
    /// [`RETRYABLE_STATUS_CODES`] 可重试；其余一律不重试。
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match (self.kind, self.status) {
            (ErrorKind::Network, None) => true,
            (_, Some(status)) => RETRYABLE_STATUS_CODES.contains(&status),
            _ => false,
        }
    }
}

/// HTTP 状态码到分类的映射
#[must_use]
pub const fn classify_status(status: u16) -> ErrorKind {
    match status {
        401 | 403 => ErrorKind::Auth,
        400 | 422 => ErrorKind::Validation,
        409 => ErrorKind::Conflict,
        408 => ErrorKind::Network,
        500..=599 => ErrorKind::Server,
        _ => ErrorKind::Unknown,
    }
}

/// 可被分类的错误
pub trait Classify {
    /// 返回错误的分类
    fn classify(&self) -> Classification;
}

impl Classify for ClientError {
    fn classify(&self) -> Classification {
        match self {
            Self::Network { .. } => Classification::network(),
            Self::Http { status, .. } => Classification::from_status(*status),
            Self::Authentication { .. } => Classification {
                kind: ErrorKind::Auth,
                status: None,
            },
            Self::Context { source, .. } => source.classify(),
            _ => Classification::unknown(),
        }
    }
}

impl Classify for reqwest::Error {
    fn classify(&self) -> Classification {
        if let Some(status) = self.status() {
            return Classification::from_status(status.as_u16());
        }
        if self.is_timeout() || self.is_connect() || self.is_request() {
            return Classification::network();
        }
        Classification::unknown()
    }
}

/// 便捷函数：默认重试谓词
pub fn is_retryable<E: Classify + ?Sized>(error: &E) -> bool {
    error.classify().is_retryable()
}
