//! # 日志配置模块
//!
//! 统一的结构化日志宏与订阅器初始化。所有事件都带有
//! `request_id` / `stage` / `component` / `operation` 字段，便于过滤。

use std::env;
use std::fmt;
use tracing_subscriber::{EnvFilter, fmt as tracing_fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// 事件所处的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStage {
    /// 进程启动
    Startup,
    /// 进程关闭
    Shutdown,
    /// 登录、刷新、登出
    Authentication,
    /// 凭证持久化
    Storage,
    /// 出站 HTTP 调用
    ExternalApi,
    /// 重试与退避
    Retry,
    /// 缓存读写与失效
    Cache,
    /// 内部逻辑
    Internal,
}

impl fmt::Display for LogStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Startup => "startup",
            Self::Shutdown => "shutdown",
            Self::Authentication => "authentication",
            Self::Storage => "storage",
            Self::ExternalApi => "external_api",
            Self::Retry => "retry",
            Self::Cache => "cache",
            Self::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// 产生事件的组件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogComponent {
    /// 入口程序
    Main,
    /// 配置加载
    Config,
    /// `CredentialStore` 及其后端
    CredentialStore,
    /// 令牌生命周期管理器
    TokenLifecycle,
    /// 认证端点客户端
    AuthApi,
    /// 重试执行器
    RetryExecutor,
    /// TTL 缓存
    Cache,
    /// 缓存清理任务
    CacheSweeper,
    /// 业务服务客户端
    ServiceClient,
}

impl fmt::Display for LogComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Main => "main",
            Self::Config => "config",
            Self::CredentialStore => "credential_store",
            Self::TokenLifecycle => "token_lifecycle",
            Self::AuthApi => "auth_api",
            Self::RetryExecutor => "retry_executor",
            Self::Cache => "cache",
            Self::CacheSweeper => "cache_sweeper",
            Self::ServiceClient => "service_client",
        };
        f.write_str(name)
    }
}

/// 结构化 info 日志
#[macro_export]
macro_rules! linfo {
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $description:expr $(, $($fields:tt)+)?) => {
        ::tracing::info!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = %$operation,
            $($($fields)+,)?
            "{}",
            $description
        )
    };
}

/// 结构化 debug 日志
#[macro_export]
macro_rules! ldebug {
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $description:expr $(, $($fields:tt)+)?) => {
        ::tracing::debug!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = %$operation,
            $($($fields)+,)?
            "{}",
            $description
        )
    };
}

/// 结构化 warn 日志
#[macro_export]
macro_rules! lwarn {
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $description:expr $(, $($fields:tt)+)?) => {
        ::tracing::warn!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = %$operation,
            $($($fields)+,)?
            "{}",
            $description
        )
    };
}

/// 结构化 error 日志
#[macro_export]
macro_rules! lerror {
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $description:expr $(, $($fields:tt)+)?) => {
        ::tracing::error!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = %$operation,
            $($($fields)+,)?
            "{}",
            $description
        )
    };
}

/// 初始化日志系统
///
/// `RUST_LOG` 优先；否则使用 `{level},mfi_resilience=debug`。
/// 重复调用是安全的（第二次安装会被忽略）。
pub fn init_logging(log_level: Option<&str>) {
    let level = log_level.unwrap_or("info");
    let default_filter = format!("{level},mfi_resilience=debug,reqwest=warn,hyper=warn");
    let log_filter = env::var("RUST_LOG").unwrap_or(default_filter);

    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| log_filter.into()))
        .with(
            tracing_fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(false)
                .with_thread_names(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .try_init();
}
