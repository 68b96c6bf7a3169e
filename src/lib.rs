//! # MFI 会话韧性核心库
//!
//! 运营仪表盘客户端的会话与读取韧性层：令牌生命周期（过期判断、主动刷新、
//! single-flight 去重、强制登出）、指数退避重试、聚合接口的 TTL 读缓存。

pub mod app;
pub mod auth;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod retry;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use app::AppContext;
pub use auth::{SessionState, TokenLifecycleManager};
pub use cache::TtlCache;
pub use client::ServiceClient;
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use retry::{RetryPolicy, with_retry};
