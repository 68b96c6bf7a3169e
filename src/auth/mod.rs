//! # 认证模块
//!
//! 客户端会话的完整生命周期：凭证持久化、令牌解码、主动刷新、强制登出。
//! 对外只暴露 [`TokenLifecycleManager`]、[`CredentialStore`] 以及两个协作者
//! trait（[`AuthApi`]、[`Navigator`]），其余实现需通过子模块路径访问。

pub mod api;
pub mod backends;
pub mod credential_store;
pub mod jwt;
pub mod lifecycle;
pub mod navigation;
pub mod response;

pub use api::{AuthApi, HttpAuthApi};
pub use backends::{CookieJarBackend, FileBackend, MemoryBackend, NoopBackend, StorageBackend};
pub use credential_store::{CredentialStore, StoredCredentials};
pub use jwt::SessionUser;
pub use lifecycle::{LoginOutcome, RefreshFailure, SessionState, TokenLifecycleManager};
pub use navigation::{LoginRedirect, Navigator, NoopNavigator};
pub use response::{ResponseShape, TokenEnvelope, normalize_token_response};
