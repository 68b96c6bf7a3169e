//! # 登录页跳转
//!
//! 会话失效时把用户送回登录页的抽象。浏览器里对应整页跳转，
//! 在 CLI 或服务端上下文里通常什么都不做。

use std::fmt;

/// 强制登出时附带的原因
pub const SESSION_EXPIRED_REASON: &str = "session_expired";

/// 登录页跳转目标
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRedirect {
    /// 登录路由，例如 `/login`
    pub login_route: String,
    /// 跳转原因
    pub reason: String,
    /// 登录后返回的原路径
    pub redirect: String,
}

impl LoginRedirect {
    /// 会话过期导致的跳转
    #[must_use]
    pub fn session_expired(login_route: &str, redirect: &str) -> Self {
        Self {
            login_route: login_route.to_string(),
            reason: SESSION_EXPIRED_REASON.to_string(),
            redirect: redirect.to_string(),
        }
    }

    /// 渲染为 `login_route?reason=...&redirect=...`
    #[must_use]
    pub fn to_url(&self) -> String {
        format!(
            "{}?reason={}&redirect={}",
            self.login_route,
            urlencoding::encode(&self.reason),
            urlencoding::encode(&self.redirect)
        )
    }
}

impl fmt::Display for LoginRedirect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_url())
    }
}

/// 导航原语
pub trait Navigator: Send + Sync + fmt::Debug {
    /// 当前所在路径；非交互环境返回 `None`
    fn current_path(&self) -> Option<String>;

    /// 跳转到登录页
    fn navigate(&self, target: &LoginRedirect);
}

/// 非交互环境使用的导航器
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn current_path(&self) -> Option<String> {
        None
    }

    fn navigate(&self, _target: &LoginRedirect) {}
}

/// 路径是否属于认证页面（登录、注册等）
#[must_use]
pub fn is_auth_route(path: &str, prefixes: &[String]) -> bool {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    prefixes.iter().any(|prefix| {
        path.strip_prefix(prefix.as_str())
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    })
}
