//! # 认证端点客户端
//!
//! 登录、刷新、登出三个 HTTP 调用。这里只负责传输和状态码映射，
//! 响应形状的归一化在 [`super::response`] 中完成。

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Response};
use serde_json::{Value, json};
use std::fmt;

use crate::config::AuthConfig;
use crate::error::{ClientError, Result};
use crate::logging::{LogComponent, LogStage};
use crate::{ldebug, lerror};

/// 认证后端
#[async_trait]
pub trait AuthApi: Send + Sync + fmt::Debug {
    /// 用户名密码登录，返回原始响应体
    async fn login(&self, email: &str, password: &str) -> Result<Value>;

    /// 用刷新令牌换取新的访问令牌，返回原始响应体
    async fn refresh(&self, refresh_token: &str) -> Result<Value>;

    /// 通知服务端登出
    async fn logout(&self, access_token: Option<&str>) -> Result<()>;
}

/// 基于 reqwest 的认证后端
#[derive(Debug, Clone)]
pub struct HttpAuthApi {
    http_client: Client,
    config: AuthConfig,
}

impl HttpAuthApi {
    /// 按认证配置创建客户端
    #[must_use]
    pub fn new(config: &AuthConfig) -> Self {
        let http_client = match Client::builder().timeout(config.request_timeout()).build() {
            Ok(client) => client,
            Err(err) => {
                lerror!(
                    "system",
                    LogStage::Startup,
                    LogComponent::AuthApi,
                    "http_client_build_fail",
                    &format!("构建认证 HTTP 客户端失败，回退到默认客户端: {err}")
                );
                Client::new()
            }
        };
        Self::with_client(http_client, config)
    }

    /// 复用已有的 HTTP 客户端
    #[must_use]
    pub fn with_client(http_client: Client, config: &AuthConfig) -> Self {
        Self {
            http_client,
            config: config.clone(),
        }
    }

    async fn post(&self, path: &str, bearer: Option<&str>, body: &Value) -> Result<Value> {
        let url = self.config.endpoint(path);
        let mut request = self.http_client.post(&url).json(body);
        if let Some(token) = bearer {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        let response = request.send().await?;
        ldebug!(
            "system",
            LogStage::ExternalApi,
            LogComponent::AuthApi,
            "response",
            &format!("POST {path} -> {}", response.status()),
            status = response.status().as_u16()
        );
        json_or_status_error(response).await
    }
}

#[async_trait]
impl AuthApi for HttpAuthApi {
    async fn login(&self, email: &str, password: &str) -> Result<Value> {
        self.post(
            &self.config.login_path,
            None,
            &json!({ "email": email, "password": password }),
        )
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Value> {
        self.post(
            &self.config.refresh_path,
            Some(refresh_token),
            &json!({ "refresh_token": refresh_token }),
        )
        .await
    }

    async fn logout(&self, access_token: Option<&str>) -> Result<()> {
        self.post(&self.config.logout_path, access_token, &json!({}))
            .await
            .map(|_| ())
    }
}

/// 2xx 响应解析为 JSON（空响应体视为 `null`），其它状态码转换为
/// [`ClientError::Http`]，消息优先取响应体里的 `message` / `detail` / `error`。
pub async fn json_or_status_error(response: Response) -> Result<Value> {
    let status = response.status();
    let body = response.text().await?;

    if status.is_success() {
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        return Ok(serde_json::from_str(&body)?);
    }

    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| {
            ["message", "detail", "error"]
                .iter()
                .find_map(|k| v.get(*k).and_then(Value::as_str).map(ToString::to_string))
        })
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        });

    Err(ClientError::http(status.as_u16(), message))
}
