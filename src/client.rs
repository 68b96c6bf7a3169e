//! # 业务服务客户端
//!
//! 把认证头、重试和聚合缓存组合到一起：
//! - `get_json`：带认证头的 GET，按默认策略重试；
//! - `get_json_cached`：先查缓存，未命中再走 `get_json` 并写回；
//! - `post_json`：变更操作，不重试，调用方负责按前缀失效缓存。
//!
//! 任何请求返回 401 都视为会话失效：清空凭证、跳转登录页，再把原始错误返回。

use reqwest::{Client, Response};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::api::json_or_status_error;
use crate::auth::{ResponseShape, TokenLifecycleManager};
use crate::cache::TtlCache;
use crate::config::ClientConfig;
use crate::error::{ClientError, Context, Result};
use crate::logging::{LogComponent, LogStage};
use crate::retry::{RetryPolicy, with_retry};
use crate::{ldebug, lerror, lwarn};

/// 业务服务客户端
#[derive(Debug, Clone)]
pub struct ServiceClient {
    http_client: Client,
    base_url: String,
    lifecycle: TokenLifecycleManager,
    retry_policy: RetryPolicy<ClientError>,
    cache: Arc<TtlCache<Value>>,
}

impl ServiceClient {
    /// 按客户端配置创建
    #[must_use]
    pub fn new(
        config: &ClientConfig,
        lifecycle: TokenLifecycleManager,
        cache: Arc<TtlCache<Value>>,
    ) -> Self {
        let http_client = match Client::builder()
            .timeout(config.auth.request_timeout())
            .build()
        {
            Ok(client) => client,
            Err(err) => {
                lerror!(
                    "system",
                    LogStage::Startup,
                    LogComponent::ServiceClient,
                    "http_client_build_fail",
                    &format!("构建业务 HTTP 客户端失败，回退到默认客户端: {err}")
                );
                Client::new()
            }
        };

        Self::with_parts(
            http_client,
            &config.auth.base_url,
            lifecycle,
            RetryPolicy::from(&config.retry),
            cache,
        )
    }

    /// 使用显式组件创建
    #[must_use]
    pub fn with_parts(
        http_client: Client,
        base_url: &str,
        lifecycle: TokenLifecycleManager,
        retry_policy: RetryPolicy<ClientError>,
        cache: Arc<TtlCache<Value>>,
    ) -> Self {
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            lifecycle,
            retry_policy,
            cache,
        }
    }

    /// 会话管理器
    #[must_use]
    pub const fn lifecycle(&self) -> &TokenLifecycleManager {
        &self.lifecycle
    }

    /// 聚合数据缓存
    #[must_use]
    pub const fn cache(&self) -> &Arc<TtlCache<Value>> {
        &self.cache
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn get_once(&self, path: &str) -> Result<Value> {
        let headers = self.lifecycle.get_auth_headers().await;
        let response = self
            .http_client
            .get(self.url(path))
            .headers(headers)
            .send()
            .await?;
        self.read_body(path, response).await
    }

    async fn read_body(&self, path: &str, response: Response) -> Result<Value> {
        let body = match json_or_status_error(response).await {
            Err(err) if err.status() == Some(401) => {
                lwarn!(
                    "system",
                    LogStage::Authentication,
                    LogComponent::ServiceClient,
                    "unauthorized",
                    &format!("{path} 返回 401，会话已失效")
                );
                self.lifecycle.handle_authentication_failure();
                return Err(err);
            }
            other => other?,
        };
        ResponseShape::from(body).into_data()
    }

    /// 带认证头的 GET，失败按重试策略重试
    ///
    /// 每次尝试都重新取认证头。最终失败时返回最后一次的原始错误。
    pub async fn get_json(&self, path: &str) -> Result<Value> {
        with_retry(|| self.get_once(path), &self.retry_policy).await
    }

    /// 先查缓存，未命中时 GET 并写入；失败不缓存
    pub async fn get_json_cached(
        &self,
        path: &str,
        key: impl Into<String>,
        ttl: Option<Duration>,
    ) -> Result<Value> {
        let key = key.into();
        if let Some(value) = self.cache.get(&key) {
            ldebug!(
                "system",
                LogStage::Cache,
                LogComponent::ServiceClient,
                "cache_hit",
                &format!("{key} 命中缓存")
            );
            return Ok(value);
        }

        let value = self.get_json(path).await?;
        self.cache.set(key, value.clone(), ttl);
        Ok(value)
    }

    /// 变更操作（不重试）
    pub async fn post_json<B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<Value> {
        let headers = self.lifecycle.get_auth_headers().await;
        let response = self
            .http_client
            .post(self.url(path))
            .headers(headers)
            .json(body)
            .send()
            .await
            .with_context(|| format!("POST {path} 失败"))?;
        self.read_body(path, response).await
    }
}
