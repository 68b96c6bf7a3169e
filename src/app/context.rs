//! 应用上下文（DI 容器）
//!
//! 入口程序按配置组装一次，之后显式传递，不使用模块级单例。
//! 测试可以直接替换其中任意协作者。

use serde_json::Value;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::auth::{
    AuthApi, CookieJarBackend, CredentialStore, FileBackend, HttpAuthApi, MemoryBackend,
    Navigator, NoopBackend, StorageBackend, TokenLifecycleManager,
};
use crate::cache::{TtlCache, spawn_sweeper};
use crate::client::ServiceClient;
use crate::config::{ClientConfig, StorageBackendType, StorageConfig};
use crate::error::Result;
use crate::logging::{LogComponent, LogStage};
use crate::{config_error, linfo};

pub struct AppContext {
    pub config: Arc<ClientConfig>,
    pub store: CredentialStore,
    pub lifecycle: TokenLifecycleManager,
    pub cache: Arc<TtlCache<Value>>,
    pub client: ServiceClient,
    shutdown: CancellationToken,
    sweeper: Option<JoinHandle<()>>,
}

impl AppContext {
    /// 使用 HTTP 认证后端组装上下文。需要在 tokio 运行时内调用（会启动缓存清理任务）。
    pub fn build(config: ClientConfig, navigator: Arc<dyn Navigator>) -> Result<Self> {
        let api = Arc::new(HttpAuthApi::new(&config.auth));
        Self::with_auth_api(config, api, navigator)
    }

    /// 使用指定的认证后端组装上下文
    pub fn with_auth_api(
        config: ClientConfig,
        api: Arc<dyn AuthApi>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self> {
        config.validate()?;

        let store = build_store(&config.storage)?;
        let lifecycle =
            TokenLifecycleManager::new(store.clone(), api, navigator, config.auth.clone());
        let cache = Arc::new(TtlCache::new(config.cache.default_ttl()));
        let client = ServiceClient::new(&config, lifecycle.clone(), cache.clone());

        let shutdown = CancellationToken::new();
        let sweeper = config
            .cache
            .sweep_interval()
            .map(|period| spawn_sweeper(cache.clone(), period, shutdown.clone()));

        linfo!(
            "system",
            LogStage::Startup,
            LogComponent::Main,
            "context_ready",
            "应用上下文已就绪",
            storage = ?config.storage.backend,
            sweeper = sweeper.is_some()
        );

        Ok(Self {
            config: Arc::new(config),
            store,
            lifecycle,
            cache,
            client,
            shutdown,
            sweeper,
        })
    }

    /// 停止后台任务
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        if let Some(handle) = self.sweeper.take() {
            let _ = handle.await;
        }
        linfo!(
            "system",
            LogStage::Shutdown,
            LogComponent::Main,
            "context_shutdown",
            "后台任务已停止"
        );
    }
}

impl Drop for AppContext {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// 按存储配置创建凭证存储
pub fn build_store(config: &StorageConfig) -> Result<CredentialStore> {
    let primary: Arc<dyn StorageBackend> = match config.backend {
        StorageBackendType::Memory => Arc::new(MemoryBackend::new()),
        StorageBackendType::None => Arc::new(NoopBackend),
        StorageBackendType::File => {
            let path = config
                .path
                .clone()
                .ok_or_else(|| config_error!("storage.backend = \"file\" 时必须提供 storage.path"))?;
            Arc::new(FileBackend::new(path))
        }
    };

    let cookies: Arc<dyn StorageBackend> = match (&config.backend, &config.cookie_header) {
        (StorageBackendType::None, _) => Arc::new(NoopBackend),
        (_, Some(header)) => Arc::new(CookieJarBackend::from_header(header)),
        (_, None) => Arc::new(CookieJarBackend::new()),
    };

    Ok(CredentialStore::new(primary, cookies))
}
