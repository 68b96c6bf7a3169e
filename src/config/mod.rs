//! # 配置管理模块
//!
//! 处理配置加载与验证

mod app_config;

pub use app_config::{
    AuthConfig, CacheConfig, ClientConfig, RetryConfig, StorageBackendType, StorageConfig,
};

use crate::error::{ClientError, Result};
use crate::ldebug;
use crate::logging::{LogComponent, LogStage};
use std::env;
use std::path::Path;

/// 按 `RUST_ENV` 加载 `config/config.{env}.toml`
pub fn load_config() -> Result<ClientConfig> {
    let env = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
    let config_file = format!("config/config.{env}.toml");
    load_config_from(&config_file)
}

/// 从指定路径加载配置文件
pub fn load_config_from(path: impl AsRef<Path>) -> Result<ClientConfig> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ClientError::config(format!(
            "配置文件不存在: {}",
            path.display()
        )));
    }

    let content = std::fs::read_to_string(path).map_err(|e| {
        ClientError::config_with_source(format!("读取配置文件失败: {}", path.display()), e)
    })?;

    let config: ClientConfig = toml::from_str(&content)?;
    config.validate()?;

    ldebug!(
        "system",
        LogStage::Startup,
        LogComponent::Config,
        "config_loaded",
        &format!("配置加载完成: {}", path.display()),
        base_url = %config.auth.base_url
    );

    Ok(config)
}
