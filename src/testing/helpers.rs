//! # 测试辅助函数

use std::sync::{Arc, Once};

use crate::auth::{CredentialStore, TokenLifecycleManager};
use crate::config::AuthConfig;

use super::mocks::{MockAuthApi, RecordingNavigator};

static INIT: Once = Once::new();

/// 初始化测试日志（只执行一次）
pub fn init_test_env() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// 生命周期管理器及其协作者
pub struct LifecycleHarness {
    pub manager: TokenLifecycleManager,
    pub store: CredentialStore,
    pub api: Arc<MockAuthApi>,
    pub navigator: Arc<RecordingNavigator>,
}

/// 用内存存储、mock 后端和记录型导航器组装生命周期管理器
#[must_use]
pub fn lifecycle_harness(api: MockAuthApi, navigator: RecordingNavigator) -> LifecycleHarness {
    init_test_env();
    let store = CredentialStore::in_memory();
    let api = Arc::new(api);
    let navigator = Arc::new(navigator);
    let manager = TokenLifecycleManager::new(
        store.clone(),
        api.clone(),
        navigator.clone(),
        AuthConfig::default(),
    );
    LifecycleHarness {
        manager,
        store,
        api,
        navigator,
    }
}
