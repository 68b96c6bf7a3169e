//! # 重试执行器
//!
//! 通用的指数退避重试：
//! - 最多尝试 `max_retries + 1` 次；
//! - 第 n 次重试前等待 `min(base * 2^n, max)`，开启抖动时再乘以 `[0.5, 1.0]`
//!   之间的随机因子；
//! - 不可重试的错误和最后一次失败都原样返回，不做包装。
//!
//! 执行器不理解取消语义：调用方取消的操作应返回不可重试的错误
//! （例如 [`ClientError::Cancelled`](crate::error::ClientError::Cancelled)）。

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::error::Classify;
use crate::logging::{LogComponent, LogStage};
use crate::{ldebug, lwarn};

type RetryPredicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;
type RetryObserver<E> = Arc<dyn Fn(u32, Duration, &E) + Send + Sync>;

/// 重试策略
pub struct RetryPolicy<E> {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
    retryable: RetryPredicate<E>,
    on_retry: Option<RetryObserver<E>>,
}

impl<E> Clone for RetryPolicy<E> {
    fn clone(&self) -> Self {
        Self {
            max_retries: self.max_retries,
            base_delay: self.base_delay,
            max_delay: self.max_delay,
            jitter: self.jitter,
            retryable: Arc::clone(&self.retryable),
            on_retry: self.on_retry.clone(),
        }
    }
}

impl<E> fmt::Debug for RetryPolicy<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .field("jitter", &self.jitter)
            .field("has_observer", &self.on_retry.is_some())
            .finish_non_exhaustive()
    }
}

impl<E: Classify + 'static> Default for RetryPolicy<E> {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl<E: Classify + 'static> From<&RetryConfig> for RetryPolicy<E> {
    fn from(config: &RetryConfig) -> Self {
        Self::with_predicate(crate::error::classify::is_retryable::<E>)
            .with_max_retries(config.max_retries)
            .with_base_delay(Duration::from_millis(config.base_delay_ms))
            .with_max_delay(Duration::from_millis(config.max_delay_ms))
            .with_jitter(config.jitter)
    }
}

impl<E> RetryPolicy<E> {
    /// 使用自定义可重试谓词创建，其余参数取默认值
    #[must_use]
    pub fn with_predicate<P>(retryable: P) -> Self
    where
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        let defaults = RetryConfig::default();
        Self {
            max_retries: defaults.max_retries,
            base_delay: Duration::from_millis(defaults.base_delay_ms),
            max_delay: Duration::from_millis(defaults.max_delay_ms),
            jitter: defaults.jitter,
            retryable: Arc::new(retryable),
            on_retry: None,
        }
    }

    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub const fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    #[must_use]
    pub const fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    #[must_use]
    pub const fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// 每次重试等待前调用，参数为 `(重试序号, 等待时长, 错误)`
    #[must_use]
    pub fn on_retry<O>(mut self, observer: O) -> Self
    where
        O: Fn(u32, Duration, &E) + Send + Sync + 'static,
    {
        self.on_retry = Some(Arc::new(observer));
        self
    }

    /// 错误是否可重试
    pub fn is_retryable(&self, error: &E) -> bool {
        (self.retryable)(error)
    }

    /// 第 `attempt` 次失败后的基础等待时长（不含抖动）
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    fn sleep_duration(&self, attempt: u32) -> Duration {
        let delay = self.delay_for(attempt);
        if self.jitter {
            delay.mul_f64(fastrand::f64().mul_add(0.5, 0.5))
        } else {
            delay
        }
    }
}

/// 按策略执行 `operation`，失败时重试
pub async fn with_retry<T, E, F, Fut>(mut operation: F, policy: &RetryPolicy<E>) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let mut attempt: u32 = 0;
    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    ldebug!(
                        "system",
                        LogStage::Retry,
                        LogComponent::RetryExecutor,
                        "retry_success",
                        &format!("第{}次尝试成功", attempt + 1)
                    );
                }
                return Ok(value);
            }
            Err(error) => {
                if !policy.is_retryable(&error) {
                    ldebug!(
                        "system",
                        LogStage::Retry,
                        LogComponent::RetryExecutor,
                        "non_retryable_error",
                        &format!("错误不可重试，立即返回: {error}")
                    );
                    return Err(error);
                }
                if attempt >= policy.max_retries {
                    lwarn!(
                        "system",
                        LogStage::Retry,
                        LogComponent::RetryExecutor,
                        "retries_exhausted",
                        &format!("已尝试{}次，放弃: {error}", attempt + 1)
                    );
                    return Err(error);
                }

                let delay = policy.sleep_duration(attempt);
                ldebug!(
                    "system",
                    LogStage::Retry,
                    LogComponent::RetryExecutor,
                    "retrying",
                    &format!("第{}次尝试失败，{delay:?}后重试: {error}", attempt + 1)
                );
                if let Some(observer) = &policy.on_retry {
                    observer(attempt + 1, delay, &error);
                }
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
