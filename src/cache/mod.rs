//! # 缓存模块
//!
//! 进程内 TTL 读缓存，挡在排行榜、分支汇总这类又慢又被频繁轮询的聚合
//! 接口前面。过期是惰性的：`get` 发现条目超时就删除并返回未命中；
//! 定期清理（[`sweeper`]）只用来限制内存。

pub mod keys;
pub mod sweeper;

pub use keys::{CacheKey, CacheKeyBuilder, invalidate_ratings};
pub use sweeper::spawn_sweeper;

use dashmap::DashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

use crate::ldebug;
use crate::logging::{LogComponent, LogStage};

/// 缓存条目
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub stored_at: Instant,
    pub ttl: Duration,
}

impl<V> CacheEntry<V> {
    /// 严格大于 TTL 才算过期
    #[must_use]
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) > self.ttl
    }
}

/// 缓存统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// 当前条目数（包含尚未被清理的过期条目）
    pub size: usize,
    /// 当前所有键
    pub keys: Vec<String>,
    pub hit_count: u64,
    pub miss_count: u64,
}

impl CacheStats {
    /// 命中率
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hit_count + self.miss_count;
        if total == 0 {
            0.0
        } else {
            self.hit_count as f64 / total as f64
        }
    }
}

/// TTL 缓存
///
/// 所有操作都是同步的，不会挂起。跨任务共享时用 `Arc<TtlCache<V>>`。
#[derive(Debug)]
pub struct TtlCache<V> {
    entries: DashMap<String, CacheEntry<V>>,
    default_ttl: Duration,
    hit_count: AtomicU64,
    miss_count: AtomicU64,
}

impl<V: Clone> TtlCache<V> {
    /// 使用默认 TTL 创建
    #[must_use]
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            default_ttl,
            hit_count: AtomicU64::new(0),
            miss_count: AtomicU64::new(0),
        }
    }

    /// 默认 TTL
    #[must_use]
    pub const fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// 写入（覆盖已有值并重置计时）；`ttl` 为 `None` 时使用默认 TTL
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Option<Duration>) {
        let key = key.into();
        let ttl = ttl.unwrap_or(self.default_ttl);
        ldebug!(
            "system",
            LogStage::Cache,
            LogComponent::Cache,
            "set",
            &format!("写入缓存 {key}"),
            ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX)
        );
        self.entries.insert(
            key,
            CacheEntry {
                value,
                stored_at: Instant::now(),
                ttl,
            },
        );
    }

    /// 读取；条目过期时顺便删除
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let expired = match self.entries.get(key) {
            Some(entry) if !entry.is_expired_at(now) => {
                self.hit_count.fetch_add(1, Ordering::Relaxed);
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            self.entries.remove_if(key, |_, entry| entry.is_expired_at(now));
            ldebug!(
                "system",
                LogStage::Cache,
                LogComponent::Cache,
                "expired",
                &format!("缓存 {key} 已过期")
            );
        }
        self.miss_count.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// 是否存在未过期的条目（不计入命中统计）
    pub fn has(&self, key: &str) -> bool {
        let now = Instant::now();
        let alive = self
            .entries
            .get(key)
            .map(|entry| !entry.is_expired_at(now));
        if alive == Some(false) {
            self.entries.remove_if(key, |_, entry| entry.is_expired_at(now));
        }
        alive == Some(true)
    }

    /// 删除单个键，返回是否存在
    pub fn delete(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// 删除所有以 `prefix` 开头的键，返回删除数量
    pub fn delete_prefix(&self, prefix: &str) -> usize {
        let removed = self
            .stats()
            .keys
            .into_iter()
            .filter(|key| key.starts_with(prefix))
            .filter(|key| self.delete(key))
            .count();
        ldebug!(
            "system",
            LogStage::Cache,
            LogComponent::Cache,
            "delete_prefix",
            &format!("按前缀 {prefix} 失效了 {removed} 个条目")
        );
        removed
    }

    /// 清空所有条目
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// 清除所有过期条目，返回清除数量
    pub fn clear_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired_at(now));
        before.saturating_sub(self.entries.len())
    }

    /// 条目数与键列表
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.entries.len(),
            keys: self.entries.iter().map(|e| e.key().clone()).collect(),
            hit_count: self.hit_count.load(Ordering::Relaxed),
            miss_count: self.miss_count.load(Ordering::Relaxed),
        }
    }

    /// 命中直接返回；未命中时调用 `fetch` 并写入结果。错误不缓存。
    pub async fn get_or_fetch<F, Fut, E>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        fetch: F,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }
        let value = fetch().await?;
        self.set(key, value.clone(), ttl);
        Ok(value)
    }
}
