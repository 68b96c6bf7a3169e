//! # 过期条目清理任务
//!
//! 按固定间隔调用 [`TtlCache::clear_expired`]，直到取消令牌被触发。
//! 正确性不依赖它，读路径本身就会丢弃过期条目。

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;

use super::TtlCache;
use crate::ldebug;
use crate::logging::{LogComponent, LogStage};

/// 启动清理任务
pub fn spawn_sweeper<V>(
    cache: Arc<TtlCache<V>>,
    period: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()>
where
    V: Clone + Send + Sync + 'static,
{
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // interval 的第一次 tick 立即完成
        ticker.tick().await;

        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    ldebug!(
                        "system",
                        LogStage::Shutdown,
                        LogComponent::CacheSweeper,
                        "stopped",
                        "缓存清理任务已停止"
                    );
                    return;
                }
                _ = ticker.tick() => {
                    let removed = cache.clear_expired();
                    if removed > 0 {
                        ldebug!(
                            "system",
                            LogStage::Cache,
                            LogComponent::CacheSweeper,
                            "sweep",
                            &format!("清理了 {removed} 个过期条目"),
                            remaining = cache.stats().size
                        );
                    }
                }
            }
        }
    })
}
