//! # 缓存键命名规范
//!
//! 聚合数据的缓存键统一在这里生成，前缀失效依赖这些命名保持一致。

use serde::{Deserialize, Serialize};
use std::fmt;

use super::TtlCache;

/// 缓存键类型
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheKey {
    /// 排行榜 - `leaderboard:{kind}:{period}:{limit}`
    Leaderboard {
        kind: String,
        period: String,
        limit: u32,
    },

    /// 分支评分 - `branch_rating:{branch}:{period}`
    BranchRating { branch: String, period: String },

    /// 当前评分快照 - `current_ratings:{scope}`
    CurrentRatings { scope: String },

    /// 分支聚合指标 - `branch_aggregate:{branch}:{metric}`
    BranchAggregate { branch: String, metric: String },

    /// 自定义键 - `{prefix}:{key}`
    Custom { prefix: String, key: String },
}

impl CacheKey {
    /// 生成缓存键字符串
    #[must_use]
    pub fn build(&self) -> String {
        match self {
            Self::Leaderboard {
                kind,
                period,
                limit,
            } => format!(
                "leaderboard:{}:{}:{limit}",
                sanitize_segment(kind),
                sanitize_segment(period)
            ),
            Self::BranchRating { branch, period } => format!(
                "branch_rating:{}:{}",
                sanitize_segment(branch),
                sanitize_segment(period)
            ),
            Self::CurrentRatings { scope } => {
                format!("current_ratings:{}", sanitize_segment(scope))
            }
            Self::BranchAggregate { branch, metric } => format!(
                "branch_aggregate:{}:{}",
                sanitize_segment(branch),
                sanitize_segment(metric)
            ),
            Self::Custom { prefix, key } => {
                format!("{}:{}", sanitize_segment(prefix), sanitize_segment(key))
            }
        }
    }

    /// 同类键的公共前缀，用于批量失效
    #[must_use]
    pub fn prefix(&self) -> String {
        match self {
            Self::Custom { prefix, .. } => format!("{}:", sanitize_segment(prefix)),
            _ => format!("{}:", self.namespace()),
        }
    }

    /// 命名空间
    #[must_use]
    pub const fn namespace(&self) -> &'static str {
        match self {
            Self::Leaderboard { .. } => "leaderboard",
            Self::BranchRating { .. } => "branch_rating",
            Self::CurrentRatings { .. } => "current_ratings",
            Self::BranchAggregate { .. } => "branch_aggregate",
            Self::Custom { .. } => "custom",
        }
    }

    /// 是否依赖评分结果（评分重算后需要失效）
    #[must_use]
    pub const fn is_rating(&self) -> bool {
        matches!(
            self,
            Self::Leaderboard { .. } | Self::BranchRating { .. } | Self::CurrentRatings { .. }
        )
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.build())
    }
}

impl From<CacheKey> for String {
    fn from(key: CacheKey) -> Self {
        key.build()
    }
}

/// 清理键片段：分隔符 `:` 和空白替换为 `_`，统一小写
fn sanitize_segment(segment: &str) -> String {
    segment
        .trim()
        .replace([':', ' ', '/', '?', '&', '='], "_")
        .to_lowercase()
}

/// 缓存键构建器
pub struct CacheKeyBuilder;

impl CacheKeyBuilder {
    /// 排行榜缓存键
    #[must_use]
    pub fn leaderboard(kind: &str, period: &str, limit: u32) -> CacheKey {
        CacheKey::Leaderboard {
            kind: kind.to_string(),
            period: period.to_string(),
            limit,
        }
    }

    /// 分支评分缓存键
    #[must_use]
    pub fn branch_rating(branch: &str, period: &str) -> CacheKey {
        CacheKey::BranchRating {
            branch: branch.to_string(),
            period: period.to_string(),
        }
    }

    /// 当前评分快照缓存键
    #[must_use]
    pub fn current_ratings(scope: &str) -> CacheKey {
        CacheKey::CurrentRatings {
            scope: scope.to_string(),
        }
    }

    /// 分支聚合指标缓存键
    #[must_use]
    pub fn branch_aggregate(branch: &str, metric: &str) -> CacheKey {
        CacheKey::BranchAggregate {
            branch: branch.to_string(),
            metric: metric.to_string(),
        }
    }

    /// 自定义缓存键
    #[must_use]
    pub fn custom(prefix: &str, key: &str) -> CacheKey {
        CacheKey::Custom {
            prefix: prefix.to_string(),
            key: key.to_string(),
        }
    }
}

/// 评分重算后失效所有依赖评分的缓存，返回删除数量
pub fn invalidate_ratings<V: Clone>(cache: &TtlCache<V>) -> usize {
    [
        CacheKeyBuilder::leaderboard("", "", 0),
        CacheKeyBuilder::branch_rating("", ""),
        CacheKeyBuilder::current_ratings(""),
    ]
    .iter()
    .map(|key| cache.delete_prefix(&key.prefix()))
    .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_cache_key_build() {
        assert_eq!(
            CacheKeyBuilder::leaderboard("officers", "monthly", 10).build(),
            "leaderboard:officers:monthly:10"
        );
        assert_eq!(
            CacheKeyBuilder::branch_rating("Kampala Central", "2024-Q3").build(),
            "branch_rating:kampala_central:2024-q3"
        );
        assert_eq!(
            CacheKeyBuilder::branch_aggregate("12", "par30").to_string(),
            "branch_aggregate:12:par30"
        );
        assert_eq!(
            CacheKeyBuilder::custom("reports", "pending").build(),
            "reports:pending"
        );
    }

    #[test]
    fn test_separator_in_segment_cannot_collide() {
        let key = CacheKeyBuilder::branch_rating("a:b", "c");
        assert_eq!(key.build(), "branch_rating:a_b:c");
    }

    #[test]
    fn test_prefix() {
        assert_eq!(
            CacheKeyBuilder::leaderboard("officers", "weekly", 5).prefix(),
            "leaderboard:"
        );
        assert_eq!(CacheKeyBuilder::custom("reports", "x").prefix(), "reports:");
        assert!(CacheKeyBuilder::current_ratings("all").is_rating());
        assert!(!CacheKeyBuilder::branch_aggregate("1", "par30").is_rating());
    }

    #[test]
    fn test_invalidate_ratings_keeps_aggregates() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.set(CacheKeyBuilder::leaderboard("officers", "monthly", 10), 1, None);
        cache.set(CacheKeyBuilder::branch_rating("12", "monthly"), 2, None);
        cache.set(CacheKeyBuilder::current_ratings("all"), 3, None);
        cache.set(CacheKeyBuilder::branch_aggregate("12", "par30"), 4, None);

        assert_eq!(invalidate_ratings(&cache), 3);
        assert_eq!(
            cache.stats().keys,
            vec!["branch_aggregate:12:par30".to_string()]
        );
    }
}
