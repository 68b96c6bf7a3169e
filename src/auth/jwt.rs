//! # JWT 载荷解析
//!
//! 客户端只做乐观的过期判断：解码 payload 但不校验签名，服务端仍是令牌
//! 有效性的最终裁决者。任何解码失败都按"已过期"处理（fail-closed）。

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

use crate::error::{ClientError, Result};

/// 令牌中解出的用户身份（只读投影，从不单独持久化）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub branch: Option<String>,
    pub state: Option<String>,
}

/// 判断字符串是否具有 `header.payload.signature` 的形状
#[must_use]
pub fn is_token_shaped(token: &str) -> bool {
    let mut parts = token.split('.');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(header), Some(payload), Some(_signature), None) => {
            !header.is_empty() && !payload.is_empty()
        }
        _ => false,
    }
}

/// 解码 payload 为 JSON 对象（不校验签名）
pub fn decode_claims(token: &str) -> Result<Map<String, Value>> {
    if !is_token_shaped(token) {
        return Err(ClientError::authentication("令牌格式无效"));
    }

    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| ClientError::authentication("令牌缺少 payload 段"))?;

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| ClientError::authentication_with_source("payload 不是合法的 base64url", e))?;

    match serde_json::from_slice::<Value>(&bytes)? {
        Value::Object(claims) => Ok(claims),
        _ => Err(ClientError::authentication("payload 不是 JSON 对象")),
    }
}

/// `exp` 声明（毫秒）。缺失或不是有限数字时返回 `None`
fn expiry_millis(claims: &Map<String, Value>) -> Option<f64> {
    claims
        .get("exp")
        .and_then(Value::as_f64)
        .filter(|exp| exp.is_finite())
        .map(|exp| exp * 1000.0)
}

/// 令牌的过期时间
#[must_use]
pub fn expires_at(token: &str) -> Option<DateTime<Utc>> {
    let claims = decode_claims(token).ok()?;
    #[allow(clippy::cast_possible_truncation)]
    let millis = expiry_millis(&claims)?.floor() as i64;
    Utc.timestamp_millis_opt(millis).single()
}

/// 在 `now` 时刻、考虑 `buffer` 缓冲的情况下令牌是否已过期
///
/// 当且仅当 `exp * 1000 <= now_ms + buffer_ms` 或解码失败时返回 `true`。
#[must_use]
pub fn is_expired_at(token: &str, now: DateTime<Utc>, buffer: Duration) -> bool {
    let Ok(claims) = decode_claims(token) else {
        return true;
    };
    let Some(exp_ms) = expiry_millis(&claims) else {
        return true;
    };

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_wrap)]
    let deadline_ms = (now.timestamp_millis() + buffer.as_millis() as i64) as f64;
    exp_ms <= deadline_ms
}

/// 从令牌中解出用户身份
#[must_use]
pub fn decode_user(token: &str) -> Option<SessionUser> {
    let claims = decode_claims(token).ok()?;
    Some(SessionUser {
        id: first_string(&claims, &["id", "user_id", "userId", "sub"]),
        email: first_string(&claims, &["email"]),
        role: first_string(&claims, &["role"]),
        branch: first_string(&claims, &["branch", "branch_name", "branchName"]),
        state: first_string(&claims, &["state"]),
    })
}

/// 依次尝试多个声明名，数字会被转成字符串
fn first_string(claims: &Map<String, Value>, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| match claims.get(*name) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
