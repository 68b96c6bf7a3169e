//! # 测试数据 Fixtures
//!
//! 构造未签名的测试令牌。客户端从不校验签名，所以签名段用固定占位符。

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use serde_json::{Value, json};

/// 用给定的 claims 构造 `header.payload.signature` 形状的令牌
#[must_use]
pub fn make_token(claims: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.signature")
}

/// 距现在 `secs` 秒后过期的令牌（负数表示已经过期）
#[must_use]
pub fn token_expiring_in(secs: i64) -> String {
    make_token(&json!({
        "exp": Utc::now().timestamp() + secs,
        "sub": "42",
        "email": "officer@mfi.example",
        "role": "loan_officer",
        "branch": "Kampala Central",
        "state": "active"
    }))
}

/// 一小时后过期的令牌
#[must_use]
pub fn fresh_token() -> String {
    token_expiring_in(3600)
}

/// 已经进入过期缓冲区的令牌
#[must_use]
pub fn expiring_token() -> String {
    token_expiring_in(60)
}
