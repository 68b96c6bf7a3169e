//! # 响应形状归一化
//!
//! 后端不同版本返回的结构不一致：
//! - 令牌字段 `access_token` / `token`，`refresh_token` / `refreshToken`；
//! - 载荷可能是裸值、`{data: ...}` 或 `{success, data, message}`。
//!
//! 这里把它们统一成固定的内部结构。

use serde_json::{Map, Value};

use crate::error::{ClientError, Result};

/// 归一化后的令牌响应
#[derive(Debug, Clone, PartialEq)]
pub struct TokenEnvelope {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// 响应中附带的用户对象（原样保留）
    pub user: Option<Value>,
}

/// 从登录/刷新响应中提取令牌
///
/// 先看根对象，再看 `data` 对象；没有非空访问令牌时返回 `None`。
#[must_use]
pub fn normalize_token_response(body: &Value) -> Option<TokenEnvelope> {
    let root = body.as_object()?;
    let nested = root.get("data").and_then(Value::as_object);

    [Some(root), nested]
        .into_iter()
        .flatten()
        .find_map(|obj| {
            let access_token = non_empty_str(obj, &["access_token", "token"])?;
            Some(TokenEnvelope {
                access_token,
                refresh_token: non_empty_str(obj, &["refresh_token", "refreshToken"])
                    .or_else(|| non_empty_str(root, &["refresh_token", "refreshToken"])),
                user: obj
                    .get("user")
                    .or_else(|| root.get("user"))
                    .filter(|u| u.is_object())
                    .cloned(),
            })
        })
}

fn non_empty_str(obj: &Map<String, Value>, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        obj.get(*name)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
    })
}

/// 通用业务响应的三种形状
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseShape {
    /// 直接返回数据（数组、对象或标量）
    Bare(Value),
    /// `{data: ...}`
    Wrapped(Value),
    /// `{success: bool, data?: ..., message?: ...}`
    Envelope {
        success: bool,
        data: Option<Value>,
        message: Option<String>,
    },
}

impl From<Value> for ResponseShape {
    fn from(body: Value) -> Self {
        let Value::Object(mut obj) = body else {
            return Self::Bare(body);
        };

        if let Some(success) = obj.get("success").and_then(Value::as_bool) {
            return Self::Envelope {
                success,
                data: obj.remove("data"),
                message: obj
                    .remove("message")
                    .and_then(|m| m.as_str().map(ToString::to_string)),
            };
        }

        if obj.len() == 1 && obj.contains_key("data") {
            return Self::Wrapped(obj.remove("data").unwrap_or(Value::Null));
        }

        Self::Bare(Value::Object(obj))
    }
}

impl ResponseShape {
    /// 取出数据部分
    ///
    /// `success: false` 的信封视为失败，而不是把任何非空响应都当成功。
    pub fn into_data(self) -> Result<Value> {
        match self {
            Self::Bare(value) | Self::Wrapped(value) => Ok(value),
            Self::Envelope {
                success: true,
                data,
                ..
            } => Ok(data.unwrap_or(Value::Null)),
            Self::Envelope {
                success: false,
                message,
                ..
            } => Err(ClientError::http(
                200,
                message.unwrap_or_else(|| "服务端返回 success=false".to_string()),
            )),
        }
    }
}
