//! # 测试框架模块
//!
//! 单元测试共用的令牌 fixtures、mock 后端和辅助函数

pub mod fixtures;
pub mod helpers;
pub mod mocks;

pub use fixtures::*;
pub use helpers::*;
pub use mocks::*;
