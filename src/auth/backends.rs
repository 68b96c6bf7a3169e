//! # 凭证存储后端
//!
//! 同步的键值存储抽象。浏览器之外的环境（CLI、服务端）用内存或文件
//! 实现替代 localStorage，用 [`CookieJarBackend`] 替代 `document.cookie`。

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use cookie::{Cookie, CookieJar, SameSite};
use dashmap::DashMap;

use crate::error::{ClientError, Result};

/// 同步键值存储后端
pub trait StorageBackend: Send + Sync + fmt::Debug {
    /// 后端名称（用于日志）
    fn name(&self) -> &'static str;

    /// 读取键值
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// 写入键值
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// 删除键
    fn remove(&self, key: &str) -> Result<()>;
}

/// 进程内存后端
#[derive(Debug, Default)]
pub struct MemoryBackend {
    data: DashMap<String, String>,
}

impl MemoryBackend {
    /// 创建空的内存后端
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.data.get(key).map(|v| v.value().clone()))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.data.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.data.remove(key);
        Ok(())
    }
}

/// 什么都不存的后端，用于没有任何持久化能力的目标
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopBackend;

impl StorageBackend for NoopBackend {
    fn name(&self) -> &'static str {
        "noop"
    }

    fn get(&self, _key: &str) -> Result<Option<String>> {
        Ok(None)
    }

    fn set(&self, _key: &str, _value: &str) -> Result<()> {
        Ok(())
    }

    fn remove(&self, _key: &str) -> Result<()> {
        Ok(())
    }
}

/// JSON 文件后端：整个文件是一个 `{key: value}` 对象
///
/// 每次写入都先写临时文件再 rename，避免留下半截文件。
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileBackend {
    /// 使用指定文件路径创建后端（文件不存在时视为空）
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// 文件路径
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                ClientError::storage_with_source(
                    format!("凭证文件已损坏: {}", self.path.display()),
                    e,
                )
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(ClientError::storage_with_source(
                format!("读取凭证文件失败: {}", self.path.display()),
                e,
            )),
        }
    }

    fn persist(&self, data: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                ClientError::storage_with_source(
                    format!("无法创建凭证目录: {}", parent.display()),
                    e,
                )
            })?;
        }

        let tmp = self.path.with_extension("tmp");
        let content = serde_json::to_string_pretty(data)?;
        std::fs::write(&tmp, content).map_err(|e| {
            ClientError::storage_with_source(format!("写入凭证文件失败: {}", tmp.display()), e)
        })?;
        std::fs::rename(&tmp, &self.path).map_err(|e| {
            ClientError::storage_with_source(
                format!("替换凭证文件失败: {}", self.path.display()),
                e,
            )
        })
    }

    fn update(&self, f: impl FnOnce(&mut BTreeMap<String, String>)) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut data = self.load()?;
        f(&mut data);
        self.persist(&data)
    }
}

impl StorageBackend for FileBackend {
    fn name(&self) -> &'static str {
        "file"
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.update(|data| {
            data.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.update(|data| {
            data.remove(key);
        })
    }
}

/// Cookie jar 后端
///
/// 用 `Cookie` 请求头初始化（等价于浏览器的 `document.cookie`），
/// 写入会产生 `Set-Cookie` 变更，供服务端上下文回写给浏览器。
#[derive(Default)]
pub struct CookieJarBackend {
    jar: Mutex<CookieJar>,
}

impl fmt::Debug for CookieJarBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // cookie 值包含令牌，不输出
        f.debug_struct("CookieJarBackend").finish_non_exhaustive()
    }
}

impl CookieJarBackend {
    /// 空的 cookie jar
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// 从 `Cookie` 请求头解析，格式错误的片段会被跳过
    #[must_use]
    pub fn from_header(header: &str) -> Self {
        let mut jar = CookieJar::new();
        for cookie in Cookie::split_parse(header.to_string()).flatten() {
            jar.add_original(cookie.into_owned());
        }
        Self {
            jar: Mutex::new(jar),
        }
    }

    /// 当前可见的 cookie，渲染为 `Cookie` 请求头
    #[must_use]
    pub fn header_value(&self) -> String {
        let jar = self.jar.lock().unwrap_or_else(PoisonError::into_inner);
        jar.iter()
            .map(|c| format!("{}={}", c.name(), c.value()))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// 自创建以来的变更，渲染为 `Set-Cookie` 头
    #[must_use]
    pub fn set_cookie_headers(&self) -> Vec<String> {
        let jar = self.jar.lock().unwrap_or_else(PoisonError::into_inner);
        jar.delta().map(ToString::to_string).collect()
    }
}

impl StorageBackend for CookieJarBackend {
    fn name(&self) -> &'static str {
        "cookie"
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        let jar = self.jar.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(jar.get(key).map(|c| c.value().to_string()))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let cookie = Cookie::build((key.to_string(), value.to_string()))
            .path("/")
            .same_site(SameSite::Lax)
            .build();
        self.jar
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .add(cookie);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let removal = Cookie::build(key.to_string()).path("/").build();
        self.jar
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(removal);
        Ok(())
    }
}
