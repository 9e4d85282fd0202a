// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 永久重定向表
//!
//! 重定向规则来自 `config/redirect.toml` 的 `[redirects]` 表，键为旧路径、值为新路径，
//! 均为不带协议和主机名的相对路径。规则在启动时加载一次，之后只读。

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use log::{info, warn};
use serde_derive::Deserialize;

use crate::exception::Exception;

#[derive(Debug, Default, Deserialize)]
struct RedirectFile {
    #[serde(default)]
    redirects: HashMap<String, String>,
}

/// 旧路径到新路径的映射
#[derive(Debug, Clone, Default)]
pub struct RedirectMap {
    rules: HashMap<String, String>,
}

impl RedirectMap {
    /// 由规则构造映射。源路径与目标相同的规则会被丢弃，链式规则只记录警告。
    pub fn new(rules: HashMap<String, String>) -> Self {
        let mut map = Self { rules };
        map.rules.retain(|from, to| {
            if from == to {
                warn!("忽略自我重定向规则：{} -> {}", from, to);
                false
            } else {
                true
            }
        });
        for (from, to) in &map.rules {
            if map.rules.contains_key(to) {
                warn!("重定向规则 {} -> {} 的目标本身也是一条规则，客户端需要多次跳转", from, to);
            }
        }
        map
    }

    /// 从 TOML 文件加载，文件不存在时返回空表。
    pub fn from_toml(filename: impl AsRef<Path>) -> Result<Self, Exception> {
        let path = filename.as_ref();
        let source = match fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("未找到重定向配置{}，不启用重定向", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };
        let file: RedirectFile = toml::from_str(&source).map_err(|e| Exception::Config {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let map = Self::new(file.redirects);
        info!("已载入{}条重定向规则", map.len());
        Ok(map)
    }

    /// 查询重定向目标。命中且目标与当前路径不同时返回 `/` + 目标。
    pub fn resolve(&self, url: &str) -> Option<String> {
        match self.rules.get(url) {
            Some(target) if target != url => Some(format!("/{}", target)),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
