// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! 公共目录静态文件的内存缓存

use std::fs;
use std::num::NonZeroUsize;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use bytes::Bytes;
use log::debug;
use lru::LruCache;
use percent_encoding::percent_decode_str;

use crate::{exception::Exception, response::get_mime};

/// 一个已读入内存的静态文件
#[derive(Debug, Clone, PartialEq)]
pub struct Asset {
    pub body: Bytes,
    pub mime: &'static str,
}

#[derive(Clone)]
struct CacheEntry {
    asset: Asset,
    modified_time: SystemTime,
}

/// 以文件路径为键、修改时间判定有效性的 LRU 缓存
pub struct AssetCache {
    root: PathBuf,
    cache: LruCache<PathBuf, CacheEntry>,
}

impl AssetCache {
    pub fn new(root: impl Into<PathBuf>, capacity: NonZeroUsize) -> Self {
        Self {
            root: root.into(),
            cache: LruCache::new(capacity),
        }
    }

    /// 把请求路径映射到公共目录中的文件。路径含 `..` 等越界片段或不是普通文件时返回 `None`。
    pub fn locate(&self, request_path: &str) -> Option<PathBuf> {
        let decoded = percent_decode_str(request_path).decode_utf8().ok()?;
        let relative = decoded.trim_start_matches('/');
        if relative.is_empty() || relative.contains(['\\', '\0']) {
            return None;
        }
        let relative = Path::new(relative);
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return None;
        }
        let path = self.root.join(relative);
        path.is_file().then_some(path)
    }

    /// 读取文件，修改时间未变时直接返回缓存内容。
    pub fn fetch(&mut self, path: &Path) -> Result<Asset, Exception> {
        let modified_time = fs::metadata(path)?.modified()?;
        if let Some(entry) = self.cache.get(path) {
            if entry.modified_time == modified_time {
                debug!("静态文件缓存命中：{}", path.display());
                return Ok(entry.asset.clone());
            }
        }
        let body = Bytes::from(fs::read(path)?);
        let mime = path
            .extension()
            .map(get_mime)
            .unwrap_or("application/octet-stream");
        let asset = Asset { body, mime };
        self.cache.put(
            path.to_path_buf(),
            CacheEntry {
                asset: asset.clone(),
                modified_time,
            },
        );
        Ok(asset)
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}
