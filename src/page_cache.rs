// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 整页缓存
//!
//! 每个缓存条目对应缓存目录下的一个文件，文件名是
//! `完整URL::缓存键::minified` 的 MD5 十六进制摘要。
//!
//! 文件内容采用定长头部的二进制信封：
//!
//! ```text
//! +--------+---------+-------------+-----------------+------+
//! | "MSPC" | version | status (u16)| body len (u64)  | body |
//! +--------+---------+-------------+-----------------+------+
//! ```
//!
//! 没有魔数的文件按旧格式 `<状态码>====<正文>` 解析。旧格式在正文包含分隔符时会截断正文，
//! 新写入的条目一律使用二进制信封。

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use log::{debug, warn};
use md5::{Digest, Md5};

use crate::exception::Exception;
use crate::param::LEGACY_CACHE_SENTINEL;

const MAGIC: &[u8; 4] = b"MSPC";
const VERSION: u8 = 1;
const HEADER_LEN: usize = MAGIC.len() + 1 + 2 + 8;

/// 一个缓存条目：状态码与响应正文
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub status: u16,
    pub body: Bytes,
}

/// 基于文件的整页缓存
#[derive(Debug, Clone)]
pub struct PageCache {
    dir: PathBuf,
}

impl PageCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 由请求 URL、缓存键和压缩开关推导缓存键（MD5 十六进制摘要）。
    pub fn key_for(full_url: &str, cache_key: &str, minify: bool) -> String {
        let source = format!(
            "{}::{}::{}",
            full_url,
            cache_key,
            if minify { "minified" } else { "" }
        );
        hex::encode(Md5::digest(source.as_bytes()))
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    /// 读取缓存条目，不存在时返回 `Ok(None)`。
    pub fn load(&self, key: &str) -> Result<Option<CacheEntry>, Exception> {
        let raw = match fs::read(self.path_for(key)) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        decode(key, Bytes::from(raw)).map(Some)
    }

    /// 写入缓存条目。
    ///
    /// 内容先写入同目录下的临时文件再原子改名，并发写同一个键时后写者生效。
    pub fn store(&self, key: &str, status: u16, body: &[u8]) -> Result<PathBuf, Exception> {
        fs::create_dir_all(&self.dir)?;
        let mut file = tempfile::Builder::new()
            .prefix(".tmp-")
            .tempfile_in(&self.dir)?;
        file.write_all(&encode(status, body))?;
        file.flush()?;
        let target = self.path_for(key);
        file.persist(&target).map_err(|e| Exception::Io(e.error))?;
        debug!("页面已写入缓存：{}", target.display());
        Ok(target)
    }

    /// 删除缓存目录下的所有文件，返回删除的文件数。
    pub fn clear(&self) -> Result<usize, Exception> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        let mut count = 0;
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                fs::remove_file(entry.path())?;
                count += 1;
            } else {
                warn!("缓存目录中存在非文件条目：{}，已跳过", entry.path().display());
            }
        }
        Ok(count)
    }
}

fn encode(status: u16, body: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + body.len());
    buf.put_slice(MAGIC);
    buf.put_u8(VERSION);
    buf.put_u16(status);
    buf.put_u64(body.len() as u64);
    buf.put_slice(body);
    buf.freeze()
}

fn decode(key: &str, mut raw: Bytes) -> Result<CacheEntry, Exception> {
    if !raw.starts_with(MAGIC) {
        return decode_legacy(key, &raw);
    }
    let corrupt = |reason: &str| Exception::CorruptCacheEntry {
        key: key.to_string(),
        reason: reason.to_string(),
    };
    if raw.len() < HEADER_LEN {
        return Err(corrupt("truncated header"));
    }
    raw.advance(MAGIC.len());
    let version = raw.get_u8();
    if version != VERSION {
        return Err(corrupt("unknown envelope version"));
    }
    let status = raw.get_u16();
    let len = raw.get_u64();
    if raw.len() as u64 != len {
        return Err(corrupt("body length mismatch"));
    }
    Ok(CacheEntry { status, body: raw })
}

/// 按旧格式拆分：取第一个分隔符之前的状态码，以及第一、第二个分隔符之间的正文。
fn decode_legacy(key: &str, raw: &[u8]) -> Result<CacheEntry, Exception> {
    let text = String::from_utf8_lossy(raw);
    let mut parts = text.split(LEGACY_CACHE_SENTINEL);
    let code = parts.next().unwrap_or_default();
    let body = parts.next().ok_or_else(|| Exception::CorruptCacheEntry {
        key: key.to_string(),
        reason: "missing sentinel".to_string(),
    })?;
    let status = code
        .trim()
        .parse::<u16>()
        .map_err(|_| Exception::CorruptCacheEntry {
            key: key.to_string(),
            reason: format!("invalid status code {:?}", code),
        })?;
    Ok(CacheEntry {
        status,
        body: Bytes::from(body.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::TempDir;

    #[test]
    fn test_key_is_md5_of_joined_parts() {
        let key = PageCache::key_for("http://example.com/about", "v1", true);
        let expected = hex::encode(Md5::digest(b"http://example.com/about::v1::minified"));
        assert_eq!(key, expected);
        assert_eq!(key.len(), 32);
    }

    #[test]
    fn test_key_changes_with_minify_and_cache_key() {
        let url = "http://example.com/";
        let base = PageCache::key_for(url, "v1", false);
        assert_ne!(base, PageCache::key_for(url, "v1", true));
        assert_ne!(base, PageCache::key_for(url, "v2", false));
    }

    #[test]
    fn test_store_then_load() {
        let dir = TempDir::new().unwrap();
        let cache = PageCache::new(dir.path());
        cache.store("k", 200, b"X").unwrap();

        let entry = cache.load("k").unwrap().unwrap();
        assert_eq!(entry.status, 200);
        assert_eq!(entry.body, Bytes::from_static(b"X"));
    }

    #[test]
    fn test_envelope_keeps_sentinel_in_body() {
        let dir = TempDir::new().unwrap();
        let cache = PageCache::new(dir.path());
        let body = "<pre>====</pre>";
        cache.store("k", 200, body.as_bytes()).unwrap();

        let entry = cache.load("k").unwrap().unwrap();
        assert_eq!(entry.body, Bytes::from(body));
    }

    #[test]
    fn test_legacy_entry_is_readable() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("k"), "200====<p>hi</p>").unwrap();
        let entry = PageCache::new(dir.path()).load("k").unwrap().unwrap();
        assert_eq!(entry.status, 200);
        assert_eq!(entry.body, Bytes::from("<p>hi</p>"));
    }

    /// 旧格式的已知缺陷：正文中的分隔符会截断正文。
    #[test]
    fn test_legacy_entry_with_sentinel_in_body_mis_splits() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("k"), "200====a====b").unwrap();
        let entry = PageCache::new(dir.path()).load("k").unwrap().unwrap();
        assert_eq!(entry.status, 200);
        assert_eq!(entry.body, Bytes::from("a"));
        assert_ne!(entry.body, Bytes::from("a====b"));
    }

    #[test]
    fn test_load_missing_returns_none() {
        let dir = TempDir::new().unwrap();
        assert!(PageCache::new(dir.path()).load("nope").unwrap().is_none());
    }

    #[test]
    fn test_truncated_envelope_is_corrupt() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("k"), b"MSPC\x01\x00").unwrap();
        match PageCache::new(dir.path()).load("k") {
            Err(Exception::CorruptCacheEntry { key, .. }) => assert_eq!(key, "k"),
            other => panic!("Expected CorruptCacheEntry, got {:?}", other),
        }
    }

    #[test]
    fn test_clear_counts_files() {
        let dir = TempDir::new().unwrap();
        let cache = PageCache::new(dir.path());
        for key in ["a", "b", "c"] {
            cache.store(key, 200, b"body").unwrap();
        }
        assert_eq!(cache.clear().unwrap(), 3);
        assert_eq!(cache.clear().unwrap(), 0);
    }

    #[test]
    fn test_clear_missing_dir_returns_zero() {
        let dir = TempDir::new().unwrap();
        let cache = PageCache::new(dir.path().join("cache"));
        assert_eq!(cache.clear().unwrap(), 0);
    }

    #[test]
    fn test_store_unwritable_dir_is_reported() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("cache");
        fs::write(&blocker, "not a directory").unwrap();
        let cache = PageCache::new(&blocker);
        assert!(matches!(cache.store("k", 200, b"x"), Err(Exception::Io(_))));
    }

    proptest! {
        #[test]
        fn prop_key_is_deterministic_hex(url in "[a-z:/.?=&]{0,40}", key in "[a-z0-9.]{0,10}", minify: bool) {
            let a = PageCache::key_for(&url, &key, minify);
            let b = PageCache::key_for(&url, &key, minify);
            prop_assert_eq!(&a, &b);
            prop_assert_eq!(a.len(), 32);
            prop_assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        }
    }
}
