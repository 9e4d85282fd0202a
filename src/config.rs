// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 配置模块
//!
//! 配置以 TOML 树的形式保存在 [`ConfigStore`] 中，支持点分路径（如 `cache.enable`）读写。
//! [`Config`] 在其上提供带默认值的强类型访问器，由启动流程构造后显式传递给各组件。

use std::fs;
use std::path::{Path, PathBuf};

use log::warn;
use toml::{Table, Value};

use crate::exception::Exception;
use crate::mail::Mailbox;

const DEFAULT_PORT: u16 = 7878;
const DEFAULT_MAX_REQUEST_SIZE: usize = 1024 * 1024;
const DEFAULT_ASSET_CAPACITY: usize = 64;

fn split_key(key: &str) -> impl Iterator<Item = &str> {
    key.split('.').filter(|segment| !segment.is_empty())
}

/// 点分路径键值存储。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigStore {
    tree: Table,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self { tree: Table::new() }
    }

    pub fn from_table(tree: Table) -> Self {
        Self { tree }
    }

    /// 合并一棵配置树。
    ///
    /// 只在顶层合并：同名的顶层键会被整体替换，嵌套键不会逐层合并。
    pub fn merge(&mut self, other: Table) {
        for (key, value) in other {
            self.tree.insert(key, value);
        }
    }

    /// 按点分路径读取配置值，路径中任一段不存在或不是表时返回 `None`。
    pub fn get(&self, key: &str) -> Option<&Value> {
        let mut segments = split_key(key);
        let first = segments.next()?;
        let mut current = self.tree.get(first)?;
        for segment in segments {
            current = current.as_table()?.get(segment)?;
        }
        Some(current)
    }

    /// 按点分路径写入配置值，沿途缺失或非表的节点会被替换为空表。
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        let segments: Vec<&str> = split_key(key).collect();
        let Some((last, parents)) = segments.split_last() else {
            return;
        };
        let mut current = &mut self.tree;
        for segment in parents {
            let slot = current
                .entry(segment.to_string())
                .or_insert(Value::Table(Table::new()));
            if !slot.is_table() {
                *slot = Value::Table(Table::new());
            }
            let Value::Table(table) = slot else {
                return;
            };
            current = table;
        }
        current.insert(last.to_string(), value.into());
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    pub fn get_integer(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_integer)
    }

    pub fn tree(&self) -> &Table {
        &self.tree
    }
}

/// 站点运行配置。
#[derive(Debug, Clone, Default)]
pub struct Config {
    store: ConfigStore,
}

impl Config {
    pub fn new() -> Self {
        Self {
            store: ConfigStore::new(),
        }
    }

    pub fn from_store(store: ConfigStore) -> Self {
        Self { store }
    }

    pub fn from_toml(filename: impl AsRef<Path>) -> Result<Self, Exception> {
        let path = filename.as_ref();
        let str_val = fs::read_to_string(path)?;
        Self::parse(&str_val, &path.display().to_string())
    }

    pub fn parse(source: &str, origin: &str) -> Result<Self, Exception> {
        let tree: Table = toml::from_str(source).map_err(|e| Exception::Config {
            path: origin.to_string(),
            message: e.to_string(),
        })?;
        let mut config = Self::from_store(ConfigStore::from_table(tree));
        if config.store.get_integer("cache.asset_capacity") == Some(0) {
            warn!("cache.asset_capacity被设置为0，但静态资源缓存不能禁用，因此该值将被改为{}。", DEFAULT_ASSET_CAPACITY);
            config
                .store
                .set("cache.asset_capacity", DEFAULT_ASSET_CAPACITY as i64);
        }
        Ok(config)
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// 以键名读取字符串并转换为路径，缺失时使用默认值。
    fn path_or(&self, key: &str, default: &str) -> PathBuf {
        PathBuf::from(self.store.get_str(key).unwrap_or(default))
    }
}

impl Config {
    pub fn site_url(&self) -> &str {
        self.store.get_str("site_url").unwrap_or("/")
    }

    pub fn debug(&self) -> bool {
        self.store.get_bool("debug").unwrap_or(false)
    }

    pub fn log_enabled(&self) -> bool {
        self.store.get_bool("log").unwrap_or(false)
    }

    pub fn minify(&self) -> bool {
        self.store.get_bool("minify").unwrap_or(false)
    }

    pub fn cache_enabled(&self) -> bool {
        self.store.get_bool("cache.enable").unwrap_or(false)
    }

    pub fn cache_key(&self) -> &str {
        self.store.get_str("cache.key").unwrap_or("")
    }

    pub fn asset_capacity(&self) -> usize {
        self.store
            .get_integer("cache.asset_capacity")
            .and_then(|c| usize::try_from(c).ok())
            .filter(|&c| c > 0)
            .unwrap_or(DEFAULT_ASSET_CAPACITY)
    }

    pub fn port(&self) -> u16 {
        self.store
            .get_integer("server.port")
            .and_then(|p| u16::try_from(p).ok())
            .unwrap_or(DEFAULT_PORT)
    }

    /// 工作线程数，配置为 0 或缺失时取 CPU 核心数。
    pub fn worker_threads(&self) -> usize {
        match self
            .store
            .get_integer("server.worker_threads")
            .and_then(|n| usize::try_from(n).ok())
        {
            Some(n) if n > 0 => n,
            _ => num_cpus::get(),
        }
    }

    pub fn local(&self) -> bool {
        self.store.get_bool("server.local").unwrap_or(true)
    }

    pub fn max_request_size(&self) -> usize {
        self.store
            .get_integer("server.max_request_size")
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(DEFAULT_MAX_REQUEST_SIZE)
    }

    pub fn pages_dir(&self) -> PathBuf {
        self.path_or("paths.pages", "app/pages")
    }

    pub fn public_dir(&self) -> PathBuf {
        self.path_or("paths.public", "public")
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.path_or("paths.temp", "temp")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.temp_dir().join("cache")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.temp_dir().join("logs")
    }

    pub fn mail_queue_dir(&self) -> PathBuf {
        self.temp_dir().join("mail-queue")
    }

    pub fn redirects_file(&self) -> PathBuf {
        self.path_or("paths.redirects", "config/redirect.toml")
    }

    pub fn template_extension(&self) -> &str {
        self.store
            .get_str("paths.template_extension")
            .unwrap_or("html")
    }

    /// 静态资源基础路径，`kind` 为 `image`、`js`、`css` 或 `favicon`。
    pub fn resource_base(&self, kind: &str) -> String {
        match self.store.get_str(&format!("resources.{}", kind)) {
            Some(base) => base.to_string(),
            None => format!("/{}/", kind),
        }
    }

    pub fn smtp_from(&self) -> Option<Mailbox> {
        self.store
            .get("smtp.from")
            .cloned()
            .and_then(|v| v.try_into().ok())
    }

    /// 某类表单（`contact`、`career`、`quote`）的通知收件人列表。
    pub fn mail_receivers(&self, form: &str) -> Vec<Mailbox> {
        match self.store.get(&format!("mail_receiver.{}", form)).cloned() {
            Some(value) => match value.try_into() {
                Ok(list) => list,
                Err(e) => {
                    warn!("mail_receiver.{}配置格式不正确：{}", form, e);
                    Vec::new()
                }
            },
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
site_url = "https://example.com/"
debug = true
minify = true

[cache]
enable = true
key = "v1.0.0"

[server]
port = 8080
worker_threads = 2

[smtp.from]
name = "Site"
email = "noreply@example.com"

[mail_receiver]
contact = [{ name = "Sales", email = "sales@example.com" }]
"#;

    #[test]
    fn test_dotted_get() {
        let config = Config::parse(SAMPLE, "sample").unwrap();
        assert_eq!(config.store().get_str("cache.key"), Some("v1.0.0"));
        assert_eq!(config.store().get_bool("cache.enable"), Some(true));
        assert!(config.store().get("cache.missing").is_none());
        assert!(config.store().get("site_url.nested").is_none());
    }

    #[test]
    fn test_empty_segments_ignored() {
        let config = Config::parse(SAMPLE, "sample").unwrap();
        assert_eq!(config.store().get_str("cache..key"), Some("v1.0.0"));
        assert!(config.store().get("").is_none());
    }

    #[test]
    fn test_set_creates_intermediate_tables() {
        let mut store = ConfigStore::new();
        store.set("database.host", "localhost:3306");
        store.set("database.name", "site");
        assert_eq!(store.get_str("database.host"), Some("localhost:3306"));
        assert_eq!(store.get_str("database.name"), Some("site"));
    }

    #[test]
    fn test_set_replaces_scalar_parent() {
        let mut store = ConfigStore::new();
        store.set("cache", true);
        store.set("cache.enable", false);
        assert_eq!(store.get_bool("cache.enable"), Some(false));
    }

    #[test]
    fn test_merge_is_shallow() {
        let mut store = ConfigStore::new();
        store.set("cache.enable", true);
        store.set("cache.key", "v1");

        let mut incoming = Table::new();
        let mut cache = Table::new();
        cache.insert("enable".to_string(), Value::Boolean(false));
        incoming.insert("cache".to_string(), Value::Table(cache));
        store.merge(incoming);

        assert_eq!(store.get_bool("cache.enable"), Some(false));
        // 嵌套键被整体替换
        assert!(store.get("cache.key").is_none());
    }

    #[test]
    fn test_typed_accessors() {
        let config = Config::parse(SAMPLE, "sample").unwrap();
        assert_eq!(config.site_url(), "https://example.com/");
        assert!(config.debug());
        assert!(config.minify());
        assert!(config.cache_enabled());
        assert_eq!(config.port(), 8080);
        assert_eq!(config.worker_threads(), 2);
        assert_eq!(config.template_extension(), "html");
        assert_eq!(config.cache_dir(), PathBuf::from("temp").join("cache"));
        assert_eq!(config.resource_base("css"), "/css/");
    }

    #[test]
    fn test_defaults_when_missing() {
        let config = Config::new();
        assert_eq!(config.port(), DEFAULT_PORT);
        assert!(!config.cache_enabled());
        assert_eq!(config.cache_key(), "");
        assert!(config.worker_threads() > 0);
        assert_eq!(config.asset_capacity(), DEFAULT_ASSET_CAPACITY);
    }

    #[test]
    fn test_zero_asset_capacity_is_replaced() {
        let config = Config::parse("[cache]\nasset_capacity = 0\n", "inline").unwrap();
        assert_eq!(
            config.store().get_integer("cache.asset_capacity"),
            Some(DEFAULT_ASSET_CAPACITY as i64)
        );
    }

    #[test]
    fn test_mail_sections() {
        let config = Config::parse(SAMPLE, "sample").unwrap();
        let from = config.smtp_from().unwrap();
        assert_eq!(from.email, "noreply@example.com");
        let receivers = config.mail_receivers("contact");
        assert_eq!(receivers.len(), 1);
        assert_eq!(receivers[0].name, "Sales");
        assert!(config.mail_receivers("career").is_empty());
    }

    #[test]
    fn test_invalid_toml_is_reported() {
        let result = Config::parse("site_url = ", "broken.toml");
        match result {
            Err(Exception::Config { path, .. }) => assert_eq!(path, "broken.toml"),
            other => panic!("Expected Config error, got {:?}", other),
        }
    }
}
