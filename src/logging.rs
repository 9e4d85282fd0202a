// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 日志初始化
//!
//! `config/log4rs.yaml` 存在时直接使用；否则按站点配置构建：
//! `debug` 打开控制台输出和 debug 级别，`log` 打开按日期命名的文件输出。

use std::path::{Path, PathBuf};

use chrono::Local;
use log::LevelFilter;
use log4rs::{
    append::{console::ConsoleAppender, file::FileAppender},
    config::{Appender, Root},
    encode::pattern::PatternEncoder,
};

use crate::{config::Config, exception::Exception};

pub const LOG4RS_FILE: &str = "config/log4rs.yaml";
const PATTERN: &str = "{d(%Y-%m-%dT%H:%M:%S%z)} [{l}] : {m}{n}";

/// 当天的日志文件路径：`<temp>/logs/error-YYYY-MM-DD.log`
pub fn log_file(config: &Config) -> PathBuf {
    config
        .log_dir()
        .join(format!("error-{}.log", Local::now().format("%Y-%m-%d")))
}

/// 根据站点配置构建 log4rs 配置。
pub fn build_config(config: &Config) -> Result<log4rs::Config, Exception> {
    let level = match config.debug() {
        true => LevelFilter::Debug,
        false => LevelFilter::Info,
    };
    let mut builder = log4rs::Config::builder();
    let mut root = Root::builder();

    if config.debug() {
        let console = ConsoleAppender::builder()
            .encoder(Box::new(PatternEncoder::new(PATTERN)))
            .build();
        builder = builder.appender(Appender::builder().build("console", Box::new(console)));
        root = root.appender("console");
    }
    if config.log_enabled() {
        let file = FileAppender::builder()
            .encoder(Box::new(PatternEncoder::new(PATTERN)))
            .build(log_file(config))?;
        builder = builder.appender(Appender::builder().build("file", Box::new(file)));
        root = root.appender("file");
    }

    builder
        .build(root.build(level))
        .map_err(|e| Exception::Logging(e.to_string()))
}

/// 初始化全局日志，只能调用一次。
pub fn init(config: &Config) -> Result<(), Exception> {
    if Path::new(LOG4RS_FILE).is_file() {
        return log4rs::init_file(LOG4RS_FILE, Default::default())
            .map_err(|e| Exception::Logging(e.to_string()));
    }
    log4rs::init_config(build_config(config)?)
        .map(|_| ())
        .map_err(|e| Exception::Logging(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(source: &str) -> Config {
        Config::parse(source, "inline").unwrap()
    }

    #[test]
    fn test_quiet_config_has_no_appenders() {
        let built = build_config(&config("debug = false\nlog = false\n")).unwrap();
        assert!(built.appenders().is_empty());
        assert_eq!(built.root().level(), LevelFilter::Info);
    }

    #[test]
    fn test_debug_and_file_appenders() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().display().to_string().replace('\\', "/");
        let config = config(&format!(
            "debug = true\nlog = true\n[paths]\ntemp = \"{}\"\n",
            root
        ));
        let built = build_config(&config).unwrap();

        let names: Vec<&str> = built.appenders().iter().map(|a| a.name()).collect();
        assert_eq!(names, vec!["console", "file"]);
        assert_eq!(built.root().level(), LevelFilter::Debug);
        assert!(log_file(&config).starts_with(dir.path().join("logs")));
        assert!(log_file(&config)
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("error-"));
    }
}
