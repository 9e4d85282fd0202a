// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Exception 模块
//!
//! 该模块定义了站点服务器在请求处理、缓存读写、计划任务执行过程中可能出现的各类异常。
//!
//! ## 设计意图
//! - **错误分类**：协议解析错误、文件系统错误、配置错误、模板渲染错误以及外部依赖（邮件）错误。
//! - **语义映射**：调度器只会把这些异常转换为固定的 400/404/413/500 响应，详细信息只进入日志。

use std::io;

use thiserror::Error;

/// 服务器处理过程中发生的异常类型。
#[derive(Debug, Error)]
pub enum Exception {
    /// 请求头无法解析为合法的 UTF-8 字符串。
    #[error("Request bytes can't be parsed in UTF-8")]
    RequestIsNotUtf8,
    /// 客户端使用了服务器不支持的 HTTP 方法。
    #[error("Unsupported request method: {0}")]
    UnSupportedRequestMethod(String),
    /// 客户端使用了服务器不支持的 HTTP 协议版本。
    #[error("Unsupported HTTP version: {0}")]
    UnsupportedHttpVersion(String),
    /// 请求行或请求头格式不正确。
    #[error("Malformed request: {0}")]
    MalformedRequest(String),
    /// 请求总长度超过配置上限。对应 `413 Content Too Large`。
    #[error("Request exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },
    /// 请求的路径格式非法或包含越权尝试（如目录遍历）。
    #[error("Invalid path: {0}")]
    InvalidPath(String),
    /// 底层文件系统或网络 I/O 错误。
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// 配置文件无法解析。
    #[error("Invalid configuration in {path}: {message}")]
    Config { path: String, message: String },
    /// 页面模板加载或渲染失败。
    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),
    /// 页面缓存文件内容无法识别。
    #[error("Corrupted cache entry {key}: {reason}")]
    CorruptCacheEntry { key: String, reason: String },
    /// 日志系统初始化失败。
    #[error("Logger initialisation failed: {0}")]
    Logging(String),
    /// 邮件队列序列化或投递失败。
    #[error("Mail error: {0}")]
    Mail(String),
    /// 表单校验未通过，附带未通过的字段名。
    #[error("Validation failed for: {}", .0.join(", "))]
    Validation(Vec<String>),
}

impl From<serde_json::Error> for Exception {
    fn from(e: serde_json::Error) -> Self {
        Exception::Mail(e.to_string())
    }
}

impl Exception {
    /// 将请求解析阶段的异常映射为返回给客户端的状态码。
    pub fn status_code(&self) -> u16 {
        match self {
            Exception::PayloadTooLarge { .. } => 413,
            Exception::RequestIsNotUtf8
            | Exception::UnSupportedRequestMethod(_)
            | Exception::UnsupportedHttpVersion(_)
            | Exception::MalformedRequest(_)
            | Exception::InvalidPath(_) => 400,
            _ => 500,
        }
    }
}
