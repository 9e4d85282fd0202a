// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 响应模块
//!
//! 调度器和控制器产出的都是 `Response` 值。正文以未压缩形式保存，
//! 内容编码在 [`Response::negotiate`] 中根据请求决定，序列化时才进行压缩。

use std::{
    ffi::OsStr,
    io::{self, Write},
};

use brotli::enc::{self, backward_references::BrotliEncoderParams};
use bytes::Bytes;
use chrono::prelude::*;
use flate2::{
    write::{DeflateEncoder, GzEncoder},
    Compression,
};
use log::{debug, error, warn};

use crate::{param::*, request::Request, util::HtmlBuilder};

const HTML_TYPE: &str = "text/html;charset=utf-8";
const JSON_TYPE: &str = "application/json";

#[derive(Debug, Clone)]
pub struct Response {
    version: HttpVersion,
    status_code: u16,
    information: String,
    content_type: Option<String>,
    date: DateTime<Utc>,
    content_encoding: Option<HttpEncoding>,
    server_name: String,
    allow: Option<Vec<HttpRequestMethod>>,
    location: Option<String>,
    content: Bytes,
    headonly: bool,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    pub fn new() -> Self {
        Self {
            version: HttpVersion::V1_1,
            status_code: 200,
            information: "OK".to_string(),
            content_type: None,
            date: Utc::now(),
            content_encoding: None,
            server_name: SERVER_NAME.to_string(),
            allow: None,
            location: None,
            content: Bytes::new(),
            headonly: false,
        }
    }

    /// HTML 响应
    pub fn html(code: u16, body: impl Into<Bytes>) -> Self {
        let mut response = Self::new();
        response.set_code(code);
        response.content_type = Some(HTML_TYPE.to_string());
        response.content = body.into();
        response
    }

    /// JSON 响应。序列化失败时退化为 500 错误页。
    pub fn json(code: u16, value: &serde_json::Value) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => {
                let mut response = Self::new();
                response.set_code(code);
                response.content_type = Some(JSON_TYPE.to_string());
                response.content = Bytes::from(body);
                response
            }
            Err(e) => {
                error!("JSON序列化失败：{}", e);
                Self::from_status_code(500)
            }
        }
    }

    /// 带 `Location` 头的重定向响应
    pub fn redirect(code: u16, location: &str) -> Self {
        let mut response = Self::new();
        response.set_code(code);
        response.location = Some(location.to_string());
        response
    }

    /// OPTIONS 请求的响应：204 + `Allow`
    pub fn options() -> Self {
        let mut response = Self::new();
        response.set_code(204);
        response.allow = Some(ALLOWED_METHODS.to_vec());
        response
    }

    /// 公共目录中的静态文件
    pub fn asset(body: Bytes, mime: &str) -> Self {
        let mut response = Self::new();
        response.content_type = Some(mime.to_string());
        response.content = body;
        response
    }

    /// 使用内置 HTML 页面的错误响应，不依赖任何模板。
    pub fn from_status_code(code: u16) -> Self {
        let content = match code {
            400 => HtmlBuilder::from_status_code(400, Some(
                r"<h2>噢！</h2><p>服务器无法理解你的请求。</p>"
            )),
            404 => HtmlBuilder::from_status_code(404, Some(
                r"<h2>噢！</h2><p>你指定的网页无法找到。</p>"
            )),
            413 => HtmlBuilder::from_status_code(413, Some(
                r"<h2>噢！</h2><p>请求内容超过了服务器允许的大小。</p>"
            )),
            500 => HtmlBuilder::from_status_code(500, Some(
                r"<h2>噢！</h2><p>服务器出现了一个内部错误。</p>"
            )),
            _ => HtmlBuilder::from_status_code(code, None),
        }
        .build();
        Self::html(code, content)
    }

    /// 按请求调整响应：沿用请求的协议版本，HEAD 请求不发送正文，按 `Accept-Encoding` 选择压缩方式。
    pub fn negotiate(&mut self, request: &Request, id: u128) -> &mut Self {
        self.version = *request.version();
        self.headonly = request.method() == HttpRequestMethod::Head;
        self.content_encoding = match self.headonly {
            true => None,
            false => {
                let compressible = self
                    .content_type
                    .as_deref()
                    .map_or(false, |mime| !should_skip_compression(mime));
                if compressible && !self.content.is_empty() {
                    decide_encoding(request.accept_encoding())
                } else {
                    None
                }
            }
        };
        match self.content_encoding {
            Some(HttpEncoding::Gzip) => debug!("[ID{}]使用Gzip压缩编码", id),
            Some(HttpEncoding::Br) => debug!("[ID{}]使用Brotli压缩编码", id),
            Some(HttpEncoding::Deflate) => debug!("[ID{}]使用Deflate压缩编码", id),
            None => debug!("[ID{}]不进行压缩", id),
        };
        self
    }

    pub fn set_date(&mut self) -> &mut Self {
        self.date = Utc::now();
        self
    }

    pub fn set_code(&mut self, code: u16) -> &mut Self {
        self.status_code = code;
        self.information = match STATUS_CODES.get(&code) {
            Some(&reason) => reason.to_string(),
            None => {
                warn!("未收录的状态码：{}", code);
                "Unknown Status".to_string()
            }
        };
        self
    }

    /// 序列化为可直接写入 TCP 流的字节。压缩失败时发送未压缩正文。
    pub fn as_bytes(&self) -> Vec<u8> {
        let mut encoding = self.content_encoding;
        let body: Vec<u8> = match compress(self.content.to_vec(), encoding) {
            Ok(c) => c,
            Err(e) => {
                error!("压缩响应正文失败: {}，返回未压缩内容", e);
                encoding = None;
                self.content.to_vec()
            }
        };

        let mut header = format!(
            "HTTP/{} {} {}{}",
            self.version, self.status_code, self.information, CRLF
        );
        if let Some(t) = &self.content_type {
            header.push_str(&["Content-Type: ", t, CRLF].concat());
        }
        if let Some(e) = encoding {
            header.push_str(&format!("Content-Encoding: {}{}", e, CRLF));
        }
        header.push_str(&format!("Content-Length: {}{}", body.len(), CRLF));
        header.push_str(&["Date: ", &format_date(&self.date), CRLF].concat());
        header.push_str(&["Server: ", &self.server_name, CRLF].concat());
        if let Some(location) = &self.location {
            header.push_str(&["Location: ", location, CRLF].concat());
        }
        if let Some(a) = &self.allow {
            let allow_str = a
                .iter()
                .map(|m| m.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            header.push_str(&["Allow: ", &allow_str, CRLF].concat());
        }
        header.push_str(&["Connection: close", CRLF, CRLF].concat());

        match self.headonly {
            true => header.into_bytes(),
            false => [header.as_bytes(), &body].concat(),
        }
    }
}

impl Response {
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn information(&self) -> &str {
        &self.information
    }

    /// 未压缩的响应正文
    pub fn content(&self) -> &Bytes {
        &self.content
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn content_encoding(&self) -> Option<HttpEncoding> {
        self.content_encoding
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }
}

fn format_date(date: &DateTime<Utc>) -> String {
    date.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn compress(data: Vec<u8>, mode: Option<HttpEncoding>) -> io::Result<Vec<u8>> {
    let original_size = data.len();
    let result = match mode {
        Some(HttpEncoding::Gzip) => {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&data)?;
            encoder.finish()
        }
        Some(HttpEncoding::Deflate) => {
            let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&data)?;
            encoder.finish()
        }
        Some(HttpEncoding::Br) => {
            let params = BrotliEncoderParams::default();
            let mut output = Vec::new();
            enc::BrotliCompress(&mut io::Cursor::new(data), &mut output, &params)?;
            Ok(output)
        }
        None => return Ok(data),
    };

    if let Ok(ref compressed) = result {
        let compressed_size = compressed.len();
        let ratio = if original_size > 0 {
            ((original_size as i64 - compressed_size as i64) as f64 / original_size as f64) * 100.0
        } else {
            0.0
        };
        debug!(
            "压缩完成: {:?}, 原始大小: {} bytes, 压缩后: {} bytes, 压缩率: {:.1}%",
            mode, original_size, compressed_size, ratio
        );
    }

    result
}

fn should_skip_compression(mime_type: &str) -> bool {
    let skip_types = [
        "image/jpeg",
        "image/png",
        "image/gif",
        "image/webp",
        "image/avif",
        "image/bmp",
        "image/x-icon",
        "video/",
        "audio/",
        "application/zip",
        "font/woff",
        "font/woff2",
        "application/vnd.ms-fontobject",
    ];

    skip_types
        .iter()
        .any(|&skip_type| mime_type.starts_with(skip_type))
}

fn decide_encoding(accept_encoding: &[HttpEncoding]) -> Option<HttpEncoding> {
    if accept_encoding.contains(&HttpEncoding::Gzip) {
        Some(HttpEncoding::Gzip)
    } else if accept_encoding.contains(&HttpEncoding::Deflate) {
        Some(HttpEncoding::Deflate)
    } else if accept_encoding.contains(&HttpEncoding::Br) {
        Some(HttpEncoding::Br)
    } else {
        None
    }
}

/// 按文件扩展名确定 MIME 类型，未知类型按二进制流处理。
pub fn get_mime(extension: &OsStr) -> &'static str {
    let extension = match extension.to_str() {
        Some(e) => e.to_ascii_lowercase(),
        None => {
            error!("无法将&OsStr转换为&str类型");
            return "application/octet-stream";
        }
    };
    match MIME_TYPES.get(extension.as_str()) {
        Some(v) => v,
        None => "application/octet-stream",
    }
}
