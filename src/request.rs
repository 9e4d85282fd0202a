// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 请求处理模块
//!
//! 该模块负责把 TCP 流中读取的原始字节解析为强类型的 `Request` 结构体。它涵盖了：
//! 1. 从连接中完整读取一个请求（请求头 + `Content-Length` 指定的请求体）。
//! 2. 请求行（Request-Line）的解析（方法、路径、版本）。
//! 3. 常用 HTTP 标头的提取，以及查询字符串和 `application/x-www-form-urlencoded` 表单的解码。
//! 4. 路由地址、完整请求 URL 等前端控制器需要的派生信息。

use bytes::Bytes;
use log::error;
use percent_encoding::percent_decode_str;
use tokio::io::{AsyncRead, AsyncReadExt};
use url::form_urlencoded;

use crate::{exception::Exception, param::*};

/// 表示一个完整的 HTTP 请求。
#[derive(Debug, Clone)]
pub struct Request {
    /// HTTP 请求方法（GET, POST 等）
    method: HttpRequestMethod,
    /// 请求目标（包含查询字符串）
    path: String,
    /// HTTP 协议版本
    version: HttpVersion,
    /// 客户端标识字符串
    user_agent: String,
    /// 客户端支持的压缩编码列表（按解析顺序排列）
    accept_encoding: Vec<HttpEncoding>,
    /// `Host` 标头
    host: Option<String>,
    /// 反向代理传入的原始协议（`X-Forwarded-Proto`）
    forwarded_proto: Option<String>,
    /// `X-Requested-With` 标头，用于识别 AJAX 请求
    requested_with: Option<String>,
    /// 请求体的 MIME 类型
    content_type: Option<String>,
    /// 查询参数
    query: Vec<(String, String)>,
    /// 已解码的表单字段
    form: Vec<(String, String)>,
    /// 原始请求体
    body: Bytes,
}

/// 从连接中读取一个完整的 HTTP 请求。
///
/// 读到请求头结束标记后按 `Content-Length` 继续读取请求体，总长度超过 `limit` 时返回
/// [`Exception::PayloadTooLarge`]。对端提前关闭连接时返回已读到的数据。
pub async fn read_request<R>(stream: &mut R, limit: usize) -> Result<Vec<u8>, Exception>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = Vec::with_capacity(1024);
    let mut chunk = vec![0u8; 4096];
    let mut expected: Option<usize> = None;

    loop {
        if let Some(total) = expected {
            if buffer.len() >= total {
                buffer.truncate(total);
                break;
            }
        }
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..n]);
        if buffer.len() > limit && expected.map_or(true, |total| total > limit) {
            return Err(Exception::PayloadTooLarge { limit });
        }
        if expected.is_none() {
            if let Some(pos) = find_header_end(&buffer) {
                let total = pos + HEADER_TERMINATOR.len() + content_length_of(&buffer[..pos]);
                if total > limit {
                    return Err(Exception::PayloadTooLarge { limit });
                }
                expected = Some(total);
            }
        }
    }
    Ok(buffer)
}

fn find_header_end(buffer: &[u8]) -> Option<usize> {
    buffer
        .windows(HEADER_TERMINATOR.len())
        .position(|w| w == HEADER_TERMINATOR)
}

fn content_length_of(head: &[u8]) -> usize {
    String::from_utf8_lossy(head)
        .split(CRLF)
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse().ok())
        .unwrap_or(0)
}

fn decode_pairs(input: &[u8]) -> Vec<(String, String)> {
    form_urlencoded::parse(input)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

impl Request {
    /// 从原始字节缓冲区尝试构建 `Request` 实例。
    ///
    /// # 逻辑步骤
    /// 1. 定位请求头结束位置，请求头必须是合法的 UTF-8。
    /// 2. 解析请求行：提取方法、路径和协议版本。
    /// 3. 迭代解析标头（字段名大小写不敏感）。
    /// 4. 解码查询字符串；POST 表单按 `application/x-www-form-urlencoded` 解码请求体。
    ///
    /// # 参数
    /// * `buffer` - 从网络 Socket 读取的原始数据。
    /// * `id` - 请求 ID，用于在多线程环境下追踪日志。
    pub fn try_from(buffer: &[u8], id: u128) -> Result<Self, Exception> {
        let (head, rest) = match find_header_end(buffer) {
            Some(pos) => (&buffer[..pos], &buffer[pos + HEADER_TERMINATOR.len()..]),
            None => (buffer, &buffer[buffer.len()..]),
        };

        let head = match std::str::from_utf8(head) {
            Ok(s) => s,
            Err(_) => {
                error!("[ID{}]无法解析HTTP请求", id);
                return Err(Exception::RequestIsNotUtf8);
            }
        };

        let mut lines = head.split(CRLF);
        let request_line = lines.next().unwrap_or_default();

        // 1. 解析请求行 (e.g., "GET /index HTTP/1.1")
        let first_line_parts: Vec<&str> = request_line.split(' ').filter(|p| !p.is_empty()).collect();
        if first_line_parts.len() < 3 {
            error!("[ID{}]HTTP请求行格式不正确：{}", id, request_line);
            return Err(Exception::MalformedRequest(request_line.to_string()));
        }

        let method_str = first_line_parts[0].to_uppercase();
        let method = match method_str.as_str() {
            "GET" => HttpRequestMethod::Get,
            "HEAD" => HttpRequestMethod::Head,
            "OPTIONS" => HttpRequestMethod::Options,
            "POST" => HttpRequestMethod::Post,
            _ => {
                error!("[ID{}]不支持的HTTP请求方法：{}", id, &method_str);
                return Err(Exception::UnSupportedRequestMethod(method_str));
            }
        };

        let version_str = first_line_parts[first_line_parts.len() - 1].to_uppercase();
        let version = match version_str.as_str() {
            "HTTP/1.1" => HttpVersion::V1_1,
            "HTTP/1.0" => HttpVersion::V1_0,
            _ => {
                error!("[ID{}]不支持的HTTP协议版本：{}", id, &version_str);
                return Err(Exception::UnsupportedHttpVersion(version_str));
            }
        };

        // 路径中可能包含空格，虽然不规范但通过 join 尝试恢复
        let path = first_line_parts[1..first_line_parts.len() - 1].join(" ");

        // 2. 迭代各行解析 Headers
        let mut request = Self {
            method,
            path,
            version,
            user_agent: String::new(),
            accept_encoding: vec![],
            host: None,
            forwarded_proto: None,
            requested_with: None,
            content_type: None,
            query: vec![],
            form: vec![],
            body: Bytes::new(),
        };
        let mut content_length = None;
        for line in lines {
            let Some((name, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();
            match name.trim().to_ascii_lowercase().as_str() {
                "user-agent" => request.user_agent = value.to_string(),
                "host" => request.host = Some(value.to_string()),
                "x-forwarded-proto" => request.forwarded_proto = Some(value.to_ascii_lowercase()),
                "x-requested-with" => request.requested_with = Some(value.to_string()),
                "content-type" => request.content_type = Some(value.to_string()),
                "content-length" => content_length = value.parse::<usize>().ok(),
                // 这里的逻辑比较简单，只要包含关键词即视为支持
                "accept-encoding" => {
                    if value.contains("gzip") {
                        request.accept_encoding.push(HttpEncoding::Gzip);
                    }
                    if value.contains("deflate") {
                        request.accept_encoding.push(HttpEncoding::Deflate);
                    }
                    if value.contains("br") {
                        request.accept_encoding.push(HttpEncoding::Br);
                    }
                }
                _ => {}
            }
        }

        // 3. 请求体与参数
        let body = match content_length {
            Some(len) if len < rest.len() => &rest[..len],
            _ => rest,
        };
        request.body = Bytes::copy_from_slice(body);

        if let Some((_, query)) = request.path.split_once('?') {
            request.query = decode_pairs(query.as_bytes());
        }

        let is_form = request
            .content_type
            .as_deref()
            .map_or(false, |t| t.starts_with("application/x-www-form-urlencoded"));
        if method == HttpRequestMethod::Post && is_form {
            request.form = decode_pairs(&request.body);
        }

        Ok(request)
    }
}

// --- Getter 访问器实现 ---

impl Request {
    /// 获取 HTTP 协议版本
    pub fn version(&self) -> &HttpVersion {
        &self.version
    }

    /// 获取请求目标（含查询参数）
    pub fn path(&self) -> &str {
        &self.path
    }

    /// 获取请求方法
    pub fn method(&self) -> HttpRequestMethod {
        self.method
    }

    /// 获取用户代理字符串
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// 获取客户端支持的压缩算法列表
    pub fn accept_encoding(&self) -> &[HttpEncoding] {
        &self.accept_encoding
    }

    /// 获取客户端接受的文件 MIME 类型
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn query(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn form(&self, name: &str) -> Option<&str> {
        self.form
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// 请求是否携带了提交的表单数据
    pub fn has_form_body(&self) -> bool {
        !self.form.is_empty()
    }

    /// 带请求体的 POST，不论内容类型（表单、multipart 或 JSON）。
    pub fn has_post_body(&self) -> bool {
        self.method == HttpRequestMethod::Post && !self.body.is_empty()
    }

    pub fn is_ajax(&self) -> bool {
        self.requested_with
            .as_deref()
            .map_or(false, |v| v.eq_ignore_ascii_case("xmlhttprequest"))
    }

    /// 不含查询字符串的路径部分
    pub fn path_only(&self) -> &str {
        match self.path.split_once('?') {
            Some((path, _)) => path,
            None => &self.path,
        }
    }

    pub fn scheme(&self) -> &str {
        match self.forwarded_proto.as_deref() {
            Some("https") => "https",
            _ => "http",
        }
    }

    /// 完整请求 URL：协议、主机与原始请求目标
    pub fn full_url(&self) -> String {
        format!(
            "{}://{}{}",
            self.scheme(),
            self.host().unwrap_or("localhost"),
            self.path
        )
    }

    /// 前端控制器使用的路由地址。
    ///
    /// 优先取查询参数 `url`，否则取解码后的请求路径；去掉首尾的 `/`，为空时为 `index`。
    pub fn route_url(&self) -> String {
        let raw = match self.query("url") {
            Some(url) => url.to_string(),
            None => percent_decode_str(self.path_only())
                .decode_utf8_lossy()
                .into_owned(),
        };
        let trimmed = raw.trim_matches('/');
        if trimmed.is_empty() {
            DEFAULT_ROUTE.to_string()
        } else {
            trimmed.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 验证常规 GET 请求的解析，包括 Path 和 Headers
    #[test]
    fn test_parse_get_request() {
        let request_str = "GET / HTTP/1.1\r\nHost: localhost:7878\r\nUser-Agent: Test-Browser\r\nAccept-Encoding: gzip, deflate, br\r\n\r\n";

        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();

        assert_eq!(request.method(), HttpRequestMethod::Get);
        assert_eq!(request.path(), "/");
        assert_eq!(request.user_agent(), "Test-Browser");
        assert_eq!(request.host(), Some("localhost:7878"));
        assert!(request.accept_encoding().contains(&HttpEncoding::Gzip));
        assert!(request.accept_encoding().contains(&HttpEncoding::Deflate));
        assert!(request.accept_encoding().contains(&HttpEncoding::Br));
    }

    /// 验证 POST 表单的解码
    #[test]
    fn test_parse_post_form() {
        let request_str = "POST /inquiry HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/x-www-form-urlencoded\r\nContent-Length: 29\r\n\r\nname=Jane+Doe&email=j%40x.com";

        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();

        assert_eq!(request.method(), HttpRequestMethod::Post);
        assert!(request.has_form_body());
        assert_eq!(request.form("name"), Some("Jane Doe"));
        assert_eq!(request.form("email"), Some("j@x.com"));
    }

    /// 非表单类型的请求体不会被当作表单
    #[test]
    fn test_post_without_form_content_type() {
        let request_str =
            "POST /submit HTTP/1.1\r\nHost: localhost\r\nContent-Length: 10\r\n\r\ntest=value";

        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();

        assert_eq!(request.body(), &Bytes::from("test=value"));
        assert!(!request.has_form_body());
        assert!(request.has_post_body());
    }

    /// 任何带请求体的 POST 都算作提交，GET 和空 POST 不算
    #[test]
    fn test_has_post_body() {
        let multipart = "POST /about HTTP/1.1\r\nContent-Type: multipart/form-data; boundary=X\r\nContent-Length: 47\r\n\r\n--X\r\nContent-Disposition: form-data; name=a\r\n\r\n1";
        let request = Request::try_from(multipart.as_bytes(), 0).unwrap();
        assert!(!request.has_form_body());
        assert!(request.has_post_body());

        let empty = "POST /about HTTP/1.1\r\nContent-Length: 0\r\n\r\n";
        assert!(!Request::try_from(empty.as_bytes(), 0).unwrap().has_post_body());

        let get = "GET /about HTTP/1.1\r\nContent-Length: 3\r\n\r\nabc";
        assert!(!Request::try_from(get.as_bytes(), 0).unwrap().has_post_body());
    }

    /// 请求体按 Content-Length 截断
    #[test]
    fn test_body_truncated_to_content_length() {
        let request_str = "POST /a HTTP/1.1\r\nContent-Length: 3\r\n\r\nabcdef";
        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();
        assert_eq!(request.body(), &Bytes::from("abc"));
    }

    #[test]
    fn test_unsupported_method() {
        let request_str = "DELETE /resource HTTP/1.1\r\nHost: localhost:7878\r\n\r\n";

        match Request::try_from(request_str.as_bytes(), 0) {
            Err(Exception::UnSupportedRequestMethod(m)) => assert_eq!(m, "DELETE"),
            other => panic!("Expected UnSupportedRequestMethod error, got {:?}", other),
        }
    }

    #[test]
    fn test_unsupported_http_version() {
        let request_str = "GET / HTTP/2.0\r\nHost: localhost:7878\r\n\r\n";

        assert!(matches!(
            Request::try_from(request_str.as_bytes(), 0),
            Err(Exception::UnsupportedHttpVersion(_))
        ));
    }

    #[test]
    fn test_malformed_request_line() {
        assert!(matches!(
            Request::try_from(b"GET\r\n\r\n", 0),
            Err(Exception::MalformedRequest(_))
        ));
    }

    #[test]
    fn test_invalid_utf8() {
        let buffer = vec![0xFF, 0xFE, 0xFD];

        assert!(matches!(
            Request::try_from(&buffer, 0),
            Err(Exception::RequestIsNotUtf8)
        ));
    }

    /// 验证 Header 字段名是否大小写不敏感
    #[test]
    fn test_case_insensitive_headers() {
        let request_str = "GET / HTTP/1.1\r\nhost: localhost:7878\r\nuser-agent: Test\r\naccept-encoding: gzip\r\nx-requested-with: XMLHttpRequest\r\n\r\n";

        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();

        assert_eq!(request.user_agent(), "Test");
        assert!(request.accept_encoding().contains(&HttpEncoding::Gzip));
        assert!(request.is_ajax());
    }

    #[test]
    fn test_lowercase_method() {
        let request_str = "get / HTTP/1.1\r\nHost: localhost:7878\r\n\r\n";

        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();

        assert_eq!(request.method(), HttpRequestMethod::Get);
    }

    #[test]
    fn test_route_url_from_path() {
        let cases = [
            ("/", "index"),
            ("/about-us", "about-us"),
            ("/blog/post/", "blog/post"),
            ("/caf%C3%A9?x=1", "café"),
        ];
        for (target, expected) in cases {
            let raw = format!("GET {} HTTP/1.1\r\nHost: h\r\n\r\n", target);
            let request = Request::try_from(raw.as_bytes(), 0).unwrap();
            assert_eq!(request.route_url(), expected, "target {}", target);
        }
    }

    #[test]
    fn test_route_url_from_query_parameter() {
        let raw = "GET /index.php?url=contact-us HTTP/1.1\r\nHost: h\r\n\r\n";
        let request = Request::try_from(raw.as_bytes(), 0).unwrap();
        assert_eq!(request.route_url(), "contact-us");
    }

    #[test]
    fn test_full_url() {
        let raw = "GET /page?id=123 HTTP/1.1\r\nHost: example.com\r\n\r\n";
        let request = Request::try_from(raw.as_bytes(), 0).unwrap();
        assert_eq!(request.full_url(), "http://example.com/page?id=123");
        assert_eq!(request.query("id"), Some("123"));

        let raw = "GET / HTTP/1.1\r\nHost: example.com\r\nX-Forwarded-Proto: HTTPS\r\n\r\n";
        let request = Request::try_from(raw.as_bytes(), 0).unwrap();
        assert_eq!(request.full_url(), "https://example.com/");
    }

    #[tokio::test]
    async fn test_read_request_waits_for_body() {
        let raw = b"POST /a HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello";
        let mut reader: &[u8] = raw;
        let buffer = read_request(&mut reader, 1024).await.unwrap();
        assert_eq!(buffer, raw.to_vec());
    }

    #[tokio::test]
    async fn test_read_request_rejects_oversized_body() {
        let raw = b"POST /a HTTP/1.1\r\nContent-Length: 5000\r\n\r\nhello";
        let mut reader: &[u8] = raw;
        assert!(matches!(
            read_request(&mut reader, 1024).await,
            Err(Exception::PayloadTooLarge { limit: 1024 })
        ));
    }

    #[tokio::test]
    async fn test_read_request_empty_stream() {
        let mut reader: &[u8] = b"";
        assert!(read_request(&mut reader, 1024).await.unwrap().is_empty());
    }
}
