// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use lazy_static::lazy_static;
use regex::Regex;

use crate::param::STATUS_CODES;

/// 模板缺失或渲染失败时使用的内置错误页
pub struct HtmlBuilder {
    title: String,
    css: String,
    body: String,
}

impl HtmlBuilder {
    pub fn from_status_code(code: u16, note: Option<&str>) -> Self {
        let title = format!("{}", code);
        let css = r"
            body {
                width: 35em;
                margin: 0 auto;
                font-family: Tahoma, Verdana, Arial, sans-serif;
            }
            "
        .to_string();
        let description = match note {
            Some(n) => n,
            None => STATUS_CODES.get(&code).copied().unwrap_or("Unknown Status"),
        };
        let body = format!(
            r"
            <h1>{}</h1>
            <p>{}</p>
            ",
            code, description
        );
        Self { title, css, body }
    }

    pub fn build(&self) -> String {
        format!(
            r##"<!DOCTYPE html>
            <html>
                <head>
                    <meta charset="utf-8">
                    <title>{}</title>
                    <style>{}</style>
                </head>
                <body>
                {}
                </body>
            </html>"##,
            self.title, self.css, self.body
        )
    }
}

/// 把路由名转换为首字母大写的标识符，例如 `mail-queue` → `MailQueue`。
///
/// 非字母数字的 ASCII 字符视为单词分隔符，非 ASCII 字符原样保留。
pub fn camelize(name: &str) -> String {
    name.split(|c: char| c.is_ascii() && !c.is_ascii_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    let mut s = String::with_capacity(word.len());
                    s.push(first.to_ascii_uppercase());
                    s.push_str(chars.as_str());
                    s
                }
                None => String::new(),
            }
        })
        .collect()
}

lazy_static! {
    static ref WHITESPACE_AFTER_TAG: Regex = Regex::new(r">[^\S ]+").unwrap();
    static ref WHITESPACE_BEFORE_TAG: Regex = Regex::new(r"[^\S ]+<").unwrap();
    static ref WHITESPACE_RUN: Regex = Regex::new(r"(\s)+").unwrap();
    static ref HTML_COMMENT: Regex = Regex::new(r"(?s)<!--.*?-->").unwrap();
}

/// 压缩 HTML：去掉标签前后的换行与制表符、合并连续空白、删除注释。
///
/// 这是纯文本替换，不解析 HTML，`<pre>` 中的空白同样会被合并。
pub fn minify_html(html: &str) -> String {
    let html = WHITESPACE_AFTER_TAG.replace_all(html, ">");
    let html = WHITESPACE_BEFORE_TAG.replace_all(&html, "<");
    let html = WHITESPACE_RUN.replace_all(&html, "$1");
    HTML_COMMENT.replace_all(&html, "").into_owned()
}

/// 路由片段是否可以安全地映射到文件系统
pub fn is_safe_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment.contains(['\\', '\0', ':'])
}
