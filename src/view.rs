// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 页面渲染
//!
//! 页面是 `paths.pages` 目录下的 minijinja 模板，公共片段放在 `partials/` 中，
//! 通过 `{% include "partials/header.html" %}` 引入。

use std::collections::BTreeMap;
use std::path::Path;

use minijinja::{path_loader, Environment, Value};
use serde_derive::Serialize;

use crate::{config::Config, exception::Exception, param::DEFAULT_ROUTE, request::Request};

/// 渲染模板时可用的请求信息
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RequestContext {
    pub url: String,
    pub full_url: String,
    pub canonical_url: String,
    pub query: BTreeMap<String, String>,
}

/// 传给模板的全部上下文
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PageContext {
    pub config: toml::Table,
    pub request: RequestContext,
    pub status: u16,
}

impl PageContext {
    pub fn new(config: &Config, request: &Request, status: u16) -> Self {
        let url = request.route_url();
        let canonical_path = if url == DEFAULT_ROUTE { "" } else { url.as_str() };
        let canonical_url = format!(
            "{}/{}",
            config.site_url().trim_end_matches('/'),
            canonical_path
        );
        Self {
            config: config.store().tree().clone(),
            request: RequestContext {
                full_url: request.full_url(),
                canonical_url,
                query: request.query_pairs().iter().cloned().collect(),
                url,
            },
            status,
        }
    }
}

/// 页面渲染器。
#[cfg_attr(test, mockall::automock)]
pub trait Render: Send + Sync {
    /// 渲染 `template`（相对页面目录、含扩展名的路径）。
    fn render(&self, template: &str, page: &PageContext) -> Result<String, Exception>;
}

/// 基于 minijinja 的渲染器，模板在首次使用时从页面目录加载。
pub struct TemplateRenderer {
    env: Environment<'static>,
}

impl TemplateRenderer {
    pub fn new(pages_dir: impl AsRef<Path>, config: &Config) -> Self {
        let mut env = Environment::new();
        env.set_loader(path_loader(pages_dir.as_ref()));

        let version = version_string(config.cache_key());
        for kind in ["image", "js", "css", "favicon"] {
            let base = config.resource_base(kind);
            let version = version.clone();
            env.add_function(format!("{}_url", kind), move |path: String| -> Value {
                Value::from_safe_string(format!("{}{}{}", base, path.trim_start_matches('/'), version))
            });
        }
        env.add_function("version_string", move || -> Value {
            Value::from_safe_string(version.clone())
        });

        Self { env }
    }
}

impl Render for TemplateRenderer {
    fn render(&self, template: &str, page: &PageContext) -> Result<String, Exception> {
        let tmpl = self.env.get_template(template)?;
        Ok(tmpl.render(page)?)
    }
}

/// 静态资源的版本查询串，缓存键为空时为空串。
pub fn version_string(cache_key: &str) -> String {
    if cache_key.is_empty() {
        String::new()
    } else {
        format!("?ver={}", cache_key)
    }
}
