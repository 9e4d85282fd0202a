// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 路由解析
//!
//! 路由地址先按文件路径匹配页面目录中的模板，找不到时再按
//! `控制器/动作` 匹配已注册的控制器。解析过程只读取文件元数据，不渲染任何内容。

use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;

use log::warn;

use crate::{
    controller::ControllerRegistry,
    param::{DEFAULT_ACTION, DEFAULT_ROUTE},
    util::is_safe_segment,
};

/// 由路由地址派生的路由
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    url: String,
    segments: Vec<String>,
}

impl Route {
    /// 去掉首尾 `/`，空地址视为 `index`。
    pub fn parse(url: &str) -> Self {
        let trimmed = url.trim_matches('/');
        let url = if trimmed.is_empty() {
            DEFAULT_ROUTE.to_string()
        } else {
            trimmed.to_string()
        };
        let segments = url.split('/').map(str::to_string).collect();
        Self { url, segments }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// 所有路由段都能安全地映射到文件系统
    pub fn is_safe(&self) -> bool {
        self.segments.iter().all(|s| is_safe_segment(s))
    }

    /// 第二段为动作名，缺失或为空时为 `index`
    pub fn action(&self) -> &str {
        match self.segments.get(1) {
            Some(action) if !action.is_empty() => action,
            _ => DEFAULT_ACTION,
        }
    }
}

/// 路由解析失败的原因
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchFailure {
    ControllerMissing(String),
    ActionMissing { controller: String, action: String },
    InvalidPath(String),
}

impl fmt::Display for DispatchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchFailure::ControllerMissing(c) => write!(f, "controller {} is not registered", c),
            DispatchFailure::ActionMissing { controller, action } => {
                write!(f, "action {} not found in {}", action, controller)
            }
            DispatchFailure::InvalidPath(p) => write!(f, "invalid path {}", p),
        }
    }
}

/// 路由解析结果
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// `file` 为模板文件，`template` 为相对页面目录的模板名
    StaticPage { file: PathBuf, template: String },
    Controller { identifier: String, action: String },
    NotFound(DispatchFailure),
}

pub struct Router {
    pages_root: PathBuf,
    extension: String,
}

impl Router {
    pub fn new(pages_root: impl Into<PathBuf>, extension: &str) -> Self {
        Self {
            pages_root: pages_root.into(),
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    pub fn pages_root(&self) -> &PathBuf {
        &self.pages_root
    }

    /// 静态页面优先，其次是控制器。
    pub fn resolve(&self, route: &Route, controllers: &ControllerRegistry) -> Resolution {
        let safe = route.is_safe();
        if safe {
            if let Some(page) = self.static_page(route) {
                return page;
            }
        } else {
            warn!("路由{}包含非法片段，跳过页面匹配", route.url());
        }

        let identifier = ControllerRegistry::identifier_for(&route.segments()[0]);
        let action = route.action();
        match controllers.get(&identifier) {
            Some(controller) if controller.actions().iter().any(|a| *a == action) => Resolution::Controller {
                identifier,
                action: action.to_string(),
            },
            Some(_) => Resolution::NotFound(DispatchFailure::ActionMissing {
                controller: identifier,
                action: action.to_string(),
            }),
            None if !safe => Resolution::NotFound(DispatchFailure::InvalidPath(route.url().to_string())),
            None => Resolution::NotFound(DispatchFailure::ControllerMissing(identifier)),
        }
    }

    fn static_page(&self, route: &Route) -> Option<Resolution> {
        let mut path = self.pages_root.clone();
        let mut template: Vec<&str> = Vec::with_capacity(route.segments().len() + 1);
        for segment in route.segments() {
            path.push(segment);
            template.push(segment);
        }
        if path.is_dir() {
            path.push(DEFAULT_ROUTE);
            template.push(DEFAULT_ROUTE);
        }
        let mut file: OsString = path.into_os_string();
        file.push(".");
        file.push(&self.extension);
        let file = PathBuf::from(file);
        if !file.is_file() {
            return None;
        }
        Some(Resolution::StaticPage {
            file,
            template: format!("{}.{}", template.join("/"), self.extension),
        })
    }
}
