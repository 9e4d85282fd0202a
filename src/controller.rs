// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 控制器
//!
//! 控制器在启动时显式注册到 [`ControllerRegistry`]，以 `驼峰名 + Controller` 作为标识符，
//! 例如路由段 `inquiry` 对应 `InquiryController`。动作通过 [`ControllerContext`]
//! 访问请求、配置、渲染器和邮件队列，并返回一个 [`Response`]。

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, error};
use serde_json::json;

use crate::{
    config::Config,
    exception::Exception,
    mail::MailQueue,
    param::*,
    request::Request,
    response::Response,
    util::{camelize, minify_html, HtmlBuilder},
    view::{PageContext, Render},
};

pub trait Controller: Send + Sync {
    /// 注册用的标识符，如 `InquiryController`
    fn name(&self) -> &'static str;

    /// 该控制器支持的动作名
    fn actions(&self) -> &'static [&'static str];

    fn invoke(&self, action: &str, ctx: &ControllerContext<'_>) -> Result<Response, Exception>;
}

/// 路由段到控制器的映射
#[derive(Default, Clone)]
pub struct ControllerRegistry {
    controllers: HashMap<String, Arc<dyn Controller>>,
}

impl ControllerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, controller: Arc<dyn Controller>) -> Self {
        debug!("注册控制器：{}", controller.name());
        self.controllers
            .insert(controller.name().to_string(), controller);
        self
    }

    pub fn get(&self, identifier: &str) -> Option<&Arc<dyn Controller>> {
        self.controllers.get(identifier)
    }

    /// 路由段对应的控制器标识符
    pub fn identifier_for(segment: &str) -> String {
        format!("{}Controller", camelize(segment))
    }

    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }
}

/// 控制器动作的运行上下文
pub struct ControllerContext<'a> {
    pub request: &'a Request,
    pub config: &'a Config,
    pub renderer: &'a dyn Render,
    pub mail_queue: &'a MailQueue,
    pub id: u128,
}

impl<'a> ControllerContext<'a> {
    pub fn respond_json(&self, value: serde_json::Value) -> Response {
        Response::json(200, &value)
    }

    /// `{code, message, type}` 结构的 JSON 响应。`code` 是已知状态码时同时作为 HTTP 状态码。
    pub fn respond(&self, message: &str, code: u16, kind: &str) -> Response {
        let status = if STATUS_CODES.contains_key(&code) { code } else { 200 };
        Response::json(
            status,
            &json!({
                "code": code,
                "message": message,
                "type": kind,
            }),
        )
    }

    pub fn redirect(&self, location: &str) -> Response {
        Response::redirect(302, location)
    }

    pub fn render_server_error(&self) -> Response {
        Response::redirect(302, SERVER_ERROR_PATH)
    }

    /// 渲染 404 页面，不写入页面缓存。
    pub fn render_not_found(&self) -> Response {
        render_status_page(
            self.renderer,
            self.config,
            self.request,
            NOT_FOUND_PAGE,
            404,
            self.id,
        )
    }

    pub fn is_post_request(&self) -> bool {
        self.request.method() == HttpRequestMethod::Post && self.request.has_form_body()
    }

    pub fn is_ajax(&self) -> bool {
        self.request.is_ajax()
    }

    /// 读取表单字段，缺失时读取同名查询参数。
    pub fn input(&self, name: &str) -> Option<&str> {
        self.request
            .form(name)
            .or_else(|| self.request.query(name))
    }
}

/// 以 `page` 模板渲染一个错误状态页面。
///
/// 模板失败时依次尝试 500 模板和内置错误页，响应正文不包含任何错误细节。
pub fn render_status_page(
    renderer: &dyn Render,
    config: &Config,
    request: &Request,
    page: &str,
    code: u16,
    id: u128,
) -> Response {
    let ext = config.template_extension();
    let context = PageContext::new(config, request, code);
    match renderer.render(&format!("{}.{}", page, ext), &context) {
        Ok(html) => return Response::html(code, finish_html(config, html)),
        Err(e) => error!("[ID{}]渲染{}页面失败：{}", id, page, e),
    }
    if page != SERVER_ERROR_PAGE {
        let context = PageContext::new(config, request, 500);
        match renderer.render(&format!("{}.{}", SERVER_ERROR_PAGE, ext), &context) {
            Ok(html) => return Response::html(500, finish_html(config, html)),
            Err(e) => error!("[ID{}]渲染{}页面失败：{}", id, SERVER_ERROR_PAGE, e),
        }
    }
    Response::html(500, HtmlBuilder::from_status_code(500, None).build())
}

/// 按 `minify` 配置压缩页面
pub fn finish_html(config: &Config, html: String) -> String {
    if config.minify() {
        minify_html(&html)
    } else {
        html
    }
}
