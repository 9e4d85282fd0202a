// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 询价表单
//!
//! 处理 `/inquiry` 的表单提交：校验字段，为每个 `mail_receiver.contact` 收件人生成一封通知邮件
//! 放入邮件队列，然后跳转到感谢页。

use lazy_static::lazy_static;
use log::{error, info, warn};
use minijinja::HtmlEscape;
use regex::Regex;

use crate::{
    controller::{Controller, ControllerContext},
    exception::Exception,
    mail::{MailMessage, Mailbox},
    response::Response,
};

const REQUIRED_FIELDS: [&str; 5] = ["name", "email", "phone_number", "category", "message"];
const THANK_YOU_PATH: &str = "/thank-you";

lazy_static! {
    static ref EMAIL: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
}

pub struct InquiryController;

impl Controller for InquiryController {
    fn name(&self) -> &'static str {
        "InquiryController"
    }

    fn actions(&self) -> &'static [&'static str] {
        &["index"]
    }

    fn invoke(&self, action: &str, ctx: &ControllerContext<'_>) -> Result<Response, Exception> {
        match action {
            "index" => self.index(ctx),
            _ => Ok(ctx.render_not_found()),
        }
    }
}

impl InquiryController {
    fn index(&self, ctx: &ControllerContext<'_>) -> Result<Response, Exception> {
        if let Err(e) = validate(ctx) {
            warn!("[ID{}]询价表单校验失败：{}", ctx.id, e);
            return Ok(match ctx.is_ajax() {
                true => ctx.respond(&e.to_string(), 422, "error"),
                false => ctx.render_server_error(),
            });
        }

        let field = |name: &str| ctx.input(name).unwrap_or_default().trim().to_string();
        let from = ctx.config.smtp_from().unwrap_or_else(|| Mailbox {
            name: field("name"),
            email: field("email"),
        });
        let subject = format!("New inquiry from {} ({})", field("name"), field("category"));
        let html_body = REQUIRED_FIELDS
            .iter()
            .map(|name| {
                format!(
                    "<p><strong>{}</strong>: {}</p>",
                    name,
                    HtmlEscape(&field(*name))
                )
            })
            .collect::<String>();

        let receivers = ctx.config.mail_receivers("contact");
        if receivers.is_empty() {
            warn!("[ID{}]mail_receiver.contact未配置，询价邮件不会发送", ctx.id);
        }
        // 逐个收件人入队，全部失败才返回错误
        let mut failed = 0;
        for to in &receivers {
            let message = MailMessage {
                from: from.clone(),
                to: to.clone(),
                subject: subject.clone(),
                html_body: html_body.clone(),
            };
            if let Err(e) = ctx.mail_queue.enqueue(&message) {
                error!("[ID{}]发给{}的询价邮件入队失败：{}", ctx.id, to.email, e);
                failed += 1;
            }
        }
        if failed > 0 && failed == receivers.len() {
            return Err(Exception::Mail(format!(
                "none of {} inquiry mails could be queued",
                failed
            )));
        }
        info!("[ID{}]已收到询价：{}", ctx.id, field("email"));

        Ok(match ctx.is_ajax() {
            true => ctx.respond("Thank you for your inquiry.", 200, "success"),
            false => ctx.redirect(THANK_YOU_PATH),
        })
    }
}

/// 所有必填字段非空且邮箱格式正确
fn validate(ctx: &ControllerContext<'_>) -> Result<(), Exception> {
    let mut invalid: Vec<String> = REQUIRED_FIELDS
        .iter()
        .filter(|name| ctx.input(name).map_or(true, |v| v.trim().is_empty()))
        .map(|name| name.to_string())
        .collect();
    if let Some(email) = ctx.input("email") {
        if !email.trim().is_empty() && !EMAIL.is_match(email.trim()) {
            invalid.push("email".to_string());
        }
    }
    match invalid.is_empty() {
        true => Ok(()),
        false => Err(Exception::Validation(invalid)),
    }
}
