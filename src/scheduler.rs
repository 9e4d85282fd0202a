// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 计划任务
//!
//! 计划任务由外部定时器（如 cron）通过 `run scheduler <名称>[:<动作>]` 触发。
//! 名称按 `驼峰名 + Scheduler` 在 [`SchedulerRegistry`] 中查找，动作缺省为 `execute`。

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info};

use crate::{
    config::Config,
    exception::Exception,
    mail::{MailQueue, MailTransport},
    util::camelize,
};

/// 计划任务运行时可用的资源
pub struct SchedulerContext<'a> {
    pub config: &'a Config,
    pub mail_queue: &'a MailQueue,
    pub transport: &'a dyn MailTransport,
}

pub trait Scheduler: Send + Sync {
    /// 注册用的标识符，如 `MailQueueScheduler`
    fn name(&self) -> &'static str;

    fn actions(&self) -> &'static [&'static str];

    fn run(&self, action: &str, ctx: &SchedulerContext<'_>) -> Result<(), Exception>;
}

#[derive(Default, Clone)]
pub struct SchedulerRegistry {
    schedulers: HashMap<String, Arc<dyn Scheduler>>,
}

impl SchedulerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.schedulers
            .insert(scheduler.name().to_string(), scheduler);
        self
    }

    pub fn get(&self, identifier: &str) -> Option<&Arc<dyn Scheduler>> {
        self.schedulers.get(identifier)
    }

    /// 命令行名称对应的标识符，`mail-queue` → `MailQueueScheduler`
    pub fn identifier_for(name: &str) -> String {
        format!("{}Scheduler", camelize(name))
    }
}

/// 注册所有内置计划任务
pub fn registry() -> SchedulerRegistry {
    SchedulerRegistry::new().register(Arc::new(MailQueueScheduler))
}

/// 邮件队列任务：`execute` 只记录运行，`send` 投递队列中的全部邮件。
pub struct MailQueueScheduler;

impl Scheduler for MailQueueScheduler {
    fn name(&self) -> &'static str {
        "MailQueueScheduler"
    }

    fn actions(&self) -> &'static [&'static str] {
        &["execute", "send"]
    }

    fn run(&self, action: &str, ctx: &SchedulerContext<'_>) -> Result<(), Exception> {
        match action {
            "execute" => {
                debug!("MailQueueScheduler -> execute() 已调用");
                Ok(())
            }
            "send" => {
                let report = ctx.mail_queue.deliver(ctx.transport)?;
                info!(
                    "MailQueueScheduler -> send() 执行完毕，成功{}封，失败{}封",
                    report.sent, report.failed
                );
                Ok(())
            }
            _ => Err(Exception::Mail(format!("unknown action {}", action))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::{MailMessage, Mailbox, MockMailTransport};
    use tempfile::TempDir;

    fn message() -> MailMessage {
        let mailbox = Mailbox {
            name: "A".to_string(),
            email: "a@example.com".to_string(),
        };
        MailMessage {
            from: mailbox.clone(),
            to: mailbox,
            subject: "s".to_string(),
            html_body: "b".to_string(),
        }
    }

    #[test]
    fn test_identifier_for() {
        assert_eq!(SchedulerRegistry::identifier_for("mail-queue"), "MailQueueScheduler");
        assert!(registry().get("MailQueueScheduler").is_some());
    }

    #[test]
    fn test_send_drains_queue() {
        let dir = TempDir::new().unwrap();
        let queue = MailQueue::new(dir.path());
        queue.enqueue(&message()).unwrap();
        let mut transport = MockMailTransport::new();
        transport.expect_send().times(1).returning(|_| Ok(()));
        let config = Config::new();
        let ctx = SchedulerContext {
            config: &config,
            mail_queue: &queue,
            transport: &transport,
        };

        MailQueueScheduler.run("send", &ctx).unwrap();
        assert!(queue.pending().unwrap().is_empty());
    }

    #[test]
    fn test_execute_touches_nothing() {
        let dir = TempDir::new().unwrap();
        let queue = MailQueue::new(dir.path());
        queue.enqueue(&message()).unwrap();
        let transport = MockMailTransport::new();
        let config = Config::new();
        let ctx = SchedulerContext {
            config: &config,
            mail_queue: &queue,
            transport: &transport,
        };

        MailQueueScheduler.run("execute", &ctx).unwrap();
        assert_eq!(queue.pending().unwrap().len(), 1);
    }
}
