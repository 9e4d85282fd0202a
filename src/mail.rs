// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 邮件队列
//!
//! 表单控制器只负责把通知邮件写入队列目录（每封一个 JSON 文件），
//! 由 `mail-queue:send` 计划任务批量取出并交给 [`MailTransport`] 投递。
//! SMTP 等真实投递通道是外部协作方，通过该 trait 接入。

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use log::{debug, error, info};
use serde_derive::{Deserialize, Serialize};

use crate::exception::Exception;

/// 邮件地址及显示名
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mailbox {
    pub name: String,
    pub email: String,
}

/// 一封待投递的 HTML 邮件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MailMessage {
    pub from: Mailbox,
    pub to: Mailbox,
    pub subject: String,
    pub html_body: String,
}

/// 邮件投递通道。
#[cfg_attr(test, mockall::automock)]
pub trait MailTransport {
    fn send(&self, message: &MailMessage) -> Result<(), Exception>;
}

/// 只把投递记录写入日志的通道，用于未接入 SMTP 的部署。
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTransport;

impl MailTransport for LogTransport {
    fn send(&self, message: &MailMessage) -> Result<(), Exception> {
        info!(
            "投递邮件：{} <{}> -> {} <{}>，主题：{}",
            message.from.name, message.from.email, message.to.name, message.to.email, message.subject
        );
        Ok(())
    }
}

/// 一次批量投递的结果
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct DeliveryReport {
    pub sent: usize,
    pub failed: usize,
}

/// 基于目录的邮件队列
#[derive(Debug, Clone)]
pub struct MailQueue {
    dir: PathBuf,
}

impl MailQueue {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 将邮件写入队列，返回队列文件路径。
    ///
    /// 先写入 `.part` 临时文件再改名，投递任务不会读到写了一半的文件。
    pub fn enqueue(&self, message: &MailMessage) -> Result<PathBuf, Exception> {
        fs::create_dir_all(&self.dir)?;
        let prefix = format!("{}-", Utc::now().format("%Y%m%d%H%M%S%6f"));
        let file = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(".part")
            .tempfile_in(&self.dir)?;
        serde_json::to_writer_pretty(file.as_file(), message)?;
        let target = file.path().with_extension("json");
        file.persist(&target).map_err(|e| Exception::Io(e.error))?;
        debug!("邮件已加入队列：{}", target.display());
        Ok(target)
    }

    /// 按文件名顺序列出待投递的邮件，队列目录不存在时返回空列表。
    pub fn pending(&self) -> Result<Vec<PathBuf>, Exception> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.is_file() && path.extension().map_or(false, |e| e == "json") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// 投递所有待发邮件。成功的邮件从队列删除，失败的保留到下一次运行。
    pub fn deliver(&self, transport: &dyn MailTransport) -> Result<DeliveryReport, Exception> {
        let mut report = DeliveryReport::default();
        for path in self.pending()? {
            let message: MailMessage = match fs::read_to_string(&path)
                .map_err(Exception::from)
                .and_then(|s| serde_json::from_str(&s).map_err(Exception::from))
            {
                Ok(m) => m,
                Err(e) => {
                    error!("无法读取队列邮件{}：{}", path.display(), e);
                    report.failed += 1;
                    continue;
                }
            };
            match transport.send(&message) {
                Ok(()) => {
                    fs::remove_file(&path)?;
                    report.sent += 1;
                }
                Err(e) => {
                    error!("邮件{}投递失败：{}", path.display(), e);
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn message(to: &str) -> MailMessage {
        MailMessage {
            from: Mailbox {
                name: "Site".to_string(),
                email: "noreply@example.com".to_string(),
            },
            to: Mailbox {
                name: "Sales".to_string(),
                email: to.to_string(),
            },
            subject: "New inquiry".to_string(),
            html_body: "<p>Hello</p>".to_string(),
        }
    }

    #[test]
    fn test_enqueue_writes_json_file() {
        let dir = TempDir::new().unwrap();
        let queue = MailQueue::new(dir.path().join("mail-queue"));
        let path = queue.enqueue(&message("a@example.com")).unwrap();

        assert_eq!(path.extension().unwrap(), "json");
        let stored: MailMessage =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(stored.to.email, "a@example.com");
        assert_eq!(queue.pending().unwrap(), vec![path]);
    }

    #[test]
    fn test_pending_on_missing_dir_is_empty() {
        let dir = TempDir::new().unwrap();
        let queue = MailQueue::new(dir.path().join("nope"));
        assert!(queue.pending().unwrap().is_empty());
    }

    #[test]
    fn test_deliver_removes_sent_messages() {
        let dir = TempDir::new().unwrap();
        let queue = MailQueue::new(dir.path());
        queue.enqueue(&message("a@example.com")).unwrap();
        queue.enqueue(&message("b@example.com")).unwrap();

        let mut transport = MockMailTransport::new();
        transport.expect_send().times(2).returning(|_| Ok(()));

        let report = queue.deliver(&transport).unwrap();
        assert_eq!(report, DeliveryReport { sent: 2, failed: 0 });
        assert!(queue.pending().unwrap().is_empty());
    }

    #[test]
    fn test_deliver_keeps_failed_messages() {
        let dir = TempDir::new().unwrap();
        let queue = MailQueue::new(dir.path());
        queue.enqueue(&message("a@example.com")).unwrap();

        let mut transport = MockMailTransport::new();
        transport
            .expect_send()
            .times(1)
            .returning(|_| Err(Exception::Mail("connection refused".to_string())));

        let report = queue.deliver(&transport).unwrap();
        assert_eq!(report, DeliveryReport { sent: 0, failed: 1 });
        assert_eq!(queue.pending().unwrap().len(), 1);
    }

    #[test]
    fn test_corrupt_queue_file_is_counted_as_failure() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("broken.json"), "{not json").unwrap();
        let queue = MailQueue::new(dir.path());

        let report = queue.deliver(&LogTransport).unwrap();
        assert_eq!(report.failed, 1);
        assert!(dir.path().join("broken.json").exists());
    }
}
