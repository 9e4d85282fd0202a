// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! 命令行维护命令：运行计划任务、清空页面缓存

use log::{error, info};

use crate::{
    exception::Exception,
    page_cache::PageCache,
    param::DEFAULT_SCHEDULER_ACTION,
    scheduler::{SchedulerContext, SchedulerRegistry},
};

/// 一次计划任务调用的结果
#[derive(Debug, Clone, PartialEq)]
pub enum SchedulerOutcome {
    Completed { identifier: String, action: String },
    SchedulerMissing(String),
    ActionMissing { identifier: String, action: String },
}

/// 拆分 `名称[:动作]`，动作缺失或为空时为 `execute`。
pub fn parse_target(target: &str) -> (&str, &str) {
    match target.split_once(':') {
        Some((name, action)) if !action.is_empty() => (name, action),
        Some((name, _)) => (name, DEFAULT_SCHEDULER_ACTION),
        None => (target, DEFAULT_SCHEDULER_ACTION),
    }
}

/// 运行一个计划任务。找不到任务或动作时只记录错误，不视为失败。
pub fn run_scheduler(
    registry: &SchedulerRegistry,
    target: &str,
    ctx: &SchedulerContext<'_>,
) -> Result<SchedulerOutcome, Exception> {
    let (name, action) = parse_target(target);
    let identifier = SchedulerRegistry::identifier_for(name);
    let Some(scheduler) = registry.get(&identifier) else {
        error!("计划任务{}不存在", identifier);
        return Ok(SchedulerOutcome::SchedulerMissing(identifier));
    };
    if !scheduler.actions().iter().any(|a| *a == action) {
        error!("计划任务{}中不存在方法{}", identifier, action);
        return Ok(SchedulerOutcome::ActionMissing {
            identifier,
            action: action.to_string(),
        });
    }
    scheduler.run(action, ctx)?;
    Ok(SchedulerOutcome::Completed {
        identifier,
        action: action.to_string(),
    })
}

/// 清空页面缓存，返回删除的文件数。
pub fn clear_cache(cache: &PageCache) -> Result<usize, Exception> {
    let count = cache.clear()?;
    if count > 0 {
        info!("已从缓存中删除{}个文件", count);
    } else {
        info!("缓存中没有文件");
    }
    Ok(count)
}
