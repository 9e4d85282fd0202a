// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 维护命令行
//!
//! ```text
//! run scheduler mail-queue:send
//! run cache:clear
//! ```

use clap::{Parser, Subcommand};
use log::error;
use microsite::{
    command::{self, SchedulerOutcome},
    config::Config,
    logging,
    mail::{LogTransport, MailQueue},
    page_cache::PageCache,
    scheduler::{self, SchedulerContext},
};

use std::{env, process};

#[derive(Parser)]
#[command(name = "run", about = "站点维护命令")]
struct Cli {
    /// 站点配置文件
    #[arg(short, long, default_value = "config/app.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 运行计划任务，格式为 `名称[:动作]`
    Scheduler { target: String },
    /// 清空页面缓存
    #[command(name = "cache:clear")]
    CacheClear,
}

fn main() {
    if env::var_os("GATEWAY_INTERFACE").is_some() {
        eprintln!("该命令只能在命令行中运行");
        process::exit(1);
    }

    let cli = Cli::parse();
    let config = match Config::from_toml(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("无法载入配置文件{}：{}", cli.config, e);
            process::exit(1);
        }
    };
    if let Err(e) = logging::init(&config) {
        eprintln!("日志系统初始化失败：{}", e);
    }

    match cli.command {
        Commands::Scheduler { target } => {
            let queue = MailQueue::new(config.mail_queue_dir());
            let ctx = SchedulerContext {
                config: &config,
                mail_queue: &queue,
                transport: &LogTransport,
            };
            match command::run_scheduler(&scheduler::registry(), &target, &ctx) {
                Ok(SchedulerOutcome::Completed { identifier, action }) => {
                    println!("{}::{} 执行完毕", identifier, action);
                }
                Ok(SchedulerOutcome::SchedulerMissing(identifier)) => {
                    println!("计划任务{}不存在", identifier);
                }
                Ok(SchedulerOutcome::ActionMissing { identifier, action }) => {
                    println!("计划任务{}中不存在方法{}", identifier, action);
                }
                Err(e) => {
                    error!("计划任务{}执行失败：{}", target, e);
                    process::exit(1);
                }
            }
        }
        Commands::CacheClear => {
            match command::clear_cache(&PageCache::new(config.cache_dir())) {
                Ok(0) => println!("缓存中没有文件"),
                Ok(count) => println!("已从缓存中删除{}个文件", count),
                Err(e) => {
                    error!("清空缓存失败：{}", e);
                    process::exit(1);
                }
            }
        }
    }
}
