// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 站点服务器
//!
//! 基于 Tokio 运行时的前端控制器服务器：
//! - 每个 TCP 连接一个任务，处理一个请求后关闭连接
//! - 请求经 [`Dispatcher`] 依次匹配静态文件、重定向、页面缓存、页面模板和控制器
//! - 后台管理控制台（stdin 指令交互）

use microsite::{
    command, config::Config, dispatcher::Dispatcher, exception::Exception, logging,
    request::{read_request, Request}, response::Response,
};

use log::{debug, error, info, warn};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    runtime::Builder,
    sync::Notify,
};

use std::{
    env,
    net::{Ipv4Addr, SocketAddrV4},
    process,
    sync::{Arc, Mutex},
    time::Instant,
};

const DEFAULT_CONFIG: &str = "config/app.toml";

/// # 程序入口点
///
/// 加载配置、初始化日志，再按配置的工作线程数启动运行时。
fn main() {
    let config_path = env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    let config = match Config::from_toml(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("无法载入配置文件{}：{}", config_path, e);
            process::exit(1);
        }
    };
    if let Err(e) = logging::init(&config) {
        eprintln!("日志系统初始化失败：{}", e);
        process::exit(1);
    }
    info!("配置文件{}已载入", config_path);

    let runtime = match Builder::new_multi_thread()
        .worker_threads(config.worker_threads())
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("无法创建Tokio运行时：{}", e);
            process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(serve(config)) {
        error!("服务器异常退出：{}", e);
        process::exit(1);
    }
}

async fn serve(config: Config) -> Result<(), Exception> {
    let port = config.port();
    let address = match config.local() {
        true => Ipv4Addr::new(127, 0, 0, 1),
        false => Ipv4Addr::new(0, 0, 0, 0),
    };
    let dispatcher = Arc::new(Dispatcher::new(config)?);
    info!("页面目录：{}", dispatcher.config().pages_dir().display());

    let socket = SocketAddrV4::new(address, port);
    let listener = TcpListener::bind(socket).await?;
    info!("服务端在{}上监听Socket连接", socket);

    // shutdown: 控制台发出停机信号
    // active_connection: 当前并发连接数
    let shutdown = Arc::new(Notify::new());
    let active_connection = Arc::new(Mutex::new(0u32));

    tokio::spawn(console(
        Arc::clone(&shutdown),
        Arc::clone(&active_connection),
        Arc::clone(&dispatcher),
    ));

    let mut id: u128 = 0;
    loop {
        let (stream, addr) = tokio::select! {
            _ = shutdown.notified() => {
                info!("主循环接收到停机指令，正在退出...");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!("接受连接失败：{}", e);
                    continue;
                }
            },
        };
        debug!("[ID{}]TCP连接已建立：{}", id, addr);

        let dispatcher = Arc::clone(&dispatcher);
        let active_connection = Arc::clone(&active_connection);
        tokio::spawn(async move {
            adjust(&active_connection, 1);
            handle_connection(stream, id, &dispatcher).await;
            adjust(&active_connection, -1);
        });
        id += 1;
    }
    Ok(())
}

fn adjust(counter: &Mutex<u32>, delta: i32) {
    let mut lock = match counter.lock() {
        Ok(lock) => lock,
        Err(poisoned) => poisoned.into_inner(),
    };
    *lock = lock.saturating_add_signed(delta);
}

/// 管理控制台
async fn console(
    shutdown: Arc<Notify>,
    active_connection: Arc<Mutex<u32>>,
    dispatcher: Arc<Dispatcher>,
) {
    let mut reader = BufReader::new(tokio::io::stdin());
    let mut input = String::new();
    loop {
        input.clear();
        match reader.read_line(&mut input).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        match input.trim() {
            "stop" => {
                shutdown.notify_one();
                println!("停机指令已激活，服务器将停止接受新连接...");
                break;
            }
            "status" => {
                let active_count = match active_connection.lock() {
                    Ok(lock) => *lock,
                    Err(poisoned) => *poisoned.into_inner(),
                };
                println!("== Microsite 状态 ===");
                println!("当前活跃连接数: {}", active_count);
                println!("====================");
            }
            "cache:clear" => match command::clear_cache(dispatcher.page_cache()) {
                Ok(count) => println!("已删除{}个缓存文件", count),
                Err(e) => println!("清空缓存失败：{}", e),
            },
            "help" => {
                println!("== Microsite Help ==");
                println!("stop        - 发出停机信号");
                println!("status      - 查看当前服务器运行状态");
                println!("cache:clear - 清空页面缓存");
                println!("help        - 显示此帮助信息");
                println!("====================");
            }
            "" => {}
            cmd => println!("无效的命令：{}", cmd),
        }
    }
}

/// # 连接处理器
///
/// 读取一个完整请求，交给调度器处理，写回响应后关闭连接。
async fn handle_connection(mut stream: TcpStream, id: u128, dispatcher: &Dispatcher) {
    let limit = dispatcher.config().max_request_size();
    let response = match read_request(&mut stream, limit).await {
        Ok(buffer) if buffer.is_empty() => return,
        Ok(buffer) => {
            let start_time = Instant::now();
            let response = match Request::try_from(&buffer, id) {
                Ok(request) => {
                    let response = dispatcher.handle(&request, id);
                    info!(
                        "[ID{}] HTTP/{}, {}, {}, {}, {}, {}",
                        id,
                        request.version(),
                        request.path(),
                        request.method(),
                        response.status_code(),
                        response.information(),
                        request.user_agent(),
                    );
                    response
                }
                Err(e) => {
                    warn!("[ID{}]解析HTTP请求失败：{}", id, e);
                    Response::from_status_code(e.status_code())
                }
            };
            debug!(
                "[ID{}]HTTP响应构建完成，服务端用时{}ms。",
                id,
                start_time.elapsed().as_millis()
            );
            response
        }
        Err(Exception::Io(e)) => {
            error!("[ID{}]读取TCPStream时遇到错误: {}", id, e);
            return;
        }
        Err(e) => {
            warn!("[ID{}]拒绝请求：{}", id, e);
            Response::from_status_code(e.status_code())
        }
    };

    let response_bytes = response.as_bytes();
    debug!("[ID{}]发送响应，长度: {}", id, response_bytes.len());
    if let Err(e) = stream.write_all(&response_bytes).await {
        error!("[ID{}]发送响应失败: {}", id, e);
        return;
    }
    let _ = stream.flush().await;
    let _ = stream.shutdown().await;
}
