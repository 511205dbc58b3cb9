// 引入标准库：
// `Path`: 文件路径处理。
// `Arc`: 原子引用计数，用于在服务器 worker 之间共享监控引擎。
use std::{path::Path, sync::Arc};

// 仅在 Unix 系统下引入文件系统模块，用于处理 Unix Domain Socket 文件。
#[cfg(unix)]
use std::fs;

use actix_web::{middleware::Logger, web, App, HttpServer};

// 引入领域层配置和遥测。
use sui_watch_domain::config::{ApiConfig, ConfigError, MonitorConfig};
use sui_watch_domain::services::telemetry::{init_telemetry, TelemetryConfig, TelemetryError};
// 引入监控引擎：账户来源、上游 RPC、告警、广播中心和监督者。
use sui_watch_monitor::{
    build_alert_sink, build_monitor_source, build_rpc_source, event_channel, run_dispatch,
    BroadcastHub, MonitorError, MonitoringSupervisor, WatcherTiming, EVENT_CHANNEL_CAPACITY,
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::{
    handlers::{metrics_handler, reload_handler, status_handler, ws_handler},
    state::AppState,
};

// 应用程序启动入口函数。
pub async fn run() -> Result<(), BootstrapError> {
    // 1. 加载配置（HTTP 监听 + 监控引擎）
    let config = ApiConfig::load_from_env()?;
    let monitor_config = MonitorConfig::load_from_env()?;

    // 2. 初始化遥测 (Telemetry)
    let telemetry_config = TelemetryConfig::from_env("API");
    let telemetry = init_telemetry(&telemetry_config)?;

    // 3. 构建监控引擎的协作者
    let source = build_monitor_source(&monitor_config).await?;
    let upstream = build_rpc_source(&monitor_config)?;
    let alerts = build_alert_sink(&monitor_config);

    // 4. 广播中心 + 分发任务
    // watcher 只写入 mpsc 通道，分发任务负责扇出到所有 WebSocket 订阅者。
    let hub = Arc::new(BroadcastHub::new(config.subscriber_buffer()));
    let (events, receiver) = event_channel(EVENT_CHANNEL_CAPACITY);
    let dispatch_cancel = CancellationToken::new();
    let dispatcher = tokio::spawn(run_dispatch(hub.clone(), receiver, dispatch_cancel.clone()));

    // 5. 启动监督者
    // 账户表读取失败不会阻止服务启动，错误会通过 status 接口暴露。
    let supervisor = Arc::new(MonitoringSupervisor::new(
        source,
        upstream,
        alerts,
        events,
        WatcherTiming::from_config(&monitor_config),
    ));
    if let Err(err) = supervisor.start().await {
        error!(error = %err, "monitoring did not start; serving status only");
    }

    let state = AppState::new(
        supervisor.clone(),
        hub,
        telemetry.clone(),
        config.send_timeout(),
    );

    // 配置了内部监听器时，指标只在内部接口暴露。
    let include_metrics_on_public = !config.has_internal_listener();

    let public_state = state.clone();

    // 6. 公共 HTTP 服务器：WebSocket 推送 + 状态查询
    let mut public_server = HttpServer::new(move || {
        let mut app = App::new()
            .app_data(web::Data::new(public_state.clone()))
            .wrap(Logger::default())
            .route("/api/v1/ws", web::get().to(ws_handler))
            .route("/api/v1/monitor/status", web::get().to(status_handler));

        if include_metrics_on_public {
            app = app.route("/metrics", web::get().to(metrics_handler));
        }

        app
    });

    #[cfg(unix)]
    {
        if let Some(socket) = config.api_unix_socket() {
            // 先清理上次非正常退出遗留的 socket 文件。
            cleanup_socket(socket)?;
            public_server = public_server.bind_uds(socket)?;
        } else {
            public_server = public_server.bind(config.api_bind_address())?;
        }
    }

    #[cfg(not(unix))]
    {
        if let Some(socket) = config.api_unix_socket() {
            return Err(BootstrapError::Io(std::io::Error::other(format!(
                "unix socket '{socket}' requested but this platform does not support it"
            ))));
        }
        public_server = public_server.bind(config.api_bind_address())?;
    }

    let public_server = public_server.run();

    // 7. 内部 HTTP 服务器（可选）：指标 + 重新加载账户
    let internal_server = if config.has_internal_listener() {
        let internal_state = state.clone();
        let mut internal_server = HttpServer::new(move || {
            App::new()
                .app_data(web::Data::new(internal_state.clone()))
                .wrap(Logger::default())
                .route("/metrics", web::get().to(metrics_handler))
                .route("/api/v1/monitor/reload", web::post().to(reload_handler))
        });

        #[cfg(unix)]
        {
            if let Some(socket) = config.internal_unix_socket() {
                cleanup_socket(socket)?;
                internal_server = internal_server.bind_uds(socket)?;
            } else if let Some(addr) = config.internal_bind_address() {
                internal_server = internal_server.bind(addr)?;
            } else {
                return Err(BootstrapError::Io(std::io::Error::other(
                    "internal listener configured but no bind target provided",
                )));
            }
        }

        #[cfg(not(unix))]
        {
            if let Some(socket) = config.internal_unix_socket() {
                return Err(BootstrapError::Io(std::io::Error::other(format!(
                    "internal unix socket '{socket}' requested but this platform does not support it"
                ))));
            }
            if let Some(addr) = config.internal_bind_address() {
                internal_server = internal_server.bind(addr)?;
            } else {
                return Err(BootstrapError::Io(std::io::Error::other(
                    "internal listener configured but no bind target provided",
                )));
            }
        }

        Some(internal_server.run())
    } else {
        None
    };

    // 8. 并发运行服务器，直到收到停止信号
    let served = if let Some(internal) = internal_server {
        tokio::try_join!(public_server, internal).map(|_| ())
    } else {
        public_server.await
    };

    // 9. 服务器退出后停止所有 watcher 和分发任务
    supervisor.shutdown().await;
    dispatch_cancel.cancel();
    if let Err(err) = dispatcher.await {
        warn!(?err, "event dispatcher ended abnormally");
    }

    served?;
    Ok(())
}

// 启动过程中的错误枚举。
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("monitor error: {0}")]
    Monitor(#[from] MonitorError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// bind 会因遗留的 socket 文件失败，所以需要先删除。
#[cfg(unix)]
fn cleanup_socket(path: &str) -> std::io::Result<()> {
    let socket_path = Path::new(path);
    if socket_path.exists() {
        fs::remove_file(socket_path)?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn cleanup_socket(_path: &str) -> std::io::Result<()> {
    Ok(())
}
