use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use crm_config::AppConfig;
use crm_domain::entities::Person;
use crm_observability::init_logging;
use personal_crm::cli::{build_cli, CliArgs, CliCommand};
use personal_crm::{Application, ShutdownManager};
use tokio::signal;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = build_cli().get_matches();
    let args = CliArgs::from_matches(&matches, Utc::now())?;

    // 加载配置
    let config = AppConfig::load(args.config_path.as_deref()).context("加载配置失败")?;

    // 命令行参数优先于配置文件
    let log_level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.observability.log_level.clone());
    let log_format = args.log_format.unwrap_or(config.observability.log_format);
    init_logging(&log_level, log_format)?;

    let app = Application::new(config).await?;

    match args.command {
        CliCommand::Run => run_engine(app).await?,
        CliCommand::AddPerson {
            first_name,
            last_name,
            second_name,
        } => {
            let mut person = Person::new(first_name, last_name);
            person.second_name = second_name;
            let id = app.add_person(&person).await?;
            println!("{id}");
            app.close().await;
        }
        CliCommand::Schedule {
            person_id,
            at,
            description,
        } => {
            let id = app
                .schedule_keep_in_touch(person_id, at, &description)
                .await?;
            println!("{id}");
            app.close().await;
        }
        CliCommand::List { person_id } => {
            for notification in app.list_notifications(person_id).await? {
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    notification.id,
                    notification.notification_time.to_rfc3339(),
                    notification.status,
                    notification.notification_type,
                    notification.description
                );
            }
            app.close().await;
        }
    }

    Ok(())
}

async fn run_engine(app: Application) -> Result<()> {
    info!("启动保持联系提醒引擎");

    let shutdown_manager = ShutdownManager::new();
    let shutdown_rx = shutdown_manager.subscribe().await;
    // 调度器自身会等待进行中的分发，这里额外留出余量
    let shutdown_timeout =
        Duration::from_secs(app.config().scheduler.shutdown_timeout_seconds + 5);

    let app = Arc::new(app);
    let mut app_handle = {
        let app = Arc::clone(&app);
        tokio::spawn(async move { app.run(shutdown_rx).await })
    };

    tokio::select! {
        result = &mut app_handle => {
            // 引擎在收到信号前退出，通常是配置或启动错误
            app.close().await;
            return result.context("应用任务异常退出")?;
        }
        _ = wait_for_shutdown_signal() => {}
    }

    info!("收到关闭信号，开始优雅关闭...");
    shutdown_manager.shutdown().await;

    match tokio::time::timeout(shutdown_timeout, app_handle).await {
        Ok(Ok(Ok(()))) => info!("应用已优雅关闭"),
        Ok(Ok(Err(e))) => error!("应用运行失败: {e:#}"),
        Ok(Err(e)) => error!("应用任务异常退出: {e}"),
        Err(_) => warn!("应用关闭超时，强制退出"),
    }

    app.close().await;
    info!("保持联系提醒引擎已退出");
    Ok(())
}

/// 等待 Ctrl+C 或 SIGTERM
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("安装Ctrl+C信号处理器失败: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("安装SIGTERM信号处理器失败: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("收到Ctrl+C信号"),
        _ = terminate => info!("收到SIGTERM信号"),
    }
}
