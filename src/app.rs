use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use crm_config::AppConfig;
use crm_dispatcher::{NotificationDispatcher, NotificationScheduler};
use crm_domain::{
    entities::{Notification, Person},
    messaging::MessagingGateway,
    repositories::{NotificationRepository, PersonRepository},
};
use crm_infrastructure::{DatabaseManager, TelegramGateway};
use crm_observability::{init_metrics_exporter, MetricsCollector, StructuredLogger};
use tokio::sync::broadcast;
use tracing::info;

/// 主应用程序，持有数据库连接和仓储，按需组装调度器
pub struct Application {
    config: AppConfig,
    database: DatabaseManager,
    notification_repo: Arc<dyn NotificationRepository>,
    person_repo: Arc<dyn PersonRepository>,
    metrics: Arc<MetricsCollector>,
}

impl Application {
    /// 连接数据库并确保表结构存在
    pub async fn new(config: AppConfig) -> Result<Self> {
        let database = DatabaseManager::new(&config.database)
            .await
            .context("连接数据库失败")?;
        database
            .ensure_schema()
            .await
            .context("初始化数据库表结构失败")?;

        info!("应用程序初始化完成，数据库类型: {:?}", database.database_type());

        Ok(Self {
            notification_repo: database.notification_repository(),
            person_repo: database.person_repository(),
            metrics: Arc::new(MetricsCollector::new()),
            database,
            config,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn notification_repository(&self) -> Arc<dyn NotificationRepository> {
        Arc::clone(&self.notification_repo)
    }

    pub fn person_repository(&self) -> Arc<dyn PersonRepository> {
        Arc::clone(&self.person_repo)
    }

    /// 用给定的消息网关组装调度器
    pub fn build_scheduler(&self, gateway: Arc<dyn MessagingGateway>) -> NotificationScheduler {
        let dispatcher = Arc::new(NotificationDispatcher::new(
            self.notification_repository(),
            self.person_repository(),
            gateway,
            self.config.telegram.recipient_chat_id,
            Arc::clone(&self.metrics),
        ));

        NotificationScheduler::new(
            self.notification_repository(),
            dispatcher,
            self.config.scheduler.clone(),
            Arc::clone(&self.metrics),
        )
    }

    /// 运行通知引擎直到收到关闭信号
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        if !self.config.scheduler.enabled {
            info!("调度器已在配置中禁用，等待关闭信号");
            let _ = shutdown_rx.recv().await;
            return Ok(());
        }

        self.config
            .telegram
            .ensure_credentials()
            .context("Telegram 配置不完整")?;

        if self.config.observability.metrics_enabled {
            init_metrics_exporter(&self.config.observability.metrics_bind_address)
                .context("启动指标导出器失败")?;
        }

        let gateway = TelegramGateway::new(&self.config.telegram).context("创建 Telegram 网关失败")?;
        self.run_with_gateway(Arc::new(gateway), shutdown_rx).await
    }

    pub async fn run_with_gateway(
        &self,
        gateway: Arc<dyn MessagingGateway>,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<()> {
        let scheduler = self.build_scheduler(gateway);
        scheduler.run(shutdown_rx).await;
        Ok(())
    }

    pub async fn add_person(&self, person: &Person) -> Result<i64> {
        let id = self
            .person_repo
            .insert(person)
            .await
            .context("保存联系人失败")?;
        StructuredLogger::log_person_created(id, &person.display_name());
        Ok(id)
    }

    /// 为已存在的联系人安排一条保持联系提醒
    pub async fn schedule_keep_in_touch(
        &self,
        person_id: i64,
        at: DateTime<Utc>,
        description: &str,
    ) -> Result<i64> {
        self.person_repo
            .get(person_id)
            .await
            .with_context(|| format!("无法为联系人 {person_id} 安排提醒"))?;

        let notification = Notification::new_keep_in_touch(person_id, at, description);
        let id = self
            .notification_repo
            .insert(&notification)
            .await
            .context("保存提醒失败")?;

        StructuredLogger::log_notification_scheduled(
            id,
            person_id,
            notification.notification_type.as_str(),
            at,
        );
        Ok(id)
    }

    pub async fn list_notifications(&self, person_id: i64) -> Result<Vec<Notification>> {
        self.notification_repo
            .list_by_person(person_id)
            .await
            .with_context(|| format!("查询联系人 {person_id} 的提醒失败"))
    }

    /// 关闭数据库连接池，应在调度器停止之后调用
    pub async fn close(&self) {
        self.database.close().await;
        info!("数据库连接池已关闭");
    }
}
