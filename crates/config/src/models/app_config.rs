use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{
    database::DatabaseConfig, observability::ObservabilityConfig, scheduler::SchedulerConfig,
    telegram::TelegramConfig,
};
use crate::validation::ConfigValidator;

/// 默认配置文件搜索路径，按顺序取第一个存在的文件
pub const DEFAULT_CONFIG_PATHS: [&str; 2] = ["config/crm.toml", "crm.toml"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// 加载配置：内置默认值 < 配置文件 < `CRM_` 前缀的环境变量
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let defaults =
            ConfigBuilder::try_from(&AppConfig::default()).context("构建默认配置失败")?;
        let mut builder = ConfigBuilder::builder().add_source(defaults);

        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            } else {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
        } else if let Some(path) = DEFAULT_CONFIG_PATHS
            .iter()
            .find(|path| Path::new(path).exists())
        {
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix("CRM")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate()?;

        Ok(config)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }
}

impl ConfigValidator for AppConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        self.database.validate()?;
        self.telegram.validate()?;
        self.scheduler.validate()?;
        self.observability.validate()?;
        self.validate_claim_timeout()?;
        Ok(())
    }
}

impl AppConfig {
    /// 一次分发最长耗时：查询联系人、调用 Telegram、写回状态
    pub fn max_dispatch_seconds(&self) -> u64 {
        self.telegram.request_timeout_seconds + 2 * self.database.connection_timeout_seconds
    }

    // 回收超时短于一次分发会让其他进程回收仍在分发中的通知
    fn validate_claim_timeout(&self) -> crate::ConfigResult<()> {
        let Some(claim_timeout) = self.scheduler.claim_timeout_seconds else {
            return Ok(());
        };
        let max_dispatch = self.max_dispatch_seconds();
        if claim_timeout <= max_dispatch {
            return Err(crate::ConfigError::Validation(format!(
                "scheduler.claim_timeout_seconds ({claim_timeout}) must be greater than the longest dispatch ({max_dispatch}s = telegram.request_timeout_seconds + 2 * database.connection_timeout_seconds)"
            )));
        }
        Ok(())
    }
}
