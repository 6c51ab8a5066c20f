use crate::validation::{ConfigValidator, ValidationUtils};
use serde::{Deserialize, Serialize};

/// 通知调度器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub enabled: bool,
    /// 扫描到期通知的间隔（秒）
    pub tick_interval_seconds: u64,
    /// 同时执行的分发任务上限
    pub max_concurrent_dispatches: usize,
    /// 通知处于 dispatching 状态超过该时间后被回收为 pending，`None` 表示不回收
    pub claim_timeout_seconds: Option<u64>,
    /// 关闭时等待进行中分发任务的最长时间（秒）
    pub shutdown_timeout_seconds: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tick_interval_seconds: 5,
            max_concurrent_dispatches: 32,
            claim_timeout_seconds: Some(300),
            shutdown_timeout_seconds: 30,
        }
    }
}

impl ConfigValidator for SchedulerConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_timeout_seconds(
            self.tick_interval_seconds,
            "scheduler.tick_interval_seconds",
        )?;
        ValidationUtils::validate_count(
            self.max_concurrent_dispatches,
            "scheduler.max_concurrent_dispatches",
            10000,
        )?;
        ValidationUtils::validate_timeout_seconds(
            self.shutdown_timeout_seconds,
            "scheduler.shutdown_timeout_seconds",
        )?;

        if let Some(claim_timeout) = self.claim_timeout_seconds {
            ValidationUtils::validate_timeout_seconds(
                claim_timeout,
                "scheduler.claim_timeout_seconds",
            )?;
            // 回收超时必须长于一次 tick，否则正常分发中的通知会被误回收
            if claim_timeout <= self.tick_interval_seconds {
                return Err(crate::ConfigError::Validation(
                    "scheduler.claim_timeout_seconds must be greater than tick_interval_seconds"
                        .to_string(),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheduler_config_validation() {
        let config = SchedulerConfig::default();
        assert!(config.validate().is_ok());

        let mut invalid_config = config.clone();
        invalid_config.tick_interval_seconds = 0;
        assert!(invalid_config.validate().is_err());

        let mut invalid_config = config.clone();
        invalid_config.max_concurrent_dispatches = 0;
        assert!(invalid_config.validate().is_err());

        let mut invalid_config = config.clone();
        invalid_config.claim_timeout_seconds = Some(5);
        assert!(invalid_config.validate().is_err());

        let mut no_reclaim = config;
        no_reclaim.claim_timeout_seconds = None;
        assert!(no_reclaim.validate().is_ok());
    }
}
