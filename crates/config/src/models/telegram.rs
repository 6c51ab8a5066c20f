use crate::validation::{ConfigValidator, ValidationUtils};
use serde::{Deserialize, Serialize};

/// Telegram 机器人配置，提醒消息只发送给一个固定的接收者
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub recipient_chat_id: i64,
    pub api_base_url: String,
    pub request_timeout_seconds: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            recipient_chat_id: 0,
            api_base_url: "https://api.telegram.org".to_string(),
            request_timeout_seconds: 10,
        }
    }
}

impl TelegramConfig {
    /// 发送消息前必须具备的凭据，仅在启动通知引擎时检查
    pub fn ensure_credentials(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_not_empty(&self.bot_token, "telegram.bot_token")?;
        if self.recipient_chat_id == 0 {
            return Err(crate::ConfigError::Validation(
                "telegram.recipient_chat_id must be set".to_string(),
            ));
        }
        Ok(())
    }
}

impl ConfigValidator for TelegramConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_http_url(&self.api_base_url, "telegram.api_base_url")?;
        ValidationUtils::validate_timeout_seconds(
            self.request_timeout_seconds,
            "telegram.request_timeout_seconds",
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_telegram_config_validation() {
        let config = TelegramConfig::default();
        assert!(config.validate().is_ok());
        // 默认配置没有凭据
        assert!(config.ensure_credentials().is_err());

        let configured = TelegramConfig {
            bot_token: "123:abc".to_string(),
            recipient_chat_id: 42,
            ..TelegramConfig::default()
        };
        assert!(configured.ensure_credentials().is_ok());

        let mut invalid_config = configured.clone();
        invalid_config.api_base_url = "telegram".to_string();
        assert!(invalid_config.validate().is_err());

        let mut invalid_config = configured;
        invalid_config.recipient_chat_id = 0;
        assert!(invalid_config.ensure_credentials().is_err());
    }
}
