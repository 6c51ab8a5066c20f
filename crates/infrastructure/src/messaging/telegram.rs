use std::time::Duration;

use async_trait::async_trait;
use crm_config::TelegramConfig;
use crm_domain::messaging::MessagingGateway;
use crm_errors::{CrmError, CrmResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Telegram Bot API 消息通道
pub struct TelegramGateway {
    client: reqwest::Client,
    api_base_url: String,
    bot_token: String,
}

impl TelegramGateway {
    pub fn new(config: &TelegramConfig) -> CrmResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| CrmError::Network(format!("创建HTTP客户端失败: {e}")))?;

        Ok(Self {
            client,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            bot_token: config.bot_token.clone(),
        })
    }

    fn send_message_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base_url, self.bot_token)
    }
}

#[async_trait]
impl MessagingGateway for TelegramGateway {
    #[instrument(skip(self, text))]
    async fn send(&self, recipient: i64, text: &str) -> CrmResult<()> {
        let body = SendMessageRequest {
            chat_id: recipient,
            text,
        };

        // 请求 URL 中包含 bot token，错误信息里去掉 URL
        let response = self
            .client
            .post(self.send_message_url())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CrmError::Timeout(format!("Telegram请求超时: {}", e.without_url()))
                } else {
                    CrmError::Network(format!("Telegram请求失败: {}", e.without_url()))
                }
            })?;

        let status = response.status();
        let payload: Option<TelegramResponse> = response.json().await.ok();

        if !status.is_success() {
            let description = payload
                .and_then(|p| p.description)
                .unwrap_or_else(|| "no description".to_string());
            return Err(CrmError::messaging(format!(
                "Telegram API返回错误状态 {status}: {description}"
            )));
        }

        match payload {
            Some(TelegramResponse { ok: true, .. }) => {
                debug!("消息已发送到 {}", recipient);
                Ok(())
            }
            Some(TelegramResponse { description, .. }) => Err(CrmError::messaging(format!(
                "Telegram API拒绝消息: {}",
                description.unwrap_or_else(|| "no description".to_string())
            ))),
            None => Err(CrmError::messaging("Telegram API响应无法解析")),
        }
    }
}
