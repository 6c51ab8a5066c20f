use async_trait::async_trait;
use crm_errors::CrmResult;

/// 外部消息通道
///
/// 发送可能暂时或永久失败，调用方不做重试。
#[async_trait]
pub trait MessagingGateway: Send + Sync {
    async fn send(&self, recipient: i64, text: &str) -> CrmResult<()>;
}
