use crm_domain::entities::{NotificationType, Person};

/// 生成发送给用户的提醒文本
pub fn render_message(person: &Person, notification_type: NotificationType) -> String {
    match notification_type {
        NotificationType::KeepInTouch => {
            format!("It's time to get in touch with {}", person.display_name())
        }
    }
}
