use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

pub struct StructuredLogger;

impl StructuredLogger {
    pub fn log_notification_scheduled(
        notification_id: i64,
        person_id: i64,
        notification_type: &str,
        notification_time: DateTime<Utc>,
    ) {
        info!(
            event = "notification_scheduled",
            notification.id = notification_id,
            person.id = person_id,
            notification.type = notification_type,
            notification.time = %notification_time,
            "Notification scheduled"
        );
    }

    pub fn log_notification_claimed(notification_id: i64, person_id: i64) {
        debug!(
            event = "notification_claimed",
            notification.id = notification_id,
            person.id = person_id,
            "Notification claimed for dispatch"
        );
    }

    pub fn log_notification_skipped(notification_id: i64) {
        debug!(
            event = "notification_skipped",
            notification.id = notification_id,
            "Notification already claimed elsewhere, skipping"
        );
    }

    pub fn log_notification_raised(notification_id: i64, person_id: i64, duration_ms: u64) {
        info!(
            event = "notification_raised",
            notification.id = notification_id,
            person.id = person_id,
            dispatch.duration_ms = duration_ms,
            "Notification delivered"
        );
    }

    pub fn log_notification_failed(notification_id: i64, person_id: i64, error_message: &str) {
        error!(
            event = "notification_failed",
            notification.id = notification_id,
            person.id = person_id,
            notification.error = error_message,
            "Notification dispatch failed"
        );
    }

    pub fn log_status_persist_failed(notification_id: i64, status: &str, error_message: &str) {
        error!(
            event = "status_persist_failed",
            notification.id = notification_id,
            notification.status = status,
            notification.error = error_message,
            "Failed to persist notification status"
        );
    }

    pub fn log_due_query_failed(error_message: &str) {
        warn!(
            event = "due_query_failed",
            error = error_message,
            "Due notification query failed, skipping tick"
        );
    }

    pub fn log_tick_completed(due_count: usize, launched_count: usize, duration_ms: u64) {
        debug!(
            event = "tick_completed",
            tick.due = due_count,
            tick.launched = launched_count,
            tick.duration_ms = duration_ms,
            "Scheduler tick completed"
        );
    }

    pub fn log_stale_claims_released(released: u64, cutoff: DateTime<Utc>) {
        warn!(
            event = "stale_claims_released",
            claims.released = released,
            claims.cutoff = %cutoff,
            "Released stale notification claims"
        );
    }

    pub fn log_person_created(person_id: i64, display_name: &str) {
        info!(
            event = "person_created",
            person.id = person_id,
            person.name = display_name,
            "Person created"
        );
    }
}
