//! 建表语句
//!
//! 启动时逐条执行，全部使用 `IF NOT EXISTS`，重复执行无副作用。
//! 通知的 `person_id` 不加外键：联系人被删除后通知仍然保留，分发时标记为失败。

pub const SQLITE_SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS persons (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        first_name TEXT NOT NULL,
        last_name TEXT,
        second_name TEXT,
        birth_date DATE,
        created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS contact_infos (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        person_id INTEGER NOT NULL REFERENCES persons(id) ON DELETE CASCADE,
        method_name TEXT NOT NULL,
        contact_data TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS job_infos (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        person_id INTEGER NOT NULL REFERENCES persons(id) ON DELETE CASCADE,
        company TEXT NOT NULL,
        position TEXT NOT NULL,
        current BOOLEAN NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS person_settings (
        person_id INTEGER PRIMARY KEY REFERENCES persons(id) ON DELETE CASCADE,
        birthday_notify BOOLEAN NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS notifications (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        person_id INTEGER NOT NULL,
        notification_type TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        notification_time DATETIME NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        claimed_at DATETIME,
        created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_notifications_status_time ON notifications(status, notification_time)",
    "CREATE INDEX IF NOT EXISTS idx_notifications_person_id ON notifications(person_id)",
    "CREATE INDEX IF NOT EXISTS idx_contact_infos_person_id ON contact_infos(person_id)",
    "CREATE INDEX IF NOT EXISTS idx_job_infos_person_id ON job_infos(person_id)",
];

pub const POSTGRES_SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS persons (
        id BIGSERIAL PRIMARY KEY,
        first_name VARCHAR(255) NOT NULL,
        last_name VARCHAR(255),
        second_name VARCHAR(255),
        birth_date DATE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS contact_infos (
        id BIGSERIAL PRIMARY KEY,
        person_id BIGINT NOT NULL REFERENCES persons(id) ON DELETE CASCADE,
        method_name VARCHAR(64) NOT NULL,
        contact_data VARCHAR(512) NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS job_infos (
        id BIGSERIAL PRIMARY KEY,
        person_id BIGINT NOT NULL REFERENCES persons(id) ON DELETE CASCADE,
        company VARCHAR(255) NOT NULL,
        position VARCHAR(255) NOT NULL,
        current BOOLEAN NOT NULL DEFAULT FALSE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS person_settings (
        person_id BIGINT PRIMARY KEY REFERENCES persons(id) ON DELETE CASCADE,
        birthday_notify BOOLEAN NOT NULL DEFAULT FALSE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS notifications (
        id BIGSERIAL PRIMARY KEY,
        person_id BIGINT NOT NULL,
        notification_type VARCHAR(32) NOT NULL,
        status VARCHAR(32) NOT NULL DEFAULT 'pending',
        notification_time TIMESTAMPTZ NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        claimed_at TIMESTAMPTZ,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_notifications_status_time ON notifications(status, notification_time)",
    "CREATE INDEX IF NOT EXISTS idx_notifications_person_id ON notifications(person_id)",
    "CREATE INDEX IF NOT EXISTS idx_contact_infos_person_id ON contact_infos(person_id)",
    "CREATE INDEX IF NOT EXISTS idx_job_infos_person_id ON job_infos(person_id)",
];
