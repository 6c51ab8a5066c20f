use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// 联系人，通知引擎只读取其中的显示名称
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: i64,
    pub first_name: String,
    pub last_name: Option<String>,
    pub second_name: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub contact_infos: Vec<ContactInfo>,
    pub job_infos: Vec<JobInfo>,
    pub settings: PersonSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    /// 联系方式名称，例如 `telegram`、`phone`
    pub method: String,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobInfo {
    pub company: String,
    pub position: String,
    pub current: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonSettings {
    pub birthday_notify: bool,
}

impl Person {
    pub fn new(first_name: impl Into<String>, last_name: Option<String>) -> Self {
        Self {
            id: 0,
            first_name: first_name.into(),
            last_name,
            second_name: None,
            birth_date: None,
            contact_infos: Vec::new(),
            job_infos: Vec::new(),
            settings: PersonSettings::default(),
        }
    }

    /// 名 + 姓；没有姓（或姓为空白）时只返回名
    pub fn display_name(&self) -> String {
        match self.last_name.as_deref().map(str::trim) {
            Some(last) if !last.is_empty() => format!("{} {}", self.first_name, last),
            _ => self.first_name.clone(),
        }
    }

    pub fn current_job(&self) -> Option<&JobInfo> {
        self.job_infos.iter().find(|job| job.current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name() {
        let person = Person::new("John", Some("Smith".to_string()));
        assert_eq!(person.display_name(), "John Smith");

        let person = Person::new("John", None);
        assert_eq!(person.display_name(), "John");

        let person = Person::new("John", Some("  ".to_string()));
        assert_eq!(person.display_name(), "John");
    }

    #[test]
    fn test_current_job() {
        let mut person = Person::new("Ann", None);
        assert!(person.current_job().is_none());

        person.job_infos = vec![
            JobInfo {
                company: "Acme".to_string(),
                position: "Engineer".to_string(),
                current: false,
            },
            JobInfo {
                company: "Initech".to_string(),
                position: "Lead".to_string(),
                current: true,
            },
        ];
        assert_eq!(person.current_job().unwrap().company, "Initech");
    }
}
