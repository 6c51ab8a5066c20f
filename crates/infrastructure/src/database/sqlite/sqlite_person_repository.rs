use async_trait::async_trait;
use crm_domain::{
    entities::{ContactInfo, JobInfo, Person, PersonSettings},
    repositories::PersonRepository,
};
use crm_errors::{CrmError, CrmResult};
use sqlx::{Row, SqlitePool};
use tracing::{debug, instrument};

use crate::error_handling::{RepositoryErrorHelpers, RepositoryOperation};

pub struct SqlitePersonRepository {
    pool: SqlitePool,
}

impl SqlitePersonRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_person(row: &sqlx::sqlite::SqliteRow) -> CrmResult<Person> {
        Ok(Person {
            id: row.try_get("id")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            second_name: row.try_get("second_name")?,
            birth_date: row.try_get("birth_date")?,
            contact_infos: Vec::new(),
            job_infos: Vec::new(),
            settings: PersonSettings::default(),
        })
    }

    async fn fetch_contact_infos(&self, person_id: i64) -> CrmResult<Vec<ContactInfo>> {
        let rows = sqlx::query(
            "SELECT method_name, contact_data FROM contact_infos WHERE person_id = $1 ORDER BY id",
        )
        .bind(person_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            RepositoryErrorHelpers::person_database_error(
                RepositoryOperation::Read,
                Some(person_id),
                e,
            )
        })?;

        rows.iter()
            .map(|row| {
                Ok(ContactInfo {
                    method: row.try_get("method_name")?,
                    data: row.try_get("contact_data")?,
                })
            })
            .collect()
    }

    async fn fetch_job_infos(&self, person_id: i64) -> CrmResult<Vec<JobInfo>> {
        let rows = sqlx::query(
            "SELECT company, position, current FROM job_infos WHERE person_id = $1 ORDER BY id",
        )
        .bind(person_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            RepositoryErrorHelpers::person_database_error(
                RepositoryOperation::Read,
                Some(person_id),
                e,
            )
        })?;

        rows.iter()
            .map(|row| {
                Ok(JobInfo {
                    company: row.try_get("company")?,
                    position: row.try_get("position")?,
                    current: row.try_get("current")?,
                })
            })
            .collect()
    }

    async fn fetch_settings(&self, person_id: i64) -> CrmResult<PersonSettings> {
        let row = sqlx::query("SELECT birthday_notify FROM person_settings WHERE person_id = $1")
            .bind(person_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                RepositoryErrorHelpers::person_database_error(
                    RepositoryOperation::Read,
                    Some(person_id),
                    e,
                )
            })?;

        // 没有设置记录的联系人使用默认设置
        match row {
            Some(row) => Ok(PersonSettings {
                birthday_notify: row.try_get("birthday_notify")?,
            }),
            None => Ok(PersonSettings::default()),
        }
    }
}

#[async_trait]
impl PersonRepository for SqlitePersonRepository {
    async fn get(&self, id: i64) -> CrmResult<Person> {
        let row = sqlx::query(
            "SELECT id, first_name, last_name, second_name, birth_date FROM persons WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            RepositoryErrorHelpers::person_database_error(RepositoryOperation::Read, Some(id), e)
        })?;

        let mut person = match row {
            Some(row) => Self::row_to_person(&row)?,
            None => return Err(CrmError::person_not_found(id)),
        };

        person.contact_infos = self.fetch_contact_infos(id).await?;
        person.job_infos = self.fetch_job_infos(id).await?;
        person.settings = self.fetch_settings(id).await?;

        Ok(person)
    }

    #[instrument(skip(self, person), fields(first_name = %person.first_name))]
    async fn insert(&self, person: &Person) -> CrmResult<i64> {
        let to_error = |e| {
            RepositoryErrorHelpers::person_database_error(RepositoryOperation::Create, None, e)
        };

        let mut tx = self.pool.begin().await.map_err(to_error)?;

        let row = sqlx::query(
            r#"
            INSERT INTO persons (first_name, last_name, second_name, birth_date)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(&person.first_name)
        .bind(&person.last_name)
        .bind(&person.second_name)
        .bind(person.birth_date)
        .fetch_one(&mut *tx)
        .await
        .map_err(to_error)?;
        let id: i64 = row.try_get("id")?;

        for contact in &person.contact_infos {
            sqlx::query(
                "INSERT INTO contact_infos (person_id, method_name, contact_data) VALUES ($1, $2, $3)",
            )
            .bind(id)
            .bind(&contact.method)
            .bind(&contact.data)
            .execute(&mut *tx)
            .await
            .map_err(to_error)?;
        }

        for job in &person.job_infos {
            sqlx::query(
                "INSERT INTO job_infos (person_id, company, position, current) VALUES ($1, $2, $3, $4)",
            )
            .bind(id)
            .bind(&job.company)
            .bind(&job.position)
            .bind(job.current)
            .execute(&mut *tx)
            .await
            .map_err(to_error)?;
        }

        sqlx::query("INSERT INTO person_settings (person_id, birthday_notify) VALUES ($1, $2)")
            .bind(id)
            .bind(person.settings.birthday_notify)
            .execute(&mut *tx)
            .await
            .map_err(to_error)?;

        tx.commit().await.map_err(to_error)?;

        debug!("创建联系人成功: {} ({})", id, person.display_name());
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::schema::SQLITE_SCHEMA;
    use chrono::NaiveDate;

    async fn setup_test_db() -> SqlitePool {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        for statement in SQLITE_SCHEMA {
            sqlx::query(*statement).execute(&pool).await.unwrap();
        }
        pool
    }

    #[tokio::test]
    async fn test_insert_and_get_full_person() {
        let repo = SqlitePersonRepository::new(setup_test_db().await);

        let mut person = Person::new("John", Some("Smith".to_string()));
        person.second_name = Some("Paul".to_string());
        person.birth_date = NaiveDate::from_ymd_opt(1990, 5, 17);
        person.contact_infos = vec![
            ContactInfo {
                method: "telegram".to_string(),
                data: "@jsmith".to_string(),
            },
            ContactInfo {
                method: "phone".to_string(),
                data: "+100000000".to_string(),
            },
        ];
        person.job_infos = vec![JobInfo {
            company: "Acme".to_string(),
            position: "Engineer".to_string(),
            current: true,
        }];
        person.settings.birthday_notify = true;

        let id = repo.insert(&person).await.unwrap();
        let stored = repo.get(id).await.unwrap();

        assert_eq!(stored.id, id);
        assert_eq!(stored.first_name, "John");
        assert_eq!(stored.last_name.as_deref(), Some("Smith"));
        assert_eq!(stored.second_name.as_deref(), Some("Paul"));
        assert_eq!(stored.birth_date, person.birth_date);
        assert_eq!(stored.contact_infos, person.contact_infos);
        assert_eq!(stored.job_infos, person.job_infos);
        assert!(stored.settings.birthday_notify);
    }

    #[tokio::test]
    async fn test_person_without_last_name() {
        let repo = SqlitePersonRepository::new(setup_test_db().await);

        let id = repo.insert(&Person::new("Alice", None)).await.unwrap();
        let stored = repo.get(id).await.unwrap();

        assert!(stored.last_name.is_none());
        assert!(stored.contact_infos.is_empty());
        assert!(!stored.settings.birthday_notify);
        assert_eq!(stored.display_name(), "Alice");
    }

    #[tokio::test]
    async fn test_get_missing_person() {
        let repo = SqlitePersonRepository::new(setup_test_db().await);
        let result = repo.get(12345).await;
        assert!(matches!(result, Err(CrmError::PersonNotFound { id: 12345 })));
    }

    #[tokio::test]
    async fn test_missing_settings_row_uses_defaults() {
        let pool = setup_test_db().await;
        sqlx::query("INSERT INTO persons (first_name) VALUES ('Bob')")
            .execute(&pool)
            .await
            .unwrap();
        let repo = SqlitePersonRepository::new(pool);

        let person = repo.get(1).await.unwrap();
        assert_eq!(person.first_name, "Bob");
        assert_eq!(person.settings, PersonSettings::default());
    }
}
