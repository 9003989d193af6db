//! Job configuration rows.

use async_trait::async_trait;

use crate::error::Result;
use crate::model::job::*;
use crate::store::JobConfigStore;

const CONFIG_COLUMNS: &str =
    "job_name, description, status, params, created_by, created_date, updated_by, updated_date";

#[async_trait]
impl JobConfigStore for super::Db {
    async fn find(&self, job_name: &str) -> Result<Option<JobConfig>> {
        let row: Option<JobConfigRow> = sqlx::query_as(&format!(
            "SELECT {CONFIG_COLUMNS} FROM job_config WHERE job_name = $1"
        ))
        .bind(job_name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(JobConfigRow::into_job_config))
    }

    async fn save(&self, update: JobConfigUpdate) -> Result<JobConfig> {
        let by = update.updated_by.as_deref().unwrap_or("SYSTEM");
        let row: JobConfigRow = sqlx::query_as(&format!(
            "INSERT INTO job_config (job_name, description, status, params, created_by, created_date, updated_by, updated_date)
             VALUES ($1, $2, $3, $4, $5, now(), $5, now())
             ON CONFLICT (job_name) DO UPDATE
             SET description = EXCLUDED.description,
                 status = EXCLUDED.status,
                 params = EXCLUDED.params,
                 updated_by = EXCLUDED.updated_by,
                 updated_date = now()
             RETURNING {CONFIG_COLUMNS}"
        ))
        .bind(&update.job_name)
        .bind(&update.description)
        .bind(status_column(update.enabled))
        .bind(&update.params)
        .bind(by)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into_job_config())
    }

    async fn update_params(
        &self,
        job_name: &str,
        params: Option<String>,
        updated_by: &str,
    ) -> Result<JobConfig> {
        let row: JobConfigRow = sqlx::query_as(&format!(
            "INSERT INTO job_config (job_name, status, params, created_by, created_date, updated_by, updated_date)
             VALUES ($1, 1, $2, $3, now(), $3, now())
             ON CONFLICT (job_name) DO UPDATE
             SET params = EXCLUDED.params,
                 updated_by = EXCLUDED.updated_by,
                 updated_date = now()
             RETURNING {CONFIG_COLUMNS}"
        ))
        .bind(job_name)
        .bind(&params)
        .bind(updated_by)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into_job_config())
    }
}

fn status_column(enabled: bool) -> i16 {
    if enabled { 1 } else { 0 }
}

#[derive(sqlx::FromRow)]
struct JobConfigRow {
    job_name: String,
    description: Option<String>,
    status: i16,
    params: Option<String>,
    created_by: Option<String>,
    created_date: chrono::DateTime<chrono::Utc>,
    updated_by: Option<String>,
    updated_date: Option<chrono::DateTime<chrono::Utc>>,
}

impl JobConfigRow {
    fn into_job_config(self) -> JobConfig {
        JobConfig {
            job_name: self.job_name,
            description: self.description,
            enabled: self.status == 1,
            params: self.params,
            created_by: self.created_by,
            created_date: Some(self.created_date),
            updated_by: self.updated_by,
            updated_date: self.updated_date,
        }
    }
}
