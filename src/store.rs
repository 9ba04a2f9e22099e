//! SQLite persistence for reports and users.
//!
//! Reports store the shaped comparison records, the final ranking, the
//! criteria used, and the rendered CSV set as JSON columns. Only the most
//! recent `reports.history_limit` reports are kept; saving a new one prunes
//! the oldest beyond the limit.

use anyhow::{bail, Result};
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::{ComparisonRecord, Criterion, ReportSummary, User};

/// A fully materialized report row.
#[derive(Debug, Clone)]
pub struct StoredReport {
    pub id: String,
    pub user_id: Option<String>,
    pub created_at: String,
    pub report_name: String,
    pub documents: Vec<String>,
    pub records: Vec<ComparisonRecord>,
    pub ranking: Vec<String>,
    pub criteria: Vec<Criterion>,
    pub evaluation_method: String,
    pub custom_prompt: Option<String>,
    pub csv_files: Vec<(String, String)>,
}

/// Everything needed to save one report.
pub struct NewReport {
    pub report_name: String,
    pub user_id: Option<String>,
    pub documents: Vec<String>,
    pub records: Vec<ComparisonRecord>,
    pub ranking: Vec<String>,
    pub criteria: Vec<Criterion>,
    pub evaluation_method: String,
    pub custom_prompt: Option<String>,
    pub csv_files: Vec<(String, String)>,
}

/// Insert a report, then prune history down to `history_limit` rows.
/// Returns the new report id.
pub async fn save_report(pool: &SqlitePool, report: NewReport, history_limit: i64) -> Result<String> {
    let id = Uuid::new_v4().to_string();
    let created_at = Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO reports (
            id, user_id, created_at, report_name, documents_json, records_json,
            ranking_json, criteria_json, evaluation_method, custom_prompt, csv_json
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&report.user_id)
    .bind(&created_at)
    .bind(&report.report_name)
    .bind(serde_json::to_string(&report.documents)?)
    .bind(serde_json::to_string(&report.records)?)
    .bind(serde_json::to_string(&report.ranking)?)
    .bind(serde_json::to_string(&report.criteria)?)
    .bind(&report.evaluation_method)
    .bind(&report.custom_prompt)
    .bind(serde_json::to_string(&report.csv_files)?)
    .execute(pool)
    .await?;

    prune_reports(pool, report.user_id.as_deref(), history_limit).await?;

    Ok(id)
}

/// Delete all but the newest `limit` reports for the given owner.
async fn prune_reports(pool: &SqlitePool, user_id: Option<&str>, limit: i64) -> Result<()> {
    sqlx::query(
        r#"
        DELETE FROM reports
        WHERE (user_id IS ? OR user_id = ?)
          AND id NOT IN (
            SELECT id FROM reports
            WHERE (user_id IS ? OR user_id = ?)
            ORDER BY created_at DESC
            LIMIT ?
          )
        "#,
    )
    .bind(user_id)
    .bind(user_id)
    .bind(user_id)
    .bind(user_id)
    .bind(limit)
    .execute(pool)
    .await?;
    Ok(())
}

/// List recent reports, newest first, as lightweight summaries.
pub async fn list_reports(
    pool: &SqlitePool,
    user_id: Option<&str>,
    limit: i64,
) -> Result<Vec<ReportSummary>> {
    let rows = sqlx::query(
        r#"
        SELECT id, created_at, report_name, documents_json, ranking_json,
               criteria_json, evaluation_method, custom_prompt
        FROM reports
        WHERE (user_id IS ? OR user_id = ?)
        ORDER BY created_at DESC
        LIMIT ?
        "#,
    )
    .bind(user_id)
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    let mut summaries = Vec::with_capacity(rows.len());
    for row in rows {
        let documents: Vec<String> = serde_json::from_str(row.get("documents_json"))?;
        let ranking: Vec<String> = serde_json::from_str(row.get("ranking_json"))?;
        let criteria: Vec<Criterion> = serde_json::from_str(row.get("criteria_json"))?;
        summaries.push(ReportSummary {
            id: row.get("id"),
            created_at: row.get("created_at"),
            report_name: row.get("report_name"),
            documents,
            top_ranked: ranking.first().cloned(),
            criteria_count: criteria.len() as i64,
            evaluation_method: row.get("evaluation_method"),
            custom_prompt: row.get("custom_prompt"),
        });
    }
    Ok(summaries)
}

/// Fetch one full report by id.
pub async fn get_report(pool: &SqlitePool, id: &str) -> Result<Option<StoredReport>> {
    let row = sqlx::query(
        r#"
        SELECT id, user_id, created_at, report_name, documents_json, records_json,
               ranking_json, criteria_json, evaluation_method, custom_prompt, csv_json
        FROM reports
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    Ok(Some(StoredReport {
        id: row.get("id"),
        user_id: row.get("user_id"),
        created_at: row.get("created_at"),
        report_name: row.get("report_name"),
        documents: serde_json::from_str(row.get("documents_json"))?,
        records: serde_json::from_str(row.get("records_json"))?,
        ranking: serde_json::from_str(row.get("ranking_json"))?,
        criteria: serde_json::from_str(row.get("criteria_json"))?,
        evaluation_method: row.get("evaluation_method"),
        custom_prompt: row.get("custom_prompt"),
        csv_files: serde_json::from_str(row.get("csv_json"))?,
    }))
}

/// Rename a report. Fails if the id does not exist.
pub async fn rename_report(pool: &SqlitePool, id: &str, new_name: &str) -> Result<()> {
    let result = sqlx::query("UPDATE reports SET report_name = ? WHERE id = ?")
        .bind(new_name)
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        bail!("report not found: {}", id);
    }
    Ok(())
}

/// Insert a user. Fails on duplicate email via the UNIQUE constraint.
pub async fn create_user(pool: &SqlitePool, email: &str, password_hash: &str) -> Result<User> {
    let user = User {
        id: Uuid::new_v4().to_string(),
        email: email.to_string(),
        password_hash: password_hash.to_string(),
        role: "user".to_string(),
        created_at: Utc::now().timestamp(),
        last_login: None,
    };

    sqlx::query(
        "INSERT INTO users (id, email, password_hash, role, created_at, last_login) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&user.id)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(&user.role)
    .bind(user.created_at)
    .bind(user.last_login)
    .execute(pool)
    .await?;

    Ok(user)
}

pub async fn find_user_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>> {
    let row = sqlx::query(
        "SELECT id, email, password_hash, role, created_at, last_login FROM users WHERE email = ?",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| User {
        id: row.get("id"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        role: row.get("role"),
        created_at: row.get("created_at"),
        last_login: row.get("last_login"),
    }))
}

pub async fn find_user_by_id(pool: &SqlitePool, id: &str) -> Result<Option<User>> {
    let row = sqlx::query(
        "SELECT id, email, password_hash, role, created_at, last_login FROM users WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| User {
        id: row.get("id"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        role: row.get("role"),
        created_at: row.get("created_at"),
        last_login: row.get("last_login"),
    }))
}

pub async fn touch_last_login(pool: &SqlitePool, id: &str) -> Result<()> {
    sqlx::query("UPDATE users SET last_login = ? WHERE id = ?")
        .bind(Utc::now().timestamp())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        migrate::run_migrations(&pool).await.unwrap();
        pool
    }

    fn sample_report(name: &str) -> NewReport {
        NewReport {
            report_name: name.to_string(),
            user_id: None,
            documents: vec!["a.pdf".to_string(), "b.pdf".to_string()],
            records: vec![],
            ranking: vec!["b.pdf".to_string(), "a.pdf".to_string()],
            criteria: crate::criteria::default_criteria(),
            evaluation_method: "criteria".to_string(),
            custom_prompt: None,
            csv_files: vec![("comparisons.csv".to_string(), "Comparison\n".to_string())],
        }
    }

    #[tokio::test]
    async fn save_and_fetch_round_trip() {
        let pool = test_pool().await;
        let id = save_report(&pool, sample_report("First"), 3).await.unwrap();

        let report = get_report(&pool, &id).await.unwrap().unwrap();
        assert_eq!(report.report_name, "First");
        assert_eq!(report.ranking[0], "b.pdf");
        assert_eq!(report.criteria.len(), 4);
        assert_eq!(report.csv_files[0].0, "comparisons.csv");
    }

    #[tokio::test]
    async fn history_is_pruned_to_limit() {
        let pool = test_pool().await;
        for i in 0..5 {
            save_report(&pool, sample_report(&format!("Report {}", i)), 3)
                .await
                .unwrap();
        }

        let summaries = list_reports(&pool, None, 10).await.unwrap();
        assert_eq!(summaries.len(), 3);
    }

    #[tokio::test]
    async fn summaries_expose_top_ranked() {
        let pool = test_pool().await;
        save_report(&pool, sample_report("Ranked"), 3).await.unwrap();
        let summaries = list_reports(&pool, None, 10).await.unwrap();
        assert_eq!(summaries[0].top_ranked.as_deref(), Some("b.pdf"));
        assert_eq!(summaries[0].criteria_count, 4);
    }

    #[tokio::test]
    async fn rename_updates_name_and_rejects_unknown_id() {
        let pool = test_pool().await;
        let id = save_report(&pool, sample_report("Old"), 3).await.unwrap();

        rename_report(&pool, &id, "New").await.unwrap();
        let report = get_report(&pool, &id).await.unwrap().unwrap();
        assert_eq!(report.report_name, "New");

        assert!(rename_report(&pool, "nope", "X").await.is_err());
    }

    #[tokio::test]
    async fn users_round_trip_and_reject_duplicate_email() {
        let pool = test_pool().await;
        let user = create_user(&pool, "a@example.com", "hash").await.unwrap();

        let found = find_user_by_email(&pool, "a@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, user.id);
        assert_eq!(found.role, "user");
        assert!(found.last_login.is_none());

        assert!(create_user(&pool, "a@example.com", "other").await.is_err());

        touch_last_login(&pool, &user.id).await.unwrap();
        let found = find_user_by_id(&pool, &user.id).await.unwrap().unwrap();
        assert!(found.last_login.is_some());
    }
}
