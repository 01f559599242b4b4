//! Risk register repository. Score and rating are computed in
//! `crate::domain::risk`, never stored.

use sqlx::SqlitePool;

use crate::data::sqlite::SqliteError;
use crate::data::types::{NewRisk, RiskLevel, RiskRow, RiskStatus, RiskUpdate};

use super::parse_column;

const RISK_COLUMNS: &str = "id, project_id, title, description, severity, probability, status, \
     mitigation_plan, owner_id, created_by, created_at, updated_at";

type RiskTuple = (
    String,
    String,
    String,
    Option<String>,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    i64,
    i64,
);

fn to_risk(
    (
        id,
        project_id,
        title,
        description,
        severity,
        probability,
        status,
        mitigation_plan,
        owner_id,
        created_by,
        created_at,
        updated_at,
    ): RiskTuple,
) -> RiskRow {
    RiskRow {
        id,
        project_id,
        title,
        description,
        severity: parse_column(&severity, RiskLevel::parse, RiskLevel::Medium, "severity"),
        probability: parse_column(
            &probability,
            RiskLevel::parse,
            RiskLevel::Medium,
            "probability",
        ),
        status: parse_column(&status, RiskStatus::parse, RiskStatus::Open, "status"),
        mitigation_plan,
        owner_id,
        created_by,
        created_at,
        updated_at,
    }
}

pub async fn create_risk(
    pool: &SqlitePool,
    project_id: &str,
    created_by: &str,
    new: &NewRisk,
) -> Result<RiskRow, SqliteError> {
    let id = cuid2::create_id();
    let now = chrono::Utc::now().timestamp();

    sqlx::query(
        r#"
        INSERT INTO risks (id, project_id, title, description, severity, probability, status,
                           mitigation_plan, owner_id, created_by, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(project_id)
    .bind(&new.title)
    .bind(&new.description)
    .bind(new.severity.as_str())
    .bind(new.probability.as_str())
    .bind(new.status.as_str())
    .bind(&new.mitigation_plan)
    .bind(&new.owner_id)
    .bind(created_by)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(RiskRow {
        id,
        project_id: project_id.to_string(),
        title: new.title.clone(),
        description: new.description.clone(),
        severity: new.severity,
        probability: new.probability,
        status: new.status,
        mitigation_plan: new.mitigation_plan.clone(),
        owner_id: new.owner_id.clone(),
        created_by: Some(created_by.to_string()),
        created_at: now,
        updated_at: now,
    })
}

pub async fn get_risk(
    pool: &SqlitePool,
    project_id: &str,
    risk_id: &str,
) -> Result<Option<RiskRow>, SqliteError> {
    let sql = format!("SELECT {RISK_COLUMNS} FROM risks WHERE id = ? AND project_id = ?");
    let row = sqlx::query_as::<_, RiskTuple>(&sql)
        .bind(risk_id)
        .bind(project_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(to_risk))
}

/// List risks of a project, newest first, optionally by status
pub async fn list_risks(
    pool: &SqlitePool,
    project_id: &str,
    status: Option<RiskStatus>,
    page: u32,
    limit: u32,
) -> Result<(Vec<RiskRow>, u64), SqliteError> {
    let offset = (page.saturating_sub(1)) * limit;
    let status = status.map(|s| s.as_str());

    let sql = format!(
        r#"
        SELECT {RISK_COLUMNS}
        FROM risks
        WHERE project_id = ? AND (? IS NULL OR status = ?)
        ORDER BY created_at DESC, id
        LIMIT ? OFFSET ?
        "#
    );
    let rows = sqlx::query_as::<_, RiskTuple>(&sql)
        .bind(project_id)
        .bind(status)
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

    let total: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM risks WHERE project_id = ? AND (? IS NULL OR status = ?)",
    )
    .bind(project_id)
    .bind(status)
    .bind(status)
    .fetch_one(pool)
    .await?;

    Ok((rows.into_iter().map(to_risk).collect(), total.0 as u64))
}

/// Every risk of a project (summary and reports)
pub async fn list_all_for_project(
    pool: &SqlitePool,
    project_id: &str,
) -> Result<Vec<RiskRow>, SqliteError> {
    let sql = format!("SELECT {RISK_COLUMNS} FROM risks WHERE project_id = ? ORDER BY created_at, id");
    let rows = sqlx::query_as::<_, RiskTuple>(&sql)
        .bind(project_id)
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().map(to_risk).collect())
}

pub async fn update_risk(
    pool: &SqlitePool,
    project_id: &str,
    risk_id: &str,
    update: &RiskUpdate,
) -> Result<Option<RiskRow>, SqliteError> {
    let mut tx = pool.begin().await?;

    let sql = format!("SELECT {RISK_COLUMNS} FROM risks WHERE id = ? AND project_id = ?");
    let row = sqlx::query_as::<_, RiskTuple>(&sql)
        .bind(risk_id)
        .bind(project_id)
        .fetch_optional(&mut *tx)
        .await?;

    let Some(mut risk) = row.map(to_risk) else {
        return Ok(None);
    };

    if let Some(title) = &update.title {
        risk.title = title.clone();
    }
    if let Some(description) = &update.description {
        risk.description = description.clone();
    }
    if let Some(severity) = update.severity {
        risk.severity = severity;
    }
    if let Some(probability) = update.probability {
        risk.probability = probability;
    }
    if let Some(status) = update.status {
        risk.status = status;
    }
    if let Some(plan) = &update.mitigation_plan {
        risk.mitigation_plan = plan.clone();
    }
    if let Some(owner_id) = &update.owner_id {
        risk.owner_id = owner_id.clone();
    }
    risk.updated_at = chrono::Utc::now().timestamp();

    sqlx::query(
        r#"
        UPDATE risks
        SET title = ?, description = ?, severity = ?, probability = ?, status = ?,
            mitigation_plan = ?, owner_id = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&risk.title)
    .bind(&risk.description)
    .bind(risk.severity.as_str())
    .bind(risk.probability.as_str())
    .bind(risk.status.as_str())
    .bind(&risk.mitigation_plan)
    .bind(&risk.owner_id)
    .bind(risk.updated_at)
    .bind(risk_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(Some(risk))
}

pub async fn delete_risk(
    pool: &SqlitePool,
    project_id: &str,
    risk_id: &str,
) -> Result<bool, SqliteError> {
    let result = sqlx::query("DELETE FROM risks WHERE id = ? AND project_id = ?")
        .bind(risk_id)
        .bind(project_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
