//! Budget, expense and budget-history repository
//!
//! Every write that moves `total_budget_cents` or `actual_expenditure_cents`
//! runs in one transaction together with its history row.

use sqlx::{SqliteConnection, SqlitePool};

use crate::data::cache::{CacheKey, CacheService};
use crate::data::sqlite::SqliteError;
use crate::data::types::{
    BudgetEntryKind, BudgetHistoryRow, BudgetWriteResult, CategoryTotal, ExpenseRow, NewExpense,
    ProjectRow,
};
use crate::domain::budget::{check_budget_change, check_expense};

use super::parse_column;
use super::project::fetch_project;

/// A budget history row about to be written
pub(super) struct HistoryEntry<'a> {
    pub project_id: &'a str,
    pub kind: BudgetEntryKind,
    pub amount_delta_cents: i64,
    pub total_budget_cents: i64,
    pub actual_expenditure_cents: i64,
    pub note: Option<&'a str>,
    pub user_id: Option<&'a str>,
}

pub(super) async fn insert_history(
    conn: &mut SqliteConnection,
    entry: HistoryEntry<'_>,
) -> Result<(), SqliteError> {
    sqlx::query(
        r#"
        INSERT INTO budget_history (id, project_id, kind, amount_delta_cents, total_budget_cents,
                                    actual_expenditure_cents, note, user_id, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(cuid2::create_id())
    .bind(entry.project_id)
    .bind(entry.kind.as_str())
    .bind(entry.amount_delta_cents)
    .bind(entry.total_budget_cents)
    .bind(entry.actual_expenditure_cents)
    .bind(entry.note)
    .bind(entry.user_id)
    .bind(chrono::Utc::now().timestamp())
    .execute(conn)
    .await?;
    Ok(())
}

async fn invalidate_project(cache: Option<&CacheService>, project_id: &str) {
    if let Some(cache) = cache {
        cache.invalidate_key(&CacheKey::project(project_id)).await;
    }
}

/// Change a project's total budget. Rejected when the new total is below
/// what has already been spent.
pub async fn set_total_budget(
    pool: &SqlitePool,
    cache: Option<&CacheService>,
    project_id: &str,
    user_id: &str,
    new_total_cents: i64,
    note: Option<&str>,
) -> Result<BudgetWriteResult<ProjectRow>, SqliteError> {
    let mut tx = pool.begin().await?;

    let Some(current) = fetch_project(&mut tx, project_id).await? else {
        return Ok(BudgetWriteResult::NotFound);
    };
    if let Err(violation) = check_budget_change(new_total_cents, current.actual_expenditure_cents)
    {
        return Ok(BudgetWriteResult::Rejected(violation));
    }

    let now = chrono::Utc::now().timestamp();
    sqlx::query("UPDATE projects SET total_budget_cents = ?, updated_at = ? WHERE id = ?")
        .bind(new_total_cents)
        .bind(now)
        .bind(project_id)
        .execute(&mut *tx)
        .await?;

    insert_history(
        &mut tx,
        HistoryEntry {
            project_id,
            kind: BudgetEntryKind::BudgetSet,
            amount_delta_cents: new_total_cents - current.total_budget_cents,
            total_budget_cents: new_total_cents,
            actual_expenditure_cents: current.actual_expenditure_cents,
            note,
            user_id: Some(user_id),
        },
    )
    .await?;

    tx.commit().await?;
    invalidate_project(cache, project_id).await;

    Ok(BudgetWriteResult::Success(ProjectRow {
        total_budget_cents: new_total_cents,
        updated_at: now,
        ..current
    }))
}

/// Record an expense and raise actual expenditure in one transaction.
/// Leaves state unchanged when the expense would exceed the budget.
pub async fn add_expense(
    pool: &SqlitePool,
    cache: Option<&CacheService>,
    project_id: &str,
    user_id: &str,
    expense: &NewExpense,
) -> Result<BudgetWriteResult<(ExpenseRow, ProjectRow)>, SqliteError> {
    let mut tx = pool.begin().await?;
    let now = chrono::Utc::now().timestamp();

    // Guarded increment: the write itself refuses to break the invariant
    let updated = sqlx::query(
        r#"
        UPDATE projects
        SET actual_expenditure_cents = actual_expenditure_cents + ?1, updated_at = ?2
        WHERE id = ?3 AND actual_expenditure_cents + ?1 <= total_budget_cents
        "#,
    )
    .bind(expense.amount_cents)
    .bind(now)
    .bind(project_id)
    .execute(&mut *tx)
    .await?;

    if updated.rows_affected() == 0 {
        return match fetch_project(&mut tx, project_id).await? {
            None => Ok(BudgetWriteResult::NotFound),
            Some(project) => match check_expense(
                project.total_budget_cents,
                project.actual_expenditure_cents,
                expense.amount_cents,
            ) {
                Err(violation) => Ok(BudgetWriteResult::Rejected(violation)),
                Ok(_) => Err(SqliteError::Conflict(
                    "Budget changed while recording the expense".to_string(),
                )),
            },
        };
    }

    let id = cuid2::create_id();
    sqlx::query(
        r#"
        INSERT INTO expenses (id, project_id, amount_cents, category, description, incurred_on,
                              created_by, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(project_id)
    .bind(expense.amount_cents)
    .bind(&expense.category)
    .bind(&expense.description)
    .bind(&expense.incurred_on)
    .bind(user_id)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    let Some(project) = fetch_project(&mut tx, project_id).await? else {
        return Ok(BudgetWriteResult::NotFound);
    };

    insert_history(
        &mut tx,
        HistoryEntry {
            project_id,
            kind: BudgetEntryKind::ExpenseAdded,
            amount_delta_cents: expense.amount_cents,
            total_budget_cents: project.total_budget_cents,
            actual_expenditure_cents: project.actual_expenditure_cents,
            note: Some(&expense.category),
            user_id: Some(user_id),
        },
    )
    .await?;

    tx.commit().await?;
    invalidate_project(cache, project_id).await;

    let row = ExpenseRow {
        id,
        project_id: project_id.to_string(),
        amount_cents: expense.amount_cents,
        category: expense.category.clone(),
        description: expense.description.clone(),
        incurred_on: expense.incurred_on.clone(),
        created_by: Some(user_id.to_string()),
        created_at: now,
    };
    Ok(BudgetWriteResult::Success((row, project)))
}

/// Remove an expense and reverse its amount. Returns None if not found.
pub async fn delete_expense(
    pool: &SqlitePool,
    cache: Option<&CacheService>,
    project_id: &str,
    expense_id: &str,
    user_id: &str,
) -> Result<Option<(ExpenseRow, ProjectRow)>, SqliteError> {
    let mut tx = pool.begin().await?;

    let Some(expense) = fetch_expense(&mut tx, project_id, expense_id).await? else {
        return Ok(None);
    };

    sqlx::query("DELETE FROM expenses WHERE id = ?")
        .bind(expense_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        r#"
        UPDATE projects
        SET actual_expenditure_cents = MAX(actual_expenditure_cents - ?, 0), updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(expense.amount_cents)
    .bind(chrono::Utc::now().timestamp())
    .bind(project_id)
    .execute(&mut *tx)
    .await?;

    let Some(project) = fetch_project(&mut tx, project_id).await? else {
        return Ok(None);
    };

    insert_history(
        &mut tx,
        HistoryEntry {
            project_id,
            kind: BudgetEntryKind::ExpenseRemoved,
            amount_delta_cents: -expense.amount_cents,
            total_budget_cents: project.total_budget_cents,
            actual_expenditure_cents: project.actual_expenditure_cents,
            note: Some(&expense.category),
            user_id: Some(user_id),
        },
    )
    .await?;

    tx.commit().await?;
    invalidate_project(cache, project_id).await;

    Ok(Some((expense, project)))
}

type ExpenseTuple = (
    String,
    String,
    i64,
    String,
    Option<String>,
    String,
    Option<String>,
    i64,
);

fn to_expense(
    (id, project_id, amount_cents, category, description, incurred_on, created_by, created_at): ExpenseTuple,
) -> ExpenseRow {
    ExpenseRow {
        id,
        project_id,
        amount_cents,
        category,
        description,
        incurred_on,
        created_by,
        created_at,
    }
}

async fn fetch_expense(
    conn: &mut SqliteConnection,
    project_id: &str,
    expense_id: &str,
) -> Result<Option<ExpenseRow>, SqliteError> {
    let row = sqlx::query_as::<_, ExpenseTuple>(
        r#"
        SELECT id, project_id, amount_cents, category, description, incurred_on, created_by, created_at
        FROM expenses
        WHERE id = ? AND project_id = ?
        "#,
    )
    .bind(expense_id)
    .bind(project_id)
    .fetch_optional(conn)
    .await?;

    Ok(row.map(to_expense))
}

/// Expenses of a project, most recent first
pub async fn list_expenses(
    pool: &SqlitePool,
    project_id: &str,
    page: u32,
    limit: u32,
) -> Result<(Vec<ExpenseRow>, u64), SqliteError> {
    let offset = (page.saturating_sub(1)) * limit;

    let rows = sqlx::query_as::<_, ExpenseTuple>(
        r#"
        SELECT id, project_id, amount_cents, category, description, incurred_on, created_by, created_at
        FROM expenses
        WHERE project_id = ?
        ORDER BY incurred_on DESC, created_at DESC, id
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(project_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM expenses WHERE project_id = ?")
        .bind(project_id)
        .fetch_one(pool)
        .await?;

    Ok((rows.into_iter().map(to_expense).collect(), total.0 as u64))
}

/// Budget history of a project, most recent first
pub async fn list_history(
    pool: &SqlitePool,
    project_id: &str,
    page: u32,
    limit: u32,
) -> Result<(Vec<BudgetHistoryRow>, u64), SqliteError> {
    let offset = (page.saturating_sub(1)) * limit;

    let rows = sqlx::query_as::<
        _,
        (
            String,
            String,
            String,
            i64,
            i64,
            i64,
            Option<String>,
            Option<String>,
            i64,
        ),
    >(
        r#"
        SELECT id, project_id, kind, amount_delta_cents, total_budget_cents,
               actual_expenditure_cents, note, user_id, created_at
        FROM budget_history
        WHERE project_id = ?
        ORDER BY created_at DESC, rowid DESC
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(project_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM budget_history WHERE project_id = ?")
        .bind(project_id)
        .fetch_one(pool)
        .await?;

    let history = rows
        .into_iter()
        .map(
            |(
                id,
                project_id,
                kind,
                amount_delta_cents,
                total_budget_cents,
                actual_expenditure_cents,
                note,
                user_id,
                created_at,
            )| BudgetHistoryRow {
                id,
                project_id,
                kind: parse_column(&kind, BudgetEntryKind::parse, BudgetEntryKind::BudgetSet, "kind"),
                amount_delta_cents,
                total_budget_cents,
                actual_expenditure_cents,
                note,
                user_id,
                created_at,
            },
        )
        .collect();

    Ok((history, total.0 as u64))
}

/// Expense totals grouped by category, largest first
pub async fn totals_by_category(
    pool: &SqlitePool,
    project_id: &str,
) -> Result<Vec<CategoryTotal>, SqliteError> {
    let rows = sqlx::query_as::<_, (String, i64, i64)>(
        r#"
        SELECT category, SUM(amount_cents), COUNT(*)
        FROM expenses
        WHERE project_id = ?
        GROUP BY category
        ORDER BY SUM(amount_cents) DESC, category
        "#,
    )
    .bind(project_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(category, total_cents, count)| CategoryTotal {
            category,
            total_cents,
            count,
        })
        .collect())
}
