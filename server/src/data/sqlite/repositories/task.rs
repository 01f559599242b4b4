//! Task and task-assignee repository
//!
//! A task reported as `completed` always carries 100% completion.

use sqlx::SqlitePool;

use crate::data::sqlite::SqliteError;
use crate::data::types::{
    NewTask, TaskDueRow, TaskFilter, TaskPriority, TaskRow, TaskStats, TaskStatus, TaskUpdate,
};

use super::{parse_column, split_ids};

const TASK_SELECT: &str = r#"
    SELECT t.id, t.project_id, t.title, t.description, t.status, t.priority, t.due_date,
           t.completion_percentage, t.created_by, t.created_at, t.updated_at,
           (SELECT GROUP_CONCAT(ta.user_id) FROM task_assignees ta WHERE ta.task_id = t.id)
    FROM tasks t
"#;

type TaskTuple = (
    String,
    String,
    String,
    Option<String>,
    String,
    String,
    Option<String>,
    i64,
    Option<String>,
    i64,
    i64,
    Option<String>,
);

fn to_task(
    (
        id,
        project_id,
        title,
        description,
        status,
        priority,
        due_date,
        completion_percentage,
        created_by,
        created_at,
        updated_at,
        assignees,
    ): TaskTuple,
) -> TaskRow {
    let mut assignee_ids = split_ids(assignees);
    assignee_ids.sort();
    TaskRow {
        id,
        project_id,
        title,
        description,
        status: parse_column(&status, TaskStatus::parse, TaskStatus::Todo, "status"),
        priority: parse_column(
            &priority,
            TaskPriority::parse,
            TaskPriority::Medium,
            "priority",
        ),
        due_date,
        completion_percentage,
        created_by,
        assignee_ids,
        created_at,
        updated_at,
    }
}

fn effective_completion(status: TaskStatus, completion: i64) -> i64 {
    if status == TaskStatus::Completed {
        100
    } else {
        completion.clamp(0, 100)
    }
}

pub async fn create_task(
    pool: &SqlitePool,
    project_id: &str,
    created_by: &str,
    new: &NewTask,
) -> Result<TaskRow, SqliteError> {
    let id = cuid2::create_id();
    let now = chrono::Utc::now().timestamp();
    let completion = effective_completion(new.status, new.completion_percentage);

    sqlx::query(
        r#"
        INSERT INTO tasks (id, project_id, title, description, status, priority, due_date,
                           completion_percentage, created_by, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(project_id)
    .bind(&new.title)
    .bind(&new.description)
    .bind(new.status.as_str())
    .bind(new.priority.as_str())
    .bind(&new.due_date)
    .bind(completion)
    .bind(created_by)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(TaskRow {
        id,
        project_id: project_id.to_string(),
        title: new.title.clone(),
        description: new.description.clone(),
        status: new.status,
        priority: new.priority,
        due_date: new.due_date.clone(),
        completion_percentage: completion,
        created_by: Some(created_by.to_string()),
        assignee_ids: Vec::new(),
        created_at: now,
        updated_at: now,
    })
}

/// Get a task scoped to its project
pub async fn get_task(
    pool: &SqlitePool,
    project_id: &str,
    task_id: &str,
) -> Result<Option<TaskRow>, SqliteError> {
    let sql = format!("{TASK_SELECT} WHERE t.id = ? AND t.project_id = ?");
    let row = sqlx::query_as::<_, TaskTuple>(&sql)
        .bind(task_id)
        .bind(project_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(to_task))
}

const TASK_FILTER: &str = r#"
    WHERE t.project_id = ?
      AND (? IS NULL OR t.status = ?)
      AND (? IS NULL OR t.priority = ?)
      AND (? IS NULL OR EXISTS (
            SELECT 1 FROM task_assignees fa WHERE fa.task_id = t.id AND fa.user_id = ?))
"#;

/// List tasks of a project, newest first
pub async fn list_tasks(
    pool: &SqlitePool,
    project_id: &str,
    filter: &TaskFilter,
    page: u32,
    limit: u32,
) -> Result<(Vec<TaskRow>, u64), SqliteError> {
    let offset = (page.saturating_sub(1)) * limit;
    let status = filter.status.map(|s| s.as_str());
    let priority = filter.priority.map(|p| p.as_str());
    let assignee = filter.assignee_id.as_deref();

    let sql = format!("{TASK_SELECT} {TASK_FILTER} ORDER BY t.created_at DESC, t.id LIMIT ? OFFSET ?");
    let rows = sqlx::query_as::<_, TaskTuple>(&sql)
        .bind(project_id)
        .bind(status)
        .bind(status)
        .bind(priority)
        .bind(priority)
        .bind(assignee)
        .bind(assignee)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

    let count_sql = format!("SELECT COUNT(*) FROM tasks t {TASK_FILTER}");
    let total: (i64,) = sqlx::query_as(&count_sql)
        .bind(project_id)
        .bind(status)
        .bind(status)
        .bind(priority)
        .bind(priority)
        .bind(assignee)
        .bind(assignee)
        .fetch_one(pool)
        .await?;

    Ok((rows.into_iter().map(to_task).collect(), total.0 as u64))
}

/// Apply a partial update. Returns the updated task if found.
pub async fn update_task(
    pool: &SqlitePool,
    project_id: &str,
    task_id: &str,
    update: &TaskUpdate,
) -> Result<Option<TaskRow>, SqliteError> {
    let mut tx = pool.begin().await?;

    let sql = format!("{TASK_SELECT} WHERE t.id = ? AND t.project_id = ?");
    let row = sqlx::query_as::<_, TaskTuple>(&sql)
        .bind(task_id)
        .bind(project_id)
        .fetch_optional(&mut *tx)
        .await?;

    let Some(mut task) = row.map(to_task) else {
        return Ok(None);
    };

    if let Some(title) = &update.title {
        task.title = title.clone();
    }
    if let Some(description) = &update.description {
        task.description = description.clone();
    }
    if let Some(status) = update.status {
        task.status = status;
    }
    if let Some(priority) = update.priority {
        task.priority = priority;
    }
    if let Some(due_date) = &update.due_date {
        task.due_date = due_date.clone();
    }
    if let Some(completion) = update.completion_percentage {
        task.completion_percentage = completion;
    }
    task.completion_percentage = effective_completion(task.status, task.completion_percentage);
    task.updated_at = chrono::Utc::now().timestamp();

    sqlx::query(
        r#"
        UPDATE tasks
        SET title = ?, description = ?, status = ?, priority = ?, due_date = ?,
            completion_percentage = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&task.title)
    .bind(&task.description)
    .bind(task.status.as_str())
    .bind(task.priority.as_str())
    .bind(&task.due_date)
    .bind(task.completion_percentage)
    .bind(task.updated_at)
    .bind(task_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(Some(task))
}

pub async fn delete_task(
    pool: &SqlitePool,
    project_id: &str,
    task_id: &str,
) -> Result<bool, SqliteError> {
    let result = sqlx::query("DELETE FROM tasks WHERE id = ? AND project_id = ?")
        .bind(task_id)
        .bind(project_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Assign a user to a task. A repeated assignment is `SqliteError::Conflict`.
pub async fn assign_user(
    pool: &SqlitePool,
    task_id: &str,
    user_id: &str,
    assigned_by: &str,
) -> Result<(), SqliteError> {
    sqlx::query(
        "INSERT INTO task_assignees (task_id, user_id, assigned_by, assigned_at) VALUES (?, ?, ?, ?)",
    )
    .bind(task_id)
    .bind(user_id)
    .bind(assigned_by)
    .bind(chrono::Utc::now().timestamp())
    .execute(pool)
    .await
    .map_err(|e| SqliteError::unique_or(e, "User is already assigned to this task"))?;

    Ok(())
}

/// Returns whether an assignment was removed
pub async fn unassign_user(
    pool: &SqlitePool,
    task_id: &str,
    user_id: &str,
) -> Result<bool, SqliteError> {
    let result = sqlx::query("DELETE FROM task_assignees WHERE task_id = ? AND user_id = ?")
        .bind(task_id)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn list_assignee_ids(pool: &SqlitePool, task_id: &str) -> Result<Vec<String>, SqliteError> {
    let rows = sqlx::query_as::<_, (String,)>(
        "SELECT user_id FROM task_assignees WHERE task_id = ? ORDER BY user_id",
    )
    .bind(task_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Open tasks whose due date falls within `[from, to]` (ISO dates, inclusive)
pub async fn list_due_between(
    pool: &SqlitePool,
    from: &str,
    to: &str,
) -> Result<Vec<TaskDueRow>, SqliteError> {
    let rows = sqlx::query_as::<_, (String, String, String, String, String, String, Option<String>)>(
        r#"
        SELECT t.id, t.title, t.due_date, p.id, p.name, p.owner_id,
               (SELECT GROUP_CONCAT(ta.user_id) FROM task_assignees ta WHERE ta.task_id = t.id)
        FROM tasks t
        JOIN projects p ON p.id = t.project_id
        WHERE t.status != 'completed'
          AND t.due_date IS NOT NULL
          AND t.due_date >= ? AND t.due_date <= ?
        ORDER BY t.due_date, t.id
        "#,
    )
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(
            |(task_id, title, due_date, project_id, project_name, project_owner_id, assignees)| {
                let mut assignee_ids = split_ids(assignees);
                assignee_ids.sort();
                TaskDueRow {
                    task_id,
                    title,
                    due_date,
                    project_id,
                    project_name,
                    project_owner_id,
                    assignee_ids,
                }
            },
        )
        .collect())
}

/// Aggregate task counts for a project. `today` is an ISO date; open tasks
/// due strictly before it count as overdue.
pub async fn task_stats(
    pool: &SqlitePool,
    project_id: &str,
    today: &str,
) -> Result<TaskStats, SqliteError> {
    let (total, todo, in_progress, completed, overdue, average): (
        i64,
        i64,
        i64,
        i64,
        i64,
        Option<f64>,
    ) = sqlx::query_as(
        r#"
        SELECT COUNT(*),
               COALESCE(SUM(CASE WHEN status = 'todo' THEN 1 ELSE 0 END), 0),
               COALESCE(SUM(CASE WHEN status = 'in_progress' THEN 1 ELSE 0 END), 0),
               COALESCE(SUM(CASE WHEN status = 'completed' THEN 1 ELSE 0 END), 0),
               COALESCE(SUM(CASE WHEN status != 'completed' AND due_date IS NOT NULL
                                      AND due_date < ? THEN 1 ELSE 0 END), 0),
               AVG(CAST(completion_percentage AS REAL))
        FROM tasks
        WHERE project_id = ?
        "#,
    )
    .bind(today)
    .bind(project_id)
    .fetch_one(pool)
    .await?;

    Ok(TaskStats {
        total,
        todo,
        in_progress,
        completed,
        overdue,
        average_completion: average.unwrap_or(0.0),
    })
}
