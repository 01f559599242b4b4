//! SQLite schema definitions
//!
//! `SCHEMA` is the complete current schema and is applied as-is to fresh
//! databases. Existing databases are brought forward by the versioned
//! migrations in `migrations.rs`.

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// Complete schema SQL
pub const SCHEMA: &str = r#"
-- =============================================================================
-- Infrastructure: Schema version tracking
-- =============================================================================
CREATE TABLE IF NOT EXISTS schema_version (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    version INTEGER NOT NULL,
    applied_at INTEGER NOT NULL,
    description TEXT
);

CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at INTEGER NOT NULL,
    checksum TEXT NOT NULL,
    execution_time_ms INTEGER,
    success INTEGER NOT NULL DEFAULT 1
);

-- =============================================================================
-- 1. Users
-- =============================================================================
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    email TEXT NOT NULL UNIQUE CHECK(length(email) >= 3),
    name TEXT NOT NULL CHECK(length(name) >= 1 AND length(name) <= 200),
    password_hash TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

-- =============================================================================
-- 2. Projects (references users)
-- =============================================================================
CREATE TABLE IF NOT EXISTS projects (
    id TEXT PRIMARY KEY,
    owner_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    name TEXT NOT NULL CHECK(length(name) >= 1),
    description TEXT,
    status TEXT NOT NULL DEFAULT 'planning'
        CHECK(status IN ('planning', 'active', 'on_hold', 'completed', 'cancelled')),
    start_date TEXT,
    end_date TEXT,
    total_budget_cents INTEGER NOT NULL DEFAULT 0 CHECK(total_budget_cents >= 0),
    actual_expenditure_cents INTEGER NOT NULL DEFAULT 0 CHECK(actual_expenditure_cents >= 0),
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    CHECK(actual_expenditure_cents <= total_budget_cents)
);

CREATE INDEX IF NOT EXISTS idx_projects_owner ON projects(owner_id);
CREATE INDEX IF NOT EXISTS idx_projects_end_date ON projects(end_date) WHERE end_date IS NOT NULL;

-- =============================================================================
-- 3. Team Members (references projects + users)
-- =============================================================================
CREATE TABLE IF NOT EXISTS team_members (
    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    role TEXT NOT NULL DEFAULT 'member' CHECK(role IN ('viewer', 'member', 'manager', 'owner')),
    joined_at INTEGER NOT NULL,
    PRIMARY KEY (project_id, user_id)
);

CREATE INDEX IF NOT EXISTS idx_team_members_user ON team_members(user_id);

-- =============================================================================
-- 4. Team Invitations (references projects + users)
-- =============================================================================
CREATE TABLE IF NOT EXISTS team_invitations (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    inviter_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    email TEXT NOT NULL,
    role TEXT NOT NULL DEFAULT 'member' CHECK(role IN ('viewer', 'member', 'manager')),
    status TEXT NOT NULL DEFAULT 'pending' CHECK(status IN ('pending', 'accepted', 'declined')),
    message TEXT,
    created_at INTEGER NOT NULL,
    responded_at INTEGER
);

CREATE INDEX IF NOT EXISTS idx_invitations_project ON team_invitations(project_id);
CREATE INDEX IF NOT EXISTS idx_invitations_email ON team_invitations(email, status);

-- At most one pending invitation per (project, email)
CREATE UNIQUE INDEX IF NOT EXISTS idx_invitations_pending
    ON team_invitations(project_id, email)
    WHERE status = 'pending';

-- =============================================================================
-- 5. Tasks (references projects)
-- =============================================================================
CREATE TABLE IF NOT EXISTS tasks (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    title TEXT NOT NULL CHECK(length(title) >= 1),
    description TEXT,
    status TEXT NOT NULL DEFAULT 'todo' CHECK(status IN ('todo', 'in_progress', 'completed')),
    priority TEXT NOT NULL DEFAULT 'medium' CHECK(priority IN ('low', 'medium', 'high', 'urgent')),
    due_date TEXT,
    completion_percentage INTEGER NOT NULL DEFAULT 0
        CHECK(completion_percentage >= 0 AND completion_percentage <= 100),
    created_by TEXT REFERENCES users(id) ON DELETE SET NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_tasks_project ON tasks(project_id, status);
CREATE INDEX IF NOT EXISTS idx_tasks_due_date ON tasks(due_date) WHERE due_date IS NOT NULL;

-- =============================================================================
-- 6. Task Assignees (references tasks + users)
-- =============================================================================
CREATE TABLE IF NOT EXISTS task_assignees (
    task_id TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    assigned_by TEXT REFERENCES users(id) ON DELETE SET NULL,
    assigned_at INTEGER NOT NULL,
    PRIMARY KEY (task_id, user_id)
);

CREATE INDEX IF NOT EXISTS idx_task_assignees_user ON task_assignees(user_id);

-- =============================================================================
-- 7. Risks (references projects)
-- =============================================================================
CREATE TABLE IF NOT EXISTS risks (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    title TEXT NOT NULL CHECK(length(title) >= 1),
    description TEXT,
    severity TEXT NOT NULL CHECK(severity IN ('low', 'medium', 'high')),
    probability TEXT NOT NULL CHECK(probability IN ('low', 'medium', 'high')),
    status TEXT NOT NULL DEFAULT 'open' CHECK(status IN ('open', 'mitigating', 'closed')),
    mitigation_plan TEXT,
    owner_id TEXT REFERENCES users(id) ON DELETE SET NULL,
    created_by TEXT REFERENCES users(id) ON DELETE SET NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_risks_project ON risks(project_id, status);

-- =============================================================================
-- 8. Expenses (references projects)
-- =============================================================================
CREATE TABLE IF NOT EXISTS expenses (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    amount_cents INTEGER NOT NULL CHECK(amount_cents > 0),
    category TEXT NOT NULL CHECK(length(category) >= 1),
    description TEXT,
    incurred_on TEXT NOT NULL,
    created_by TEXT REFERENCES users(id) ON DELETE SET NULL,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_expenses_project ON expenses(project_id, incurred_on);

-- =============================================================================
-- 9. Budget History (references projects)
-- =============================================================================
CREATE TABLE IF NOT EXISTS budget_history (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    kind TEXT NOT NULL CHECK(kind IN ('budget_set', 'expense_added', 'expense_removed')),
    amount_delta_cents INTEGER NOT NULL,
    total_budget_cents INTEGER NOT NULL,
    actual_expenditure_cents INTEGER NOT NULL,
    note TEXT,
    user_id TEXT REFERENCES users(id) ON DELETE SET NULL,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_budget_history_project ON budget_history(project_id, created_at);

-- =============================================================================
-- 10. Task Comments (references tasks + users)
-- =============================================================================
CREATE TABLE IF NOT EXISTS task_comments (
    id TEXT PRIMARY KEY,
    task_id TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    body TEXT NOT NULL CHECK(length(body) >= 1),
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_task_comments_task ON task_comments(task_id, created_at);

-- =============================================================================
-- 11. Task Files (references tasks + users; bytes in content-addressed storage)
-- =============================================================================
CREATE TABLE IF NOT EXISTS task_files (
    id TEXT PRIMARY KEY,
    task_id TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    uploader_id TEXT REFERENCES users(id) ON DELETE SET NULL,
    original_name TEXT NOT NULL,
    content_hash TEXT NOT NULL CHECK(length(content_hash) = 64),
    mime_type TEXT NOT NULL,
    size_bytes INTEGER NOT NULL CHECK(size_bytes >= 0),
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_task_files_task ON task_files(task_id);
CREATE INDEX IF NOT EXISTS idx_task_files_hash ON task_files(project_id, content_hash);

-- =============================================================================
-- 12. Notifications (polymorphic subject, no FK to subject)
-- =============================================================================
CREATE TABLE IF NOT EXISTS notifications (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    kind TEXT NOT NULL,
    subject_type TEXT NOT NULL CHECK(subject_type IN ('task', 'project', 'invitation')),
    subject_id TEXT NOT NULL,
    payload TEXT NOT NULL DEFAULT '{}',
    read_at INTEGER,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_notifications_user ON notifications(user_id, created_at);
CREATE INDEX IF NOT EXISTS idx_notifications_unread ON notifications(user_id) WHERE read_at IS NULL;
CREATE INDEX IF NOT EXISTS idx_notifications_subject ON notifications(subject_type, subject_id);

-- =============================================================================
-- 13. Activity Logs
-- =============================================================================
CREATE TABLE IF NOT EXISTS activity_logs (
    id TEXT PRIMARY KEY,
    user_id TEXT REFERENCES users(id) ON DELETE SET NULL,
    project_id TEXT REFERENCES projects(id) ON DELETE CASCADE,
    task_id TEXT,
    action TEXT NOT NULL,
    metadata TEXT NOT NULL DEFAULT '{}',
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_activity_project ON activity_logs(project_id, created_at);
CREATE INDEX IF NOT EXISTS idx_activity_user ON activity_logs(user_id, created_at);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_contains_required_tables() {
        let tables = [
            "schema_version",
            "schema_migrations",
            "users",
            "projects",
            "team_members",
            "team_invitations",
            "tasks",
            "task_assignees",
            "risks",
            "expenses",
            "budget_history",
            "task_comments",
            "task_files",
            "notifications",
            "activity_logs",
        ];
        for table in tables {
            assert!(
                SCHEMA.contains(&format!("CREATE TABLE IF NOT EXISTS {} (", table)),
                "Schema should contain {} table",
                table
            );
        }
    }

    #[test]
    fn test_budget_invariant_is_a_table_check() {
        assert!(SCHEMA.contains("CHECK(actual_expenditure_cents <= total_budget_cents)"));
    }

    #[tokio::test]
    async fn test_schema_applies_to_fresh_database() {
        let pool = sqlx::SqlitePool::connect(":memory:").await.unwrap();
        sqlx::query(SCHEMA).execute(&pool).await.unwrap();

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count, 15);
    }
}
