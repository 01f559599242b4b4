//! Deadline and budget sweep
//!
//! Scans for tasks due soon, projects ending soon and budgets running low,
//! notifies the relevant users, then removes invitation notifications whose
//! invitation is gone and attachment blobs no row references. Each run
//! recomputes from current state; a task that stays due for several days is
//! notified on each run. A failed delivery is logged and the run continues.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::budget::{is_below_threshold, remaining_percent};
use super::notifications::{NotificationPayload, Notifier};
use crate::core::config::SweepConfig;
use crate::data::TransactionalService;
use crate::data::error::DataError;
use crate::data::files::FileService;
use crate::utils::time::{date_window, parse_date, today};

/// Counts from one sweep run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub tasks_due: usize,
    pub projects_ending: usize,
    pub budgets_low: usize,
    pub notifications_sent: usize,
    pub delivery_failures: usize,
    pub orphans_removed: u64,
    pub blobs_removed: u64,
}

pub struct DeadlineSweeper {
    database: Arc<TransactionalService>,
    notifier: Notifier,
    files: Arc<FileService>,
    config: SweepConfig,
}

fn days_between(from: NaiveDate, to: &str) -> i64 {
    parse_date(to).map_or(0, |to| (to - from).num_days())
}

impl DeadlineSweeper {
    pub fn new(
        database: Arc<TransactionalService>,
        notifier: Notifier,
        files: Arc<FileService>,
        config: SweepConfig,
    ) -> Self {
        Self {
            database,
            notifier,
            files,
            config,
        }
    }

    /// Run the sweep on an interval until shutdown. The first run happens
    /// one interval after startup.
    pub fn start_sweep_task(self: Arc<Self>, mut shutdown_rx: watch::Receiver<bool>) -> JoinHandle<()> {
        let period = Duration::from_secs(self.config.interval_hours.max(1) * 3600);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            tracing::debug!("Deadline sweep task shutting down");
                            break;
                        }
                    }
                    _ = interval.tick() => {
                        if let Err(e) = self.run_once(today()).await {
                            tracing::warn!(error = %e, "Deadline sweep failed");
                        }
                    }
                }
            }
        })
    }

    pub async fn run_once(&self, today: NaiveDate) -> Result<SweepReport, DataError> {
        let mut report = SweepReport::default();
        self.sweep_tasks(today, &mut report).await?;
        self.sweep_projects(today, &mut report).await?;
        self.sweep_budgets(&mut report).await?;

        report.orphans_removed = self
            .database
            .repository()
            .delete_orphaned_invitation_notifications(None)
            .await?;

        match self.files.collect_orphans().await {
            Ok(removed) => report.blobs_removed = removed,
            Err(e) => tracing::warn!(error = %e, "Orphan blob collection failed"),
        }

        tracing::info!(
            tasks_due = report.tasks_due,
            projects_ending = report.projects_ending,
            budgets_low = report.budgets_low,
            notifications = report.notifications_sent,
            delivery_failures = report.delivery_failures,
            orphans_removed = report.orphans_removed,
            blobs_removed = report.blobs_removed,
            "Deadline sweep complete"
        );
        Ok(report)
    }

    async fn deliver(
        &self,
        recipients: &[String],
        payload: &NotificationPayload,
        report: &mut SweepReport,
    ) {
        match self.notifier.deliver(recipients, payload).await {
            Ok(sent) => report.notifications_sent += sent,
            Err(e) => {
                report.delivery_failures += 1;
                tracing::warn!(kind = payload.kind(), error = %e, "Sweep notification failed");
            }
        }
    }

    async fn sweep_tasks(&self, today: NaiveDate, report: &mut SweepReport) -> Result<(), DataError> {
        let (from, to) = date_window(today, self.config.task_due_days);
        let tasks = self
            .database
            .repository()
            .list_tasks_due_between(&from, &to)
            .await?;

        for task in tasks {
            let recipients = if task.assignee_ids.is_empty() {
                vec![task.project_owner_id.clone()]
            } else {
                task.assignee_ids.clone()
            };
            let payload = NotificationPayload::TaskDueSoon {
                days_left: days_between(today, &task.due_date),
                project_id: task.project_id,
                project_name: task.project_name,
                task_id: task.task_id,
                task_title: task.title,
                due_date: task.due_date,
            };
            report.tasks_due += 1;
            self.deliver(&recipients, &payload, report).await;
        }
        Ok(())
    }

    async fn sweep_projects(
        &self,
        today: NaiveDate,
        report: &mut SweepReport,
    ) -> Result<(), DataError> {
        let (from, to) = date_window(today, self.config.project_ending_days);
        let projects = self
            .database
            .repository()
            .list_projects_ending_between(&from, &to)
            .await?;

        for project in projects {
            let Some(end_date) = project.end_date else {
                continue;
            };
            let payload = NotificationPayload::ProjectEndingSoon {
                days_left: days_between(today, &end_date),
                project_id: project.id,
                project_name: project.name,
                end_date,
            };
            report.projects_ending += 1;
            self.deliver(&[project.owner_id], &payload, report).await;
        }
        Ok(())
    }

    async fn sweep_budgets(&self, report: &mut SweepReport) -> Result<(), DataError> {
        let threshold = self.config.budget_threshold_percent;
        let projects = self.database.repository().list_projects_with_budget().await?;

        for project in projects.into_iter().filter(|p| {
            is_below_threshold(p.total_budget_cents, p.actual_expenditure_cents, threshold)
        }) {
            let payload = NotificationPayload::BudgetThreshold {
                remaining_percent: remaining_percent(
                    project.total_budget_cents,
                    project.actual_expenditure_cents,
                ),
                project_id: project.id,
                project_name: project.name,
                total_budget_cents: project.total_budget_cents,
                actual_expenditure_cents: project.actual_expenditure_cents,
            };
            report.budgets_low += 1;
            self.deliver(&[project.owner_id], &payload, report).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::files::{FileStorage, FilesystemStorage};
    use crate::data::sqlite::repositories::test_support::{
        new_project, new_task, seed_user, setup_test_pool,
    };
    use crate::data::types::{NewExpense, ProjectStatus, TaskStatus, TeamRole};
    use crate::utils::crypto::sha256_bytes_hex;
    use tempfile::TempDir;

    fn date(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    fn sweeper(
        database: &Arc<TransactionalService>,
        storage: Arc<FilesystemStorage>,
    ) -> DeadlineSweeper {
        DeadlineSweeper::new(
            Arc::clone(database),
            Notifier::new(Arc::clone(database)),
            Arc::new(FileService::with_storage(storage, Arc::clone(database))),
            SweepConfig::default(),
        )
    }

    fn temp_storage() -> (TempDir, Arc<FilesystemStorage>) {
        let dir = TempDir::new().unwrap();
        let storage = Arc::new(FilesystemStorage::new(dir.path().to_path_buf()));
        (dir, storage)
    }

    #[tokio::test]
    async fn test_sweep_windows_and_recipients() {
        let pool = setup_test_pool().await;
        let owner = seed_user(&pool, "owner@example.com").await;
        let dev = seed_user(&pool, "dev@example.com").await;
        let database = Arc::new(TransactionalService::from_pool(pool));
        let repo = database.repository();

        let mut project = new_project("Apollo", 10_000);
        project.end_date = Some("2026-03-08".to_string());
        let project = repo.create_project(&owner.id, &project).await.unwrap();

        // Ended too late for the window and closed: both skipped
        let mut later = new_project("Later", 0);
        later.end_date = Some("2026-03-09".to_string());
        repo.create_project(&owner.id, &later).await.unwrap();
        let mut done = new_project("Done", 0);
        done.end_date = Some("2026-03-02".to_string());
        done.status = ProjectStatus::Completed;
        repo.create_project(&owner.id, &done).await.unwrap();

        let mut due = new_task("Due in three days");
        due.due_date = Some("2026-03-04".to_string());
        let due = repo.create_task(&project.id, &owner.id, &due).await.unwrap();
        sqlx::query("INSERT INTO team_members (project_id, user_id, role, joined_at) VALUES (?, ?, ?, 0)")
            .bind(&project.id)
            .bind(&dev.id)
            .bind(TeamRole::Member.as_str())
            .execute(database.pool())
            .await
            .unwrap();
        repo.assign_user(&due.id, &dev.id, &owner.id).await.unwrap();

        let mut unassigned = new_task("Due today");
        unassigned.due_date = Some("2026-03-01".to_string());
        repo.create_task(&project.id, &owner.id, &unassigned).await.unwrap();

        let mut too_late = new_task("Due in four days");
        too_late.due_date = Some("2026-03-05".to_string());
        repo.create_task(&project.id, &owner.id, &too_late).await.unwrap();

        let mut completed = new_task("Already done");
        completed.due_date = Some("2026-03-02".to_string());
        completed.status = TaskStatus::Completed;
        repo.create_task(&project.id, &owner.id, &completed).await.unwrap();

        // 8,000 of 10,000 spent leaves exactly 20%
        repo.add_expense(
            None,
            &project.id,
            &owner.id,
            &NewExpense {
                amount_cents: 8_000,
                category: "Hardware".to_string(),
                description: None,
                incurred_on: "2026-02-20".to_string(),
            },
        )
        .await
        .unwrap();

        let (_dir, storage) = temp_storage();
        let sweeper = sweeper(&database, storage);
        let report = sweeper.run_once(date("2026-03-01")).await.unwrap();
        assert_eq!(report.tasks_due, 2);
        assert_eq!(report.projects_ending, 1);
        assert_eq!(report.budgets_low, 1);
        assert_eq!(report.notifications_sent, 4);

        let (dev_notes, _) = repo.list_notifications(&dev.id, false, 1, 10).await.unwrap();
        assert_eq!(dev_notes.len(), 1);
        assert_eq!(dev_notes[0].kind, "task_due_soon");
        assert_eq!(dev_notes[0].payload["days_left"], 3);

        let (owner_notes, _) = repo.list_notifications(&owner.id, false, 1, 10).await.unwrap();
        let mut kinds: Vec<_> = owner_notes.iter().map(|n| n.kind.as_str()).collect();
        kinds.sort();
        assert_eq!(kinds, vec!["budget_threshold", "project_ending_soon", "task_due_soon"]);

        // No dedup state: a second run notifies again
        let again = sweeper.run_once(date("2026-03-01")).await.unwrap();
        assert_eq!(again.notifications_sent, 4);
    }

    #[tokio::test]
    async fn test_sweep_removes_orphans() {
        let pool = setup_test_pool().await;
        let owner = seed_user(&pool, "owner@example.com").await;
        let guest = seed_user(&pool, "guest@example.com").await;
        let database = Arc::new(TransactionalService::from_pool(pool));
        let repo = database.repository();
        let project = repo
            .create_project(&owner.id, &new_project("Apollo", 0))
            .await
            .unwrap();
        let notifier = Notifier::new(Arc::clone(&database));

        let invitation = repo
            .create_invitation(&project.id, &owner.id, &guest.email, TeamRole::Member, None)
            .await
            .unwrap();
        notifier.invitation_sent(&invitation, &owner).await;
        repo.delete_invitation(&project.id, &invitation.id).await.unwrap();

        let (_dir, storage) = temp_storage();
        let stray = sha256_bytes_hex(b"left behind");
        storage.store(&project.id, &stray, b"left behind").await.unwrap();

        let report = sweeper(&database, Arc::clone(&storage))
            .run_once(date("2026-03-01"))
            .await
            .unwrap();
        assert_eq!(report.orphans_removed, 1);
        assert_eq!(report.blobs_removed, 1);
        assert_eq!(repo.count_unread_notifications(&guest.id).await.unwrap(), 0);
        assert!(storage.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_delivery_does_not_stop_sweep() {
        let pool = setup_test_pool().await;
        let owner = seed_user(&pool, "owner@example.com").await;
        let database = Arc::new(TransactionalService::from_pool(pool));
        let repo = database.repository();

        let mut project = new_project("Apollo", 0);
        project.end_date = Some("2026-03-03".to_string());
        let project = repo.create_project(&owner.id, &project).await.unwrap();
        let mut due = new_task("Due tomorrow");
        due.due_date = Some("2026-03-02".to_string());
        repo.create_task(&project.id, &owner.id, &due).await.unwrap();

        sqlx::query(
            "CREATE TRIGGER reject_notifications BEFORE INSERT ON notifications \
             BEGIN SELECT RAISE(ABORT, 'notifications unavailable'); END",
        )
        .execute(database.pool())
        .await
        .unwrap();

        let (_dir, storage) = temp_storage();
        let stray = sha256_bytes_hex(b"left behind");
        storage.store(&project.id, &stray, b"left behind").await.unwrap();

        let report = sweeper(&database, Arc::clone(&storage))
            .run_once(date("2026-03-01"))
            .await
            .unwrap();
        assert_eq!(report.tasks_due, 1);
        assert_eq!(report.projects_ending, 1);
        assert_eq!(report.notifications_sent, 0);
        assert_eq!(report.delivery_failures, 2);
        assert_eq!(report.blobs_removed, 1);
    }

    #[test]
    fn test_days_between() {
        assert_eq!(days_between(date("2026-03-01"), "2026-03-04"), 3);
        assert_eq!(days_between(date("2026-03-01"), "garbage"), 0);
    }
}
