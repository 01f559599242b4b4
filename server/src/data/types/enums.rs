//! Status and classification enums stored as TEXT columns
//!
//! Each enum round-trips through `as_str()` / `parse()` and serializes with
//! the same snake_case names used in the database.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// ============================================================================
// Projects
// ============================================================================

/// Project lifecycle status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    #[default]
    Planning,
    Active,
    OnHold,
    Completed,
    Cancelled,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Planning => "planning",
            Self::Active => "active",
            Self::OnHold => "on_hold",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "planning" => Some(Self::Planning),
            "active" => Some(Self::Active),
            "on_hold" => Some(Self::OnHold),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Completed and cancelled projects are excluded from deadline reminders
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

// ============================================================================
// Tasks
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "todo" => Some(Self::Todo),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "urgent" => Some(Self::Urgent),
            _ => None,
        }
    }
}

// ============================================================================
// Team
// ============================================================================

/// Team role within a project, ordered by privilege
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TeamRole {
    /// Read-only access
    Viewer,
    /// Read + write tasks, risks, comments, files, expenses
    #[default]
    Member,
    /// Member + budget, team and invitation management
    Manager,
    /// Full control including project deletion
    Owner,
}

impl TeamRole {
    /// Numeric privilege level (viewer=0 .. owner=3)
    pub fn level(&self) -> u8 {
        match self {
            Self::Viewer => 0,
            Self::Member => 1,
            Self::Manager => 2,
            Self::Owner => 3,
        }
    }

    /// Check if this role grants at least `required`
    pub fn has_at_least(&self, required: TeamRole) -> bool {
        self.level() >= required.level()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Viewer => "viewer",
            Self::Member => "member",
            Self::Manager => "manager",
            Self::Owner => "owner",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "viewer" => Some(Self::Viewer),
            "member" => Some(Self::Member),
            "manager" => Some(Self::Manager),
            "owner" => Some(Self::Owner),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum InvitationStatus {
    #[default]
    Pending,
    Accepted,
    Declined,
}

impl InvitationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Declined => "declined",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "declined" => Some(Self::Declined),
            _ => None,
        }
    }
}

// ============================================================================
// Risks
// ============================================================================

/// Severity / probability level of a risk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RiskStatus {
    #[default]
    Open,
    Mitigating,
    Closed,
}

impl RiskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Mitigating => "mitigating",
            Self::Closed => "closed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(Self::Open),
            "mitigating" => Some(Self::Mitigating),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }

    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Closed)
    }
}

// ============================================================================
// Budget
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BudgetEntryKind {
    BudgetSet,
    ExpenseAdded,
    ExpenseRemoved,
}

impl BudgetEntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BudgetSet => "budget_set",
            Self::ExpenseAdded => "expense_added",
            Self::ExpenseRemoved => "expense_removed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "budget_set" => Some(Self::BudgetSet),
            "expense_added" => Some(Self::ExpenseAdded),
            "expense_removed" => Some(Self::ExpenseRemoved),
            _ => None,
        }
    }
}

// ============================================================================
// Notifications
// ============================================================================

/// Polymorphic owner of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SubjectType {
    Task,
    Project,
    Invitation,
}

impl SubjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Project => "project",
            Self::Invitation => "invitation",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "task" => Some(Self::Task),
            "project" => Some(Self::Project),
            "invitation" => Some(Self::Invitation),
            _ => None,
        }
    }
}

macro_rules! impl_display {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}", self.as_str())
                }
            }
        )+
    };
}

impl_display!(
    ProjectStatus,
    TaskStatus,
    TaskPriority,
    TeamRole,
    InvitationStatus,
    RiskLevel,
    RiskStatus,
    BudgetEntryKind,
    SubjectType,
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_team_role_ordering() {
        assert!(TeamRole::Owner.has_at_least(TeamRole::Manager));
        assert!(TeamRole::Manager.has_at_least(TeamRole::Member));
        assert!(TeamRole::Member.has_at_least(TeamRole::Viewer));
        assert!(!TeamRole::Viewer.has_at_least(TeamRole::Member));
        assert!(!TeamRole::Manager.has_at_least(TeamRole::Owner));
    }

    #[test]
    fn test_parse_matches_serde_names() {
        let status: TaskStatus = serde_json::from_str(r#""in_progress""#).unwrap();
        assert_eq!(status, TaskStatus::InProgress);
        assert_eq!(TaskStatus::parse(status.as_str()), Some(status));

        let status: ProjectStatus = serde_json::from_str(r#""on_hold""#).unwrap();
        assert_eq!(ProjectStatus::parse("on_hold"), Some(status));
        assert_eq!(
            serde_json::to_string(&BudgetEntryKind::ExpenseRemoved).unwrap(),
            r#""expense_removed""#
        );
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert_eq!(TeamRole::parse("admin"), None);
        assert_eq!(RiskLevel::parse("HIGH"), None);
        assert_eq!(SubjectType::parse(""), None);
    }

    #[test]
    fn test_closed_and_active_helpers() {
        assert!(ProjectStatus::Cancelled.is_closed());
        assert!(!ProjectStatus::OnHold.is_closed());
        assert!(RiskStatus::Mitigating.is_active());
        assert!(!RiskStatus::Closed.is_active());
    }

    #[test]
    fn test_display() {
        assert_eq!(TeamRole::Manager.to_string(), "manager");
        assert_eq!(SubjectType::Invitation.to_string(), "invitation");
    }
}
