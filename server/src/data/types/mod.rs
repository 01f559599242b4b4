//! Shared data types for the transactional store

mod enums;
mod transactional;

pub use enums::{
    BudgetEntryKind, InvitationStatus, ProjectStatus, RiskLevel, RiskStatus, SubjectType,
    TaskPriority, TaskStatus, TeamRole,
};

pub use transactional::{
    ActivityFilter, ActivityRow, BudgetHistoryRow, BudgetWriteResult, CategoryTotal, CommentRow, ExpenseRow,
    InvitationResponse, InvitationRow, MemberRow, MemberWithUser, NewActivity, NewExpense,
    NewNotification, NewProject, NewRisk, NewTask, NewTaskFile, NotificationRow,
    OwnerProtectedResult, ProjectRow, ProjectUpdate, ProjectWithRole, RiskRow, RiskUpdate,
    TaskDueRow, TaskFileRow, TaskFilter, TaskRow, TaskStats, TaskUpdate, UserCredentials,
    UserRow,
};
