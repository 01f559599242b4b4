//! Authentication and authorization

mod context;
mod extractors;
pub mod jwt;
mod manager;
pub mod middleware;
pub mod password;

pub use context::{AuthContext, AuthService, project_not_found};
pub use extractors::{
    Auth, AuthRejection, Manage, Own, ProjectAccess, ProjectManage, ProjectOwn, ProjectRead,
    ProjectWrite, Read, RoleLevel, Write,
};

pub use jwt::SessionClaims;
pub use manager::AuthManager;
pub use middleware::{AuthError, AuthState, require_auth};
