//! Business rules
//!
//! - `budget` - budget arithmetic and the `actual <= total` invariant
//! - `risk` - impact scoring, ratings and trend
//! - `notifications` - notification payloads and recipient fan-out
//! - `sweep` - scheduled deadline and budget sweep
//! - `activity` - activity log entries

pub mod activity;
pub mod budget;
pub mod error;
pub mod notifications;
pub mod risk;
pub mod sweep;

pub use error::DomainError;
pub use notifications::{NotificationPayload, Notifier};
pub use sweep::{DeadlineSweeper, SweepReport};
