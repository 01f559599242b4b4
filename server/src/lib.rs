//! ProjectHub server: projects, tasks, budgets, risks and team collaboration
//! over a JSON API backed by SQLite.

pub mod api;
pub mod app;
pub mod core;
pub mod data;
pub mod domain;
pub mod utils;
