pub mod api;
pub mod client;
pub mod config;
pub mod filter;
pub mod identity;
pub mod reconcile;
pub mod repository;
pub mod schema;
pub mod service;
pub mod tables;
pub mod validation;
pub const BASE_URL: &str = "http://localhost:37240";
pub const TASKS_API: &str = "tasks";
pub const AUTH_API: &str = "auth";
