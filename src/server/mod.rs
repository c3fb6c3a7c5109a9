pub mod config;
pub mod user_locks;
