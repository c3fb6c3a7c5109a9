pub mod auth_service;
pub mod file_storage;
