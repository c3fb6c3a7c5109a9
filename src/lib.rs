pub mod content;
pub mod db;
pub mod server;
pub mod services;
pub mod tag_graph;
pub mod version;
pub mod web;
