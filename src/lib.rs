pub mod adapters;
pub mod app;
pub mod client;
pub mod core;
pub mod global_constants;
pub mod infrastructure;
pub mod presentation;
pub mod server_settings;
