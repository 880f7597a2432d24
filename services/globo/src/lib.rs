pub mod commands;
pub mod config;
pub mod history_cache;
pub mod prompt_loader;
pub mod render;
