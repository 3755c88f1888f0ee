pub mod agent;
pub mod auth;
pub mod config;
mod config_env;
pub mod conversation;
pub mod models;
