pub mod api;
pub mod application;
pub mod commands;
pub mod config;
pub mod download;
pub mod error;
pub mod http;
pub mod package;
pub mod provider;
pub mod runtime;
