pub mod auth;
pub mod config;
pub mod dedupe;
pub mod domain;
pub mod llm;
pub mod mail;
pub mod pipeline;
pub mod retry;
pub mod store;
