pub mod auth;
pub mod charts;
pub mod config;
pub mod delivery;
pub mod error;
pub mod llm;
pub mod mail;
pub mod models;
pub mod pipeline;
pub mod processing;
pub mod publish;
pub mod report;
pub mod sources;
pub mod summary;
pub mod telemetry;
