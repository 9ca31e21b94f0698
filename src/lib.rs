pub mod cli;
pub mod config;
pub mod domain;
pub mod infra;
pub mod logging;
pub mod media;
pub mod workflows;
