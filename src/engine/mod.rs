// Engine orchestration: single-flight tasks, progress aggregation and exclusive resources.

pub mod discovery;
pub mod download;
pub mod exclusive;
pub mod export;
pub mod navigator;
pub mod notify;
pub mod progress;
pub mod registry;
pub mod remote;
pub mod retry;
pub mod routes;
pub mod summary;
pub mod toolkit;
pub mod view;
pub mod watched;
