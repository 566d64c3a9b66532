//! Orchestration core for a small fleet of remotely reachable driving-assistance devices.
//!
//! Discovery and authentication fan-out, single-flight route operations,
//! composite progress, and exclusive resources (the active media stream and
//! per-path downloads). The remote protocol itself sits behind
//! [`device::traits::RemoteDevice`].

pub mod config;
pub mod device;
pub mod engine;
pub mod error;
pub mod telemetry;

pub use config::EngineConfig;
pub use engine::notify::{ChannelSink, Notification, NotificationSink};
pub use engine::toolkit::Toolkit;
pub use error::{Result, ToolkitError};
