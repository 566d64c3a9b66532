use thiserror::Error;

/// Failure taxonomy for every orchestrated operation.
#[derive(Error, Debug)]
pub enum ToolkitError {
    /// Credentials were rejected by one device. Never fatal to a scan.
    #[error("authentication failed for {device}: {reason}")]
    Authentication { device: String, reason: String },

    /// The remote link failed mid-operation.
    #[error("transport error: {0}")]
    Transport(#[from] anyhow::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{}", crate::config::NO_DEVICES_MESSAGE)]
    NoDevicesFound,

    #[error("{discovered} device(s) found but authentication failed")]
    AuthenticationFailed { discovered: usize },

    #[error("You must select at least 1 camera to export.")]
    NoCamerasSelected,

    #[error("device {0} is not authenticated")]
    NotAuthenticated(String),

    #[error("no device selected")]
    NoDeviceSelected,

    /// One member of a parallel batch failed. Artifacts from the other members are kept.
    #[error("{failed} of {total} operations failed: {first}")]
    BatchFailed {
        failed: usize,
        total: usize,
        first: Box<ToolkitError>,
    },

    #[error("another remote command is already running")]
    Busy,
}

impl ToolkitError {
    /// Whether a retry could plausibly succeed without user intervention.
    pub fn is_transient(&self) -> bool {
        matches!(self, ToolkitError::Transport(_))
    }

    pub fn is_authentication(&self) -> bool {
        matches!(self, ToolkitError::Authentication { .. })
    }

    /// Build a transport failure from a plain message.
    pub fn transport(msg: impl std::fmt::Display) -> Self {
        ToolkitError::Transport(anyhow::anyhow!("{}", msg))
    }
}

pub type Result<T> = std::result::Result<T, ToolkitError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transport_is_transient() {
        assert!(ToolkitError::transport("reset by peer").is_transient());
        assert!(!ToolkitError::Authentication {
            device: "a".into(),
            reason: "denied".into()
        }
        .is_transient());
        assert!(!ToolkitError::NoCamerasSelected.is_transient());
    }

    #[test]
    fn discovery_failures_have_distinct_messages() {
        let none = ToolkitError::NoDevicesFound.to_string();
        let unauth = ToolkitError::AuthenticationFailed { discovered: 2 }.to_string();
        assert!(none.starts_with("No devices were found"));
        assert_eq!(unauth, "2 device(s) found but authentication failed");
    }
}
