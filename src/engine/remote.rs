// Remote maintenance commands: one at a time across the whole toolkit.

use tokio::sync::Mutex;
use tracing::info;

use crate::device::traits::{DeviceHandle, RemoteCommand};
use crate::error::{Result, ToolkitError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub command: RemoteCommand,
    pub success: bool,
    pub message: String,
}

/// Remote controls are disabled while any command is running.
#[derive(Debug, Default)]
pub struct RemoteControls {
    running: Mutex<()>,
}

impl RemoteControls {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.running.try_lock().is_err()
    }

    pub async fn run(&self, device: &DeviceHandle, command: RemoteCommand) -> Result<CommandOutcome> {
        let Ok(_controls) = self.running.try_lock() else {
            return Err(ToolkitError::Busy);
        };
        if !device.is_authenticated() {
            return Err(ToolkitError::NotAuthenticated(device.id().to_string()));
        }

        info!("running {:?} on {}", command, device.id());
        let success = device.run_command(command).await?;
        info!("{:?} on {} finished success={}", command, device.id(), success);
        Ok(CommandOutcome {
            command,
            success,
            message: outcome_message(command, success).to_string(),
        })
    }
}

fn outcome_message(command: RemoteCommand, success: bool) -> &'static str {
    match (command, success) {
        (RemoteCommand::Reboot, true) => "Rebooted Device.",
        (RemoteCommand::Reboot, false) => "Failed to Reboot Device.",
        (RemoteCommand::Shutdown, true) => "Shutdown the Device.",
        (RemoteCommand::Shutdown, false) => "Failed to Shutdown Device.",
        (RemoteCommand::FlashPanda, true) => "Flashed Panda.",
        (RemoteCommand::FlashPanda, false) => "Failed to flash Panda",
        (RemoteCommand::InstallEmu, true) => "Emu Installed.",
        (RemoteCommand::InstallEmu, false) => "Emu Installation Failed.",
        (RemoteCommand::Reinstall, true) => "Reinstall Successful",
        (RemoteCommand::Reinstall, false) => "There was an error during installation",
        (RemoteCommand::OpenSettings, true) => "Opened Settings.",
        (RemoteCommand::OpenSettings, false) => "Failed to open Settings.",
        (RemoteCommand::CloseSettings, true) => "Closed Settings.",
        (RemoteCommand::CloseSettings, false) => "Failed to close Settings.",
    }
}
