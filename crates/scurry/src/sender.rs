//! # Outbound Senders
//!
//! The two implementations of the model's outbound seam: one over the
//! reliable transport for online play, one straight into the battle
//! emulator for training mode.

use std::sync::Arc;

use scurry_emulator::ServerEmulator;
use scurry_model::CommandSender;
use scurry_networking::Transport;
use scurry_protocol::{encode, Command};

/// Sends requests over the reliable transport.
pub struct NetSender {
    transport: Arc<Transport>,
}

impl NetSender {
    /// Creates a sender over `transport`.
    #[must_use]
    pub fn new(transport: Arc<Transport>) -> Self {
        Self { transport }
    }
}

impl CommandSender for NetSender {
    fn send(&self, command: Command, args: &[u8]) {
        self.transport.send(&encode(command, args));
    }

    fn reset(&self) {
        self.transport.reset();
    }
}

/// Routes requests into the local battle emulator.
pub struct EmulatorSender {
    emulator: Arc<ServerEmulator>,
}

impl EmulatorSender {
    /// Creates a sender into `emulator`.
    #[must_use]
    pub fn new(emulator: Arc<ServerEmulator>) -> Self {
        Self { emulator }
    }
}

impl CommandSender for EmulatorSender {
    fn send(&self, command: Command, args: &[u8]) {
        if let Err(e) = self.emulator.handle(command, args) {
            // The model pre-validates its requests; reaching this is a
            // client bug, not a runtime condition.
            tracing::error!(error = %e, ?command, "emulator rejected request");
            debug_assert!(false, "emulator rejected request: {e}");
        }
    }

    fn reset(&self) {
        // No session to reset offline.
    }
}
