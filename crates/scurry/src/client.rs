//! # Client Wiring
//!
//! Builds a running client out of the crates below: model + event bus,
//! dispatcher, and either the UDP transport (online) or the battle
//! emulator (training). Inbound traffic - real or emulated - flows
//! through the one dispatcher, so both modes exercise identical parsing
//! and model code.

use std::net::SocketAddr;
use std::sync::Arc;

use scurry_emulator::{ReplySink, ServerEmulator};
use scurry_model::{
    Dispatcher, EventBus, EventReceiver, Fault, FileStore, KeepAlive, Model,
};
use scurry_networking::{NetResult, Transport, TransportHandler};
use scurry_protocol::RawFrame;

use crate::sender::{EmulatorSender, NetSender};

/// Undelivered events the UI may fall behind by before drops start.
const EVENT_CAPACITY: usize = 256;

/// How a client reaches its authority.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientMode {
    /// A real server over UDP.
    Online(SocketAddr),
    /// The local battle emulator; no socket at all.
    Training,
}

/// A wired-up client.
pub struct Client {
    /// The shared application model.
    pub model: Arc<Model>,
    /// The UI's end of the event bus.
    pub events: EventReceiver,
    transport: Option<Arc<Transport>>,
    emulator: Option<Arc<ServerEmulator>>,
    keep_alive: Option<KeepAlive>,
}

impl Client {
    /// Builds and starts a client.
    ///
    /// # Errors
    ///
    /// [`scurry_networking::NetError`] when the online socket cannot be
    /// opened; training mode cannot fail.
    pub fn start(mode: ClientMode, store: Arc<dyn FileStore>) -> NetResult<Self> {
        let bus = EventBus::new(EVENT_CAPACITY);
        let model = Arc::new(Model::new(bus.sender()));
        model.set_store(store);
        model.load_settings();
        let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&model)));

        match mode {
            ClientMode::Online(server) => {
                let handler = Arc::new(FrameHandler {
                    dispatcher,
                    model: Arc::clone(&model),
                });
                let transport = Transport::connect(server, handler)?;
                model.set_sender(Arc::new(NetSender::new(Arc::clone(&transport))));
                let keep_alive = KeepAlive::start(Arc::clone(&model));
                tracing::info!(%server, "client online");
                Ok(Self {
                    model,
                    events: bus.receiver(),
                    transport: Some(transport),
                    emulator: None,
                    keep_alive: Some(keep_alive),
                })
            }
            ClientMode::Training => {
                let sink = Arc::new(DispatchSink {
                    dispatcher,
                    model: Arc::clone(&model),
                });
                let emulator = Arc::new(ServerEmulator::new(Arc::clone(&model), sink));
                model.set_sender(Arc::new(EmulatorSender::new(Arc::clone(&emulator))));
                tracing::info!("client in training mode");
                Ok(Self {
                    model,
                    events: bus.receiver(),
                    transport: None,
                    emulator: Some(emulator),
                    keep_alive: None,
                })
            }
        }
    }

    /// The transport, when online.
    #[must_use]
    pub fn transport(&self) -> Option<&Arc<Transport>> {
        self.transport.as_ref()
    }

    /// Stops background threads and tears any battle down.
    pub fn close(&self) {
        if let Some(keep_alive) = &self.keep_alive {
            keep_alive.stop();
        }
        if let Some(emulator) = &self.emulator {
            emulator.close();
        }
        if let Some(transport) = &self.transport {
            transport.close();
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.close();
    }
}

/// Routes transport payloads into the dispatcher.
struct FrameHandler {
    dispatcher: Arc<Dispatcher>,
    model: Arc<Model>,
}

impl TransportHandler for FrameHandler {
    fn on_frame(&self, payload: Vec<u8>) {
        if let Err(e) = self.dispatcher.dispatch(&payload) {
            // A frame outside the contract means the peer speaks another
            // protocol revision: fail loud and force a resync.
            tracing::error!(error = %e, "protocol fault, session must resync");
            self.model.fault(Fault::ProtocolMismatch);
        }
    }

    fn on_connectivity(&self, connected: bool) {
        self.dispatcher.connectivity_changed(connected);
    }
}

/// Routes emulator reply frames into the same dispatcher.
struct DispatchSink {
    dispatcher: Arc<Dispatcher>,
    model: Arc<Model>,
}

impl ReplySink for DispatchSink {
    fn deliver(&self, frame: RawFrame) {
        if let Err(e) = self.dispatcher.dispatch_frame(&frame) {
            tracing::error!(error = %e, "emulator produced a malformed frame");
            self.model.fault(Fault::ProtocolMismatch);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scurry_model::MemoryStore;

    #[test]
    fn test_training_client_wires_up() {
        let client = Client::start(ClientMode::Training, Arc::new(MemoryStore::new())).unwrap();
        assert!(client.transport().is_none());
        assert!(client.model.is_connected());
        client.close();
    }

    #[test]
    fn test_online_client_opens_socket() {
        let addr: SocketAddr = "127.0.0.1:9".parse().unwrap();
        let client = Client::start(ClientMode::Online(addr), Arc::new(MemoryStore::new())).unwrap();
        assert!(client.transport().is_some());
        client.close();
    }
}
