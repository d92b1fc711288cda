//! # UDP Link & Transport
//!
//! The only module in the crate that touches the operating system. A
//! [`UdpLink`] owns the socket, the session identity and the traffic
//! counters; a [`Transport`] glues the link to the [`Sender`]/[`Receiver`]
//! engines and runs the two background threads:
//!
//! - the **receive thread** drains the socket, strips the session header
//!   and feeds inner frames to the engines;
//! - the **tick thread** advances the sender clock for retransmission.
//!
//! Nothing here blocks the caller: `send` enqueues and returns, results
//! come back through the [`TransportHandler`].

use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::{NetError, NetResult};
use crate::receiver::Receiver;
use crate::sender::{Sender, SenderSignal, Wire};
use crate::sequence::TICK_DURATION_MS;
use crate::session::{Session, HEADER_LEN};

/// Largest datagram either side will emit.
const MAX_DATAGRAM: usize = 1024;

/// Poll granularity of the receive thread, so shutdown is prompt.
const RECV_TIMEOUT: Duration = Duration::from_millis(250);

/// Traffic counters, readable from any thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct LinkStats {
    /// Datagrams written to the socket.
    pub packets_sent: u64,
    /// Datagrams read from the socket.
    pub packets_received: u64,
    /// Bytes written, headers included.
    pub bytes_sent: u64,
    /// Bytes read, headers included.
    pub bytes_received: u64,
    /// Socket write failures.
    pub send_errors: u64,
    /// Socket read failures (timeouts excluded).
    pub recv_errors: u64,
}

#[derive(Default)]
struct StatCells {
    packets_sent: AtomicU64,
    packets_received: AtomicU64,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
    send_errors: AtomicU64,
    recv_errors: AtomicU64,
}

/// UDP socket wrapper carrying the session header on every datagram.
pub struct UdpLink {
    socket: UdpSocket,
    server: SocketAddr,
    session: Mutex<Session>,
    stats: StatCells,
}

impl UdpLink {
    /// Binds an ephemeral local port aimed at `server`.
    ///
    /// # Errors
    ///
    /// [`NetError::Socket`] when the bind or socket configuration fails.
    pub fn open(server: SocketAddr) -> NetResult<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", 0))?;
        socket.set_read_timeout(Some(RECV_TIMEOUT))?;
        Ok(Self {
            socket,
            server,
            session: Mutex::new(Session::default()),
            stats: StatCells::default(),
        })
    }

    /// Copy of the current session identity.
    #[must_use]
    pub fn session(&self) -> Session {
        *self.session.lock()
    }

    /// Zeroes sid and token (sign-out, or forcing a fresh handshake).
    pub fn reset_session(&self) {
        self.session.lock().reset();
    }

    fn set_connected(&self, connected: bool) {
        self.session.lock().connected = connected;
    }

    /// Snapshot of the traffic counters.
    #[must_use]
    pub fn stats(&self) -> LinkStats {
        LinkStats {
            packets_sent: self.stats.packets_sent.load(Ordering::Relaxed),
            packets_received: self.stats.packets_received.load(Ordering::Relaxed),
            bytes_sent: self.stats.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.stats.bytes_received.load(Ordering::Relaxed),
            send_errors: self.stats.send_errors.load(Ordering::Relaxed),
            recv_errors: self.stats.recv_errors.load(Ordering::Relaxed),
        }
    }

    /// Blocking receive with the poll timeout mapped to `Ok(None)`.
    fn recv_datagram(&self, buf: &mut [u8]) -> Result<Option<usize>, NetError> {
        match self.socket.recv_from(buf) {
            Ok((len, _addr)) => {
                self.stats.packets_received.fetch_add(1, Ordering::Relaxed);
                self.stats
                    .bytes_received
                    .fetch_add(len as u64, Ordering::Relaxed);
                Ok(Some(len))
            }
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                Ok(None)
            }
            Err(e) => {
                self.stats.recv_errors.fetch_add(1, Ordering::Relaxed);
                Err(NetError::Socket(e))
            }
        }
    }

    /// Strips the session header off an inbound datagram, adopting the
    /// identity it carries. Datagrams no longer than the header are noise.
    fn strip_header(&self, datagram: &[u8]) -> Option<Vec<u8>> {
        if datagram.len() <= HEADER_LEN {
            return None;
        }
        let mut header = [0u8; HEADER_LEN];
        header.copy_from_slice(&datagram[..HEADER_LEN]);
        self.session.lock().absorb(&header);
        Some(datagram[HEADER_LEN..].to_vec())
    }
}

impl Wire for UdpLink {
    fn transmit(&self, bytes: &[u8]) {
        let header = self.session.lock().header();
        let mut datagram = Vec::with_capacity(HEADER_LEN + bytes.len());
        datagram.extend_from_slice(&header);
        datagram.extend_from_slice(bytes);
        match self.socket.send_to(&datagram, self.server) {
            Ok(n) => {
                self.stats.packets_sent.fetch_add(1, Ordering::Relaxed);
                self.stats.bytes_sent.fetch_add(n as u64, Ordering::Relaxed);
            }
            Err(e) => {
                self.stats.send_errors.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(error = %e, "datagram send failed");
            }
        }
    }
}

/// Consumer interface of the transport.
///
/// All callbacks run on the transport's background threads; implementors
/// must be cheap and thread-safe and must not call back into the transport
/// synchronously from `on_frame`.
pub trait TransportHandler: Send + Sync {
    /// One application payload, delivered in order and exactly once.
    fn on_frame(&self, payload: Vec<u8>);

    /// The connection came up (both directions established) or went down
    /// (handshake/retransmission exhausted).
    fn on_connectivity(&self, connected: bool);

    /// A socket-level fault that did not kill the connection.
    fn on_error(&self, error: NetError) {
        tracing::warn!(error = %error, "transport error");
    }
}

/// Reliable-delivery transport over one UDP flow.
pub struct Transport {
    link: Arc<UdpLink>,
    sender: Mutex<Sender<Arc<UdpLink>>>,
    receiver: Mutex<Receiver>,
    handler: Arc<dyn TransportHandler>,
    running: Arc<AtomicBool>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl Transport {
    /// Opens the socket, starts the background threads and begins the
    /// handshake.
    ///
    /// # Errors
    ///
    /// [`NetError::Socket`] when the local socket cannot be opened.
    pub fn connect(
        server: SocketAddr,
        handler: Arc<dyn TransportHandler>,
    ) -> NetResult<Arc<Self>> {
        let link = Arc::new(UdpLink::open(server)?);
        let mut sender = Sender::new(Arc::clone(&link));
        sender.connect();
        let transport = Arc::new(Self {
            link,
            sender: Mutex::new(sender),
            receiver: Mutex::new(Receiver::new()),
            handler,
            running: Arc::new(AtomicBool::new(true)),
            threads: Mutex::new(Vec::new()),
        });
        transport.spawn_receive_thread();
        transport.spawn_tick_thread();
        Ok(transport)
    }

    /// Queues one application payload for reliable, ordered delivery.
    pub fn send(&self, payload: &[u8]) {
        self.sender.lock().send(payload);
    }

    /// Copy of the session identity.
    #[must_use]
    pub fn session(&self) -> Session {
        self.link.session()
    }

    /// Traffic counters.
    #[must_use]
    pub fn stats(&self) -> LinkStats {
        self.link.stats()
    }

    /// True when both directions are established.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.sender.lock().is_connected() && self.receiver.lock().is_connected()
    }

    /// Zeroes the session identity (sign-out path). The reliable layer
    /// keeps running; the server treats the next request as anonymous.
    pub fn reset(&self) {
        self.link.reset_session();
    }

    /// Stops the background threads and waits for them.
    pub fn close(&self) {
        self.running.store(false, Ordering::Release);
        let handles: Vec<_> = self.threads.lock().drain(..).collect();
        for handle in handles {
            let _ = handle.join();
        }
    }

    fn spawn_receive_thread(self: &Arc<Self>) {
        let transport = Arc::clone(self);
        let handle = std::thread::Builder::new()
            .name("scurry-net-recv".into())
            .spawn(move || {
                let mut buf = [0u8; MAX_DATAGRAM];
                while transport.running.load(Ordering::Acquire) {
                    match transport.link.recv_datagram(&mut buf) {
                        Ok(Some(len)) => {
                            if let Some(inner) = transport.link.strip_header(&buf[..len]) {
                                transport.on_inner_frame(&inner);
                            }
                        }
                        Ok(None) => {}
                        Err(e) => transport.handler.on_error(e),
                    }
                }
            })
            .expect("spawn receive thread");
        self.threads.lock().push(handle);
    }

    fn spawn_tick_thread(self: &Arc<Self>) {
        let transport = Arc::clone(self);
        let handle = std::thread::Builder::new()
            .name("scurry-net-tick".into())
            .spawn(move || {
                while transport.running.load(Ordering::Acquire) {
                    std::thread::sleep(Duration::from_millis(TICK_DURATION_MS));
                    let signal = transport.sender.lock().on_tick();
                    if let Some(signal) = signal {
                        transport.apply_signal(signal);
                    }
                }
            })
            .expect("spawn tick thread");
        self.threads.lock().push(handle);
    }

    /// Routes one inner frame: a single byte is an ack, anything longer is
    /// `payload + trailing sequence byte`.
    fn on_inner_frame(&self, inner: &[u8]) {
        if let &[seq] = inner {
            let signal = self.sender.lock().on_ack(seq);
            if let Some(signal) = signal {
                self.apply_signal(signal);
            }
            return;
        }
        let (payload, seq) = inner.split_at(inner.len() - 1);
        let acceptance = self.receiver.lock().on_msg(seq[0]);
        if let Some(ack) = acceptance.ack {
            self.link.transmit(&[ack]);
        }
        if acceptance.established {
            self.refresh_connected();
            if self.is_connected() {
                tracing::info!("connection established");
            }
            self.handler.on_connectivity(true);
        }
        if acceptance.deliver {
            self.handler.on_frame(payload.to_vec());
        }
    }

    fn apply_signal(&self, signal: SenderSignal) {
        match signal {
            SenderSignal::Connected => {
                tracing::debug!("send direction established");
                self.refresh_connected();
            }
            SenderSignal::ConnectionFailed => {
                tracing::warn!("retransmission attempts exhausted, connection lost");
                self.refresh_connected();
                self.handler.on_connectivity(false);
            }
        }
    }

    fn refresh_connected(&self) {
        let sender_up = self.sender.lock().is_connected();
        let receiver_up = self.receiver.lock().is_connected();
        self.link.set_connected(sender_up && receiver_up);
    }
}
