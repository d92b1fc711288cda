//! # Sender Engine
//!
//! Sequence-numbered outbound queue with acknowledgment tracking,
//! RTT-adaptive retransmission and the SYN handshake.
//!
//! ## Design
//!
//! - Pure state machine: bytes leave through the injected [`Wire`], time
//!   advances only through [`Sender::on_tick`]
//! - Every outbound item stays queued until its ack is observed
//! - Exhausting [`MAX_ATTEMPTS`] on any item declares the connection dead
//!   exactly once

use std::collections::VecDeque;

use crate::sequence::{next, DEFAULT_SRTT, MAX_ATTEMPTS, PERIOD, RTT_BIAS, RTT_SMOOTH, SYN};

/// Where the engine's bytes go. The link layer prepends the session header
/// and performs the actual socket write; engines never see sockets.
pub trait Wire: Send + Sync {
    /// Ships one inner frame (payload + trailing sequence byte, or a
    /// 1-byte ack). Transport faults are the implementor's to report;
    /// nothing propagates back into the engine.
    fn transmit(&self, bytes: &[u8]);
}

impl<W: Wire + ?Sized> Wire for std::sync::Arc<W> {
    fn transmit(&self, bytes: &[u8]) {
        (**self).transmit(bytes);
    }
}

/// Connection lifecycle of one direction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LinkState {
    /// No handshake in flight.
    #[default]
    Disconnected,
    /// SYN sent, ack pending.
    Connecting,
    /// SYN acknowledged.
    Connected,
}

/// Out-of-band outcomes surfaced by the engine to its owner.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SenderSignal {
    /// The SYN frame was acknowledged.
    Connected,
    /// An item exhausted its attempts; the session is dead. Raised at most
    /// once per connection attempt.
    ConnectionFailed,
}

/// One queued outbound frame awaiting acknowledgment.
#[derive(Clone, Debug)]
struct PendingItem {
    seq: u8,
    /// Ready-to-retransmit inner frame (payload + trailing seq byte).
    frame: Vec<u8>,
    acked: bool,
    attempt: u32,
    next_repeat: u32,
    start_rtt: u32,
}

/// The reliable sender for one connection.
pub struct Sender<W: Wire> {
    wire: W,
    state: LinkState,
    seq: u8,
    ticks: u32,
    srtt: f32,
    pending: VecDeque<PendingItem>,
    failure_raised: bool,
}

impl<W: Wire> Sender<W> {
    /// Creates a disconnected sender writing to `wire`.
    pub fn new(wire: W) -> Self {
        Self {
            wire,
            state: LinkState::Disconnected,
            seq: SYN,
            ticks: 0,
            srtt: DEFAULT_SRTT,
            pending: VecDeque::new(),
            failure_raised: false,
        }
    }

    /// Current lifecycle state.
    #[inline]
    #[must_use]
    pub const fn state(&self) -> LinkState {
        self.state
    }

    /// True once the SYN has been acknowledged.
    #[inline]
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        matches!(self.state, LinkState::Connected)
    }

    /// Smoothed RTT estimate in ticks.
    #[inline]
    #[must_use]
    pub const fn srtt(&self) -> f32 {
        self.srtt
    }

    /// Starts (or restarts) the handshake: queue and transmit the SYN
    /// frame with sequence 0. Anything still pending from a previous
    /// connection is discarded.
    pub fn connect(&mut self) {
        self.state = LinkState::Connecting;
        self.seq = SYN;
        self.srtt = DEFAULT_SRTT;
        self.pending.clear();
        self.failure_raised = false;
        // A 1-byte frame would read as an ack, so the SYN carries one
        // padding byte the receiver ignores.
        self.enqueue(SYN, vec![0, SYN]);
    }

    /// Queues `payload` for reliable delivery and transmits it. A sender
    /// that was never connected starts the handshake first.
    pub fn send(&mut self, payload: &[u8]) {
        if matches!(self.state, LinkState::Disconnected) {
            self.connect();
        }
        self.seq = next(self.seq);
        let mut frame = Vec::with_capacity(payload.len() + 1);
        frame.extend_from_slice(payload);
        frame.push(self.seq);
        self.enqueue(self.seq, frame);
    }

    fn enqueue(&mut self, seq: u8, frame: Vec<u8>) {
        self.wire.transmit(&frame);
        self.pending.push_back(PendingItem {
            seq,
            frame,
            acked: false,
            attempt: 1,
            next_repeat: self.ticks + PERIOD,
            start_rtt: self.ticks,
        });
    }

    /// Records an acknowledgment for `seq`: marks the item delivered and
    /// feeds its round trip into the smoothed RTT estimate.
    pub fn on_ack(&mut self, seq: u8) -> Option<SenderSignal> {
        let mut signal = None;
        if let Some(item) = self.pending.iter_mut().find(|i| i.seq == seq && !i.acked) {
            item.acked = true;
            let sample = (self.ticks - item.start_rtt) as f32;
            self.srtt = RTT_SMOOTH * self.srtt + (1.0 - RTT_SMOOTH) * sample + RTT_BIAS;
            if seq == SYN {
                self.state = LinkState::Connected;
                signal = Some(SenderSignal::Connected);
            }
        }
        while self.pending.front().is_some_and(|i| i.acked) {
            self.pending.pop_front();
        }
        signal
    }

    /// Advances time by one tick and retransmits every due item.
    ///
    /// Returns [`SenderSignal::ConnectionFailed`] the first time an item
    /// runs out of attempts; the queue is dropped and the state returns to
    /// [`LinkState::Disconnected`], so the signal cannot repeat.
    pub fn on_tick(&mut self) -> Option<SenderSignal> {
        self.ticks += 1;
        let period = self.retry_period();
        let mut exhausted = false;
        for item in self.pending.iter_mut() {
            if item.acked || self.ticks < item.next_repeat {
                continue;
            }
            if item.attempt >= MAX_ATTEMPTS {
                exhausted = true;
                break;
            }
            item.attempt += 1;
            item.next_repeat = self.ticks + period;
            self.wire.transmit(&item.frame);
        }
        if exhausted {
            self.state = LinkState::Disconnected;
            self.pending.clear();
            if !self.failure_raised {
                self.failure_raised = true;
                return Some(SenderSignal::ConnectionFailed);
            }
        }
        None
    }

    /// Drops all connection state (sign-out path).
    pub fn reset(&mut self) {
        self.state = LinkState::Disconnected;
        self.seq = SYN;
        self.srtt = DEFAULT_SRTT;
        self.pending.clear();
        self.failure_raised = false;
    }

    fn retry_period(&self) -> u32 {
        self.srtt.max(DEFAULT_SRTT) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct RecordingWire {
        frames: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    impl Wire for RecordingWire {
        fn transmit(&self, bytes: &[u8]) {
            self.frames.lock().unwrap().push(bytes.to_vec());
        }
    }

    impl RecordingWire {
        fn sent(&self) -> Vec<Vec<u8>> {
            self.frames.lock().unwrap().clone()
        }
    }

    #[test]
    fn test_connect_sends_syn() {
        let wire = RecordingWire::default();
        let mut sender = Sender::new(wire.clone());
        sender.connect();
        assert_eq!(sender.state(), LinkState::Connecting);
        assert_eq!(wire.sent(), vec![vec![0, SYN]]);
    }

    #[test]
    fn test_syn_ack_connects() {
        let wire = RecordingWire::default();
        let mut sender = Sender::new(wire);
        sender.connect();
        assert_eq!(sender.on_ack(SYN), Some(SenderSignal::Connected));
        assert!(sender.is_connected());
    }

    #[test]
    fn test_send_appends_sequence_and_skips_syn() {
        let wire = RecordingWire::default();
        let mut sender = Sender::new(wire.clone());
        sender.connect();
        sender.on_ack(SYN);
        sender.send(&[9, 9]);
        // First data frame carries sequence 1 (0 is reserved).
        assert_eq!(wire.sent().last().unwrap(), &vec![9, 9, 1]);
        // 255 more sends wrap around without ever emitting sequence 0.
        for _ in 0..255 {
            sender.send(&[7]);
        }
        assert!(wire.sent().iter().skip(1).all(|f| *f.last().unwrap() != SYN));
    }

    #[test]
    fn test_retransmits_until_acked() {
        let wire = RecordingWire::default();
        let mut sender = Sender::new(wire.clone());
        sender.connect();
        sender.on_ack(SYN);
        sender.send(&[5]);
        let before = wire.sent().len();
        // First retry falls due after PERIOD ticks.
        for _ in 0..PERIOD {
            assert_eq!(sender.on_tick(), None);
        }
        assert_eq!(wire.sent().len(), before + 1);
        sender.on_ack(1);
        for _ in 0..10 * PERIOD {
            sender.on_tick();
        }
        assert_eq!(wire.sent().len(), before + 1);
    }

    #[test]
    fn test_exhausted_attempts_fail_exactly_once() {
        let wire = RecordingWire::default();
        let mut sender = Sender::new(wire.clone());
        sender.connect();
        let mut failures = 0;
        for _ in 0..4000 {
            if sender.on_tick() == Some(SenderSignal::ConnectionFailed) {
                failures += 1;
            }
        }
        assert_eq!(failures, 1);
        assert_eq!(sender.state(), LinkState::Disconnected);
        // MAX_ATTEMPTS transmissions total: the original plus the retries.
        assert_eq!(wire.sent().len() as u32, MAX_ATTEMPTS);
    }

    #[test]
    fn test_rtt_smoothing_follows_samples() {
        let wire = RecordingWire::default();
        let mut sender = Sender::new(wire);
        sender.connect();
        for _ in 0..4 {
            sender.on_tick();
        }
        // Sample of 4 ticks: 0.8*2 + 0.2*4 + 3 = 5.4
        sender.on_ack(SYN);
        assert!((sender.srtt() - 5.4).abs() < 1e-3);
    }
}
