//! # Receiver Engine
//!
//! Inbound sequence tracking: accept exactly the next expected number,
//! re-ack stale retransmissions, drop reordered frames so the peer's
//! retransmission closes the gap. The dispatcher behind this engine never
//! sees a duplicate and never sees frames out of order.

use crate::sequence::{after, next, SYN};

/// What to do with one inbound frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Acceptance {
    /// Sequence number to acknowledge, if any. Stale duplicates are
    /// re-acked (the peer keeps retransmitting until it hears one);
    /// reordered-ahead frames are not.
    pub ack: Option<u8>,
    /// True when the payload must be handed to the dispatcher. Never true
    /// twice for the same sequence number.
    pub deliver: bool,
    /// True when this frame was the peer's SYN - the receive direction is
    /// now established.
    pub established: bool,
}

/// Inbound half of the reliable layer.
#[derive(Debug, Default)]
pub struct Receiver {
    last: u8,
    connected: bool,
}

impl Receiver {
    /// Creates a receiver awaiting the peer's SYN.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True once the peer's SYN has been seen.
    #[inline]
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.connected
    }

    /// Classifies one inbound sequence number.
    pub fn on_msg(&mut self, seq: u8) -> Acceptance {
        if seq == SYN {
            // Peer (re)established its sending direction; restart the
            // acceptance window from the top.
            self.last = SYN;
            self.connected = true;
            return Acceptance {
                ack: Some(SYN),
                deliver: false,
                established: true,
            };
        }
        if !self.connected {
            // Data before any SYN; ignoring it forces the peer to retry
            // after its handshake lands.
            return Acceptance {
                ack: None,
                deliver: false,
                established: false,
            };
        }
        if seq == next(self.last) {
            self.last = seq;
            return Acceptance {
                ack: Some(seq),
                deliver: true,
                established: false,
            };
        }
        if !after(self.last, seq) {
            // At or behind the last accepted number: a retransmission of
            // something already delivered. The ack got lost; repeat it.
            return Acceptance {
                ack: Some(seq),
                deliver: false,
                established: false,
            };
        }
        // Ahead of the expected successor: a gap. Drop it unacked and let
        // the peer's retransmission fill the hole in order.
        Acceptance {
            ack: None,
            deliver: false,
            established: false,
        }
    }

    /// Forgets the peer (sign-out / reconnect path).
    pub fn reset(&mut self) {
        self.last = SYN;
        self.connected = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn syn_then(receiver: &mut Receiver) {
        let a = receiver.on_msg(SYN);
        assert!(a.established);
        assert_eq!(a.ack, Some(SYN));
        assert!(!a.deliver);
    }

    #[test]
    fn test_in_order_delivery() {
        let mut r = Receiver::new();
        syn_then(&mut r);
        for seq in 1..=5u8 {
            let a = r.on_msg(seq);
            assert!(a.deliver, "seq {seq} must deliver");
            assert_eq!(a.ack, Some(seq));
        }
    }

    #[test]
    fn test_duplicate_delivered_once_acked_twice() {
        let mut r = Receiver::new();
        syn_then(&mut r);
        let first = r.on_msg(1);
        assert!(first.deliver);
        assert_eq!(first.ack, Some(1));
        let dup = r.on_msg(1);
        assert!(!dup.deliver);
        assert_eq!(dup.ack, Some(1));
    }

    #[test]
    fn test_gap_dropped_without_ack() {
        let mut r = Receiver::new();
        syn_then(&mut r);
        r.on_msg(1);
        let skipped = r.on_msg(3);
        assert!(!skipped.deliver);
        assert_eq!(skipped.ack, None);
        // Retransmission arrives in order and everything proceeds.
        assert!(r.on_msg(2).deliver);
        assert!(r.on_msg(3).deliver);
    }

    #[test]
    fn test_stale_retransmission_reacked() {
        let mut r = Receiver::new();
        syn_then(&mut r);
        for seq in 1..=4u8 {
            r.on_msg(seq);
        }
        let stale = r.on_msg(2);
        assert!(!stale.deliver);
        assert_eq!(stale.ack, Some(2));
    }

    #[test]
    fn test_data_before_syn_ignored() {
        let mut r = Receiver::new();
        let a = r.on_msg(1);
        assert!(!a.deliver);
        assert_eq!(a.ack, None);
        assert!(!r.is_connected());
    }

    #[test]
    fn test_syn_resets_window() {
        let mut r = Receiver::new();
        syn_then(&mut r);
        for seq in 1..=10u8 {
            r.on_msg(seq);
        }
        // Peer restarted: new SYN, then the cycle begins at 1 again.
        syn_then(&mut r);
        assert!(r.on_msg(1).deliver);
    }
}
