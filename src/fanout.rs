//! Relay / fan-out
//!
//! Delivers one encoded frame to one or many connections. Each recipient is
//! handled independently: a full or closed queue is recorded for that
//! recipient and delivery continues with the rest. Nothing is retried.

use bytes::Bytes;

use crate::registry::ConnectionId;
use crate::session::{EnqueueError, Outbound};
use crate::stats::RelayMetrics;

/// Outcome of a fan-out
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Recipients the frame was queued for
    pub delivered: usize,
    /// Recipients that could not take the frame
    pub failed: Vec<(ConnectionId, EnqueueError)>,
}

impl Delivery {
    /// Whether every recipient took the frame
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    fn record(&mut self, session_id: ConnectionId, result: Result<(), EnqueueError>) {
        match result {
            Ok(()) => self.delivered += 1,
            Err(e) => self.failed.push((session_id, e)),
        }
    }
}

/// Queue a frame for a single connection
pub fn send_to(
    target: &Outbound,
    frame: Bytes,
    metrics: &RelayMetrics,
) -> Result<(), EnqueueError> {
    let len = frame.len();
    match target.try_send(frame) {
        Ok(()) => {
            metrics.frame_relayed(len);
            Ok(())
        }
        Err(e) => {
            metrics.frame_dropped();
            match e {
                EnqueueError::Full => tracing::warn!(
                    session_id = target.session_id(),
                    "Outbound queue full, frame dropped"
                ),
                EnqueueError::Closed => tracing::debug!(
                    session_id = target.session_id(),
                    "Connection closed, frame dropped"
                ),
            }
            Err(e)
        }
    }
}

/// Queue a frame for every target except `excluding`
///
/// The frame is reference counted, so all recipients share one allocation.
pub fn send_to_many<'a, I>(
    targets: I,
    frame: &Bytes,
    excluding: Option<ConnectionId>,
    metrics: &RelayMetrics,
) -> Delivery
where
    I: IntoIterator<Item = &'a Outbound>,
{
    let mut delivery = Delivery::default();

    for target in targets {
        if Some(target.session_id()) == excluding {
            continue;
        }
        delivery.record(target.session_id(), send_to(target, frame.clone(), metrics));
    }

    delivery
}

/// Queue a frame for every live connection except `excluding`
pub fn broadcast<'a, I>(
    live: I,
    frame: &Bytes,
    excluding: Option<ConnectionId>,
    metrics: &RelayMetrics,
) -> Delivery
where
    I: IntoIterator<Item = &'a Outbound>,
{
    send_to_many(live, frame, excluding, metrics)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_excludes_sender() {
        let metrics = RelayMetrics::new();
        let (a, mut rx_a) = Outbound::channel(1, 4);
        let (b, mut rx_b) = Outbound::channel(2, 4);
        let (c, mut rx_c) = Outbound::channel(3, 4);

        let frame = Bytes::from_static(b"Alice: Hello\n");
        let delivery = broadcast([&a, &b, &c], &frame, Some(1), &metrics);

        assert_eq!(delivery.delivered, 2);
        assert!(delivery.is_complete());
        assert!(rx_a.try_recv().is_err());
        assert_eq!(rx_b.try_recv().unwrap(), frame);
        assert_eq!(rx_c.try_recv().unwrap(), frame);
        assert_eq!(metrics.snapshot().bytes_relayed, 2 * frame.len() as u64);
    }

    #[test]
    fn test_failure_is_isolated() {
        let metrics = RelayMetrics::new();
        let (slow, _rx_slow) = Outbound::channel(1, 1);
        let (gone, rx_gone) = Outbound::channel(2, 4);
        let (ok, mut rx_ok) = Outbound::channel(3, 4);
        drop(rx_gone);

        // Fill the slow recipient's queue
        slow.try_send(Bytes::from_static(b"backlog\n")).unwrap();

        let frame = Bytes::from_static(b"GROUP FROM Team|Alice: hi\n");
        let delivery = send_to_many([&slow, &gone, &ok], &frame, None, &metrics);

        assert_eq!(delivery.delivered, 1);
        assert_eq!(
            delivery.failed,
            vec![(1, EnqueueError::Full), (2, EnqueueError::Closed)]
        );
        assert_eq!(rx_ok.try_recv().unwrap(), frame);
        assert_eq!(metrics.snapshot().frames_dropped, 2);
    }

    #[test]
    fn test_send_to_single() {
        let metrics = RelayMetrics::new();
        let (target, mut rx) = Outbound::channel(9, 1);

        send_to(&target, Bytes::from_static(b"PRIVATE FROM A: x\n"), &metrics).unwrap();
        assert_eq!(&rx.try_recv().unwrap()[..], b"PRIVATE FROM A: x\n");
    }
}
