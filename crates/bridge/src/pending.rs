//! Waiting-acknowledgement bookkeeping for outbound packets.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

use crate::packet::WirePacket;
use crate::transport::PacketSink;

/// How long to wait for a REPLY before retransmitting
pub const RETRY_TIMEOUT: Duration = Duration::from_secs(5);
/// Total send attempts before a packet is dropped
pub const MAX_ATTEMPTS: u8 = 3;

/// Delivery state of one tracked packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    /// Sent `attempt` times, awaiting a matching REPLY
    Pending { attempt: u8 },
    /// A matching REPLY arrived
    Acked,
    /// Retries exhausted; the packet is dropped with no further action
    Failed,
}

struct PendingEntry {
    packet: WirePacket,
    state: DeliveryState,
    timer: Option<JoinHandle<()>>,
}

enum RetryAction {
    Resend(WirePacket),
    GiveUp,
    Stop,
}

/// Table of packets awaiting acknowledgement, keyed by packet id.
///
/// Each entry owns an explicit retry timer; the timer is cancelled exactly
/// when a matching REPLY arrives or when retries run out.
#[derive(Clone, Default)]
pub struct PendingTable {
    entries: Arc<Mutex<HashMap<Uuid, PendingEntry>>>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of packets currently awaiting acknowledgement
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Whether the given packet id is still awaiting acknowledgement
    pub fn contains(&self, id: Uuid) -> bool {
        self.lock().contains_key(&id)
    }

    /// Start tracking an already-sent packet, scheduling retransmissions
    /// through `sink` until acknowledged or exhausted
    pub fn track(&self, packet: WirePacket, sink: Arc<dyn PacketSink>) {
        let id = packet.id;
        self.lock().insert(
            id,
            PendingEntry {
                packet,
                state: DeliveryState::Pending { attempt: 1 },
                timer: None,
            },
        );

        let table = self.clone();
        let timer = tokio::spawn(async move {
            loop {
                tokio::time::sleep(RETRY_TIMEOUT).await;
                match table.next_retry(id) {
                    RetryAction::Resend(packet) => {
                        debug!(packet_id = %id, "retransmitting unacknowledged packet");
                        sink.send(&packet);
                    }
                    RetryAction::GiveUp => {
                        debug!(packet_id = %id, "retries exhausted, dropping packet");
                        return;
                    }
                    RetryAction::Stop => return,
                }
            }
        });

        let mut entries = self.lock();
        match entries.get_mut(&id) {
            Some(entry) => entry.timer = Some(timer),
            // acknowledged before the handle was stored
            None => timer.abort(),
        }
    }

    /// Resolve a REPLY: cancel the retry timer and stop tracking.
    ///
    /// Returns the original packet so the caller can react to what was
    /// acknowledged; `None` for unknown ids (a no-op by protocol).
    pub fn acknowledge(&self, id: Uuid) -> Option<WirePacket> {
        let mut entry = self.lock().remove(&id)?;
        entry.state = DeliveryState::Acked;
        if let Some(timer) = entry.timer.take() {
            timer.abort();
        }
        debug!(packet_id = %id, "packet acknowledged");
        Some(entry.packet)
    }

    /// Drop every tracked packet and cancel all retry timers
    pub fn clear(&self) {
        let mut entries = self.lock();
        for (_, mut entry) in entries.drain() {
            if let Some(timer) = entry.timer.take() {
                timer.abort();
            }
        }
    }

    fn next_retry(&self, id: Uuid) -> RetryAction {
        let mut entries = self.lock();
        let Some(entry) = entries.get_mut(&id) else {
            return RetryAction::Stop;
        };
        match entry.state {
            DeliveryState::Pending { attempt } if attempt < MAX_ATTEMPTS => {
                entry.state = DeliveryState::Pending {
                    attempt: attempt + 1,
                };
                RetryAction::Resend(entry.packet.clone())
            }
            DeliveryState::Pending { .. } => {
                entry.state = DeliveryState::Failed;
                entries.remove(&id);
                RetryAction::GiveUp
            }
            DeliveryState::Acked | DeliveryState::Failed => RetryAction::Stop,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, PendingEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
