//! Outbound queue and transmission stamping

use crate::core::message::{Message, OutboundMessage};
use chrono::{DateTime, SubsecRound, Utc};
use std::collections::VecDeque;
use tracing::warn;

/// FIFO of messages waiting for an open connection
///
/// Unbounded unless a capacity is configured. With a capacity, pushing onto
/// a full queue evicts the oldest entry and hands it back to the caller.
#[derive(Debug, Default)]
pub struct OutboundQueue {
    items: VecDeque<OutboundMessage>,
    capacity: Option<usize>,
}

impl OutboundQueue {
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            items: VecDeque::new(),
            capacity,
        }
    }

    /// Append to the tail, returning the evicted head if the queue was full
    pub fn push_back(&mut self, message: OutboundMessage) -> Option<OutboundMessage> {
        let evicted = match self.capacity {
            Some(capacity) if self.items.len() >= capacity => self.items.pop_front(),
            _ => None,
        };
        if let Some(ref dropped) = evicted {
            warn!(
                message_type = %dropped.kind,
                capacity = self.capacity.unwrap_or_default(),
                "Outbound queue full, evicting oldest message"
            );
        }
        self.items.push_back(message);
        evicted
    }

    /// Put a message back at the head after a failed write
    ///
    /// Never evicts: the message was already accepted once.
    pub fn push_front(&mut self, message: OutboundMessage) {
        self.items.push_front(message);
    }

    pub fn pop_front(&mut self) -> Option<OutboundMessage> {
        self.items.pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Assigns transmission timestamps
///
/// Timestamps are RFC 3339 UTC with microsecond precision and strictly
/// increasing for the lifetime of the stamper, even when the wall clock
/// stalls or steps backwards.
#[derive(Debug, Default)]
pub struct Stamper {
    last: Option<DateTime<Utc>>,
}

impl Stamper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_timestamp(&mut self) -> String {
        let now = Utc::now().trunc_subsecs(6);
        let stamp = match self.last {
            Some(last) if now <= last => last + chrono::Duration::microseconds(1),
            _ => now,
        };
        self.last = Some(stamp);
        stamp.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
    }

    pub fn stamp(&mut self, message: OutboundMessage) -> Message {
        let timestamp = self.next_timestamp();
        message.stamp(timestamp)
    }
}
