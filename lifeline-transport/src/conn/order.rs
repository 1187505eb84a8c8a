//! Arrival-order reassembly of asynchronously decoded messages.
//!
//! Every inbound payload is assigned the next sequence number synchronously
//! at byte arrival, *before* asynchronous decoding begins. Decode
//! completions may land in any order; the buffer stores them under their
//! sequence number and releases only the contiguous prefix starting at the
//! next undelivered index. The cost is head-of-line blocking: a
//! slow-to-decode early message withholds delivery of later,
//! already-decoded messages.
//!
//! Sequence numbering persists across reconnects; only a new buffer resets
//! the counters.

use std::collections::HashMap;

/// Reassembles out-of-order decode completions into strict arrival order.
///
/// Slots hold `None` when a decode failed and the slot was released with
/// [`OrderingBuffer::skip`]; the hole is passed over without delivery so one
/// bad payload cannot block the stream forever.
pub struct OrderingBuffer<M> {
    pending: HashMap<u64, Option<M>>,
    next_seq: u64,
    next_deliver: u64,
}

impl<M> OrderingBuffer<M> {
    /// Create an empty buffer with counters at zero.
    pub fn new() -> Self {
        Self {
            pending: HashMap::new(),
            next_seq: 0,
            next_deliver: 0,
        }
    }

    /// Assign the next arrival sequence number.
    ///
    /// Call synchronously when the raw bytes arrive, before handing them to
    /// the decoder.
    pub fn assign_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    /// Record a completed decode and return every message now deliverable.
    ///
    /// The returned messages form the contiguous run starting at the next
    /// undelivered index, in arrival order; it is empty while an earlier
    /// message is still decoding.
    pub fn complete(&mut self, seq: u64, msg: M) -> Vec<M> {
        self.pending.insert(seq, Some(msg));
        self.drain_ready()
    }

    /// Release a slot whose decode failed, without delivering anything for
    /// it, and return any later messages unblocked by the release.
    pub fn skip(&mut self, seq: u64) -> Vec<M> {
        self.pending.insert(seq, None);
        self.drain_ready()
    }

    /// Number of completions held back waiting for an earlier message.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn drain_ready(&mut self) -> Vec<M> {
        let mut ready = Vec::new();
        while let Some(slot) = self.pending.remove(&self.next_deliver) {
            if let Some(msg) = slot {
                ready.push(msg);
            }
            self.next_deliver += 1;
        }
        ready
    }
}

impl<M> Default for OrderingBuffer<M> {
    fn default() -> Self {
        Self::new()
    }
}
