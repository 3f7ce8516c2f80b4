//! Control ↔ render hand-off
//!
//! Two SPSC ring buffers connect the threads:
//! - commands carry fully built chains and processors to the render thread
//! - retirements carry replaced or removed ones back, so they are dropped on
//!   the control thread instead of inside the callback

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use rtrb::{Consumer, Producer, PushError, RingBuffer};

use crate::insert_chain::{MAX_INSERT_SLOTS, TrackChain};
use crate::processor::InsertProcessor;

/// Structural change for the render thread, applied at the top of a callback
pub enum RenderCommand {
    AttachChain {
        lane: usize,
        chain: Box<TrackChain>,
    },
    DetachChain {
        lane: usize,
    },
    Install {
        lane: usize,
        slot: usize,
        processor: Box<dyn InsertProcessor>,
    },
    Remove {
        lane: usize,
        slot: usize,
    },
}

impl std::fmt::Debug for RenderCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AttachChain { lane, chain } => f
                .debug_struct("AttachChain")
                .field("lane", lane)
                .field("track", &chain.track_id())
                .finish(),
            Self::DetachChain { lane } => f.debug_struct("DetachChain").field("lane", lane).finish(),
            Self::Install {
                lane,
                slot,
                processor,
            } => f
                .debug_struct("Install")
                .field("lane", lane)
                .field("slot", slot)
                .field("processor", &processor.kind())
                .finish(),
            Self::Remove { lane, slot } => f
                .debug_struct("Remove")
                .field("lane", lane)
                .field("slot", slot)
                .finish(),
        }
    }
}

/// Object handed back for deallocation on the control thread
pub enum Retired {
    Chain(Box<TrackChain>),
    Processor(Box<dyn InsertProcessor>),
}

/// Counters published by the render thread
#[derive(Debug, Default)]
pub struct RenderStats {
    blocks_rendered: AtomicU64,
    commands_applied: AtomicU64,
    retire_overflows: AtomicU64,
}

/// Point-in-time copy of [`RenderStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStatsSnapshot {
    pub blocks_rendered: u64,
    pub commands_applied: u64,
    /// Objects dropped on the render thread because the retire queue was full
    pub retire_overflows: u64,
}

impl RenderStats {
    pub(crate) fn block_rendered(&self) {
        self.blocks_rendered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn command_applied(&self) {
        self.commands_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn retire_overflow(&self) {
        self.retire_overflows.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RenderStatsSnapshot {
        RenderStatsSnapshot {
            blocks_rendered: self.blocks_rendered.load(Ordering::Relaxed),
            commands_applied: self.commands_applied.load(Ordering::Relaxed),
            retire_overflows: self.retire_overflows.load(Ordering::Relaxed),
        }
    }
}

/// Render-side end of the retire queue
pub(crate) struct RetireSink {
    producer: Producer<Retired>,
    stats: Arc<RenderStats>,
}

impl RetireSink {
    pub(crate) fn new(producer: Producer<Retired>, stats: Arc<RenderStats>) -> Self {
        Self { producer, stats }
    }

    /// Queue an object for the control thread; dropped in place if the queue is full
    #[inline]
    pub(crate) fn retire(&mut self, item: Retired) {
        if let Err(PushError::Full(item)) = self.producer.push(item) {
            self.stats.retire_overflow();
            drop(item);
        }
    }

    pub(crate) fn stats(&self) -> &RenderStats {
        &self.stats
    }
}

/// Both ends of both queues
pub(crate) struct Queues {
    pub commands_tx: Producer<RenderCommand>,
    pub commands_rx: Consumer<RenderCommand>,
    pub retired_tx: Producer<Retired>,
    pub retired_rx: Consumer<Retired>,
    pub retire_capacity: usize,
}

impl Queues {
    /// Room for a fully loaded chain on every track plus one queue's worth
    /// of transitions.
    ///
    /// Every retired item is an object the control side handed over and has
    /// not reclaimed yet. The engine keeps that count within
    /// `retire_capacity`, so a retirement always finds room.
    pub(crate) fn new(command_capacity: usize, max_tracks: usize) -> Self {
        let (commands_tx, commands_rx) = RingBuffer::new(command_capacity);
        let retire_capacity = command_capacity + 1 + max_tracks * (MAX_INSERT_SLOTS + 1);
        let (retired_tx, retired_rx) = RingBuffer::new(retire_capacity);
        Self {
            commands_tx,
            commands_rx,
            retired_tx,
            retired_rx,
            retire_capacity,
        }
    }
}

impl Retired {
    /// Objects this item returns: the item itself plus any processors inside it
    pub(crate) fn object_count(&self) -> usize {
        match self {
            Self::Chain(chain) => 1 + chain.held_processors(),
            Self::Processor(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::create_kind;
    use crate::processor::ProcessorKind;

    #[test]
    fn test_retire_overflow_is_counted() {
        let (tx, mut rx) = RingBuffer::new(1);
        let stats = Arc::new(RenderStats::default());
        let mut sink = RetireSink::new(tx, Arc::clone(&stats));

        sink.retire(Retired::Processor(create_kind(ProcessorKind::Gate, 48000.0)));
        sink.retire(Retired::Processor(create_kind(ProcessorKind::Gate, 48000.0)));
        assert_eq!(sink.stats().snapshot().retire_overflows, 1);
        assert!(rx.pop().is_ok());
        assert!(rx.pop().is_err());
    }

    #[test]
    fn test_queue_sizes() {
        let queues = Queues::new(16, 2);
        assert_eq!(queues.commands_tx.slots(), 16);
        assert_eq!(queues.retired_tx.slots(), 16 + 1 + 2 * 9);
        assert_eq!(queues.retire_capacity, 16 + 1 + 2 * 9);
    }

    #[test]
    fn test_retired_chain_counts_its_processors() {
        let mut chain = Box::new(TrackChain::new(1, 64, 240));
        for slot in 0..3 {
            if let Some(s) = chain.slot_mut(slot) {
                assert!(s.install(create_kind(ProcessorKind::Gate, 48000.0)).is_none());
            }
        }
        assert_eq!(Retired::Chain(chain).object_count(), 4);
        let single = Retired::Processor(create_kind(ProcessorKind::Delay, 48000.0));
        assert_eq!(single.object_count(), 1);
    }
}
