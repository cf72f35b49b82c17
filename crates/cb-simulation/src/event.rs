use cb_core::{BlockValue, CellIndex, ParticipantId};
use serde::{Deserialize, Serialize};

/// What changed. The view layer applies these in order to its replica.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ChangeKind {
    /// A block changed cell.
    BlockMoved {
        /// Cell the block left.
        from: CellIndex,
        /// Cell the block now occupies.
        to: CellIndex,
    },
    /// A new block appeared.
    BlockAdded {
        /// Cell of the new block.
        at: CellIndex,
        /// Its value.
        value: BlockValue,
    },
    /// A block was consumed.
    BlockRemoved {
        /// Cell the block was removed from.
        at: CellIndex,
    },
    /// A block's owner was claimed or cleared.
    OwnershipChanged {
        /// Cell of the block at the time of the change.
        at: CellIndex,
        /// The new owner, `None` when cleared.
        owner: Option<ParticipantId>,
    },
    /// The participant set or an identity changed.
    RosterChanged,
}

impl ChangeKind {
    /// Wire name of the event.
    pub fn label(&self) -> &'static str {
        match self {
            Self::BlockMoved { .. } => "block-moved",
            Self::BlockAdded { .. } => "block-added",
            Self::BlockRemoved { .. } => "block-removed",
            Self::OwnershipChanged { .. } => "ownership-changed",
            Self::RosterChanged => "roster-changed",
        }
    }
}

/// A committed change with its position in the session's event order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Session-wide sequence number, gap-free across commits.
    pub seq: u64,
    /// The change itself.
    #[serde(flatten)]
    pub kind: ChangeKind,
}

/// A consumer of committed change events.
pub trait ChangeSink {
    /// Apply one event.
    fn apply(&mut self, event: &ChangeEvent);

    /// Apply a committed batch in order.
    fn apply_all(&mut self, events: &[ChangeEvent]) {
        for event in events {
            self.apply(event);
        }
    }
}

/// Stages events while an intent executes and publishes them on commit.
///
/// Nothing staged is visible until [`commit`](Self::commit); a rejected or
/// failed intent calls [`discard`](Self::discard) instead.
#[derive(Debug, Default)]
pub struct ChangeFeed {
    staged: Vec<ChangeKind>,
    log: Vec<ChangeEvent>,
    next_seq: u64,
    max_events: usize,
}

impl ChangeFeed {
    /// Create a feed whose log keeps at most `max_events` (0 = unlimited).
    pub fn new(max_events: usize) -> Self {
        Self {
            max_events,
            ..Self::default()
        }
    }

    /// Create a feed that continues numbering at `next_seq`.
    pub fn resume(max_events: usize, next_seq: u64) -> Self {
        Self {
            next_seq,
            ..Self::new(max_events)
        }
    }

    /// Queue an event for the current intent.
    pub fn stage(&mut self, kind: ChangeKind) {
        self.staged.push(kind);
    }

    /// Events queued by the current intent.
    pub fn staged(&self) -> &[ChangeKind] {
        &self.staged
    }

    /// Drop everything staged by the current intent.
    pub fn discard(&mut self) {
        self.staged.clear();
    }

    /// Number the staged events, append them to the log, and return them.
    pub fn commit(&mut self) -> Vec<ChangeEvent> {
        let batch: Vec<ChangeEvent> = self
            .staged
            .drain(..)
            .map(|kind| {
                let seq = self.next_seq;
                self.next_seq += 1;
                ChangeEvent { seq, kind }
            })
            .collect();

        self.log.extend(batch.iter().cloned());
        if self.max_events > 0 && self.log.len() > self.max_events {
            let drain_count = self.log.len() - self.max_events;
            self.log.drain(..drain_count);
        }
        batch
    }

    /// Sequence number the next committed event will receive.
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    /// Committed events still retained by the log.
    pub fn events(&self) -> &[ChangeEvent] {
        &self.log
    }

    /// Number of retained events.
    pub fn len(&self) -> usize {
        self.log.len()
    }

    /// Whether no events are retained.
    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }
}
