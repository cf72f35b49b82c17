use cb_core::{CubistRegistry, MoveRejection};

use crate::config::FieldConfig;
use crate::error::{SimError, SimResult};
use crate::event::{ChangeEvent, ChangeFeed, ChangeKind};
use crate::field::{FieldSimulation, MoveOutcome};
use crate::intent::Intent;
use crate::snapshot::SessionSnapshot;

/// What applying one intent produced.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IntentReport {
    /// Committed events, in order. Empty for rejected or no-op intents.
    pub events: Vec<ChangeEvent>,
    /// Why a move was dropped, if it was.
    pub rejection: Option<MoveRejection>,
}

/// The top-level orchestrator of one replica.
///
/// Owns the configuration, roster, field and change feed. Intents are applied
/// one at a time in delivery order; each either commits its staged events as
/// a single batch or leaves every piece of state untouched.
pub struct Session {
    config: FieldConfig,
    registry: CubistRegistry,
    field: FieldSimulation,
    feed: ChangeFeed,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("participants", &self.registry.len())
            .field("blocks", &self.field.len())
            .field("next_seq", &self.feed.next_seq())
            .finish()
    }
}

impl Session {
    /// Start a session on a freshly seeded field.
    pub fn new(config: FieldConfig) -> SimResult<Self> {
        let field = FieldSimulation::seeded(&config)?;
        let feed = ChangeFeed::new(config.max_events);
        Ok(Self {
            config,
            registry: CubistRegistry::new(),
            field,
            feed,
        })
    }

    /// Rejoin the agreed state from a snapshot.
    pub fn restore(snapshot: SessionSnapshot) -> SimResult<Self> {
        let SessionSnapshot {
            config,
            roster,
            field,
            next_seq,
        } = snapshot;
        let registry = CubistRegistry::from_roster(roster)?;
        let field = FieldSimulation::restore(&config, field)?;
        for (index, block) in field.iter() {
            let Some(owner) = &block.owner else { continue };
            let claimable = registry.get(owner).is_some_and(|c| !c.is_spectator());
            if !claimable {
                return Err(SimError::Snapshot(format!(
                    "block at {index} owned by {owner}, who holds no identity"
                )));
            }
        }
        let feed = ChangeFeed::resume(config.max_events, next_seq);
        tracing::debug!(
            participants = registry.len(),
            blocks = field.len(),
            next_seq,
            "session restored"
        );
        Ok(Self {
            config,
            registry,
            field,
            feed,
        })
    }

    /// Capture everything another replica needs to catch up.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            config: self.config.clone(),
            roster: self.registry.iter().cloned().collect(),
            field: self.field.snapshot(),
            next_seq: self.feed.next_seq(),
        }
    }

    /// Apply one intent and commit its events.
    ///
    /// An `Err` means the field and the intent disagreed about the grid; the
    /// staged events are discarded and nothing is published.
    pub fn apply(&mut self, intent: &Intent) -> SimResult<IntentReport> {
        let result = self.execute(intent);
        self.settle(result)
    }

    /// Commit the staged events of a finished intent, or discard them.
    ///
    /// Consistency failures mean replicas can no longer be trusted to agree,
    /// so debug builds stop here.
    fn settle(&mut self, result: SimResult<Option<MoveRejection>>) -> SimResult<IntentReport> {
        match result {
            Ok(rejection) => Ok(IntentReport {
                events: self.feed.commit(),
                rejection,
            }),
            Err(e) => {
                self.feed.discard();
                debug_assert!(
                    !e.is_consistency_failure(),
                    "internal consistency failure: {e}"
                );
                Err(e)
            }
        }
    }

    fn execute(&mut self, intent: &Intent) -> SimResult<Option<MoveRejection>> {
        match intent {
            Intent::Join { participant } => {
                let outcome = self.registry.join(participant.clone());
                if outcome.changed() {
                    self.feed.stage(ChangeKind::RosterChanged);
                }
            }
            Intent::Leave { participant } => {
                if self.registry.contains(participant) {
                    self.field.release_owner(participant, &mut self.feed);
                    self.registry.leave(participant);
                    self.feed.stage(ChangeKind::RosterChanged);
                }
            }
            Intent::Rename { participant, name } => {
                if self.registry.rename(participant, name) {
                    self.feed.stage(ChangeKind::RosterChanged);
                }
            }
            Intent::Move {
                block,
                delta,
                participant,
            } => {
                let outcome = self.field.request_move(
                    &self.registry,
                    *block,
                    participant,
                    *delta,
                    &mut self.feed,
                )?;
                if let MoveOutcome::Rejected(reason) = outcome {
                    return Ok(Some(reason));
                }
            }
        }
        Ok(None)
    }

    /// Configuration the session runs with.
    pub fn config(&self) -> &FieldConfig {
        &self.config
    }

    /// Participants in join order.
    pub fn registry(&self) -> &CubistRegistry {
        &self.registry
    }

    /// The authoritative field.
    pub fn field(&self) -> &FieldSimulation {
        &self.field
    }

    /// The committed change log.
    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }
}

#[cfg(test)]
mod tests {
    use cb_core::{Block, BlockValue, CellIndex, Coord, Direction, Occupancy, ParticipantId};
    use proptest::prelude::*;

    use super::*;
    use crate::event::ChangeSink;
    use crate::mirror::FieldMirror;

    fn bare() -> Session {
        Session::new(FieldConfig::default().with_blocks_per_plane(0)).unwrap()
    }

    fn join(id: &str) -> Intent {
        Intent::Join {
            participant: id.into(),
        }
    }

    fn push(session: &Session, at: Coord, delta: Direction, who: &str) -> Intent {
        Intent::Move {
            block: session.field.grid().to_index(at).unwrap(),
            delta,
            participant: who.into(),
        }
    }

    fn kinds(report: &IntentReport) -> Vec<&ChangeKind> {
        report.events.iter().map(|e| &e.kind).collect()
    }

    #[test]
    fn new_session_seeds_field() {
        let session = Session::new(FieldConfig::default()).unwrap();
        assert_eq!(session.field().len(), 27);
        assert!(session.registry().is_empty());
        assert!(session.feed().is_empty());
    }

    #[test]
    fn locked_pair_cannot_move() {
        let mut s = bare();
        s.field.insert(Block::new(BlockValue(3), Coord::new(0, 0, 0)));
        s.field.insert(Block::new(BlockValue(3), Coord::new(1, 0, 0)));
        s.apply(&join("a")).unwrap();

        for at in [Coord::new(0, 0, 0), Coord::new(1, 0, 0)] {
            for d in Direction::ALL {
                let intent = push(&s, at, d, "a");
                let report = s.apply(&intent).unwrap();
                assert_eq!(report.rejection, Some(MoveRejection::Locked));
                assert!(report.events.is_empty());
            }
        }
    }

    #[test]
    fn isolated_move_claims_and_moves() {
        let mut s = bare();
        let from = s
            .field
            .insert(Block::new(BlockValue(3), Coord::new(4, 4, 4)));
        s.apply(&join("a")).unwrap();

        let intent = push(&s, Coord::new(4, 4, 4), Direction::PosX, "a");
        let report = s.apply(&intent).unwrap();
        let to = s.field.grid().to_index(Coord::new(5, 4, 4)).unwrap();
        assert_eq!(
            kinds(&report),
            vec![
                &ChangeKind::OwnershipChanged {
                    at: from,
                    owner: Some("a".into())
                },
                &ChangeKind::BlockMoved { from, to },
            ]
        );
        assert_eq!(report.events[0].seq + 1, report.events[1].seq);
        assert_eq!(s.field().get(to).unwrap().owner, Some("a".into()));
    }

    #[test]
    fn foreign_block_stays_put() {
        let mut s = bare();
        let at = s
            .field
            .insert(Block::new(BlockValue(3), Coord::new(4, 4, 4)));
        s.apply(&join("a")).unwrap();
        s.apply(&join("b")).unwrap();
        let claim = push(&s, Coord::new(4, 4, 4), Direction::PosY, "a");
        s.apply(&claim).unwrap();
        let owned = s.field().owned_by(&"a".into());
        assert_eq!(owned.len(), 1);
        assert_ne!(owned[0], at);

        let before = s.snapshot();
        let steal = push(&s, Coord::new(4, 5, 4), Direction::PosY, "b");
        let report = s.apply(&steal).unwrap();
        assert!(report.events.is_empty());
        assert_eq!(report.rejection, Some(MoveRejection::OwnedByOther));
        assert_eq!(s.snapshot(), before);
    }

    #[test]
    fn seventh_participant_is_spectator() {
        let mut s = bare();
        for i in 0..6 {
            let report = s.apply(&join(&format!("p{i}"))).unwrap();
            assert_eq!(kinds(&report), vec![&ChangeKind::RosterChanged]);
        }
        s.apply(&join("p6")).unwrap();
        let late = s.registry().get(&"p6".into()).unwrap();
        assert!(late.is_spectator());
        assert_eq!(s.registry().identity_count(), 6);

        let report = s
            .apply(&Intent::Leave {
                participant: "p6".into(),
            })
            .unwrap();
        assert_eq!(kinds(&report), vec![&ChangeKind::RosterChanged]);
        assert!(!s.registry().contains(&"p6".into()));
    }

    #[test]
    fn repeated_join_and_unknown_leave_are_silent() {
        let mut s = bare();
        s.apply(&join("a")).unwrap();
        assert!(s.apply(&join("a")).unwrap().events.is_empty());
        let report = s
            .apply(&Intent::Leave {
                participant: "ghost".into(),
            })
            .unwrap();
        assert!(report.events.is_empty());
    }

    #[test]
    fn rename_emits_roster_change() {
        let mut s = bare();
        s.apply(&join("a")).unwrap();
        let rename = Intent::Rename {
            participant: "a".into(),
            name: "Ada".into(),
        };
        let report = s.apply(&rename).unwrap();
        assert_eq!(kinds(&report), vec![&ChangeKind::RosterChanged]);
        assert_eq!(s.registry().get(&"a".into()).unwrap().display_name(), "Ada");
        assert!(s.apply(&rename).unwrap().events.is_empty());
    }

    #[test]
    fn leave_releases_owned_blocks_first() {
        let mut s = bare();
        s.field
            .insert(Block::new(BlockValue(3), Coord::new(2, 2, 2)));
        s.apply(&join("a")).unwrap();
        s.apply(&join("b")).unwrap();
        let claim = push(&s, Coord::new(2, 2, 2), Direction::PosZ, "a");
        s.apply(&claim).unwrap();
        let cell = s.field().owned_by(&"a".into())[0];

        let steal = push(&s, Coord::new(2, 2, 3), Direction::PosZ, "b");
        let report = s.apply(&steal).unwrap();
        assert_eq!(report.rejection, Some(MoveRejection::OwnedByOther));

        let report = s
            .apply(&Intent::Leave {
                participant: "a".into(),
            })
            .unwrap();
        assert_eq!(
            kinds(&report),
            vec![
                &ChangeKind::OwnershipChanged {
                    at: cell,
                    owner: None
                },
                &ChangeKind::RosterChanged,
            ]
        );
        assert!(s.field().get(cell).unwrap().owner.is_none());

        // The released block is now free for anyone to claim.
        let report = s.apply(&steal).unwrap();
        let to = s.field.grid().to_index(Coord::new(2, 2, 4)).unwrap();
        assert_eq!(report.rejection, None);
        assert_eq!(
            kinds(&report),
            vec![
                &ChangeKind::OwnershipChanged {
                    at: cell,
                    owner: Some("b".into())
                },
                &ChangeKind::BlockMoved { from: cell, to },
            ]
        );
        assert_eq!(s.field().owned_by(&"b".into()), vec![to]);
        assert!(s.field().get(cell).is_none());
    }

    #[test]
    fn merge_replicates_through_events() {
        let layout = [
            Coord::new(4, 4, 3),
            Coord::new(5, 4, 4),
            Coord::new(3, 4, 4),
            Coord::new(4, 5, 4),
        ];
        let mut replicas = [bare(), bare()];
        for s in &mut replicas {
            for at in layout {
                s.field.insert(Block::new(BlockValue(3), at));
            }
            s.apply(&join("a")).unwrap();
        }
        let mut mirror = FieldMirror::of(replicas[0].field());
        let intent = push(&replicas[0], layout[0], Direction::PosZ, "a");

        let [a, b] = &mut replicas;
        let ra = a.apply(&intent).unwrap();
        let rb = b.apply(&intent).unwrap();
        assert_eq!(ra, rb);

        let labels: Vec<&str> = ra.events.iter().map(|e| e.kind.label()).collect();
        assert_eq!(
            labels,
            vec![
                "ownership-changed",
                "block-moved",
                "block-removed",
                "block-removed",
                "block-removed",
                "block-added",
                "block-moved",
            ]
        );

        mirror.apply_all(&ra.events);
        assert!(mirror.faults().is_empty(), "{:?}", mirror.faults());
        assert!(mirror.agrees_with(a.field()));
        assert_eq!(a.snapshot(), b.snapshot());
        assert_eq!(a.field().len(), 2);
    }

    #[test]
    fn failed_intent_discards_staged_events() {
        let mut s = bare();
        s.feed.stage(ChangeKind::RosterChanged);
        let err = s
            .settle(Err(SimError::InvalidConfig("bad".into())))
            .unwrap_err();
        assert!(matches!(err, SimError::InvalidConfig(_)));
        assert!(s.feed().staged().is_empty());
        assert!(s.feed().is_empty());
        assert_eq!(s.feed().next_seq(), 0);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "internal consistency failure")]
    fn consistency_failure_is_fatal_in_debug() {
        let mut s = bare();
        let _ = s.settle(Err(SimError::MissingBlock(CellIndex(3))));
    }

    #[test]
    fn seq_continues_across_intents() {
        let mut s = bare();
        s.apply(&join("a")).unwrap();
        s.apply(&join("b")).unwrap();
        let seqs: Vec<u64> = s.feed().events().iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![0, 1]);
        assert_eq!(s.feed().next_seq(), 2);
    }

    #[test]
    fn snapshot_restores_identical_session() {
        let mut s = Session::new(FieldConfig::default().with_seed(9)).unwrap();
        s.apply(&join("a")).unwrap();
        let (cell, _) = s.field().iter().next().unwrap();
        s.apply(&Intent::Move {
            block: cell,
            delta: Direction::PosY,
            participant: "a".into(),
        })
        .unwrap();

        let json = s.snapshot().to_json().unwrap();
        let restored = Session::restore(SessionSnapshot::from_json(&json).unwrap()).unwrap();
        assert_eq!(restored.snapshot(), s.snapshot());
        assert_eq!(restored.feed().next_seq(), s.feed().next_seq());
    }

    #[test]
    fn restore_rejects_unknown_owner() {
        let mut s = bare();
        let mut block = Block::new(BlockValue(3), Coord::new(1, 1, 1));
        block.owner = Some("ghost".into());
        s.field.insert(block);
        let err = Session::restore(s.snapshot()).unwrap_err();
        assert!(matches!(err, SimError::Snapshot(_)));
    }

    /// Op kinds: 0 join, 1 leave, 2 rename, 3-4 random push, 5-7 push toward
    /// the most crowded landing cell.
    fn intent_for(op: (u8, u8, usize, usize), s: &Session) -> Intent {
        let (kind, who, pick, dir) = op;
        let participant = ParticipantId::new(format!("p{who}"));
        let cells: Vec<_> = s.field().iter().map(|(i, _)| i).collect();
        match kind {
            1 => Intent::Leave { participant },
            2 => Intent::Rename {
                participant,
                name: format!("n{pick}"),
            },
            3.. if !cells.is_empty() => {
                let block = cells[pick % cells.len()];
                let delta = if kind >= 5 {
                    crowded_direction(s, block).unwrap_or(Direction::ALL[dir])
                } else {
                    Direction::ALL[dir]
                };
                Intent::Move {
                    block,
                    delta,
                    participant,
                }
            }
            _ => Intent::Join { participant },
        }
    }

    /// The push from `block` whose free landing cell touches the most other
    /// blocks, if any landing cell touches one.
    fn crowded_direction(s: &Session, block: CellIndex) -> Option<Direction> {
        let field = s.field();
        let grid = field.grid();
        let from = field.get(block)?.position;
        let mut best = None;
        let mut most = 0;
        for d in Direction::ALL {
            let Some(to) = grid.to_index(from.step(d)) else {
                continue;
            };
            if field.is_occupied(to) {
                continue;
            }
            let contacts = grid
                .neighbors(from.step(d))
                .filter(|n| *n != block && field.is_occupied(*n))
                .count();
            if contacts > most {
                most = contacts;
                best = Some(d);
            }
        }
        best
    }

    fn check_invariants(s: &Session) {
        let grid = s.field().grid();
        for (index, block) in s.field().iter() {
            assert_eq!(grid.to_index(block.position), Some(index));
            if let Some(owner) = &block.owner {
                assert!(s.field().owned_by(owner).contains(&index));
                let cubist = s.registry().get(owner).unwrap();
                assert!(!cubist.is_spectator());
            }
        }
        assert!(s.registry().identity_count() <= 6);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn random_intents_keep_invariants(
            seed in any::<u64>(),
            ops in prop::collection::vec((0u8..8, 0u8..8, 0usize..64, 0usize..6), 1..80),
        ) {
            // A small, crowded field so pushes regularly form contacts and merge.
            let config = FieldConfig::default()
                .with_seed(seed)
                .with_width(5)
                .with_blocks_per_plane(4);
            let mut a = Session::new(config.clone()).unwrap();
            let mut b = Session::new(config).unwrap();
            let mut mirror = FieldMirror::of(a.field());

            for op in ops {
                let intent = intent_for(op, &a);
                let ra = a.apply(&intent).unwrap();
                let rb = b.apply(&intent).unwrap();
                prop_assert_eq!(&ra, &rb);
                mirror.apply_all(&ra.events);
                check_invariants(&a);
            }

            prop_assert_eq!(a.snapshot(), b.snapshot());
            prop_assert!(mirror.faults().is_empty(), "{:?}", mirror.faults());
            prop_assert!(mirror.agrees_with(a.field()));
        }
    }
}
