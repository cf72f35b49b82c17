use cb_core::{CellIndex, Direction, ParticipantId};
use serde::{Deserialize, Serialize};

/// A request delivered to every replica in the same total order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum Intent {
    /// A participant connected.
    Join {
        /// Who joined.
        participant: ParticipantId,
    },
    /// A participant disconnected.
    Leave {
        /// Who left.
        participant: ParticipantId,
    },
    /// A cubist picked a new display name.
    Rename {
        /// Who is renaming.
        participant: ParticipantId,
        /// The requested name.
        name: String,
    },
    /// A participant pushed a block along a face normal.
    Move {
        /// Cell of the block being pushed.
        block: CellIndex,
        /// Push direction.
        delta: Direction,
        /// Who pushed.
        participant: ParticipantId,
    },
}

impl Intent {
    /// The participant issuing this intent.
    pub fn participant(&self) -> &ParticipantId {
        match self {
            Intent::Join { participant }
            | Intent::Leave { participant }
            | Intent::Rename { participant, .. }
            | Intent::Move { participant, .. } => participant,
        }
    }

    /// Parse a JSON array of intents, as written by a recorder or a test script.
    pub fn parse_script(json: &str) -> serde_json::Result<Vec<Intent>> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_script() {
        let script = r#"[
            {"intent": "join", "participant": "a"},
            {"intent": "rename", "participant": "a", "name": "Ada"},
            {"intent": "move", "block": 364, "delta": [1, 0, 0], "participant": "a"},
            {"intent": "leave", "participant": "a"}
        ]"#;
        let intents = Intent::parse_script(script).unwrap();
        assert_eq!(intents.len(), 4);
        assert_eq!(
            intents[2],
            Intent::Move {
                block: CellIndex(364),
                delta: Direction::PosX,
                participant: "a".into(),
            }
        );
        assert!(intents.iter().all(|i| i.participant().as_str() == "a"));
    }

    #[test]
    fn rejects_diagonal_delta() {
        let script = r#"[{"intent": "move", "block": 0, "delta": [1, 1, 0], "participant": "a"}]"#;
        assert!(Intent::parse_script(script).is_err());
    }
}
