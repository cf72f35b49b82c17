use crate::cubist::ParticipantId;
use crate::grid::CellIndex;

/// Alias for `Result<T, CbError>`.
pub type CbResult<T> = Result<T, CbError>;

/// Errors raised by the core data model.
#[derive(Debug, thiserror::Error)]
pub enum CbError {
    /// A delta vector that is not one of the six unit face normals.
    #[error("not a unit face direction: ({0}, {1}, {2})")]
    InvalidDirection(i32, i32, i32),

    /// A field width the linear index cannot address.
    #[error("field width {0} outside supported range 2..=64")]
    InvalidWidth(u32),

    /// A linear index past the end of the field.
    #[error("cell {index} outside a field of width {width}")]
    IndexOutOfRange {
        /// The offending index.
        index: CellIndex,
        /// Width of the field it was checked against.
        width: u32,
    },

    /// A participant appears twice in a restored roster.
    #[error("duplicate participant in roster: {0}")]
    DuplicateParticipant(ParticipantId),

    /// A restored roster hands the same palette color to two cubists.
    #[error("palette color {0} assigned more than once")]
    DuplicateColor(u8),
}
