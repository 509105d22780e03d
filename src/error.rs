use thiserror::Error;

/// The one hard rejection in grid editing: the new span would cover part of
/// an existing note in the same lane.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("note at voice {voice} row {row} col {col} (len {length}) overlaps the note starting at col {existing_col}")]
pub struct OverlapError {
    pub voice: usize,
    pub row: usize,
    pub col: usize,
    pub length: usize,
    pub existing_col: usize,
}

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("project json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("project io: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum GridShapeError {
    #[error("expected {expected} voices, found {found}")]
    Voices { expected: usize, found: usize },

    #[error("voice {voice}: expected {expected} pitch rows, found {found}")]
    Rows { voice: usize, expected: usize, found: usize },

    #[error("voice {voice} row {row}: expected {expected} steps, found {found}")]
    Steps { voice: usize, row: usize, expected: usize, found: usize },

    #[error("grid has no steps")]
    Empty,

    #[error("voice {voice} row {row} col {col}: note length must be at least 1")]
    ZeroLength { voice: usize, row: usize, col: usize },
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("another export is already running")]
    Busy,

    #[error("render produced no audio")]
    EmptyRender,

    #[error("wav encoder: {0}")]
    Encode(#[from] hound::Error),

    #[error("export io: {0}")]
    Io(#[from] std::io::Error),
}
