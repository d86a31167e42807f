//! World-level errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorldError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed coordinate key: {0:?}")]
    BadCoordinate(String),

    #[error("tile grid is {rows}x{cols}, expected {expected}x{expected}")]
    BadTileGrid {
        rows: usize,
        cols: usize,
        expected: usize,
    },
}
