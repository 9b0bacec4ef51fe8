use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::view::ViewId;

pub type Result<T> = std::result::Result<T, ViewerError>;

/// Axis of the k-space volume a selector index refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexAxis {
    Time,
    Slice,
    Coil,
}

impl fmt::Display for IndexAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IndexAxis::Time => "time",
            IndexAxis::Slice => "slice",
            IndexAxis::Coil => "coil",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum ViewerError {
    /// Source volume could not be read or failed validation. Any previously
    /// loaded volume is left untouched.
    #[error("failed to load volume from {path:?}: {reason}")]
    LoadFailure { path: PathBuf, reason: String },

    /// Selector index outside the volume bounds. Callers clamp before
    /// reaching the engine, so this signals a programming error.
    #[error("{axis} index {index} out of bounds (len {len})")]
    IndexError {
        axis: IndexAxis,
        index: usize,
        len: usize,
    },

    #[error("no mosaic layout fits {coil_count} tiles in a {width}x{height} viewport")]
    LayoutInfeasible {
        coil_count: usize,
        width: u32,
        height: u32,
    },

    #[error("invalid volume shape: {0}")]
    InvalidShape(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("no volume loaded")]
    NoVolume,

    #[error("unknown view {0:?}")]
    UnknownView(ViewId),
}

impl ViewerError {
    pub(crate) fn load(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        ViewerError::LoadFailure {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
