//! Error types raised while configuring and building a network.

use std::fmt;

use thiserror::Error;

/// Where along the U a side length became infeasible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageLocation {
    /// Contracting path, after the given number of max pooling layers.
    Contracting(usize),
    /// The bottom stage.
    Bottom,
    /// Expanding path, after the given number of up-sampling layers.
    Expanding(usize),
}

impl fmt::Display for StageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Contracting(pools) => {
                write!(f, "in contracting path after {pools} max pooling layers")
            }
            Self::Bottom => write!(f, "at bottom layer"),
            Self::Expanding(ups) => write!(f, "in expanding path after {ups} up-sampling layers"),
        }
    }
}

/// Infeasible input geometry, found by the shape calculator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeometryError {
    #[error("input side length too small: side length is {side_length} {location} plus {convolution} convolutions")]
    TooSmall {
        location: StageLocation,
        convolution: usize,
        side_length: i64,
    },

    #[error("side length {side_length} is not divisible by pool size {pool_size} before max pooling layer {}", .stage + 1)]
    NotDivisible {
        stage: usize,
        side_length: usize,
        pool_size: usize,
    },

    #[error("{name} must be at least 1")]
    ZeroParameter { name: &'static str },
}

/// Errors that can occur while building or feeding a U-Net.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UnetError {
    #[error("activation must be \"ReLU\" or \"cReLU\", got {name:?}")]
    InvalidActivation { name: String },

    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error("invalid network configuration: {name} = {value}")]
    InvalidParameter { name: &'static str, value: usize },

    #[error("same padding needs an odd filter size, got {0}")]
    EvenSameFilter(usize),

    #[error("keep probability must be in (0, 1], got {0}")]
    InvalidKeepProb(f64),

    #[error("shape mismatch for {name}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        name: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
}

impl UnetError {
    pub(crate) fn require_positive(name: &'static str, value: usize) -> Result<(), Self> {
        if value == 0 {
            return Err(Self::InvalidParameter { name, value });
        }
        Ok(())
    }
}
