//! Primitive layers shared by both U-Net variants.
//!
//! All layers operate on channel-leading `[batch, channels, height, width]` tensors.

pub mod batch_norm;
pub mod conv_block;
pub mod res_block;
pub mod upconv;
pub mod weights;

use burn::{
    nn::{
        pool::{MaxPool2d, MaxPool2dConfig},
        PaddingConfig2d,
    },
    tensor::{backend::Backend, Distribution, Tensor},
};

use crate::error::UnetError;

/// Padding mode of the spatial convolutions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ConvPadding {
    /// Unpadded: every convolution removes `filter_size - 1` pixels per side length.
    Valid,
    /// Zero-padded: convolutions preserve the side length.
    Same,
}

impl ConvPadding {
    pub fn config(&self) -> PaddingConfig2d {
        match self {
            Self::Valid => PaddingConfig2d::Valid,
            Self::Same => PaddingConfig2d::Same,
        }
    }

    /// Side length lost by one convolution.
    pub fn erosion(&self, filter_size: usize) -> usize {
        match self {
            Self::Valid => filter_size - 1,
            Self::Same => 0,
        }
    }

    /// Same padding is symmetric, so it only exists for odd filters.
    pub fn check_filter_size(&self, filter_size: usize) -> Result<(), UnetError> {
        match self {
            Self::Same if filter_size % 2 == 0 => Err(UnetError::EvenSameFilter(filter_size)),
            _ => Ok(()),
        }
    }
}

pub fn max_pool(pool_size: usize) -> MaxPool2d {
    MaxPool2dConfig::new([pool_size, pool_size])
        .with_strides([pool_size, pool_size])
        .init()
}

/// Zeroes each element with probability `1 - keep_prob` and rescales the rest.
pub fn dropout<B: Backend>(x: Tensor<B, 4>, keep_prob: f64) -> Tensor<B, 4> {
    if keep_prob >= 1.0 {
        return x;
    }

    let mask = x.random_like(Distribution::Bernoulli(keep_prob));
    (x * mask).div_scalar(keep_prob)
}
