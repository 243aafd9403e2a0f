use std::{fmt, str::FromStr};

use burn::tensor::{activation, backend::Backend, Tensor};

use crate::error::UnetError;

/// Nonlinearity used inside the residual blocks of the parameter-efficient U-Net.
///
/// Parsed case-insensitively, so `"ReLU"`, `"relu"` and `"RELU"` are all accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Activation {
    Relu,
    /// Concatenated ReLU: `relu(cat([x, -x]))`, doubling the channel count.
    CRelu,
}

impl Activation {
    /// Modules keep the activation as a plain flag; this restores it.
    pub(crate) fn from_concatenated(concatenated: bool) -> Self {
        if concatenated {
            Self::CRelu
        } else {
            Self::Relu
        }
    }

    pub(crate) fn is_concatenated(&self) -> bool {
        matches!(self, Self::CRelu)
    }

    /// Factor by which the activation multiplies the channel count.
    pub fn channel_factor(&self) -> usize {
        match self {
            Self::Relu => 1,
            Self::CRelu => 2,
        }
    }

    /// Applies the activation to a channel-leading `[batch, channels, height, width]` tensor.
    pub fn forward<B: Backend>(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        match self {
            Self::Relu => activation::relu(x),
            Self::CRelu => activation::relu(Tensor::cat(vec![x.clone(), x.neg()], 1)),
        }
    }
}

impl FromStr for Activation {
    type Err = UnetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "relu" => Ok(Self::Relu),
            "crelu" => Ok(Self::CRelu),
            _ => Err(UnetError::InvalidActivation { name: s.to_string() }),
        }
    }
}

impl TryFrom<String> for Activation {
    type Error = UnetError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Activation> for String {
    fn from(value: Activation) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Relu => f.write_str("ReLU"),
            Self::CRelu => f.write_str("cReLU"),
        }
    }
}
