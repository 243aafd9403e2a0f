use burn::tensor::{backend::Backend, Tensor};

use crate::{error::UnetError, path::Topology, scope::Scope};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Float,
    Int,
    Bool,
}

/// Named, typed slot the caller feeds when running a network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub name: String,
    pub kind: ElementKind,
    pub shape: Vec<usize>,
}

impl Placeholder {
    pub fn new(name: String, kind: ElementKind, shape: Vec<usize>) -> Self {
        Self { name, kind, shape }
    }

    /// Checks that a fed tensor has exactly this placeholder's shape.
    pub fn check(&self, dims: &[usize]) -> Result<(), UnetError> {
        if self.shape != dims {
            return Err(UnetError::ShapeMismatch {
                name: self.name.clone(),
                expected: self.shape.clone(),
                actual: dims.to_vec(),
            });
        }
        Ok(())
    }
}

/// Runtime values for the keep probability and training-mode placeholders.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Controls {
    keep_prob: f64,
    training: bool,
}

impl Controls {
    /// No dropout, batch normalization in inference mode.
    pub fn inference() -> Self {
        Self {
            keep_prob: 1.0,
            training: false,
        }
    }

    pub fn training(keep_prob: f64) -> Result<Self, UnetError> {
        if !(keep_prob > 0.0 && keep_prob <= 1.0) {
            return Err(UnetError::InvalidKeepProb(keep_prob));
        }
        Ok(Self {
            keep_prob,
            training: true,
        })
    }

    pub fn keep_prob(&self) -> f64 {
        self.keep_prob
    }

    /// Whether batch normalization uses batch statistics.
    pub fn is_training(&self) -> bool {
        self.training
    }
}

/// A network mapping channel-last inputs to channel-last logits.
pub trait Network {
    type Backend: Backend;

    fn forward(
        &self,
        inputs: Tensor<Self::Backend, 4>,
        controls: &Controls,
    ) -> Tensor<Self::Backend, 4>;
}

/// Everything a builder hands to its caller.
#[derive(Debug)]
pub struct Graph<M> {
    pub inputs: Placeholder,
    /// Produces the logits, before any softmax.
    pub network: M,
    pub ground_truth: Placeholder,
    pub keep_prob: Placeholder,
    /// Only present for networks with batch normalization.
    pub training: Option<Placeholder>,
    pub topology: Topology,
}

impl<M: Network> Graph<M> {
    /// Feeds `inputs` through the network after checking them against the input placeholder.
    pub fn logits(
        &self,
        inputs: Tensor<M::Backend, 4>,
        controls: &Controls,
    ) -> Result<Tensor<M::Backend, 4>, UnetError> {
        self.inputs.check(&inputs.dims())?;
        Ok(self.network.forward(inputs, controls))
    }
}

/// Geometry of the input and label placeholders.
pub(crate) struct PlaceholderShapes {
    pub batch_size: usize,
    pub in_side: usize,
    pub in_channels: usize,
    pub out_side: usize,
    pub out_channels: usize,
    pub sparse_labels: bool,
}

pub(crate) struct Placeholders {
    pub inputs: Placeholder,
    pub ground_truth: Placeholder,
    pub keep_prob: Placeholder,
    pub training: Placeholder,
}

impl PlaceholderShapes {
    pub fn declare(&self, scope: &Scope) -> Placeholders {
        let scope = scope.child("inputs");
        let (batch, side) = (self.batch_size, self.out_side);

        let ground_truth = if self.sparse_labels {
            Placeholder::new(scope.name("labels"), ElementKind::Int, vec![batch, side, side])
        } else {
            Placeholder::new(
                scope.name("labels"),
                ElementKind::Float,
                vec![batch, side, side, self.out_channels],
            )
        };

        Placeholders {
            inputs: Placeholder::new(
                scope.name("inputs"),
                ElementKind::Float,
                vec![batch, self.in_side, self.in_side, self.in_channels],
            ),
            ground_truth,
            keep_prob: Placeholder::new(scope.name("keep_prob"), ElementKind::Float, vec![]),
            training: Placeholder::new(scope.name("training"), ElementKind::Bool, vec![]),
        }
    }
}
