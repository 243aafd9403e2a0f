//! U-Net graph builders for semantic segmentation on top of `burn`.
//!
//! Two variants are provided: the standard [`unet::Unet`] built from plain convolution
//! blocks, and the parameter-efficient [`unet::EfficientUnet`] built from
//! depthwise-separable residual blocks. Both are assembled by the same contracting and
//! expanding routine in [`path`].

pub mod activation;
pub mod error;
pub mod graph;
pub mod layers;
pub mod path;
pub mod scope;
pub mod segmentation_head;
pub mod shape;
pub mod unet;

pub use activation::Activation;
pub use error::{GeometryError, StageLocation, UnetError};
pub use graph::{Controls, ElementKind, Graph, Network, Placeholder};
pub use shape::output_side_length;
pub use unet::{EfficientUnet, EfficientUnetConfig, Unet, UnetConfig};
