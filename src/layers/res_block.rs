use burn::{nn::conv::Conv2d, prelude::*};

use crate::activation::Activation;

use super::{
    batch_norm::{BatchNorm, BatchNormConfig},
    weights::{conv2d, depthwise_conv2d, he_stddev},
    ConvPadding,
};

/// Depthwise convolution followed by a 1x1 pointwise convolution.
#[derive(Module, Debug)]
pub struct SeparableConv<B: Backend> {
    depthwise: Conv2d<B>,
    pointwise: Conv2d<B>,
}

impl<B: Backend> SeparableConv<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.pointwise.forward(self.depthwise.forward(x))
    }
}

/// Pre-activation unit: `[batch norm] -> activation -> separable conv`.
#[derive(Module, Debug)]
pub struct ResUnit<B: Backend> {
    norm: Option<BatchNorm<B>>,
    crelu: bool,
    conv: SeparableConv<B>,
}

impl<B: Backend> ResUnit<B> {
    pub fn forward(&self, x: Tensor<B, 4>, training: bool) -> Tensor<B, 4> {
        let x = match &self.norm {
            Some(norm) => norm.forward(x, training),
            None => x,
        };
        let activation = Activation::from_concatenated(self.crelu);
        self.conv.forward(activation.forward(x))
    }
}

/// Output of a [ResBlock], before the residual addition.
#[derive(Debug, Clone)]
pub struct Residual<B: Backend> {
    pub conv: Tensor<B, 4>,
    /// The block input, tiled along channels to match `conv`.
    pub shortcut: Tensor<B, 4>,
}

impl<B: Backend> Residual<B> {
    pub fn merged(self) -> Tensor<B, 4> {
        self.conv + self.shortcut
    }
}

/// Residual block of depthwise-separable convolutions, "same" padded.
///
/// Maps `C` channels to `C * channel_multiplier`.
#[derive(Module, Debug)]
pub struct ResBlock<B: Backend> {
    units: Vec<ResUnit<B>>,
    channel_multiplier: usize,
}

impl<B: Backend> ResBlock<B> {
    pub fn forward(&self, x: Tensor<B, 4>, training: bool) -> Residual<B> {
        let shortcut = match self.channel_multiplier {
            1 => x.clone(),
            n => Tensor::cat(vec![x.clone(); n], 1),
        };
        let conv = self
            .units
            .iter()
            .fold(x, |x, unit| unit.forward(x, training));

        Residual { conv, shortcut }
    }
}

#[derive(Config, Debug)]
pub struct ResBlockConfig {
    in_channels: usize,
    filter_size: usize,
    activation: Activation,
    #[config(default = 1)]
    channel_multiplier: usize,
    #[config(default = 2)]
    depthwise_multiplier: usize,
    #[config(default = 2)]
    convolutions: usize,
    #[config(default = true)]
    batch_norm: bool,
}

impl ResBlockConfig {
    pub fn out_channels(&self) -> usize {
        self.in_channels * self.channel_multiplier
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> ResBlock<B> {
        let out_channels = self.out_channels();

        let units = (0..self.convolutions)
            .map(|i| {
                let in_channels = if i == 0 {
                    self.in_channels
                } else {
                    out_channels
                };
                let conv_channels = in_channels * self.activation.channel_factor();
                let hidden = conv_channels * self.depthwise_multiplier;

                ResUnit {
                    norm: self
                        .batch_norm
                        .then(|| BatchNormConfig::new(in_channels).init(device)),
                    crelu: self.activation.is_concatenated(),
                    conv: SeparableConv {
                        depthwise: depthwise_conv2d(
                            conv_channels,
                            self.depthwise_multiplier,
                            self.filter_size,
                            device,
                        ),
                        pointwise: conv2d(
                            [hidden, out_channels],
                            1,
                            ConvPadding::Same,
                            he_stddev(1, hidden),
                            device,
                        ),
                    },
                }
            })
            .collect();

        ResBlock {
            units,
            channel_multiplier: self.channel_multiplier,
        }
    }
}

#[cfg(test)]
mod tests {
    use burn::backend::NdArray;

    use super::*;

    #[test]
    fn doubling_block_tiles_its_input() {
        let device = Default::default();
        let block = ResBlockConfig::new(3, 3, Activation::CRelu)
            .with_channel_multiplier(2)
            .init::<NdArray>(&device);

        let x = Tensor::random([2, 3, 8, 8], burn::tensor::Distribution::Default, &device);
        let out = block.forward(x.clone(), true);

        assert_eq!(out.conv.dims(), [2, 6, 8, 8]);
        assert_eq!(out.shortcut.dims(), [2, 6, 8, 8]);
        assert_eq!(
            out.shortcut.clone().slice([0..2, 3..6, 0..8, 0..8]).into_data(),
            x.into_data()
        );
        assert_eq!(out.merged().dims(), [2, 6, 8, 8]);
    }

    #[test]
    fn plain_block_keeps_channels_without_batch_norm() {
        let device = Default::default();
        let config = ResBlockConfig::new(4, 3, Activation::Relu).with_batch_norm(false);
        let block = config.init::<NdArray>(&device);

        let out = block.forward(Tensor::ones([1, 4, 6, 6], &device), false);

        assert_eq!(config.out_channels(), 4);
        assert_eq!(out.merged().dims(), [1, 4, 6, 6]);
    }
}
