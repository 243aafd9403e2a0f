use burn::{
    module::Param,
    nn::{
        conv::{Conv2d, Conv2dConfig, ConvTranspose2d, ConvTranspose2dConfig},
        Initializer,
    },
    tensor::{backend::Backend, Tensor},
};

use super::ConvPadding;

/// Every bias starts slightly positive so ReLUs are active at initialization.
pub const BIAS_INIT: f64 = 0.1;

/// He-normal standard deviation for a `kernel_size × kernel_size` filter over `in_channels`.
pub fn he_stddev(kernel_size: usize, in_channels: usize) -> f64 {
    (2.0 / (kernel_size * kernel_size * in_channels) as f64).sqrt()
}

pub fn weight_initializer(stddev: f64) -> Initializer {
    Initializer::Normal {
        mean: 0.0,
        std: stddev,
    }
}

pub fn bias_variable<B: Backend>(channels: usize, device: &B::Device) -> Param<Tensor<B, 1>> {
    Initializer::Constant { value: BIAS_INIT }.init([channels], device)
}

/// Stride-1 convolution with normal weights of the given deviation and a constant bias.
pub fn conv2d<B: Backend>(
    channels: [usize; 2],
    kernel_size: usize,
    padding: ConvPadding,
    stddev: f64,
    device: &B::Device,
) -> Conv2d<B> {
    let mut conv = Conv2dConfig::new(channels, [kernel_size, kernel_size])
        .with_padding(padding.config())
        .with_initializer(weight_initializer(stddev))
        .init(device);
    conv.bias = Some(bias_variable(channels[1], device));
    conv
}

/// Depthwise convolution: one filter group per input channel, `multiplier` outputs each.
pub fn depthwise_conv2d<B: Backend>(
    channels: usize,
    multiplier: usize,
    kernel_size: usize,
    device: &B::Device,
) -> Conv2d<B> {
    Conv2dConfig::new([channels, channels * multiplier], [kernel_size, kernel_size])
        .with_groups(channels)
        .with_padding(ConvPadding::Same.config())
        .with_initializer(weight_initializer(he_stddev(kernel_size, 1)))
        .with_bias(false)
        .init(device)
}

/// Transposed convolution upsampling by `factor` in both spatial dimensions.
pub fn upconv2d<B: Backend>(
    channels: [usize; 2],
    factor: usize,
    device: &B::Device,
) -> ConvTranspose2d<B> {
    let mut conv = ConvTranspose2dConfig::new(channels, [factor, factor])
        .with_stride([factor, factor])
        .with_initializer(weight_initializer(he_stddev(factor, channels[0])))
        .init(device);
    conv.bias = Some(bias_variable(channels[1], device));
    conv
}
