use burn::{
    nn::{conv::Conv2d, Relu},
    prelude::*,
};

use super::{
    weights::{conv2d, he_stddev},
    ConvPadding,
};

/// `convolutions` stacked `conv -> relu` layers.
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    convs: Vec<Conv2d<B>>,
    relu: Relu,
}

impl<B: Backend> ConvBlock<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.convs
            .iter()
            .fold(x, |x, conv| self.relu.forward(conv.forward(x)))
    }
}

#[derive(Config, Debug)]
pub struct ConvBlockConfig {
    in_channels: usize,
    out_channels: usize,
    filter_size: usize,
    convolutions: usize,
    padding: ConvPadding,
}

impl ConvBlockConfig {
    /// The first convolution maps to `out_channels`, the others keep it.
    pub fn init<B: Backend>(&self, device: &B::Device) -> ConvBlock<B> {
        let convs = (0..self.convolutions)
            .map(|i| {
                let in_channels = if i == 0 {
                    self.in_channels
                } else {
                    self.out_channels
                };
                conv2d(
                    [in_channels, self.out_channels],
                    self.filter_size,
                    self.padding,
                    he_stddev(self.filter_size, in_channels),
                    device,
                )
            })
            .collect();

        ConvBlock {
            convs,
            relu: Relu::new(),
        }
    }
}
