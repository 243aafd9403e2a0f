use burn::{
    config::Config,
    module::Module,
    nn::conv::Conv2d,
    tensor::{backend::Backend, Tensor},
};

use crate::layers::{
    weights::{conv2d, he_stddev},
    ConvPadding,
};

/// 1x1 convolution producing per-pixel class logits.
///
/// No activation is applied; the consumer applies softmax. Output is channel-last.
#[derive(Module, Debug)]
pub struct SegmentationHead<B: Backend> {
    conv: Conv2d<B>,
}

impl<B: Backend> SegmentationHead<B> {
    /// Maps `[batch, channels, height, width]` to `[batch, height, width, classes]`.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.conv.forward(x).permute([0, 2, 3, 1])
    }
}

#[derive(Config, Debug)]
pub struct SegmentationHeadConfig {
    in_channels: usize,
    out_channels: usize,
}

impl SegmentationHeadConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> SegmentationHead<B> {
        SegmentationHead {
            conv: conv2d(
                [self.in_channels, self.out_channels],
                1,
                ConvPadding::Valid,
                he_stddev(1, self.in_channels),
                device,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use burn::backend::NdArray;

    use super::*;

    #[test]
    fn logits_are_channel_last() {
        let device = Default::default();
        let head = SegmentationHeadConfig::new(6, 3).init::<NdArray>(&device);

        let logits = head.forward(Tensor::ones([2, 6, 5, 5], &device));

        assert_eq!(logits.dims(), [2, 5, 5, 3]);
    }
}
