use burn::{nn::conv::ConvTranspose2d, prelude::*};

use super::weights::upconv2d;

/// Crops the center `height × width` window out of `x`.
pub fn center_crop<B: Backend>(x: Tensor<B, 4>, height: usize, width: usize) -> Tensor<B, 4> {
    let [batch, channels, h, w] = x.dims();
    if h == height && w == width {
        return x;
    }

    let top = (h - height) / 2;
    let left = (w - width) / 2;
    x.slice([0..batch, 0..channels, top..top + height, left..left + width])
}

/// Upsamples the bottom input, halving its channels, and concatenates the cropped side input.
#[derive(Module, Debug)]
pub struct UpconvConcat<B: Backend> {
    upconv: ConvTranspose2d<B>,
}

impl<B: Backend> UpconvConcat<B> {
    pub fn forward(&self, bottom: Tensor<B, 4>, side: Tensor<B, 4>) -> Tensor<B, 4> {
        let up = self.upconv.forward(bottom);
        let [_, _, height, width] = up.dims();

        Tensor::cat(vec![up, center_crop(side, height, width)], 1)
    }
}

#[derive(Config, Debug)]
pub struct UpconvConcatConfig {
    in_channels: usize,
    #[config(default = 2)]
    pool_size: usize,
}

impl UpconvConcatConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> UpconvConcat<B> {
        UpconvConcat {
            upconv: upconv2d([self.in_channels, self.in_channels / 2], self.pool_size, device),
        }
    }
}

/// Upsamples the bottom input to the side input's channel count and adds the two.
#[derive(Module, Debug)]
pub struct UpconvAdd<B: Backend> {
    upconv: ConvTranspose2d<B>,
}

impl<B: Backend> UpconvAdd<B> {
    pub fn forward(&self, bottom: Tensor<B, 4>, side: Tensor<B, 4>) -> Tensor<B, 4> {
        self.upconv.forward(bottom) + side
    }
}

#[derive(Config, Debug)]
pub struct UpconvAddConfig {
    in_channels: usize,
    side_channels: usize,
    #[config(default = 2)]
    pool_size: usize,
}

impl UpconvAddConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> UpconvAdd<B> {
        UpconvAdd {
            upconv: upconv2d([self.in_channels, self.side_channels], self.pool_size, device),
        }
    }
}
