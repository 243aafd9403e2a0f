use burn::{nn::pool::MaxPool2d, prelude::*};
use log::{debug, info};

use crate::{
    error::UnetError,
    graph::{Controls, Graph, Network, PlaceholderShapes},
    layers::{
        conv_block::{ConvBlock, ConvBlockConfig},
        dropout, max_pool,
        upconv::{UpconvConcat, UpconvConcatConfig},
        ConvPadding,
    },
    path::{assemble, Cell, Contracted, Topology},
    scope::Scope,
    segmentation_head::{SegmentationHead, SegmentationHeadConfig},
    shape::output_side_length,
};

use super::POOL_SIZE;

#[derive(Module, Debug)]
pub struct UpStage<B: Backend> {
    upconv: UpconvConcat<B>,
    conv: ConvBlock<B>,
}

/// The standard U-Net: plain convolution blocks joined by concatenating skip connections.
#[derive(Module, Debug)]
pub struct Unet<B: Backend> {
    contracting: Vec<ConvBlock<B>>,
    bottom: ConvBlock<B>,
    expanding: Vec<UpStage<B>>,
    pool: MaxPool2d,
    head: SegmentationHead<B>,
}

impl<B: Backend> Unet<B> {
    /// Number of max pooling layers.
    pub fn depth(&self) -> usize {
        self.contracting.len()
    }
}

struct UnetPass<'a, B: Backend> {
    net: &'a Unet<B>,
    keep_prob: f64,
}

impl<B: Backend> Cell for UnetPass<'_, B> {
    type Handle = Tensor<B, 4>;

    fn contract(&self, stage: usize, input: Tensor<B, 4>) -> Contracted<Tensor<B, 4>> {
        let conv = self.net.contracting[stage].forward(input);
        let pooled = self.net.pool.forward(conv.clone());

        Contracted {
            bottom: dropout(pooled, self.keep_prob),
            side: conv,
        }
    }

    fn bottom(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        self.net.bottom.forward(input)
    }

    fn expand(&self, stage: usize, bottom: Tensor<B, 4>, side: Tensor<B, 4>) -> Tensor<B, 4> {
        let stage = &self.net.expanding[stage];
        let concat = stage.upconv.forward(bottom, side);
        stage.conv.forward(dropout(concat, self.keep_prob))
    }
}

impl<B: Backend> Network for Unet<B> {
    type Backend = B;

    fn forward(&self, inputs: Tensor<B, 4>, controls: &Controls) -> Tensor<B, 4> {
        let pass = UnetPass {
            net: self,
            keep_prob: controls.keep_prob(),
        };
        let x = assemble(&pass, self.depth(), inputs.permute([0, 3, 1, 2]));
        self.head.forward(x)
    }
}

#[derive(Config, Debug)]
pub struct UnetConfig {
    /// Channels of the input image.
    #[config(default = 1)]
    pub in_channels: usize,
    /// Number of classes.
    #[config(default = 2)]
    pub out_channels: usize,
    /// Filters of the first convolution block; doubled at every stage going down.
    #[config(default = 64)]
    pub start_filters: usize,
    /// Side length of the square input.
    #[config(default = 572)]
    pub side_length: usize,
    /// Number of max pooling layers.
    #[config(default = 4)]
    pub depth: usize,
    /// Convolutions per stage.
    #[config(default = 2)]
    pub convolutions: usize,
    #[config(default = 3)]
    pub filter_size: usize,
    /// Integer class labels if true, one-hot labels otherwise.
    #[config(default = true)]
    pub sparse_labels: bool,
    #[config(default = 1)]
    pub batch_size: usize,
    #[config(default = "ConvPadding::Valid")]
    pub padding: ConvPadding,
}

impl UnetConfig {
    /// Side length of the logits, or the reason this geometry cannot be built.
    pub fn output_side_length(&self) -> Result<usize, UnetError> {
        for (name, value) in [
            ("in_channels", self.in_channels),
            ("out_channels", self.out_channels),
            ("start_filters", self.start_filters),
            ("side_length", self.side_length),
            ("depth", self.depth),
            ("convolutions", self.convolutions),
            ("filter_size", self.filter_size),
            ("batch_size", self.batch_size),
        ] {
            UnetError::require_positive(name, value)?;
        }
        self.padding.check_filter_size(self.filter_size)?;

        Ok(output_side_length(
            self.side_length,
            self.depth + 1,
            self.convolutions,
            self.padding.erosion(self.filter_size) + 1,
            POOL_SIZE,
        )?)
    }

    /// Builds the network under the `unet` namespace.
    pub fn build<B: Backend>(&self, device: &B::Device) -> Result<Graph<Unet<B>>, UnetError> {
        self.build_in(Scope::root("unet"), device)
    }

    pub fn build_in<B: Backend>(
        &self,
        scope: Scope,
        device: &B::Device,
    ) -> Result<Graph<Unet<B>>, UnetError> {
        let out_side = self.output_side_length()?;

        let placeholders = PlaceholderShapes {
            batch_size: self.batch_size,
            in_side: self.side_length,
            in_channels: self.in_channels,
            out_side,
            out_channels: self.out_channels,
            sparse_labels: self.sparse_labels,
        }
        .declare(&scope);

        let topology = Topology::new(&scope, self.depth);
        let network = self.init(&topology, device);
        info!(
            "built {scope} with {} parameters, output side length {out_side}",
            network.num_params()
        );

        Ok(Graph {
            inputs: placeholders.inputs,
            network,
            ground_truth: placeholders.ground_truth,
            keep_prob: placeholders.keep_prob,
            training: None,
            topology,
        })
    }

    fn conv_block<B: Backend>(
        &self,
        name: &str,
        channels: [usize; 2],
        device: &B::Device,
    ) -> ConvBlock<B> {
        debug!("{name}: conv block {} -> {} channels", channels[0], channels[1]);
        ConvBlockConfig::new(
            channels[0],
            channels[1],
            self.filter_size,
            self.convolutions,
            self.padding,
        )
        .init(device)
    }

    fn init<B: Backend>(&self, topology: &Topology, device: &B::Device) -> Unet<B> {
        let mut in_channels = self.in_channels;
        let mut out_channels = self.start_filters;

        let mut contracting = Vec::with_capacity(self.depth);
        for name in &topology.contracting {
            contracting.push(self.conv_block(name, [in_channels, out_channels], device));
            in_channels = out_channels;
            out_channels *= 2;
        }

        let bottom = self.conv_block(&topology.bottom, [in_channels, out_channels], device);
        in_channels = out_channels;

        let mut expanding = Vec::with_capacity(self.depth);
        for name in &topology.expanding {
            expanding.push(UpStage {
                upconv: UpconvConcatConfig::new(in_channels)
                    .with_pool_size(POOL_SIZE)
                    .init(device),
                conv: self.conv_block(name, [in_channels, in_channels / 2], device),
            });
            in_channels /= 2;
        }

        Unet {
            contracting,
            bottom,
            expanding,
            pool: max_pool(POOL_SIZE),
            head: SegmentationHeadConfig::new(in_channels, self.out_channels).init(device),
        }
    }
}
