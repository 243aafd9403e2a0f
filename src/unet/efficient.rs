use burn::{
    nn::{conv::Conv2d, pool::MaxPool2d},
    prelude::*,
};
use log::{debug, info};

use crate::{
    activation::Activation,
    error::UnetError,
    graph::{Controls, Graph, Network, PlaceholderShapes},
    layers::{
        batch_norm::{BatchNorm, BatchNormConfig},
        dropout, max_pool,
        res_block::{ResBlock, ResBlockConfig},
        upconv::{UpconvAdd, UpconvAddConfig},
        weights::{conv2d, he_stddev},
        ConvPadding,
    },
    path::{assemble, Cell, Contracted, Topology},
    scope::Scope,
    segmentation_head::{SegmentationHead, SegmentationHeadConfig},
    shape::output_side_length,
};

use super::POOL_SIZE;

/// First stage: two plain convolutions on the raw input, then one residual block.
#[derive(Module, Debug)]
pub struct Stem<B: Backend> {
    conv_in: Conv2d<B>,
    norm: Option<BatchNorm<B>>,
    crelu: bool,
    conv_out: Conv2d<B>,
    res_block: ResBlock<B>,
}

impl<B: Backend> Stem<B> {
    pub fn forward(&self, x: Tensor<B, 4>, training: bool) -> Tensor<B, 4> {
        let mut x = self.conv_in.forward(x);
        if let Some(norm) = &self.norm {
            x = norm.forward(x, training);
        }
        let activation = Activation::from_concatenated(self.crelu);
        let x = self.conv_out.forward(activation.forward(x));

        self.res_block.forward(x, training).merged()
    }
}

/// Residual blocks of one contracting or bottom stage.
///
/// The first block doubles the channels; its tiled input is added back after the last block.
#[derive(Module, Debug)]
pub struct ResidualStage<B: Backend> {
    blocks: Vec<ResBlock<B>>,
}

impl<B: Backend> ResidualStage<B> {
    pub fn forward(&self, x: Tensor<B, 4>, training: bool) -> Tensor<B, 4> {
        let mut blocks = self.blocks.iter();
        let Some(first) = blocks.next() else {
            return x;
        };

        let first = first.forward(x, training);
        let conv = blocks.fold(first.conv, |x, block| block.forward(x, training).merged());

        conv + first.shortcut
    }
}

#[derive(Module, Debug)]
pub struct ResidualUpStage<B: Backend> {
    upconv: UpconvAdd<B>,
    blocks: Vec<ResBlock<B>>,
}

impl<B: Backend> ResidualUpStage<B> {
    pub fn forward(
        &self,
        bottom: Tensor<B, 4>,
        side: Tensor<B, 4>,
        training: bool,
    ) -> Tensor<B, 4> {
        let x = self.upconv.forward(bottom, side);
        self.blocks
            .iter()
            .fold(x, |x, block| block.forward(x, training).merged())
    }
}

/// U-Net variant built from depthwise-separable residual blocks.
///
/// Every convolution is "same" padded and skip connections are added rather than
/// concatenated.
#[derive(Module, Debug)]
pub struct EfficientUnet<B: Backend> {
    stem: Stem<B>,
    /// Contracting stages after the stem.
    contracting: Vec<ResidualStage<B>>,
    bottom: ResidualStage<B>,
    expanding: Vec<ResidualUpStage<B>>,
    pool: MaxPool2d,
    head: SegmentationHead<B>,
}

impl<B: Backend> EfficientUnet<B> {
    /// Number of max pooling layers.
    pub fn depth(&self) -> usize {
        self.contracting.len() + 1
    }
}

struct EfficientPass<'a, B: Backend> {
    net: &'a EfficientUnet<B>,
    controls: &'a Controls,
}

impl<B: Backend> Cell for EfficientPass<'_, B> {
    type Handle = Tensor<B, 4>;

    fn contract(&self, stage: usize, input: Tensor<B, 4>) -> Contracted<Tensor<B, 4>> {
        let training = self.controls.is_training();
        let conv = match stage {
            0 => self.net.stem.forward(input, training),
            n => self.net.contracting[n - 1].forward(input, training),
        };
        let pooled = self.net.pool.forward(conv.clone());

        Contracted {
            bottom: dropout(pooled, self.controls.keep_prob()),
            side: dropout(conv, self.controls.keep_prob()),
        }
    }

    fn bottom(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let conv = self.net.bottom.forward(input, self.controls.is_training());
        dropout(conv, self.controls.keep_prob())
    }

    fn expand(&self, stage: usize, bottom: Tensor<B, 4>, side: Tensor<B, 4>) -> Tensor<B, 4> {
        let conv = self.net.expanding[stage].forward(bottom, side, self.controls.is_training());
        dropout(conv, self.controls.keep_prob())
    }
}

impl<B: Backend> Network for EfficientUnet<B> {
    type Backend = B;

    fn forward(&self, inputs: Tensor<B, 4>, controls: &Controls) -> Tensor<B, 4> {
        let pass = EfficientPass {
            net: self,
            controls,
        };
        let x = assemble(&pass, self.depth(), inputs.permute([0, 3, 1, 2]));
        self.head.forward(x)
    }
}

#[derive(Config, Debug)]
pub struct EfficientUnetConfig {
    /// Channels of the input image.
    #[config(default = 1)]
    pub in_channels: usize,
    /// Number of classes.
    #[config(default = 2)]
    pub out_channels: usize,
    /// Filters of the stem; doubled at every stage going down.
    #[config(default = 64)]
    pub start_filters: usize,
    /// Side length of the square input. Must be divisible by `2^depth`.
    #[config(default = 256)]
    pub side_length: usize,
    /// Number of max pooling layers.
    #[config(default = 4)]
    pub depth: usize,
    /// Residual blocks per stage.
    #[config(default = 2)]
    pub res_blocks: usize,
    #[config(default = 3)]
    pub filter_size: usize,
    #[config(default = true)]
    pub sparse_labels: bool,
    #[config(default = 1)]
    pub batch_size: usize,
    #[config(default = "Activation::CRelu")]
    pub activation: Activation,
    #[config(default = true)]
    pub batch_norm: bool,
}

impl EfficientUnetConfig {
    /// Sets the activation from its name, matched case-insensitively.
    pub fn with_activation_name(self, name: &str) -> Result<Self, UnetError> {
        Ok(self.with_activation(name.parse()?))
    }

    /// Checks the configuration; the logits keep the input side length.
    ///
    /// Every convolution is "same" padded, so `filter_size` must be odd.
    pub fn validate(&self) -> Result<(), UnetError> {
        for (name, value) in [
            ("in_channels", self.in_channels),
            ("out_channels", self.out_channels),
            ("start_filters", self.start_filters),
            ("side_length", self.side_length),
            ("depth", self.depth),
            ("res_blocks", self.res_blocks),
            ("filter_size", self.filter_size),
            ("batch_size", self.batch_size),
        ] {
            UnetError::require_positive(name, value)?;
        }
        ConvPadding::Same.check_filter_size(self.filter_size)?;

        output_side_length(self.side_length, self.depth + 1, 0, 1, POOL_SIZE)?;
        Ok(())
    }

    /// Builds the network under the `unet` namespace.
    pub fn build<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Result<Graph<EfficientUnet<B>>, UnetError> {
        self.build_in(Scope::root("unet"), device)
    }

    pub fn build_in<B: Backend>(
        &self,
        scope: Scope,
        device: &B::Device,
    ) -> Result<Graph<EfficientUnet<B>>, UnetError> {
        self.validate()?;

        let placeholders = PlaceholderShapes {
            batch_size: self.batch_size,
            in_side: self.side_length,
            in_channels: self.in_channels,
            out_side: self.side_length,
            out_channels: self.out_channels,
            sparse_labels: self.sparse_labels,
        }
        .declare(&scope);

        let topology = Topology::new(&scope, self.depth);
        let network = self.init(&topology, device);
        info!(
            "built {scope} ({} activation) with {} parameters",
            self.activation,
            network.num_params()
        );

        Ok(Graph {
            inputs: placeholders.inputs,
            network,
            ground_truth: placeholders.ground_truth,
            keep_prob: placeholders.keep_prob,
            training: Some(placeholders.training),
            topology,
        })
    }

    fn res_block<B: Backend>(
        &self,
        channels: usize,
        channel_multiplier: usize,
        device: &B::Device,
    ) -> ResBlock<B> {
        ResBlockConfig::new(channels, self.filter_size, self.activation)
            .with_channel_multiplier(channel_multiplier)
            .with_batch_norm(self.batch_norm)
            .init(device)
    }

    /// A doubling block followed by `res_blocks - 1` channel-preserving ones.
    fn residual_stage<B: Backend>(
        &self,
        name: &str,
        in_channels: usize,
        device: &B::Device,
    ) -> ResidualStage<B> {
        debug!(
            "{name}: {} residual blocks, {in_channels} -> {} channels",
            self.res_blocks,
            in_channels * 2
        );
        let blocks = (0..self.res_blocks)
            .map(|i| match i {
                0 => self.res_block(in_channels, 2, device),
                _ => self.res_block(in_channels * 2, 1, device),
            })
            .collect();

        ResidualStage { blocks }
    }

    fn stem<B: Backend>(&self, name: &str, device: &B::Device) -> Stem<B> {
        let filters = self.start_filters;
        let activated = filters * self.activation.channel_factor();
        debug!("{name}: stem {} -> {filters} channels", self.in_channels);

        Stem {
            conv_in: conv2d(
                [self.in_channels, filters],
                self.filter_size,
                ConvPadding::Same,
                he_stddev(self.filter_size, self.in_channels),
                device,
            ),
            norm: self
                .batch_norm
                .then(|| BatchNormConfig::new(filters).init(device)),
            crelu: self.activation.is_concatenated(),
            conv_out: conv2d(
                [activated, filters],
                self.filter_size,
                ConvPadding::Same,
                he_stddev(self.filter_size, activated),
                device,
            ),
            res_block: self.res_block(filters, 1, device),
        }
    }

    fn init<B: Backend>(&self, topology: &Topology, device: &B::Device) -> EfficientUnet<B> {
        let mut names = topology.contracting.iter();
        let stem = self.stem(names.next().map_or("", String::as_str), device);

        let mut channels = self.start_filters;
        let mut contracting = Vec::with_capacity(self.depth.saturating_sub(1));
        for name in names {
            contracting.push(self.residual_stage(name, channels, device));
            channels *= 2;
        }

        let bottom = self.residual_stage(&topology.bottom, channels, device);
        channels *= 2;

        let mut expanding = Vec::with_capacity(self.depth);
        for name in &topology.expanding {
            let side_channels = channels / 2;
            debug!("{name}: up-convolution {channels} -> {side_channels} channels");
            expanding.push(ResidualUpStage {
                upconv: UpconvAddConfig::new(channels, side_channels)
                    .with_pool_size(POOL_SIZE)
                    .init(device),
                blocks: (0..self.res_blocks)
                    .map(|_| self.res_block(side_channels, 1, device))
                    .collect(),
            });
            channels = side_channels;
        }

        EfficientUnet {
            stem,
            contracting,
            bottom,
            expanding,
            pool: max_pool(POOL_SIZE),
            head: SegmentationHeadConfig::new(channels, self.out_channels).init(device),
        }
    }
}
