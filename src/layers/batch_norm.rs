use burn::{
    config::Config,
    module::{Module, Param, RunningState},
    nn::Initializer,
    tensor::{backend::Backend, Tensor},
};

/// Batch normalization over the channel axis of `[batch, channels, height, width]` tensors.
///
/// Unlike `burn::nn::BatchNorm`, the mode is picked by an explicit `training` flag
/// rather than by the backend, so one flag can switch a whole network.
#[derive(Module, Debug)]
pub struct BatchNorm<B: Backend> {
    gamma: Param<Tensor<B, 1>>,
    beta: Param<Tensor<B, 1>>,
    running_mean: RunningState<Tensor<B, 1>>,
    running_var: RunningState<Tensor<B, 1>>,
    momentum: f64,
    epsilon: f64,
}

impl<B: Backend> BatchNorm<B> {
    pub fn forward(&self, x: Tensor<B, 4>, training: bool) -> Tensor<B, 4> {
        let channels = x.dims()[1];

        let (mean, var) = if training {
            self.batch_statistics(x.clone())
        } else {
            (self.running_mean.value_sync(), self.running_var.value_sync())
        };

        let mean = mean.reshape([1, channels, 1, 1]);
        let std = var.add_scalar(self.epsilon).sqrt().reshape([1, channels, 1, 1]);
        let gamma = self.gamma.val().reshape([1, channels, 1, 1]);
        let beta = self.beta.val().reshape([1, channels, 1, 1]);

        (x - mean) / std * gamma + beta
    }

    /// Per-channel mean and variance of the batch; updates the moving averages.
    fn batch_statistics(&self, x: Tensor<B, 4>) -> (Tensor<B, 1>, Tensor<B, 1>) {
        let [batch, channels, height, width] = x.dims();
        let flat = x.swap_dims(0, 1).reshape([channels, batch * height * width]);

        let mean = flat.clone().mean_dim(1);
        let var = (flat - mean.clone()).powf_scalar(2.0).mean_dim(1);
        let mean = mean.reshape([channels]);
        let var = var.reshape([channels]);

        let decay = self.momentum;
        self.running_mean.update(
            self.running_mean.value_sync().mul_scalar(decay)
                + mean.clone().detach().mul_scalar(1.0 - decay),
        );
        self.running_var.update(
            self.running_var.value_sync().mul_scalar(decay)
                + var.clone().detach().mul_scalar(1.0 - decay),
        );

        (mean, var)
    }
}

#[derive(Config, Debug)]
pub struct BatchNormConfig {
    channels: usize,
    /// Decay of the moving averages used in inference mode.
    #[config(default = 0.999)]
    momentum: f64,
    #[config(default = 1e-3)]
    epsilon: f64,
}

impl BatchNormConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> BatchNorm<B> {
        BatchNorm {
            gamma: Initializer::Ones.init([self.channels], device),
            beta: Initializer::Zeros.init([self.channels], device),
            running_mean: RunningState::new(Tensor::zeros([self.channels], device)),
            running_var: RunningState::new(Tensor::ones([self.channels], device)),
            momentum: self.momentum,
            epsilon: self.epsilon,
        }
    }
}
