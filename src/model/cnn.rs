//! CNN architecture for crop disease classification
//!
//! The model artifact loaded at startup is a burn record of this module.
//! Input is NCHW `[batch, 3, 128, 128]` with channels scaled to `[0, 1]`;
//! output is one logit per catalog class.

use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig, Dropout, DropoutConfig, Linear, LinearConfig, PaddingConfig2d,
        Relu,
    },
    tensor::{activation::softmax, backend::Backend, Tensor},
};

use crate::catalog::NUM_CLASSES;
use crate::inference::normalizer::INPUT_SIZE;

/// Hyperparameters the artifact was trained with
#[derive(Config, Debug)]
pub struct CropClassifierConfig {
    /// Number of output classes
    #[config(default = "39")]
    pub num_classes: usize,

    /// Input image size (square)
    #[config(default = "128")]
    pub input_size: usize,

    #[config(default = "0.3")]
    pub dropout_rate: f64,

    /// Number of input channels (3 for RGB)
    #[config(default = "3")]
    pub in_channels: usize,

    /// Filters in the first block; doubled by each following block
    #[config(default = "32")]
    pub base_filters: usize,

    /// Width of the hidden fully connected layer
    #[config(default = "256")]
    pub hidden_units: usize,
}

impl CropClassifierConfig {
    /// Configuration matching the label catalog and the image normalizer
    pub fn for_catalog() -> Self {
        Self::new()
            .with_num_classes(NUM_CLASSES)
            .with_input_size(INPUT_SIZE as usize)
    }

    /// Build a freshly initialized model
    pub fn init<B: Backend>(&self, device: &B::Device) -> CropClassifier<B> {
        CropClassifier::new(self, device)
    }
}

/// Conv2d -> BatchNorm -> ReLU -> 2x2 MaxPool
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    pub conv: Conv2d<B>,
    pub bn: BatchNorm<B>,
    pub relu: Relu,
    pub pool: MaxPool2d,
}

impl<B: Backend> ConvBlock<B> {
    pub fn new(in_channels: usize, out_channels: usize, device: &B::Device) -> Self {
        let conv = Conv2dConfig::new([in_channels, out_channels], [3, 3])
            .with_padding(PaddingConfig2d::Same)
            .init(device);

        Self {
            conv,
            bn: BatchNormConfig::new(out_channels).init(device),
            relu: Relu::new(),
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(x);
        let x = self.bn.forward(x);
        let x = self.relu.forward(x);
        self.pool.forward(x)
    }
}

/// Crop disease classifier
///
/// Four conv blocks (128 -> 64 -> 32 -> 16 -> 8 spatial), global average
/// pooling, then a two-layer head with dropout.
#[derive(Module, Debug)]
pub struct CropClassifier<B: Backend> {
    pub conv1: ConvBlock<B>,
    pub conv2: ConvBlock<B>,
    pub conv3: ConvBlock<B>,
    pub conv4: ConvBlock<B>,

    pub global_pool: AdaptiveAvgPool2d,

    pub fc1: Linear<B>,
    pub dropout: Dropout,
    pub fc2: Linear<B>,

    num_classes: usize,
}

impl<B: Backend> CropClassifier<B> {
    pub fn new(config: &CropClassifierConfig, device: &B::Device) -> Self {
        let base = config.base_filters;

        Self {
            conv1: ConvBlock::new(config.in_channels, base, device),
            conv2: ConvBlock::new(base, base * 2, device),
            conv3: ConvBlock::new(base * 2, base * 4, device),
            conv4: ConvBlock::new(base * 4, base * 8, device),
            global_pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            fc1: LinearConfig::new(base * 8, config.hidden_units).init(device),
            dropout: DropoutConfig::new(config.dropout_rate).init(),
            fc2: LinearConfig::new(config.hidden_units, config.num_classes).init(device),
            num_classes: config.num_classes,
        }
    }

    /// Logits of shape `[batch, num_classes]` for input `[batch, 3, H, W]`
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.conv1.forward(x);
        let x = self.conv2.forward(x);
        let x = self.conv3.forward(x);
        let x = self.conv4.forward(x);

        // [B, C, H, W] -> [B, C, 1, 1] -> [B, C]
        let x = self.global_pool.forward(x);
        let [batch_size, channels, _, _] = x.dims();
        let x = x.reshape([batch_size, channels]);

        let x = self.fc1.forward(x);
        let x = Relu::new().forward(x);
        let x = self.dropout.forward(x);
        self.fc2.forward(x)
    }

    /// Class probabilities (softmax over logits)
    pub fn forward_softmax(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        softmax(self.forward(x), 1)
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_classifier_output_shape() {
        let device = Default::default();
        let model = CropClassifierConfig::for_catalog().init::<TestBackend>(&device);

        let input = Tensor::<TestBackend, 4>::zeros([2, 3, 128, 128], &device);
        let output = model.forward(input);

        assert_eq!(output.dims(), [2, 39]);
        assert_eq!(model.num_classes(), 39);
    }

    #[test]
    fn test_conv_block_halves_spatial_dims() {
        let device = Default::default();
        let block = ConvBlock::<TestBackend>::new(3, 32, &device);

        let input = Tensor::<TestBackend, 4>::ones([1, 3, 16, 16], &device);
        let output = block.forward(input);

        assert_eq!(output.dims(), [1, 32, 8, 8]);
    }

    #[test]
    fn test_softmax_rows_sum_to_one() {
        let device = Default::default();
        let model = CropClassifierConfig::for_catalog().init::<TestBackend>(&device);

        let input = Tensor::<TestBackend, 4>::ones([1, 3, 128, 128], &device);
        let probs: Vec<f32> = model.forward_softmax(input).into_data().to_vec().unwrap();

        assert_eq!(probs.len(), 39);
        let sum: f32 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-4);
    }
}
