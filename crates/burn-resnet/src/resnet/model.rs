//! # `ResNet` Core Model
//!
//! [`ResNetConfig`] is the single hyperparameter record of the model
//! family: stem shape, per-stage block counts and strides, block form,
//! architecture version, data format, and precision. It is created once,
//! validated, and consumed by [`ResNetConfig::init`] to produce a
//! [`ResNet`] module.

use crate::resnet::layer_block::{LayerBlock, LayerBlockConfig, LayerBlockMeta};
use crate::resnet::util::{conv2d_fixed_padding, fixed_padding};
use crate::assert_shape_contract_periodically;
use burn::module::Ignored;
use burn::nn::conv::Conv2d;
use burn::nn::pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig};
use burn::nn::{BatchNorm, BatchNormConfig, Linear, LinearConfig, Relu};
use burn::prelude::{Backend, Config, Module, Tensor};
use burn::tensor::DType;
use serde::{Deserialize, Serialize};

/// `ResNet` architecture version.
///
/// * `V1`: post-activation ordering; norm and activation follow each conv,
///   and the residual sum is activated.
/// * `V2`: pre-activation ordering; norm and activation precede each conv,
///   and the residual sum is left bare.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResNetVersion {
    /// Post-activation ordering.
    V1,

    /// Pre-activation ordering.
    V2,
}

impl TryFrom<usize> for ResNetVersion {
    type Error = String;

    fn try_from(version: usize) -> Result<Self, Self::Error> {
        match version {
            1 => Ok(Self::V1),
            2 => Ok(Self::V2),
            _ => Err(format!("resnet version must be 1 or 2: {version}")),
        }
    }
}

impl From<ResNetVersion> for usize {
    fn from(version: ResNetVersion) -> usize {
        match version {
            ResNetVersion::V1 => 1,
            ResNetVersion::V2 => 2,
        }
    }
}

/// Recorded numeric precision of the model.
///
/// This is a hyperparameter record, not a cast: `burn` fixes the runtime
/// element type per backend, so the caller selects a matching backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Precision {
    /// 32-bit floats.
    F32,

    /// 16-bit floats.
    F16,
}

impl Precision {
    /// The tensor element type this precision records.
    pub fn dtype(&self) -> DType {
        match self {
            Self::F32 => DType::F32,
            Self::F16 => DType::F16,
        }
    }
}

impl TryFrom<DType> for Precision {
    type Error = String;

    fn try_from(dtype: DType) -> Result<Self, Self::Error> {
        match dtype {
            DType::F32 => Ok(Self::F32),
            DType::F16 => Ok(Self::F16),
            _ => Err(format!("unsupported precision: {dtype:?}")),
        }
    }
}

/// Input data format.
///
/// `burn` convolutions are NCHW-native; NHWC inputs are permuted on entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataFormat {
    /// ``[batch, channels, height, width]``.
    Nchw,

    /// ``[batch, height, width, channels]``.
    Nhwc,
}

/// [`ResNet`] Config.
#[derive(Config, Debug)]
pub struct ResNetConfig {
    /// Per-stage residual block counts.
    pub block_sizes: Vec<usize>,

    /// Per-stage strides; same length as `block_sizes`.
    pub block_strides: Vec<usize>,

    /// The number of classification classes.
    pub num_classes: usize,

    /// Use bottleneck blocks.
    #[config(default = false)]
    pub bottleneck: bool,

    /// The number of input image channels.
    #[config(default = 3)]
    pub in_channels: usize,

    /// Base filter count; stage ``i`` runs ``num_filters << i`` wide.
    #[config(default = 64)]
    pub num_filters: usize,

    /// Stem conv kernel size; must be odd.
    #[config(default = 7)]
    pub kernel_size: usize,

    /// Stem conv stride.
    #[config(default = 2)]
    pub conv_stride: usize,

    /// Stem max pool window; `None` disables stem pooling.
    #[config(default = "Some(3)")]
    pub first_pool_size: Option<usize>,

    /// Stem max pool stride.
    #[config(default = 2)]
    pub first_pool_stride: usize,

    /// Feature size entering the dense head.
    ///
    /// Derived from the stage structure when `None`; validated against the
    /// derived value when `Some`.
    #[config(default = "None")]
    pub final_size: Option<usize>,

    /// Architecture version.
    #[config(default = "ResNetVersion::V2")]
    pub version: ResNetVersion,

    /// Input data format.
    #[config(default = "DataFormat::Nchw")]
    pub data_format: DataFormat,

    /// Recorded numeric precision.
    #[config(default = "Precision::F32")]
    pub precision: Precision,
}

impl ResNetConfig {
    /// Block expansion factor; 4 for bottleneck stacks, 1 otherwise.
    pub fn expansion(&self) -> usize {
        if self.bottleneck { 4 } else { 1 }
    }

    /// The feature size entering the dense head, derived from the stages.
    ///
    /// ``num_filters * 2^(stages - 1) * expansion``
    pub fn derived_final_size(&self) -> usize {
        (self.num_filters << (self.block_sizes.len().saturating_sub(1))) * self.expansion()
    }

    /// Check if the config is valid.
    ///
    /// # Returns
    ///
    /// A `Result<(), String>`
    pub fn try_validate(&self) -> Result<(), String> {
        if self.block_sizes.is_empty() {
            return Err("block_sizes is empty".to_string());
        }
        if self.block_sizes.len() != self.block_strides.len() {
            return Err(format!(
                "block_sizes({}) and block_strides({}) differ in length",
                self.block_sizes.len(),
                self.block_strides.len(),
            ));
        }
        if self.block_sizes.contains(&0) {
            return Err(format!("empty stage: {:?}", self.block_sizes));
        }
        if self.block_strides.contains(&0) {
            return Err(format!("zero stage stride: {:?}", self.block_strides));
        }
        if self.kernel_size % 2 == 0 {
            return Err(format!(
                "stem kernel size must be odd: {}",
                self.kernel_size
            ));
        }
        if self.num_classes == 0 {
            return Err("num_classes is zero".to_string());
        }
        if let Some(final_size) = self.final_size {
            let derived = self.derived_final_size();
            if final_size != derived {
                return Err(format!(
                    "final_size({final_size}) != derived final size({derived})"
                ));
            }
        }
        Ok(())
    }

    /// Panic if `try_validate` returns an error.
    pub fn expect_valid(&self) {
        match self.try_validate() {
            Ok(_) => (),
            Err(err) => panic!("{}", err),
        }
    }

    /// Initialize a [`ResNet`] model.
    ///
    /// # Panics
    ///
    /// If the config does not validate.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> ResNet<B> {
        self.expect_valid();

        let stem_conv = conv2d_fixed_padding(
            self.in_channels,
            self.num_filters,
            self.kernel_size,
            self.conv_stride,
        )
        .init(device);

        // v1 normalizes the stem; v2 defers to the first block's pre-activation.
        let stem_norm = match self.version {
            ResNetVersion::V1 => Some(BatchNormConfig::new(self.num_filters).init(device)),
            ResNetVersion::V2 => None,
        };

        let pool = self.first_pool_size.map(|size| {
            MaxPool2dConfig::new([size, size])
                .with_strides([self.first_pool_stride, self.first_pool_stride])
                .with_padding(fixed_padding(size))
                .init()
        });

        let mut layers = Vec::with_capacity(self.block_sizes.len());
        let mut in_planes = self.num_filters;
        for (idx, (&num_blocks, &stride)) in self
            .block_sizes
            .iter()
            .zip(self.block_strides.iter())
            .enumerate()
        {
            let planes = self.num_filters << idx;
            let config = LayerBlockConfig::build(
                num_blocks,
                in_planes,
                planes,
                stride,
                self.bottleneck,
                self.version,
            );
            in_planes = config.out_planes();
            layers.push(config.init(device));
        }
        let head_planes = in_planes;

        let head_norm = match self.version {
            ResNetVersion::V1 => None,
            ResNetVersion::V2 => Some(BatchNormConfig::new(head_planes).init(device)),
        };

        ResNet {
            data_format: Ignored(self.data_format),

            stem_conv,
            stem_norm,
            pool,

            layers,

            head_norm,
            avgpool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            fc: LinearConfig::new(head_planes, self.num_classes).init(device),

            act: Relu::new(),
        }
    }
}

/// `ResNet` model.
#[derive(Module, Debug)]
pub struct ResNet<B: Backend> {
    /// Input data format.
    pub data_format: Ignored<DataFormat>,

    /// Stem conv.
    pub stem_conv: Conv2d<B>,
    /// Stem norm; present in v1 networks only.
    pub stem_norm: Option<BatchNorm<B, 2>>,
    /// Optional stem pooling.
    pub pool: Option<MaxPool2d>,

    /// Stage layer blocks.
    pub layers: Vec<LayerBlock<B>>,

    /// Head norm; present in v2 networks only.
    pub head_norm: Option<BatchNorm<B, 2>>,
    /// Head pooling; ``[B, C, H, W] -> [B, C, 1, 1]``.
    pub avgpool: AdaptiveAvgPool2d,
    /// Head classifier.
    pub fc: Linear<B>,

    /// Shared activation.
    pub act: Relu,
}

impl<B: Backend> ResNet<B> {
    /// The number of classification classes.
    pub fn num_classes(&self) -> usize {
        self.fc.weight.dims()[1]
    }

    /// `ResNet` forward pass.
    ///
    /// # Arguments
    ///
    /// - `input`: a batch of images; ``[batch, channels, height, width]``,
    ///   or ``[batch, height, width, channels]`` for NHWC models.
    ///
    /// # Returns
    ///
    /// A ``[batch, num_classes]`` tensor of class scores.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 2> {
        let batch = input.dims()[0];

        let x = match self.data_format.0 {
            DataFormat::Nchw => input,
            DataFormat::Nhwc => input.permute([0, 3, 1, 2]),
        };

        // Stem
        let x = self.stem_conv.forward(x);
        let x = match &self.stem_norm {
            Some(norm) => self.act.forward(norm.forward(x)),
            None => x,
        };
        let x = match &self.pool {
            Some(pool) => pool.forward(x),
            None => x,
        };

        // Residual stages
        let x = self.layers.iter().fold(x, |x, layer| layer.forward(x));

        // Head
        let x = match &self.head_norm {
            Some(norm) => self.act.forward(norm.forward(x)),
            None => x,
        };
        let x = self.avgpool.forward(x);
        // Reshape [B, C, 1, 1] -> [B, C]
        let x = x.flatten(1, 3);
        let x = self.fc.forward(x);

        assert_shape_contract_periodically!(
            ["batch", "num_classes"],
            &x,
            &[("batch", batch), ("num_classes", self.num_classes())],
        );

        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assert_shape_contract;
    use burn::backend::NdArray;

    #[test]
    fn test_version_conversion() {
        assert_eq!(ResNetVersion::try_from(1), Ok(ResNetVersion::V1));
        assert_eq!(ResNetVersion::try_from(2), Ok(ResNetVersion::V2));
        assert_eq!(
            ResNetVersion::try_from(3),
            Err("resnet version must be 1 or 2: 3".to_string()),
        );
        assert_eq!(usize::from(ResNetVersion::V2), 2);
    }

    #[test]
    fn test_precision_conversion() {
        assert_eq!(Precision::try_from(DType::F32), Ok(Precision::F32));
        assert_eq!(Precision::try_from(DType::F16), Ok(Precision::F16));
        assert!(Precision::try_from(DType::F64).is_err());
        assert!(Precision::try_from(DType::I32).is_err());

        assert_eq!(Precision::F16.dtype(), DType::F16);
    }

    #[test]
    fn test_resnet_config_defaults() {
        let config = ResNetConfig::new(vec![2, 2, 2, 2], vec![1, 2, 2, 2], 1000);
        assert!(config.try_validate().is_ok());
        assert!(!config.bottleneck);
        assert_eq!(config.expansion(), 1);
        assert_eq!(config.num_filters, 64);
        assert_eq!(config.kernel_size, 7);
        assert_eq!(config.first_pool_size, Some(3));
        assert_eq!(config.derived_final_size(), 512);
        assert_eq!(config.version, ResNetVersion::V2);
        assert_eq!(config.data_format, DataFormat::Nchw);
        assert_eq!(config.precision, Precision::F32);

        let config = config.with_bottleneck(true);
        assert_eq!(config.expansion(), 4);
        assert_eq!(config.derived_final_size(), 2048);
    }

    #[test]
    fn test_resnet_config_validation() {
        let valid = ResNetConfig::new(vec![2, 2], vec![1, 2], 10);
        assert!(valid.try_validate().is_ok());

        let config = ResNetConfig::new(vec![], vec![], 10);
        assert!(config.try_validate().is_err());

        let config = ResNetConfig::new(vec![2, 2], vec![1], 10);
        assert!(config.try_validate().is_err());

        let config = ResNetConfig::new(vec![2, 0], vec![1, 2], 10);
        assert!(config.try_validate().is_err());

        let config = ResNetConfig::new(vec![2, 2], vec![1, 0], 10);
        assert!(config.try_validate().is_err());

        let config = ResNetConfig::new(vec![2, 2], vec![1, 2], 10).with_kernel_size(4);
        assert!(config.try_validate().is_err());

        let config = ResNetConfig::new(vec![2, 2], vec![1, 2], 0);
        assert!(config.try_validate().is_err());

        let config = ResNetConfig::new(vec![2, 2], vec![1, 2], 10).with_final_size(Some(128));
        assert!(config.try_validate().is_ok());

        let config = ResNetConfig::new(vec![2, 2], vec![1, 2], 10).with_final_size(Some(512));
        assert!(config.try_validate().is_err());
    }

    #[test]
    #[should_panic(expected = "stem kernel size must be odd: 4")]
    fn test_resnet_init_invalid_panics() {
        type B = NdArray<f32>;
        let device = Default::default();

        let _model: ResNet<B> = ResNetConfig::new(vec![2, 2], vec![1, 2], 10)
            .with_kernel_size(4)
            .init(&device);
    }

    #[test]
    fn test_resnet_forward_v1() {
        type B = NdArray<f32>;
        let device = Default::default();

        let model: ResNet<B> = ResNetConfig::new(vec![1, 1], vec![1, 2], 5)
            .with_num_filters(4)
            .with_version(ResNetVersion::V1)
            .init(&device);

        assert!(model.stem_norm.is_some());
        assert!(model.head_norm.is_none());
        assert_eq!(model.num_classes(), 5);

        let input = Tensor::ones([2, 3, 32, 32], &device);
        let output = model.forward(input);

        assert_shape_contract!(
            ["batch", "num_classes"],
            &output,
            &[("batch", 2), ("num_classes", 5)],
        );
    }

    #[test]
    fn test_resnet_forward_v2_bottleneck() {
        type B = NdArray<f32>;
        let device = Default::default();

        let model: ResNet<B> = ResNetConfig::new(vec![1, 1], vec![1, 2], 5)
            .with_num_filters(4)
            .with_bottleneck(true)
            .init(&device);

        assert!(model.stem_norm.is_none());
        assert!(model.head_norm.is_some());

        let input = Tensor::ones([2, 3, 32, 32], &device);
        let output = model.forward(input);

        assert_shape_contract!(
            ["batch", "num_classes"],
            &output,
            &[("batch", 2), ("num_classes", 5)],
        );
    }

    #[test]
    fn test_resnet_forward_nhwc() {
        type B = NdArray<f32>;
        let device = Default::default();

        let model: ResNet<B> = ResNetConfig::new(vec![1, 1], vec![1, 2], 5)
            .with_num_filters(4)
            .with_data_format(DataFormat::Nhwc)
            .init(&device);

        let input = Tensor::ones([2, 32, 32, 3], &device);
        let output = model.forward(input);

        assert_shape_contract!(
            ["batch", "num_classes"],
            &output,
            &[("batch", 2), ("num_classes", 5)],
        );
    }

    #[test]
    fn test_resnet_forward_no_stem_pool() {
        type B = NdArray<f32>;
        let device = Default::default();

        let model: ResNet<B> = ResNetConfig::new(vec![1, 1, 1], vec![1, 2, 2], 10)
            .with_num_filters(4)
            .with_kernel_size(3)
            .with_conv_stride(1)
            .with_first_pool_size(None)
            .init(&device);

        assert!(model.pool.is_none());

        let input = Tensor::ones([2, 3, 32, 32], &device);
        let output = model.forward(input);

        assert_shape_contract!(
            ["batch", "num_classes"],
            &output,
            &[("batch", 2), ("num_classes", 10)],
        );
    }
}
