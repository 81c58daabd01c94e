//! # Residual Block Wrapper

use crate::resnet::basic_block::{BasicBlock, BasicBlockConfig, BasicBlockMeta};
use crate::resnet::bottleneck_block::{
    BottleneckBlock, BottleneckBlockConfig, BottleneckBlockMeta,
};
use crate::resnet::model::ResNetVersion;
use crate::resnet::util::stride_div_output_resolution;
use burn::prelude::{Backend, Config, Module, Tensor};

/// [`ResidualBlock`] Meta API.
pub trait ResidualBlockMeta {
    /// The number of input feature planes.
    fn in_planes(&self) -> usize;

    /// The number of output feature planes.
    fn out_planes(&self) -> usize;

    /// The stride of convolution.
    ///
    /// Affects downsample behavior.
    fn stride(&self) -> usize;

    /// Architecture version.
    fn version(&self) -> ResNetVersion;

    /// Get the output resolution for a given input resolution.
    ///
    /// The input must be a multiple of the stride.
    ///
    /// # Arguments
    ///
    /// - `input_resolution`: ``[in_height=out_height*stride, in_width=out_width*stride]``.
    ///
    /// # Returns
    ///
    /// ``[out_height, out_width]``
    ///
    /// # Panics
    ///
    /// If the input resolution is not a multiple of the stride.
    fn output_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> [usize; 2] {
        stride_div_output_resolution(input_resolution, self.stride())
    }
}

/// [`ResidualBlock`] Config.
#[derive(Config, Debug)]
pub enum ResidualBlockConfig {
    /// A `ResNet` [`BasicBlock`].
    Basic(BasicBlockConfig),

    /// A `ResNet` [`BottleneckBlock`].
    Bottleneck(BottleneckBlockConfig),
}

impl ResidualBlockMeta for ResidualBlockConfig {
    fn in_planes(&self) -> usize {
        match self {
            Self::Basic(config) => config.in_planes(),
            Self::Bottleneck(config) => config.in_planes(),
        }
    }

    fn out_planes(&self) -> usize {
        match self {
            Self::Basic(config) => config.out_planes(),
            Self::Bottleneck(config) => config.out_planes(),
        }
    }

    fn stride(&self) -> usize {
        match self {
            Self::Basic(config) => config.stride(),
            Self::Bottleneck(config) => config.stride(),
        }
    }

    fn version(&self) -> ResNetVersion {
        match self {
            Self::Basic(config) => config.version(),
            Self::Bottleneck(config) => config.version(),
        }
    }
}

impl From<BasicBlockConfig> for ResidualBlockConfig {
    fn from(config: BasicBlockConfig) -> Self {
        Self::Basic(config)
    }
}

impl From<BottleneckBlockConfig> for ResidualBlockConfig {
    fn from(config: BottleneckBlockConfig) -> Self {
        Self::Bottleneck(config)
    }
}

impl ResidualBlockConfig {
    /// Build a basic or bottleneck block config.
    ///
    /// # Arguments
    ///
    /// - `in_planes`: the number of input feature planes.
    /// - `planes`: the block width; bottleneck blocks expand the output
    ///   to ``planes * 4``.
    /// - `stride`: the stride of the block.
    /// - `bottleneck`: select [`BottleneckBlock`] over [`BasicBlock`].
    /// - `version`: architecture version.
    pub fn build(
        in_planes: usize,
        planes: usize,
        stride: usize,
        bottleneck: bool,
        version: ResNetVersion,
    ) -> Self {
        if bottleneck {
            BottleneckBlockConfig::new(in_planes, planes)
                .with_stride(stride)
                .with_version(version)
                .into()
        } else {
            BasicBlockConfig::new(in_planes, planes)
                .with_stride(stride)
                .with_version(version)
                .into()
        }
    }

    /// Initialize a [`ResidualBlock`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> ResidualBlock<B> {
        match self {
            Self::Basic(config) => ResidualBlock::Basic(config.init(device)),
            Self::Bottleneck(config) => ResidualBlock::Bottleneck(config.init(device)),
        }
    }
}

/// A `ResNet` [`BasicBlock`] or [`BottleneckBlock`] wrapper.
#[derive(Module, Debug)]
#[allow(clippy::large_enum_variant)]
pub enum ResidualBlock<B: Backend> {
    /// A `ResNet` [`BasicBlock`].
    Basic(BasicBlock<B>),

    /// A `ResNet` [`BottleneckBlock`].
    Bottleneck(BottleneckBlock<B>),
}

impl<B: Backend> From<BasicBlock<B>> for ResidualBlock<B> {
    fn from(block: BasicBlock<B>) -> Self {
        Self::Basic(block)
    }
}

impl<B: Backend> From<BottleneckBlock<B>> for ResidualBlock<B> {
    fn from(block: BottleneckBlock<B>) -> Self {
        Self::Bottleneck(block)
    }
}

impl<B: Backend> ResidualBlockMeta for ResidualBlock<B> {
    fn in_planes(&self) -> usize {
        match self {
            Self::Basic(block) => block.in_planes(),
            Self::Bottleneck(block) => block.in_planes(),
        }
    }

    fn out_planes(&self) -> usize {
        match self {
            Self::Basic(block) => block.out_planes(),
            Self::Bottleneck(block) => block.out_planes(),
        }
    }

    fn stride(&self) -> usize {
        match self {
            Self::Basic(block) => block.stride(),
            Self::Bottleneck(block) => block.stride(),
        }
    }

    fn version(&self) -> ResNetVersion {
        match self {
            Self::Basic(block) => block.version(),
            Self::Bottleneck(block) => block.version(),
        }
    }
}

impl<B: Backend> ResidualBlock<B> {
    /// Apply the wrapped block to the input.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_planes, in_height=out_height*stride, in_width=out_width*stride]``.
    ///
    /// # Returns
    ///
    /// A ``[batch, out_planes, out_height, out_width]`` tensor.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        match self {
            Self::Basic(block) => block.forward(input),
            Self::Bottleneck(block) => block.forward(input),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assert_shape_contract;
    use burn::backend::NdArray;

    #[test]
    fn test_residual_block_config() {
        {
            let cfg = ResidualBlockConfig::build(16, 32, 2, false, ResNetVersion::V1);
            assert!(matches!(cfg, ResidualBlockConfig::Basic(_)));
            assert_eq!(cfg.in_planes(), 16);
            assert_eq!(cfg.out_planes(), 32);
            assert_eq!(cfg.stride(), 2);
            assert_eq!(cfg.version(), ResNetVersion::V1);
            assert_eq!(cfg.output_resolution([20, 20]), [10, 10]);
        }

        {
            let cfg = ResidualBlockConfig::build(16, 32, 2, true, ResNetVersion::V2);
            assert!(matches!(cfg, ResidualBlockConfig::Bottleneck(_)));
            assert_eq!(cfg.in_planes(), 16);
            assert_eq!(cfg.out_planes(), 128);
            assert_eq!(cfg.stride(), 2);
            assert_eq!(cfg.version(), ResNetVersion::V2);
        }
    }

    #[test]
    fn test_residual_block_basic_block() {
        type B = NdArray<f32>;
        let device = Default::default();

        let cfg = ResidualBlockConfig::build(8, 16, 2, false, ResNetVersion::V1);

        let block: ResidualBlock<B> = cfg.init(&device);
        assert!(matches!(block, ResidualBlock::Basic(_)));
        assert_eq!(block.in_planes(), 8);
        assert_eq!(block.out_planes(), 16);
        assert_eq!(block.stride(), 2);

        let input = Tensor::ones([2, 8, 8, 8], &device);
        let output = block.forward(input);

        assert_shape_contract!(
            ["batch", "out_planes", "out_height", "out_width"],
            &output,
            &[
                ("batch", 2),
                ("out_planes", 16),
                ("out_height", 4),
                ("out_width", 4)
            ],
        );
    }

    #[test]
    fn test_residual_block_bottleneck_block() {
        type B = NdArray<f32>;
        let device = Default::default();

        let cfg = ResidualBlockConfig::build(8, 4, 2, true, ResNetVersion::V2);

        let block: ResidualBlock<B> = cfg.init(&device);
        assert!(matches!(block, ResidualBlock::Bottleneck(_)));
        assert_eq!(block.in_planes(), 8);
        assert_eq!(block.out_planes(), 16);
        assert_eq!(block.stride(), 2);

        let input = Tensor::ones([2, 8, 8, 8], &device);
        let output = block.forward(input);

        assert_shape_contract!(
            ["batch", "out_planes", "out_height", "out_width"],
            &output,
            &[
                ("batch", 2),
                ("out_planes", 16),
                ("out_height", 4),
                ("out_width", 4)
            ],
        );
    }
}
