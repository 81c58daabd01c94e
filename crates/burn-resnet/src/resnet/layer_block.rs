//! # `ResNet` Layer Block
//!
//! A [`LayerBlock`] is one stage of a `ResNet`: a sequence of
//! [`ResidualBlock`]s where the first block carries the stage stride (and
//! any width change), and the remaining blocks run at stride 1.
//!
//! [`LayerBlockMeta`] defines a common meta API for [`LayerBlock`]
//! and [`LayerBlockConfig`].
//!
//! [`LayerBlockConfig`] implements [`Config`], and provides
//! [`LayerBlockConfig::init`] to initialize a [`LayerBlock`].
//!
//! [`LayerBlock`] implements [`Module`], and provides
//! [`LayerBlock::forward`].

use crate::resnet::model::ResNetVersion;
use crate::resnet::residual_block::{ResidualBlock, ResidualBlockConfig, ResidualBlockMeta};
use crate::resnet::util::stride_div_output_resolution;
use crate::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::prelude::{Backend, Config, Module, Tensor};

/// [`LayerBlock`] Meta API.
pub trait LayerBlockMeta {
    /// The number of blocks.
    fn len(&self) -> usize;

    /// Check if the layer block is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The number of input feature planes.
    fn in_planes(&self) -> usize;

    /// The number of output feature planes.
    fn out_planes(&self) -> usize;

    /// Get the effective stride of the layers.
    fn stride(&self) -> usize;

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

/// [`LayerBlock`] Configuration.
#[derive(Config, Debug)]
pub struct LayerBlockConfig {
    /// The component blocks.
    pub blocks: Vec<ResidualBlockConfig>,
}

impl From<Vec<ResidualBlockConfig>> for LayerBlockConfig {
    fn from(blocks: Vec<ResidualBlockConfig>) -> Self {
        Self { blocks }
    }
}

impl LayerBlockMeta for LayerBlockConfig {
    fn len(&self) -> usize {
        self.blocks.len()
    }

    fn in_planes(&self) -> usize {
        self.blocks[0].in_planes()
    }

    fn out_planes(&self) -> usize {
        self.blocks[self.blocks.len() - 1].out_planes()
    }

    fn stride(&self) -> usize {
        self.blocks
            .iter()
            .fold(1, |acc, block| acc * block.stride())
    }
}

impl LayerBlockConfig {
    /// Build a stage config.
    ///
    /// The first block carries `stride` and projects from `in_planes`;
    /// every other block runs the stage's output width at stride 1.
    ///
    /// # Arguments
    ///
    /// - `num_blocks`: the number of residual blocks in the stage.
    /// - `in_planes`: the number of input feature planes.
    /// - `planes`: the block width; bottleneck stages expand the output
    ///   to ``planes * 4``.
    /// - `stride`: the stage stride.
    /// - `bottleneck`: select bottleneck over basic blocks.
    /// - `version`: architecture version.
    pub fn build(
        num_blocks: usize,
        in_planes: usize,
        planes: usize,
        stride: usize,
        bottleneck: bool,
        version: ResNetVersion,
    ) -> Self {
        let first = ResidualBlockConfig::build(in_planes, planes, stride, bottleneck, version);
        let stage_planes = first.out_planes();

        let blocks = std::iter::once(first)
            .chain((1..num_blocks).map(|_| {
                ResidualBlockConfig::build(stage_planes, planes, 1, bottleneck, version)
            }))
            .collect();

        Self { blocks }
    }

    /// Check if the config is valid.
    ///
    /// # Returns
    ///
    /// A `Result<(), String>`
    pub fn try_validate(&self) -> Result<(), String> {
        if self.is_empty() {
            return Err("blocks is empty".to_string());
        }

        for idx in 1..self.blocks.len() {
            let prev = &self.blocks[idx - 1];
            let curr = &self.blocks[idx];
            if prev.out_planes() != curr.in_planes() {
                return Err(format!(
                    "block[{}].out_planes({}) != block[{}].in_planes({})\n{:#?}",
                    idx - 1,
                    prev.out_planes(),
                    idx,
                    curr.in_planes(),
                    self,
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

    /// Initialize a new [`LayerBlock`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> LayerBlock<B> {
        self.expect_valid();

        LayerBlock {
            blocks: self
                .blocks
                .iter()
                .map(|block| block.init(device))
                .collect(),
        }
    }
}

/// Layer block.
#[derive(Module, Debug)]
pub struct LayerBlock<B: Backend> {
    /// Internal blocks.
    pub blocks: Vec<ResidualBlock<B>>,
}

impl<B: Backend> LayerBlockMeta for LayerBlock<B> {
    fn len(&self) -> usize {
        self.blocks.len()
    }

    fn in_planes(&self) -> usize {
        self.blocks[0].in_planes()
    }

    fn out_planes(&self) -> usize {
        self.blocks[self.blocks.len() - 1].out_planes()
    }

    fn stride(&self) -> usize {
        self.blocks
            .iter()
            .fold(1, |acc, block| acc * block.stride())
    }
}

impl<B: Backend> LayerBlock<B> {
    /// Apply the layer block.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let [batch, out_height, out_width] = unpack_shape_contract!(
            [
                "batch",
                "in_planes",
                "in_height" = "out_height" * "stride",
                "in_width" = "out_width" * "stride"
            ],
            &input,
            &["batch", "out_height", "out_width"],
            &[("in_planes", self.in_planes()), ("stride", self.stride())],
        );

        let x = self.blocks.iter().fold(input, |x, block| block.forward(x));

        assert_shape_contract_periodically!(
            ["batch", "out_planes", "out_height", "out_width"],
            &x,
            &[
                ("batch", batch),
                ("out_planes", self.out_planes()),
                ("out_height", out_height),
                ("out_width", out_width)
            ],
        );

        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resnet::basic_block::BasicBlockConfig;
    use crate::assert_shape_contract;
    use burn::backend::NdArray;
    use hamcrest::prelude::*;

    #[test]
    fn test_layer_block_config_build() {
        let config = LayerBlockConfig::build(2, 16, 32, 2, false, ResNetVersion::V1);
        config.expect_valid();
        assert_that!(config.len(), is(equal_to(2)));
        assert_eq!(config.in_planes(), 16);
        assert_eq!(config.out_planes(), 32);
        assert_eq!(config.stride(), 2);
        assert_eq!(config.output_resolution([12, 24]), [6, 12]);

        let block1 = &config.blocks[0];
        assert_eq!(block1.in_planes(), 16);
        assert_eq!(block1.out_planes(), 32);
        assert_eq!(block1.stride(), 2);

        let block2 = &config.blocks[1];
        assert_eq!(block2.in_planes(), 32);
        assert_eq!(block2.out_planes(), 32);
        assert_eq!(block2.stride(), 1);
    }

    #[test]
    fn test_layer_block_config_build_bottleneck() {
        let config = LayerBlockConfig::build(3, 64, 64, 1, true, ResNetVersion::V2);
        config.expect_valid();
        assert_that!(config.len(), is(equal_to(3)));
        assert_eq!(config.in_planes(), 64);
        assert_eq!(config.out_planes(), 256);
        assert_eq!(config.stride(), 1);

        // Every block after the first reads the expanded width.
        assert_eq!(config.blocks[1].in_planes(), 256);
        assert_eq!(config.blocks[2].in_planes(), 256);
    }

    #[test]
    #[should_panic(expected = "out_planes")]
    fn test_layer_block_config_invalid_chain() {
        type B = NdArray<f32>;
        let device = Default::default();

        let config = LayerBlockConfig::from(vec![
            BasicBlockConfig::new(16, 32).into(),
            BasicBlockConfig::new(64, 64).into(),
        ]);
        assert!(config.try_validate().is_err());

        let _block: LayerBlock<B> = config.init(&device);
    }

    #[test]
    pub fn test_layer_block() {
        type B = NdArray<f32>;
        let device = Default::default();

        let config = LayerBlockConfig::from(vec![
            BasicBlockConfig::new(4, 8).with_stride(2).into(),
            BasicBlockConfig::new(8, 16).with_stride(3).into(),
        ]);

        config.expect_valid();

        assert_eq!(config.len(), 2);
        assert_eq!(config.in_planes(), 4);
        assert_eq!(config.out_planes(), 16);
        assert_eq!(config.stride(), 2 * 3);
        assert_eq!(config.output_resolution([12, 24]), [2, 4]);

        let block: LayerBlock<B> = config.init(&device);

        assert_eq!(block.len(), 2);
        assert_eq!(block.in_planes(), 4);
        assert_eq!(block.out_planes(), 16);
        assert_eq!(block.stride(), 2 * 3);
        assert_eq!(block.output_resolution([12, 24]), [2, 4]);

        let input = Tensor::ones([2, 4, 12, 24], &device);

        let output = block.forward(input.clone());
        assert_shape_contract!(
            ["batch", "out_planes", "out_height", "out_width"],
            &output,
            &[
                ("batch", 2),
                ("out_planes", 16),
                ("out_height", 2),
                ("out_width", 4)
            ],
        );

        let mut expected = input;
        for block in block.blocks.iter() {
            expected = block.forward(expected);
        }
        output.to_data().assert_eq(&expected.to_data(), true);
    }
}
