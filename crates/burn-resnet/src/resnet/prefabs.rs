//! # Well-Known `ResNet` Structures
//!
//! Named constructors for the published `ImageNet` depths and the
//! ``6n + 2`` `CIFAR` family.

use crate::resnet::model::ResNetConfig;

/// `ResNet`-18 stage depths.
pub const RESNET18_BLOCKS: [usize; 4] = [2, 2, 2, 2];
/// `ResNet`-34 stage depths.
pub const RESNET34_BLOCKS: [usize; 4] = [3, 4, 6, 3];
/// `ResNet`-50 stage depths.
pub const RESNET50_BLOCKS: [usize; 4] = [3, 4, 6, 3];
/// `ResNet`-101 stage depths.
pub const RESNET101_BLOCKS: [usize; 4] = [3, 4, 23, 3];
/// `ResNet`-152 stage depths.
pub const RESNET152_BLOCKS: [usize; 4] = [3, 8, 36, 3];
/// `ResNet`-200 stage depths.
pub const RESNET200_BLOCKS: [usize; 4] = [3, 24, 36, 3];

/// Look up the stage depths for a named `ImageNet` depth.
///
/// # Returns
///
/// The stage depths, or an error for sizes outside the published family.
pub fn imagenet_block_sizes(resnet_size: usize) -> Result<[usize; 4], String> {
    match resnet_size {
        18 => Ok(RESNET18_BLOCKS),
        34 => Ok(RESNET34_BLOCKS),
        50 => Ok(RESNET50_BLOCKS),
        101 => Ok(RESNET101_BLOCKS),
        152 => Ok(RESNET152_BLOCKS),
        200 => Ok(RESNET200_BLOCKS),
        _ => Err(format!(
            "not a valid imagenet resnet size: {resnet_size}; \
             expected one of 18, 34, 50, 101, 152, 200"
        )),
    }
}

impl ResNetConfig {
    /// Build an `ImageNet`-structured config for a named depth.
    ///
    /// 7x7/2 stem into a 3x3/2 max pool, four stages of doubling width
    /// starting at 64 filters; bottleneck blocks from `ResNet`-50 up.
    ///
    /// # Arguments
    ///
    /// - `resnet_size`: one of 18, 34, 50, 101, 152, 200.
    /// - `num_classes`: the number of classification classes.
    pub fn imagenet(
        resnet_size: usize,
        num_classes: usize,
    ) -> Result<Self, String> {
        let block_sizes = imagenet_block_sizes(resnet_size)?;
        let config = Self::new(block_sizes.to_vec(), vec![1, 2, 2, 2], num_classes)
            .with_bottleneck(resnet_size >= 50);
        Ok(config)
    }

    /// Build a `CIFAR`-structured config.
    ///
    /// 3x3/1 stem, no stem pooling, three stages of ``(resnet_size - 2) / 6``
    /// blocks starting at 16 filters.
    ///
    /// # Arguments
    ///
    /// - `resnet_size`: the total layer count; must satisfy
    ///   ``resnet_size % 6 == 2`` (20, 32, 44, 56, ...).
    /// - `num_classes`: the number of classification classes.
    pub fn cifar(
        resnet_size: usize,
        num_classes: usize,
    ) -> Result<Self, String> {
        if resnet_size % 6 != 2 {
            return Err(format!(
                "cifar resnet_size must be 6n + 2: {resnet_size}"
            ));
        }
        let num_blocks = (resnet_size - 2) / 6;

        let config = Self::new(vec![num_blocks; 3], vec![1, 2, 2], num_classes)
            .with_num_filters(16)
            .with_kernel_size(3)
            .with_conv_stride(1)
            .with_first_pool_size(None);
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resnet::model::ResNetVersion;
    use crate::assert_shape_contract;
    use burn::backend::NdArray;
    use burn::prelude::Tensor;
    use hamcrest::prelude::*;

    #[test]
    fn test_imagenet_block_sizes() {
        assert_eq!(imagenet_block_sizes(18), Ok([2, 2, 2, 2]));
        assert_eq!(imagenet_block_sizes(152), Ok([3, 8, 36, 3]));
        assert!(imagenet_block_sizes(19).is_err());
    }

    #[test]
    fn test_imagenet_config() {
        let config = ResNetConfig::imagenet(34, 1000).unwrap();
        config.expect_valid();
        assert!(!config.bottleneck);
        assert_eq!(config.block_sizes, vec![3, 4, 6, 3]);
        assert_eq!(config.block_strides, vec![1, 2, 2, 2]);
        assert_eq!(config.derived_final_size(), 512);

        let config = ResNetConfig::imagenet(50, 1000).unwrap();
        assert!(config.bottleneck);
        assert_that!(config.derived_final_size(), is(equal_to(2048)));

        assert!(ResNetConfig::imagenet(42, 1000).is_err());
    }

    #[test]
    fn test_cifar_config() {
        let config = ResNetConfig::cifar(20, 10).unwrap();
        config.expect_valid();
        assert_eq!(config.block_sizes, vec![3, 3, 3]);
        assert_eq!(config.block_strides, vec![1, 2, 2]);
        assert_eq!(config.num_filters, 16);
        assert_eq!(config.kernel_size, 3);
        assert_eq!(config.conv_stride, 1);
        assert_eq!(config.first_pool_size, None);
        assert_eq!(config.derived_final_size(), 64);

        assert!(ResNetConfig::cifar(21, 10).is_err());
        assert!(ResNetConfig::cifar(19, 10).is_err());
    }

    #[test]
    fn test_cifar_forward() {
        type B = NdArray<f32>;
        let device = Default::default();

        for version in [ResNetVersion::V1, ResNetVersion::V2] {
            let model = ResNetConfig::cifar(20, 10)
                .unwrap()
                .with_version(version)
                .init::<B>(&device);

            let input = Tensor::ones([2, 3, 32, 32], &device);
            let output = model.forward(input);

            assert_shape_contract!(
                ["batch", "num_classes"],
                &output,
                &[("batch", 2), ("num_classes", 10)],
            );
        }
    }

    #[test]
    fn test_imagenet_resnet18_forward() {
        type B = NdArray<f32>;
        let device = Default::default();

        let model = ResNetConfig::imagenet(18, 7).unwrap().init::<B>(&device);

        let input = Tensor::ones([1, 3, 64, 64], &device);
        let output = model.forward(input);

        assert_shape_contract!(
            ["batch", "num_classes"],
            &output,
            &[("batch", 1), ("num_classes", 7)],
        );
    }
}
