//! # `ResNet`

pub mod basic_block;
pub mod bottleneck_block;
pub mod downsample;
pub mod layer_block;
pub mod model;
pub mod prefabs;
pub mod residual_block;
pub mod util;

pub use model::{DataFormat, Precision, ResNet, ResNetConfig, ResNetVersion};
pub use prefabs::{
    RESNET18_BLOCKS, RESNET34_BLOCKS, RESNET50_BLOCKS, RESNET101_BLOCKS, RESNET152_BLOCKS,
    RESNET200_BLOCKS,
};
