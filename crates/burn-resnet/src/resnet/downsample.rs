//! # The `ResNet` Projection Shortcut.
//!
//! When a residual block changes resolution or width, the identity branch
//! is projected through a strided 1x1 convolution. Post-activation ("v1")
//! networks normalize the projection; pre-activation ("v2") networks leave
//! it bare, since the block has already normalized its input.

use crate::resnet::model::ResNetVersion;
use crate::resnet::util::{conv2d_fixed_padding, stride_div_output_resolution};
use crate::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::nn::conv::Conv2d;
use burn::nn::{BatchNorm, BatchNormConfig};
use burn::prelude::{Backend, Config, Module, Tensor};

/// [`Downsample`] Meta trait.
pub trait DownsampleMeta {
    /// The size of the in channels dimension.
    fn in_planes(&self) -> usize;

    /// The size of the out channels dimension.
    fn out_planes(&self) -> usize;

    /// The stride of the projection.
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

/// [`Downsample`] configuration.
#[derive(Config, Debug)]
pub struct DownsampleConfig {
    /// The size of the in channels dimension.
    pub in_planes: usize,

    /// The size of the out channels dimension.
    pub out_planes: usize,

    /// The stride of the projection.
    #[config(default = 1)]
    pub stride: usize,

    /// Architecture version; controls shortcut normalization.
    #[config(default = "ResNetVersion::V2")]
    pub version: ResNetVersion,
}

impl DownsampleMeta for DownsampleConfig {
    fn in_planes(&self) -> usize {
        self.in_planes
    }

    fn out_planes(&self) -> usize {
        self.out_planes
    }

    fn stride(&self) -> usize {
        self.stride
    }
}

impl DownsampleConfig {
    /// Initialize a [`Downsample`] `Module`.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Downsample<B> {
        Downsample {
            conv: conv2d_fixed_padding(self.in_planes, self.out_planes, 1, self.stride)
                .init(device),
            norm: match self.version {
                ResNetVersion::V1 => Some(BatchNormConfig::new(self.out_planes).init(device)),
                ResNetVersion::V2 => None,
            },
        }
    }
}

/// Projects the residual identity branch with a strided 1x1 conv.
///
/// Maps ``[batch, in_planes, in_height, in_width]`` to
/// ``[batch, out_planes, out_height, out_width]`` tensors.
#[derive(Module, Debug)]
pub struct Downsample<B: Backend> {
    /// The projection conv.
    pub conv: Conv2d<B>,

    /// Shortcut norm; present in v1 networks only.
    pub norm: Option<BatchNorm<B, 2>>,
}

impl<B: Backend> DownsampleMeta for Downsample<B> {
    fn in_planes(&self) -> usize {
        self.conv.weight.dims()[1] * self.conv.groups
    }

    fn out_planes(&self) -> usize {
        self.conv.weight.dims()[0]
    }

    fn stride(&self) -> usize {
        self.conv.stride[0]
    }
}

impl<B: Backend> Downsample<B> {
    /// Forward pass.
    ///
    /// # Arguments
    ///
    /// - `input`: a ``[batch, in_planes, in_height=out_height*stride, in_width=out_width*stride]`` tensor.
    ///
    /// # Returns
    ///
    /// A ``[batch, out_planes, out_height, out_width]`` tensor.
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
            &[("in_planes", self.in_planes()), ("stride", self.stride())]
        );

        let out = self.conv.forward(input);
        let out = match &self.norm {
            Some(norm) => norm.forward(out),
            None => out,
        };

        assert_shape_contract_periodically!(
            ["batch", "out_planes", "out_height", "out_width"],
            &out,
            &[
                ("batch", batch),
                ("out_planes", self.out_planes()),
                ("out_height", out_height),
                ("out_width", out_width)
            ]
        );

        out
    }
}
