//! # [`BottleneckBlock`] Block for `ResNet`
//!
//! [`BottleneckBlock`] is the bottleneck (1x1-3x3-1x1) form of the core
//! `ResNet` convolution unit, in both the post-activation ("v1") and
//! pre-activation ("v2") orderings. The 3x3 conv carries the stride, and
//! the final 1x1 conv expands to ``planes * expansion_factor`` channels.
//!
//! [`BottleneckBlockMeta`] defines a common meta API for [`BottleneckBlock`]
//! and [`BottleneckBlockConfig`].
//!
//! [`BottleneckBlockConfig`] implements [`Config`], and provides
//! [`BottleneckBlockConfig::init`] to initialize a [`BottleneckBlock`].
//!
//! [`BottleneckBlock`] implements [`Module`], and provides
//! [`BottleneckBlock::forward`].

use crate::resnet::downsample::{Downsample, DownsampleConfig};
use crate::resnet::model::ResNetVersion;
use crate::resnet::util::{conv2d_fixed_padding, stride_div_output_resolution};
use crate::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::module::Ignored;
use burn::nn::conv::Conv2d;
use burn::nn::{BatchNorm, BatchNormConfig, Relu};
use burn::prelude::{Backend, Config, Module, Tensor};

/// [`BottleneckBlock`] Meta trait.
pub trait BottleneckBlockMeta {
    /// The size of the in channels dimension.
    fn in_planes(&self) -> usize;

    /// The bottleneck width; configures `out_planes`.
    fn planes(&self) -> usize;

    /// Control factor for `out_planes()`.
    fn expansion_factor(&self) -> usize;

    /// The size of the out channels dimension.
    ///
    /// ``out_planes = planes * expansion_factor``
    fn out_planes(&self) -> usize {
        self.planes() * self.expansion_factor()
    }

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

/// [`BottleneckBlock`] Config.
///
/// Implements [`BottleneckBlockMeta`].
#[derive(Config, Debug)]
pub struct BottleneckBlockConfig {
    /// The size of the in channels dimension.
    pub in_planes: usize,

    /// The bottleneck width; configures `out_planes`.
    pub planes: usize,

    /// Control factor for `out_planes()`.
    #[config(default = 4)]
    pub expansion_factor: usize,

    /// The stride of the 3x3 convolution.
    #[config(default = 1)]
    pub stride: usize,

    /// Architecture version.
    #[config(default = "ResNetVersion::V2")]
    pub version: ResNetVersion,
}

impl BottleneckBlockMeta for BottleneckBlockConfig {
    fn in_planes(&self) -> usize {
        self.in_planes
    }

    fn planes(&self) -> usize {
        self.planes
    }

    fn expansion_factor(&self) -> usize {
        self.expansion_factor
    }

    fn stride(&self) -> usize {
        self.stride
    }

    fn version(&self) -> ResNetVersion {
        self.version
    }
}

impl BottleneckBlockConfig {
    /// Initialize a [`BottleneckBlock`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> BottleneckBlock<B> {
        let in_planes = self.in_planes();
        let planes = self.planes();
        let out_planes = self.out_planes();
        let stride = self.stride();
        let version = self.version();

        let downsample = if stride != 1 || in_planes != out_planes {
            Some(
                DownsampleConfig::new(in_planes, out_planes)
                    .with_stride(stride)
                    .with_version(version)
                    .init(device),
            )
        } else {
            None
        };

        // v1 norms follow their convs; v2 norms precede them.
        let norm_planes = match version {
            ResNetVersion::V1 => [planes, planes, out_planes],
            ResNetVersion::V2 => [in_planes, planes, planes],
        };

        BottleneckBlock {
            expansion_factor: self.expansion_factor,
            version: Ignored(version),

            downsample,

            conv1: conv2d_fixed_padding(in_planes, planes, 1, 1).init(device),
            conv2: conv2d_fixed_padding(planes, planes, 3, stride).init(device),
            conv3: conv2d_fixed_padding(planes, out_planes, 1, 1).init(device),

            norm1: BatchNormConfig::new(norm_planes[0]).init(device),
            norm2: BatchNormConfig::new(norm_planes[1]).init(device),
            norm3: BatchNormConfig::new(norm_planes[2]).init(device),

            act: Relu::new(),
        }
    }
}

/// Bottleneck Block for `ResNet`.
///
/// Implements [`BottleneckBlockMeta`].
#[derive(Module, Debug)]
pub struct BottleneckBlock<B: Backend> {
    /// Expansion factor.
    pub expansion_factor: usize,

    /// Architecture version.
    pub version: Ignored<ResNetVersion>,

    /// Optional [`Downsample`] layer; for the residual connection.
    pub downsample: Option<Downsample<B>>,

    /// Reducing 1x1 conv.
    pub conv1: Conv2d<B>,
    /// Strided 3x3 conv.
    pub conv2: Conv2d<B>,
    /// Expanding 1x1 conv.
    pub conv3: Conv2d<B>,

    /// First norm layer.
    pub norm1: BatchNorm<B, 2>,
    /// Second norm layer.
    pub norm2: BatchNorm<B, 2>,
    /// Third norm layer.
    pub norm3: BatchNorm<B, 2>,

    /// Shared activation.
    pub act: Relu,
}

impl<B: Backend> BottleneckBlockMeta for BottleneckBlock<B> {
    fn in_planes(&self) -> usize {
        self.conv1.weight.dims()[1] * self.conv1.groups
    }

    fn planes(&self) -> usize {
        self.conv1.weight.dims()[0]
    }

    fn expansion_factor(&self) -> usize {
        self.expansion_factor
    }

    fn out_planes(&self) -> usize {
        self.conv3.weight.dims()[0]
    }

    fn stride(&self) -> usize {
        self.conv2.stride[0]
    }

    fn version(&self) -> ResNetVersion {
        self.version.0
    }
}

impl<B: Backend> BottleneckBlock<B> {
    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_planes, in_height=out_height*stride, in_width=out_width*stride]``.
    ///
    /// # Returns
    ///
    /// A ``[batch, out_planes=planes*expansion_factor, out_height, out_width]`` tensor.
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

        let x = match self.version() {
            ResNetVersion::V1 => {
                let identity = match &self.downsample {
                    Some(downsample) => downsample.forward(input.clone()),
                    None => input.clone(),
                };

                let x = self.act.forward(self.norm1.forward(self.conv1.forward(input)));
                let x = self.act.forward(self.norm2.forward(self.conv2.forward(x)));
                let x = self.norm3.forward(self.conv3.forward(x));
                self.act.forward(x + identity)
            }
            ResNetVersion::V2 => {
                let pre = self.act.forward(self.norm1.forward(input.clone()));

                // The projection reads the pre-activated tensor; the
                // identity shortcut reads the raw input.
                let identity = match &self.downsample {
                    Some(downsample) => downsample.forward(pre.clone()),
                    None => input,
                };

                let x = self.conv1.forward(pre);
                let x = self.conv2.forward(self.act.forward(self.norm2.forward(x)));
                let x = self.conv3.forward(self.act.forward(self.norm3.forward(x)));
                x + identity
            }
        };

        assert_shape_contract_periodically!(
            ["batch", "out_planes", "out_height", "out_width"],
            &x,
            &[
                ("batch", batch),
                ("out_planes", self.out_planes()),
                ("out_height", out_height),
                ("out_width", out_width)
            ]
        );

        x
    }
}
