//! # Basic Block for `ResNet`
//!
//! [`BasicBlock`] is the plain (3x3-3x3) `ResNet` convolution unit, in
//! both the post-activation ("v1") and pre-activation ("v2") orderings.
//!
//! [`BasicBlockMeta`] defines a common meta API for [`BasicBlock`]
//! and [`BasicBlockConfig`].
//!
//! [`BasicBlockConfig`] implements [`Config`], and provides
//! [`BasicBlockConfig::init`] to initialize a [`BasicBlock`].
//!
//! [`BasicBlock`] implements [`Module`], and provides
//! [`BasicBlock::forward`].

use crate::resnet::downsample::{Downsample, DownsampleConfig};
use crate::resnet::model::ResNetVersion;
use crate::resnet::util::{conv2d_fixed_padding, stride_div_output_resolution};
use crate::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::module::Ignored;
use burn::nn::conv::Conv2d;
use burn::nn::{BatchNorm, BatchNormConfig, Relu};
use burn::prelude::{Backend, Config, Module, Tensor};

/// [`BasicBlock`] Meta trait.
pub trait BasicBlockMeta {
    /// The size of the in channels dimension.
    fn in_planes(&self) -> usize;

    /// Configures the size of `out_planes`.
    fn planes(&self) -> usize;

    /// The size of the out channels dimension.
    ///
    /// Basic blocks have no expansion; ``out_planes = planes``.
    fn out_planes(&self) -> usize {
        self.planes()
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

/// [`BasicBlock`] Config.
///
/// Implements [`BasicBlockMeta`].
#[derive(Config, Debug)]
pub struct BasicBlockConfig {
    /// The size of the in channels dimension.
    pub in_planes: usize,

    /// Configures the size of `out_planes`.
    pub planes: usize,

    /// The stride of the first convolution.
    #[config(default = 1)]
    pub stride: usize,

    /// Architecture version.
    #[config(default = "ResNetVersion::V2")]
    pub version: ResNetVersion,
}

impl BasicBlockMeta for BasicBlockConfig {
    fn in_planes(&self) -> usize {
        self.in_planes
    }

    fn planes(&self) -> usize {
        self.planes
    }

    fn stride(&self) -> usize {
        self.stride
    }

    fn version(&self) -> ResNetVersion {
        self.version
    }
}

impl BasicBlockConfig {
    /// Initialize a [`BasicBlock`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> BasicBlock<B> {
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
        let (norm1_planes, norm2_planes) = match version {
            ResNetVersion::V1 => (planes, planes),
            ResNetVersion::V2 => (in_planes, planes),
        };

        BasicBlock {
            version: Ignored(version),

            downsample,

            conv1: conv2d_fixed_padding(in_planes, planes, 3, stride).init(device),
            conv2: conv2d_fixed_padding(planes, out_planes, 3, 1).init(device),

            norm1: BatchNormConfig::new(norm1_planes).init(device),
            norm2: BatchNormConfig::new(norm2_planes).init(device),

            act: Relu::new(),
        }
    }
}

/// Basic Block for `ResNet`.
///
/// Implements [`BasicBlockMeta`].
#[derive(Module, Debug)]
pub struct BasicBlock<B: Backend> {
    /// Architecture version.
    pub version: Ignored<ResNetVersion>,

    /// Optional [`Downsample`] layer; for the residual connection.
    pub downsample: Option<Downsample<B>>,

    /// First (strided) conv.
    pub conv1: Conv2d<B>,
    /// Second conv.
    pub conv2: Conv2d<B>,

    /// First norm layer.
    pub norm1: BatchNorm<B, 2>,
    /// Second norm layer.
    pub norm2: BatchNorm<B, 2>,

    /// Shared activation.
    pub act: Relu,
}

impl<B: Backend> BasicBlockMeta for BasicBlock<B> {
    fn in_planes(&self) -> usize {
        self.conv1.weight.dims()[1] * self.conv1.groups
    }

    fn planes(&self) -> usize {
        self.conv1.weight.dims()[0]
    }

    fn out_planes(&self) -> usize {
        self.conv2.weight.dims()[0]
    }

    fn stride(&self) -> usize {
        self.conv1.stride[0]
    }

    fn version(&self) -> ResNetVersion {
        self.version.0
    }
}

impl<B: Backend> BasicBlock<B> {
    /// Forward Pass.
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
                let x = self.norm2.forward(self.conv2.forward(x));
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
