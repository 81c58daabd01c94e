//! # `ResNet` Utilities
use crate::unpack_shape_contract;
use burn::nn::conv::Conv2dConfig;
use burn::nn::{Initializer, PaddingConfig2d};
use std::sync::LazyLock;

/// Initializer for convolutions feeding into a `ReLU`.
pub static CONV_INTO_RELU_INITIALIZER: LazyLock<Initializer> =
    LazyLock::new(|| Initializer::KaimingNormal {
        gain: std::f64::consts::SQRT_2,
        fan_out_only: true,
    });

/// Get the output resolution for a given input resolution.
///
/// The input must be a multiple of the stride.
///
/// # Arguments
///
/// - `input_resolution`: ``[height_in=height_out*stride, width_in=width_out*stride]``.
///
/// # Returns
///
/// ``[height_out, width_out]``
///
/// # Panics
///
/// If the input resolution is not a multiple of the stride.
#[inline(always)]
pub fn stride_div_output_resolution(
    input_resolution: [usize; 2],
    stride: usize,
) -> [usize; 2] {
    unpack_shape_contract!(
        [
            "height_in" = "height_out" * "stride",
            "width_in" = "width_out" * "stride"
        ],
        &input_resolution,
        &["height_out", "width_out"],
        &[("stride", stride)]
    )
}

/// Broadcast a scalar to an `[N]` array.
#[inline(always)]
pub fn scalar_to_array<const N: usize>(value: usize) -> [usize; N] {
    [value; N]
}

/// Symmetric padding for a square kernel.
///
/// Pads ``(kernel_size - 1) / 2`` on every side, which keeps the spatial
/// resolution a pure function of the stride. Only odd kernels are
/// expressible this way; [`crate::resnet::model::ResNetConfig`] rejects
/// even stem kernels up front.
#[inline(always)]
pub fn fixed_padding(kernel_size: usize) -> PaddingConfig2d {
    let pad = (kernel_size - 1) / 2;
    PaddingConfig2d::Explicit(pad, pad)
}

/// Build a bias-free square conv with [`fixed_padding`].
///
/// The spatial output resolution is ``input_resolution / stride``,
/// independent of the kernel size.
///
/// # Arguments
///
/// - `in_channels`: input channels.
/// - `out_channels`: output channels.
/// - `kernel_size`: square kernel size; must be odd.
/// - `stride`: square stride.
pub fn conv2d_fixed_padding(
    in_channels: usize,
    out_channels: usize,
    kernel_size: usize,
    stride: usize,
) -> Conv2dConfig {
    Conv2dConfig::new(
        [in_channels, out_channels],
        scalar_to_array(kernel_size),
    )
    .with_stride(scalar_to_array(stride))
    .with_padding(fixed_padding(kernel_size))
    .with_initializer(CONV_INTO_RELU_INITIALIZER.clone())
    .with_bias(false)
}
