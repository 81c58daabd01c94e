#![warn(missing_docs)]
//!# burn-resnet - Configurable `ResNet` Models
//!
//! ## Notable Components
//!
//! * [`resnet`] - the `ResNet` model family.
//!   * [`resnet::model`] - [`resnet::model::ResNetConfig`] and the
//!     [`resnet::model::ResNet`] module.
//!   * [`resnet::prefabs`] - well-known `ImageNet` and `CIFAR` structures.
//!   * [`resnet::basic_block`] - the plain (3x3-3x3) residual block.
//!   * [`resnet::bottleneck_block`] - the bottleneck (1x1-3x3-1x1) residual block.
//!
//! Both the original post-activation ordering ("v1") and the pre-activation
//! ordering ("v2") are supported; see [`resnet::model::ResNetVersion`].

/// Test-only macro import.
#[cfg(test)]
#[allow(unused_imports)]
#[macro_use]
extern crate hamcrest;

pub mod resnet;

/// Match a shape against a shape contract pattern, and unpack selected keys.
///
/// Compatibility wrapper over [`bimm_contracts::ShapeContract::unpack_shape`],
/// equivalent to the `unpack_shape_contract!` macro from newer
/// `bimm-contracts` releases.
#[macro_export]
macro_rules! unpack_shape_contract {
    ([$($contract:tt)*], $shape:expr, $keys:expr $(,)?) => {{
        static CONTRACT: ::bimm_contracts::ShapeContract =
            bimm_contracts::shape_contract![$($contract)*];
        CONTRACT.unpack_shape($shape, $keys, &[])
    }};
    ([$($contract:tt)*], $shape:expr, $keys:expr, $env:expr $(,)?) => {{
        static CONTRACT: ::bimm_contracts::ShapeContract =
            bimm_contracts::shape_contract![$($contract)*];
        CONTRACT.unpack_shape($shape, $keys, $env)
    }};
}

/// Assert that a shape matches a shape contract pattern.
///
/// Compatibility wrapper over [`bimm_contracts::ShapeContract::assert_shape`],
/// equivalent to the `assert_shape_contract!` macro from newer
/// `bimm-contracts` releases.
#[macro_export]
macro_rules! assert_shape_contract {
    ([$($contract:tt)*], $shape:expr $(,)?) => {
        $crate::assert_shape_contract!([$($contract)*], $shape, &[])
    };
    ([$($contract:tt)*], $shape:expr, $env:expr $(,)?) => {{
        static CONTRACT: ::bimm_contracts::ShapeContract =
            bimm_contracts::shape_contract![$($contract)*];
        CONTRACT.assert_shape($shape, $env);
    }};
}

/// Periodically assert that a shape matches a shape contract pattern,
/// on the [`bimm_contracts::run_every_nth`] schedule.
///
/// Compatibility wrapper equivalent to the
/// `assert_shape_contract_periodically!` macro from newer `bimm-contracts`
/// releases.
#[macro_export]
macro_rules! assert_shape_contract_periodically {
    ($($args:tt)*) => {{
        use ::bimm_contracts::run_every_nth;
        run_every_nth!({
            $crate::assert_shape_contract!($($args)*);
        })
    }};
}
