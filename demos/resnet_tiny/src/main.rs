//! Builds a CIFAR-sized `ResNet`-20 on the ndarray backend and runs a
//! single forward pass over a random batch.

use burn::backend::NdArray;
use burn::prelude::Tensor;
use burn::tensor::Distribution;
use burn_resnet::resnet::ResNetConfig;

type B = NdArray<f32>;

fn main() {
    let device = Default::default();

    let config = ResNetConfig::cifar(20, 10).expect("valid resnet size");
    println!("config: {config}");

    let model = config.init::<B>(&device);

    let input = Tensor::<B, 4>::random([4, 3, 32, 32], Distribution::Default, &device);
    let scores = model.forward(input);

    let classes = scores.argmax(1).flatten::<1>(0, 1);
    println!("predicted classes: {}", classes);
}
