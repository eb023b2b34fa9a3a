//! Gradient-based optimisers

use crate::nn::TrainBackend;
use burn::module::AutodiffModule;
use burn::optim::{AdamWConfig, GradientsParams};

/// Applies one update to a network from its gradients
pub trait Optimizer<N> {
    /// Return `net` moved one step against `grads`
    fn step(&mut self, net: N, grads: GradientsParams) -> N;
}

/// Adam with decoupled weight decay
pub struct AdamW<O> {
    inner: O,
    learning_rate: f64,
    steps: usize,
}

impl AdamW<()> {
    /// Optimiser for networks of type `N` with betas `(0.9, 0.999)` and eps `1e-8`
    pub fn new<N>(
        learning_rate: f64,
        weight_decay: f64,
    ) -> AdamW<impl burn::optim::Optimizer<N, TrainBackend>>
    where
        N: AutodiffModule<TrainBackend>,
    {
        let inner = AdamWConfig::new()
            .with_beta_1(0.9)
            .with_beta_2(0.999)
            .with_epsilon(1e-8)
            .with_weight_decay(weight_decay as f32)
            .init::<TrainBackend, N>();

        AdamW {
            inner,
            learning_rate,
            steps: 0,
        }
    }
}

impl<O> AdamW<O> {
    /// Step size
    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// Number of steps taken so far
    pub fn steps(&self) -> usize {
        self.steps
    }
}

impl<N, O> Optimizer<N> for AdamW<O>
where
    N: AutodiffModule<TrainBackend>,
    O: burn::optim::Optimizer<N, TrainBackend>,
{
    fn step(&mut self, net: N, grads: GradientsParams) -> N {
        self.steps += 1;
        burn::optim::Optimizer::step(&mut self.inner, self.learning_rate, net, grads)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::nn::loss::{MseLoss, Reduction};
    use burn::nn::{Linear, LinearConfig};
    use burn::tensor::{ElementConversion, Tensor, TensorData};

    type Net = Linear<TrainBackend>;

    #[test]
    fn test_steps_reduce_loss() {
        let device = Default::default();
        let mut net: Net = LinearConfig::new(2, 1).init(&device);
        let mut optimizer = AdamW::new::<Net>(0.05, 0.0);

        let x = Tensor::<TrainBackend, 2>::from_data(
            TensorData::new(vec![1.0f32, 2.0, -1.0, 0.5], [2, 2]),
            &device,
        );
        let y = Tensor::<TrainBackend, 2>::from_data(
            TensorData::new(vec![3.0f32, -1.0], [2, 1]),
            &device,
        );
        let loss_of = |net: &Net| {
            MseLoss::new().forward(net.forward(x.clone()), y.clone(), Reduction::Mean)
        };

        let before = loss_of(&net).into_scalar().elem::<f64>();
        for _ in 0..200 {
            let loss = loss_of(&net);
            let grads = GradientsParams::from_grads(loss.backward(), &net);
            net = optimizer.step(net, grads);
        }
        let after = loss_of(&net).into_scalar().elem::<f64>();

        assert!(after < before / 10.0, "{} -> {}", before, after);
        assert_eq!(optimizer.steps(), 200);
    }

    #[test]
    fn test_learning_rate_is_kept() {
        let optimizer = AdamW::new::<Net>(3e-4, 1e-2);
        assert_eq!(optimizer.learning_rate(), 3e-4);
        assert_eq!(optimizer.steps(), 0);
    }
}
