use super::{mlp, MlpConfig};
use crate::model::SubModel;
use tch::{nn, nn::Module, Device, Tensor};

/// Multilayer perceptron with two heads of the same size.
///
/// Outputs the mean and the log standard deviation of a Gaussian.
pub struct Mlp2 {
    config: MlpConfig,
    device: Device,
    head_mean: nn::Linear,
    head_lstd: nn::Linear,
    seq: nn::Sequential,
}

impl SubModel for Mlp2 {
    type Config = MlpConfig;
    type Input = Tensor;
    type Output = (Tensor, Tensor);

    fn forward(&self, input: &Self::Input) -> Self::Output {
        let x = self.seq.forward(&input.to(self.device));
        let mean = x.apply(&self.head_mean);
        let lstd = x.apply(&self.head_lstd);
        (mean, lstd)
    }

    fn build(var_store: &nn::VarStore, config: Self::Config) -> Self {
        let seq = mlp("al", var_store, &config);
        let in_dim = config.last_hidden_dim();
        let p = &var_store.root();

        let head_mean = nn::linear(p / "ml", in_dim, config.out_dim, Default::default());
        let head_lstd = nn::linear(p / "sl", in_dim, config.out_dim, Default::default());

        Self {
            config,
            device: var_store.device(),
            head_mean,
            head_lstd,
            seq,
        }
    }

    fn clone_with_var_store(&self, var_store: &nn::VarStore) -> Self {
        Self::build(var_store, self.config.clone())
    }
}
