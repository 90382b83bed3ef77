use super::{mlp, MlpConfig};
use crate::model::{SubModel, SubModel2};
use tch::{nn, nn::Module, Device, Tensor};

/// Multilayer perceptron with ReLU activation function.
///
/// As a [`SubModel2`] the two inputs are concatenated along the last axis.
pub struct Mlp {
    config: MlpConfig,
    device: Device,
    seq: nn::Sequential,
}

impl Mlp {
    fn create_net(var_store: &nn::VarStore, config: &MlpConfig) -> nn::Sequential {
        let p = &(var_store.root() / "mlp");
        let mut seq = mlp("ln", var_store, config).add(nn::linear(
            p / format!("ln{}", config.units.len()),
            config.last_hidden_dim(),
            config.out_dim,
            Default::default(),
        ));

        if config.activation_out {
            seq = seq.add_fn(|x| x.relu());
        }

        seq
    }
}

impl SubModel for Mlp {
    type Config = MlpConfig;
    type Input = Tensor;
    type Output = Tensor;

    fn forward(&self, x: &Self::Input) -> Tensor {
        self.seq.forward(&x.to(self.device))
    }

    fn build(var_store: &nn::VarStore, config: Self::Config) -> Self {
        let device = var_store.device();
        let seq = Self::create_net(var_store, &config);

        Self {
            config,
            device,
            seq,
        }
    }

    fn clone_with_var_store(&self, var_store: &nn::VarStore) -> Self {
        <Self as SubModel>::build(var_store, self.config.clone())
    }
}

impl SubModel2 for Mlp {
    type Config = MlpConfig;
    type Input1 = Tensor;
    type Input2 = Tensor;
    type Output = Tensor;

    fn forward(&self, input1: &Self::Input1, input2: &Self::Input2) -> Self::Output {
        let input1: Tensor = input1.to(self.device);
        let input2: Tensor = input2.to(self.device);
        let input = Tensor::cat(&[input1, input2], -1);
        self.seq.forward(&input)
    }

    fn build(var_store: &nn::VarStore, config: Self::Config) -> Self {
        <Self as SubModel>::build(var_store, config)
    }

    fn clone_with_var_store(&self, var_store: &nn::VarStore) -> Self {
        <Self as SubModel>::build(var_store, self.config.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mlp_shapes() {
        let vs = nn::VarStore::new(Device::Cpu);
        let config = MlpConfig::new(5, vec![16, 16], 1);
        let net = <Mlp as SubModel2>::build(&vs, config);
        let s = Tensor::zeros(&[4, 3], tch::kind::FLOAT_CPU);
        let a = Tensor::zeros(&[4, 2], tch::kind::FLOAT_CPU);
        assert_eq!(SubModel2::forward(&net, &s, &a).size(), vec![4, 1]);

        // Three linear layers, each with a weight and a bias.
        assert_eq!(vs.variables().len(), 6);
    }
}
