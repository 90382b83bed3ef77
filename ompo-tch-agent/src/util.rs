//! Utilities.
use crate::model::ModelBase;
use anyhow::{anyhow, Result};
use log::trace;
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use tch::{Device, Tensor};

/// Loss of the critics on the Bellman residual `x = y - Q(s, a)`.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone, Copy)]
pub enum CriticLoss {
    /// Mean squared error, without the initial-state term.
    Mse,

    /// `(1 - gamma) E[Q(s0, a0)] + E[f*(x)]` with the Pearson chi-square
    /// conjugate `f*(x) = x + x^2 / 4`.
    PearsonChi2,
}

impl CriticLoss {
    /// `f*(x)` of the Pearson chi-square divergence.
    pub fn conjugate(x: &Tensor) -> Tensor {
        x + x.pow_tensor_scalar(2) / 4.0
    }

    /// Derivative of [`CriticLoss::conjugate`], `1 + x / 2`.
    pub fn conjugate_grad(x: &Tensor) -> Tensor {
        x / 2.0 + 1.0
    }
}

/// Apply soft update on variables.
///
/// Variables are identified by their names.
///
/// dest = tau * src + (1.0 - tau) * dest
pub fn track<M: ModelBase>(dest: &mut M, src: &M, tau: f64) -> Result<()> {
    let src = src.get_var_store().variables();
    let mut dest = dest.get_var_store().variables();
    debug_assert_eq!(src.len(), dest.len());

    tch::no_grad(|| {
        for (name, src) in src.iter() {
            let dest = dest
                .get_mut(name)
                .ok_or_else(|| anyhow!("no variable {} in the target network", name))?;
            dest.copy_(&(tau * src + (1.0 - tau) * &*dest));
        }
        Ok::<(), anyhow::Error>(())
    })?;
    trace!("soft update");
    Ok(())
}

/// Interface for handling output dimensions.
pub trait OutDim {
    /// Returns the output dimension.
    fn get_out_dim(&self) -> i64;

    /// Sets the  output dimension.
    fn set_out_dim(&mut self, v: i64);
}

/// Converts a row-major matrix with `dim` columns into a tensor of shape `[n, dim]`.
pub fn rows_to_tensor(v: &[f32], dim: usize, device: Device) -> Tensor {
    Tensor::from_slice(v).view([-1, dim as i64]).to(device)
}

/// Converts a vector into a tensor of shape `[n]`.
pub fn vec_to_tensor(v: &[f32], device: Device) -> Tensor {
    Tensor::from_slice(v).to(device)
}

/// Converts a tensor into a flat vector.
pub fn tensor_to_vec(t: &Tensor) -> Result<Vec<f32>> {
    let t = t.to_kind(tch::Kind::Float).to(Device::Cpu).flatten(0, -1);
    Ok(Vec::<f32>::try_from(&t)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conjugate() -> Result<()> {
        let x = Tensor::from_slice(&[-2f32, 0.0, 2.0]);
        assert_eq!(tensor_to_vec(&CriticLoss::conjugate(&x))?, vec![-1.0, 0.0, 3.0]);
        assert_eq!(tensor_to_vec(&CriticLoss::conjugate_grad(&x))?, vec![0.0, 1.0, 2.0]);
        Ok(())
    }

    #[test]
    fn test_rows_to_tensor() -> Result<()> {
        let t = rows_to_tensor(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 3, Device::Cpu);
        assert_eq!(t.size(), vec![2, 3]);
        assert_eq!(tensor_to_vec(&t.get(1))?, vec![4.0, 5.0, 6.0]);
        Ok(())
    }
}
