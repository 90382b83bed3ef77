//! OMPO agent and discriminator implemented with [tch](https://crates.io/crates/tch).
//!
//! [`ompo::Ompo`] is an actor-critic agent whose critics are trained on
//! rewards corrected by the log density ratio given by
//! [`discriminator::SasDiscriminator`].
pub mod discriminator;
pub mod mlp;
pub mod model;
pub mod ompo;
pub mod opt;
pub mod util;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Copy, Deserialize, Serialize, PartialEq)]
/// Device for using tch.
///
/// This enum is added because [`tch::Device`] does not support serialization.
pub enum Device {
    /// The main CPU device.
    Cpu,

    /// The main GPU device.
    Cuda(usize),
}

impl Device {
    /// CUDA device `n` if CUDA is available, CPU otherwise.
    pub fn cuda_if_available(n: usize) -> Self {
        match tch::Cuda::is_available() {
            true => Self::Cuda(n),
            false => Self::Cpu,
        }
    }
}

impl From<tch::Device> for Device {
    fn from(device: tch::Device) -> Self {
        match device {
            tch::Device::Cuda(n) => Self::Cuda(n),
            _ => Self::Cpu,
        }
    }
}

impl From<Device> for tch::Device {
    fn from(device: Device) -> Self {
        match device {
            Device::Cpu => tch::Device::Cpu,
            Device::Cuda(n) => tch::Device::Cuda(n),
        }
    }
}
