//! Observation and action of the simulators.
use ompo_core::{Act, Obs};

/// Observation of a simulator.
#[derive(Clone, Debug, PartialEq)]
pub struct SimObs(pub Vec<f32>);

impl Obs for SimObs {
    fn to_vec(&self) -> Vec<f32> {
        self.0.clone()
    }

    fn dim(&self) -> usize {
        self.0.len()
    }
}

impl From<Vec<f32>> for SimObs {
    fn from(v: Vec<f32>) -> Self {
        Self(v)
    }
}

/// Action of a simulator.
#[derive(Clone, Debug, PartialEq)]
pub struct SimAct(pub Vec<f32>);

impl Act for SimAct {
    fn to_vec(&self) -> Vec<f32> {
        self.0.clone()
    }

    fn dim(&self) -> usize {
        self.0.len()
    }
}

impl From<Vec<f32>> for SimAct {
    fn from(v: Vec<f32>) -> Self {
        Self(v)
    }
}
