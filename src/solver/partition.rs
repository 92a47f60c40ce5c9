use crate::domain::ControlCode;

/// Split of the six components into known-strain and Newton-unknown sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlPartition {
    strain_idx: Vec<usize>,
    stress_idx: Vec<usize>,
}

impl ControlPartition {
    pub fn new(control: &[ControlCode; 6]) -> Self {
        let (stress_idx, strain_idx): (Vec<usize>, Vec<usize>) =
            (0..6).partition(|&i| control[i].is_stress_like());
        Self {
            strain_idx,
            stress_idx,
        }
    }

    /// Components whose strain increment is prescribed.
    pub fn strain_idx(&self) -> &[usize] {
        &self.strain_idx
    }

    /// Components whose strain increment is solved for.
    pub fn stress_idx(&self) -> &[usize] {
        &self.stress_idx
    }

    pub fn is_strain_only(&self) -> bool {
        self.stress_idx.is_empty()
    }
}
