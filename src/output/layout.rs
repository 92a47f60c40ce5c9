//! Output variable registry and record assembly.

use std::ops::Range;

use nalgebra::{Matrix3, Vector3};

use crate::domain::{DriverState, SYMM_LABELS, StepOutcome, StepRecord, TENS_LABELS};
use crate::material::Material;
use crate::math::flatten;

/// Shape of a registered variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    Scalar,
    /// Three components, `_X`, `_Y`, `_Z`.
    Vector,
    /// Six symmetric components in storage order.
    SymTens,
    /// Nine full-tensor components, row-major.
    Tens,
}

impl VariableKind {
    fn suffixes(self) -> &'static [&'static str] {
        match self {
            VariableKind::Scalar => &[],
            VariableKind::Vector => &["X", "Y", "Z"],
            VariableKind::SymTens => &SYMM_LABELS,
            VariableKind::Tens => &TENS_LABELS,
        }
    }
}

/// Column names of the global and element blocks of a record.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VariableLayout {
    globals: Vec<String>,
    elements: Vec<String>,
}

/// Unit-cube node coordinates, hexahedron ordering.
pub const NODES: [[f64; 3]; 8] = [
    [-0.5, -0.5, -0.5],
    [0.5, -0.5, -0.5],
    [0.5, 0.5, -0.5],
    [-0.5, 0.5, -0.5],
    [-0.5, -0.5, 0.5],
    [0.5, -0.5, 0.5],
    [0.5, 0.5, 0.5],
    [-0.5, 0.5, 0.5],
];

impl VariableLayout {
    /// Empty layout carrying only the standard global scalars.
    pub fn new() -> Self {
        Self {
            globals: ["TIME_STEP", "STEP_NUM", "LEG_NUM", "NEWTON_ITERS"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            elements: Vec::new(),
        }
    }

    /// Layout of a solid-driver record for `material`.
    pub fn solid(material: &dyn Material) -> Self {
        let mut layout = Self::new();
        layout.register("STRESS", VariableKind::SymTens);
        layout.register("STRAIN", VariableKind::SymTens);
        layout.register("D", VariableKind::SymTens);
        layout.register("DEFGRAD", VariableKind::Tens);
        layout.register("EFIELD", VariableKind::Vector);
        layout.register("TMPR", VariableKind::Scalar);
        for name in material.state_names() {
            layout.register(&name, VariableKind::Scalar);
        }
        layout
    }

    /// Layout of an EOS-driver record.
    pub fn eos() -> Self {
        let mut layout = Self::new();
        for name in ["RHO", "TMPR", "ENRGY", "PRES", "DPDT", "DEDT"] {
            layout.register(name, VariableKind::Scalar);
        }
        layout.register("DEFGRAD", VariableKind::Tens);
        layout
    }

    /// Append an element variable, returning its column range in the
    /// element block.
    pub fn register(&mut self, name: &str, kind: VariableKind) -> Range<usize> {
        let start = self.elements.len();
        let name = name.to_uppercase();
        match kind {
            VariableKind::Scalar => self.elements.push(name),
            _ => self
                .elements
                .extend(kind.suffixes().iter().map(|s| format!("{name}_{s}"))),
        }
        start..self.elements.len()
    }

    pub fn globals(&self) -> &[String] {
        &self.globals
    }

    pub fn elements(&self) -> &[String] {
        &self.elements
    }

    /// Full output header: `TIME`, globals, elements, nodal displacements.
    pub fn header(&self) -> Vec<String> {
        let mut header = Vec::with_capacity(1 + self.globals.len() + self.elements.len() + 24);
        header.push("TIME".to_string());
        header.extend(self.globals.iter().cloned());
        header.extend(self.elements.iter().cloned());
        for node in 1..=NODES.len() {
            for axis in ["X", "Y", "Z"] {
                header.push(format!("U{node}_{axis}"));
            }
        }
        header
    }

    /// Number of values in a flattened record.
    pub fn width(&self) -> usize {
        1 + self.globals.len() + self.elements.len() + 3 * NODES.len()
    }
}

/// Nodal displacements `u = F X - X` of the unit cube.
pub fn nodal_displacements(defgrad: &Matrix3<f64>) -> Vec<f64> {
    let mut out = Vec::with_capacity(3 * NODES.len());
    for node in NODES {
        let x = Vector3::from(node);
        let u = defgrad * x - x;
        out.extend(u.iter());
    }
    out
}

/// Assemble a solid-driver record from the committed state.
pub fn solid_record(state: &DriverState, time_step: f64, leg_number: usize, outcome: &StepOutcome) -> StepRecord {
    let global = vec![
        time_step,
        state.step as f64,
        leg_number as f64,
        outcome.iterations as f64,
    ];

    let mut element = Vec::with_capacity(31 + state.state_vars.len());
    element.extend(state.stress.iter());
    element.extend(state.strain.iter());
    element.extend(state.stretching.iter());
    element.extend(flatten(&state.defgrad));
    element.extend(state.efield);
    element.push(state.temperature);
    element.extend(state.state_vars.iter());

    StepRecord {
        time: state.time,
        global,
        element,
        displacement: nodal_displacements(&state.defgrad),
    }
}

impl StepRecord {
    /// Record values in header order.
    pub fn flattened(&self) -> Vec<f64> {
        let mut row = Vec::with_capacity(1 + self.global.len() + self.element.len() + self.displacement.len());
        row.push(self.time);
        row.extend(&self.global);
        row.extend(&self.element);
        row.extend(&self.displacement);
        row
    }
}
