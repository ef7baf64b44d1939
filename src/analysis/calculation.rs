use crate::core::structure::Crystal;
use std::fmt;

/// Energy per atom reported by [`MockFoundationModel`] (eV).
pub const MOCK_ENERGY_PER_ATOM: f64 = -5.0;

/// Scalars handed to the presentation layer after a structure is evaluated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalculationResult {
    /// Total energy (eV).
    pub energy: f64,
    /// Largest per-atom force magnitude (eV/Å).
    pub max_force: f64,
    pub n_atoms: usize,
}

impl CalculationResult {
    pub fn energy_per_atom(&self) -> Option<f64> {
        (self.n_atoms > 0).then(|| self.energy / self.n_atoms as f64)
    }
}

impl fmt::Display for CalculationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E = {:.4} eV | max |F| = {:.4} eV/Å", self.energy, self.max_force)
    }
}

/// Anything that can put an energy and forces on a structure.
pub trait Calculator {
    fn name(&self) -> &str;
    fn calculate(&self, crystal: &Crystal) -> CalculationResult;
}

/// Placeholder for a machine-learned potential.
///
/// Depends only on the atom count; generated structures sit on ideal lattice
/// sites, so the reported force is zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockFoundationModel;

impl Calculator for MockFoundationModel {
    fn name(&self) -> &str {
        "mock-foundation-model"
    }

    fn calculate(&self, crystal: &Crystal) -> CalculationResult {
        let n_atoms = crystal.n_atoms();
        log::debug!("{} evaluating {} atoms", self.name(), n_atoms);
        CalculationResult {
            energy: MOCK_ENERGY_PER_ATOM * n_atoms as f64,
            max_force: 0.0,
            n_atoms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::structure::{Atom, Lattice};
    use nalgebra::Vector3;

    #[test]
    fn energy_scales_with_atom_count() {
        let lattice = Lattice::cubic(3.0).unwrap();
        let atoms = vec![
            Atom::new("Cs", Vector3::zeros()),
            Atom::new("Cl", Vector3::new(0.5, 0.5, 0.5)),
        ];
        let result = MockFoundationModel.calculate(&Crystal::new(lattice, atoms));
        assert_eq!(result.n_atoms, 2);
        assert_eq!(result.energy, -10.0);
        assert_eq!(result.max_force, 0.0);
        assert_eq!(result.energy_per_atom(), Some(-5.0));
    }
}
