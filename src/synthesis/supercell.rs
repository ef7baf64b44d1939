use crate::core::error::{SynthesisError, SynthesisResult};
use crate::core::structure::{Atom, Crystal};
use nalgebra::Vector3;

/// Upper bound on `nx * ny * nz`.
pub const MAX_SUPERCELL_CELLS: usize = 1000;

/// Rejects zero dimensions and replications beyond [`MAX_SUPERCELL_CELLS`].
pub fn check_dims(dims: [usize; 3]) -> SynthesisResult<()> {
    if dims.iter().any(|&n| n == 0) {
        return Err(SynthesisError::InvalidRequest(format!(
            "supercell dimensions must be positive, got {:?}",
            dims
        )));
    }
    let cells = dims.iter().try_fold(1usize, |acc, &n| acc.checked_mul(n));
    match cells {
        Some(cells) if cells <= MAX_SUPERCELL_CELLS => Ok(()),
        _ => Err(SynthesisError::InvalidRequest(format!(
            "supercell {:?} exceeds {} cells",
            dims, MAX_SUPERCELL_CELLS
        ))),
    }
}

/// Replicates `crystal` `dims[i]` times along lattice vector `i`.
///
/// Image shifts form the outer loop and atoms the inner one, so the first
/// `N` atoms of the result are the original cell in its original order.
/// Dimensions must pass [`check_dims`]; `StructureRequest::validate` enforces
/// that before the engine gets here.
pub fn make_supercell(crystal: &Crystal, dims: [usize; 3]) -> Crystal {
    if dims == [1, 1, 1] {
        return crystal.clone();
    }
    let [nx, ny, nz] = dims.map(|n| n.max(1));

    // 1. Scale the cell; positive integer factors keep it non-degenerate.
    let lattice = crystal.lattice.scaled([nx, ny, nz]);

    // 2. Map every atom of every image into the new fractional frame.
    let n = Vector3::new(nx as f64, ny as f64, nz as f64);
    let images = (0..nx).flat_map(|i| (0..ny).flat_map(move |j| (0..nz).map(move |k| Vector3::new(i as f64, j as f64, k as f64))));

    let atoms = images
        .flat_map(|shift| {
            crystal.atoms.iter().map(move |atom| {
                let frac = (atom.fractional_coords + shift).component_div(&n);
                Atom::new(atom.element.clone(), frac)
            })
        })
        .collect();

    Crystal {
        lattice,
        atoms,
        periodic: crystal.periodic,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oversized_replication_is_rejected() {
        assert!(check_dims([10, 10, 10]).is_ok());
        for dims in [[0, 1, 1], [11, 10, 10], [100_000, 100_000, 100_000], [usize::MAX, 2, 1]] {
            assert!(matches!(check_dims(dims), Err(SynthesisError::InvalidRequest(_))), "{:?}", dims);
        }
    }
    use crate::core::structure::Lattice;
    use approx::assert_relative_eq;

    #[test]
    fn replication_multiplies_atoms_and_scales_cell() {
        let base = Crystal::new(
            Lattice::hexagonal(3.0, 5.0).unwrap(),
            vec![
                Atom::new("Zn", Vector3::new(1.0 / 3.0, 2.0 / 3.0, 0.0)),
                Atom::new("O", Vector3::new(1.0 / 3.0, 2.0 / 3.0, 0.375)),
            ],
        );
        let sc = make_supercell(&base, [2, 3, 1]);
        assert_eq!(sc.n_atoms(), 12);
        assert_relative_eq!(sc.lattice.vector(0), base.lattice.vector(0) * 2.0, epsilon = 1e-12);
        assert_relative_eq!(sc.lattice.vector(1), base.lattice.vector(1) * 3.0, epsilon = 1e-12);
        assert_relative_eq!(sc.lattice.volume(), base.lattice.volume() * 6.0, epsilon = 1e-9);

        // Reciprocal matrix stays consistent with the scaled cell.
        let cart = sc.lattice.to_cartesian(&Vector3::new(0.25, 0.5, 0.75));
        assert_relative_eq!(sc.lattice.to_fractional(&cart), Vector3::new(0.25, 0.5, 0.75), epsilon = 1e-12);

        // The original cell comes first, unchanged in Cartesian space.
        for (orig, rep) in base.cartesian_positions().iter().zip(sc.cartesian_positions()) {
            assert_relative_eq!(*orig, rep, epsilon = 1e-12);
        }
    }
}
