//! One generator per structure family.
//!
//! Each generator tries a symmetry construction first (space group + Wyckoff
//! basis expanded to the conventional cell). When that stage reports
//! [`SymmetryUnavailable`], an explicit coordinate list with the same
//! stoichiometry is used instead. Whatever stage produced the cell, its atom
//! count must equal the family's canonical count.

use crate::chemistry::elements::normalize_symbol;
use crate::core::structure::{Atom, Crystal, Lattice};
use crate::math::symmetry::SpaceGroup;
use crate::synthesis::family::StructureFamily;
use nalgebra::Vector3;
use std::fmt;

/// Oxygen x parameter of the rutile 4f site.
const RUTILE_U: f64 = 0.305;
/// Anion placed on the X sites of an ABX3 perovskite given only A and B.
const PEROVSKITE_IMPLICIT_ANION: &str = "O";

type Basis = Vec<(String, Vector3<f64>)>;

// ============================================================================
// RESULT TYPES
// ============================================================================

/// Why the symmetry stage did not produce a cell.
#[derive(Debug, Clone, PartialEq)]
pub struct SymmetryUnavailable(pub String);

impl fmt::Display for SymmetryUnavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which stage produced a generated cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Construction {
    Symmetry { space_group: u16 },
    Explicit { reason: SymmetryUnavailable },
}

#[derive(Debug, Clone)]
pub struct GeneratedCell {
    pub crystal: Crystal,
    pub construction: Construction,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GenerationFailure {
    /// The family takes a different number of species.
    ElementCount { family: StructureFamily, expected: (usize, usize), got: usize },
    UnknownElement(String),
    InvalidLattice(String),
    /// Atom count differs from the canonical count after both stages.
    Defect { family: StructureFamily, expected: usize, got: usize, symmetry_cause: Option<String> },
}

impl fmt::Display for GenerationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ElementCount { family, expected: (lo, hi), got } => {
                if lo == hi {
                    write!(f, "{} takes {} element(s), got {}", family, lo, got)
                } else {
                    write!(f, "{} takes {} to {} elements, got {}", family, lo, hi, got)
                }
            }
            Self::UnknownElement(s) => write!(f, "'{}' is not an element symbol", s),
            Self::InvalidLattice(msg) => write!(f, "invalid lattice: {}", msg),
            Self::Defect { family, expected, got, symmetry_cause } => {
                write!(f, "{} produced {} atoms, expected {}", family, got, expected)?;
                if let Some(cause) = symmetry_cause {
                    write!(f, " (symmetry stage: {})", cause)?;
                }
                Ok(())
            }
        }
    }
}

// ============================================================================
// ENTRY POINT
// ============================================================================

/// Builds the conventional cell of `family` for `elements` with lattice constants `a` (and `c`).
///
/// `c` is only read by families with an independent c axis; when absent the
/// family's tabulated c/a ratio applies.
pub fn generate<S: AsRef<str>>(
    family: StructureFamily,
    elements: &[S],
    a: f64,
    c: Option<f64>,
) -> Result<GeneratedCell, GenerationFailure> {
    let species = validate_elements(family, elements)?;
    if !(a.is_finite() && a > 0.0) {
        return Err(GenerationFailure::InvalidLattice(format!("a = {} Å", a)));
    }
    let c = match (c, family.default_c_ratio()) {
        (Some(c), _) => c,
        (None, Some(ratio)) => ratio * a,
        (None, None) => a,
    };
    if !(c.is_finite() && c > 0.0) {
        return Err(GenerationFailure::InvalidLattice(format!("c = {} Å", c)));
    }

    let lattice = cell_for(family, a, c).map_err(|e| GenerationFailure::InvalidLattice(e.to_string()))?;

    // Stage 1: symmetry construction.
    let (basis, construction) = match symmetry_basis(family, &species) {
        Ok((group, basis)) if basis.len() == family.canonical_atom_count() => {
            (basis, Construction::Symmetry { space_group: group })
        }
        Ok((group, basis)) => {
            let reason = SymmetryUnavailable(format!(
                "space group {} expanded to {} atoms instead of {}",
                group,
                basis.len(),
                family.canonical_atom_count()
            ));
            log::warn!("{}: {}; using explicit coordinates", family, reason);
            (explicit_basis(family, &species), Construction::Explicit { reason })
        }
        Err(reason) => {
            log::debug!("{}: {}; using explicit coordinates", family, reason);
            (explicit_basis(family, &species), Construction::Explicit { reason })
        }
    };

    // Stage 2 must reproduce the canonical count as well.
    if basis.len() != family.canonical_atom_count() {
        let symmetry_cause = match &construction {
            Construction::Explicit { reason } => Some(reason.0.clone()),
            Construction::Symmetry { .. } => None,
        };
        return Err(GenerationFailure::Defect {
            family,
            expected: family.canonical_atom_count(),
            got: basis.len(),
            symmetry_cause,
        });
    }

    let atoms = basis.into_iter().map(|(el, frac)| Atom::new(el, frac)).collect();
    Ok(GeneratedCell {
        crystal: Crystal::new(lattice, atoms),
        construction,
    })
}

fn validate_elements<S: AsRef<str>>(family: StructureFamily, elements: &[S]) -> Result<Vec<String>, GenerationFailure> {
    let (lo, hi) = family.element_range();
    if elements.len() < lo || elements.len() > hi {
        return Err(GenerationFailure::ElementCount {
            family,
            expected: (lo, hi),
            got: elements.len(),
        });
    }
    elements
        .iter()
        .map(|e| {
            normalize_symbol(e.as_ref())
                .map(str::to_string)
                .ok_or_else(|| GenerationFailure::UnknownElement(e.as_ref().to_string()))
        })
        .collect()
}

fn cell_for(family: StructureFamily, a: f64, c: f64) -> Result<Lattice, &'static str> {
    match family {
        StructureFamily::Hcp | StructureFamily::Wurtzite | StructureFamily::Quartz => Lattice::hexagonal(a, c),
        StructureFamily::Rutile => Lattice::orthorhombic(a, a, c),
        _ => Lattice::cubic(a),
    }
}

// ============================================================================
// STAGE 1: SYMMETRY CONSTRUCTION
// ============================================================================

fn symmetry_basis(family: StructureFamily, species: &[String]) -> Result<(u16, Basis), SymmetryUnavailable> {
    use StructureFamily::*;

    let v = Vector3::new;
    let third = 1.0 / 3.0;
    let (group, wyckoff): (u16, Basis) = match family {
        Fcc => (225, vec![(species[0].clone(), v(0.0, 0.0, 0.0))]),
        Bcc => (229, vec![(species[0].clone(), v(0.0, 0.0, 0.0))]),
        Sc => (221, vec![(species[0].clone(), v(0.0, 0.0, 0.0))]),
        Diamond => (227, vec![(species[0].clone(), v(0.0, 0.0, 0.0))]),
        Hcp => (194, vec![(species[0].clone(), v(third, 2.0 * third, 0.25))]),
        Rocksalt => (225, vec![
            (species[0].clone(), v(0.0, 0.0, 0.0)),
            (species[1].clone(), v(0.5, 0.5, 0.5)),
        ]),
        Zincblende => (216, vec![
            (species[0].clone(), v(0.0, 0.0, 0.0)),
            (species[1].clone(), v(0.25, 0.25, 0.25)),
        ]),
        Wurtzite => (186, vec![
            (species[0].clone(), v(third, 2.0 * third, 0.0)),
            (species[1].clone(), v(third, 2.0 * third, 0.375)),
        ]),
        Perovskite => {
            if species.len() < 3 {
                return Err(SymmetryUnavailable(format!(
                    "ABX3 needs three species, got {}",
                    species.len()
                )));
            }
            (221, vec![
                (species[0].clone(), v(0.0, 0.0, 0.0)),
                (species[1].clone(), v(0.5, 0.5, 0.5)),
                (species[2].clone(), v(0.0, 0.5, 0.5)),
            ])
        }
        Rutile => (136, vec![
            (species[0].clone(), v(0.0, 0.0, 0.0)),
            (species[1].clone(), v(RUTILE_U, RUTILE_U, 0.0)),
        ]),
        Quartz | Cristobalite => {
            return Err(SymmetryUnavailable(format!(
                "the simplified {}-atom {} cell has no space-group description",
                family.canonical_atom_count(),
                family
            )));
        }
    };

    let group_ops = SpaceGroup::from_number(group).map_err(SymmetryUnavailable)?;
    let sites = group_ops.expand(&wyckoff);
    if sites.is_empty() {
        return Err(SymmetryUnavailable(format!("space group {} produced no atoms", group)));
    }
    Ok((group, sites))
}

// ============================================================================
// STAGE 2: EXPLICIT COORDINATES
// ============================================================================

/// Hand-written fractional coordinates reproducing the canonical cell of each family.
fn explicit_basis(family: StructureFamily, species: &[String]) -> Basis {
    use StructureFamily::*;

    let place = |el: &str, coords: &[[f64; 3]]| -> Basis {
        coords.iter().map(|p| (el.to_string(), Vector3::from(*p))).collect()
    };
    const FCC: [[f64; 3]; 4] = [[0.0, 0.0, 0.0], [0.5, 0.5, 0.0], [0.5, 0.0, 0.5], [0.0, 0.5, 0.5]];
    let third = 1.0 / 3.0;

    match family {
        Fcc => place(&species[0], &FCC),
        Bcc => place(&species[0], &[[0.0, 0.0, 0.0], [0.5, 0.5, 0.5]]),
        Sc => place(&species[0], &[[0.0, 0.0, 0.0]]),
        Diamond => {
            let mut basis = place(&species[0], &FCC);
            basis.extend(place(&species[0], &shifted(&FCC, 0.25)));
            basis
        }
        Hcp => place(&species[0], &[[third, 2.0 * third, 0.25], [2.0 * third, third, 0.75]]),
        Rocksalt => {
            let mut basis = place(&species[0], &FCC);
            basis.extend(place(&species[1], &shifted(&FCC, 0.5)));
            basis
        }
        Zincblende => {
            let mut basis = place(&species[0], &FCC);
            basis.extend(place(&species[1], &shifted(&FCC, 0.25)));
            basis
        }
        Wurtzite => {
            let mut basis = place(&species[0], &[[third, 2.0 * third, 0.0], [2.0 * third, third, 0.5]]);
            basis.extend(place(&species[1], &[[third, 2.0 * third, 0.375], [2.0 * third, third, 0.875]]));
            basis
        }
        Perovskite => {
            // Ideal cubic ABX3 only; tilted or distorted variants are not modelled.
            let anion = species.get(2).map(String::as_str).unwrap_or(PEROVSKITE_IMPLICIT_ANION);
            let mut basis = place(&species[0], &[[0.0, 0.0, 0.0]]);
            basis.extend(place(&species[1], &[[0.5, 0.5, 0.5]]));
            basis.extend(place(anion, &[[0.5, 0.5, 0.0], [0.5, 0.0, 0.5], [0.0, 0.5, 0.5]]));
            basis
        }
        Rutile => {
            let u = RUTILE_U;
            let mut basis = place(&species[0], &[[0.0, 0.0, 0.0], [0.5, 0.5, 0.5]]);
            basis.extend(place(&species[1], &[
                [u, u, 0.0],
                [1.0 - u, 1.0 - u, 0.0],
                [0.5 + u, 0.5 - u, 0.5],
                [0.5 - u, 0.5 + u, 0.5],
            ]));
            basis
        }
        Quartz => {
            let mut basis = place(&species[0], &[[0.0, 0.0, 0.0]]);
            basis.extend(place(&species[1], &[[third, 2.0 * third, third], [2.0 * third, third, 2.0 * third]]));
            basis
        }
        Cristobalite => {
            let mut basis = place(&species[0], &[[0.0, 0.0, 0.0], [0.25, 0.25, 0.25]]);
            basis.extend(place(&species[1], &[
                [0.125, 0.125, 0.125],
                [0.375, 0.375, 0.375],
                [0.5, 0.25, 0.25],
                [0.25, 0.5, 0.25],
            ]));
            basis
        }
    }
}

fn shifted(coords: &[[f64; 3]; 4], by: f64) -> [[f64; 3]; 4] {
    coords.map(|p| p.map(|x| (x + by).rem_euclid(1.0)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_family_reaches_its_canonical_count() {
        for family in StructureFamily::ALL {
            let elements: Vec<&str> = match family.element_range() {
                (1, _) => vec!["Si"],
                (2, 2) => vec!["Zn", "S"],
                _ => vec!["Ba", "Ti", "O"],
            };
            let cell = generate(family, &elements, 4.0, None).unwrap();
            assert_eq!(cell.crystal.n_atoms(), family.canonical_atom_count(), "{}", family);
        }
    }

    #[test]
    fn symmetry_and_explicit_stages_agree() {
        for family in [StructureFamily::Fcc, StructureFamily::Rocksalt, StructureFamily::Wurtzite, StructureFamily::Rutile] {
            let species: Vec<String> = if family.element_range().1 == 1 { vec!["Cu".into()] } else { vec!["Ti".into(), "O".into()] };
            let (_, mut sym) = symmetry_basis(family, &species).unwrap();
            let mut explicit = explicit_basis(family, &species);
            let key = |s: &(String, Vector3<f64>)| (s.0.clone(), (s.1.x * 1e4).round() as i64, (s.1.y * 1e4).round() as i64, (s.1.z * 1e4).round() as i64);
            sym.sort_by_key(key);
            explicit.sort_by_key(key);
            let sym: Vec<_> = sym.iter().map(key).collect();
            let explicit: Vec<_> = explicit.iter().map(key).collect();
            assert_eq!(sym, explicit, "{}", family);
        }
    }

    #[test]
    fn two_element_perovskite_uses_explicit_stage() {
        let cell = generate(StructureFamily::Perovskite, &["Sr", "Ti"], 3.9, None).unwrap();
        assert!(matches!(cell.construction, Construction::Explicit { .. }));
        assert_eq!(cell.crystal.species(), vec!["Sr", "Ti", "O", "O", "O"]);
    }

    #[test]
    fn wrong_element_count_is_reported() {
        let err = generate(StructureFamily::Rocksalt, &["Na"], 5.64, None).unwrap_err();
        assert!(matches!(err, GenerationFailure::ElementCount { got: 1, .. }));
        let err = generate(StructureFamily::Fcc, &["Xx99"], 4.0, None).unwrap_err();
        assert_eq!(err, GenerationFailure::UnknownElement("Xx99".into()));
    }
}
