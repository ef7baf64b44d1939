use approx::assert_abs_diff_eq;
use crystal_structure_generator::synthesis::engine::Resolution;
use crystal_structure_generator::{
    synthesize, structure_report, Calculator, ErrorKind, LatticeDatabase, MockFoundationModel, StructureFamily,
    StructureRequest, StructureSynthesizer, SynthesisError,
};

fn build(request: StructureRequest) -> crystal_structure_generator::Crystal {
    synthesize(&request).unwrap_or_else(|e| panic!("{:?} failed: {}", request, e))
}

// ============================================================================
// SCENARIOS
// ============================================================================

#[test]
fn silicon_is_an_eight_atom_diamond_cell() {
    let crystal = build(StructureRequest::new("Si"));
    assert_eq!(crystal.n_atoms(), 8);
    assert!(crystal.species().iter().all(|s| *s == "Si"));

    let (a, b, c, alpha, beta, gamma) = crystal.lattice.to_parameters();
    for edge in [a, b, c] {
        assert_abs_diff_eq!(edge, 5.43, epsilon = 1e-9);
    }
    for angle in [alpha, beta, gamma] {
        assert_abs_diff_eq!(angle, 90.0, epsilon = 1e-9);
    }
}

#[test]
fn rocksalt_with_lattice_override() {
    let crystal = build(StructureRequest::new("NaCl").with_lattice_parameter(6.0));
    let counts = crystal.species_counts();
    assert_eq!(counts["Na"], 4);
    assert_eq!(counts["Cl"], 4);
    assert_abs_diff_eq!(crystal.lattice.vector(0).norm(), 6.0, epsilon = 1e-9);
    assert_abs_diff_eq!(crystal.lattice.volume(), 216.0, epsilon = 1e-6);
}

#[test]
fn aluminium_supercell_has_32_atoms() {
    let crystal = build(StructureRequest::new("Al").with_supercell([2, 2, 2]));
    assert_eq!(crystal.n_atoms(), 32);
    assert_abs_diff_eq!(crystal.lattice.vector(2).norm(), 8.10, epsilon = 1e-9);
}

#[test]
fn unknown_material_is_unresolved() {
    let err = synthesize(&StructureRequest::new("Xx99")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnresolvedMaterial);
    assert!(!err.is_connectivity());
}

#[test]
fn names_and_aliases_resolve() {
    assert_eq!(build(StructureRequest::new("silicon")), build(StructureRequest::new("Si")));
    assert_eq!(build(StructureRequest::new("rock salt")), build(StructureRequest::new("NaCl")));
}

#[test]
fn hcp_entry_keeps_its_c_axis() {
    let crystal = build(StructureRequest::new("Mg"));
    let (a, _, c, _, _, gamma) = crystal.lattice.to_parameters();
    assert_eq!(crystal.n_atoms(), 2);
    assert_abs_diff_eq!(a, 3.21, epsilon = 1e-9);
    assert_abs_diff_eq!(c, 5.21, epsilon = 1e-9);
    assert_abs_diff_eq!(gamma, 120.0, epsilon = 1e-9);
}

#[test]
fn element_without_entry_falls_back_to_fcc() {
    let synthesis = StructureSynthesizer::new()
        .synthesize_detailed(&StructureRequest::new("Ir"))
        .unwrap();
    assert_eq!(synthesis.plan.resolution, Resolution::ElementFallback);
    assert_eq!(synthesis.plan.family, StructureFamily::Fcc);
    assert_eq!(synthesis.crystal.n_atoms(), 4);
    assert_abs_diff_eq!(synthesis.crystal.lattice.volume(), 64.0, epsilon = 1e-9);
}

#[test]
fn family_override_applies_to_element_entries() {
    let crystal = build(StructureRequest::new("Cu").with_structure_type(StructureFamily::Bcc));
    assert_eq!(crystal.n_atoms(), 2);
    assert_abs_diff_eq!(crystal.lattice.vector(0).norm(), 3.61, epsilon = 1e-9);
}

#[test]
fn compound_hint_finds_the_entry() {
    let synthesis = StructureSynthesizer::new()
        .synthesize_detailed(&StructureRequest::new("my semiconductor").with_compound(["Ga", "As"]))
        .unwrap();
    assert!(matches!(synthesis.plan.resolution, Resolution::CompoundHint { ref key, .. } if key == "gaas"));
    assert_eq!(synthesis.crystal.n_atoms(), 8);
    assert_abs_diff_eq!(synthesis.plan.a, 5.65, epsilon = 1e-12);
}

#[test]
fn ternary_hint_without_entry_builds_perovskite() {
    let synthesis = StructureSynthesizer::new()
        .synthesize_detailed(&StructureRequest::new("LaAlO3").with_compound(["La", "Al", "O"]))
        .unwrap();
    assert_eq!(synthesis.plan.resolution, Resolution::GenericCompound);
    assert_eq!(synthesis.crystal.species(), vec!["La", "Al", "O", "O", "O"]);
    assert_abs_diff_eq!(synthesis.plan.a, 5.0, epsilon = 1e-12);
}

#[test]
fn hint_never_resolves_to_an_entry_missing_its_species() {
    for hint in [["S", "I"], ["N", "O"], ["C", "O"]] {
        let synthesis = StructureSynthesizer::new()
            .synthesize_detailed(&StructureRequest::new("custom").with_compound(hint))
            .unwrap();
        assert_eq!(synthesis.plan.resolution, Resolution::GenericCompound, "{:?}", hint);
        let species = synthesis.crystal.species();
        for el in hint {
            assert!(species.contains(&el), "{:?} produced {}", hint, synthesis.crystal.formula());
        }
    }
}

#[test]
fn four_element_hint_without_entry_is_unresolved() {
    let err = synthesize(&StructureRequest::new("mix").with_compound(["Xe", "Rn", "Kr", "Ar"])).unwrap_err();
    assert!(matches!(err, SynthesisError::UnresolvedMaterial { .. }), "{:?}", err);
}

#[test]
fn incompatible_family_override_is_unresolvable() {
    let err = synthesize(&StructureRequest::new("NaCl").with_structure_type(StructureFamily::Fcc)).unwrap_err();
    match err {
        SynthesisError::UnresolvableStructure { family, elements, .. } => {
            assert_eq!(family, "fcc");
            assert_eq!(elements, vec!["Na", "Cl"]);
        }
        other => panic!("expected UnresolvableStructure, got {:?}", other),
    }
}

#[test]
fn invalid_supercell_is_rejected() {
    let err = synthesize(&StructureRequest::new("Si").with_supercell([0, 1, 1])).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
}

// ============================================================================
// PROPERTIES
// ============================================================================

#[test]
fn every_compound_keeps_its_stoichiometry() {
    let db = LatticeDatabase::global();
    for entry in db.compounds() {
        let crystal = build(StructureRequest::new(entry.key.as_str()));
        let counts = crystal.species_counts();
        assert_eq!(counts.len(), entry.elements.len(), "{}", entry.key);

        // n_i / s_i must be the same for every species.
        for (el, &s) in entry.elements.iter().zip(&entry.stoichiometry) {
            assert_eq!(
                counts[*el] * entry.stoichiometry[0] as usize,
                counts[entry.elements[0]] * s as usize,
                "{}: {:?}",
                entry.key,
                counts
            );
        }
    }
}

#[test]
fn no_compound_collapses_to_a_single_atom() {
    let db = LatticeDatabase::global();
    for entry in db.compounds() {
        for dims in [[1, 1, 1], [1, 1, 2]] {
            let crystal = build(StructureRequest::new(entry.key.as_str()).with_supercell(dims));
            assert!(crystal.n_atoms() >= 2, "{} gave {} atoms", entry.key, crystal.n_atoms());
        }
    }
}

#[test]
fn every_element_reaches_its_family_count() {
    let db = LatticeDatabase::global();
    for entry in db.elements() {
        let crystal = build(StructureRequest::new(entry.key.as_str()));
        assert_eq!(crystal.n_atoms(), entry.family.canonical_atom_count(), "{}", entry.key);
    }
}

#[test]
fn supercell_scales_atoms_and_cell() {
    for material in ["ZnO", "TiO2", "BaTiO3", "Fe"] {
        let base = build(StructureRequest::new(material));
        for dims in [[1, 1, 1], [2, 1, 1], [1, 3, 2], [2, 2, 2]] {
            let crystal = build(StructureRequest::new(material).with_supercell(dims));
            let factor = dims.iter().product::<usize>();
            assert_eq!(crystal.n_atoms(), base.n_atoms() * factor, "{} {:?}", material, dims);

            for axis in 0..3 {
                let expected = base.lattice.vector(axis) * dims[axis] as f64;
                assert_abs_diff_eq!((crystal.lattice.vector(axis) - expected).norm(), 0.0, epsilon = 1e-9);
            }
            for (el, n) in base.species_counts() {
                assert_eq!(crystal.species_counts()[&el], n * factor);
            }
        }
    }
}

#[test]
fn synthesis_is_deterministic() {
    let request = StructureRequest::new("SrTiO3").with_supercell([2, 1, 2]);
    let first = build(request.clone());
    let second = build(request);
    assert_eq!(first, second);
}

#[test]
fn material_names_are_case_insensitive() {
    let reference = build(StructureRequest::new("NaCl"));
    for name in ["nacl", "NACL", "  NaCl "] {
        assert_eq!(build(StructureRequest::new(name)), reference, "{}", name);
    }
}

#[test]
fn report_includes_stub_energy() {
    let crystal = build(StructureRequest::new("Si"));
    let (result, report) = structure_report(&crystal, &MockFoundationModel);
    assert_eq!(result, MockFoundationModel.calculate(&crystal));
    assert_abs_diff_eq!(result.energy, -40.0, epsilon = 1e-12);
    assert!(report.contains("Si"));
    assert!(report.contains("-40.0000 eV"));
}
