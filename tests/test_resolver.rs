use crystal_structure_generator::config::FetchConfig;
use crystal_structure_generator::sources::resolver::detect_source;
use crystal_structure_generator::{
    synthesize, writer, ErrorKind, SourceParams, SourceResolver, SourceType, StructureFormat, StructureRequest,
    SynthesisError,
};
use std::fs;

/// Resolver that never sees real credentials from the environment.
fn offline_resolver() -> SourceResolver {
    SourceResolver::new(FetchConfig {
        max_retries: 1,
        ..FetchConfig::from_lookup(|_| None)
    })
}

const ZNS_XYZ: &str = "\
2
Lattice=\"3.82 0 0 -1.91 3.30822 0 0 0 6.26\" pbc=\"T T T\"
Zn 0.0 2.20548 0.0
S  0.0 2.20548 2.3475
";

// ============================================================================
// AUTO-DETECTION
// ============================================================================

#[test]
fn detects_database_ids_and_urls() {
    assert_eq!(detect_source("mp-149"), Some(SourceType::Mp));
    assert_eq!(detect_source(" MP-2534 "), Some(SourceType::Mp));
    assert_eq!(detect_source("https://example.org/NaCl.cif"), Some(SourceType::Url));
    assert_eq!(detect_source("1000041"), Some(SourceType::Cod));
    assert_eq!(detect_source("cod-9008565"), Some(SourceType::Cod));
    assert_eq!(detect_source("NaCl"), None);
    assert_eq!(detect_source("mp-"), None);
}

#[test]
fn existing_paths_are_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("zns.xyz");
    fs::write(&path, ZNS_XYZ).unwrap();
    assert_eq!(detect_source(&path.to_string_lossy()), Some(SourceType::File));
}

#[test]
fn source_type_names() {
    assert_eq!("MP".parse::<SourceType>().unwrap(), SourceType::Mp);
    assert_eq!("".parse::<SourceType>().unwrap(), SourceType::Auto);
    assert_eq!(SourceType::Icsd.to_string(), "icsd");
    let err = "pdb".parse::<SourceType>().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
}

// ============================================================================
// LOCAL SOURCES
// ============================================================================

#[test]
fn auto_source_without_match_goes_to_the_engine() {
    let params = SourceParams {
        dims: Some([1, 1, 2]),
        ..Default::default()
    };
    let crystal = offline_resolver().resolve("NaCl", SourceType::Auto, &params).unwrap();
    assert_eq!(crystal, synthesize(&StructureRequest::new("NaCl").with_supercell([1, 1, 2])).unwrap());
    assert_eq!(crystal.n_atoms(), 16);
}

#[test]
fn auto_source_passes_engine_hints() {
    let params = SourceParams {
        compound: Some(vec!["In".into(), "Sb".into()]),
        lattice_parameter: Some(6.48),
        ..Default::default()
    };
    let crystal = offline_resolver().resolve("indium antimonide", SourceType::Auto, &params).unwrap();
    assert_eq!(crystal.n_atoms(), 8);
    assert_eq!(crystal.species_counts()["Sb"], 4);
}

#[test]
fn unknown_auto_source_is_unresolved() {
    let err = offline_resolver()
        .resolve("Xx99", SourceType::Auto, &SourceParams::default())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnresolvedMaterial);
}

#[test]
fn string_source_needs_a_format() {
    let resolver = offline_resolver();
    let err = resolver.resolve(ZNS_XYZ, SourceType::String, &SourceParams::default()).unwrap_err();
    assert!(matches!(err, SynthesisError::InvalidRequest(_)), "{:?}", err);

    let params = SourceParams {
        format: Some(StructureFormat::Xyz),
        ..Default::default()
    };
    let crystal = resolver.resolve(ZNS_XYZ, SourceType::String, &params).unwrap();
    assert_eq!(crystal.species(), vec!["Zn", "S"]);
}

#[test]
fn string_content_parameter_wins_over_source_text() {
    let params = SourceParams {
        format: Some(StructureFormat::Xyz),
        content: Some(ZNS_XYZ.to_string()),
        dims: Some([2, 2, 1]),
        ..Default::default()
    };
    let crystal = offline_resolver().resolve("inline", SourceType::String, &params).unwrap();
    assert_eq!(crystal.n_atoms(), 8);
}

#[test]
fn malformed_string_is_a_fetch_failure() {
    let params = SourceParams {
        format: Some(StructureFormat::Cif),
        ..Default::default()
    };
    let err = offline_resolver()
        .resolve("data_empty\n", SourceType::String, &params)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExternalFetchFailure);
}

#[test]
fn file_source_with_supercell() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("batio3.cif");
    let base = synthesize(&StructureRequest::new("BaTiO3")).unwrap();
    writer::write_structure(&path, &base, "BaTiO3").unwrap();

    let params = SourceParams {
        dims: Some([2, 1, 1]),
        ..Default::default()
    };
    let crystal = offline_resolver()
        .resolve(&path.to_string_lossy(), SourceType::Auto, &params)
        .unwrap();
    assert_eq!(crystal.n_atoms(), 10);
    assert_eq!(crystal.species_counts()["O"], 6);
}

#[test]
fn missing_file_is_a_fetch_failure() {
    let err = offline_resolver()
        .resolve("/definitely/not/here.cif", SourceType::File, &SourceParams::default())
        .unwrap_err();
    assert!(matches!(err, SynthesisError::ExternalFetchFailure { ref origin, .. } if origin == "file"));
}

#[test]
fn zero_supercell_is_rejected_before_fetching() {
    let params = SourceParams {
        dims: Some([1, 0, 1]),
        ..Default::default()
    };
    let err = offline_resolver().resolve("mp-149", SourceType::Mp, &params).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
}

#[test]
fn batch_loading_by_glob() {
    let dir = tempfile::tempdir().unwrap();
    for (name, material) in [("a_si.xyz", "Si"), ("b_zno.xyz", "ZnO")] {
        let crystal = synthesize(&StructureRequest::new(material)).unwrap();
        writer::write_structure(&dir.path().join(name), &crystal, material).unwrap();
    }
    fs::write(dir.path().join("notes.txt"), "not a structure").unwrap();

    let resolver = offline_resolver();
    let pattern = dir.path().join("*.xyz");
    let results = resolver.resolve_many(&pattern.to_string_lossy(), &SourceParams::default()).unwrap();
    let counts: Vec<usize> = results.iter().map(|(_, c)| c.n_atoms()).collect();
    assert_eq!(counts, vec![8, 4]);

    let empty = dir.path().join("*.vasp");
    let err = resolver.resolve_many(&empty.to_string_lossy(), &SourceParams::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExternalFetchFailure);
}

// ============================================================================
// REMOTE SOURCES (no network traffic)
// ============================================================================

#[test]
fn missing_credentials_are_not_connectivity_errors() {
    let resolver = offline_resolver();

    let err = resolver.resolve("mp-149", SourceType::Auto, &SourceParams::default()).unwrap_err();
    assert!(matches!(err, SynthesisError::MissingCredentials { .. }), "{:?}", err);
    assert!(!err.is_connectivity());

    let params = SourceParams {
        username: Some("alice".into()),
        ..Default::default()
    };
    let err = resolver.resolve("12345", SourceType::Icsd, &params).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingCredentials);
}

#[test]
fn unreachable_url_is_a_connectivity_error() {
    let err = offline_resolver()
        .resolve("http://127.0.0.1:9/structure.cif", SourceType::Auto, &SourceParams::default())
        .unwrap_err();
    assert!(err.is_connectivity(), "{:?}", err);
}
