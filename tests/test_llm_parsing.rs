use crystal_structure_generator::config::LlmConfig;
use crystal_structure_generator::llm::extractor::{first_json_object, DEFAULT_MATERIAL};
use crystal_structure_generator::{
    parse_llm_response, ErrorKind, ParameterExtractor, Provider, ProviderParams, StructureFamily, SynthesisError,
};

// ============================================================================
// JSON REPLIES
// ============================================================================

#[test]
fn json_inside_prose_and_code_fences() {
    let reply = r#"Sure! Here are the parameters:
```json
{"material_name": "GaN", "structure_type": "wurtzite", "lattice_parameter": 3.19,
 "supercell_dims": [2, 2, 1], "compound": ["Ga", "N"]}
```
Let me know if you need anything else."#;
    let request = parse_llm_response(reply);
    assert_eq!(request.material_name, "GaN");
    assert_eq!(request.structure_type, Some(StructureFamily::Wurtzite));
    assert_eq!(request.lattice_parameter, Some(3.19));
    assert_eq!(request.supercell_dims, [2, 2, 1]);
    assert_eq!(request.compound, Some(vec!["Ga".to_string(), "N".to_string()]));
}

#[test]
fn braces_inside_strings_do_not_end_the_object() {
    let reply = r#"{"material_name": "Cu", "note": "use } and { freely \" even escaped"}"#;
    let object = first_json_object(reply).unwrap();
    assert_eq!(object["material_name"], "Cu");
    assert_eq!(parse_llm_response(reply).material_name, "Cu");
}

#[test]
fn unparsable_brace_groups_are_skipped() {
    let reply = r#"Set {a} as usual, then: {"material_name": "MgO", "structure_type": "rocksalt"}"#;
    let request = parse_llm_response(reply);
    assert_eq!(request.material_name, "MgO");
    assert_eq!(request.structure_type, Some(StructureFamily::Rocksalt));
}

#[test]
fn invalid_fields_degrade_one_by_one() {
    let reply = r#"{"material_name": 42, "structure_type": "layered", "lattice_parameter": -3,
                   "supercell_dims": [0, 1, 1], "compound": "???"}"#;
    let request = parse_llm_response(reply);
    assert_eq!(request.material_name, DEFAULT_MATERIAL);
    assert_eq!(request.structure_type, None);
    assert_eq!(request.lattice_parameter, None);
    assert_eq!(request.supercell_dims, [1, 1, 1]);
    assert_eq!(request.compound, None);
}

#[test]
fn implausible_supercells_fall_back_to_one_cell() {
    let reply = r#"{"material_name": "Cu", "supercell_dims": [100000, 100000, 100000]}"#;
    assert_eq!(parse_llm_response(reply).supercell_dims, [1, 1, 1]);
    let reply = r#"{"material_name": "Cu", "supercell_dims": "50x50x50"}"#;
    assert_eq!(parse_llm_response(reply).supercell_dims, [1, 1, 1]);
    assert_eq!(parse_llm_response("copper fcc in a 500x500x500 supercell").supercell_dims, [1, 1, 1]);
}

#[test]
fn loose_json_values_are_coerced() {
    let reply = r#"{"material_name": " SiO2 ", "structure_type": "Alpha Quartz", "lattice_parameter": "4.91",
                   "supercell_dims": "3x3x1", "compound": "SiO2"}"#;
    let request = parse_llm_response(reply);
    assert_eq!(request.material_name, "SiO2");
    assert_eq!(request.structure_type, Some(StructureFamily::Quartz));
    assert_eq!(request.lattice_parameter, Some(4.91));
    assert_eq!(request.supercell_dims, [3, 3, 1]);
    assert_eq!(request.compound, Some(vec!["Si".to_string(), "O".to_string()]));
}

#[test]
fn null_fields_mean_defaults() {
    let reply = r#"{"material_name": "Fe", "structure_type": null, "lattice_parameter": null, "compound": null}"#;
    let request = parse_llm_response(reply);
    assert_eq!(request.material_name, "Fe");
    assert_eq!(request.structure_type, None);
    assert_eq!(request.supercell_dims, [1, 1, 1]);
}

// ============================================================================
// TEXT HEURISTICS
// ============================================================================

#[test]
fn formula_family_lattice_and_supercell_from_text() {
    let reply = "I would model GaAs in the zinc blende structure with a = 5.65 and a 2x2x2 supercell.";
    let request = parse_llm_response(reply);
    assert_eq!(request.material_name, "GaAs");
    assert_eq!(request.compound, Some(vec!["Ga".to_string(), "As".to_string()]));
    assert_eq!(request.structure_type, Some(StructureFamily::Zincblende));
    assert_eq!(request.lattice_parameter, Some(5.65));
    assert_eq!(request.supercell_dims, [2, 2, 2]);
}

#[test]
fn lone_symbol_from_text() {
    let request = parse_llm_response("I think you want Fe in its bcc form, lattice parameter of 2.87.");
    assert_eq!(request.material_name, "Fe");
    assert_eq!(request.compound, None);
    assert_eq!(request.structure_type, Some(StructureFamily::Bcc));
    assert_eq!(request.lattice_parameter, Some(2.87));
}

#[test]
fn element_name_from_text() {
    let request = parse_llm_response("a block of silicon in the diamond structure, 3 x 1 x 1 cells");
    assert_eq!(request.material_name, "si");
    assert_eq!(request.structure_type, Some(StructureFamily::Diamond));
    assert_eq!(request.lattice_parameter, None);
    assert_eq!(request.supercell_dims, [3, 1, 1]);
}

#[test]
fn specific_family_beats_generic_lattice_words() {
    let request = parse_llm_response("zinc blende, which is an fcc lattice with a two-atom basis");
    assert_eq!(request.structure_type, Some(StructureFamily::Zincblende));
}

#[test]
fn nothing_recognisable_gives_defaults() {
    let request = parse_llm_response("sorry, i cannot help with that");
    assert_eq!(request.material_name, DEFAULT_MATERIAL);
    assert_eq!(request.structure_type, None);
    assert_eq!(request.lattice_parameter, None);
    assert_eq!(request.supercell_dims, [1, 1, 1]);
    assert_eq!(request.compound, None);
}

// ============================================================================
// PROVIDER CALLS (offline)
// ============================================================================

#[test]
fn provider_names_parse() {
    assert_eq!("OpenAI".parse::<Provider>().unwrap(), Provider::OpenAi);
    assert_eq!("claude".parse::<Provider>().unwrap(), Provider::Anthropic);
    assert_eq!("gemini".parse::<Provider>().unwrap(), Provider::Gemini);
    let err = "mistral".parse::<Provider>().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
}

#[test]
fn missing_key_fails_before_any_request() {
    let extractor = ParameterExtractor::new(LlmConfig::from_lookup(|_| None));
    for provider in [Provider::OpenAi, Provider::Anthropic, Provider::Gemini] {
        let err = extractor
            .extract("bulk silicon", provider, &ProviderParams::default())
            .unwrap_err();
        assert!(matches!(err, SynthesisError::MissingCredentials { .. }), "{}: {:?}", provider, err);
        assert!(!err.is_connectivity());
    }
}

#[test]
fn unreachable_provider_is_a_connectivity_error() {
    let extractor = ParameterExtractor::new(LlmConfig::from_lookup(|_| None));
    let params = ProviderParams {
        base_url: Some("http://127.0.0.1:9".into()),
        ..Default::default()
    };
    let err = extractor.extract("bulk silicon", Provider::Ollama, &params).unwrap_err();
    assert!(err.is_connectivity(), "{:?}", err);
}
