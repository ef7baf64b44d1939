//! Adapters for the remote crystal databases: Materials Project, the
//! Crystallography Open Database and ICSD. Each one ends in the same
//! [`Crystal`] the generators produce.

use crate::chemistry::elements::symbol_from_label;
use crate::config::FetchConfig;
use crate::core::error::{SynthesisError, SynthesisResult};
use crate::core::structure::{Atom, Crystal, Lattice};
use crate::io::parser::parse_cif;
use crate::sources::remote::HttpClient;
use nalgebra::Vector3;
use serde::Deserialize;

// ============================================================================
// MATERIALS PROJECT
// ============================================================================

#[derive(Debug, Deserialize)]
struct MpResponse {
    #[serde(default)]
    data: Vec<MpDocument>,
}

#[derive(Debug, Deserialize)]
struct MpDocument {
    structure: MpStructure,
}

/// Serialized structure object returned by the summary endpoint.
#[derive(Debug, Deserialize)]
struct MpStructure {
    lattice: MpLattice,
    sites: Vec<MpSite>,
}

#[derive(Debug, Deserialize)]
struct MpLattice {
    /// Lattice vectors as rows.
    matrix: [[f64; 3]; 3],
}

#[derive(Debug, Deserialize)]
struct MpSite {
    species: Vec<MpSpecies>,
    abc: [f64; 3],
    #[serde(default)]
    label: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MpSpecies {
    element: String,
    #[serde(default = "full_occupancy")]
    occu: f64,
}

fn full_occupancy() -> f64 {
    1.0
}

fn mp_failure(material_id: &str, detail: impl Into<String>) -> SynthesisError {
    SynthesisError::ExternalFetchFailure {
        origin: "Materials Project".into(),
        source_id: material_id.to_string(),
        status: None,
        detail: detail.into(),
    }
}

/// Converts a Materials Project summary response into a [`Crystal`].
///
/// Partially occupied sites keep their majority species.
pub fn crystal_from_mp_json(material_id: &str, body: &str) -> SynthesisResult<Crystal> {
    let response: MpResponse = serde_json::from_str(body)
        .map_err(|e| mp_failure(material_id, format!("malformed response: {}", e)))?;
    let document = response
        .data
        .into_iter()
        .next()
        .ok_or_else(|| mp_failure(material_id, "no material with this id"))?;

    let lattice = Lattice::from_rows(document.structure.lattice.matrix).map_err(|e| mp_failure(material_id, e))?;

    let mut atoms = Vec::with_capacity(document.structure.sites.len());
    for site in document.structure.sites {
        let majority = site
            .species
            .iter()
            .max_by(|a, b| a.occu.total_cmp(&b.occu))
            .map(|s| s.element.as_str())
            .or(site.label.as_deref())
            .ok_or_else(|| mp_failure(material_id, "site without species"))?;
        let element = symbol_from_label(majority)
            .ok_or_else(|| mp_failure(material_id, format!("unknown species '{}'", majority)))?;
        atoms.push(Atom::new(element, Vector3::from(site.abc)));
    }
    if atoms.is_empty() {
        return Err(mp_failure(material_id, "structure has no sites"));
    }
    Ok(Crystal::new(lattice, atoms))
}

pub fn fetch_materials_project(
    http: &HttpClient,
    config: &FetchConfig,
    material_id: &str,
    api_key: Option<&str>,
) -> SynthesisResult<Crystal> {
    let key = config.mp_api_key(api_key)?;
    let url = format!("{}/materials/summary/", config.mp_base_url.trim_end_matches('/'));

    let body = http.text("Materials Project", material_id, |client| {
        client
            .get(&url)
            .header("X-API-KEY", &key)
            .query(&[("material_ids", material_id), ("_fields", "structure")])
    })?;
    let crystal = crystal_from_mp_json(material_id, &body)?;
    log::info!("fetched {} from Materials Project: {}", material_id, crystal);
    Ok(crystal)
}

// ============================================================================
// CRYSTALLOGRAPHY OPEN DATABASE
// ============================================================================

/// Strips an optional `cod-` prefix; the remaining id is used as given.
pub fn normalize_cod_id(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.get(..4) {
        Some(prefix) if prefix.eq_ignore_ascii_case("cod-") => trimmed[4..].to_string(),
        _ => trimmed.to_string(),
    }
}

pub fn fetch_cod(http: &HttpClient, config: &FetchConfig, cod_id: &str) -> SynthesisResult<Crystal> {
    let id = normalize_cod_id(cod_id);
    let url = format!("{}/{}.cif", config.cod_base_url.trim_end_matches('/'), id);

    let text = http.text("COD", &id, |client| client.get(&url))?;
    let crystal = parse_cif(&text).map_err(|e| SynthesisError::ExternalFetchFailure {
        origin: "COD".into(),
        source_id: id.clone(),
        status: None,
        detail: format!("unreadable CIF: {:#}", e),
    })?;
    log::info!("fetched COD {}: {}", id, crystal);
    Ok(crystal)
}

// ============================================================================
// ICSD
// ============================================================================

const ICSD_TOKEN_HEADER: &str = "ICSD-Auth-Token";

pub fn fetch_icsd(
    http: &HttpClient,
    config: &FetchConfig,
    icsd_id: &str,
    username: Option<&str>,
    password: Option<&str>,
) -> SynthesisResult<Crystal> {
    let (username, password) = config.icsd_credentials(username, password)?;
    let base = config.icsd_base_url.trim_end_matches('/');
    let id = icsd_id.trim();
    let failure = |status: Option<u16>, detail: String| SynthesisError::ExternalFetchFailure {
        origin: "ICSD".into(),
        source_id: id.to_string(),
        status,
        detail,
    };

    // 1. Log in for a session token.
    let login_url = format!("{}/auth/login", base);
    let login = http.send("ICSD", id, |client| {
        client
            .post(&login_url)
            .form(&[("loginid", username.as_str()), ("password", password.as_str())])
    })?;
    let token = login
        .headers()
        .get(ICSD_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| failure(Some(login.status().as_u16()), "login returned no session token".into()))?;

    // 2. Export the CIF.
    let cif_url = format!("{}/cif/multiple", base);
    let cif = http.text("ICSD", id, |client| {
        client
            .get(&cif_url)
            .header(ICSD_TOKEN_HEADER, &token)
            .query(&[("idnum", id), ("celltype", "experimental"), ("windowsclient", "false"), ("filetype", "cif")])
    });

    // 3. Always release the session, whatever the export did.
    let logout_url = format!("{}/auth/logout", base);
    if let Err(e) = http.send("ICSD", id, |client| client.get(&logout_url).header(ICSD_TOKEN_HEADER, &token)) {
        log::warn!("ICSD logout failed: {}", e);
    }

    let crystal = parse_cif(&cif?).map_err(|e| failure(None, format!("unreadable CIF: {:#}", e)))?;
    log::info!("fetched ICSD {}: {}", id, crystal);
    Ok(crystal)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MP_SI: &str = r#"{
        "data": [{
            "structure": {
                "@module": "pymatgen.core.structure",
                "lattice": {"matrix": [[0.0, 2.734, 2.734], [2.734, 0.0, 2.734], [2.734, 2.734, 0.0]], "a": 3.866},
                "sites": [
                    {"species": [{"element": "Si", "occu": 1}], "abc": [0.875, 0.875, 0.875], "label": "Si"},
                    {"species": [{"element": "Si", "occu": 1}], "abc": [0.125, 0.125, 0.125], "label": "Si"}
                ]
            }
        }],
        "meta": {"total_doc": 1}
    }"#;

    #[test]
    fn mp_structure_object_becomes_crystal() {
        let crystal = crystal_from_mp_json("mp-149", MP_SI).unwrap();
        assert_eq!(crystal.species(), vec!["Si", "Si"]);
        assert!((crystal.lattice.volume() - 40.87).abs() < 0.1);
    }

    #[test]
    fn empty_mp_response_is_a_fetch_failure() {
        let err = crystal_from_mp_json("mp-0", r#"{"data": []}"#).unwrap_err();
        assert!(matches!(err, SynthesisError::ExternalFetchFailure { .. }));
    }

    #[test]
    fn cod_ids_are_used_verbatim() {
        assert_eq!(normalize_cod_id("cod-1010064"), "1010064");
        assert_eq!(normalize_cod_id("9008565"), "9008565");
        assert_eq!(normalize_cod_id(" 123 "), "123");
    }
}
