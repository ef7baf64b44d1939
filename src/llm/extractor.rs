//! Natural-language descriptions to [`StructureRequest`]s.
//!
//! The provider's reply is untrusted text. The first JSON object in it is
//! used field by field; anything missing or malformed degrades to a default.
//! Without any JSON object the request is rebuilt from regex heuristics over
//! the raw text. Only a failing provider call is an error.

use crate::chemistry::database::LatticeDatabase;
use crate::chemistry::elements::{normalize_symbol, split_formula, symbol_from_label};
use crate::config::LlmConfig;
use crate::core::error::SynthesisResult;
use crate::core::structure::Crystal;
use crate::llm::providers::{self, Provider, ProviderParams};
use crate::synthesis::engine::{StructureRequest, StructureSynthesizer};
use crate::synthesis::family::StructureFamily;
use crate::synthesis::supercell::check_dims;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};

pub const DEFAULT_MATERIAL: &str = "Si";

pub const SYSTEM_PROMPT: &str = r#"You are a materials science expert. Given a description of a crystal structure, extract the following information and return it as JSON:
- material_name: element symbol, formula or compound name (e.g. "Si", "NaCl", "GaN", "BaTiO3")
- structure_type: one of fcc, bcc, sc, diamond, hcp, rocksalt, zincblende, wurtzite, perovskite, rutile, quartz, cristobalite, or null
- lattice_parameter: primary lattice constant a in Angstroms (number) or null
- supercell_dims: supercell repetitions as [nx, ny, nz] (default [1, 1, 1])
- compound: list of element symbols for compounds (e.g. ["Na", "Cl"]) or null for elements

If the description is too complex, pick the closest simple structure that can be generated.
Return ONLY valid JSON, no additional text."#;

lazy_static! {
    static ref FORMULA: Regex = Regex::new(r"\b((?:[A-Z][a-z]?\d*){2,})\b").unwrap();
    static ref SYMBOL: Regex = Regex::new(r"\b([A-Z][a-z]?)\b").unwrap();
    static ref LATTICE: Regex = Regex::new(
        r"lattice(?:\s+(?:parameter|constant))?\s*(?:of|is|=|:)?\s*(\d+(?:\.\d+)?)|\ba\s*[=:]\s*(\d+(?:\.\d+)?)"
    )
    .unwrap();
    static ref SUPERCELL: Regex = Regex::new(r"(\d+)\s*[x×]\s*(\d+)\s*[x×]\s*(\d+)").unwrap();
}

/// Capitalised words that look like element symbols but rarely mean one in prose.
const SYMBOL_STOPWORDS: [&str; 2] = ["I", "In"];

/// Family keywords, most specific first so "zinc blende" wins over "cubic".
const FAMILY_KEYWORDS: [(StructureFamily, &[&str]); 12] = [
    (StructureFamily::Wurtzite, &["wurtzite"]),
    (StructureFamily::Zincblende, &["zincblende", "zinc blende", "zinc-blende", "sphalerite"]),
    (StructureFamily::Rocksalt, &["rocksalt", "rock salt", "rock-salt", "halite", "nacl structure"]),
    (StructureFamily::Perovskite, &["perovskite"]),
    (StructureFamily::Rutile, &["rutile"]),
    (StructureFamily::Cristobalite, &["cristobalite"]),
    (StructureFamily::Quartz, &["quartz"]),
    (StructureFamily::Diamond, &["diamond"]),
    (StructureFamily::Hcp, &["hcp", "hexagonal close-packed", "hexagonal close packed"]),
    (StructureFamily::Fcc, &["fcc", "face-centered cubic", "face centered cubic", "face-centred cubic"]),
    (StructureFamily::Bcc, &["bcc", "body-centered cubic", "body centered cubic", "body-centred cubic"]),
    (StructureFamily::Sc, &["simple cubic", "primitive cubic"]),
];

// ============================================================================
// RESPONSE PARSING
// ============================================================================

/// Turns free-form provider output into a request. Never fails.
pub fn parse_llm_response(text: &str) -> StructureRequest {
    match first_json_object(text) {
        Some(object) => {
            log::debug!("using JSON object from LLM reply");
            request_from_json(&object)
        }
        None => {
            log::debug!("LLM reply has no JSON object; falling back to text heuristics");
            request_from_text(text)
        }
    }
}

/// First brace-balanced substring that parses as a JSON object.
///
/// Braces inside JSON strings do not count towards the balance.
pub fn first_json_object(text: &str) -> Option<Map<String, Value>> {
    let bytes = text.as_bytes();
    let mut from = 0;

    while let Some(offset) = text[from..].find('{') {
        let start = from + offset;
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;
        let mut end = None;

        for (i, &b) in bytes.iter().enumerate().skip(start) {
            if in_string {
                match b {
                    _ if escaped => escaped = false,
                    b'\\' => escaped = true,
                    b'"' => in_string = false,
                    _ => {}
                }
                continue;
            }
            match b {
                b'"' => in_string = true,
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        end = Some(i);
                        break;
                    }
                }
                _ => {}
            }
        }

        if let Some(end) = end {
            if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&text[start..=end]) {
                return Some(map);
            }
        }
        from = start + 1;
    }
    None
}

fn request_from_json(object: &Map<String, Value>) -> StructureRequest {
    let material = object
        .get("material_name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_MATERIAL);

    let mut request = StructureRequest::new(material);
    request.structure_type = object
        .get("structure_type")
        .and_then(Value::as_str)
        .and_then(|s| match s.parse::<StructureFamily>() {
            Ok(family) => Some(family),
            Err(e) => {
                log::debug!("ignoring structure_type from LLM: {}", e);
                None
            }
        });
    request.lattice_parameter = object.get("lattice_parameter").and_then(positive_number);
    if let Some(dims) = object.get("supercell_dims").and_then(supercell_from_json) {
        request.supercell_dims = dims;
    }
    request.compound = object.get("compound").and_then(compound_from_json);
    request
}

fn positive_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }?;
    (number.is_finite() && number > 0.0).then_some(number)
}

fn supercell_from_json(value: &Value) -> Option<[usize; 3]> {
    match value {
        Value::Array(items) if items.len() == 3 => {
            let mut dims = [1usize; 3];
            for (slot, item) in dims.iter_mut().zip(items) {
                let n = positive_number(item)?;
                if n.fract() != 0.0 {
                    return None;
                }
                *slot = n as usize;
            }
            check_dims(dims).is_ok().then_some(dims)
        }
        Value::String(s) => supercell_from_text(s),
        _ => None,
    }
}

fn compound_from_json(value: &Value) -> Option<Vec<String>> {
    let symbols: Vec<String> = match value {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .filter_map(|s| normalize_symbol(s).or_else(|| symbol_from_label(s)))
            .map(str::to_string)
            .collect(),
        Value::String(s) => split_formula(s.trim())?.into_iter().map(|(el, _)| el.to_string()).collect(),
        _ => return None,
    };
    (!symbols.is_empty()).then_some(symbols)
}

fn supercell_from_text(text: &str) -> Option<[usize; 3]> {
    let caps = SUPERCELL.captures(text)?;
    let mut dims = [1usize; 3];
    for (i, slot) in dims.iter_mut().enumerate() {
        *slot = caps[i + 1].parse().ok().filter(|&n| n > 0)?;
    }
    check_dims(dims).is_ok().then_some(dims)
}

/// Regex heuristics used when the reply carries no JSON.
fn request_from_text(text: &str) -> StructureRequest {
    let lower = text.to_lowercase();
    let mut compound = None;

    // 1. Material: formula, then lone element symbol, then a known name.
    let material = if let Some((formula, elements)) = find_formula(text) {
        compound = Some(elements);
        formula
    } else if let Some(symbol) = find_symbol(text) {
        symbol.to_string()
    } else if let Some(key) = find_known_name(&lower) {
        key
    } else {
        DEFAULT_MATERIAL.to_string()
    };

    let mut request = StructureRequest::new(material);
    request.compound = compound;

    // 2. Structure family.
    request.structure_type = FAMILY_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|kw| lower.contains(kw)))
        .map(|(family, _)| *family);

    // 3. Lattice parameter.
    request.lattice_parameter = LATTICE
        .captures(&lower)
        .and_then(|caps| caps.get(1).or_else(|| caps.get(2)))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|a| *a > 0.0);

    // 4. Supercell.
    if let Some(dims) = supercell_from_text(&lower) {
        request.supercell_dims = dims;
    }
    request
}

fn find_formula(text: &str) -> Option<(String, Vec<String>)> {
    FORMULA.captures_iter(text).find_map(|caps| {
        let formula = caps[1].to_string();
        let parts = split_formula(&formula)?;
        let mut elements: Vec<String> = Vec::new();
        for (el, _) in &parts {
            if !elements.iter().any(|e| e.as_str() == *el) {
                elements.push(el.to_string());
            }
        }
        (elements.len() >= 2).then_some((formula, elements))
    })
}

fn find_symbol(text: &str) -> Option<&'static str> {
    SYMBOL
        .captures_iter(text)
        .map(|caps| caps.get(1).map_or("", |m| m.as_str()))
        .filter(|s| !SYMBOL_STOPWORDS.contains(s))
        .find_map(normalize_symbol)
}

/// Looks for element or compound names from the knowledge base ("silicon", "sodium chloride").
fn find_known_name(lower: &str) -> Option<String> {
    let db = LatticeDatabase::global();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let joined = format!(" {} ", words.join(" "));

    db.compounds()
        .iter()
        .chain(db.elements())
        .find(|entry| entry.aliases.iter().any(|alias| joined.contains(&format!(" {} ", alias))))
        .map(|entry| entry.key.clone())
}

// ============================================================================
// EXTRACTOR
// ============================================================================

/// Description -> provider -> request -> structure.
#[derive(Debug, Clone)]
pub struct ParameterExtractor {
    config: LlmConfig,
    engine: StructureSynthesizer,
}

impl ParameterExtractor {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            config,
            engine: StructureSynthesizer::new(),
        }
    }

    pub fn from_env() -> Self {
        Self::new(LlmConfig::from_env())
    }

    pub fn extract(&self, description: &str, provider: Provider, params: &ProviderParams) -> SynthesisResult<StructureRequest> {
        let user_prompt = format!("Extract structure parameters from this description: {}", description.trim());
        let reply = providers::complete(provider, SYSTEM_PROMPT, &user_prompt, params, &self.config)?;
        let request = parse_llm_response(&reply);
        log::info!("{} extracted {:?}", provider, request);
        Ok(request)
    }

    pub fn generate(&self, description: &str, provider: Provider, params: &ProviderParams) -> SynthesisResult<Crystal> {
        let request = self.extract(description, provider, params)?;
        self.engine.synthesize(&request)
    }
}
