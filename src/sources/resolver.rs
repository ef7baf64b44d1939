use crate::config::FetchConfig;
use crate::core::error::{SynthesisError, SynthesisResult};
use crate::core::structure::Crystal;
use crate::io::parser::{self, StructureFormat};
use crate::sources::databases;
use crate::sources::remote::HttpClient;
use crate::synthesis::engine::{StructureRequest, StructureSynthesizer};
use crate::synthesis::family::StructureFamily;
use crate::synthesis::supercell::{check_dims, make_supercell};
use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

lazy_static! {
    static ref MP_ID: Regex = Regex::new(r"(?i)^mp-\d+$").unwrap();
    static ref COD_ID: Regex = Regex::new(r"(?i)^(cod-)?\d+$").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceType {
    Auto,
    Mp,
    Cod,
    Icsd,
    File,
    Url,
    String,
}

impl SourceType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Mp => "mp",
            Self::Cod => "cod",
            Self::Icsd => "icsd",
            Self::File => "file",
            Self::Url => "url",
            Self::String => "string",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SourceType {
    type Err = SynthesisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "auto" => Ok(Self::Auto),
            "mp" | "materials_project" | "materialsproject" => Ok(Self::Mp),
            "cod" => Ok(Self::Cod),
            "icsd" => Ok(Self::Icsd),
            "file" => Ok(Self::File),
            "url" => Ok(Self::Url),
            "string" => Ok(Self::String),
            other => Err(SynthesisError::InvalidRequest(format!(
                "unknown source type '{}'; valid options: auto, mp, cod, icsd, file, url, string",
                other
            ))),
        }
    }
}

/// Optional inputs for [`SourceResolver::resolve`]; which fields matter depends on the source type.
#[derive(Debug, Clone, Default)]
pub struct SourceParams {
    pub api_key: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Overrides format detection for file, URL and string sources.
    pub format: Option<StructureFormat>,
    /// Structure text for string sources; the source argument is used when absent.
    pub content: Option<String>,
    /// Supercell applied after the structure is obtained.
    pub dims: Option<[usize; 3]>,
    // Used only when an auto source falls through to the synthesis engine.
    pub structure_type: Option<StructureFamily>,
    pub lattice_parameter: Option<f64>,
    pub compound: Option<Vec<String>>,
}

/// Where an `auto` source points, or `None` when it names a material for the synthesis engine.
///
/// Checked in order: Materials Project id, http(s) URL, existing local path, COD id.
pub fn detect_source(source: &str) -> Option<SourceType> {
    let source = source.trim();
    let lower = source.to_lowercase();
    if MP_ID.is_match(source) {
        Some(SourceType::Mp)
    } else if lower.starts_with("http://") || lower.starts_with("https://") {
        Some(SourceType::Url)
    } else if !source.is_empty() && Path::new(source).exists() {
        Some(SourceType::File)
    } else if COD_ID.is_match(source) {
        Some(SourceType::Cod)
    } else {
        None
    }
}

/// Front door for every way of obtaining a structure other than an LLM description.
#[derive(Debug, Clone)]
pub struct SourceResolver {
    config: FetchConfig,
    engine: StructureSynthesizer,
}

impl SourceResolver {
    pub fn new(config: FetchConfig) -> Self {
        Self {
            config,
            engine: StructureSynthesizer::new(),
        }
    }

    pub fn from_env() -> Self {
        Self::new(FetchConfig::from_env())
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    pub fn resolve(&self, source: &str, source_type: SourceType, params: &SourceParams) -> SynthesisResult<Crystal> {
        let source = source.trim();
        if let Some(dims) = params.dims {
            check_dims(dims)?;
        }

        let source_type = match source_type {
            SourceType::Auto => detect_source(source).unwrap_or(SourceType::Auto),
            explicit => explicit,
        };

        let crystal = match source_type {
            SourceType::Auto => {
                log::debug!("'{}' is not an external source; synthesizing", source);
                return self.engine.synthesize(&self.engine_request(source, params));
            }
            SourceType::Mp => {
                databases::fetch_materials_project(&self.http()?, &self.config, source, params.api_key.as_deref())?
            }
            SourceType::Cod => databases::fetch_cod(&self.http()?, &self.config, source)?,
            SourceType::Icsd => databases::fetch_icsd(
                &self.http()?,
                &self.config,
                source,
                params.username.as_deref(),
                params.password.as_deref(),
            )?,
            SourceType::File => load_file(Path::new(source), params.format)?,
            SourceType::Url => self.fetch_url(source, params.format)?,
            SourceType::String => load_string(params.content.as_deref().unwrap_or(source), params.format)?,
        };
        log::debug!("resolved '{}' via {}", source, source_type);

        Ok(match params.dims {
            Some(dims) => make_supercell(&crystal, dims),
            None => crystal,
        })
    }

    /// Loads every file matching a glob pattern, in path order.
    pub fn resolve_many(&self, pattern: &str, params: &SourceParams) -> SynthesisResult<Vec<(PathBuf, Crystal)>> {
        let paths = glob::glob(pattern)
            .map_err(|e| SynthesisError::InvalidRequest(format!("invalid glob pattern '{}': {}", pattern, e)))?;

        let mut results = Vec::new();
        for entry in paths {
            let path = entry.map_err(|e| SynthesisError::ExternalFetchFailure {
                origin: "file".into(),
                source_id: e.path().display().to_string(),
                status: None,
                detail: e.to_string(),
            })?;
            if !path.is_file() {
                continue;
            }
            let crystal = self.resolve(&path.to_string_lossy(), SourceType::File, params)?;
            results.push((path, crystal));
        }

        if results.is_empty() {
            return Err(SynthesisError::ExternalFetchFailure {
                origin: "file".into(),
                source_id: pattern.to_string(),
                status: None,
                detail: "no structure files match this pattern".into(),
            });
        }
        log::info!("loaded {} structures matching '{}'", results.len(), pattern);
        Ok(results)
    }

    fn http(&self) -> SynthesisResult<HttpClient> {
        HttpClient::from_config(&self.config)
    }

    fn engine_request(&self, source: &str, params: &SourceParams) -> StructureRequest {
        StructureRequest {
            material_name: source.to_string(),
            supercell_dims: params.dims.unwrap_or([1, 1, 1]),
            structure_type: params.structure_type,
            lattice_parameter: params.lattice_parameter,
            compound: params.compound.clone(),
        }
    }

    fn fetch_url(&self, url: &str, format: Option<StructureFormat>) -> SynthesisResult<Crystal> {
        let format = format.unwrap_or_else(|| StructureFormat::detect(url));
        let text = self.http()?.text("url", url, |client| client.get(url))?;
        let crystal = parser::parse_str(&text, format).map_err(|e| SynthesisError::ExternalFetchFailure {
            origin: "url".into(),
            source_id: url.to_string(),
            status: None,
            detail: format!("could not parse as {}: {:#}", format, e),
        })?;
        log::info!("fetched {}: {}", url, crystal);
        Ok(crystal)
    }
}

fn load_file(path: &Path, format: Option<StructureFormat>) -> SynthesisResult<Crystal> {
    let result = match format {
        Some(format) => std::fs::read_to_string(path)
            .map_err(anyhow::Error::from)
            .and_then(|text| parser::parse_str(&text, format)),
        None => parser::from_file(path),
    };
    result.map_err(|e| SynthesisError::ExternalFetchFailure {
        origin: "file".into(),
        source_id: path.display().to_string(),
        status: None,
        detail: format!("{:#}", e),
    })
}

fn load_string(content: &str, format: Option<StructureFormat>) -> SynthesisResult<Crystal> {
    let format = format.ok_or_else(|| {
        SynthesisError::InvalidRequest("string sources need an explicit format (cif, vasp or xyz)".into())
    })?;
    if content.trim().is_empty() {
        return Err(SynthesisError::InvalidRequest("string source is empty".into()));
    }
    parser::parse_str(content, format).map_err(|e| SynthesisError::ExternalFetchFailure {
        origin: "string".into(),
        source_id: format!("<{} text>", format),
        status: None,
        detail: format!("{:#}", e),
    })
}
