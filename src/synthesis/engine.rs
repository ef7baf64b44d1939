//! Turns a [`StructureRequest`] into a [`Crystal`].
//!
//! Resolution order, first match wins:
//!
//! 1. `material_name` is a compound key or compound name in the knowledge base.
//! 2. `compound` lists at least two elements: the compound table is searched
//!    with [`CompoundMatchStrategy::ORDER`]; without a hit a generic family is
//!    built directly from the listed elements.
//! 3. `material_name` is an element symbol or element name in the knowledge base.
//! 4. `material_name` is a valid element symbol without an entry: default
//!    family (fcc) and constant (4.0 Å).
//!
//! Request overrides (`structure_type`, `lattice_parameter`) apply at every
//! stage. The resolved cell is replicated by `supercell_dims` and checked
//! against the request before it is returned.

use crate::chemistry::database::{KnowledgeEntry, LatticeDatabase};
use crate::chemistry::elements::normalize_symbol;
use crate::chemistry::matching::{match_compound, CompoundMatchStrategy};
use crate::core::error::{SynthesisError, SynthesisResult};
use crate::core::structure::Crystal;
use crate::synthesis::family::StructureFamily;
use crate::synthesis::generators::{self, Construction, GenerationFailure};
use crate::synthesis::supercell::{check_dims, make_supercell};
use std::collections::BTreeSet;
use std::fmt;

/// Default family for a bare element symbol with no knowledge entry.
pub const DEFAULT_ELEMENT_FAMILY: StructureFamily = StructureFamily::Fcc;
/// Default lattice constant (Å) for a bare element symbol with no knowledge entry.
pub const DEFAULT_ELEMENT_LATTICE: f64 = 4.0;
/// Default lattice constant (Å) for an explicit compound with no knowledge entry.
pub const DEFAULT_COMPOUND_LATTICE: f64 = 5.0;

// ============================================================================
// REQUEST
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct StructureRequest {
    pub material_name: String,
    pub supercell_dims: [usize; 3],
    pub structure_type: Option<StructureFamily>,
    /// Override of the primary lattice constant `a` (Å).
    pub lattice_parameter: Option<f64>,
    /// Explicit ordered element list.
    pub compound: Option<Vec<String>>,
}

impl StructureRequest {
    pub fn new(material_name: impl Into<String>) -> Self {
        Self {
            material_name: material_name.into(),
            supercell_dims: [1, 1, 1],
            structure_type: None,
            lattice_parameter: None,
            compound: None,
        }
    }

    pub fn with_supercell(mut self, dims: [usize; 3]) -> Self {
        self.supercell_dims = dims;
        self
    }

    pub fn with_structure_type(mut self, family: StructureFamily) -> Self {
        self.structure_type = Some(family);
        self
    }

    pub fn with_lattice_parameter(mut self, a: f64) -> Self {
        self.lattice_parameter = Some(a);
        self
    }

    pub fn with_compound<S: Into<String>>(mut self, elements: impl IntoIterator<Item = S>) -> Self {
        self.compound = Some(elements.into_iter().map(Into::into).collect());
        self
    }

    pub fn validate(&self) -> SynthesisResult<()> {
        if self.material_name.trim().is_empty() {
            return Err(SynthesisError::InvalidRequest("material name is empty".into()));
        }
        check_dims(self.supercell_dims)?;
        if let Some(a) = self.lattice_parameter {
            if !(a.is_finite() && a > 0.0) {
                return Err(SynthesisError::InvalidRequest(format!(
                    "lattice parameter must be a positive number of Å, got {}",
                    a
                )));
            }
        }
        Ok(())
    }
}

// ============================================================================
// RESOLUTION
// ============================================================================

/// Which step of the resolution order produced the plan.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    CompoundKey { key: String },
    CompoundHint { key: String, strategy: CompoundMatchStrategy },
    GenericCompound,
    ElementEntry { key: String },
    ElementFallback,
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CompoundKey { key } => write!(f, "compound entry '{}'", key),
            Self::CompoundHint { key, strategy } => write!(f, "compound entry '{}' via {:?}", key, strategy),
            Self::GenericCompound => f.write_str("generic compound family"),
            Self::ElementEntry { key } => write!(f, "element entry '{}'", key),
            Self::ElementFallback => f.write_str("default element family"),
        }
    }
}

/// Family, species and constants a request resolved to, before any atoms exist.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisPlan {
    pub material: String,
    pub family: StructureFamily,
    pub elements: Vec<String>,
    /// Species the output must contain: the compound hint when one was given.
    pub required: Vec<String>,
    pub a: f64,
    /// Explicit `c`; `None` lets the generator apply the family ratio.
    pub c: Option<f64>,
    pub supercell_dims: [usize; 3],
    pub resolution: Resolution,
}

/// A finished structure together with how it was obtained.
#[derive(Debug, Clone)]
pub struct Synthesis {
    pub crystal: Crystal,
    pub plan: SynthesisPlan,
    pub construction: Construction,
}

// ============================================================================
// ENGINE
// ============================================================================

/// Stateless apart from a read-only knowledge base; share freely between threads.
#[derive(Debug, Clone, Copy)]
pub struct StructureSynthesizer {
    db: &'static LatticeDatabase,
}

impl Default for StructureSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

impl StructureSynthesizer {
    pub fn new() -> Self {
        Self::with_database(LatticeDatabase::global())
    }

    pub fn with_database(db: &'static LatticeDatabase) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &'static LatticeDatabase {
        self.db
    }

    pub fn synthesize(&self, request: &StructureRequest) -> SynthesisResult<Crystal> {
        self.synthesize_detailed(request).map(|s| s.crystal)
    }

    pub fn synthesize_detailed(&self, request: &StructureRequest) -> SynthesisResult<Synthesis> {
        let plan = self.plan(request)?;

        let generated = generators::generate(plan.family, &plan.elements, plan.a, plan.c)
            .map_err(|failure| generation_error(&plan, failure))?;
        if let Construction::Explicit { reason } = &generated.construction {
            log::debug!("{} built from explicit coordinates: {}", plan.family, reason);
        }

        let crystal = make_supercell(&generated.crystal, plan.supercell_dims);
        check_postconditions(&plan, &crystal)?;

        log::debug!("synthesized {} for '{}' ({})", crystal.formula(), plan.material, plan.resolution);
        Ok(Synthesis {
            crystal,
            plan,
            construction: generated.construction,
        })
    }

    /// Resolves a request without generating atoms.
    pub fn plan(&self, request: &StructureRequest) -> SynthesisResult<SynthesisPlan> {
        request.validate()?;
        let material = request.material_name.trim().to_string();

        // 1. Compound key or name.
        if let Some(entry) = self.db.lookup_compound(&material) {
            log::debug!("'{}' matched compound entry '{}'", material, entry.key);
            let resolution = Resolution::CompoundKey { key: entry.key.clone() };
            return Ok(plan_from_entry(request, material, entry, resolution));
        }

        // 2. Explicit compound hint.
        if let Some(compound) = request.compound.as_ref().filter(|c| c.len() >= 2) {
            return self.plan_from_compound(request, material, compound);
        }

        // 3. Element entry.
        if let Some(entry) = self.db.lookup_element(&material) {
            log::debug!("'{}' matched element entry '{}'", material, entry.key);
            let resolution = Resolution::ElementEntry { key: entry.key.clone() };
            return Ok(plan_from_entry(request, material, entry, resolution));
        }

        // 4. Bare element symbol.
        let symbol = normalize_symbol(&material).ok_or_else(|| SynthesisError::UnresolvedMaterial {
            material: material.clone(),
            reason: "no knowledge entry, no compound hint, and not an element symbol".into(),
        })?;
        let family = request.structure_type.unwrap_or(DEFAULT_ELEMENT_FAMILY);
        log::debug!("'{}' has no entry; falling back to {} {}", material, symbol, family);
        Ok(SynthesisPlan {
            material,
            family,
            elements: vec![symbol.to_string()],
            required: vec![symbol.to_string()],
            a: request.lattice_parameter.unwrap_or(DEFAULT_ELEMENT_LATTICE),
            c: None,
            supercell_dims: request.supercell_dims,
            resolution: Resolution::ElementFallback,
        })
    }

    fn plan_from_compound(
        &self,
        request: &StructureRequest,
        material: String,
        compound: &[String],
    ) -> SynthesisResult<SynthesisPlan> {
        let mut elements = Vec::with_capacity(compound.len());
        for raw in compound {
            let symbol = normalize_symbol(raw).ok_or_else(|| SynthesisError::UnresolvedMaterial {
                material: material.clone(),
                reason: format!("compound hint contains '{}', which is not an element symbol", raw.trim()),
            })?;
            elements.push(symbol.to_string());
        }

        if let Some((entry, strategy)) = match_compound(self.db, &elements) {
            log::debug!("compound {:?} matched '{}' via {:?}", elements, entry.key, strategy);
            let resolution = Resolution::CompoundHint {
                key: entry.key.clone(),
                strategy,
            };
            let mut plan = plan_from_entry(request, material, entry, resolution);
            plan.required = elements;
            return Ok(plan);
        }

        let family = match (request.structure_type, elements.len()) {
            (Some(family), _) => family,
            (None, 2) => StructureFamily::Zincblende,
            (None, 3) => StructureFamily::Perovskite,
            (None, n) => {
                return Err(SynthesisError::UnresolvedMaterial {
                    material,
                    reason: format!("no compound entry for {} elements {:?} and no generic family", n, elements),
                });
            }
        };
        log::debug!("compound {:?} has no entry; building generic {}", elements, family);
        Ok(SynthesisPlan {
            material,
            family,
            required: elements.clone(),
            elements,
            a: request.lattice_parameter.unwrap_or(DEFAULT_COMPOUND_LATTICE),
            c: None,
            supercell_dims: request.supercell_dims,
            resolution: Resolution::GenericCompound,
        })
    }
}

fn plan_from_entry(
    request: &StructureRequest,
    material: String,
    entry: &KnowledgeEntry,
    resolution: Resolution,
) -> SynthesisPlan {
    let family = request.structure_type.unwrap_or(entry.family);
    let a = request.lattice_parameter.unwrap_or(entry.a);

    // The entry's c only describes its own family; an overridden `a` keeps the entry's c/a.
    let c = if family == entry.family {
        entry.c_or_default().map(|c| c / entry.a * a)
    } else {
        None
    };

    let elements: Vec<String> = entry.elements.iter().map(|e| e.to_string()).collect();
    SynthesisPlan {
        material,
        family,
        required: elements.clone(),
        elements,
        a,
        c,
        supercell_dims: request.supercell_dims,
        resolution,
    }
}

fn generation_error(plan: &SynthesisPlan, failure: GenerationFailure) -> SynthesisError {
    match failure {
        GenerationFailure::Defect { .. } => SynthesisError::GeneratorDefect {
            family: plan.family.to_string(),
            elements: plan.elements.clone(),
            stage: "generation".into(),
            detail: failure.to_string(),
        },
        _ => SynthesisError::UnresolvableStructure {
            material: plan.material.clone(),
            family: plan.family.to_string(),
            elements: plan.elements.clone(),
            cause: failure.to_string(),
        },
    }
}

fn check_postconditions(plan: &SynthesisPlan, crystal: &Crystal) -> SynthesisResult<()> {
    let requested: BTreeSet<&str> = plan.elements.iter().chain(&plan.required).map(String::as_str).collect();
    let defect = |detail: String| SynthesisError::GeneratorDefect {
        family: plan.family.to_string(),
        elements: plan.elements.clone(),
        stage: "post-condition".into(),
        detail,
    };

    if requested.len() > 1 && crystal.n_atoms() < 2 {
        return Err(defect(format!("{} atom(s) for a multi-element request", crystal.n_atoms())));
    }
    if crystal.n_atoms() < requested.len() {
        return Err(defect(format!(
            "{} atom(s) for {} distinct elements",
            crystal.n_atoms(),
            requested.len()
        )));
    }
    let present: BTreeSet<&str> = crystal.species().into_iter().collect();
    if let Some(missing) = requested.iter().find(|el| !present.contains(*el)) {
        return Err(defect(format!("species {} is missing from the structure", missing)));
    }
    Ok(())
}
