// ============================================================================
// MODULE DECLARATIONS
// ============================================================================
pub mod analysis;
pub mod chemistry;
pub mod config;
pub mod core;
pub mod io;
pub mod llm;
pub mod math;
pub mod sources;
pub mod synthesis;

// ============================================================================
// RE-EXPORTS (Public API)
// ============================================================================
pub use crate::analysis::calculation::{CalculationResult, Calculator, MockFoundationModel};
pub use crate::chemistry::database::{KnowledgeEntry, LatticeDatabase};
pub use crate::config::{FetchConfig, LlmConfig};
pub use crate::core::error::{ErrorKind, SynthesisError, SynthesisResult};
pub use crate::core::structure::{Atom, Crystal, Lattice};
pub use crate::io::parser::StructureFormat;
pub use crate::io::{parser, writer};
pub use crate::llm::extractor::{parse_llm_response, ParameterExtractor};
pub use crate::llm::providers::{Provider, ProviderParams};
pub use crate::sources::resolver::{SourceParams, SourceResolver, SourceType};
pub use crate::synthesis::engine::{StructureRequest, StructureSynthesizer};
pub use crate::synthesis::family::StructureFamily;
pub use crate::synthesis::supercell::{check_dims, make_supercell, MAX_SUPERCELL_CELLS};

// ============================================================================
// HIGH-LEVEL INTERFACE
// ============================================================================

/// Builds a structure from the built-in knowledge base.
pub fn synthesize(request: &StructureRequest) -> SynthesisResult<Crystal> {
    StructureSynthesizer::new().synthesize(request)
}

/// Obtains a structure from a database id, file, URL, inline text, or (for
/// `auto` sources that match none of these) the synthesis engine.
pub fn load_structure(source: &str, source_type: SourceType, params: &SourceParams) -> SynthesisResult<Crystal> {
    SourceResolver::from_env().resolve(source, source_type, params)
}

/// Asks an LLM provider to turn a description into a request and builds it.
pub fn generate_from_description(
    description: &str,
    provider: Provider,
    params: &ProviderParams,
) -> SynthesisResult<Crystal> {
    ParameterExtractor::from_env().generate(description, provider, params)
}

/// Runs `calculator` on `crystal` and renders the summary shown after every command.
pub fn structure_report(crystal: &Crystal, calculator: &dyn Calculator) -> (CalculationResult, String) {
    let result = calculator.calculate(crystal);
    let (a, b, c, alpha, beta, gamma) = crystal.lattice.to_parameters();
    let species: Vec<String> = crystal
        .species_counts()
        .iter()
        .map(|(el, n)| format!("{}×{}", el, n))
        .collect();

    let report = format!(
        "--- Structure Report ---\n\
         • Formula:     {}\n\
         • Atoms:       {} ({})\n\
         • Cell:        a={:.4} b={:.4} c={:.4} Å\n\
         • Angles:      α={:.2} β={:.2} γ={:.2}°\n\
         • Volume:      {:.4} Å³\n\
         • Periodic:    {:?}\n\
         • Energy:      {:.4} eV ({})\n\
         • Max Force:   {:.4} eV/Å",
        crystal.formula(),
        crystal.n_atoms(),
        species.join(", "),
        a, b, c, alpha, beta, gamma,
        crystal.lattice.volume(),
        crystal.periodic,
        result.energy,
        calculator.name(),
        result.max_force,
    );
    (result, report)
}
