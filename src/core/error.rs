use thiserror::Error;

// ============================================================================
// ERROR TAXONOMY
// ============================================================================

/// Coarse classification of a [`SynthesisError`], used by callers to word
/// messages and to decide between retry, reconfiguration and abort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UnresolvedMaterial,
    UnresolvableStructure,
    GeneratorDefect,
    ExternalFetchFailure,
    MissingCredentials,
    ProviderError,
    Timeout,
    InvalidRequest,
}

#[derive(Debug, Error)]
pub enum SynthesisError {
    /// No knowledge entry, no usable compound hint and no element fallback.
    #[error("could not resolve material '{material}': {reason}")]
    UnresolvedMaterial { material: String, reason: String },

    /// The material resolved, but the selected family cannot be built from its elements.
    #[error("cannot build {family} structure for '{material}' (elements {elements:?}): {cause}")]
    UnresolvableStructure {
        material: String,
        family: String,
        elements: Vec<String>,
        cause: String,
    },

    /// A generator or the engine produced a structure violating its own invariants.
    #[error("generator defect in {family} for {elements:?} at stage '{stage}': {detail}")]
    GeneratorDefect {
        family: String,
        elements: Vec<String>,
        stage: String,
        detail: String,
    },

    #[error("failed to fetch '{source_id}' from {origin}: {}{detail}", status_prefix(.status))]
    ExternalFetchFailure {
        origin: String,
        source_id: String,
        status: Option<u16>,
        detail: String,
    },

    #[error("missing credentials for {service}: {hint}")]
    MissingCredentials { service: String, hint: String },

    #[error("LLM provider '{provider}' failed: {detail}")]
    ProviderError { provider: String, detail: String },

    #[error("{service} did not answer within {seconds} s")]
    Timeout { service: String, seconds: u64 },

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl SynthesisError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnresolvedMaterial { .. } => ErrorKind::UnresolvedMaterial,
            Self::UnresolvableStructure { .. } => ErrorKind::UnresolvableStructure,
            Self::GeneratorDefect { .. } => ErrorKind::GeneratorDefect,
            Self::ExternalFetchFailure { .. } => ErrorKind::ExternalFetchFailure,
            Self::MissingCredentials { .. } => ErrorKind::MissingCredentials,
            Self::ProviderError { .. } => ErrorKind::ProviderError,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
        }
    }

    /// Only exceeded timeouts are worth repeating verbatim.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// True for failures talking to a remote system, as opposed to logic failures.
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            Self::ExternalFetchFailure { .. } | Self::ProviderError { .. } | Self::Timeout { .. }
        )
    }
}

fn status_prefix(status: &Option<u16>) -> String {
    status.map(|s| format!("[status {}] ", s)).unwrap_or_default()
}

pub type SynthesisResult<T> = Result<T, SynthesisError>;
