use thiserror::Error;

/// Failures that abort a derivation request.
///
/// Oracle and catalog problems never show up here; they degrade to fallback
/// values inside their own modules.
#[derive(Debug, Error)]
pub enum DerivationError {
    #[error("relation graph unavailable: {0}")]
    ResourceUnavailable(String),
}

impl DerivationError {
    pub(crate) fn unavailable(err: &anyhow::Error) -> Self {
        DerivationError::ResourceUnavailable(format!("{err:#}"))
    }
}
