use thiserror::Error;

/// Failures surfaced by the direct assistant. The variant is chosen where the
/// failure is detected, so callers can match on it for UI display.
#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("No API key configured for Eliza")]
    MissingApiKey,
    #[error("Eliza received an empty response from the model")]
    EmptyResponse,
    #[error("API quota exceeded. Please try again later.")]
    QuotaExceeded,
    #[error("Invalid API key. Please check your configuration.")]
    InvalidApiKey,
    #[error("The API key does not have permission to use this model.")]
    PermissionDenied,
    #[error("Model API request failed with status {status}: {message}")]
    Upstream { status: u16, message: String },
    /// Built with the request URL stripped from the error.
    #[error("Failed to reach the model API: {0}")]
    Transport(#[source] reqwest::Error),
}

impl AssistantError {
    /// Errors that say something about the key itself, as opposed to the request.
    pub fn is_key_problem(&self) -> bool {
        matches!(
            self,
            AssistantError::QuotaExceeded
                | AssistantError::InvalidApiKey
                | AssistantError::PermissionDenied
        )
    }
}
