//! The capability boundary between row enrichment and the medical NLP service.
//!
//! [`enrich_rows`](super::enrich_rows) only ever talks to a
//! [`MedicalTextAnalyzer`], so tests run against canned analyzers and the
//! real Comprehend Medical client stays behind the `aws` feature.

use async_trait::async_trait;
use thiserror::Error;

use crate::manifest::ParamValue;

// ============================================================================
// Analyzer Capability
// ============================================================================

/// A service that extracts medical entities from free text.
///
/// Both operations return the raw service response as a JSON value; shaping
/// that response into output columns is the formatter's job.
#[async_trait]
pub trait MedicalTextAnalyzer: Send + Sync {
    /// Detects medical entities (medications, conditions, anatomy, ...) in `text`.
    async fn detect_entities(&self, text: &str) -> Result<ParamValue, AnalyzerError>;

    /// Detects protected health information (names, addresses, ids, ...) in `text`.
    async fn detect_phi(&self, text: &str) -> Result<ParamValue, AnalyzerError>;
}

/// Which analyzer operation a recipe run invokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyzerOperation {
    DetectEntities,
    DetectPhi,
}

impl AnalyzerOperation {
    /// Default prefix for the bookkeeping columns of this operation.
    pub fn default_column_prefix(&self) -> &'static str {
        match self {
            AnalyzerOperation::DetectEntities => "medical_entity_api",
            AnalyzerOperation::DetectPhi => "medical_phi_api",
        }
    }
}

/// Dispatches one call to the operation selected by the run.
pub(crate) async fn invoke<A>(
    analyzer: &A,
    operation: AnalyzerOperation,
    text: &str,
) -> Result<ParamValue, AnalyzerError>
where
    A: MedicalTextAnalyzer + ?Sized,
{
    match operation {
        AnalyzerOperation::DetectEntities => analyzer.detect_entities(text).await,
        AnalyzerOperation::DetectPhi => analyzer.detect_phi(text).await,
    }
}

// ============================================================================
// Analyzer Errors
// ============================================================================

/// Errors surfaced by an analyzer call.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    /// The client is missing credentials or configuration.
    #[error("Analyzer is not configured: {0}")]
    NotConfigured(String),

    /// The request never produced a service response.
    #[error("HTTP transport error: {0}")]
    Http(String),

    /// The service asked us to slow down.
    #[error("Request throttled by the service: {0}")]
    Throttled(String),

    /// The service rejected the request.
    #[error("Service error {error_type}: {message}")]
    Service { error_type: String, message: String },

    /// The response could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AnalyzerError {
    /// Whether retrying the same call can reasonably succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AnalyzerError::Http(_) | AnalyzerError::Throttled(_))
    }

    /// Stable label recorded in the error-type bookkeeping column.
    pub fn type_label(&self) -> String {
        match self {
            AnalyzerError::NotConfigured(_) => "NotConfiguredError".to_string(),
            AnalyzerError::Http(_) => "HttpError".to_string(),
            AnalyzerError::Throttled(_) => "ThrottlingError".to_string(),
            AnalyzerError::Service { error_type, .. } => error_type.clone(),
            AnalyzerError::Serialization(_) => "SerializationError".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryability() {
        assert!(AnalyzerError::Http("connection reset".to_string()).is_retryable());
        assert!(AnalyzerError::Throttled("rate exceeded".to_string()).is_retryable());
        assert!(!AnalyzerError::NotConfigured("no region".to_string()).is_retryable());
        assert!(!AnalyzerError::Service {
            error_type: "ValidationException".to_string(),
            message: "bad input".to_string(),
        }
        .is_retryable());
    }

    #[test]
    fn test_type_labels() {
        let service = AnalyzerError::Service {
            error_type: "InternalServerException".to_string(),
            message: "oops".to_string(),
        };
        assert_eq!(service.type_label(), "InternalServerException");
        assert_eq!(
            AnalyzerError::Throttled("slow down".to_string()).type_label(),
            "ThrottlingError"
        );
    }

    #[test]
    fn test_default_column_prefixes() {
        assert_eq!(
            AnalyzerOperation::DetectEntities.default_column_prefix(),
            "medical_entity_api"
        );
        assert_eq!(
            AnalyzerOperation::DetectPhi.default_column_prefix(),
            "medical_phi_api"
        );
    }
}
