//! Failures of an export run.
use std::fmt;
use std::path::PathBuf;

use crate::lowering::LoweringFailure;
use crate::ops::OpId;

/// Why an export run stopped.
///
/// Only an [`UnsupportedOperator`](ExportError::UnsupportedOperator) failure
/// for the one operator the fallback knows about is ever recovered, inside the
/// [`Exporter`](crate::export::Exporter). Everything else propagates.
#[derive(Debug)]
pub enum ExportError {
    /// The registry could not provide the model.
    ModelLoad { identifier: String, source: anyhow::Error },
    /// The model could not be traced.
    Trace(anyhow::Error),
    /// The lowering backend has no implementation for `operator`.
    UnsupportedOperator { operator: OpId, node: String },
    /// Any other lowering failure.
    Conversion(anyhow::Error),
    /// The artifact could not be written.
    Persist { path: PathBuf, source: anyhow::Error },
}

impl ExportError {
    /// Operator identifier carried by an unsupported operator failure.
    pub fn unsupported_operator(&self) -> Option<&OpId> {
        match self {
            ExportError::UnsupportedOperator { operator, .. } => Some(operator),
            _ => None,
        }
    }
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::ModelLoad { identifier, .. } => write!(f, "Failed to load model {identifier}"),
            ExportError::Trace(_) => write!(f, "Failed to trace model"),
            ExportError::UnsupportedOperator { operator, node } => {
                write!(f, "Unsupported operator {operator} (node {node:?})")
            }
            ExportError::Conversion(_) => write!(f, "Conversion failed"),
            ExportError::Persist { path, .. } => write!(f, "Failed to save {path:?}"),
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExportError::ModelLoad { source, .. } | ExportError::Persist { source, .. } => {
                Some(&**source)
            }
            ExportError::Trace(e) | ExportError::Conversion(e) => Some(&**e),
            ExportError::UnsupportedOperator { .. } => None,
        }
    }
}

impl From<LoweringFailure> for ExportError {
    fn from(failure: LoweringFailure) -> ExportError {
        match failure {
            LoweringFailure::UnsupportedOperator { operator, node } => {
                ExportError::UnsupportedOperator { operator, node }
            }
            LoweringFailure::Conversion(e) => ExportError::Conversion(e),
        }
    }
}
