//! The seam between traces and target formats.
use std::fmt;

use crate::model::Trace;
use crate::ops::OpId;
use crate::target::TargetSpec;

/// Converts a trace into a target format artifact.
pub trait Lowering {
    type Artifact;

    fn lower(&self, trace: &Trace, spec: &TargetSpec) -> Result<Self::Artifact, LoweringFailure>;
}

impl<L: Lowering + ?Sized> Lowering for &L {
    type Artifact = L::Artifact;

    fn lower(&self, trace: &Trace, spec: &TargetSpec) -> Result<Self::Artifact, LoweringFailure> {
        (**self).lower(trace, spec)
    }
}

#[derive(Debug)]
pub enum LoweringFailure {
    /// No implementation of `operator` in the target format. `node` names
    /// the first trace node using it.
    UnsupportedOperator { operator: OpId, node: String },
    Conversion(anyhow::Error),
}

impl LoweringFailure {
    pub fn unsupported(operator: impl Into<OpId>, node: impl Into<String>) -> LoweringFailure {
        LoweringFailure::UnsupportedOperator { operator: operator.into(), node: node.into() }
    }
}

impl fmt::Display for LoweringFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoweringFailure::UnsupportedOperator { operator, node } => {
                write!(f, "Unsupported operator {operator} (node {node:?})")
            }
            LoweringFailure::Conversion(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for LoweringFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoweringFailure::Conversion(e) => e.source(),
            LoweringFailure::UnsupportedOperator { .. } => None,
        }
    }
}

impl From<anyhow::Error> for LoweringFailure {
    fn from(e: anyhow::Error) -> LoweringFailure {
        LoweringFailure::Conversion(e)
    }
}
