//! Trace, lower, and retry once under operator overrides.
use crate::dispatch::{Dispatch, OverrideSet};
use crate::errors::ExportError;
use crate::internal::*;
use crate::lowering::{Lowering, LoweringFailure};
use crate::model::Trace;
use crate::target::TargetSpec;
use crate::tracer::Tracer;

/// The one operator incompatibility the exporter recovers from, and the
/// overrides that work around it.
#[derive(Clone, Debug, PartialEq)]
pub struct Fallback {
    pub operator: OpId,
    pub overrides: OverrideSet,
}

impl Fallback {
    pub fn new(operator: impl Into<OpId>, overrides: OverrideSet) -> Fallback {
        Fallback { operator: operator.into(), overrides }
    }

    /// True if `failure` reports exactly this operator as unsupported.
    pub fn matches(&self, failure: &LoweringFailure) -> bool {
        matches!(failure, LoweringFailure::UnsupportedOperator { operator, .. } if *operator == self.operator)
    }
}

impl Default for Fallback {
    fn default() -> Fallback {
        Fallback::new("bicubic_resize", OverrideSet::bicubic_to_bilinear())
    }
}

/// What happened during an export run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExportReport {
    pub traces: usize,
    pub lowering_attempts: usize,
    pub fallback_applied: bool,
}

/// A successful export: the artifact and the trace it was lowered from.
#[derive(Debug)]
pub struct Exported<A> {
    pub artifact: A,
    pub trace: Trace,
    pub report: ExportReport,
}

/// Drives a model through tracing and lowering.
#[derive(Debug)]
pub struct Exporter<L: Lowering> {
    tracer: Tracer,
    lowering: L,
    spec: TargetSpec,
    fallback: Option<Fallback>,
    seed: u64,
}

impl<L: Lowering> Exporter<L> {
    pub fn new(tracer: Tracer, lowering: L, spec: TargetSpec) -> Exporter<L> {
        Exporter { tracer, lowering, spec, fallback: Some(Fallback::default()), seed: 0 }
    }

    pub fn with_fallback(self, fallback: Fallback) -> Exporter<L> {
        Exporter { fallback: Some(fallback), ..self }
    }

    pub fn without_fallback(self) -> Exporter<L> {
        Exporter { fallback: None, ..self }
    }

    /// Seed of the sample input both traces are built from.
    pub fn with_seed(self, seed: u64) -> Exporter<L> {
        Exporter { seed, ..self }
    }

    pub fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    pub fn lowering(&self) -> &L {
        &self.lowering
    }

    pub fn spec(&self) -> &TargetSpec {
        &self.spec
    }

    pub fn fallback(&self) -> Option<&Fallback> {
        self.fallback.as_ref()
    }

    /// Exports `model`.
    ///
    /// The model is traced and lowered. If lowering rejects the fallback
    /// operator, and only that one, the model is traced again on the same
    /// sample with the fallback overrides active in `dispatch`, and the new
    /// trace is lowered. The outcome of this second lowering is final.
    pub fn export(
        &self,
        model: &dyn Model,
        dispatch: &mut Dispatch,
    ) -> Result<Exported<L::Artifact>, ExportError> {
        let mut report = ExportReport::default();
        let sample = self.tracer.sample_input(self.seed).map_err(ExportError::Trace)?;

        info!("Tracing {}...", model.name());
        let trace = self.trace(model, &sample, dispatch, &mut report)?;

        info!("Converting to {}...", self.spec.minimum_platform);
        report.lowering_attempts += 1;
        let failure = match self.lowering.lower(&trace, &self.spec) {
            Ok(artifact) => return Ok(Exported { artifact, trace, report }),
            Err(failure) => failure,
        };
        let Some(fallback) = self.fallback.as_ref().filter(|fb| fb.matches(&failure)) else {
            return Err(failure.into());
        };

        warn!("{failure}. Retrying with {}", fallback.overrides);
        let trace = {
            let scoped = dispatch.activate(fallback.overrides.clone());
            self.trace(model, &sample, &scoped, &mut report)?
        };
        report.fallback_applied = true;
        report.lowering_attempts += 1;
        let artifact = self.lowering.lower(&trace, &self.spec)?;
        info!("Converted with fallback overrides: {}", fallback.overrides);
        Ok(Exported { artifact, trace, report })
    }

    fn trace(
        &self,
        model: &dyn Model,
        sample: &Tensor,
        dispatch: &Dispatch,
        report: &mut ExportReport,
    ) -> Result<Trace, ExportError> {
        report.traces += 1;
        self.tracer.trace(model, sample, dispatch).map_err(ExportError::Trace)
    }
}
