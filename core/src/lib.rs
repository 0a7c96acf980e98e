//! # Convoy core
//!
//! Captures a model's computation as a static [`Trace`](model::Trace) and
//! drives its conversion to an on-device format.
//!
//! The pipeline is linear with one conditional retry:
//!
//! * a [`Model`](adapter::Model) (usually a [`ModelAdapter`](adapter::ModelAdapter)
//!   over a registry model) is run once by the [`Tracer`](tracer::Tracer) on a
//!   fixed-shape sample, producing an immutable trace;
//! * the [`Exporter`](export::Exporter) hands the trace to a
//!   [`Lowering`](lowering::Lowering) backend;
//! * if the backend rejects the one operator it is known to lack, the model is
//!   traced again with an operator override active in the
//!   [`Dispatch`](dispatch::Dispatch), and lowering is tried once more.
//!
//! Overrides are not global state: the dispatch is an explicit argument of the
//! tracer, and an activation is a guard borrowing it mutably, so overlapping
//! activations do not compile.

#[macro_use]
extern crate derive_new;
#[macro_use]
extern crate log;

pub mod adapter;
pub mod dispatch;
pub mod errors;
pub mod export;
pub mod lowering;
pub mod model;
pub mod ops;
pub mod target;
pub mod tracer;

pub use convoy_data;
pub use downcast_rs;
pub use dyn_clone;

pub mod prelude {
    pub use crate::adapter::{Model, ModelAdapter, ModelRegistry, Prediction, RawModel};
    pub use crate::dispatch::{Dispatch, OpOverride, OverrideSet};
    pub use crate::errors::ExportError;
    pub use crate::export::{ExportReport, Exported, Exporter, Fallback};
    pub use crate::lowering::{Lowering, LoweringFailure};
    pub use crate::model::{OutletId, Trace};
    pub use crate::ops::OpId;
    pub use crate::target::{ImageInput, Platform, PlatformVersion, TargetSpec};
    pub use crate::tracer::{Tracer, TracingSession};
    pub use convoy_data::prelude::*;
}

pub mod internal {
    pub use crate::model::{OutletFact, TraceNode};
    pub use crate::ops::{Op, OpId};
    pub use crate::prelude::*;
    pub use convoy_data::internal::*;
    pub use std::fmt;
}

#[cfg(test)]
#[allow(dead_code)]
fn setup_test_logger() {
    let _ = env_logger::Builder::from_env("CONVOY_LOG").try_init();
}
