//! # Convoy packages
//!
//! The on-device format convoy exports to: a directory (or tar archive)
//! holding an NNEF-like `graph.nnef`, one `.dat` file per weight tensor, and
//! a `manifest.json` describing the image input, the outputs and the minimum
//! platform.
//!
//! ```no_run
//! # use convoy_core::prelude::*;
//! # fn export(trace: &Trace, spec: &TargetSpec) -> ConvoyResult<()> {
//! let package = convoy_package::lowering().lower(trace, spec)?;
//! package.write_to_dir("Model.convoy")?;
//! # Ok(())
//! # }
//! ```
#[macro_use]
extern crate log;

pub mod ast;
pub mod dump;
pub mod lowering;
pub mod manifest;
pub mod ops;
pub mod package;
pub mod registry;
pub mod ser;
pub mod tensors;

pub use lowering::PackageLowering;
pub use manifest::{Manifest, read_manifest};
pub use package::{Package, read_tensor};

/// A lowering to packages with the standard operator set.
pub fn lowering() -> PackageLowering {
    PackageLowering::default()
}

pub mod internal {
    pub use crate::ast::RValue;
    pub use convoy_core::internal::*;
}
