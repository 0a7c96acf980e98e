//! Scoped operator overrides.
//!
//! A [`Dispatch`] is the context the tracer resolves every wired op through.
//! While a [`ScopedOverrides`] guard is alive, ops whose identifier is
//! overridden are replaced by their substitute, all other parameters
//! forwarded unchanged. Dropping the guard restores the original dispatch.
//!
//! The guard borrows the dispatch mutably, so at most one activation exists at
//! any time:
//!
//! ```compile_fail
//! use convoy_core::dispatch::{Dispatch, OverrideSet};
//! let mut dispatch = Dispatch::default();
//! let outer = dispatch.activate(OverrideSet::bicubic_to_bilinear());
//! let inner = dispatch.activate(OverrideSet::bicubic_to_bilinear());
//! drop((outer, inner));
//! ```
use std::fmt;
use std::ops::Deref;

use crate::internal::*;
use itertools::Itertools;

/// Redirects one operator identifier to another.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OpOverride {
    pub from: OpId,
    pub to: OpId,
}

impl OpOverride {
    pub fn new(from: impl Into<OpId>, to: impl Into<OpId>) -> OpOverride {
        OpOverride { from: from.into(), to: to.into() }
    }
}

impl fmt::Display for OpOverride {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

/// A set of overrides, at most one per overridden identifier.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OverrideSet(Vec<OpOverride>);

impl OverrideSet {
    /// Cubic resampling replaced by bilinear resampling.
    pub fn bicubic_to_bilinear() -> OverrideSet {
        OverrideSet::default().with(OpOverride::new("bicubic_resize", "bilinear_resize"))
    }

    /// Adds `over`, replacing any override of the same identifier.
    pub fn with(mut self, over: OpOverride) -> OverrideSet {
        self.0.retain(|o| o.from != over.from);
        self.0.push(over);
        self
    }

    pub fn get(&self, from: &str) -> Option<&OpOverride> {
        self.0.iter().find(|o| o.from == from)
    }

    pub fn iter(&self) -> impl Iterator<Item = &OpOverride> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<OpOverride> for OverrideSet {
    fn from_iter<I: IntoIterator<Item = OpOverride>>(iter: I) -> OverrideSet {
        iter.into_iter().fold(OverrideSet::default(), |set, o| set.with(o))
    }
}

impl fmt::Display for OverrideSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0.iter().join(", "))
    }
}

/// Operator dispatch context for tracing.
#[derive(Debug, Default)]
pub struct Dispatch {
    active: Option<OverrideSet>,
    activations: usize,
}

impl Dispatch {
    /// Activates `overrides` until the returned guard is dropped.
    pub fn activate(&mut self, overrides: OverrideSet) -> ScopedOverrides<'_> {
        debug!("Activating operator overrides: {}", overrides);
        self.activations += 1;
        self.active = Some(overrides);
        ScopedOverrides { dispatch: self }
    }

    pub fn active(&self) -> Option<&OverrideSet> {
        self.active.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Number of activations since this dispatch was created.
    pub fn activations(&self) -> usize {
        self.activations
    }

    /// The op to actually run for `op`: its substitute if its identifier is
    /// overridden, the op itself otherwise.
    pub fn resolve(&self, op: Box<dyn Op>) -> ConvoyResult<Box<dyn Op>> {
        let Some(over) = self.active.as_ref().and_then(|set| set.get(&op.name())) else {
            return Ok(op);
        };
        let Some(substitute) = op.substitute(&over.to) else {
            bail!("Operator {} can not be substituted by {}", over.from, over.to)
        };
        trace!("Substituted {:?} by {:?}", op, substitute);
        Ok(substitute)
    }
}

/// An active set of overrides. Dropping it restores the dispatch.
#[derive(Debug)]
pub struct ScopedOverrides<'d> {
    dispatch: &'d mut Dispatch,
}

impl Deref for ScopedOverrides<'_> {
    type Target = Dispatch;
    fn deref(&self) -> &Dispatch {
        self.dispatch
    }
}

impl Drop for ScopedOverrides<'_> {
    fn drop(&mut self) {
        if let Some(overrides) = self.dispatch.active.take() {
            debug!("Released operator overrides: {}", overrides);
        }
    }
}
