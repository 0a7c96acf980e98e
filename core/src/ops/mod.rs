//! Ops
use std::fmt;

use downcast_rs::Downcast;
use dyn_clone::DynClone;

use crate::internal::*;

pub mod binary;
pub mod change_axes;
pub mod conv;
pub mod element_wise;
pub mod grid_sample;
pub mod resize;
pub mod source;

/// Identifier of a primitive operator, as recognized by lowering backends.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpId(pub String);

impl OpId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for OpId {
    fn from(s: &str) -> OpId {
        OpId(s.to_string())
    }
}

impl From<String> for OpId {
    fn from(s: String) -> OpId {
        OpId(s)
    }
}

impl<'a> From<Cow<'a, str>> for OpId {
    fn from(s: Cow<'a, str>) -> OpId {
        OpId(s.into_owned())
    }
}

impl PartialEq<str> for OpId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for OpId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl fmt::Display for OpId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A primitive tensor operation.
///
/// Ops are evaluated eagerly while a model is traced, and recorded with their
/// parameters in the trace.
pub trait Op: fmt::Debug + DynClone + Send + Sync + 'static + Downcast {
    /// Operator identifier. Two ops with the same name are the same primitive,
    /// possibly with different parameters.
    fn name(&self) -> Cow<'_, str>;

    fn id(&self) -> OpId {
        self.name().into()
    }

    /// Short (one-line) strings giving the op parameters, for dumps and
    /// structural comparisons.
    fn info(&self) -> ConvoyResult<Vec<String>> {
        Ok(vec![])
    }

    /// Compare two ops.
    fn same_as(&self, _other: &dyn Op) -> bool {
        false
    }

    /// Evaluates the operation given the input tensors.
    fn eval(&self, inputs: TVec<Arc<Tensor>>) -> ConvoyResult<TVec<Arc<Tensor>>>;

    /// An equivalent op running the `substitute` primitive, every other
    /// parameter forwarded unchanged.
    ///
    /// Returns None if the op has no such variant.
    fn substitute(&self, _substitute: &OpId) -> Option<Box<dyn Op>> {
        None
    }
}

dyn_clone::clone_trait_object!(Op);
downcast_rs::impl_downcast!(Op);

impl<O: Op> From<O> for Box<dyn Op> {
    fn from(it: O) -> Box<dyn Op> {
        Box::new(it)
    }
}

pub fn check_input_arity(inputs: &[Arc<Tensor>], expected: usize) -> ConvoyResult<()> {
    if inputs.len() != expected {
        bail!("Wrong input number. Op expects {}, got {}.", expected, inputs.len())
    } else {
        Ok(())
    }
}
