#[macro_use]
mod macros;

/// A Smallvec instantiation with 4 embeddable values.
///
/// Used for node inputs and outputs, and tensor shapes: rank-4 tensors are
/// the common case here.
pub type TVec<T> = smallvec::SmallVec<[T; 4]>;

pub type ConvoyError = anyhow::Error;
pub type ConvoyResult<T> = anyhow::Result<T>;

pub mod prelude {
    pub use crate::datum::DatumType;
    pub use crate::tensor::{IntoArcTensor, Tensor};
    pub use crate::tvec;
    pub use crate::TVec;
    pub use crate::{ConvoyError, ConvoyResult};
}

pub mod internal {
    pub use crate::prelude::*;
    pub use anyhow::{anyhow, bail, ensure, format_err, Context as ConvoyErrorContext};
    pub use ndarray as convoy_ndarray;
    pub use smallvec as convoy_smallvec;
    pub use std::borrow::Cow;
    pub use std::collections::HashMap;
    pub use std::sync::Arc;
}

pub use anyhow;
pub use half;
pub use itertools;
pub use ndarray;

mod datum;
mod tensor;
