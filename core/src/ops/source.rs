use crate::internal::*;

/// Declared model input.
#[derive(Debug, Clone, new, PartialEq)]
pub struct Source {
    pub fact: OutletFact,
}

impl Op for Source {
    fn name(&self) -> Cow<'_, str> {
        "external".into()
    }

    fn info(&self) -> ConvoyResult<Vec<String>> {
        Ok(vec![format!("{:?}", self.fact)])
    }

    fn same_as(&self, other: &dyn Op) -> bool {
        other.downcast_ref::<Self>().is_some_and(|other| other == self)
    }

    fn eval(&self, _inputs: TVec<Arc<Tensor>>) -> ConvoyResult<TVec<Arc<Tensor>>> {
        bail!("Source is fed by the trace, not evaluated")
    }
}
