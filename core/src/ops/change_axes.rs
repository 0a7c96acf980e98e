use crate::internal::*;
use crate::ops;

/// Removes one axis of dimension 1.
#[derive(Debug, Clone, new, PartialEq)]
pub struct Squeeze {
    pub axis: usize,
}

impl Op for Squeeze {
    fn name(&self) -> Cow<'_, str> {
        "squeeze".into()
    }

    fn info(&self) -> ConvoyResult<Vec<String>> {
        Ok(vec![format!("axis: {}", self.axis)])
    }

    fn same_as(&self, other: &dyn Op) -> bool {
        other.downcast_ref::<Self>().is_some_and(|other| other == self)
    }

    fn eval(&self, inputs: TVec<Arc<Tensor>>) -> ConvoyResult<TVec<Arc<Tensor>>> {
        ops::check_input_arity(&inputs, 1)?;
        let input = &inputs[0];
        if input.shape().get(self.axis) != Some(&1) {
            bail!("Can not squeeze axis {} of shape {:?}", self.axis, input.shape());
        }
        let mut shape: TVec<usize> = input.shape().into();
        shape.remove(self.axis);
        let output = Tensor::from_shape(&shape, input.as_slice()?)?;
        Ok(tvec!(output.cast_to_dt(input.datum_type()).into_arc_tensor()))
    }
}
