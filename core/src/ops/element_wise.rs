use crate::internal::*;
use crate::ops;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Relu;

impl Op for Relu {
    fn name(&self) -> Cow<'_, str> {
        "relu".into()
    }

    fn same_as(&self, other: &dyn Op) -> bool {
        other.is::<Self>()
    }

    fn eval(&self, inputs: TVec<Arc<Tensor>>) -> ConvoyResult<TVec<Arc<Tensor>>> {
        ops::check_input_arity(&inputs, 1)?;
        let input = &inputs[0];
        let output = input.to_array_view().mapv(|x| x.max(0.0));
        Ok(tvec!(Tensor::from(output).cast_to_dt(input.datum_type()).into_arc_tensor()))
    }
}

