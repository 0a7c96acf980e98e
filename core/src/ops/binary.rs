use crate::internal::*;
use crate::ops;

/// Element-wise sum of two tensors of the same shape.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Add;

impl Op for Add {
    fn name(&self) -> Cow<'_, str> {
        "add".into()
    }

    fn same_as(&self, other: &dyn Op) -> bool {
        other.is::<Self>()
    }

    fn eval(&self, inputs: TVec<Arc<Tensor>>) -> ConvoyResult<TVec<Arc<Tensor>>> {
        ops::check_input_arity(&inputs, 2)?;
        let (a, b) = (&inputs[0], &inputs[1]);
        if a.shape() != b.shape() {
            bail!("Add operands have different shapes: {:?} and {:?}", a.shape(), b.shape());
        }
        let sum = &a.to_array_view() + &b.to_array_view();
        Ok(tvec!(Tensor::from(sum).cast_to_dt(a.datum_type()).into_arc_tensor()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_same_shape() {
        let a = Tensor::from_shape(&[2], &[1.0, 2.0]).unwrap().into_arc_tensor();
        let b = Tensor::from_shape(&[2], &[10.0, 20.0]).unwrap().into_arc_tensor();
        let out = Add.eval(tvec!(a, b)).unwrap();
        assert_eq!(out[0].as_slice().unwrap(), &[11.0, 22.0]);
    }

    #[test]
    fn add_rejects_broadcast() {
        let a = Tensor::zero(&[2]).into_arc_tensor();
        let b = Tensor::zero(&[1]).into_arc_tensor();
        assert!(Add.eval(tvec!(a, b)).is_err());
    }
}
