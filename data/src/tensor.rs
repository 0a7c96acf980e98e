//! `Tensor` is the main data container for convoy.
use crate::datum::DatumType;
use crate::ConvoyResult;
use itertools::Itertools;
use ndarray::prelude::*;
use std::fmt;
use std::sync::Arc;

/// A dense tensor of `f32` values, tagged with the datum type its values
/// conform to.
#[derive(Clone, PartialEq)]
pub struct Tensor {
    dt: DatumType,
    data: ArrayD<f32>,
}

impl Tensor {
    /// Tensor filled with zeros.
    pub fn zero(shape: &[usize]) -> Tensor {
        Tensor { dt: DatumType::F32, data: ArrayD::zeros(IxDyn(shape)) }
    }

    /// Tensor filled with `value`.
    pub fn uniform(shape: &[usize], value: f32) -> Tensor {
        Tensor { dt: DatumType::F32, data: ArrayD::from_elem(IxDyn(shape), value) }
    }

    /// Scalar (rank 0) tensor.
    pub fn scalar(value: f32) -> Tensor {
        Tensor { dt: DatumType::F32, data: arr0(value).into_dyn() }
    }

    /// Build a tensor from a shape and row-major data.
    pub fn from_shape(shape: &[usize], data: &[f32]) -> ConvoyResult<Tensor> {
        let data = ArrayD::from_shape_vec(IxDyn(shape), data.to_vec()).map_err(|e| {
            anyhow::anyhow!("Building tensor of shape {:?} from {} values: {}", shape, data.len(), e)
        })?;
        Ok(Tensor { dt: DatumType::F32, data })
    }

    pub fn datum_type(&self) -> DatumType {
        self.dt
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn rank(&self) -> usize {
        self.data.ndim()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Values in row-major order.
    pub fn as_slice(&self) -> ConvoyResult<&[f32]> {
        self.data
            .as_slice()
            .ok_or_else(|| anyhow::anyhow!("Tensor is not in standard layout"))
    }

    pub fn to_array_view(&self) -> ArrayViewD<'_, f32> {
        self.data.view()
    }

    pub fn into_array(self) -> ArrayD<f32> {
        self.data
    }

    /// Rounds values through `dt`.
    pub fn cast_to_dt(&self, dt: DatumType) -> Tensor {
        if dt == self.dt {
            return self.clone();
        }
        Tensor { dt, data: self.data.mapv(|x| dt.round(x)) }
    }

    /// True if all the values are the same.
    pub fn is_uniform(&self) -> bool {
        let mut it = self.data.iter();
        match it.next() {
            Some(first) => it.all(|x| x == first),
            None => true,
        }
    }

    /// Checks that `other` has the same shape and values within `epsilon`.
    pub fn close_enough(&self, other: &Tensor, epsilon: f32) -> ConvoyResult<()> {
        if self.shape() != other.shape() {
            anyhow::bail!("Shape mismatch {:?} != {:?}", self.shape(), other.shape())
        }
        for (ix, (a, b)) in self.data.iter().zip(other.data.iter()).enumerate() {
            if (a - b).abs() > epsilon && !(a.is_nan() && b.is_nan()) {
                anyhow::bail!("Mismatch at flat index {}: {} != {} (epsilon {})", ix, a, b, epsilon)
            }
        }
        Ok(())
    }
}

impl<D: Dimension> From<Array<f32, D>> for Tensor {
    fn from(it: Array<f32, D>) -> Tensor {
        let data = it.into_dyn();
        let data = if data.is_standard_layout() { data } else { data.as_standard_layout().into_owned() };
        Tensor { dt: DatumType::F32, data }
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let content = self.data.iter().take(8).map(|x| format!("{x}")).join(", ");
        let ellipsis = if self.len() > 8 { ", ..." } else { "" };
        write!(f, "{},{} {}{}", self.shape().iter().join(","), self.dt, content, ellipsis)
    }
}

pub trait IntoArcTensor {
    fn into_arc_tensor(self) -> Arc<Tensor>;
}

impl IntoArcTensor for Tensor {
    fn into_arc_tensor(self) -> Arc<Tensor> {
        Arc::new(self)
    }
}

impl IntoArcTensor for Arc<Tensor> {
    fn into_arc_tensor(self) -> Arc<Tensor> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_shape_checks_volume() {
        assert!(Tensor::from_shape(&[2, 2], &[1.0, 2.0, 3.0]).is_err());
        let t = Tensor::from_shape(&[2, 2], &[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(t.shape(), &[2, 2]);
        assert_eq!(t.as_slice().unwrap(), &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn transposed_arrays_are_made_standard() {
        let a = arr2(&[[1.0f32, 2.0], [3.0, 4.0]]).reversed_axes();
        let t = Tensor::from(a);
        assert_eq!(t.as_slice().unwrap(), &[1.0, 3.0, 2.0, 4.0]);
    }

    #[test]
    fn cast_to_f16_rounds() {
        let t = Tensor::from_shape(&[1], &[0.1]).unwrap();
        let h = t.cast_to_dt(DatumType::F16);
        assert_eq!(h.datum_type(), DatumType::F16);
        approx::assert_abs_diff_eq!(h.as_slice().unwrap()[0], 0.099975586, epsilon = 1e-9);
    }

    #[test]
    fn close_enough() {
        let a = Tensor::uniform(&[2, 3], 1.0);
        let b = Tensor::uniform(&[2, 3], 1.0005);
        assert!(a.close_enough(&b, 1e-3).is_ok());
        assert!(a.close_enough(&b, 1e-4).is_err());
        assert!(a.close_enough(&Tensor::uniform(&[3, 2], 1.0), 1.0).is_err());
    }

    #[test]
    fn uniform() {
        assert!(Tensor::zero(&[4, 4]).is_uniform());
        assert!(!Tensor::from_shape(&[2], &[0.0, 1.0]).unwrap().is_uniform());
    }
}
