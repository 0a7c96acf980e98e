use crate::internal::*;
use crate::ops;
use ndarray::prelude::*;
use ndarray::s;

/// Resampling kernel of a [`Resize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interpolator {
    Nearest,
    Linear,
    Cubic,
}

impl Interpolator {
    /// Operator identifier of a resize using this kernel.
    pub fn op_name(&self) -> &'static str {
        match self {
            Interpolator::Nearest => "nearest_resize",
            Interpolator::Linear => "bilinear_resize",
            Interpolator::Cubic => "bicubic_resize",
        }
    }

    pub fn for_op_name(name: &str) -> Option<Interpolator> {
        [Interpolator::Nearest, Interpolator::Linear, Interpolator::Cubic]
            .into_iter()
            .find(|it| it.op_name() == name)
    }
}

/// Cubic convolution coefficient, as used by the common training frameworks.
const CUBIC_A: f32 = -0.75;

fn cubic_weight(x: f32) -> f32 {
    let x = x.abs();
    if x <= 1.0 {
        ((CUBIC_A + 2.0) * x - (CUBIC_A + 3.0)) * x * x + 1.0
    } else if x < 2.0 {
        ((CUBIC_A * x - 5.0 * CUBIC_A) * x + 8.0 * CUBIC_A) * x - 4.0 * CUBIC_A
    } else {
        0.0
    }
}

/// Spatial resampling of NCHW data to a fixed size.
///
/// Source coordinates follow the half pixel convention, or map corners onto
/// corners when `align_corners` is set.
#[derive(Debug, Clone, new, PartialEq)]
pub struct Resize {
    pub interpolator: Interpolator,
    pub size: [usize; 2],
    pub align_corners: bool,
    pub antialias: bool,
    pub dtype: Option<DatumType>,
}

impl Resize {
    fn source_coord(&self, dst: usize, in_len: usize, out_len: usize) -> f32 {
        if self.align_corners {
            if out_len > 1 {
                dst as f32 * (in_len - 1) as f32 / (out_len - 1) as f32
            } else {
                0.0
            }
        } else {
            let src = (dst as f32 + 0.5) * in_len as f32 / out_len as f32 - 0.5;
            if self.interpolator == Interpolator::Linear { src.max(0.0) } else { src }
        }
    }

    /// For each output coordinate along one axis, the contributing input
    /// coordinates and their weights.
    fn taps(&self, in_len: usize, out_len: usize) -> Vec<TVec<(usize, f32)>> {
        let last = in_len as isize - 1;
        let clamp = |ix: isize| ix.clamp(0, last) as usize;
        (0..out_len)
            .map(|dst| match self.interpolator {
                Interpolator::Nearest => {
                    let src = (dst as f32 * in_len as f32 / out_len as f32).floor() as isize;
                    tvec!((clamp(src), 1.0))
                }
                Interpolator::Linear => {
                    let src = self.source_coord(dst, in_len, out_len);
                    let i0 = clamp(src.floor() as isize);
                    let i1 = clamp(i0 as isize + 1);
                    let lambda = (src - i0 as f32).clamp(0.0, 1.0);
                    tvec!((i0, 1.0 - lambda), (i1, lambda))
                }
                Interpolator::Cubic => {
                    let src = self.source_coord(dst, in_len, out_len);
                    let i = src.floor();
                    let t = src - i;
                    let i = i as isize;
                    tvec!(
                        (clamp(i - 1), cubic_weight(t + 1.0)),
                        (clamp(i), cubic_weight(t)),
                        (clamp(i + 1), cubic_weight(1.0 - t)),
                        (clamp(i + 2), cubic_weight(2.0 - t)),
                    )
                }
            })
            .collect()
    }
}

impl Op for Resize {
    fn name(&self) -> Cow<'_, str> {
        self.interpolator.op_name().into()
    }

    fn info(&self) -> ConvoyResult<Vec<String>> {
        Ok(vec![
            format!("size: {:?}", self.size),
            format!("align_corners: {} antialias: {}", self.align_corners, self.antialias),
            format!("dtype: {:?}", self.dtype),
        ])
    }

    fn same_as(&self, other: &dyn Op) -> bool {
        other.downcast_ref::<Self>().is_some_and(|other| other == self)
    }

    fn eval(&self, inputs: TVec<Arc<Tensor>>) -> ConvoyResult<TVec<Arc<Tensor>>> {
        ops::check_input_arity(&inputs, 1)?;
        let input = &inputs[0];
        if input.rank() != 4 {
            bail!("Resize expects NCHW input, got shape {:?}", input.shape());
        }
        let (n, c, ih, iw) = (input.shape()[0], input.shape()[1], input.shape()[2], input.shape()[3]);
        let [oh, ow] = self.size;
        if ih == 0 || iw == 0 || oh == 0 || ow == 0 {
            bail!("Can not resize {:?} to {:?}", input.shape(), self.size);
        }
        if self.antialias && self.interpolator != Interpolator::Nearest && (oh < ih || ow < iw) {
            bail!("Antialiased downsampling is not implemented ({:?} to {:?})", input.shape(), self.size);
        }
        let rows = self.taps(ih, oh);
        let cols = self.taps(iw, ow);
        let x = input.to_array_view().into_dimensionality::<Ix4>()?;
        let mut output = Array4::<f32>::zeros((n, c, oh, ow));
        for b in 0..n {
            for ch in 0..c {
                let plane = x.slice(s![b, ch, .., ..]);
                for (y, row_taps) in rows.iter().enumerate() {
                    for (xo, col_taps) in cols.iter().enumerate() {
                        let mut acc = 0.0;
                        for &(iy, wy) in row_taps {
                            for &(ix, wx) in col_taps {
                                acc += wy * wx * plane[(iy, ix)];
                            }
                        }
                        output[(b, ch, y, xo)] = acc;
                    }
                }
            }
        }
        let dt = self.dtype.unwrap_or(input.datum_type());
        Ok(tvec!(Tensor::from(output).cast_to_dt(dt).into_arc_tensor()))
    }

    fn substitute(&self, substitute: &OpId) -> Option<Box<dyn Op>> {
        let interpolator = Interpolator::for_op_name(substitute.as_str())?;
        Some(Box::new(Resize { interpolator, ..self.clone() }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn run(op: &Resize, shape: &[usize], data: &[f32]) -> Vec<f32> {
        let input = Tensor::from_shape(shape, data).unwrap().into_arc_tensor();
        op.eval(tvec!(input)).unwrap()[0].as_slice().unwrap().to_vec()
    }

    fn assert_close(found: &[f32], expected: &[f32]) {
        assert_eq!(found.len(), expected.len());
        for (f, e) in found.iter().zip(expected) {
            assert_abs_diff_eq!(*f, *e, epsilon = 1e-5);
        }
    }

    #[test]
    fn bilinear_half_pixel() {
        let op = Resize::new(Interpolator::Linear, [1, 4], false, false, None);
        assert_close(&run(&op, &[1, 1, 1, 2], &[0.0, 1.0]), &[0.0, 0.25, 0.75, 1.0]);
    }

    #[test]
    fn bilinear_align_corners() {
        let op = Resize::new(Interpolator::Linear, [1, 4], true, false, None);
        assert_close(&run(&op, &[1, 1, 1, 2], &[0.0, 3.0]), &[0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn nearest_doubles() {
        let op = Resize::new(Interpolator::Nearest, [2, 4], false, false, None);
        assert_close(
            &run(&op, &[1, 1, 1, 2], &[1.0, 2.0]),
            &[1.0, 1.0, 2.0, 2.0, 1.0, 1.0, 2.0, 2.0],
        );
    }

    #[test]
    fn bicubic_same_size_is_identity() {
        let op = Resize::new(Interpolator::Cubic, [2, 3], false, false, None);
        let data = [1.0, -2.0, 3.5, 0.0, 7.0, 2.0];
        assert_close(&run(&op, &[1, 1, 2, 3], &data), &data);
    }

    #[test]
    fn bicubic_preserves_constants() {
        let op = Resize::new(Interpolator::Cubic, [7, 5], false, false, None);
        assert_close(&run(&op, &[1, 2, 3, 2], &[4.0; 12]), &[4.0; 70]);
    }

    #[test]
    fn bicubic_overshoots_where_bilinear_does_not() {
        let data = [0.0, 0.0, 1.0, 1.0];
        let cubic = run(&Resize::new(Interpolator::Cubic, [1, 8], false, false, None), &[1, 1, 1, 4], &data);
        let linear =
            run(&Resize::new(Interpolator::Linear, [1, 8], false, false, None), &[1, 1, 1, 4], &data);
        assert!(cubic.iter().any(|&x| x < 0.0));
        assert!(linear.iter().all(|&x| (0.0..=1.0).contains(&x)));
    }

    #[test]
    fn antialiased_downsampling_is_rejected() {
        let op = Resize::new(Interpolator::Linear, [1, 1], false, true, None);
        let input = Tensor::zero(&[1, 1, 2, 2]).into_arc_tensor();
        assert!(op.eval(tvec!(input)).is_err());
    }

    #[test]
    fn output_dtype() {
        let op = Resize::new(Interpolator::Linear, [1, 1], false, false, Some(DatumType::F16));
        let input = Tensor::from_shape(&[1, 1, 1, 1], &[0.1]).unwrap().into_arc_tensor();
        let output = op.eval(tvec!(input)).unwrap();
        assert_eq!(output[0].datum_type(), DatumType::F16);
    }

    #[test]
    fn substitute_forwards_parameters() {
        let cubic = Resize::new(Interpolator::Cubic, [518, 518], true, true, Some(DatumType::F16));
        let linear = cubic.substitute(&"bilinear_resize".into()).unwrap();
        assert_eq!(linear.name(), "bilinear_resize");
        let linear = linear.downcast_ref::<Resize>().unwrap();
        assert_eq!(linear, &Resize { interpolator: Interpolator::Linear, ..cubic.clone() });
        assert!(cubic.substitute(&"grid_sample".into()).is_none());
    }
}
