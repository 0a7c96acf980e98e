use crate::internal::*;
use crate::ops;
use ndarray::prelude::*;

/// Bilinear sampling of NCHW data at normalized grid locations, with zero
/// padding outside the input.
///
/// The grid is N×H×W×2, holding (x, y) pairs in [-1, 1].
#[derive(Debug, Clone, new, PartialEq)]
pub struct GridSample {
    pub align_corners: bool,
}

impl GridSample {
    fn unnormalize(&self, coord: f32, size: usize) -> f32 {
        if self.align_corners {
            (coord + 1.0) / 2.0 * (size as f32 - 1.0)
        } else {
            ((coord + 1.0) * size as f32 - 1.0) / 2.0
        }
    }
}

impl Op for GridSample {
    fn name(&self) -> Cow<'_, str> {
        "grid_sample".into()
    }

    fn info(&self) -> ConvoyResult<Vec<String>> {
        Ok(vec![format!("align_corners: {}", self.align_corners)])
    }

    fn same_as(&self, other: &dyn Op) -> bool {
        other.downcast_ref::<Self>().is_some_and(|other| other == self)
    }

    fn eval(&self, inputs: TVec<Arc<Tensor>>) -> ConvoyResult<TVec<Arc<Tensor>>> {
        ops::check_input_arity(&inputs, 2)?;
        let (input, grid) = (&inputs[0], &inputs[1]);
        let x = input.to_array_view().into_dimensionality::<Ix4>()?;
        let g = grid.to_array_view().into_dimensionality::<Ix4>()?;
        let (n, c, ih, iw) = x.dim();
        let (gn, oh, ow, two) = g.dim();
        ensure!(gn == n && two == 2, "Grid of shape {:?} does not fit input {:?}", grid.shape(), input.shape());
        let mut output = Array4::<f32>::zeros((n, c, oh, ow));
        let fetch = |b: usize, ch: usize, y: isize, xx: isize| -> f32 {
            if y < 0 || xx < 0 || y >= ih as isize || xx >= iw as isize {
                0.0
            } else {
                x[(b, ch, y as usize, xx as usize)]
            }
        };
        for b in 0..n {
            for y in 0..oh {
                for xo in 0..ow {
                    let sx = self.unnormalize(g[(b, y, xo, 0)], iw);
                    let sy = self.unnormalize(g[(b, y, xo, 1)], ih);
                    let (x0, y0) = (sx.floor(), sy.floor());
                    let (fx, fy) = (sx - x0, sy - y0);
                    let (x0, y0) = (x0 as isize, y0 as isize);
                    for ch in 0..c {
                        let top = (1.0 - fx) * fetch(b, ch, y0, x0) + fx * fetch(b, ch, y0, x0 + 1);
                        let bottom =
                            (1.0 - fx) * fetch(b, ch, y0 + 1, x0) + fx * fetch(b, ch, y0 + 1, x0 + 1);
                        output[(b, ch, y, xo)] = (1.0 - fy) * top + fy * bottom;
                    }
                }
            }
        }
        Ok(tvec!(Tensor::from(output).cast_to_dt(input.datum_type()).into_arc_tensor()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corners_with_align_corners() {
        let input = Tensor::from_shape(&[1, 1, 2, 2], &[1.0, 2.0, 3.0, 4.0]).unwrap();
        let grid = Tensor::from_shape(&[1, 1, 3, 2], &[-1.0, -1.0, 1.0, 1.0, 0.0, 0.0]).unwrap();
        let output =
            GridSample::new(true).eval(tvec!(input.into_arc_tensor(), grid.into_arc_tensor())).unwrap();
        assert_eq!(output[0].as_slice().unwrap(), &[1.0, 4.0, 2.5]);
    }

    #[test]
    fn outside_is_zero() {
        let input = Tensor::uniform(&[1, 1, 2, 2], 1.0);
        let grid = Tensor::from_shape(&[1, 1, 1, 2], &[5.0, 5.0]).unwrap();
        let output =
            GridSample::new(false).eval(tvec!(input.into_arc_tensor(), grid.into_arc_tensor())).unwrap();
        assert_eq!(output[0].as_slice().unwrap(), &[0.0]);
    }
}
