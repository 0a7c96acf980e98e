use crate::internal::*;
use crate::ops;
use ndarray::prelude::*;

/// 2D convolution over NCHW data.
///
/// The kernel is laid out OIHW. Padding is symmetric, with zeros.
#[derive(Debug, Clone, new, PartialEq)]
pub struct Conv {
    pub kernel: Arc<Tensor>,
    pub bias: Option<Arc<Tensor>>,
    pub strides: [usize; 2],
    pub padding: [usize; 2],
}

impl Conv {
    pub fn output_channels(&self) -> usize {
        self.kernel.shape()[0]
    }

    pub fn kernel_spatial_shape(&self) -> [usize; 2] {
        [self.kernel.shape()[2], self.kernel.shape()[3]]
    }

    fn output_shape(&self, input: &[usize]) -> ConvoyResult<[usize; 4]> {
        if input.len() != 4 || self.kernel.rank() != 4 {
            bail!("Conv expects rank 4 input and kernel, got {:?} and {:?}", input, self.kernel.shape());
        }
        if input[1] != self.kernel.shape()[1] {
            bail!(
                "Conv input has {} channels, kernel expects {}",
                input[1],
                self.kernel.shape()[1]
            );
        }
        let mut spatial = [0; 2];
        for axis in 0..2 {
            let padded = input[2 + axis] + 2 * self.padding[axis];
            let k = self.kernel.shape()[2 + axis];
            if padded < k {
                bail!("Conv kernel {:?} larger than padded input {:?}", self.kernel.shape(), input);
            }
            spatial[axis] = (padded - k) / self.strides[axis] + 1;
        }
        Ok([input[0], self.output_channels(), spatial[0], spatial[1]])
    }
}

impl Op for Conv {
    fn name(&self) -> Cow<'_, str> {
        "conv".into()
    }

    fn info(&self) -> ConvoyResult<Vec<String>> {
        Ok(vec![
            format!("kernel: {:?}", self.kernel.shape()),
            format!("bias: {}", self.bias.is_some()),
            format!("strides: {:?} padding: {:?}", self.strides, self.padding),
        ])
    }

    fn same_as(&self, other: &dyn Op) -> bool {
        other.downcast_ref::<Self>().is_some_and(|other| other == self)
    }

    fn eval(&self, inputs: TVec<Arc<Tensor>>) -> ConvoyResult<TVec<Arc<Tensor>>> {
        ops::check_input_arity(&inputs, 1)?;
        let input = &inputs[0];
        let [n, co, oh, ow] = self.output_shape(input.shape())?;
        let (ci, ih, iw) = (input.shape()[1], input.shape()[2], input.shape()[3]);
        let [kh, kw] = self.kernel_spatial_shape();
        let x = input.to_array_view().into_dimensionality::<Ix4>()?;
        let k = self.kernel.to_array_view().into_dimensionality::<Ix4>()?;
        let bias = self.bias.as_ref().map(|b| b.as_slice()).transpose()?;
        if let Some(bias) = bias {
            ensure!(bias.len() == co, "Conv bias has {} values for {} channels", bias.len(), co);
        }
        let mut output = Array4::<f32>::zeros((n, co, oh, ow));
        for b in 0..n {
            for o in 0..co {
                let init = bias.map(|bias| bias[o]).unwrap_or(0.0);
                for y in 0..oh {
                    for xo in 0..ow {
                        let mut sum = init;
                        for c in 0..ci {
                            for ky in 0..kh {
                                let iy = (y * self.strides[0] + ky) as isize - self.padding[0] as isize;
                                if iy < 0 || iy >= ih as isize {
                                    continue;
                                }
                                for kx in 0..kw {
                                    let ix =
                                        (xo * self.strides[1] + kx) as isize - self.padding[1] as isize;
                                    if ix < 0 || ix >= iw as isize {
                                        continue;
                                    }
                                    sum += x[(b, c, iy as usize, ix as usize)] * k[(o, c, ky, kx)];
                                }
                            }
                        }
                        output[(b, o, y, xo)] = sum;
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

    fn t(shape: &[usize], data: &[f32]) -> Arc<Tensor> {
        Tensor::from_shape(shape, data).unwrap().into_arc_tensor()
    }

    #[test]
    fn one_by_one_is_channel_mix() {
        let conv = Conv::new(t(&[1, 2, 1, 1], &[1.0, 10.0]), Some(t(&[1], &[0.5])), [1, 1], [0, 0]);
        let input = t(&[1, 2, 1, 2], &[1.0, 2.0, 3.0, 4.0]);
        let output = conv.eval(tvec!(input)).unwrap();
        assert_eq!(output[0].shape(), &[1, 1, 1, 2]);
        assert_eq!(output[0].as_slice().unwrap(), &[31.5, 42.5]);
    }

    #[test]
    fn padded_box_filter() {
        let conv = Conv::new(Tensor::uniform(&[1, 1, 3, 3], 1.0).into_arc_tensor(), None, [1, 1], [1, 1]);
        let input = Tensor::uniform(&[1, 1, 3, 3], 1.0).into_arc_tensor();
        let output = conv.eval(tvec!(input)).unwrap();
        assert_eq!(
            output[0].as_slice().unwrap(),
            &[4.0, 6.0, 4.0, 6.0, 9.0, 6.0, 4.0, 6.0, 4.0]
        );
    }

    #[test]
    fn strided_patches() {
        let conv = Conv::new(Tensor::uniform(&[1, 1, 2, 2], 1.0).into_arc_tensor(), None, [2, 2], [0, 0]);
        let input = t(&[1, 1, 4, 4], &(0..16).map(|x| x as f32).collect::<Vec<_>>());
        let output = conv.eval(tvec!(input)).unwrap();
        assert_eq!(output[0].shape(), &[1, 1, 2, 2]);
        assert_eq!(output[0].as_slice().unwrap(), &[10.0, 18.0, 42.0, 50.0]);
    }

    #[test]
    fn channel_mismatch() {
        let conv = Conv::new(Tensor::zero(&[1, 2, 1, 1]).into_arc_tensor(), None, [1, 1], [0, 0]);
        assert!(conv.eval(tvec!(Tensor::zero(&[1, 3, 2, 2]).into_arc_tensor())).is_err());
    }
}
