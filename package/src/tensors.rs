//! NNEF binary tensor files (`.dat`).
use std::io::{Read, Write};

use byteorder::{LE, ReadBytesExt, WriteBytesExt};
use half::f16;

use crate::internal::*;

const MAGIC: [u8; 2] = [0x4E, 0xEF];
const HEADER_LEN: usize = 128;
const MAX_RANK: usize = 8;
const FLOAT_ITEM_TYPE: u16 = 0;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Header {
    version: [u8; 2],
    data_size_bytes: u32,
    rank: u32,
    dims: [u32; MAX_RANK],
    bits_per_item: u32,
    item_type: u16,
    item_type_vendor: u16,
}

impl Header {
    fn for_tensor(tensor: &Tensor) -> ConvoyResult<Header> {
        ensure!(tensor.rank() <= MAX_RANK, "Can not store tensors of rank {}", tensor.rank());
        let mut dims = [0u32; MAX_RANK];
        for (d, s) in dims.iter_mut().zip(tensor.shape()) {
            *d = u32::try_from(*s).context("Tensor dimension overflows")?;
        }
        let bits_per_item = 8 * tensor.datum_type().size_of() as u32;
        Ok(Header {
            version: [1, 0],
            data_size_bytes: u32::try_from(tensor.len() * tensor.datum_type().size_of())
                .context("Tensor too big")?,
            rank: tensor.rank() as u32,
            dims,
            bits_per_item,
            item_type: FLOAT_ITEM_TYPE,
            item_type_vendor: 0,
        })
    }

    fn write(&self, w: &mut impl Write) -> ConvoyResult<()> {
        w.write_all(&MAGIC)?;
        w.write_all(&self.version)?;
        w.write_u32::<LE>(self.data_size_bytes)?;
        w.write_u32::<LE>(self.rank)?;
        for d in self.dims {
            w.write_u32::<LE>(d)?;
        }
        w.write_u32::<LE>(self.bits_per_item)?;
        w.write_u16::<LE>(self.item_type)?;
        w.write_u16::<LE>(self.item_type_vendor)?;
        // deprecated item type parameters, then padding
        w.write_all(&[0u8; HEADER_LEN - 52])?;
        Ok(())
    }

    fn read(r: &mut impl Read) -> ConvoyResult<Header> {
        let mut magic = [0u8; 2];
        r.read_exact(&mut magic)?;
        ensure!(magic == MAGIC, "Wrong magic number for a tensor file: {:02x?}", magic);
        let mut version = [0u8; 2];
        r.read_exact(&mut version)?;
        let data_size_bytes = r.read_u32::<LE>()?;
        let rank = r.read_u32::<LE>()?;
        let mut dims = [0u32; MAX_RANK];
        for d in &mut dims {
            *d = r.read_u32::<LE>()?;
        }
        let bits_per_item = r.read_u32::<LE>()?;
        let item_type = r.read_u16::<LE>()?;
        let item_type_vendor = r.read_u16::<LE>()?;
        let mut rest = [0u8; HEADER_LEN - 52];
        r.read_exact(&mut rest)?;
        ensure!(rank as usize <= MAX_RANK, "Invalid rank {rank} in tensor header");
        Ok(Header { version, data_size_bytes, rank, dims, bits_per_item, item_type, item_type_vendor })
    }

    fn datum_type(&self) -> ConvoyResult<DatumType> {
        match (self.item_type, self.item_type_vendor, self.bits_per_item) {
            (FLOAT_ITEM_TYPE, 0, 32) => Ok(DatumType::F32),
            (FLOAT_ITEM_TYPE, 0, 16) => Ok(DatumType::F16),
            (t, v, bits) => bail!("Unsupported tensor item type {t} (vendor {v}) on {bits} bits"),
        }
    }

    fn shape(&self) -> TVec<usize> {
        self.dims[..self.rank as usize].iter().map(|&d| d as usize).collect()
    }
}

/// Writes `tensor` in NNEF binary format, little endian.
pub fn write_tensor(w: &mut impl Write, tensor: &Tensor) -> ConvoyResult<()> {
    Header::for_tensor(tensor)?.write(w)?;
    let values = tensor.as_slice()?;
    match tensor.datum_type() {
        DatumType::F32 => {
            for &v in values {
                w.write_f32::<LE>(v)?;
            }
        }
        DatumType::F16 => {
            for &v in values {
                w.write_u16::<LE>(f16::from_f32(v).to_bits())?;
            }
        }
    }
    Ok(())
}

pub fn read_tensor(r: &mut impl Read) -> ConvoyResult<Tensor> {
    let header = Header::read(r)?;
    let dt = header.datum_type()?;
    let shape = header.shape();
    let len = shape.iter().product::<usize>();
    ensure!(
        header.data_size_bytes as usize == len * dt.size_of(),
        "Tensor header announces {} bytes for {:?} {:?}",
        header.data_size_bytes,
        shape,
        dt
    );
    let mut values = Vec::with_capacity(len);
    for _ in 0..len {
        values.push(match dt {
            DatumType::F32 => r.read_f32::<LE>()?,
            DatumType::F16 => f16::from_bits(r.read_u16::<LE>()?).to_f32(),
        });
    }
    Ok(Tensor::from_shape(&shape, &values)?.cast_to_dt(dt))
}
