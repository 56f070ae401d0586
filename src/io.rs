
//! Specialized binary input and output.
//! Uses the error handling for this crate.

pub use ::std::io::{Read, Write};
use half::slice::HalfFloatSliceExt;
use lebe::prelude::*;
use ::half::f16;
use crate::error::{Error, Result, UnitResult, IoResult};


/// Peek a single byte without consuming it.
#[derive(Debug)]
pub struct PeekRead<T> {

    /// Cannot be exposed as it will not contain peeked values anymore.
    inner: T,

    peeked: Option<u8>,
}

impl<T: Read> PeekRead<T> {

    #[inline]
    pub fn new(inner: T) -> Self {
        Self { inner, peeked: None }
    }

    /// Read a single byte and return that without consuming it.
    /// The next `read` call will include that byte.
    #[inline]
    pub fn peek_u8(&mut self) -> IoResult<u8> {
        match self.peeked {
            Some(peeked) => Ok(peeked),
            None => {
                let byte = u8::read_from_little_endian(&mut self.inner)?;
                self.peeked = Some(byte);
                Ok(byte)
            }
        }
    }

    /// Skip a single byte if it equals the specified value.
    /// Returns whether the value was found.
    #[inline]
    pub fn skip_if_eq(&mut self, value: u8) -> IoResult<bool> {
        let found = self.peek_u8()? == value;
        if found { self.peeked = None; }
        Ok(found)
    }
}

impl<T: Read> Read for PeekRead<T> {
    fn read(&mut self, target_buffer: &mut [u8]) -> IoResult<usize> {
        if target_buffer.is_empty() {
            return Ok(0)
        }

        match self.peeked.take() {
            None => self.inner.read(target_buffer),
            Some(peeked) => {
                target_buffer[0] = peeked;

                // indexing [1..] is safe because an empty buffer already returned ok
                Ok(1 + self.inner.read(&mut target_buffer[1..])?)
            }
        }
    }
}


/// Generic trait that defines common binary operations such as reading and writing for this type.
pub trait Data: Sized + Default + Clone {

    /// Number of bytes this would consume in an exr file.
    const BYTE_SIZE: usize = ::std::mem::size_of::<Self>();

    /// Read a value of type `Self`.
    fn read(read: &mut impl Read) -> Result<Self>;

    /// Read as many values of type `Self` as fit into the specified slice.
    /// If the slice cannot be filled completely, returns `Error::Invalid`.
    fn read_slice(read: &mut impl Read, slice: &mut[Self]) -> UnitResult;

    /// Write this value to the writer.
    fn write(self, write: &mut impl Write) -> UnitResult;

    /// Write all values of that slice to the writer.
    fn write_slice(write: &mut impl Write, slice: &[Self]) -> UnitResult;

    /// Read as many values of type `Self` as specified with `data_size`.
    ///
    /// This method will not allocate more memory than `soft_max` at once.
    /// If `hard_max` is specified, it will never read any more than that.
    /// Returns `Error::Invalid` if reader does not contain the desired number of elements.
    #[inline]
    fn read_vec(read: &mut impl Read, data_size: usize, soft_max: usize, hard_max: Option<usize>, purpose: &'static str) -> Result<Vec<Self>> {
        if let Some(max) = hard_max {
            if data_size > max {
                return Err(Error::invalid(purpose))
            }
        }

        let mut vec = Vec::with_capacity(data_size.min(soft_max));

        // do not allocate more than $soft_max memory at once,
        // as a corrupt size value must not exhaust memory before the read fails
        while vec.len() < data_size {
            let chunk_start = vec.len();
            let chunk_end = (chunk_start + soft_max).min(data_size);

            vec.resize(chunk_end, Self::default());
            Self::read_slice(read, &mut vec[chunk_start .. chunk_end])?;
        }

        Ok(vec)
    }
}


macro_rules! implement_data_for_primitive {
    ($kind: ident) => {
        impl Data for $kind {
            #[inline]
            fn read(read: &mut impl Read) -> Result<Self> {
                Ok(read.read_from_little_endian()?)
            }

            #[inline]
            fn write(self, write: &mut impl Write) -> Result<()> {
                write.write_as_little_endian(&self)?;
                Ok(())
            }

            #[inline]
            fn read_slice(read: &mut impl Read, slice: &mut [Self]) -> Result<()> {
                read.read_from_little_endian_into(slice)?;
                Ok(())
            }

            #[inline]
            fn write_slice(write: &mut impl Write, slice: &[Self]) -> Result<()> {
                write.write_as_little_endian(slice)?;
                Ok(())
            }
        }
    };
}

implement_data_for_primitive!(u8);
implement_data_for_primitive!(i8);
implement_data_for_primitive!(u32);
implement_data_for_primitive!(i32);
implement_data_for_primitive!(u64);
implement_data_for_primitive!(f32);
implement_data_for_primitive!(f64);


impl Data for f16 {
    #[inline]
    fn read(read: &mut impl Read) -> Result<Self> {
        u16::read_from_little_endian(read).map(f16::from_bits).map_err(Error::from)
    }

    #[inline]
    fn read_slice(read: &mut impl Read, slice: &mut [Self]) -> Result<()> {
        let bits: &mut [u16] = slice.reinterpret_cast_mut();
        read.read_from_little_endian_into(bits)?;
        Ok(())
    }

    #[inline]
    fn write(self, write: &mut impl Write) -> Result<()> {
        write.write_as_little_endian(&self.to_bits())?;
        Ok(())
    }

    #[inline]
    fn write_slice(write: &mut impl Write, slice: &[Self]) -> Result<()> {
        let bits: &[u16] = slice.reinterpret_cast();
        write.write_as_little_endian(bits)?;
        Ok(())
    }
}


#[cfg(test)]
mod test {
    use crate::io::{PeekRead, Data};
    use std::io::Read;
    use half::f16;

    #[test]
    fn peek(){
        use lebe::prelude::*;
        let buffer: &[u8] = &[0,1,2,3];
        let mut peek = PeekRead::new(buffer);

        assert_eq!(peek.peek_u8().unwrap(), 0);
        assert_eq!(peek.peek_u8().unwrap(), 0);
        assert_eq!(u8::read_from_little_endian(&mut peek).unwrap(), 0_u8);

        assert_eq!(peek.read(&mut [0,0]).unwrap(), 2);

        assert!(!peek.skip_if_eq(7).unwrap());
        assert!(peek.skip_if_eq(3).unwrap());

        assert!(peek.peek_u8().is_err());
        assert!(u8::read_from_little_endian(&mut peek).is_err());
    }

    #[test]
    fn half_floats_are_little_endian(){
        let mut bytes = Vec::new();
        f16::from_f32(1.0).write(&mut bytes).unwrap();
        assert_eq!(bytes, vec![0x00, 0x3c]);

        let values = [f16::from_f32(0.5), f16::from_f32(-2.0)];
        let mut bytes = Vec::new();
        f16::write_slice(&mut bytes, &values).unwrap();

        let mut decoded = [f16::ZERO; 2];
        f16::read_slice(&mut bytes.as_slice(), &mut decoded).unwrap();
        assert_eq!(decoded, values);
    }

    #[test]
    fn vec_size_limit(){
        let bytes: &[u8] = &[1, 2, 3, 4, 5];
        assert!(u8::read_vec(&mut &bytes[..], 5, 2, Some(4), "too large").is_err());
        assert_eq!(u8::read_vec(&mut &bytes[..], 5, 2, None, "too large").unwrap(), bytes);
    }
}
