
//! The compressed pixels of a block, as they are stored in a file.
//! A chunk starts with the first scan line of the block and the byte size of the data.

use crate::compression::ByteVec;
use crate::error::{i32_to_usize, usize_to_i32, Error, Result, UnitResult};
use crate::io::Data;
use crate::stream::{InputStream, OutputStream};


/// A compressed block of scan lines, as stored in a scan line file.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Chunk {

    /// The first scan line of the block. May be negative.
    pub y_coordinate: i32,

    /// The compressed bytes of the block, or the uncompressed bytes
    /// if compression would not have made them smaller.
    pub compressed_pixels: ByteVec,
}

/// The fields that precede the pixel bytes of a chunk.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ChunkHeader {

    /// The first scan line of the block.
    pub y_coordinate: i32,

    /// Number of compressed bytes that follow.
    pub byte_size: usize,
}

impl ChunkHeader {

    /// Number of bytes of the y coordinate and the size.
    pub const BYTE_SIZE: usize = 2 * i32::BYTE_SIZE;

    /// Read the coordinate and the size at the current stream position.
    /// Fails if the size exceeds the maximum.
    pub fn read(stream: &mut impl InputStream, max_byte_size: usize) -> Result<Self> {
        let mut bytes = [0_u8; Self::BYTE_SIZE];
        stream.read(&mut bytes)?;

        let reader = &mut &bytes[..];
        let y_coordinate = i32::read(reader)?;
        let byte_size = i32_to_usize(i32::read(reader)?, "chunk byte size")?;

        if byte_size > max_byte_size {
            return Err(Error::invalid(format!(
                "chunk at scan line {} has {} bytes, but at most {} are allowed",
                y_coordinate, byte_size, max_byte_size
            )));
        }

        Ok(ChunkHeader { y_coordinate, byte_size })
    }

    fn to_bytes(self) -> Result<[u8; Self::BYTE_SIZE]> {
        let mut bytes = [0_u8; Self::BYTE_SIZE];

        {
            let writer = &mut &mut bytes[..];
            self.y_coordinate.write(writer)?;
            usize_to_i32(self.byte_size, "chunk byte size")?.write(writer)?;
        }

        Ok(bytes)
    }
}

impl Chunk {

    /// Read a chunk at the current stream position, copying its bytes.
    pub fn read(stream: &mut impl InputStream, max_byte_size: usize) -> Result<Self> {
        let header = ChunkHeader::read(stream, max_byte_size)?;

        let mut compressed_pixels = vec![0_u8; header.byte_size];
        stream.read(&mut compressed_pixels)?;

        Ok(Chunk { y_coordinate: header.y_coordinate, compressed_pixels })
    }

    /// Write the chunk at the current stream position.
    pub fn write(&self, stream: &mut impl OutputStream) -> UnitResult {
        let header = ChunkHeader {
            y_coordinate: self.y_coordinate,
            byte_size: self.compressed_pixels.len(),
        };

        stream.write(&header.to_bytes()?)?;
        stream.write(&self.compressed_pixels)
    }
}


#[cfg(test)]
mod test {
    use super::*;
    use crate::stream::{MemoryInputStream, MemoryOutputStream};

    #[test]
    fn layout(){
        let mut output = MemoryOutputStream::new();
        Chunk { y_coordinate: -2, compressed_pixels: vec![9, 8, 7] }.write(&mut output).unwrap();

        assert_eq!(output.bytes(), &[0xfe, 0xff, 0xff, 0xff, 3, 0, 0, 0, 9, 8, 7]);

        let mut input = MemoryInputStream::new("chunk", output.bytes());
        let chunk = Chunk::read(&mut input, 3).unwrap();
        assert_eq!(chunk.y_coordinate, -2);
        assert_eq!(chunk.compressed_pixels, vec![9, 8, 7]);
    }

    #[test]
    fn size_limits(){
        let bytes = [0, 0, 0, 0, 200, 0, 0, 0];
        assert!(Chunk::read(&mut MemoryInputStream::new("large", &bytes), 100).is_err());

        let negative = [0, 0, 0, 0, 0xff, 0xff, 0xff, 0xff];
        assert!(ChunkHeader::read(&mut MemoryInputStream::new("negative", &negative), 100).is_err());

        let truncated = [0, 0, 0, 0, 4, 0, 0, 0, 1, 2];
        assert!(Chunk::read(&mut MemoryInputStream::new("truncated", &truncated), 100).is_err());
    }
}
