
//! Contains the compression attribute definition
//! and methods to compress and decompress data.

// private modules make non-breaking changes easier
mod zip;
mod rle;

use crate::error::{Result, Error};


/// A byte vector.
pub type ByteVec = Vec<u8>;

/// A byte slice.
pub type Bytes<'s> = &'s [u8];

/// Specifies which compression method to use.
/// Use uncompressed data for fastest loading and writing speeds.
/// Use RLE compression for fast loading and writing with slight memory savings.
/// Use ZIP compression for slow processing with large memory savings.
///
/// Only `Uncompressed`, `RLE`, `ZIP1` and `ZIP16` pixel data can be read and written.
/// The other methods are recognized in headers, but their pixels are rejected as not supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Compression {

    /// Store uncompressed values.
    /// Produces large files that can be read and written very quickly.
    Uncompressed,

    /// Produces slightly smaller files
    /// that can still be read and written rather quickly.
    /// Works best for images with large flat areas, such as masks and abstract graphics.
    /// This compression method is lossless.
    RLE,

    /// Uses ZIP compression to compress each line. Slowly produces small images
    /// which can be read with moderate speed. This compression method is lossless.
    ZIP1,

    /// Uses ZIP compression to compress blocks of 16 lines. Slowly produces small images
    /// which can be read with moderate speed. This compression method is lossless.
    ZIP16,

    /// Wavelet compression in blocks of 32 lines. Lossless.
    PIZ,

    /// Like `ZIP16`, but reduces precision of `f32` samples to 24 bits.
    PXR24,

    /// Lossy 4-by-4 pixel block compression for `f16` samples.
    B44,

    /// Like `B44`, but compresses uniformly colored areas even more.
    B44A,

    /// Lossy DCT based compression, in blocks of 32 scan lines.
    DWAA,

    /// Lossy DCT based compression, in blocks of 256 scan lines.
    DWAB,
}

impl std::fmt::Display for Compression {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{} compression", match self {
            Compression::Uncompressed => "no",
            Compression::RLE => "rle",
            Compression::ZIP1 => "zip line",
            Compression::ZIP16 => "zip block",
            Compression::PIZ => "piz",
            Compression::PXR24 => "pxr24",
            Compression::B44 => "b44",
            Compression::B44A => "b44a",
            Compression::DWAA => "dwaa",
            Compression::DWAB => "dwab",
        })
    }
}

impl Compression {

    /// For scan line images, the number of scan lines that are compressed together in one block.
    pub fn scan_lines_per_block(self) -> usize {
        use self::Compression::*;
        match self {
            Uncompressed | RLE | ZIP1 => 1,
            ZIP16 | PXR24 => 16,
            PIZ | B44 | B44A | DWAA => 32,
            DWAB => 256,
        }
    }

    /// Whether pixel data with this compression can be read and written.
    pub fn is_supported(self) -> bool {
        matches!(self, Compression::Uncompressed | Compression::RLE | Compression::ZIP1 | Compression::ZIP16)
    }

    /// Return an error if pixel data with this compression cannot be read and written.
    pub fn validate_supported(self) -> Result<()> {
        if self.is_supported() { Ok(()) }
        else { Err(Error::unsupported(format!("{}", self))) }
    }

    /// Compress the little-endian bytes of one block.
    /// If compression does not make the data smaller,
    /// the uncompressed bytes are returned, as required by the file format.
    pub fn compress_block(self, uncompressed: ByteVec) -> Result<ByteVec> {
        if uncompressed.is_empty() {
            return Ok(uncompressed);
        }

        let compressed = match self {
            Compression::Uncompressed => return Ok(uncompressed),
            Compression::RLE => rle::compress_bytes(&uncompressed)?,
            Compression::ZIP1 | Compression::ZIP16 => zip::compress_bytes(&uncompressed)?,
            other => return Err(Error::unsupported(format!("{}", other))),
        };

        if compressed.len() < uncompressed.len() { Ok(compressed) }
        else { Ok(uncompressed) }
    }

    /// Decompress the bytes of one block into `expected_byte_size` little-endian bytes.
    /// Data with exactly the expected size is considered to be stored uncompressed.
    pub fn decompress_block(self, compressed: Bytes<'_>, expected_byte_size: usize) -> Result<ByteVec> {
        if compressed.len() == expected_byte_size {
            return Ok(compressed.to_vec());
        }

        let decompressed = match self {
            Compression::Uncompressed => return Err(Error::invalid("uncompressed block size")),
            Compression::RLE => rle::decompress_bytes(compressed, expected_byte_size)?,
            Compression::ZIP1 | Compression::ZIP16 => zip::decompress_bytes(compressed, expected_byte_size)?,
            other => return Err(Error::unsupported(format!("{}", other))),
        };

        if decompressed.len() != expected_byte_size {
            return Err(Error::invalid("decompressed block size"));
        }

        Ok(decompressed)
    }
}


/// Reorders bytes and integrates or derives values,
/// so that similar bytes are closer to each other, which helps general purpose compression.
mod optimize_bytes {

    /// Integrate over all differences to the previous value in order to reconstruct sample values.
    pub fn differences_to_samples(buffer: &mut [u8]) {
        for index in 1..buffer.len() {
            buffer[index] = (i32::from(buffer[index - 1]) + i32::from(buffer[index]) - 128) as u8;
        }
    }

    /// Derive over all values in order to produce differences to the previous value.
    pub fn samples_to_differences(buffer: &mut [u8]) {
        for index in (1..buffer.len()).rev() {
            buffer[index] = (i32::from(buffer[index]) - i32::from(buffer[index - 1]) + 128) as u8;
        }
    }

    /// Interleave the bytes such that the second half of the array is every other byte.
    pub fn interleave_byte_blocks(separated: &mut [u8]) {
        let (first_half, second_half) = separated.split_at((separated.len() + 1) / 2);

        let mut interleaved = Vec::with_capacity(separated.len());
        for index in 0 .. first_half.len() {
            interleaved.push(first_half[index]);

            if let Some(&second) = second_half.get(index) {
                interleaved.push(second);
            }
        }

        separated.copy_from_slice(&interleaved)
    }

    /// Separate the bytes such that the second half contains every other byte.
    pub fn separate_bytes_fragments(source: &mut [u8]) {
        let even = source.iter().step_by(2);
        let odd = source.iter().skip(1).step_by(2);
        let separated: Vec<u8> = even.chain(odd).copied().collect();
        source.copy_from_slice(&separated)
    }


}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn incompressible_data_is_stored_raw(){
        let noise: Vec<u8> = (0 .. 64_u32).map(|index| (index.wrapping_mul(2654435761) >> 13) as u8).collect();

        for &compression in &[Compression::RLE, Compression::ZIP1] {
            let stored = compression.compress_block(noise.clone()).unwrap();
            if stored.len() == noise.len() { assert_eq!(stored, noise); }

            let restored = compression.decompress_block(&stored, noise.len()).unwrap();
            assert_eq!(restored, noise);
        }
    }

    #[test]
    fn flat_data_shrinks(){
        let flat = vec![ 7_u8; 4096 ];

        for &compression in &[Compression::RLE, Compression::ZIP1, Compression::ZIP16] {
            let stored = compression.compress_block(flat.clone()).unwrap();
            assert!(stored.len() < flat.len(), "{} did not compress", compression);
            assert_eq!(compression.decompress_block(&stored, flat.len()).unwrap(), flat);
        }
    }

    #[test]
    fn unsupported_methods(){
        assert!(Compression::PIZ.compress_block(vec![1, 2, 3]).is_err());
        assert!(matches!(Compression::B44.validate_supported(), Err(Error::NotSupported(_))));
        assert_eq!(Compression::DWAB.scan_lines_per_block(), 256);
        assert_eq!(Compression::ZIP1.scan_lines_per_block(), 1);
    }

    #[test]
    fn wrong_sizes_are_invalid(){
        let stored = Compression::ZIP16.compress_block(vec![0_u8; 1024]).unwrap();
        assert!(Compression::ZIP16.decompress_block(&stored, 1000).is_err());
        assert!(Compression::Uncompressed.decompress_block(&[1, 2, 3], 4).is_err());
    }
}
