
//! Describes all meta data possible in an exr file.
//! Contains functionality to read and write the meta data of single-part scan line files.

pub mod attribute;
pub mod header;


use crate::io::*;
use crate::error::*;
use self::header::Header;


/// Contains the complete meta data of a single-part exr file.
#[derive(Debug, Clone, PartialEq)]
pub struct MetaData {

    /// Some flags summarizing the features that must be supported to decode the file.
    pub requirements: Requirements,

    /// The header of the single part in this file.
    pub header: Header,
}

/// The offset table is an ordered list of indices referencing pixel data in the exr file.
/// For each block of scan lines, an index exists, which points to the byte-location
/// of the corresponding pixel data in the file. The indices are ordered by increasing y coordinate,
/// regardless of the line order of the file.
pub type OffsetTable = Vec<u64>;


/// A summary of requirements that must be met to read this exr file.
/// Used to determine whether this file can be read by a given reader.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Hash)]
pub struct Requirements {

    /// This library supports reading version 1 and 2, and writing version 2.
    pub file_format_version: u8,

    /// If true, this image has tiled blocks and contains only a single layer.
    /// If false and not deep and not multilayer, this image is a single layer image with scan line blocks.
    pub is_single_layer_and_tiled: bool,

    /// Whether this file has strings with a length greater than 31.
    /// Strings can never be longer than 255.
    pub has_long_names: bool,

    /// This image contains at least one layer with deep data.
    pub has_deep_data: bool,

    /// Whether this file contains multiple layers.
    pub has_multiple_layers: bool,
}


/// The first four bytes of each exr file.
/// Used to abort reading non-exr files.
pub mod magic_number {
    use super::*;

    /// The first four bytes of each exr file.
    pub const BYTES: [u8; 4] = [0x76, 0x2f, 0x31, 0x01];

    /// Without validation, write this instance to the byte stream.
    pub fn write(write: &mut impl Write) -> Result<()> {
        u8::write_slice(write, &self::BYTES)
    }

    /// Consumes four bytes from the reader and returns whether the file may be an exr file.
    pub fn is_exr(read: &mut impl Read) -> Result<bool> {
        let mut magic_num = [0; 4];
        u8::read_slice(read, &mut magic_num)?;
        Ok(magic_num == self::BYTES)
    }

    /// Validate this image. If it is an exr file, return `Ok(())`.
    pub fn validate_exr(read: &mut impl Read) -> UnitResult {
        if self::is_exr(read)? {
            Ok(())

        } else {
            Err(Error::invalid("file identifier missing"))
        }
    }
}

/// A `0_u8` at the end of a sequence.
pub mod sequence_end {
    use super::*;

    /// Number of bytes this would consume in an exr file.
    pub fn byte_size() -> usize {
        1
    }

    /// Without validation, write this instance to the byte stream.
    pub fn write<W: Write>(write: &mut W) -> UnitResult {
        0_u8.write(write)
    }

    /// Peeks the next byte. If it is zero, consumes the byte and returns true.
    pub fn has_come(read: &mut PeekRead<impl Read>) -> Result<bool> {
        Ok(read.skip_if_eq(0)?)
    }
}


impl MetaData {

    /// Read the magic number, the version flags, and the header.
    /// Does not read the offset table.
    pub fn read_from_buffered_peekable(read: &mut PeekRead<impl Read>) -> Result<Self> {
        magic_number::validate_exr(read)?;
        let requirements = Requirements::read(read)?;
        requirements.validate()?;

        let header = Header::read(read, &requirements)?;
        Ok(MetaData { requirements, header })
    }

    /// Write the magic number, the version flags, and the header.
    /// Validates the header before writing anything.
    pub fn write_validating(header: &Header, write: &mut impl Write) -> Result<Requirements> {
        header.validate()?;

        let requirements = Requirements::infer(header);
        magic_number::write(write)?;
        requirements.write(write)?;
        header.write(write)?;

        Ok(requirements)
    }
}


impl Requirements {

    /// Infer version requirements for writing a single scan line header.
    pub fn infer(header: &Header) -> Self {
        Requirements {
            file_format_version: 2,
            is_single_layer_and_tiled: false,
            has_long_names: header.has_long_names(),
            has_multiple_layers: false,
            has_deep_data: false,
        }
    }

    /// Whether the pixels of this file are stored as scan lines in a single part,
    /// which is the only layout this library can decode.
    pub fn is_flat_single_part_scan_lines(&self) -> bool {
        !self.is_single_layer_and_tiled && !self.has_deep_data && !self.has_multiple_layers
    }

    /// Read the value without validating.
    pub fn read<R: Read>(read: &mut R) -> Result<Self> {
        use ::bit_field::BitField;

        let version_and_flags = u32::read(read)?;

        // the 8 least significant bits contain the file format version number
        let version = (version_and_flags & 0x00FF) as u8;

        // the 24 most significant bits are treated as a set of boolean flags
        let is_single_tile = version_and_flags.get_bit(9);
        let has_long_names = version_and_flags.get_bit(10);
        let has_deep_data = version_and_flags.get_bit(11);
        let has_multiple_layers = version_and_flags.get_bit(12);

        // all remaining bits except 9, 10, 11 and 12 are reserved and should be 0
        // if a file has any of these bits set to 1, it means this file contains
        // a feature that we don't support
        let unknown_flags = version_and_flags >> 13; // all flags excluding the 12 bits we already parsed

        if unknown_flags != 0 {
            return Err(Error::unsupported("too new file feature flags"));
        }

        Ok(Requirements {
            file_format_version: version,
            is_single_layer_and_tiled: is_single_tile, has_long_names,
            has_deep_data, has_multiple_layers,
        })
    }

    /// Without validation, write this instance to the byte stream.
    pub fn write<W: Write>(self, write: &mut W) -> UnitResult {
        use ::bit_field::BitField;

        // the 8 least significant bits contain the file format version number
        // and the flags are set to 0
        let mut version_and_flags = u32::from(self.file_format_version);

        // the 24 most significant bits are treated as a set of boolean flags
        version_and_flags.set_bit(9, self.is_single_layer_and_tiled);
        version_and_flags.set_bit(10, self.has_long_names);
        version_and_flags.set_bit(11, self.has_deep_data);
        version_and_flags.set_bit(12, self.has_multiple_layers);
        // all remaining bits except 9, 10, 11 and 12 are reserved and should be 0

        version_and_flags.write(write)?;
        Ok(())
    }

    /// Validate this instance.
    pub fn validate(&self) -> UnitResult {
        if let 1..=2 = self.file_format_version {
            match (self.is_single_layer_and_tiled, self.has_deep_data, self.has_multiple_layers) {
                (true, true, _) => Err(Error::invalid("file feature flags")),
                (true, _, true) => Err(Error::invalid("file feature flags")),
                _ => Ok(()),
            }
        }
        else {
            Err(Error::unsupported("file versions other than 2.0 are not supported"))
        }
    }
}


/// The error returned when a header lacks a required attribute.
pub(crate) fn missing_attribute(name: &'static str) -> Error {
    Error::invalid(format!("missing or invalid {} attribute", name))
}

/// Read one offset for each block, without validating the offsets.
pub fn read_offset_table(read: &mut impl Read, block_count: usize) -> Result<OffsetTable> {
    u64::read_vec(read, block_count, u16::MAX as usize, None, "offset table size")
}

/// Write one offset for each block.
pub fn write_offset_table(write: &mut impl Write, offsets: &[u64]) -> UnitResult {
    u64::write_slice(write, offsets)
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trip_requirements(){
        let requirements = Requirements {
            file_format_version: 2,
            is_single_layer_and_tiled: true,
            has_long_names: false,
            has_deep_data: false,
            has_multiple_layers: false,
        };

        let mut data: Vec<u8> = Vec::new();
        requirements.write(&mut data).unwrap();
        assert_eq!(data, vec![2, 2, 0, 0]);

        let read = Requirements::read(&mut data.as_slice()).unwrap();
        assert_eq!(requirements, read);
        assert!(!read.is_flat_single_part_scan_lines());
    }

    #[test]
    fn version_uses_the_whole_low_byte(){
        let data: Vec<u8> = vec![0x12, 0, 0, 0];
        let read = Requirements::read(&mut data.as_slice()).unwrap();
        assert_eq!(read.file_format_version, 0x12);
        assert!(read.validate().is_err());
    }

    #[test]
    fn unknown_flags_are_unsupported(){
        let data: Vec<u8> = vec![2, 0, 0, 1];
        assert!(matches!(Requirements::read(&mut data.as_slice()), Err(Error::NotSupported(_))));
    }

    #[test]
    fn magic_number(){
        let mut data = Vec::new();
        magic_number::write(&mut data).unwrap();
        assert!(magic_number::validate_exr(&mut data.as_slice()).is_ok());
        assert!(magic_number::validate_exr(&mut [0_u8, 1, 2, 3].as_ref()).is_err());
    }
}
