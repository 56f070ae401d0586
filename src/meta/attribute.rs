
//! Contains all meta data attributes.
//! Each header can have any number of attributes, including custom attributes.

use smallvec::SmallVec;
use half::f16;
use std::convert::TryFrom;
use std::borrow::Borrow;
use crate::io::*;
use crate::math::*;
use crate::error::*;
use crate::meta::sequence_end;

pub use crate::compression::Compression;


/// Contains one of all possible attributes.
/// Includes a variant for custom attributes.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {

    /// Channel meta data.
    ChannelList(ChannelList),

    /// Compression method of this header.
    Compression(Compression),

    /// This image is an environment map.
    EnvironmentMap(EnvironmentMap),

    /// Order of the blocks in the file.
    LineOrder(LineOrder),

    /// List of texts.
    TextVector(Vec<Text>),

    /// A string of byte-chars.
    Text(Text),

    /// 64-bit float
    F64(f64),

    /// 32-bit float
    F32(f32),

    /// 32-bit signed integer
    I32(i32),

    /// 2D integer rectangle.
    IntegerBounds(IntegerBounds),

    /// 2D integer vector.
    IntVec2(Vec2<i32>),

    /// 2D float vector.
    FloatVec2(Vec2<f32>),

    /// A custom attribute.
    /// Contains the type name of this value.
    Custom {

        /// The name of the type this attribute is an instance of.
        kind: Text,

        /// The value, stored in little-endian byte order, of the value.
        /// Use the `exr_bridge::io::Data` trait to extract binary values from this vector.
        bytes: Vec<u8>
    },
}

/// A byte array with each byte being a char.
/// This is not UTF an must be constructed from a standard string.
#[derive(Clone, PartialEq, Eq, Ord, PartialOrd, Default, Hash)]
pub struct Text {
    bytes: TextBytes,
}

/// The raw bytes that make up a string in an exr file.
pub type TextBytes = SmallVec<[u8; 24]>;

/// A rectangular section anywhere in 2D integer space.
/// Valid from minimum coordinate (including) `-1,073,741,822`
/// to maximum coordinate (including) `1,073,741,822`, the value of (`i32::MAX/2 -1`).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Default, Hash)]
pub struct IntegerBounds {

    /// The top left corner of this rectangle.
    /// The rectangle includes this pixel if the size is not zero.
    pub position: Vec2<i32>,

    /// How many pixels to include in this rectangle.
    /// Extends to the right and downwards.
    /// Does not include the actual boundary, just like `Vec::len()`.
    pub size: Vec2<usize>,
}

/// The type of samples in a channel.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum SampleType {

    /// This channel contains 32-bit unsigned int values.
    U32,

    /// This channel contains 16-bit float values.
    F16,

    /// This channel contains 32-bit float values.
    F32,
}

/// Describes the samples of a single channel.
/// Does not contain the actual pixel data, and not the channel name.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct Channel {

    /// U32, F16 or F32.
    pub sample_type: SampleType,

    /// How many of the samples are skipped compared to the other channels in this header.
    /// Can be used for chroma subsampling. `(1, 1)` stores every pixel.
    pub sampling: Vec2<usize>,

    /// This attribute only tells lossy compression methods
    /// whether this value should be quantized exponentially or linearly.
    /// Never affects how the samples are laid out.
    pub quantize_linearly: bool,
}

/// A list of named channels, sorted alphabetically by name,
/// as stored in an exr file.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Default)]
pub struct ChannelList {

    /// The channels in this list, sorted by name.
    pub list: SmallVec<[(Text, Channel); 5]>,
}

/// In what order the scan lines of a file are stored.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum LineOrder {

    /// The first scan line is the top-most line of the data window.
    Increasing,

    /// The first scan line is the bottom-most line of the data window.
    Decreasing,

    /// The blocks are stored in any order.
    /// Not allowed when writing scan line files.
    Unspecified,
}

/// The kind of environment map an image represents.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum EnvironmentMap {

    /// This image is an environment map projected like a world map.
    LatitudeLongitude,

    /// This image contains the six sides of a cube.
    Cube,
}


/// Contains string literals identifying the type of an attribute.
pub mod type_names {
    macro_rules! define_attribute_type_names {
        ( $($name: ident : $value: expr),* ) => {
            $(
                /// The byte-string name of this attribute type as it appears in an exr file.
                pub const $name: &'static [u8] = $value;
            )*
        };
    }

    define_attribute_type_names! {
        I32BOX2:        b"box2i",
        I32:            b"int",
        F32:            b"float",
        F64:            b"double",
        I32VEC2:        b"v2i",
        F32VEC2:        b"v2f",
        CHANNEL_LIST:   b"chlist",
        COMPRESSION:    b"compression",
        ENVIRONMENT_MAP:b"envmap",
        LINE_ORDER:     b"lineOrder",
        TEXT:           b"string",
        TEXT_VECTOR:    b"stringvector"
    }
}


fn invalid_type() -> Error {
    Error::invalid("attribute type mismatch")
}


impl Text {

    /// Create a `Text` from an `str` reference.
    /// Returns `None` if this string contains unsupported chars.
    pub fn new_or_none(string: impl AsRef<str>) -> Option<Self> {
        let vec : Option<TextBytes> = string.as_ref().chars()
            .map(|character| u8::try_from(character as u64).ok())
            .collect();

        vec.map(Self::from_bytes_unchecked)
    }

    /// Create a `Text` from an `str` reference.
    /// Fails if this string contains chars above `U+00FF`.
    pub fn new(string: impl AsRef<str>) -> Result<Self> {
        let string = string.as_ref();

        Self::new_or_none(string).ok_or_else(|| Error::invalid(format!(
            "`{}` contains characters that cannot be stored as a name", string
        )))
    }

    /// Create a `Text` from the specified bytes object,
    /// without checking any of the bytes.
    pub fn from_bytes_unchecked(bytes: TextBytes) -> Self {
        Text { bytes }
    }

    /// The underlying bytes that represent this text.
    pub fn bytes(&self) -> &[u8] {
        self.bytes.as_slice()
    }

    /// Whether this text is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Iterate over the individual chars in this text, similar to `String::chars()`.
    /// Does not do any heap-allocation but borrows from this instance instead.
    pub fn chars(&self) -> impl '_ + Iterator<Item = char> {
        self.bytes.iter().map(|&byte| byte as char)
    }

    /// Compare this `Text` with a plain `&str`.
    /// Names are usually stored as latin-1, but some writers store utf-8,
    /// so both encodings of the string match.
    pub fn eq(&self, string: &str) -> bool {
        self.bytes() == string.as_bytes() || string.chars().eq(self.chars())
    }

    /// Check whether this text can be used as a name,
    /// for example the name of an attribute or a channel.
    pub fn validate_name(&self) -> UnitResult {
        if self.bytes.is_empty() {
            return Err(Error::invalid("text must not be empty"));
        }

        if self.bytes.len() >= 256 {
            return Err(Error::invalid("text must not be longer than 255"));
        }

        if self.bytes.contains(&0) {
            return Err(Error::invalid("text must not contain null bytes"));
        }

        Ok(())
    }

    /// Whether this name requires the long names flag in the file version.
    pub fn is_long_name(&self) -> bool {
        self.bytes.len() >= 32
    }

    /// The byte count this string would occupy if it were encoded as a null-terminated string.
    pub fn null_terminated_byte_size(&self) -> usize {
        self.bytes.len() + sequence_end::byte_size()
    }

    /// The byte count this string would occupy if it were encoded as a size-prefixed string.
    pub fn i32_sized_byte_size(&self) -> usize {
        self.bytes.len() + i32::BYTE_SIZE
    }

    /// Write the length of a string and then the contents with that length.
    pub fn write_i32_sized<W: Write>(&self, write: &mut W) -> UnitResult {
        i32::write(usize_to_i32(self.bytes.len(), "text too long")?, write)?;
        u8::write_slice(write, self.bytes.as_slice())
    }

    /// Read the length of a string and then the contents with that length.
    pub fn read_i32_sized<R: Read>(read: &mut R, max_size: usize) -> Result<Self> {
        let size = i32_to_usize(i32::read(read)?, "vector size")?;
        Self::read_sized(read, size, max_size)
    }

    /// Read the contents with that length.
    pub fn read_sized<R: Read>(read: &mut R, size: usize, max_size: usize) -> Result<Self> {
        let bytes = u8::read_vec(read, size, 1024, Some(max_size), "text attribute length")?;
        Ok(Text::from_bytes_unchecked(SmallVec::from_vec(bytes)))
    }

    /// Write the string contents and a null-terminator.
    pub fn write_null_terminated<W: Write>(&self, write: &mut W) -> UnitResult {
        Self::write_null_terminated_bytes(self.bytes(), write)
    }

    /// Write the string contents and a null-terminator.
    fn write_null_terminated_bytes<W: Write>(bytes: &[u8], write: &mut W) -> UnitResult {
        debug_assert!(!bytes.is_empty(), "text is empty bug"); // would be mistaken for a sequence end
        u8::write_slice(write, bytes)?;
        sequence_end::write(write)
    }

    /// Read a string until the null-terminator is found. Then skips the null-terminator.
    pub fn read_null_terminated<R: Read>(read: &mut R, max_len: usize) -> Result<Self> {
        let mut bytes = TextBytes::new();

        loop {
            match u8::read(read)? {
                0 => break,
                non_terminator => bytes.push(non_terminator),
            }

            if bytes.len() > max_len {
                return Err(Error::invalid("text too long"))
            }
        }

        Ok(Text { bytes })
    }

    fn read_vec_of_i32_sized(read: &mut impl Read, total_byte_size: usize) -> Result<Vec<Text>> {
        let mut result = Vec::with_capacity(2);

        // length of the text-vector can be inferred from attribute size
        let mut processed_bytes = 0;

        while processed_bytes < total_byte_size {
            let text = Text::read_i32_sized(read, total_byte_size - processed_bytes)?;
            processed_bytes += i32::BYTE_SIZE + text.bytes.len();
            result.push(text);
        }

        // the expected byte size did not match the actual text byte size
        if processed_bytes != total_byte_size {
            return Err(Error::invalid("text array byte size"))
        }

        Ok(result)
    }
}

impl Borrow<[u8]> for Text {
    fn borrow(&self) -> &[u8] {
        self.bytes()
    }
}

impl PartialEq<str> for Text {
    fn eq(&self, other: &str) -> bool {
        Text::eq(self, other)
    }
}

impl ::std::fmt::Debug for Text {
    fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
        write!(f, "Text(\"{}\")", self)
    }
}

impl ::std::fmt::Display for Text {
    fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
        use std::fmt::Write;

        for &byte in self.bytes.iter() {
            f.write_char(byte as char)?;
        }

        Ok(())
    }
}


impl IntegerBounds {

    /// Create a box with a size starting at zero.
    pub fn from_dimensions(size: impl Into<Vec2<usize>>) -> Self {
        Self::new(Vec2(0,0), size)
    }

    /// Create a box with a size and an origin point.
    pub fn new(start: impl Into<Vec2<i32>>, size: impl Into<Vec2<usize>>) -> Self {
        Self { position: start.into(), size: size.into() }
    }

    /// Create a box from its inclusive minimum and maximum coordinates,
    /// as used by the exr file format.
    pub fn from_min_max(min: impl Into<Vec2<i32>>, max: impl Into<Vec2<i32>>) -> Result<Self> {
        let (min, max) = (min.into(), max.into());
        let min_i64 = Vec2(i64::from(min.x()), i64::from(min.y()));
        let max_i64 = Vec2(i64::from(max.x()), i64::from(max.y()));

        if max_i64.x() + 1 < min_i64.x() || max_i64.y() + 1 < min_i64.y() {
            return Err(Error::invalid("window maximum smaller than minimum"));
        }

        Self::validate_min_max_i64(min_i64, max_i64)?;

        // add one to max because the max inclusive, but the size is not
        let size = Vec2(max.x() + 1 - min.x(), max.y() + 1 - min.y());
        Ok(IntegerBounds { position: min, size: size.to_usize("box coordinates")? })
    }

    /// Returns the top-right coordinate of the rectangle.
    /// The row and column described by this vector are not included in the rectangle,
    /// just like `Vec::len()`.
    pub fn end(self) -> Vec2<i32> {
        let size = self.size.map(|value| i32::try_from(value).unwrap_or(i32::MAX));
        Vec2(self.position.x().saturating_add(size.x()), self.position.y().saturating_add(size.y()))
    }

    /// Returns the maximum coordinate that a value in this rectangle may have.
    pub fn max(self) -> Vec2<i32> {
        self.end() - Vec2(1,1)
    }

    /// Validate this instance.
    pub fn validate(&self) -> UnitResult {
        let min_i64 = Vec2(i64::from(self.position.x()), i64::from(self.position.y()));

        let max_i64 = Vec2(
            i64::from(self.position.x()) + self.size.width() as i64,
            i64::from(self.position.y()) + self.size.height() as i64,
        );

        Self::validate_min_max_i64(min_i64, max_i64)
    }

    fn validate_min_max_i64(min: Vec2<i64>, max: Vec2<i64>) -> UnitResult {
        let max_box_size_as_i64 = i64::from(i32::MAX / 2); // as defined in the original c++ library

        if     max.x() >=  max_box_size_as_i64
            || max.y() >=  max_box_size_as_i64
            || min.x() <= -max_box_size_as_i64
            || min.y() <= -max_box_size_as_i64
        {
            return Err(Error::invalid("window size exceeding integer maximum"));
        }

        Ok(())
    }

    /// Number of bytes this would consume in an exr file.
    pub fn byte_size() -> usize {
        4 * i32::BYTE_SIZE
    }

    /// Without validation, write this instance to the byte stream.
    pub fn write<W: Write>(&self, write: &mut W) -> UnitResult {
        let Vec2(x_min, y_min) = self.position;
        let Vec2(x_max, y_max) = self.max();

        x_min.write(write)?;
        y_min.write(write)?;
        x_max.write(write)?;
        y_max.write(write)?;
        Ok(())
    }

    /// Read the value without validating.
    pub fn read<R: Read>(read: &mut R) -> Result<Self> {
        let x_min = i32::read(read)?;
        let y_min = i32::read(read)?;
        let x_max = i32::read(read)?;
        let y_max = i32::read(read)?;

        Self::from_min_max(Vec2(x_min, y_min), Vec2(x_max, y_max))
    }
}


impl SampleType {

    /// How many bytes a single sample takes up.
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            SampleType::F16 => f16::BYTE_SIZE,
            SampleType::F32 => f32::BYTE_SIZE,
            SampleType::U32 => u32::BYTE_SIZE,
        }
    }

    /// Number of bytes this would consume in an exr file.
    pub fn byte_size() -> usize {
        i32::BYTE_SIZE
    }

    /// Without validation, write this instance to the byte stream.
    pub fn write<W: Write>(&self, write: &mut W) -> UnitResult {
        match *self {
            SampleType::U32 => 0_i32,
            SampleType::F16 => 1_i32,
            SampleType::F32 => 2_i32,
        }.write(write)?;

        Ok(())
    }

    /// Read the value without validating.
    pub fn read<R: Read>(read: &mut R) -> Result<Self> {
        Ok(match i32::read(read)? {
            0 => SampleType::U32,
            1 => SampleType::F16,
            2 => SampleType::F32,
            _ => return Err(Error::invalid("pixel type attribute value")),
        })
    }
}


impl Channel {

    /// Create a new channel with the specified sample type,
    /// a sampling rate of (1,1), and non-linear quantization.
    pub fn new(sample_type: SampleType) -> Self {
        Channel { sample_type, sampling: Vec2(1, 1), quantize_linearly: false }
    }

    /// Create a new channel with all properties.
    pub fn detailed(sample_type: SampleType, sampling: impl Into<Vec2<usize>>, quantize_linearly: bool) -> Self {
        Channel { sample_type, sampling: sampling.into(), quantize_linearly }
    }

    /// How many samples of this channel a row of the data window contains.
    pub fn samples_per_line(&self, data_window: IntegerBounds) -> usize {
        sampled_count(data_window.position.x(), data_window.size.width(), self.sampling.x())
    }

    /// Whether the scan line `y` contains samples of this channel.
    pub fn has_line(&self, y: i32) -> bool {
        is_sampled(y, self.sampling.y())
    }

    /// Number of bytes this would consume in an exr file.
    pub fn byte_size(name: &Text) -> usize {
        name.null_terminated_byte_size()
            + SampleType::byte_size()
            + 1 // is_linear
            + 3 // reserved bytes
            + 2 * i32::BYTE_SIZE // sampling x, y
    }

    /// Without validation, write this instance to the byte stream.
    pub fn write<W: Write>(&self, name: &Text, write: &mut W) -> UnitResult {
        Text::write_null_terminated(name, write)?;
        self.sample_type.write(write)?;

        match self.quantize_linearly {
            false => 0_u8,
            true  => 1_u8,
        }.write(write)?;

        i8::write_slice(write, &[0_i8, 0_i8, 0_i8])?;
        i32::write(usize_to_i32(self.sampling.x(), "x channel sampling")?, write)?;
        i32::write(usize_to_i32(self.sampling.y(), "y channel sampling")?, write)?;
        Ok(())
    }

    /// Read the value without validating.
    pub fn read<R: Read>(read: &mut R) -> Result<(Text, Self)> {
        let name = Text::read_null_terminated(read, 256)?;
        let sample_type = SampleType::read(read)?;

        let quantize_linearly = match u8::read(read)? {
            1 => true,
            0 => false,
            _ => return Err(Error::invalid("channel linearity attribute value")),
        };

        let mut reserved = [0_i8; 3];
        i8::read_slice(read, &mut reserved)?;

        let x_sampling = i32_to_usize(i32::read(read)?, "x channel sampling")?;
        let y_sampling = i32_to_usize(i32::read(read)?, "y channel sampling")?;

        Ok((name, Channel {
            sample_type, quantize_linearly,
            sampling: Vec2(x_sampling, y_sampling),
        }))
    }

    /// Validate this instance.
    pub fn validate(&self, name: &Text, data_window: IntegerBounds) -> UnitResult {
        name.validate_name()?;

        if self.sampling.x() == 0 || self.sampling.y() == 0 {
            return Err(Error::invalid("zero sampling factor"));
        }

        if !is_sampled(data_window.position.x(), self.sampling.x()) || !is_sampled(data_window.position.y(), self.sampling.y()) {
            return Err(Error::invalid("channel sampling factor not dividing data window position"));
        }

        if data_window.size.x() % self.sampling.x() != 0 || data_window.size.y() % self.sampling.y() != 0 {
            return Err(Error::invalid("channel sampling factor not dividing data window size"));
        }

        Ok(())
    }
}


impl ChannelList {

    /// Sort the channels by name, as required by the file format.
    /// If a name occurs multiple times, the last occurrence wins.
    pub fn new(channels: impl IntoIterator<Item=(Text, Channel)>) -> Self {
        let mut list: SmallVec<[(Text, Channel); 5]> = SmallVec::new();

        for (name, channel) in channels {
            match list.binary_search_by(|(existing, _)| existing.cmp(&name)) {
                Ok(index) => list[index].1 = channel,
                Err(index) => list.insert(index, (name, channel)),
            }
        }

        ChannelList { list }
    }

    /// Return the index of the channel with the exact name, case sensitive, or none.
    /// Potentially uses less than linear time.
    pub fn find_index_of_channel(&self, exact_name: &[u8]) -> Option<usize> {
        self.list.binary_search_by(|(name, _)| name.bytes().cmp(exact_name)).ok()
    }

    /// Number of bytes this would consume in an exr file.
    pub fn byte_size(&self) -> usize {
        self.list.iter().map(|(name, _)| Channel::byte_size(name)).sum::<usize>() + sequence_end::byte_size()
    }

    /// Without validation, write this instance to the byte stream.
    /// Assumes channels are sorted alphabetically and all values are validated.
    pub fn write(&self, write: &mut impl Write) -> UnitResult {
        for (name, channel) in &self.list {
            channel.write(name, write)?;
        }

        sequence_end::write(write)
    }

    /// Read the value without validating.
    pub fn read(read: &mut PeekRead<impl Read>) -> Result<Self> {
        let mut list = SmallVec::new();
        while !sequence_end::has_come(read)? {
            list.push(Channel::read(read)?);
        }

        Ok(ChannelList { list })
    }

    /// Check if channels are valid and sorted.
    pub fn validate(&self, data_window: IntegerBounds) -> UnitResult {
        if self.list.is_empty() {
            return Err(Error::invalid("at least one channel is required"));
        }

        for (name, channel) in &self.list {
            channel.validate(name, data_window)?;
        }

        for pair in self.list.windows(2) {
            if pair[0].0 >= pair[1].0 {
                return Err(Error::invalid("channel names are not unique or not sorted alphabetically"));
            }
        }

        Ok(())
    }
}


impl Compression {

    /// Number of bytes this would consume in an exr file.
    pub fn byte_size() -> usize { u8::BYTE_SIZE }

    /// Without validation, write this instance to the byte stream.
    pub fn write<W: Write>(self, write: &mut W) -> UnitResult {
        use self::Compression::*;
        match self {
            Uncompressed => 0_u8,
            RLE => 1_u8,
            ZIP1 => 2_u8,
            ZIP16 => 3_u8,
            PIZ => 4_u8,
            PXR24 => 5_u8,
            B44 => 6_u8,
            B44A => 7_u8,
            DWAA => 8_u8,
            DWAB => 9_u8,
        }.write(write)?;
        Ok(())
    }

    /// Read the value without validating.
    pub fn read<R: Read>(read: &mut R) -> Result<Self> {
        use self::Compression::*;
        Ok(match u8::read(read)? {
            0 => Uncompressed,
            1 => RLE,
            2 => ZIP1,
            3 => ZIP16,
            4 => PIZ,
            5 => PXR24,
            6 => B44,
            7 => B44A,
            8 => DWAA,
            9 => DWAB,
            _ => return Err(Error::unsupported("unknown compression method")),
        })
    }
}

impl EnvironmentMap {

    /// Without validation, write this instance to the byte stream.
    pub fn write<W: Write>(self, write: &mut W) -> UnitResult {
        match self {
            EnvironmentMap::LatitudeLongitude => 0_u8,
            EnvironmentMap::Cube => 1_u8
        }.write(write)
    }

    /// Read the value without validating.
    pub fn read<R: Read>(read: &mut R) -> Result<Self> {
        Ok(match u8::read(read)? {
            0 => EnvironmentMap::LatitudeLongitude,
            1 => EnvironmentMap::Cube,
            _ => return Err(Error::invalid("environment map attribute value")),
        })
    }
}

impl LineOrder {

    /// Without validation, write this instance to the byte stream.
    pub fn write<W: Write>(self, write: &mut W) -> UnitResult {
        match self {
            LineOrder::Increasing => 0_u8,
            LineOrder::Decreasing => 1_u8,
            LineOrder::Unspecified => 2_u8,
        }.write(write)
    }

    /// Read the value without validating.
    pub fn read<R: Read>(read: &mut R) -> Result<Self> {
        Ok(match u8::read(read)? {
            0 => LineOrder::Increasing,
            1 => LineOrder::Decreasing,
            2 => LineOrder::Unspecified,
            _ => return Err(Error::invalid("line order attribute value")),
        })
    }
}


/// Number of bytes this attribute would consume in an exr file.
pub fn byte_size(name: &Text, value: &AttributeValue) -> usize {
    name.null_terminated_byte_size()
        + value.kind_name().len() + sequence_end::byte_size()
        + i32::BYTE_SIZE // serialized byte size
        + value.byte_size()
}

/// Without validation, write this attribute to the byte stream.
pub fn write<W: Write>(name: &[u8], value: &AttributeValue, write: &mut W) -> UnitResult {
    Text::write_null_terminated_bytes(name, write)?;
    Text::write_null_terminated_bytes(value.kind_name(), write)?;
    i32::write(usize_to_i32(value.byte_size(), "attribute size")?, write)?;
    value.write(write)
}

/// Read the attribute without validating. The result may be `Ok` even if this single attribute is invalid.
pub fn read(read: &mut PeekRead<impl Read>, max_size: usize) -> Result<(Text, Result<AttributeValue>)> {
    let name = Text::read_null_terminated(read, max_size)?;
    let kind = Text::read_null_terminated(read, max_size)?;
    let size = i32_to_usize(i32::read(read)?, "attribute size")?;
    let value = AttributeValue::read(read, kind, size)?;
    Ok((name, value))
}


impl AttributeValue {

    /// Number of bytes this would consume in an exr file.
    pub fn byte_size(&self) -> usize {
        use self::AttributeValue::*;

        match *self {
            IntegerBounds(_) => self::IntegerBounds::byte_size(),

            I32(_) => i32::BYTE_SIZE,
            F32(_) => f32::BYTE_SIZE,
            F64(_) => f64::BYTE_SIZE,

            IntVec2(_) => { 2 * i32::BYTE_SIZE },
            FloatVec2(_) => { 2 * f32::BYTE_SIZE },

            ChannelList(ref channels) => channels.byte_size(),
            Compression(_) => self::Compression::byte_size(),
            EnvironmentMap(_) => u8::BYTE_SIZE,
            LineOrder(_) => u8::BYTE_SIZE,

            // attribute value texts never have limited size.
            // also, don't serialize size, as it can be inferred from attribute size
            Text(ref value) => value.bytes.len(),

            TextVector(ref value) => value.iter().map(self::Text::i32_sized_byte_size).sum(),
            Custom { ref bytes, .. } => bytes.len(),
        }
    }

    /// The exr name string of the type that an attribute can have.
    pub fn kind_name(&self) -> &[u8] {
        use self::AttributeValue::*;
        use self::type_names as ty;

        match *self {
            IntegerBounds(_) =>  ty::I32BOX2,
            I32(_) =>  ty::I32,
            F32(_) =>  ty::F32,
            F64(_) =>  ty::F64,
            IntVec2(_) => ty::I32VEC2,
            FloatVec2(_) => ty::F32VEC2,
            ChannelList(_) =>  ty::CHANNEL_LIST,
            Compression(_) =>  ty::COMPRESSION,
            EnvironmentMap(_) =>  ty::ENVIRONMENT_MAP,
            LineOrder(_) =>  ty::LINE_ORDER,
            Text(_) =>  ty::TEXT,
            TextVector(_) =>  ty::TEXT_VECTOR,
            Custom { ref kind, .. } => kind.bytes(),
        }
    }

    /// Without validation, write this instance to the byte stream.
    pub fn write<W: Write>(&self, write: &mut W) -> UnitResult {
        use self::AttributeValue::*;
        match *self {
            IntegerBounds(value) => value.write(write)?,

            I32(value) => value.write(write)?,
            F32(value) => value.write(write)?,
            F64(value) => value.write(write)?,

            IntVec2(Vec2(x, y)) => { x.write(write)?; y.write(write)?; },
            FloatVec2(Vec2(x, y)) => { x.write(write)?; y.write(write)?; },

            ChannelList(ref channels) => channels.write(write)?,
            Compression(value) => value.write(write)?,
            EnvironmentMap(value) => value.write(write)?,
            LineOrder(value) => value.write(write)?,

            Text(ref value) => u8::write_slice(write, value.bytes())?,
            TextVector(ref texts) => for text in texts { text.write_i32_sized(write)?; },
            Custom { ref bytes, .. } => u8::write_slice(write, bytes)?,
        };

        Ok(())
    }

    /// Read the value without validating.
    /// Returns `Ok(Ok(attribute))` for valid attributes.
    /// Returns `Ok(Err(Error))` for invalid attributes from a valid byte source.
    /// Returns `Err(Error)` for invalid byte sources, for example for invalid files.
    pub fn read(read: &mut PeekRead<impl Read>, kind: Text, byte_size: usize) -> Result<Result<Self>> {
        use self::AttributeValue::*;
        use self::type_names as ty;

        // always read bytes, so that an invalid value does not corrupt the rest of the header
        let attribute_bytes = u8::read_vec(read, byte_size, 128, None, "attribute value size")?;

        let parse_attribute = || {
            let reader = &mut attribute_bytes.as_slice();

            Ok(match kind.bytes() {
                ty::I32BOX2 => IntegerBounds(self::IntegerBounds::read(reader)?),

                ty::I32 => I32(i32::read(reader)?),
                ty::F32 => F32(f32::read(reader)?),
                ty::F64 => F64(f64::read(reader)?),

                ty::I32VEC2 => IntVec2({
                    let a = i32::read(reader)?;
                    let b = i32::read(reader)?;
                    Vec2(a, b)
                }),

                ty::F32VEC2 => FloatVec2({
                    let a = f32::read(reader)?;
                    let b = f32::read(reader)?;
                    Vec2(a, b)
                }),

                ty::CHANNEL_LIST    => ChannelList(self::ChannelList::read(&mut PeekRead::new(attribute_bytes.as_slice()))?),
                ty::COMPRESSION     => Compression(self::Compression::read(reader)?),
                ty::ENVIRONMENT_MAP => EnvironmentMap(self::EnvironmentMap::read(reader)?),
                ty::LINE_ORDER      => LineOrder(self::LineOrder::read(reader)?),

                ty::TEXT        => Text(self::Text::read_sized(reader, byte_size, byte_size)?),

                // the number of strings can be inferred from the total attribute size
                ty::TEXT_VECTOR => TextVector(self::Text::read_vec_of_i32_sized(reader, byte_size)?),

                _ => Custom { kind: kind.clone(), bytes: attribute_bytes.clone() }
            })
        };

        Ok(parse_attribute())
    }

    /// Return `Ok(i32)` if this attribute is an i32.
    pub fn to_i32(&self) -> Result<i32> {
        match *self {
            AttributeValue::I32(value) => Ok(value),
            _ => Err(invalid_type())
        }
    }

    /// Return `Ok(f32)` if this attribute is an f32.
    pub fn to_f32(&self) -> Result<f32> {
        match *self {
            AttributeValue::F32(value) => Ok(value),
            _ => Err(invalid_type())
        }
    }

    /// Return `Ok(Text)` if this attribute is a text.
    pub fn to_text(&self) -> Result<&Text> {
        match self {
            AttributeValue::Text(value) => Ok(value),
            _ => Err(invalid_type())
        }
    }
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn text_ordering_and_display(){
        let a = Text::new("A").unwrap();
        let b = Text::new("B").unwrap();
        assert!(a < b);
        assert_eq!(b.to_string(), "B");
        assert!(Text::new_or_none("\u{1F600}").is_none());
        assert!(matches!(Text::new("\u{03bb}"), Err(Error::Invalid(_))));
        assert!(Text::new("\u{00e9}").unwrap().eq("\u{00e9}"));
        assert!(Text::new("").unwrap().validate_name().is_err());
    }

    #[test]
    fn bounds_from_inclusive_corners(){
        let bounds = IntegerBounds::from_min_max(Vec2(0, 0), Vec2(3, 3)).unwrap();
        assert_eq!(bounds, IntegerBounds::from_dimensions(Vec2(4, 4)));
        assert_eq!(bounds.max(), Vec2(3, 3));

        let bounds = IntegerBounds::from_min_max(Vec2(-2, 5), Vec2(1, 5)).unwrap();
        assert_eq!(bounds.size, Vec2(4, 1));

        assert!(IntegerBounds::from_min_max(Vec2(0, 0), Vec2(-5, 0)).is_err());
        assert!(IntegerBounds::new(Vec2(i32::MAX / 2, 0), Vec2(1, 1)).validate().is_err());
    }

    #[test]
    fn channel_list_sorting_replaces_duplicates(){
        let list = ChannelList::new(vec![
            (Text::new("G").unwrap(), Channel::new(SampleType::F16)),
            (Text::new("B").unwrap(), Channel::new(SampleType::F16)),
            (Text::new("G").unwrap(), Channel::new(SampleType::U32)),
        ]);

        let names: Vec<String> = list.list.iter().map(|(name, _)| name.to_string()).collect();
        assert_eq!(names, vec!["B", "G"]);
        assert_eq!(list.list[1].1.sample_type, SampleType::U32);
        assert_eq!(list.find_index_of_channel(b"G"), Some(1));
        assert_eq!(list.find_index_of_channel(b"R"), None);
    }

    #[test]
    fn channel_encoding(){
        let list = ChannelList::new(vec![
            (Text::new("Y").unwrap(), Channel::detailed(SampleType::F32, (1, 2), true)),
        ]);

        let mut bytes = Vec::new();
        list.write(&mut bytes).unwrap();
        assert_eq!(bytes.len(), list.byte_size());
        assert_eq!(&bytes[.. 2], b"Y\0");

        let decoded = ChannelList::read(&mut PeekRead::new(bytes.as_slice())).unwrap();
        assert_eq!(decoded, list);
    }

    #[test]
    fn sampling_must_divide_window(){
        let channel = Channel::detailed(SampleType::F16, (2, 2), false);
        let name = Text::new("C").unwrap();

        assert!(channel.validate(&name, IntegerBounds::from_dimensions((4, 4))).is_ok());
        assert!(channel.validate(&name, IntegerBounds::from_dimensions((3, 4))).is_err());
        assert!(channel.validate(&name, IntegerBounds::new((1, 0), (4, 4))).is_err());
        assert!(Channel::detailed(SampleType::F16, (0, 1), false).validate(&name, IntegerBounds::from_dimensions((4, 4))).is_err());

        assert_eq!(channel.samples_per_line(IntegerBounds::from_dimensions((4, 4))), 2);
        assert!(channel.has_line(-2));
        assert!(!channel.has_line(3));
    }

    #[test]
    fn unknown_attribute_types_are_kept(){
        let value = AttributeValue::Custom { kind: Text::new("m33f").unwrap(), bytes: vec![1, 2, 3] };

        let mut bytes = Vec::new();
        write(b"matrix", &value, &mut bytes).unwrap();
        assert_eq!(bytes.len(), byte_size(&Text::new("matrix").unwrap(), &value));

        let (name, decoded) = read(&mut PeekRead::new(bytes.as_slice()), 255).unwrap();
        assert_eq!(name, Text::new("matrix").unwrap());
        assert_eq!(decoded.unwrap(), value);
    }

    #[test]
    fn text_vectors(){
        let value = AttributeValue::TextVector(vec![Text::new("left").unwrap(), Text::new("right").unwrap()]);

        let mut bytes = Vec::new();
        value.write(&mut bytes).unwrap();
        assert_eq!(bytes.len(), value.byte_size());

        let decoded = AttributeValue::read(&mut PeekRead::new(bytes.as_slice()), Text::new("stringvector").unwrap(), bytes.len()).unwrap();
        assert_eq!(decoded.unwrap(), value);
    }
}
