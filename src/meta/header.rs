
//! The header of a single-part scan line file.
//! Contains the geometry, the channel list, and all other attributes.

use smallvec::SmallVec;
use crate::meta::attribute::{self, *};
use crate::meta::{sequence_end, missing_attribute, Requirements};
use crate::math::*;
use crate::io::*;
use crate::error::*;


/// Describes the pixels of a file: where they are,
/// which channels they have, and how they are stored.
///
/// The scalar geometry is public and can be assigned directly.
/// Channels and optional attributes are accessed through methods,
/// which keep the names unique.
#[derive(Clone, Debug, PartialEq)]
pub struct Header {

    /// The rectangle that a viewer should display.
    pub display_window: IntegerBounds,

    /// The rectangle of pixels that are actually stored in the file.
    pub data_window: IntegerBounds,

    /// Aspect ratio of each pixel. Default is `1.0`.
    pub pixel_aspect: f32,

    /// Part of the perspective projection. Default is `(0, 0)`.
    pub screen_window_center: Vec2<f32>,

    /// Part of the perspective projection. Default is `1`.
    pub screen_window_width: f32,

    /// In what order the blocks of scan lines occur in the file.
    pub line_order: LineOrder,

    /// How the pixel data is compressed.
    pub compression: Compression,

    /// In insertion order, names are unique.
    channels: SmallVec<[(Text, Channel); 5]>,

    /// All attributes that are not required, in insertion order, names are unique.
    attributes: Vec<(Text, AttributeValue)>,
}

/// Iterates the channels of a header in insertion order.
/// Acquire a new one from `Header::channels` to start over.
#[derive(Debug, Clone)]
pub struct ChannelListIterator<'h> {
    channels: &'h [(Text, Channel)],
    current: usize,
    end: usize,
}


/// The names of the attributes every header has.
/// These cannot be inserted or erased as optional attributes.
pub mod standard_names {
    macro_rules! define_required_attribute_names {
        ( $($name: ident  :  $value: expr),* ) => {

            /// A list containing all reserved names.
            pub const ALL: &'static [&'static [u8]] = &[
                $( $value ),*
            ];

            $(
                /// The byte-string name of this required attribute as it appears in an exr file.
                pub const $name: &'static [u8] = $value;
            )*
        };
    }

    define_required_attribute_names! {
        CHANNELS: b"channels",
        COMPRESSION: b"compression",
        DATA_WINDOW: b"dataWindow",
        DISPLAY_WINDOW: b"displayWindow",
        LINE_ORDER: b"lineOrder",
        PIXEL_ASPECT: b"pixelAspectRatio",
        WINDOW_CENTER: b"screenWindowCenter",
        WINDOW_WIDTH: b"screenWindowWidth"
    }

    /// The name of the environment map attribute.
    pub const ENVIRONMENT_MAP: &'static [u8] = b"envmap";

    /// The name of the multi view attribute.
    pub const MULTI_VIEW: &'static [u8] = b"multiView";

    /// Whether the attribute is one that every header has.
    pub fn is_required(name: &[u8]) -> bool {
        ALL.iter().any(|&required| required == name)
    }
}


impl Header {

    /// Create a header with all required geometry and no channels.
    pub fn new(
        display_window: IntegerBounds, data_window: IntegerBounds,
        pixel_aspect: f32, screen_window_center: Vec2<f32>, screen_window_width: f32,
        line_order: LineOrder, compression: Compression,
    ) -> Self
    {
        Header {
            display_window, data_window,
            pixel_aspect, screen_window_center, screen_window_width,
            line_order, compression,
            channels: SmallVec::new(),
            attributes: Vec::new(),
        }
    }

    /// Create a header whose display and data window start at the origin and have the specified size.
    /// Uses increasing line order and `ZIP16` compression.
    pub fn from_dimensions(size: impl Into<Vec2<usize>>) -> Self {
        let window = IntegerBounds::from_dimensions(size);

        Header::new(
            window, window,
            1.0, Vec2(0.0, 0.0), 1.0,
            LineOrder::Increasing, Compression::ZIP16,
        )
    }

    /// Add a channel, replacing any channel with the same name.
    /// Fails if the name cannot be stored in a file.
    pub fn with_channel(mut self, name: &str, channel: Channel) -> Result<Self> {
        self.insert_channel(name, channel)?;
        Ok(self)
    }

    /// Set the compression method.
    pub fn with_compression(self, compression: Compression) -> Self {
        Header { compression, ..self }
    }

    /// Set the line order.
    pub fn with_line_order(self, line_order: LineOrder) -> Self {
        Header { line_order, ..self }
    }

    /// Add a channel. If a channel with this name exists,
    /// its definition is replaced and it keeps its position.
    /// Fails if the name contains characters that cannot be stored in a file.
    pub fn insert_channel(&mut self, name: &str, channel: Channel) -> UnitResult {
        let name = Text::new(name)?;

        match self.channels.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, existing)) => *existing = channel,
            None => self.channels.push((name, channel)),
        }

        Ok(())
    }

    /// Look up a channel by its exact name.
    /// Returns `None` if there is no such channel.
    pub fn channel(&self, name: &str) -> Option<&Channel> {
        self.channels.iter()
            .find(|(existing, _)| existing.eq(name))
            .map(|(_, channel)| channel)
    }

    /// Iterate all channels in insertion order.
    pub fn channels(&self) -> ChannelListIterator<'_> {
        ChannelListIterator {
            channels: &self.channels,
            current: 0,
            end: self.channels.len(),
        }
    }

    /// The channels sorted by name, as they are stored in the file.
    pub fn channel_list(&self) -> ChannelList {
        ChannelList::new(self.channels.iter().cloned())
    }

    /// The width and height of the data window.
    pub fn data_size(&self) -> Vec2<usize> {
        self.data_window.size
    }

    /// The top left pixel of the data window.
    pub fn data_origin(&self) -> Vec2<i32> {
        self.data_window.position
    }

    /// Look up an optional attribute by name.
    /// The required attributes are fields of this struct and are not returned here.
    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.iter()
            .find(|(existing, _)| existing.eq(name))
            .map(|(_, value)| value)
    }

    /// Iterate all optional attributes in insertion order.
    pub fn attributes(&self) -> impl '_ + Iterator<Item = (&Text, &AttributeValue)> {
        self.attributes.iter().map(|(name, value)| (name, value))
    }

    /// Add an optional attribute, replacing any attribute with the same name.
    /// Required attributes must be set through the fields of the header instead.
    pub fn insert_attribute(&mut self, name: &str, value: AttributeValue) -> UnitResult {
        let name = Text::new(name)?;
        name.validate_name()?;

        if standard_names::is_required(name.bytes()) {
            return Err(Error::invalid(format!("required attribute `{}` cannot be replaced", name)));
        }

        insert_or_replace(&mut self.attributes, name, value);
        Ok(())
    }

    /// Remove an optional attribute. Does nothing if no attribute has this name.
    /// Required attributes cannot be removed.
    pub fn erase_attribute(&mut self, name: &str) -> UnitResult {
        if standard_names::is_required(name.as_bytes()) {
            return Err(Error::invalid(format!("required attribute `{}` cannot be erased", name)));
        }

        self.attributes.retain(|(existing, _)| !existing.eq(name));
        Ok(())
    }

    /// Whether the header has a valid environment map attribute.
    pub fn has_environment_map(&self) -> bool {
        self.environment_map().is_some()
    }

    /// The kind of environment map, if this image is one.
    pub fn environment_map(&self) -> Option<EnvironmentMap> {
        match self.optional(standard_names::ENVIRONMENT_MAP) {
            Some(AttributeValue::EnvironmentMap(map)) => Some(*map),
            _ => None,
        }
    }

    /// Mark this image as an environment map.
    pub fn set_environment_map(&mut self, map: EnvironmentMap) {
        self.set_optional(standard_names::ENVIRONMENT_MAP, AttributeValue::EnvironmentMap(map));
    }

    /// Whether the header has a valid multi view attribute.
    pub fn has_multi_view(&self) -> bool {
        self.multi_view().is_some()
    }

    /// The view names, if this is a multi view image.
    pub fn multi_view(&self) -> Option<&[Text]> {
        match self.optional(standard_names::MULTI_VIEW) {
            Some(AttributeValue::TextVector(views)) => Some(views.as_slice()),
            _ => None,
        }
    }

    /// Set the view names of this multi view image.
    pub fn set_multi_view(&mut self, views: Vec<Text>) {
        self.set_optional(standard_names::MULTI_VIEW, AttributeValue::TextVector(views));
    }

    fn optional(&self, name: &[u8]) -> Option<&AttributeValue> {
        self.attributes.iter()
            .find(|(existing, _)| existing.bytes() == name)
            .map(|(_, value)| value)
    }

    fn set_optional(&mut self, name: &[u8], value: AttributeValue) {
        match self.attributes.iter_mut().find(|(existing, _)| existing.bytes() == name) {
            Some((_, existing)) => *existing = value,
            None => self.attributes.push((Text::from_bytes_unchecked(SmallVec::from_slice(name)), value)),
        }
    }

    /// Whether any name in this header requires the long names flag.
    pub fn has_long_names(&self) -> bool {
        self.channels.iter().any(|(name, _)| name.is_long_name())
            || self.attributes.iter().any(|(name, value)| {
                name.is_long_name() || value.kind_name().len() >= 32
            })
    }

    /// Check that this header can be written to a file.
    pub fn validate(&self) -> UnitResult {
        self.display_window.validate()?;
        self.data_window.validate()?;

        if !self.pixel_aspect.is_normal() || self.pixel_aspect < 0.0 {
            return Err(Error::invalid("pixel aspect ratio"));
        }

        if !self.screen_window_width.is_finite() || !self.screen_window_center.x().is_finite() || !self.screen_window_center.y().is_finite() {
            return Err(Error::invalid("screen window"));
        }

        self.channel_list().validate(self.data_window)?;

        for (name, _) in &self.attributes {
            name.validate_name()?;

            if standard_names::is_required(name.bytes()) {
                return Err(Error::invalid("duplicate required attribute"));
            }
        }

        Ok(())
    }

    /// Read the value without validating.
    pub fn read(read: &mut PeekRead<impl Read>, requirements: &Requirements) -> Result<Self> {
        let max_string_len = if requirements.has_long_names { 256 } else { 32 };

        // these required attributes will be filled when encountered while parsing
        let mut channels = None;
        let mut compression = None;
        let mut data_window = None;
        let mut display_window = None;
        let mut line_order = None;
        let mut pixel_aspect = None;
        let mut screen_window_center = None;
        let mut screen_window_width = None;
        let mut attributes = Vec::new();

        while !sequence_end::has_come(read)? {
            let (attribute_name, value) = attribute::read(read, max_string_len)?;
            let is_required = standard_names::is_required(attribute_name.bytes());

            let value = match value {
                Ok(value) => value,

                // unreadable optional attributes do not prevent reading the pixels
                Err(error) if !is_required => {
                    tracing::debug!("skipping attribute `{}`: {}", attribute_name, error);
                    continue;
                },

                Err(error) => return Err(error),
            };

            use self::standard_names as name;
            use crate::meta::attribute::AttributeValue::*;

            match (attribute_name.bytes(), value) {
                (name::CHANNELS, ChannelList(value)) => channels = Some(value),
                (name::COMPRESSION, Compression(value)) => compression = Some(value),
                (name::DATA_WINDOW, IntegerBounds(value)) => data_window = Some(value),
                (name::DISPLAY_WINDOW, IntegerBounds(value)) => display_window = Some(value),
                (name::LINE_ORDER, LineOrder(value)) => line_order = Some(value),
                (name::PIXEL_ASPECT, F32(value)) => pixel_aspect = Some(value),
                (name::WINDOW_CENTER, FloatVec2(value)) => screen_window_center = Some(value),
                (name::WINDOW_WIDTH, F32(value)) => screen_window_width = Some(value),

                _ if is_required => return Err(Error::invalid(format!("type of attribute `{}`", attribute_name))),

                (_, value) => insert_or_replace(&mut attributes, attribute_name, value),
            }
        }

        let channels = channels.ok_or_else(|| missing_attribute("channels"))?;

        Ok(Header {
            display_window: display_window.ok_or_else(|| missing_attribute("display window"))?,
            data_window: data_window.ok_or_else(|| missing_attribute("data window"))?,
            compression: compression.ok_or_else(|| missing_attribute("compression"))?,
            line_order: line_order.unwrap_or(LineOrder::Increasing),
            pixel_aspect: pixel_aspect.unwrap_or(1.0),
            screen_window_center: screen_window_center.unwrap_or(Vec2(0.0, 0.0)),
            screen_window_width: screen_window_width.unwrap_or(1.0),
            channels: channels.list,
            attributes,
        })
    }

    /// Without validation, write this instance to the byte stream.
    pub fn write(&self, write: &mut impl Write) -> UnitResult {
        use self::standard_names::*;
        use crate::meta::attribute::AttributeValue as Value;

        let required = [
            (CHANNELS, Value::ChannelList(self.channel_list())),
            (COMPRESSION, Value::Compression(self.compression)),
            (DATA_WINDOW, Value::IntegerBounds(self.data_window)),
            (DISPLAY_WINDOW, Value::IntegerBounds(self.display_window)),
            (LINE_ORDER, Value::LineOrder(self.line_order)),
            (PIXEL_ASPECT, Value::F32(self.pixel_aspect)),
            (WINDOW_CENTER, Value::FloatVec2(self.screen_window_center)),
            (WINDOW_WIDTH, Value::F32(self.screen_window_width)),
        ];

        for (name, value) in required.iter() {
            attribute::write(name, value, write)?;
        }

        for (name, value) in &self.attributes {
            attribute::write(name.bytes(), value, write)?;
        }

        sequence_end::write(write)
    }
}


fn insert_or_replace(attributes: &mut Vec<(Text, AttributeValue)>, name: Text, value: AttributeValue) {
    match attributes.iter_mut().find(|(existing, _)| *existing == name) {
        Some((_, existing)) => *existing = value,
        None => attributes.push((name, value)),
    }
}


impl<'h> Iterator for ChannelListIterator<'h> {
    type Item = (&'h Text, &'h Channel);

    fn next(&mut self) -> Option<Self::Item> {
        if self.current == self.end {
            return None;
        }

        let (name, channel) = &self.channels[self.current];
        self.current += 1;
        Some((name, channel))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.end - self.current;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for ChannelListIterator<'_> {}
impl std::iter::FusedIterator for ChannelListIterator<'_> {}


#[cfg(test)]
mod test {
    use super::*;
    use crate::meta::MetaData;

    fn four_by_four() -> Header {
        Header::from_dimensions((4, 4))
    }

    #[test]
    fn channel_lookup(){
        let mut header = four_by_four();
        let channel = Channel::detailed(SampleType::F16, (2, 1), true);

        header.insert_channel("X", channel).unwrap();
        assert_eq!(header.channel("X"), Some(&channel));
        assert_eq!(header.channel("Z"), None);
    }

    #[test]
    fn channel_overwrite_keeps_position(){
        let mut header = four_by_four();
        header.insert_channel("A", Channel::new(SampleType::F16)).unwrap();
        header.insert_channel("B", Channel::new(SampleType::F16)).unwrap();
        header.insert_channel("A", Channel::new(SampleType::U32)).unwrap();

        assert_eq!(header.channel("A").unwrap().sample_type, SampleType::U32);
        assert_eq!(header.channels().len(), 2);
        assert_eq!(header.channels().next().unwrap().0, &Text::new("A").unwrap());
    }

    #[test]
    fn names_beyond_latin1_are_rejected(){
        let mut header = four_by_four();
        let result = header.insert_channel("Z\u{2202}", Channel::new(SampleType::F32));
        assert!(matches!(result, Err(Error::Invalid(_))));

        assert!(four_by_four().with_channel("\u{03bb}", Channel::new(SampleType::F16)).is_err());
        assert!(header.insert_attribute("\u{03bb}", AttributeValue::I32(1)).is_err());
        assert_eq!(header.channels().len(), 0);

        header.insert_channel("\u{00e9}", Channel::new(SampleType::F32)).unwrap();
        assert!(header.channel("\u{00e9}").is_some());
    }

    #[test]
    fn utf8_channel_names_can_be_found(){
        // written by a library that stores names as utf-8
        let mut header = four_by_four();
        let name = Text::from_bytes_unchecked(SmallVec::from_slice("\u{03bb}".as_bytes()));
        header.channels.push((name, Channel::new(SampleType::F16)));

        assert!(header.channel("\u{03bb}").is_some());
        assert!(header.channel("l").is_none());
    }

    #[test]
    fn iterator_exhaustion(){
        let header = four_by_four()
            .with_channel("C", Channel::new(SampleType::F32)).unwrap()
            .with_channel("A", Channel::new(SampleType::F32)).unwrap()
            .with_channel("B", Channel::new(SampleType::F32)).unwrap();

        let mut iterator = header.channels();
        let names: Vec<String> = iterator.by_ref().map(|(name, _)| name.to_string()).collect();
        assert_eq!(names, vec!["C", "A", "B"]);

        assert!(iterator.next().is_none());
        assert!(iterator.next().is_none());

        // a fresh iterator starts over
        assert_eq!(header.channels().count(), 3);
    }

    #[test]
    fn optional_attributes(){
        let mut header = four_by_four();
        assert!(!header.has_environment_map());
        assert!(!header.has_multi_view());
        assert!(header.multi_view().is_none());

        header.set_environment_map(EnvironmentMap::Cube);
        header.set_multi_view(vec![Text::new("left").unwrap(), Text::new("right").unwrap()]);

        assert_eq!(header.environment_map(), Some(EnvironmentMap::Cube));
        assert_eq!(header.multi_view().unwrap().len(), 2);

        header.erase_attribute("envmap").unwrap();
        header.erase_attribute("envmap").unwrap();
        assert!(!header.has_environment_map());

        assert!(header.erase_attribute("dataWindow").is_err());
        assert!(header.insert_attribute("channels", AttributeValue::I32(3)).is_err());

        header.insert_attribute("owner", AttributeValue::Text(Text::new("me").unwrap())).unwrap();
        assert_eq!(header.attribute("owner").unwrap().to_text().unwrap(), &Text::new("me").unwrap());
    }

    #[test]
    fn validation(){
        assert!(four_by_four().validate().is_err(), "no channels");

        let header = four_by_four().with_channel("Y", Channel::new(SampleType::F32)).unwrap();
        assert!(header.validate().is_ok());

        let mut skewed = header.clone();
        skewed.pixel_aspect = 0.0;
        assert!(skewed.validate().is_err());

        let subsampled = four_by_four().with_channel("C", Channel::detailed(SampleType::F16, (3, 1), false)).unwrap();
        assert!(subsampled.validate().is_err());
    }

    #[test]
    fn serialization_keeps_everything(){
        let mut header = Header::new(
            IntegerBounds::new((-3, -3), (10, 10)),
            IntegerBounds::new((2, -1), (4, 6)),
            1.5, Vec2(0.5, -0.5), 2.0,
            LineOrder::Decreasing, Compression::RLE,
        );

        header.insert_channel("R", Channel::new(SampleType::F16)).unwrap();
        header.insert_channel("G", Channel::new(SampleType::F32)).unwrap();
        header.set_multi_view(vec![Text::new("left").unwrap()]);

        let mut bytes = Vec::new();
        MetaData::write_validating(&header, &mut bytes).unwrap();

        let meta = MetaData::read_from_buffered_peekable(&mut PeekRead::new(bytes.as_slice())).unwrap();
        let decoded = meta.header;

        assert_eq!(decoded.display_window, header.display_window);
        assert_eq!(decoded.data_window, header.data_window);
        assert_eq!(decoded.line_order, LineOrder::Decreasing);
        assert_eq!(decoded.compression, Compression::RLE);
        assert_eq!(decoded.pixel_aspect, 1.5);
        assert_eq!(decoded.screen_window_center, Vec2(0.5, -0.5));
        assert_eq!(decoded.multi_view(), header.multi_view());

        // the file stores channels sorted by name
        let names: Vec<String> = decoded.channels().map(|(name, _)| name.to_string()).collect();
        assert_eq!(names, vec!["G", "R"]);
        assert_eq!(decoded.channel("R"), header.channel("R"));
    }
}
