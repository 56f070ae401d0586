
//! Open files for reading or writing scan lines.
//!
//! A file is opened with its header, after which a frame buffer is bound
//! to read pixels into, or to write pixels from. Pixel transfers can fail
//! individually without making the file unusable.

pub mod input;
pub mod output;

pub use self::input::{InputFile, ScanlineReader};
pub use self::output::{OutputFile, ScanlineWriter};
