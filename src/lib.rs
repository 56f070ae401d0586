
//! Read and write OpenEXR scan line files through caller-supplied streams.
//!
//! Bytes flow through streams, which are backed either by callbacks of the caller
//! or by memory. Pixels flow through frame buffers, which describe where the samples of
//! each channel are located in the memory of the caller.
//! A file handle connects both: it reads or writes the header on creation,
//! and then transfers ranges of scan lines between the file and a bound frame buffer.
//!
//! ```no_run
//! use exr_bridge::prelude::*;
//!
//! let mut pixels = vec![0.0_f32; 64 * 64];
//! let mut file = InputFile::from_path("image.exr").unwrap();
//!
//! let mut frame_buffer = FrameBuffer::new();
//! frame_buffer.insert_interleaved(&["Y"], &mut pixels, 64, file.header().data_origin()).unwrap();
//!
//! let mut reader = file.set_frame_buffer(frame_buffer).unwrap();
//! reader.read_pixels(0, 63).unwrap();
//! ```

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]


pub mod io;
pub mod math;
pub mod error;
pub mod stream;
pub mod meta;
pub mod compression;
pub mod frame_buffer;
pub mod block;
pub mod threads;
pub mod file;


pub mod prelude {
    // main exports
    pub use crate::file::{InputFile, OutputFile, ScanlineReader, ScanlineWriter};
    pub use crate::frame_buffer::{FrameBuffer, Slice, MemoryId};
    pub use crate::meta::header::{Header, ChannelListIterator};
    pub use crate::threads::{set_global_thread_count, WorkerPool};

    // streams
    pub use crate::stream::{
        InputStream, OutputStream,
        CallbackInputStream, CallbackOutputStream,
        MemoryInputStream, MemoryOutputStream,
        ReadCallbacks, WriteCallbacks, FnCallbacks, IoCallbacks,
        CallbackError, CallbackResult,
    };

    // secondary data types
    pub use crate::meta::attribute::{
        Channel, SampleType, LineOrder, EnvironmentMap, IntegerBounds, Text, AttributeValue,
    };

    pub use crate::compression::Compression;
    pub use crate::math::Vec2;
    pub use crate::error::{self, Error};

    // re-export external stuff
    pub use half::f16;
}
