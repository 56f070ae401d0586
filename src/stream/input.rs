
//! Sources of bytes for reading files.

use crate::error::{Error, Result, UnitResult, u64_to_usize};
use super::ReadCallbacks;
use std::io::Read;


/// A blocking byte source with its own cursor.
/// The cursor is only moved by successful operations.
pub trait InputStream {

    /// Fill the whole buffer with the next bytes.
    /// Returns whether more data may follow.
    fn read(&mut self, buffer: &mut [u8]) -> Result<bool>;

    /// The current byte position.
    fn tell(&self) -> u64;

    /// Move to the absolute byte position.
    fn seek(&mut self, position: u64) -> UnitResult;

    /// Whether `read_memory_mapped` can return bytes without copying them.
    fn is_memory_mapped(&self) -> bool { false }

    /// Return the next `count` bytes without copying them, and advance the cursor.
    /// Only supported if `is_memory_mapped` returns true.
    fn read_memory_mapped(&mut self, count: usize) -> Result<&[u8]> {
        let _ = count;
        Err(Error::unsupported("memory mapped reading"))
    }

    /// A name for diagnostics.
    fn name(&self) -> &str { "" }
}

impl<S: InputStream + ?Sized> InputStream for Box<S> {
    fn read(&mut self, buffer: &mut [u8]) -> Result<bool> { (**self).read(buffer) }
    fn tell(&self) -> u64 { (**self).tell() }
    fn seek(&mut self, position: u64) -> UnitResult { (**self).seek(position) }
    fn is_memory_mapped(&self) -> bool { (**self).is_memory_mapped() }
    fn read_memory_mapped(&mut self, count: usize) -> Result<&[u8]> { (**self).read_memory_mapped(count) }
    fn name(&self) -> &str { (**self).name() }
}

impl<S: InputStream + ?Sized> InputStream for &mut S {
    fn read(&mut self, buffer: &mut [u8]) -> Result<bool> { (**self).read(buffer) }
    fn tell(&self) -> u64 { (**self).tell() }
    fn seek(&mut self, position: u64) -> UnitResult { (**self).seek(position) }
    fn is_memory_mapped(&self) -> bool { (**self).is_memory_mapped() }
    fn read_memory_mapped(&mut self, count: usize) -> Result<&[u8]> { (**self).read_memory_mapped(count) }
    fn name(&self) -> &str { (**self).name() }
}


/// Reads from caller-supplied callbacks.
/// Never asks the callbacks for their position.
#[derive(Debug)]
pub struct CallbackInputStream<C> {
    callbacks: C,
    position: u64,
}

impl<C: ReadCallbacks> CallbackInputStream<C> {

    /// Wrap the callbacks, seeking to the start
    /// so that the source and this stream agree on the position.
    pub fn new(callbacks: C) -> Result<Self> {
        let mut stream = CallbackInputStream { callbacks, position: 0 };
        stream.seek(0)?;
        Ok(stream)
    }

    /// Return the callbacks.
    pub fn into_inner(self) -> C {
        self.callbacks
    }
}

impl<C: ReadCallbacks> InputStream for CallbackInputStream<C> {
    fn read(&mut self, buffer: &mut [u8]) -> Result<bool> {
        self.callbacks.read(buffer)
            .map_err(|error| error.into_error("error reading from input"))?;

        self.position += buffer.len() as u64;

        // the callbacks do not know whether the source is exhausted
        Ok(true)
    }

    fn tell(&self) -> u64 {
        self.position
    }

    fn seek(&mut self, position: u64) -> UnitResult {
        tracing::trace!(position, "seeking input callbacks");

        self.callbacks.seek(position)
            .map_err(|error| error.into_error("error seeking in input"))?;

        self.position = position;
        Ok(())
    }

    fn name(&self) -> &str {
        "callback input"
    }
}


/// Reads from a caller-owned block of memory.
/// Supports memory mapped reading.
#[derive(Debug, Clone)]
pub struct MemoryInputStream<'d> {
    name: String,
    data: &'d [u8],
    position: usize,
}

impl<'d> MemoryInputStream<'d> {

    /// Read from the specified bytes, starting at the first byte.
    pub fn new(name: impl Into<String>, data: &'d [u8]) -> Self {
        MemoryInputStream { name: name.into(), data, position: 0 }
    }

    /// The byte range `position .. position + count`, if all of it is inside the data.
    fn take(&mut self, count: usize) -> Result<&'d [u8]> {
        let end = self.position.checked_add(count)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| Error::invalid("unexpected end of data"))?;

        let bytes = &self.data[self.position .. end];
        self.position = end;
        Ok(bytes)
    }
}

impl InputStream for MemoryInputStream<'_> {
    fn read(&mut self, buffer: &mut [u8]) -> Result<bool> {
        let bytes = self.take(buffer.len())?;
        buffer.copy_from_slice(bytes);
        Ok(self.position != self.data.len())
    }

    fn tell(&self) -> u64 {
        self.position as u64
    }

    fn seek(&mut self, position: u64) -> UnitResult {
        self.position = u64_to_usize(position, "seek position")?;
        Ok(())
    }

    fn is_memory_mapped(&self) -> bool {
        true
    }

    fn read_memory_mapped(&mut self, count: usize) -> Result<&[u8]> {
        self.take(count)
    }

    fn name(&self) -> &str {
        &self.name
    }
}


/// Use an input stream where a `std::io::Read` is expected.
/// Errors of this crate pass through unchanged.
#[derive(Debug)]
pub struct StreamReader<'s, S: ?Sized> {
    stream: &'s mut S,
}

impl<'s, S: InputStream + ?Sized> StreamReader<'s, S> {

    /// Read from the current position of the stream.
    pub fn new(stream: &'s mut S) -> Self {
        StreamReader { stream }
    }
}

impl<S: InputStream + ?Sized> Read for StreamReader<'_, S> {
    fn read(&mut self, buffer: &mut [u8]) -> std::io::Result<usize> {
        self.stream.read(buffer).map_err(Error::into_io_error)?;
        Ok(buffer.len())
    }
}


#[cfg(test)]
mod test {
    use super::*;
    use crate::stream::{CallbackResult, CallbackError, FnCallbacks, IoCallbacks};
    use std::io::Cursor;

    #[test]
    fn memory_stream_bounds(){
        let data = [1_u8, 2, 3, 4, 5];
        let mut stream = MemoryInputStream::new("five bytes", &data);

        let mut buffer = [0_u8; 3];
        assert!(stream.read(&mut buffer).unwrap());
        assert_eq!(buffer, [1, 2, 3]);
        assert_eq!(stream.tell(), 3);

        // exceeding the end fails and keeps the position
        let error = stream.read(&mut buffer).unwrap_err();
        assert!(matches!(error, Error::Invalid(ref message) if message == "unexpected end of data"));
        assert_eq!(stream.tell(), 3);

        let mut buffer = [0_u8; 2];
        assert!(!stream.read(&mut buffer).unwrap());
        assert_eq!(stream.tell(), 5);
        assert_eq!(stream.read(&mut []).unwrap(), false);
    }

    #[test]
    fn memory_mapped_reads_borrow(){
        let data = [9_u8, 8, 7, 6];
        let mut stream = MemoryInputStream::new("four bytes", &data);
        assert!(stream.is_memory_mapped());

        stream.seek(1).unwrap();
        let bytes = stream.read_memory_mapped(2).unwrap();
        assert_eq!(bytes, &[8, 7]);
        assert_eq!(bytes.as_ptr(), data[1..].as_ptr());
        assert_eq!(stream.tell(), 3);

        assert!(stream.read_memory_mapped(2).is_err());
        assert_eq!(stream.tell(), 3);

        // seeking past the end is allowed, reading there is not
        stream.seek(10).unwrap();
        assert!(stream.read_memory_mapped(0).is_err());
    }

    #[test]
    fn callback_cursor_is_own(){
        let mut seeks = Vec::new();
        let mut reads = 0;

        {
            let callbacks = FnCallbacks::new(
                |buffer: &mut [u8], _error: &mut i32| { reads += 1; buffer.fill(3); 0 },
                |position: u64, _error: &mut i32| { seeks.push(position); 0 },
            );

            let mut stream = CallbackInputStream::new(callbacks).unwrap();
            assert_eq!(stream.tell(), 0);

            let mut buffer = [0_u8; 7];
            assert!(stream.read(&mut buffer).unwrap());
            assert_eq!(buffer, [3; 7]);
            assert_eq!(stream.tell(), 7);

            stream.seek(100).unwrap();
            assert_eq!(stream.tell(), 100);
        }

        assert_eq!(seeks, vec![0, 100]);
        assert_eq!(reads, 1);
    }

    #[test]
    fn callback_failures_keep_cursor(){
        let callbacks = FnCallbacks::new(
            |buffer: &mut [u8], error: &mut i32| {
                if buffer.len() > 4 { *error = 5; 1 } else { 42 }
            },
            |position: u64, _error: &mut i32| if position > 10 { 3 } else { 0 },
        );

        let mut stream = CallbackInputStream::new(callbacks).unwrap();
        stream.seek(2).unwrap();

        let error = stream.read(&mut [0; 8]).unwrap_err();
        assert_eq!(error.os_error_code(), Some(5));
        assert_eq!(stream.tell(), 2);

        let error = stream.read(&mut [0; 2]).unwrap_err();
        assert!(matches!(error, Error::Stream(ref message) if message == "error reading from input"));
        assert_eq!(stream.tell(), 2);

        let error = stream.seek(11).unwrap_err();
        assert!(matches!(error, Error::Stream(ref message) if message == "error seeking in input"));
        assert_eq!(stream.tell(), 2);
    }

    #[test]
    fn construction_fails_if_rewind_fails(){
        #[derive(Debug)]
        struct Unseekable;
        impl ReadCallbacks for Unseekable {
            fn read(&mut self, _: &mut [u8]) -> CallbackResult { Ok(()) }
            fn seek(&mut self, _: u64) -> CallbackResult { Err(CallbackError::Environment(29)) }
        }

        let error = CallbackInputStream::new(Unseekable).unwrap_err();
        assert_eq!(error.os_error_code(), Some(29));
    }

    #[test]
    fn std_reader_through_callbacks(){
        let mut stream = CallbackInputStream::new(IoCallbacks(Cursor::new(vec![1_u8, 2, 3]))).unwrap();

        let mut reader = StreamReader::new(&mut stream);
        let mut buffer = [0_u8; 2];
        reader.read_exact(&mut buffer).unwrap();
        assert_eq!(buffer, [1, 2]);

        // the cursor reports end of file without an os error code
        assert!(matches!(stream.read(&mut [0; 2]), Err(Error::Stream(_))));
        assert_eq!(stream.tell(), 2);
    }
}
