
//! Sinks of bytes for writing files.

use crate::error::{Error, Result, UnitResult, u64_to_usize};
use super::WriteCallbacks;


/// A blocking byte sink with its own cursor.
/// The cursor is only moved by successful operations.
pub trait OutputStream {

    /// Write all bytes of the buffer.
    fn write(&mut self, bytes: &[u8]) -> UnitResult;

    /// The current byte position.
    fn tell(&self) -> u64;

    /// Move to the absolute byte position.
    fn seek(&mut self, position: u64) -> UnitResult;
}

impl<S: OutputStream + ?Sized> OutputStream for Box<S> {
    fn write(&mut self, bytes: &[u8]) -> UnitResult { (**self).write(bytes) }
    fn tell(&self) -> u64 { (**self).tell() }
    fn seek(&mut self, position: u64) -> UnitResult { (**self).seek(position) }
}


/// Writes to caller-supplied callbacks.
/// Never asks the callbacks for their position.
#[derive(Debug)]
pub struct CallbackOutputStream<C> {
    callbacks: C,
    position: u64,
}

impl<C: WriteCallbacks> CallbackOutputStream<C> {

    /// Wrap the callbacks, seeking to the start
    /// so that the sink and this stream agree on the position.
    pub fn new(callbacks: C) -> Result<Self> {
        let mut stream = CallbackOutputStream { callbacks, position: 0 };
        stream.seek(0)?;
        Ok(stream)
    }

    /// Return the callbacks.
    pub fn into_inner(self) -> C {
        self.callbacks
    }
}

impl<C: WriteCallbacks> OutputStream for CallbackOutputStream<C> {
    fn write(&mut self, bytes: &[u8]) -> UnitResult {
        self.callbacks.write(bytes)
            .map_err(|error| error.into_error("error writing data"))?;

        self.position += bytes.len() as u64;
        Ok(())
    }

    fn tell(&self) -> u64 {
        self.position
    }

    fn seek(&mut self, position: u64) -> UnitResult {
        tracing::trace!(position, "seeking output callbacks");

        self.callbacks.seek(position)
            .map_err(|error| error.into_error("error seeking in output"))?;

        self.position = position;
        Ok(())
    }
}


/// Writes into a growable byte vector.
/// Seeking beyond the end and writing there fills the gap with zeroes.
#[derive(Debug, Clone, Default)]
pub struct MemoryOutputStream {
    bytes: Vec<u8>,
    position: usize,
}

impl MemoryOutputStream {

    /// Start with no bytes.
    pub fn new() -> Self {
        Self::default()
    }

    /// The bytes written so far.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Return the bytes written so far.
    pub fn into_inner(self) -> Vec<u8> {
        self.bytes
    }
}

impl OutputStream for MemoryOutputStream {
    fn write(&mut self, bytes: &[u8]) -> UnitResult {
        let end = self.position.checked_add(bytes.len())
            .ok_or_else(|| Error::invalid("write position overflows"))?;

        if end > self.bytes.len() {
            self.bytes.try_reserve(end - self.bytes.len())
                .map_err(|_| Error::invalid("memory stream cannot grow to the write position"))?;

            self.bytes.resize(end, 0);
        }

        self.bytes[self.position .. end].copy_from_slice(bytes);
        self.position = end;
        Ok(())
    }

    fn tell(&self) -> u64 {
        self.position as u64
    }

    fn seek(&mut self, position: u64) -> UnitResult {
        self.position = u64_to_usize(position, "seek position")?;
        Ok(())
    }
}

impl<S: OutputStream + ?Sized> OutputStream for &mut S {
    fn write(&mut self, bytes: &[u8]) -> UnitResult { (**self).write(bytes) }
    fn tell(&self) -> u64 { (**self).tell() }
    fn seek(&mut self, position: u64) -> UnitResult { (**self).seek(position) }
}


#[cfg(test)]
mod test {
    use super::*;
    use crate::error::Error;
    use crate::stream::{FnCallbacks, IoCallbacks};
    use std::io::Cursor;

    #[test]
    fn memory_overwrites_and_extends(){
        let mut stream = MemoryOutputStream::new();
        stream.write(&[1, 2, 3, 4]).unwrap();
        assert_eq!(stream.tell(), 4);

        stream.seek(2).unwrap();
        stream.write(&[9]).unwrap();
        assert_eq!(stream.tell(), 3);

        stream.seek(6).unwrap();
        stream.write(&[7]).unwrap();
        assert_eq!(stream.into_inner(), vec![1, 2, 9, 4, 0, 0, 7]);
    }

    #[test]
    fn memory_rejects_unreachable_positions(){
        let mut stream = MemoryOutputStream::new();
        stream.write(&[1, 2]).unwrap();

        stream.seek(usize::MAX as u64).unwrap();
        assert!(matches!(stream.write(&[1, 2, 3]), Err(Error::Invalid(_))));
        assert_eq!(stream.tell(), usize::MAX as u64);

        stream.seek(usize::MAX as u64 / 2 + 1).unwrap();
        assert!(matches!(stream.write(&[1]), Err(Error::Invalid(_))));

        stream.seek(2).unwrap();
        stream.write(&[3]).unwrap();
        assert_eq!(stream.into_inner(), vec![1, 2, 3]);
    }

    #[test]
    fn callback_cursor_counts_accepted_bytes(){
        let mut stream = CallbackOutputStream::new(IoCallbacks(Cursor::new(Vec::new()))).unwrap();
        stream.write(b"abc").unwrap();
        stream.write(b"de").unwrap();
        assert_eq!(stream.tell(), 5);

        stream.seek(1).unwrap();
        assert_eq!(stream.tell(), 1);
        stream.write(b"X").unwrap();

        let IoCallbacks(cursor) = stream.into_inner();
        assert_eq!(cursor.into_inner(), b"aXcde".to_vec());
    }

    #[test]
    fn callback_write_failure(){
        let callbacks = FnCallbacks::new(
            |bytes: &[u8], error: &mut i32| if bytes.is_empty() { 0 } else { *error = 28; 1 },
            |_position: u64, _error: &mut i32| 0,
        );

        let mut stream = CallbackOutputStream::new(callbacks).unwrap();
        stream.write(&[]).unwrap();

        let error = stream.write(&[1]).unwrap_err();
        assert_eq!(error.os_error_code(), Some(28));
        assert_eq!(stream.tell(), 0);

        let callbacks = FnCallbacks::new(
            |_bytes: &[u8], _error: &mut i32| 0,
            |position: u64, _error: &mut i32| if position == 0 { 0 } else { -1 },
        );

        let mut stream = CallbackOutputStream::new(callbacks).unwrap();
        let error = stream.seek(3).unwrap_err();
        assert!(matches!(error, Error::Stream(ref message) if message == "error seeking in output"));
    }
}
