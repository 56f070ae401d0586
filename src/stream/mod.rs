
//! Adapters that turn caller-supplied byte sources and sinks
//! into the blocking, cursor-tracked streams the file handles read and write.
//!
//! A caller provides its input and output as callbacks. Each callback reports
//! a status code: `0` for success, `1` for a failure of the environment, in which case
//! the platform error code is written to the error slot, and any other value for a failure
//! without further information. Use `FnCallbacks` to plug in raw functions following this
//! convention, `IoCallbacks` to plug in any `std::io` type,
//! or implement `ReadCallbacks` and `WriteCallbacks` directly.

pub mod input;
pub mod output;

pub use self::input::{InputStream, CallbackInputStream, MemoryInputStream};
pub use self::output::{OutputStream, CallbackOutputStream, MemoryOutputStream};

use std::io::{Read, Write, Seek, SeekFrom};


/// Status code of a successful callback.
pub const STATUS_SUCCESS: i32 = 0;

/// Status code of a callback that failed because of the environment.
/// The callback has written the platform error code to its error slot.
pub const STATUS_ENVIRONMENT_ERROR: i32 = 1;

/// Status code used by `IoCallbacks` for errors without a platform error code.
pub const STATUS_UNSPECIFIED_ERROR: i32 = 2;

/// The outcome of a single callback invocation.
pub type CallbackResult = std::result::Result<(), CallbackError>;

/// How a callback failed.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum CallbackError {

    /// The environment failed, for example a system call.
    /// Contains the platform error code.
    Environment(i32),

    /// The callback failed for an unknown reason.
    /// Contains the status code the callback returned.
    Unspecified(i32),
}

impl CallbackError {

    /// Interpret the status code and error slot of a raw callback.
    pub fn from_status(status: i32, error_code: i32) -> CallbackResult {
        match status {
            STATUS_SUCCESS => Ok(()),
            STATUS_ENVIRONMENT_ERROR => Err(CallbackError::Environment(error_code)),
            other => Err(CallbackError::Unspecified(other)),
        }
    }

    /// The status code and error slot value that represent this outcome.
    pub fn to_status(result: CallbackResult) -> (i32, i32) {
        match result {
            Ok(()) => (STATUS_SUCCESS, 0),
            Err(CallbackError::Environment(code)) => (STATUS_ENVIRONMENT_ERROR, code),
            Err(CallbackError::Unspecified(status)) => (status, 0),
        }
    }

    /// Convert to the error of this crate.
    /// Environment failures keep their platform code,
    /// all other failures are described by the message.
    pub(crate) fn into_error(self, message: &'static str) -> crate::error::Error {
        match self {
            CallbackError::Environment(code) => crate::error::Error::Io(std::io::Error::from_raw_os_error(code)),
            CallbackError::Unspecified(_) => crate::error::Error::stream(message),
        }
    }
}


/// The capability to pull bytes from a caller-owned source.
pub trait ReadCallbacks {

    /// Fill the whole buffer with the next bytes of the source.
    fn read(&mut self, buffer: &mut [u8]) -> CallbackResult;

    /// Move the source to the absolute byte position.
    fn seek(&mut self, position: u64) -> CallbackResult;
}

/// The capability to push bytes into a caller-owned sink.
pub trait WriteCallbacks {

    /// Write all bytes of the buffer to the sink.
    fn write(&mut self, buffer: &[u8]) -> CallbackResult;

    /// Move the sink to the absolute byte position.
    fn seek(&mut self, position: u64) -> CallbackResult;
}


/// Callbacks made of plain functions that report status codes,
/// using an error slot for the platform error code.
///
/// Use `FnCallbacks::new(transfer, seek)` where `transfer`
/// is either a read function `FnMut(&mut [u8], &mut i32) -> i32`
/// or a write function `FnMut(&[u8], &mut i32) -> i32`,
/// and `seek` is `FnMut(u64, &mut i32) -> i32`.
/// Any context the functions need is captured by the closures.
#[derive(Debug, Clone)]
pub struct FnCallbacks<T, S> {
    transfer: T,
    seek: S,
}

impl<T, S> FnCallbacks<T, S> {

    /// Combine a read or write function with a seek function.
    pub fn new(transfer: T, seek: S) -> Self {
        Self { transfer, seek }
    }
}

fn call_with_error_slot(function: impl FnOnce(&mut i32) -> i32) -> CallbackResult {
    let mut error_code = 0;
    let status = function(&mut error_code);
    CallbackError::from_status(status, error_code)
}

impl<T, S> ReadCallbacks for FnCallbacks<T, S>
    where T: FnMut(&mut [u8], &mut i32) -> i32, S: FnMut(u64, &mut i32) -> i32
{
    fn read(&mut self, buffer: &mut [u8]) -> CallbackResult {
        call_with_error_slot(|error| (self.transfer)(buffer, error))
    }

    fn seek(&mut self, position: u64) -> CallbackResult {
        call_with_error_slot(|error| (self.seek)(position, error))
    }
}

impl<T, S> WriteCallbacks for FnCallbacks<T, S>
    where T: FnMut(&[u8], &mut i32) -> i32, S: FnMut(u64, &mut i32) -> i32
{
    fn write(&mut self, buffer: &[u8]) -> CallbackResult {
        call_with_error_slot(|error| (self.transfer)(buffer, error))
    }

    fn seek(&mut self, position: u64) -> CallbackResult {
        call_with_error_slot(|error| (self.seek)(position, error))
    }
}


/// Callbacks backed by a `std::io` reader or writer, such as a file or a `Cursor`.
/// Errors with an operating system code become environment errors.
#[derive(Debug)]
pub struct IoCallbacks<T>(pub T);

fn io_status(result: std::io::Result<()>) -> CallbackResult {
    result.map_err(|error| match error.raw_os_error() {
        Some(code) => CallbackError::Environment(code),
        None => {
            tracing::debug!("stream callback failed: {}", error);
            CallbackError::Unspecified(STATUS_UNSPECIFIED_ERROR)
        }
    })
}

impl<T: Read + Seek> ReadCallbacks for IoCallbacks<T> {
    fn read(&mut self, buffer: &mut [u8]) -> CallbackResult {
        io_status(self.0.read_exact(buffer))
    }

    fn seek(&mut self, position: u64) -> CallbackResult {
        io_status(self.0.seek(SeekFrom::Start(position)).map(|_| ()))
    }
}

impl<T: Write + Seek> WriteCallbacks for IoCallbacks<T> {
    fn write(&mut self, buffer: &[u8]) -> CallbackResult {
        io_status(self.0.write_all(buffer))
    }

    fn seek(&mut self, position: u64) -> CallbackResult {
        io_status(self.0.seek(SeekFrom::Start(position)).map(|_| ()))
    }
}

impl<C: ReadCallbacks + ?Sized> ReadCallbacks for &mut C {
    fn read(&mut self, buffer: &mut [u8]) -> CallbackResult { (**self).read(buffer) }
    fn seek(&mut self, position: u64) -> CallbackResult { ReadCallbacks::seek(&mut **self, position) }
}

impl<C: WriteCallbacks + ?Sized> WriteCallbacks for &mut C {
    fn write(&mut self, buffer: &[u8]) -> CallbackResult { (**self).write(buffer) }
    fn seek(&mut self, position: u64) -> CallbackResult { WriteCallbacks::seek(&mut **self, position) }
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn status_codes(){
        assert_eq!(CallbackError::from_status(0, 99), Ok(()));
        assert_eq!(CallbackError::from_status(1, 5), Err(CallbackError::Environment(5)));
        assert_eq!(CallbackError::from_status(7, 5), Err(CallbackError::Unspecified(7)));

        assert_eq!(CallbackError::to_status(Err(CallbackError::Environment(5))), (1, 5));
        assert_eq!(CallbackError::to_status(Ok(())), (0, 0));
    }

    #[test]
    fn environment_code_reaches_error(){
        let error = CallbackError::Environment(2).into_error("error reading from input");
        assert_eq!(error.os_error_code(), Some(2));

        let error = CallbackError::Unspecified(9).into_error("error reading from input");
        assert_eq!(error.to_string(), "stream failure: error reading from input");
    }
}
