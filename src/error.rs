
//! Error type definitions.

use std::borrow::Cow;
use std::io::ErrorKind;
pub use std::io::Error as IoError;
pub use std::io::Result as IoResult;
use std::convert::TryFrom;
use std::error;
use std::fmt;

/// A result that may contain an exr error.
pub type Result<T> = std::result::Result<T, Error>;

/// A result that, if ok, contains nothing, and otherwise contains an exr error.
pub type UnitResult = Result<()>;


/// An error that may happen while reading or writing an exr file,
/// or while talking to the caller-supplied streams.
/// Distinguishes between three types of errors:
/// unsupported content, invalid content, and failures of the environment.
/// Also contains a variant for callbacks that failed without further information.
#[derive(Debug)]
pub enum Error {

    /// The contents of the file are not supported by
    /// this specific implementation of open exr,
    /// even though the data may be valid.
    NotSupported(Cow<'static, str>),

    /// The contents of the image are contradicting or insufficient,
    /// or a call violated one of its preconditions.
    Invalid(Cow<'static, str>),

    /// A stream callback reported a failure
    /// but did not provide a platform error code.
    Stream(Cow<'static, str>),

    /// The underlying byte stream could not be read or written successfully.
    /// Callback failures that carry a platform error code end up here,
    /// see `Error::os_error_code`.
    Io(IoError),
}


impl Error {

    /// Create an error of the variant `Invalid`.
    pub(crate) fn invalid(message: impl Into<Cow<'static, str>>) -> Self {
        Error::Invalid(message.into())
    }

    /// Create an error of the variant `NotSupported`.
    pub(crate) fn unsupported(message: impl Into<Cow<'static, str>>) -> Self {
        Error::NotSupported(message.into())
    }

    /// Create an error of the variant `Stream`.
    pub(crate) fn stream(message: impl Into<Cow<'static, str>>) -> Self {
        Error::Stream(message.into())
    }

    /// Whether this error was caused by the environment, for example a failed system call.
    /// All other errors only carry a message.
    pub fn is_environment_error(&self) -> bool {
        matches!(self, Error::Io(_))
    }

    /// The platform error code, if the environment reported one.
    pub fn os_error_code(&self) -> Option<i32> {
        match self {
            Error::Io(error) => error.raw_os_error(),
            _ => None,
        }
    }

    /// Convert into a `std::io::Error` so it can travel through `std::io::Read` and `Write`.
    /// Converting back with `Error::from` restores the original error.
    pub(crate) fn into_io_error(self) -> IoError {
        match self {
            Error::Io(error) => error,
            other => IoError::new(ErrorKind::Other, other),
        }
    }
}

/// Enable using the `?` operator on `std::io::Result`.
impl From<IoError> for Error {
    fn from(error: IoError) -> Self {
        if error.kind() == ErrorKind::UnexpectedEof {
            return Error::invalid("reference to missing bytes");
        }

        let wraps_own_error = error.get_ref()
            .map_or(false, |inner| inner.is::<Error>());

        if wraps_own_error {
            return match error.into_inner().map(|inner| inner.downcast::<Error>()) {
                Some(Ok(own)) => *own,
                _ => Error::stream("stream error"),
            };
        }

        Error::Io(error)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => err.fmt(formatter),
            Error::NotSupported(message) => write!(formatter, "not supported: {}", message),
            Error::Invalid(message) => write!(formatter, "invalid: {}", message),
            Error::Stream(message) => write!(formatter, "stream failure: {}", message),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::Io(ref err) => Some(err),
            _ => None,
        }
    }
}


/// Return error on invalid range.
#[inline]
pub(crate) fn i32_to_usize(value: i32, error_message: &'static str) -> Result<usize> {
    usize::try_from(value).map_err(|_| Error::invalid(error_message))
}

/// Return error on invalid range.
#[inline]
pub(crate) fn u64_to_usize(value: u64, error_message: &'static str) -> Result<usize> {
    usize::try_from(value).map_err(|_| Error::invalid(error_message))
}

/// Return error on invalid range.
#[inline]
pub(crate) fn usize_to_i32(value: usize, error_message: &'static str) -> Result<i32> {
    i32::try_from(value).map_err(|_| Error::invalid(error_message))
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn own_errors_survive_std_io() {
        let io_error = Error::invalid("unexpected end of data").into_io_error();

        match Error::from(io_error) {
            Error::Invalid(message) => assert_eq!(message, "unexpected end of data"),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn platform_codes_are_kept() {
        let error = Error::from(IoError::from_raw_os_error(13));
        assert!(error.is_environment_error());
        assert_eq!(error.os_error_code(), Some(13));

        let error = Error::stream("error reading from input");
        assert!(!error.is_environment_error());
        assert_eq!(error.os_error_code(), None);
    }

    #[test]
    fn end_of_file_is_invalid_content() {
        let error = Error::from(IoError::from(ErrorKind::UnexpectedEof));
        assert!(matches!(error, Error::Invalid(_)));
    }
}
