//! Contains error type for handling I/O and Errno errors

use std::error;
use std::fmt;
use std::io;
use std::result;

/// The error type for Rawline errors that can arise from
/// I/O related errors or Errno when using the nix-rust library
/// #[non_exhaustive]
#[derive(Debug)]
pub enum Error {
    /// I/O Error
    Io(io::Error),
    /// Unix Error from syscall
    #[cfg(unix)]
    Errno(nix::Error),
}

pub type Result<T> = result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Error::Io(ref err) => err.fmt(f),
            #[cfg(unix)]
            Error::Errno(ref err) => err.fmt(f),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::Io(ref err) => Some(err),
            #[cfg(unix)]
            Error::Errno(ref err) => Some(err),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

#[cfg(unix)]
impl From<nix::Error> for Error {
    fn from(err: nix::Error) -> Self {
        Self::Errno(err)
    }
}
