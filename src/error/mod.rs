use std::result;
use std::io;
use std::fmt;
use std::error::Error;

#[derive(Debug)]
pub enum HoardError {
   Io(io::Error),
   Protocol(&'static str),
}

pub type HoardResult<T> = result::Result<T, HoardError>;

impl fmt::Display for HoardError {
   fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
      match *self {
         HoardError::Io(ref err) => err.fmt(f),
         HoardError::Protocol(reason) => write!(f, "protocol violation: {}", reason),
      }
   }
}

impl Error for HoardError {
   fn source(&self) -> Option<&(dyn Error + 'static)> {
      match *self {
         HoardError::Io(ref err) => Some(err),
         HoardError::Protocol(_) => None,
      }
   }
}

impl From<io::Error> for HoardError {
   fn from(err: io::Error) -> HoardError {
      HoardError::Io(err)
   }
}
