use super::class_file::{Constant, Version};
use std::fmt;
use std::io::ErrorKind;

#[derive(Debug)]
pub enum Error {
    /// Class file bytes are structurally invalid (truncated, bad magic, dangling or mistyped
    /// constant references, bad descriptors, undecodable code)
    Malformed(String),

    /// Major version outside of the supported window
    UnsupportedVersion(Version),

    /// A constant could not be added to a pool that is already full
    ConstantPoolOverflow { constant: Constant, offset: usize },

    /// Failure writing class bytes
    IoError(std::io::Error),
}

impl Error {
    /// Classify an error coming out of a `Deserialize` implementation
    ///
    /// Reading never touches the file system, so every read error means the input is bad.
    pub fn from_read(err: std::io::Error, context: &str) -> Error {
        match err.kind() {
            ErrorKind::UnexpectedEof => Error::Malformed(format!("{}: truncated class file", context)),
            _ => Error::Malformed(format!("{}: {}", context, err)),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Error {
        Error::Malformed(message.into())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Malformed(msg) => write!(f, "malformed class: {}", msg),
            Error::UnsupportedVersion(version) => write!(
                f,
                "unsupported class file version {}.{}",
                version.major_version, version.minor_version
            ),
            Error::ConstantPoolOverflow { constant, offset } => {
                write!(f, "constant pool overflow at {} adding {:?}", offset, constant)
            }
            Error::IoError(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl std::error::Error for Error {}
