use crate::bridge::LinkError;
use crate::jvm;
use crate::jvm::class_file::Version;
use crate::util::Offset;
use std::fmt;

#[derive(Debug)]
pub enum Error {
    /// Class bytes could not be loaded (the class gets no output)
    MalformedClass(String),

    /// Class file version outside of the supported window (the class is passed through)
    UnsupportedVersion(Version),

    /// Class carries the marker of a previous translation (the class is passed through)
    AlreadyTranslated,

    /// Stack or local types cannot be determined without guessing
    TypeInference { offset: Offset, message: String },

    /// Instruction with no native translation (`jsr` and `ret`)
    UnsupportedInstruction { offset: Offset, instruction: String },

    /// Method cannot be turned into a `native` stub
    RewriteConflict(String),

    /// Generated units reference bridge symbols the support header does not provide
    RuntimeBridgeLink(LinkError),

    Io(std::io::Error),

    Archive(zip::result::ZipError),

    /// Invalid settings or configuration file
    Config(String),
}

impl Error {
    /// Errors confined to one method, which then stays as bytecode
    pub fn is_method_level(&self) -> bool {
        matches!(
            self,
            Error::TypeInference { .. }
                | Error::UnsupportedInstruction { .. }
                | Error::RewriteConflict(_)
        )
    }

    /// Errors that end the whole build
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::RuntimeBridgeLink(_) | Error::Io(_) | Error::Archive(_) | Error::Config(_)
        )
    }

    pub(crate) fn type_inference(offset: Offset, message: impl Into<String>) -> Error {
        Error::TypeInference {
            offset,
            message: message.into(),
        }
    }

    pub(crate) fn unsupported(offset: Offset, instruction: impl fmt::Debug) -> Error {
        Error::UnsupportedInstruction {
            offset,
            instruction: format!("{:?}", instruction),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::MalformedClass(msg) => write!(f, "malformed class: {}", msg),
            Error::UnsupportedVersion(version) => write!(
                f,
                "unsupported class file version {}.{}",
                version.major_version, version.minor_version
            ),
            Error::AlreadyTranslated => write!(f, "class was already translated"),
            Error::TypeInference { offset, message } => {
                write!(f, "type inference failed at {}: {}", offset, message)
            }
            Error::UnsupportedInstruction {
                offset,
                instruction,
            } => write!(f, "unsupported instruction at {}: {}", offset, instruction),
            Error::RewriteConflict(msg) => write!(f, "cannot make method native: {}", msg),
            Error::RuntimeBridgeLink(err) => write!(f, "runtime bridge link failure: {}", err),
            Error::Io(err) => write!(f, "I/O error: {}", err),
            Error::Archive(err) => write!(f, "archive error: {}", err),
            Error::Config(msg) => write!(f, "configuration error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<jvm::Error> for Error {
    fn from(err: jvm::Error) -> Error {
        match err {
            jvm::Error::Malformed(msg) => Error::MalformedClass(msg),
            jvm::Error::UnsupportedVersion(version) => Error::UnsupportedVersion(version),
            overflow @ jvm::Error::ConstantPoolOverflow { .. } => {
                Error::RewriteConflict(overflow.to_string())
            }
            jvm::Error::IoError(err) => Error::Io(err),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Error {
        Error::Archive(err)
    }
}

impl From<LinkError> for Error {
    fn from(err: LinkError) -> Error {
        Error::RuntimeBridgeLink(err)
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Error {
        Error::Config(err.to_string())
    }
}
