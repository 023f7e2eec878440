//! Typed errors raised by the TeX engine.

use std::{io, path::PathBuf};
use thiserror::Error;

/// Failures that abandon the parse of a whole document.
#[derive(Debug, Error)]
pub enum TexError {
    #[error("TeX source {path:?} could not be read")]
    SourceNotFound {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("TeX source {path:?} is not valid UTF-8")]
    NotUtf8 {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("TeX source {path:?} includes itself through `\\input` or `\\include`")]
    IncludeCycle { path: PathBuf },
}

/// Failures to locate an argument of one command invocation.
///
/// These are local to a single field: the metadata extractor catches them and leaves that field unset.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandParseError {
    #[error("parsing command `\\{command}` at offset {offset}: did not detect argument {index}")]
    MissingArgument {
        command: String,
        offset: usize,
        index: usize,
    },
    #[error(
        "parsing command `\\{command}` at offset {offset}: did not find closing bracket for argument {index}"
    )]
    UnbalancedArgument {
        command: String,
        offset: usize,
        index: usize,
    },
    #[error(
        "parsing command `\\{command}` at offset {offset}: did not find whitespace-delimited argument {index}"
    )]
    MissingWhitespaceArgument {
        command: String,
        offset: usize,
        index: usize,
    },
}

impl CommandParseError {
    /// Byte offset in the source where the failing command starts.
    #[must_use]
    pub fn offset(&self) -> usize {
        match self {
            Self::MissingArgument { offset, .. }
            | Self::UnbalancedArgument { offset, .. }
            | Self::MissingWhitespaceArgument { offset, .. } => *offset,
        }
    }
}
