use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    #[error("unknown state: {name}")]
    UnknownState { name: String },

    #[error("a state named '{name}' already exists")]
    DuplicateName { name: String },

    #[error("state handle at index {index} is no longer valid")]
    InvalidHandle { index: usize },

    #[error("the state collection has been modified; this cursor is invalid")]
    CollectionModified,

    #[error("state cursor is not positioned on a state")]
    CursorOutOfRange,

    #[error("slot index {index} is out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("invalid value: {message}")]
    InvalidValue { message: String },

    #[cfg(feature = "json")]
    #[error("failed to parse mixer JSON: {message}")]
    JsonParse { message: String },
}

impl Error {
    /// Reports a caller-facing failure on the diagnostic channel and hands it back.
    pub(crate) fn reported(self, operation: &str) -> Self {
        log::error!("{operation}: {self}");
        self
    }
}
