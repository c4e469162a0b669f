use thiserror::Error;

/// Which half of a payload type's codec pair a lookup was for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecRole {
    Serializer,
    Deserializer,
}

impl std::fmt::Display for CodecRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Serializer => f.write_str("serializer"),
            Self::Deserializer => f.write_str("deserializer"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Callable invoked before a function was assigned")]
    NotAssigned,

    #[error("Type mismatch: callable holds {found}, caller expected {expected}")]
    TypeMismatch { expected: String, found: String },

    #[error("Arity mismatch: expected {expected} arguments, got {found}")]
    ArityMismatch { expected: usize, found: usize },

    #[error("Argument {index} cannot be converted to {expected}")]
    ArgumentConversion { index: usize, expected: &'static str },

    #[error("No {role} registered for payload type {type_name}")]
    UnregisteredType {
        role: CodecRole,
        type_name: &'static str,
    },

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("{0}")]
    Custom(String),
}

impl Error {
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }

    pub fn codec(msg: impl std::fmt::Display) -> Self {
        Self::Codec(msg.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
