use std::{fmt, path::PathBuf};

#[derive(Debug)]
pub enum EngineError {
    /// The `assets/` folder could not be found or was invalid.
    AssetsNotFound { start_dir: PathBuf },
    /// I/O error on a file or directory.
    Io { path: PathBuf, source: std::io::Error },
    /// JSON parse error for a file.
    Json { path: PathBuf, source: serde_json::Error },

    /// Config is syntactically valid but semantically invalid.
    InvalidConfig { path: PathBuf, msg: String },

    /// An outbound command could not be serialized.
    Encode { source: serde_json::Error },
    /// Parameter values must be finite; JSON has no NaN or infinity.
    NonFiniteParam { name: i32 },

    /// A received shader title cannot be used as a file stem.
    InvalidAssetName { title: String },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::AssetsNotFound { start_dir } => {
                write!(f, "Could not locate assets/ starting from {}", start_dir.display())
            }
            EngineError::Io { path, source } => {
                write!(f, "I/O error for {}: {}", path.display(), source)
            }
            EngineError::Json { path, source } => {
                write!(f, "JSON parse error for {}: {}", path.display(), source)
            }
            EngineError::InvalidConfig { path, msg } => {
                write!(f, "Invalid config {}: {}", path.display(), msg)
            }
            EngineError::Encode { source } => {
                write!(f, "Failed to encode outbound command: {}", source)
            }
            EngineError::NonFiniteParam { name } => {
                write!(f, "Parameter {} has a non-finite value", name)
            }
            EngineError::InvalidAssetName { title } => {
                write!(f, "Shader title '{}' is not a usable file name", title)
            }
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Io { source, .. } => Some(source),
            EngineError::Json { source, .. } => Some(source),
            EngineError::Encode { source } => Some(source),
            _ => None,
        }
    }
}

/// Why an inbound frame produced no state change.
///
/// These never reach the host: `protocol::parse_frame` logs them and yields
/// `ParsedPayload::Unrecognized`.
#[derive(Debug)]
pub enum ProtocolError {
    /// JSON parse error, wrong shape, or a missing child in an envelope.
    MalformedEnvelope { msg: String },
    /// A `k2` value that is not four comma-separated floats. Scoped to one element.
    MalformedVectorLiteral { index: i32, text: String },
    /// A well-formed envelope whose `event` value has no handler.
    UnknownEventValue { event: String },
    /// A `/* ... */` shader header that is unterminated, not JSON, or has no `title`.
    MalformedHeader { msg: String },
    /// No grammar matched the frame's leading bytes.
    UnrecognizedFrame,
}

impl ProtocolError {
    pub(crate) fn envelope(msg: impl Into<String>) -> Self {
        ProtocolError::MalformedEnvelope { msg: msg.into() }
    }

    pub(crate) fn header(msg: impl Into<String>) -> Self {
        ProtocolError::MalformedHeader { msg: msg.into() }
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::MalformedEnvelope { msg } => write!(f, "malformed envelope: {}", msg),
            ProtocolError::MalformedVectorLiteral { index, text } => {
                write!(f, "malformed k2 value for {}: '{}'", index, text)
            }
            ProtocolError::UnknownEventValue { event } => write!(f, "unknown event: {}", event),
            ProtocolError::MalformedHeader { msg } => write!(f, "malformed shader header: {}", msg),
            ProtocolError::UnrecognizedFrame => write!(f, "unrecognized frame"),
        }
    }
}

impl std::error::Error for ProtocolError {}
