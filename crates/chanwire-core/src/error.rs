//! Shared error type across chanwire crates.

use thiserror::Error;

use crate::message::Side;

/// Stable error codes (used in log fields, metrics labels and test vectors).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// A field could not be bound for access.
    Access,
    /// A field's wire type is unknown or contradicts its storage.
    MarshalSpec,
    /// Encode of an unregistered type, or instantiation failure.
    BadMessage,
    /// Inbound id has no registered type.
    UnknownPacket,
    /// Message received on the wrong side.
    WrongSide,
    /// Truncated or otherwise undecodable payload.
    Malformed,
    /// Channel name rejected.
    InvalidChannel,
    /// Configuration rejected.
    Config,
    /// Internal error.
    Internal,
}

impl ErrorCode {
    /// String representation used in logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Access => "ACCESS",
            ErrorCode::MarshalSpec => "MARSHAL_SPEC",
            ErrorCode::BadMessage => "BAD_MESSAGE",
            ErrorCode::UnknownPacket => "UNKNOWN_PACKET",
            ErrorCode::WrongSide => "WRONG_SIDE",
            ErrorCode::Malformed => "MALFORMED",
            ErrorCode::InvalidChannel => "INVALID_CHANNEL",
            ErrorCode::Config => "CONFIG",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, ChanwireError>;

/// Unified error type used by core and host.
#[derive(Debug, Error)]
pub enum ChanwireError {
    #[error("cannot access field {message}.{field}: {reason}")]
    Access {
        message: &'static str,
        field: &'static str,
        reason: String,
    },
    #[error("bad wire spec for {message}.{field}: {reason}")]
    MarshalSpec {
        message: &'static str,
        field: &'static str,
        reason: String,
    },
    #[error("bad message: {0}")]
    BadMessage(String),
    #[error("unknown packet id {id} on channel {channel}")]
    UnknownPacket { channel: String, id: u8 },
    #[error("cannot receive {message} on side {actual} (declared {expected})")]
    WrongSide {
        message: &'static str,
        expected: Side,
        actual: Side,
    },
    #[error("malformed packet: {0}")]
    Malformed(String),
    #[error("invalid channel name: {0}")]
    InvalidChannel(String),
    #[error("config: {0}")]
    Config(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl ChanwireError {
    /// Map to a stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            ChanwireError::Access { .. } => ErrorCode::Access,
            ChanwireError::MarshalSpec { .. } => ErrorCode::MarshalSpec,
            ChanwireError::BadMessage(_) => ErrorCode::BadMessage,
            ChanwireError::UnknownPacket { .. } => ErrorCode::UnknownPacket,
            ChanwireError::WrongSide { .. } => ErrorCode::WrongSide,
            ChanwireError::Malformed(_) => ErrorCode::Malformed,
            ChanwireError::InvalidChannel(_) => ErrorCode::InvalidChannel,
            ChanwireError::Config(_) => ErrorCode::Config,
            ChanwireError::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Raised while registering a message type; fatal to that type only.
    pub fn is_registration_error(&self) -> bool {
        matches!(
            self,
            ChanwireError::Access { .. } | ChanwireError::MarshalSpec { .. }
        )
    }

    /// Scoped to a single packet; the channel stays usable.
    pub fn is_packet_error(&self) -> bool {
        matches!(
            self,
            ChanwireError::BadMessage(_)
                | ChanwireError::UnknownPacket { .. }
                | ChanwireError::WrongSide { .. }
                | ChanwireError::Malformed(_)
        )
    }

    pub(crate) fn truncated(what: &str, need: usize, have: usize) -> Self {
        ChanwireError::Malformed(format!("{what}: need {need} bytes, have {have}"))
    }
}
