//! Error types for trapsink.
//!
//! - [`Error`] - the main error type for all engine operations
//! - [`ErrorStatus`] - the SNMP protocol error-status enumeration (RFC 3416)
//! - Kind enums for authentication, crypto, decode, and OID failures
//!
//! The dispatcher classifies errors into the categories that drive its loop:
//! transient I/O is retried with backoff, fatal I/O terminates `serve`, and
//! everything else (malformed datagrams, security failures, unsupported
//! versions) is logged and dropped without affecting the loop.

use std::net::SocketAddr;

/// Result type alias using the library's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Authentication error kinds (RFC 3414 incoming-message checks).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    /// User not found in the LCD for (engineID, userName).
    NoUser,
    /// HMAC verification failed.
    HmacMismatch,
    /// Authentication parameters have the wrong length.
    WrongMacLength { expected: usize, actual: usize },
    /// Could not locate the auth-params span in the message.
    AuthParamsNotFound,
}

impl std::fmt::Display for AuthErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoUser => write!(f, "user not found"),
            Self::HmacMismatch => write!(f, "HMAC verification failed"),
            Self::WrongMacLength { expected, actual } => {
                write!(f, "wrong MAC length: expected {}, got {}", expected, actual)
            }
            Self::AuthParamsNotFound => write!(f, "could not locate auth params in message"),
        }
    }
}

/// Cryptographic error kinds (privacy decryption/encryption).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoErrorKind {
    /// Privacy key shorter than AES-128 requires.
    InvalidKeyLength { expected: usize, actual: usize },
    /// privParameters must be exactly the 8-byte salt.
    InvalidPrivParamsLength { expected: usize, actual: usize },
    /// Cipher construction or operation failed.
    CipherError,
}

impl std::fmt::Display for CryptoErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidKeyLength { expected, actual } => {
                write!(f, "invalid key length: need {}, got {}", expected, actual)
            }
            Self::InvalidPrivParamsLength { expected, actual } => {
                write!(
                    f,
                    "invalid privParameters length: expected {}, got {}",
                    expected, actual
                )
            }
            Self::CipherError => write!(f, "cipher operation failed"),
        }
    }
}

/// BER decode error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeErrorKind {
    /// Expected a different tag.
    UnexpectedTag { expected: u8, actual: u8 },
    /// Data ended unexpectedly.
    TruncatedData,
    /// Invalid BER length encoding.
    InvalidLength,
    /// Indefinite length not supported.
    IndefiniteLength,
    /// Length field uses too many octets.
    LengthTooLong { octets: usize },
    /// Length exceeds the decoder's maximum.
    LengthExceedsMax { length: usize, max: usize },
    /// Zero-length integer.
    ZeroLengthInteger,
    /// Integer64 content too long.
    Integer64TooLong { length: usize },
    /// Insufficient data for a read.
    InsufficientData { needed: usize, available: usize },
    /// TLV extends past end of data.
    TlvOverflow,
    /// NULL with non-zero length.
    InvalidNull,
    /// Invalid OID encoding.
    InvalidOidEncoding,
    /// IP address content is not 4 bytes.
    InvalidIpAddressLength { length: usize },
    /// Value tag outside the SNMP value space.
    UnknownValueTag(u8),
    /// PDU tag outside the context-specific set (tag 4 is obsolete).
    UnknownPduType(u8),
    /// msgFlags with bits outside 0x07, or Priv without Auth.
    InvalidMsgFlags(u8),
    /// msgID outside 0..=i32::MAX.
    InvalidMsgId(i32),
    /// msgMaxSize below the RFC 3412 minimum of 484 octets.
    MsgMaxSizeTooSmall { value: i32, minimum: i32 },
    /// Security model other than USM (3).
    UnknownSecurityModel(i32),
    /// Engine ID length outside 5..=32 (or empty where required).
    InvalidEngineIdLength { length: usize },
    /// Negative engineBoots.
    InvalidEngineBoots(i32),
    /// Negative engineTime.
    InvalidEngineTime(i32),
    /// userName longer than 32 bytes.
    InvalidUserNameLength { length: usize },
    /// authenticationParameters length other than 0 or 12.
    InvalidAuthParamsLength { length: usize },
    /// privacyParameters length other than 0 or 8.
    InvalidPrivParamsLength { length: usize },
    /// errorStatus outside 0..=18.
    InvalidErrorStatus(i32),
    /// Negative errorIndex.
    InvalidErrorIndex(i32),
    /// Negative nonRepeaters.
    InvalidNonRepeaters(i32),
    /// Negative maxRepetitions.
    InvalidMaxRepetitions(i32),
}

impl std::fmt::Display for DecodeErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnexpectedTag { expected, actual } => {
                write!(f, "expected tag 0x{:02X}, got 0x{:02X}", expected, actual)
            }
            Self::TruncatedData => write!(f, "unexpected end of data"),
            Self::InvalidLength => write!(f, "invalid length encoding"),
            Self::IndefiniteLength => write!(f, "indefinite length encoding not supported"),
            Self::LengthTooLong { octets } => {
                write!(f, "length encoding too long ({} octets)", octets)
            }
            Self::LengthExceedsMax { length, max } => {
                write!(f, "length {} exceeds maximum {}", length, max)
            }
            Self::ZeroLengthInteger => write!(f, "zero-length integer"),
            Self::Integer64TooLong { length } => {
                write!(f, "integer64 too long: {} bytes", length)
            }
            Self::InsufficientData { needed, available } => {
                write!(f, "need {} bytes but only {} remaining", needed, available)
            }
            Self::TlvOverflow => write!(f, "TLV extends past end of data"),
            Self::InvalidNull => write!(f, "NULL with non-zero length"),
            Self::InvalidOidEncoding => write!(f, "invalid OID encoding"),
            Self::InvalidIpAddressLength { length } => {
                write!(f, "IP address must be 4 bytes, got {}", length)
            }
            Self::UnknownValueTag(t) => write!(f, "unknown value tag: 0x{:02X}", t),
            Self::UnknownPduType(t) => write!(f, "unknown PDU type: 0x{:02X}", t),
            Self::InvalidMsgFlags(b) => write!(f, "invalid message flags: 0x{:02X}", b),
            Self::InvalidMsgId(v) => write!(f, "invalid message ID: {}", v),
            Self::MsgMaxSizeTooSmall { value, minimum } => {
                write!(f, "msgMaxSize {} below RFC 3412 minimum {}", value, minimum)
            }
            Self::UnknownSecurityModel(m) => {
                write!(f, "this security model is not implemented: {}", m)
            }
            Self::InvalidEngineIdLength { length } => {
                write!(f, "invalid engine ID length: {}", length)
            }
            Self::InvalidEngineBoots(v) => write!(f, "invalid engine boots: {}", v),
            Self::InvalidEngineTime(v) => write!(f, "invalid engine time: {}", v),
            Self::InvalidUserNameLength { length } => {
                write!(f, "user name too long: {} bytes", length)
            }
            Self::InvalidAuthParamsLength { length } => {
                write!(f, "invalid authenticationParameters length: {}", length)
            }
            Self::InvalidPrivParamsLength { length } => {
                write!(f, "invalid privacyParameters length: {}", length)
            }
            Self::InvalidErrorStatus(v) => write!(f, "invalid error status: {}", v),
            Self::InvalidErrorIndex(v) => write!(f, "invalid error index: {}", v),
            Self::InvalidNonRepeaters(v) => write!(f, "invalid non repeaters: {}", v),
            Self::InvalidMaxRepetitions(v) => write!(f, "invalid max repetitions: {}", v),
        }
    }
}

/// OID validation error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OidErrorKind {
    /// Invalid arc value in a parsed string.
    InvalidArc,
    /// First arc must be 0, 1, or 2.
    InvalidFirstArc(u32),
    /// Second arc too large for the first arc value.
    InvalidSecondArc { first: u32, second: u32 },
    /// OID exceeds the maximum arc count.
    TooManyArcs { count: usize, max: usize },
    /// Subidentifier overflowed u32 during decoding.
    SubidentifierOverflow,
}

impl std::fmt::Display for OidErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidArc => write!(f, "invalid arc value"),
            Self::InvalidFirstArc(v) => write!(f, "first arc must be 0, 1, or 2, got {}", v),
            Self::InvalidSecondArc { first, second } => {
                write!(f, "second arc {} too large for first arc {}", second, first)
            }
            Self::TooManyArcs { count, max } => {
                write!(f, "OID has {} arcs, exceeds maximum {}", count, max)
            }
            Self::SubidentifierOverflow => write!(f, "subidentifier overflow"),
        }
    }
}

/// SNMP protocol error-status codes (RFC 3416 Section 3).
///
/// The 19-value enumeration carried in non-bulk PDUs. Values outside 0..=18
/// are rejected at decode time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorStatus {
    NoError,
    TooBig,
    NoSuchName,
    BadValue,
    ReadOnly,
    GenErr,
    NoAccess,
    WrongType,
    WrongLength,
    WrongEncoding,
    WrongValue,
    NoCreation,
    InconsistentValue,
    ResourceUnavailable,
    CommitFailed,
    UndoFailed,
    AuthorizationError,
    NotWritable,
    InconsistentName,
}

impl ErrorStatus {
    /// Create from the raw status code. Returns `None` outside 0..=18.
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::NoError),
            1 => Some(Self::TooBig),
            2 => Some(Self::NoSuchName),
            3 => Some(Self::BadValue),
            4 => Some(Self::ReadOnly),
            5 => Some(Self::GenErr),
            6 => Some(Self::NoAccess),
            7 => Some(Self::WrongType),
            8 => Some(Self::WrongLength),
            9 => Some(Self::WrongEncoding),
            10 => Some(Self::WrongValue),
            11 => Some(Self::NoCreation),
            12 => Some(Self::InconsistentValue),
            13 => Some(Self::ResourceUnavailable),
            14 => Some(Self::CommitFailed),
            15 => Some(Self::UndoFailed),
            16 => Some(Self::AuthorizationError),
            17 => Some(Self::NotWritable),
            18 => Some(Self::InconsistentName),
            _ => None,
        }
    }

    /// Convert to the raw status code.
    pub fn as_i32(self) -> i32 {
        match self {
            Self::NoError => 0,
            Self::TooBig => 1,
            Self::NoSuchName => 2,
            Self::BadValue => 3,
            Self::ReadOnly => 4,
            Self::GenErr => 5,
            Self::NoAccess => 6,
            Self::WrongType => 7,
            Self::WrongLength => 8,
            Self::WrongEncoding => 9,
            Self::WrongValue => 10,
            Self::NoCreation => 11,
            Self::InconsistentValue => 12,
            Self::ResourceUnavailable => 13,
            Self::CommitFailed => 14,
            Self::UndoFailed => 15,
            Self::AuthorizationError => 16,
            Self::NotWritable => 17,
            Self::InconsistentName => 18,
        }
    }
}

impl std::fmt::Display for ErrorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoError => write!(f, "noError"),
            Self::TooBig => write!(f, "tooBig"),
            Self::NoSuchName => write!(f, "noSuchName"),
            Self::BadValue => write!(f, "badValue"),
            Self::ReadOnly => write!(f, "readOnly"),
            Self::GenErr => write!(f, "genErr"),
            Self::NoAccess => write!(f, "noAccess"),
            Self::WrongType => write!(f, "wrongType"),
            Self::WrongLength => write!(f, "wrongLength"),
            Self::WrongEncoding => write!(f, "wrongEncoding"),
            Self::WrongValue => write!(f, "wrongValue"),
            Self::NoCreation => write!(f, "noCreation"),
            Self::InconsistentValue => write!(f, "inconsistentValue"),
            Self::ResourceUnavailable => write!(f, "resourceUnavailable"),
            Self::CommitFailed => write!(f, "commitFailed"),
            Self::UndoFailed => write!(f, "undoFailed"),
            Self::AuthorizationError => write!(f, "authorizationError"),
            Self::NotWritable => write!(f, "notWritable"),
            Self::InconsistentName => write!(f, "inconsistentName"),
        }
    }
}

/// The main error type for all trapsink operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// I/O error on the packet transport.
    #[error("I/O error: {source}")]
    Io {
        #[source]
        source: std::io::Error,
    },

    /// BER decoding error.
    #[error("decode error at offset {offset}: {kind}")]
    Decode {
        offset: usize,
        kind: DecodeErrorKind,
    },

    /// Message version other than 3.
    #[error("this SNMP version is not implemented: {0}")]
    UnsupportedVersion(i32),

    /// Authoritative engine ID is empty or has no LCD time entry.
    #[error("unknown engine ID")]
    UnknownEngineId { source_addr: Option<SocketAddr> },

    /// Incoming message failed authentication.
    #[error("unauthenticated: {kind}")]
    AuthenticationFailed {
        source_addr: Option<SocketAddr>,
        kind: AuthErrorKind,
    },

    /// Message outside the RFC 3414 time window.
    #[error("not in time window")]
    NotInTimeWindow { source_addr: Option<SocketAddr> },

    /// Privacy decryption failed.
    #[error("decryption failed: {kind}")]
    DecryptionFailed {
        source_addr: Option<SocketAddr>,
        kind: CryptoErrorKind,
    },

    /// Invalid OID.
    #[error("invalid OID: {kind}")]
    InvalidOid { kind: OidErrorKind },

    /// Invalid engine or dispatcher configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Notification receiver callback failure.
    #[error("notification receiver error: {0}")]
    Receiver(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Create a decode error.
    pub fn decode(offset: usize, kind: DecodeErrorKind) -> Self {
        Self::Decode { offset, kind }
    }

    /// Create an authentication error.
    pub fn auth(source_addr: Option<SocketAddr>, kind: AuthErrorKind) -> Self {
        Self::AuthenticationFailed { source_addr, kind }
    }

    /// Create a decryption error.
    pub fn decrypt(source_addr: Option<SocketAddr>, kind: CryptoErrorKind) -> Self {
        Self::DecryptionFailed { source_addr, kind }
    }

    /// Create an invalid OID error.
    pub fn invalid_oid(kind: OidErrorKind) -> Self {
        Self::InvalidOid { kind }
    }

    /// Whether this is one of the USM security failures (unknown engine,
    /// unknown user, MAC mismatch, time window, decryption).
    pub fn is_security_failure(&self) -> bool {
        matches!(
            self,
            Self::UnknownEngineId { .. }
                | Self::AuthenticationFailed { .. }
                | Self::NotInTimeWindow { .. }
                | Self::DecryptionFailed { .. }
        )
    }
}
