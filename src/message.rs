//! SNMPv3 message format (RFC 3412) and USM security parameters (RFC 3414).
//!
//! ```text
//! SEQUENCE {
//!     INTEGER version (3)
//!     SEQUENCE msgGlobalData {
//!         INTEGER msgID
//!         INTEGER msgMaxSize
//!         OCTET STRING msgFlags (1 byte)
//!         INTEGER msgSecurityModel
//!     }
//!     OCTET STRING msgSecurityParameters (wraps a USM SEQUENCE)
//!     msgData (plaintext ScopedPDU SEQUENCE, or encrypted OCTET STRING)
//! }
//! ```
//!
//! [`Packet::decode`] keeps the exact input bytes (authentication hashes the
//! original message) and records the absolute offset of the
//! `msgAuthenticationParameters` value while decoding, so the USM layer can
//! zero that exact span instead of searching for the digest by substring.

use bytes::Bytes;

use crate::ber::{Decoder, EncodeBuf, tag};
use crate::error::{DecodeErrorKind, Error, Result};
use crate::pdu::ScopedPdu;

/// RFC 3412 minimum msgMaxSize (484 octets).
pub const MSG_MAX_SIZE_MINIMUM: i32 = 484;

/// Length of the HMAC-SHA-1-96 digest carried in authenticationParameters.
pub const AUTH_PARAMS_LEN: usize = 12;

/// Length of the AES privacy salt carried in privacyParameters.
pub const PRIV_PARAMS_LEN: usize = 8;

/// Maximum userName length (RFC 3414 SIZE(0..32)).
pub const MAX_USER_NAME_LEN: usize = 32;

/// Identifier of an SNMP engine: an opaque byte string of 5..=32 bytes.
///
/// Equality is byte-wise. Engine IDs identify the authoritative entity and
/// salt key localization.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct EngineId(Bytes);

impl EngineId {
    /// Create an engine ID, enforcing the 5..=32 byte length range.
    pub fn new(data: impl Into<Bytes>) -> Result<Self> {
        let data = data.into();
        if data.len() < 5 || data.len() > 32 {
            return Err(Error::decode(
                0,
                DecodeErrorKind::InvalidEngineIdLength { length: data.len() },
            ));
        }
        Ok(Self(data))
    }

    /// The raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for EngineId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for EngineId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EngineId(")?;
        for b in self.0.iter() {
            write!(f, "{:02x}", b)?;
        }
        write!(f, ")")
    }
}

impl std::fmt::Display for EngineId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for b in self.0.iter() {
            if !first {
                write!(f, ":")?;
            }
            write!(f, "{:02x}", b)?;
            first = false;
        }
        Ok(())
    }
}

/// SNMPv3 security model identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum SecurityModel {
    /// User-based Security Model (RFC 3414)
    Usm = 3,
}

impl SecurityModel {
    /// Create from the raw value.
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            3 => Some(Self::Usm),
            _ => None,
        }
    }

    /// The raw value.
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

/// SNMPv3 security level, derived from the msgFlags Auth/Priv bits.
///
/// Ordered least to most secure so the USM can compare
/// `level >= AuthNoPriv`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SecurityLevel {
    /// No authentication, no privacy
    NoAuthNoPriv,
    /// Authentication only
    AuthNoPriv,
    /// Authentication and privacy
    AuthPriv,
}

impl SecurityLevel {
    /// Derive from the flag bits. `None` for Priv without Auth.
    pub fn from_flags(flags: u8) -> Option<Self> {
        let auth = flags & 0x01 != 0;
        let privacy = flags & 0x02 != 0;

        match (auth, privacy) {
            (false, false) => Some(Self::NoAuthNoPriv),
            (true, false) => Some(Self::AuthNoPriv),
            (true, true) => Some(Self::AuthPriv),
            (false, true) => None,
        }
    }

    /// The Auth/Priv bits (without the reportable flag).
    pub fn to_flags(self) -> u8 {
        match self {
            Self::NoAuthNoPriv => 0x00,
            Self::AuthNoPriv => 0x01,
            Self::AuthPriv => 0x03,
        }
    }

    /// Whether authentication is required.
    pub fn requires_auth(self) -> bool {
        matches!(self, Self::AuthNoPriv | Self::AuthPriv)
    }

    /// Whether privacy (encryption) is required.
    pub fn requires_priv(self) -> bool {
        matches!(self, Self::AuthPriv)
    }
}

/// Message flags (RFC 3412 Section 6.4): Auth (0x01), Priv (0x02),
/// Reportable (0x04).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MsgFlags {
    /// Security level derived from the Auth/Priv bits.
    pub security_level: SecurityLevel,
    /// Whether a Report PDU may be sent on error.
    pub reportable: bool,
}

impl MsgFlags {
    /// Create new message flags.
    pub fn new(security_level: SecurityLevel, reportable: bool) -> Self {
        Self {
            security_level,
            reportable,
        }
    }

    /// Decode from a flag byte. A byte is valid iff it has no bits outside
    /// 0x07 and does not set Priv without Auth.
    pub fn from_byte(byte: u8) -> Result<Self> {
        if byte & !0x07 != 0 {
            return Err(Error::decode(0, DecodeErrorKind::InvalidMsgFlags(byte)));
        }
        let security_level = SecurityLevel::from_flags(byte)
            .ok_or_else(|| Error::decode(0, DecodeErrorKind::InvalidMsgFlags(byte)))?;
        Ok(Self {
            security_level,
            reportable: byte & 0x04 != 0,
        })
    }

    /// Encode to a flag byte.
    pub fn to_byte(self) -> u8 {
        let mut flags = self.security_level.to_flags();
        if self.reportable {
            flags |= 0x04;
        }
        flags
    }
}

/// Message header (msgGlobalData).
#[derive(Debug, Clone, PartialEq)]
pub struct MsgGlobalData {
    /// Message identifier.
    pub msg_id: i32,
    /// Maximum message size the sender can accept (>= 484).
    pub msg_max_size: i32,
    /// Message flags.
    pub msg_flags: MsgFlags,
    /// Security model (USM only).
    pub msg_security_model: SecurityModel,
}

impl MsgGlobalData {
    /// Create new global data with the USM security model.
    pub fn new(msg_id: i32, msg_max_size: i32, msg_flags: MsgFlags) -> Self {
        Self {
            msg_id,
            msg_max_size,
            msg_flags,
            msg_security_model: SecurityModel::Usm,
        }
    }

    /// Encode to a buffer.
    pub fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_sequence(|buf| {
            buf.push_integer(self.msg_security_model.as_i32());
            buf.push_octet_string(&[self.msg_flags.to_byte()]);
            buf.push_integer(self.msg_max_size);
            buf.push_integer(self.msg_id);
        });
    }

    /// Decode from a decoder, enforcing the header field ranges.
    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let mut seq = decoder.read_sequence()?;

        let msg_id = seq.read_integer()?;
        if msg_id < 0 {
            return Err(Error::decode(
                seq.offset(),
                DecodeErrorKind::InvalidMsgId(msg_id),
            ));
        }

        let msg_max_size = seq.read_integer()?;
        if msg_max_size < MSG_MAX_SIZE_MINIMUM {
            return Err(Error::decode(
                seq.offset(),
                DecodeErrorKind::MsgMaxSizeTooSmall {
                    value: msg_max_size,
                    minimum: MSG_MAX_SIZE_MINIMUM,
                },
            ));
        }

        let flags_bytes = seq.read_octet_string()?;
        if flags_bytes.len() != 1 {
            return Err(Error::decode(
                seq.offset(),
                DecodeErrorKind::InvalidMsgFlags(0),
            ));
        }
        let msg_flags = MsgFlags::from_byte(flags_bytes[0])
            .map_err(|_| Error::decode(seq.offset(), DecodeErrorKind::InvalidMsgFlags(flags_bytes[0])))?;

        let raw_model = seq.read_integer()?;
        let msg_security_model = SecurityModel::from_i32(raw_model).ok_or_else(|| {
            Error::decode(seq.offset(), DecodeErrorKind::UnknownSecurityModel(raw_model))
        })?;

        Ok(Self {
            msg_id,
            msg_max_size,
            msg_flags,
            msg_security_model,
        })
    }
}

/// USM security parameters (RFC 3414), carried as a BER OCTET STRING
/// wrapping a SEQUENCE.
#[derive(Debug, Clone, PartialEq)]
pub struct SecurityParams {
    /// Authoritative engine ID. Empty in discovery exchanges; otherwise
    /// 5..=32 bytes.
    pub engine_id: Bytes,
    /// Engine boot count (>= 0).
    pub engine_boots: i32,
    /// Seconds since the engine last booted (>= 0).
    pub engine_time: i32,
    /// User name (0..=32 bytes).
    pub user_name: Bytes,
    /// HMAC-SHA-1-96 digest; empty or exactly 12 bytes.
    pub auth_params: Bytes,
    /// AES privacy salt; empty or exactly 8 bytes.
    pub priv_params: Bytes,
}

impl SecurityParams {
    /// Create new security parameters with empty auth/priv fields.
    pub fn new(
        engine_id: impl Into<Bytes>,
        engine_boots: i32,
        engine_time: i32,
        user_name: impl Into<Bytes>,
    ) -> Self {
        Self {
            engine_id: engine_id.into(),
            engine_boots,
            engine_time,
            user_name: user_name.into(),
            auth_params: Bytes::new(),
            priv_params: Bytes::new(),
        }
    }

    /// Set the authentication parameters.
    pub fn with_auth_params(mut self, auth_params: impl Into<Bytes>) -> Self {
        self.auth_params = auth_params.into();
        self
    }

    /// Fill the authentication parameters with a 12-byte zero placeholder.
    ///
    /// Authenticated messages are encoded with zeros in this field, the HMAC
    /// is computed over the whole message, and the digest then replaces the
    /// zeros in place.
    pub fn with_auth_placeholder(mut self) -> Self {
        self.auth_params = Bytes::from(vec![0u8; AUTH_PARAMS_LEN]);
        self
    }

    /// Set the privacy parameters (salt).
    pub fn with_priv_params(mut self, priv_params: impl Into<Bytes>) -> Self {
        self.priv_params = priv_params.into();
        self
    }

    /// Encode to BER bytes (the inner SEQUENCE; the caller wraps it in the
    /// message's OCTET STRING).
    pub fn encode(&self) -> Bytes {
        let mut buf = EncodeBuf::new();
        self.encode_to_buf(&mut buf);
        buf.finish()
    }

    /// Encode into an existing buffer.
    pub fn encode_to_buf(&self, buf: &mut EncodeBuf) {
        buf.push_sequence(|buf| {
            buf.push_octet_string(&self.priv_params);
            buf.push_octet_string(&self.auth_params);
            buf.push_octet_string(&self.user_name);
            buf.push_integer(self.engine_time);
            buf.push_integer(self.engine_boots);
            buf.push_octet_string(&self.engine_id);
        });
    }

    /// Decode from BER bytes.
    pub fn decode(data: Bytes) -> Result<Self> {
        Self::decode_with_offset(data).map(|(params, _)| params)
    }

    /// Decode from BER bytes, also returning the offset of the
    /// authenticationParameters value within `data` (when non-empty).
    pub fn decode_with_offset(data: Bytes) -> Result<(Self, Option<usize>)> {
        let mut decoder = Decoder::new(data);
        let content_len = decoder.expect_tag(tag::universal::SEQUENCE)?;
        let content_start = decoder.offset();
        let mut seq = decoder.sub_decoder(content_len)?;

        let engine_id = seq.read_octet_string()?;
        if !engine_id.is_empty() && (engine_id.len() < 5 || engine_id.len() > 32) {
            return Err(Error::decode(
                seq.offset(),
                DecodeErrorKind::InvalidEngineIdLength {
                    length: engine_id.len(),
                },
            ));
        }

        let engine_boots = seq.read_integer()?;
        if engine_boots < 0 {
            return Err(Error::decode(
                seq.offset(),
                DecodeErrorKind::InvalidEngineBoots(engine_boots),
            ));
        }

        let engine_time = seq.read_integer()?;
        if engine_time < 0 {
            return Err(Error::decode(
                seq.offset(),
                DecodeErrorKind::InvalidEngineTime(engine_time),
            ));
        }

        let user_name = seq.read_octet_string()?;
        if user_name.len() > MAX_USER_NAME_LEN {
            return Err(Error::decode(
                seq.offset(),
                DecodeErrorKind::InvalidUserNameLength {
                    length: user_name.len(),
                },
            ));
        }

        let auth_params = seq.read_octet_string()?;
        if !auth_params.is_empty() && auth_params.len() != AUTH_PARAMS_LEN {
            return Err(Error::decode(
                seq.offset(),
                DecodeErrorKind::InvalidAuthParamsLength {
                    length: auth_params.len(),
                },
            ));
        }
        let auth_offset = if auth_params.is_empty() {
            None
        } else {
            Some(content_start + seq.offset() - auth_params.len())
        };

        let priv_params = seq.read_octet_string()?;
        if !priv_params.is_empty() && priv_params.len() != PRIV_PARAMS_LEN {
            return Err(Error::decode(
                seq.offset(),
                DecodeErrorKind::InvalidPrivParamsLength {
                    length: priv_params.len(),
                },
            ));
        }

        Ok((
            Self {
                engine_id,
                engine_boots,
                engine_time,
                user_name,
                auth_params,
                priv_params,
            },
            auth_offset,
        ))
    }

    /// Locate the authenticationParameters value in a fully encoded message
    /// by walking the BER structure (never by substring search).
    ///
    /// Returns `(offset, length)` of the value bytes. Used when building
    /// outgoing authenticated messages: encode with a zero placeholder, find
    /// the span, overwrite it with the digest.
    pub fn find_auth_params_offset(encoded_msg: &[u8]) -> Option<(usize, usize)> {
        let mut offset = 0;

        // Outer SEQUENCE header
        if encoded_msg.get(offset) != Some(&tag::universal::SEQUENCE) {
            return None;
        }
        offset += 1;
        let (_, len_size) = parse_length(&encoded_msg[offset..])?;
        offset += len_size;

        // msgVersion INTEGER
        offset = skip_tlv(encoded_msg, offset)?;

        // msgGlobalData SEQUENCE
        offset = skip_tlv(encoded_msg, offset)?;

        // msgSecurityParameters OCTET STRING header
        if encoded_msg.get(offset) != Some(&tag::universal::OCTET_STRING) {
            return None;
        }
        offset += 1;
        let (_, len_size) = parse_length(&encoded_msg[offset..])?;
        offset += len_size;

        // USM SEQUENCE header
        if encoded_msg.get(offset) != Some(&tag::universal::SEQUENCE) {
            return None;
        }
        offset += 1;
        let (_, len_size) = parse_length(&encoded_msg[offset..])?;
        offset += len_size;

        // engineID, boots, time, userName
        offset = skip_tlv(encoded_msg, offset)?;
        offset = skip_tlv(encoded_msg, offset)?;
        offset = skip_tlv(encoded_msg, offset)?;
        offset = skip_tlv(encoded_msg, offset)?;

        // authParams OCTET STRING
        if encoded_msg.get(offset) != Some(&tag::universal::OCTET_STRING) {
            return None;
        }
        offset += 1;
        let (auth_len, len_size) = parse_length(&encoded_msg[offset..])?;
        let auth_start = offset + len_size;
        if auth_start + auth_len > encoded_msg.len() {
            return None;
        }

        Some((auth_start, auth_len))
    }
}

/// Parse a BER length, returning (length, bytes_consumed).
fn parse_length(data: &[u8]) -> Option<(usize, usize)> {
    let first = *data.first()?;
    if first < 0x80 {
        Some((first as usize, 1))
    } else if first == 0x80 {
        // Indefinite form
        None
    } else {
        let count = (first & 0x7F) as usize;
        if count == 0 || count > 4 || data.len() < 1 + count {
            return None;
        }
        let mut len = 0usize;
        for i in 0..count {
            len = (len << 8) | (data[1 + i] as usize);
        }
        Some((len, 1 + count))
    }
}

/// Skip one TLV, returning the new offset.
fn skip_tlv(data: &[u8], offset: usize) -> Option<usize> {
    if offset >= data.len() {
        return None;
    }
    let mut pos = offset + 1;
    let (len, len_size) = parse_length(data.get(pos..)?)?;
    pos += len_size + len;
    if pos > data.len() {
        return None;
    }
    Some(pos)
}

/// The msgData field of an outgoing message.
#[derive(Debug, Clone)]
pub enum MsgData {
    /// Plaintext ScopedPDU (NoAuthNoPriv or AuthNoPriv).
    Plaintext(ScopedPdu),
    /// Encrypted ScopedPDU ciphertext (AuthPriv).
    Encrypted(Bytes),
}

/// Encode a complete SNMPv3 message.
///
/// For authenticated messages encode with
/// [`SecurityParams::with_auth_placeholder`], compute the HMAC over the
/// result, and overwrite the span reported by
/// [`SecurityParams::find_auth_params_offset`].
pub fn encode_message(global: &MsgGlobalData, params: &SecurityParams, data: &MsgData) -> Bytes {
    let mut buf = EncodeBuf::new();
    buf.push_sequence(|buf| {
        match data {
            MsgData::Plaintext(scoped) => scoped.encode(buf),
            MsgData::Encrypted(ciphertext) => buf.push_octet_string(ciphertext),
        }
        buf.push_octet_string(&params.encode());
        global.encode(buf);
        buf.push_integer(3);
    });
    buf.finish()
}

/// A decoded SNMPv3 message.
///
/// After [`decode`](Self::decode), `scoped_pdu` is `None`; the message
/// processor fills it once the USM has produced the plaintext.
#[derive(Debug, Clone)]
pub struct Packet {
    /// Message version (always 3).
    pub version: i32,
    /// Header.
    pub global_data: MsgGlobalData,
    /// USM security parameters.
    pub security_params: SecurityParams,
    /// Decoded ScopedPDU; populated by the message processor.
    pub scoped_pdu: Option<ScopedPdu>,

    whole_bytes: Bytes,
    raw_data: Bytes,
    auth_params_offset: Option<usize>,
}

impl Packet {
    /// Decode the outer message structure.
    ///
    /// Retains the exact input for HMAC verification and the payload bytes:
    /// the ciphertext content when Priv is set, otherwise the full encoding
    /// of the plaintext ScopedPDU.
    pub fn decode(data: Bytes) -> Result<Self> {
        let whole_bytes = data.clone();
        let mut decoder = Decoder::new(data);

        let outer_len = decoder.expect_tag(tag::universal::SEQUENCE)?;
        let content_start = decoder.offset();
        let mut seq = decoder.sub_decoder(outer_len)?;

        let version = seq.read_integer()?;
        if version != 3 {
            return Err(Error::UnsupportedVersion(version));
        }

        let global_data = MsgGlobalData::decode(&mut seq)?;

        let sp_len = seq.expect_tag(tag::universal::OCTET_STRING)?;
        let sp_content_start = seq.offset();
        let sp_bytes = seq.read_bytes(sp_len)?;
        let (security_params, auth_offset_in_params) =
            SecurityParams::decode_with_offset(sp_bytes)?;
        let auth_params_offset =
            auth_offset_in_params.map(|o| content_start + sp_content_start + o);

        let raw_data = if global_data.msg_flags.security_level.requires_priv() {
            // Encrypted: the OCTET STRING content is the ciphertext
            seq.read_octet_string()?
        } else {
            // Plaintext: keep the full ScopedPDU TLV encoding
            let data_start = seq.offset();
            let (data_tag, raw) = seq.read_tlv_raw()?;
            if data_tag != tag::universal::SEQUENCE {
                return Err(Error::decode(
                    data_start,
                    DecodeErrorKind::UnexpectedTag {
                        expected: tag::universal::SEQUENCE,
                        actual: data_tag,
                    },
                ));
            }
            raw
        };

        Ok(Self {
            version,
            global_data,
            security_params,
            scoped_pdu: None,
            whole_bytes,
            raw_data,
            auth_params_offset,
        })
    }

    /// The exact bytes this packet was decoded from.
    pub fn whole_bytes(&self) -> &Bytes {
        &self.whole_bytes
    }

    /// The payload bytes: ciphertext when Priv is set, else the encoded
    /// plaintext ScopedPDU.
    pub fn raw_data(&self) -> &Bytes {
        &self.raw_data
    }

    /// Absolute offset of the 12-byte authenticationParameters value within
    /// [`whole_bytes`](Self::whole_bytes), when present.
    pub fn auth_params_offset(&self) -> Option<usize> {
        self.auth_params_offset
    }

    /// The message's security level.
    pub fn security_level(&self) -> SecurityLevel {
        self.global_data.msg_flags.security_level
    }
}
