//! SNMP Protocol Data Units (RFC 3416).
//!
//! The v3 ScopedPDU carries one of two PDU shapes chosen by the
//! context-specific tag of the outer TLV: the ordinary form (requestID,
//! errorStatus, errorIndex) or the bulk form (requestID, nonRepeaters,
//! maxRepetitions). [`PduBody`] makes that choice an explicit enum, and the
//! decoder receives the tag from the TLV it just read rather than from a
//! field inside the value being decoded.

use bytes::Bytes;

use crate::ber::{Decoder, EncodeBuf, tag};
use crate::error::{DecodeErrorKind, Error, ErrorStatus, Result};
use crate::message::EngineId;
use crate::varbind::{VarBind, decode_varbind_list, encode_varbind_list};

/// PDU type tag (context-specific, constructed).
///
/// Tag 4 (the SNMPv1 trap) is obsolete and rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PduType {
    GetRequest = 0xA0,
    GetNextRequest = 0xA1,
    Response = 0xA2,
    SetRequest = 0xA3,
    GetBulkRequest = 0xA5,
    InformRequest = 0xA6,
    SnmpV2Trap = 0xA7,
    Report = 0xA8,
}

impl PduType {
    /// Create from the tag byte. Returns `None` for 0xA4 (obsolete) and
    /// anything outside the PDU tag range.
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0xA0 => Some(Self::GetRequest),
            0xA1 => Some(Self::GetNextRequest),
            0xA2 => Some(Self::Response),
            0xA3 => Some(Self::SetRequest),
            0xA5 => Some(Self::GetBulkRequest),
            0xA6 => Some(Self::InformRequest),
            0xA7 => Some(Self::SnmpV2Trap),
            0xA8 => Some(Self::Report),
            _ => None,
        }
    }

    /// Get the tag byte.
    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Whether this is a notification-class PDU (trap or inform).
    pub fn is_notification(self) -> bool {
        matches!(self, Self::SnmpV2Trap | Self::InformRequest)
    }
}

impl std::fmt::Display for PduType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GetRequest => write!(f, "GetRequest"),
            Self::GetNextRequest => write!(f, "GetNextRequest"),
            Self::Response => write!(f, "Response"),
            Self::SetRequest => write!(f, "SetRequest"),
            Self::GetBulkRequest => write!(f, "GetBulkRequest"),
            Self::InformRequest => write!(f, "InformRequest"),
            Self::SnmpV2Trap => write!(f, "SNMPv2-Trap"),
            Self::Report => write!(f, "Report"),
        }
    }
}

/// Ordinary (non-bulk) PDU.
#[derive(Debug, Clone, PartialEq)]
pub struct Pdu {
    /// PDU type (any non-bulk variant).
    pub pdu_type: PduType,
    /// Request ID for correlation.
    pub request_id: i32,
    /// Error status (RFC 3416, 0..=18).
    pub error_status: ErrorStatus,
    /// 1-based index of the problematic varbind, 0 if none.
    pub error_index: i32,
    /// Variable bindings.
    pub varbinds: Vec<VarBind>,
}

impl Pdu {
    /// Create an SNMPv2-Trap PDU.
    pub fn trap(request_id: i32, varbinds: Vec<VarBind>) -> Self {
        Self {
            pdu_type: PduType::SnmpV2Trap,
            request_id,
            error_status: ErrorStatus::NoError,
            error_index: 0,
            varbinds,
        }
    }

    /// Create an InformRequest PDU.
    pub fn inform(request_id: i32, varbinds: Vec<VarBind>) -> Self {
        Self {
            pdu_type: PduType::InformRequest,
            request_id,
            error_status: ErrorStatus::NoError,
            error_index: 0,
            varbinds,
        }
    }

    /// Encode to BER.
    pub fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_constructed(self.pdu_type.tag(), |buf| {
            encode_varbind_list(buf, &self.varbinds);
            buf.push_integer(self.error_index);
            buf.push_integer(self.error_status.as_i32());
            buf.push_integer(self.request_id);
        });
    }

    /// Decode the PDU body; the constructed TLV header has already been
    /// consumed and its type resolved from the tag.
    fn decode_body(pdu_type: PduType, decoder: &mut Decoder) -> Result<Self> {
        let request_id = decoder.read_integer()?;

        let raw_status = decoder.read_integer()?;
        let error_status = ErrorStatus::from_i32(raw_status).ok_or_else(|| {
            Error::decode(decoder.offset(), DecodeErrorKind::InvalidErrorStatus(raw_status))
        })?;

        let error_index = decoder.read_integer()?;
        if error_index < 0 {
            return Err(Error::decode(
                decoder.offset(),
                DecodeErrorKind::InvalidErrorIndex(error_index),
            ));
        }

        let varbinds = decode_varbind_list(decoder)?;

        Ok(Pdu {
            pdu_type,
            request_id,
            error_status,
            error_index,
            varbinds,
        })
    }
}

/// GetBulkRequest PDU.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkPdu {
    /// Request ID for correlation.
    pub request_id: i32,
    /// Number of non-repeating OIDs.
    pub non_repeaters: i32,
    /// Maximum repetitions for repeating OIDs.
    pub max_repetitions: i32,
    /// Variable bindings.
    pub varbinds: Vec<VarBind>,
}

impl BulkPdu {
    /// Encode to BER.
    pub fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_constructed(tag::pdu::GET_BULK_REQUEST, |buf| {
            encode_varbind_list(buf, &self.varbinds);
            buf.push_integer(self.max_repetitions);
            buf.push_integer(self.non_repeaters);
            buf.push_integer(self.request_id);
        });
    }

    fn decode_body(decoder: &mut Decoder) -> Result<Self> {
        let request_id = decoder.read_integer()?;

        let non_repeaters = decoder.read_integer()?;
        if non_repeaters < 0 {
            return Err(Error::decode(
                decoder.offset(),
                DecodeErrorKind::InvalidNonRepeaters(non_repeaters),
            ));
        }

        let max_repetitions = decoder.read_integer()?;
        if max_repetitions < 0 {
            return Err(Error::decode(
                decoder.offset(),
                DecodeErrorKind::InvalidMaxRepetitions(max_repetitions),
            ));
        }

        let varbinds = decode_varbind_list(decoder)?;

        Ok(BulkPdu {
            request_id,
            non_repeaters,
            max_repetitions,
            varbinds,
        })
    }
}

/// The PDU carried by a ScopedPDU: ordinary or bulk, chosen by the
/// context-specific tag.
#[derive(Debug, Clone, PartialEq)]
pub enum PduBody {
    Normal(Pdu),
    Bulk(BulkPdu),
}

impl PduBody {
    /// Decode one PDU TLV, dispatching on its tag.
    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let tag_byte = decoder.read_tag()?;
        let pdu_type = PduType::from_tag(tag_byte).ok_or_else(|| {
            Error::decode(
                decoder.offset().saturating_sub(1),
                DecodeErrorKind::UnknownPduType(tag_byte),
            )
        })?;

        let len = decoder.read_length()?;
        let mut body = decoder.sub_decoder(len)?;

        match pdu_type {
            PduType::GetBulkRequest => Ok(PduBody::Bulk(BulkPdu::decode_body(&mut body)?)),
            other => Ok(PduBody::Normal(Pdu::decode_body(other, &mut body)?)),
        }
    }

    /// Encode to BER.
    pub fn encode(&self, buf: &mut EncodeBuf) {
        match self {
            PduBody::Normal(pdu) => pdu.encode(buf),
            PduBody::Bulk(pdu) => pdu.encode(buf),
        }
    }

    /// The PDU type.
    pub fn pdu_type(&self) -> PduType {
        match self {
            PduBody::Normal(pdu) => pdu.pdu_type,
            PduBody::Bulk(_) => PduType::GetBulkRequest,
        }
    }

    /// The request ID.
    pub fn request_id(&self) -> i32 {
        match self {
            PduBody::Normal(pdu) => pdu.request_id,
            PduBody::Bulk(pdu) => pdu.request_id,
        }
    }

    /// The variable bindings.
    pub fn varbinds(&self) -> &[VarBind] {
        match self {
            PduBody::Normal(pdu) => &pdu.varbinds,
            PduBody::Bulk(pdu) => &pdu.varbinds,
        }
    }
}

/// Scoped PDU (RFC 3412): context engine ID, context name, and the PDU.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopedPdu {
    /// Context engine ID.
    pub context_engine_id: EngineId,
    /// Context name (typically empty).
    pub context_name: Bytes,
    /// The PDU.
    pub body: PduBody,
}

impl ScopedPdu {
    /// Create a new scoped PDU.
    pub fn new(context_engine_id: EngineId, context_name: impl Into<Bytes>, body: PduBody) -> Self {
        Self {
            context_engine_id,
            context_name: context_name.into(),
            body,
        }
    }

    /// The PDU type.
    pub fn pdu_type(&self) -> PduType {
        self.body.pdu_type()
    }

    /// Encode to BER.
    pub fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_sequence(|buf| {
            self.body.encode(buf);
            buf.push_octet_string(&self.context_name);
            buf.push_octet_string(self.context_engine_id.as_bytes());
        });
    }

    /// Encode to bytes.
    pub fn encode_to_bytes(&self) -> Bytes {
        let mut buf = EncodeBuf::new();
        self.encode(&mut buf);
        buf.finish()
    }

    /// Decode from BER.
    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let mut seq = decoder.read_sequence()?;

        let engine_id_bytes = seq.read_octet_string()?;
        let engine_id_len = engine_id_bytes.len();
        let context_engine_id = EngineId::new(engine_id_bytes).map_err(|_| {
            Error::decode(
                seq.offset(),
                DecodeErrorKind::InvalidEngineIdLength {
                    length: engine_id_len,
                },
            )
        })?;
        let context_name = seq.read_octet_string()?;
        let body = PduBody::decode(&mut seq)?;

        Ok(ScopedPdu {
            context_engine_id,
            context_name,
            body,
        })
    }
}
