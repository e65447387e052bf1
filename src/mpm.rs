//! Message processing (RFC 3412) for the v3/USM pipeline.
//!
//! One entry point: decode the outer message (which gates version 3 and the
//! USM security model), hand it to the USM for authentication and
//! decryption, then decode the resulting plaintext ScopedPDU.

use std::sync::Arc;

use bytes::Bytes;

use crate::ber::Decoder;
use crate::error::Result;
use crate::lcd::Lcd;
use crate::message::Packet;
use crate::pdu::ScopedPdu;
use crate::usm::UserSecurityModel;

/// The message processor: outer decode, USM, ScopedPDU decode.
pub struct MessageProcessor {
    usm: UserSecurityModel,
}

impl MessageProcessor {
    /// Create a processor whose USM consults the given datastore.
    pub fn new(lcd: Arc<dyn Lcd>) -> Self {
        Self {
            usm: UserSecurityModel::new(lcd),
        }
    }

    /// Decode and authenticate one datagram, returning the packet with its
    /// ScopedPDU populated.
    ///
    /// USM failures propagate as-is. When decryption produced garbage, the
    /// failure surfaces here: the plaintext does not begin with a SEQUENCE
    /// tag and the ScopedPDU decode rejects it.
    pub fn prepare(&self, data: Bytes) -> Result<Packet> {
        let mut packet = Packet::decode(data)?;
        let plaintext = self.usm.process_incoming(&packet)?;

        let mut decoder = Decoder::new(plaintext);
        packet.scoped_pdu = Some(ScopedPdu::decode(&mut decoder)?);

        Ok(packet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use crate::error::Error;
    use crate::lcd::{MemoryLcd, TimeEntry, TimeTable, UserTable, UsmUser};
    use crate::message::{
        EngineId, MsgData, MsgFlags, MsgGlobalData, SecurityLevel, SecurityParams, encode_message,
    };
    use crate::oid;
    use crate::pdu::{Pdu, PduBody, PduType};
    use crate::usm::auth::{self, AuthKey};
    use crate::usm::privacy::PrivKey;
    use crate::value::Value;
    use crate::varbind::VarBind;

    const ENGINE: [u8; 10] = [1, 1, 1, 1, 1, 1, 1, 1, 1, 1];

    fn engine_id() -> EngineId {
        EngineId::new(Bytes::from_static(&ENGINE)).unwrap()
    }

    fn scoped_pdu() -> ScopedPdu {
        ScopedPdu::new(
            engine_id(),
            Bytes::new(),
            PduBody::Normal(Pdu::trap(
                1,
                vec![VarBind::new(
                    oid!(1, 3, 6, 1, 2, 1, 1, 3, 0),
                    Value::TimeTicks(12345),
                )],
            )),
        )
    }

    fn processor() -> MessageProcessor {
        let lcd = Arc::new(MemoryLcd::new());
        lcd.add_user(UsmUser::from_passwords(
            engine_id(),
            "hoge",
            b"hogehoge",
            b"fugafuga",
        ))
        .unwrap();
        lcd.add_time(TimeEntry::new(engine_id(), 0, 0)).unwrap();
        MessageProcessor::new(lcd)
    }

    #[test]
    fn test_prepare_noauth() {
        let global = MsgGlobalData::new(1, 2048, MsgFlags::new(SecurityLevel::NoAuthNoPriv, true));
        let params = SecurityParams::new(Bytes::from_static(&ENGINE), 0, 0, Bytes::new());
        let wire = encode_message(&global, &params, &MsgData::Plaintext(scoped_pdu()));

        let packet = processor().prepare(wire).unwrap();
        let scoped = packet.scoped_pdu.unwrap();
        assert_eq!(scoped.pdu_type(), PduType::SnmpV2Trap);
        assert_eq!(scoped.body.varbinds().len(), 1);
        assert_eq!(scoped.body.varbinds()[0].value, Value::TimeTicks(12345));
    }

    #[test]
    fn test_prepare_rejects_wrong_version() {
        // SNMPv2c-shaped message: version 1, community, PDU
        let mut buf = crate::ber::EncodeBuf::new();
        buf.push_sequence(|buf| {
            Pdu::trap(1, vec![]).encode(buf);
            buf.push_octet_string(b"public");
            buf.push_integer(1);
        });
        let err = processor().prepare(buf.finish()).unwrap_err();
        // Decode fails before the version check can even run (the community
        // string is not a msgGlobalData SEQUENCE) or on version; either way
        // the packet is dropped.
        assert!(matches!(
            err,
            Error::UnsupportedVersion(_) | Error::Decode { .. }
        ));
    }

    #[test]
    fn test_prepare_authpriv_garbage_fails_at_scoped_pdu() {
        let auth_key = AuthKey::from_password(b"hogehoge", &ENGINE);
        let priv_key = PrivKey::from_password(b"fugafuga", &ENGINE);

        let plaintext = scoped_pdu().encode_to_bytes();
        let (ciphertext, priv_params) = priv_key.encrypt(&plaintext, 0, 0, 1).unwrap();

        // Flip one ciphertext bit: decryption yields garbage, and the
        // ScopedPDU decode reports the failure.
        let mut corrupted = ciphertext.to_vec();
        corrupted[0] ^= 0x01;

        let global = MsgGlobalData::new(1, 2048, MsgFlags::new(SecurityLevel::AuthPriv, true));
        let params = SecurityParams::new(
            Bytes::from_static(&ENGINE),
            0,
            0,
            Bytes::from_static(b"hoge"),
        )
        .with_auth_placeholder()
        .with_priv_params(priv_params);

        let wire = encode_message(&global, &params, &MsgData::Encrypted(Bytes::from(corrupted)));
        let mut wire = wire.to_vec();
        let (offset, _) = SecurityParams::find_auth_params_offset(&wire).unwrap();
        auth::authenticate_message(&auth_key, &mut wire, offset);

        let err = processor().prepare(Bytes::from(wire)).unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }
}
