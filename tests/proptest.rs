//! Property-based tests for the wire codec and the USM crypto primitives.

mod common;

use bytes::Bytes;
use proptest::prelude::*;

use trapsink::ber::Decoder;
use trapsink::usm::auth::{self, AuthKey, password_to_key};
use trapsink::usm::privacy::PrivKey;
use trapsink::{
    EngineId, ErrorStatus, MsgData, MsgFlags, MsgGlobalData, Oid, Packet, Pdu, PduBody, ScopedPdu,
    SecurityLevel, SecurityParams, Value, VarBind, encode_message,
};

// =============================================================================
// Strategies
// =============================================================================

/// Valid OIDs that round-trip through BER: first arc 0-2, second arc
/// constrained when the first is below 2, at least two arcs.
fn arb_oid() -> impl Strategy<Value = Oid> {
    (0u32..3, prop::collection::vec(0u32..100_000, 1..=10)).prop_map(|(arc1, rest)| {
        let arc2 = if arc1 < 2 { rest[0] % 40 } else { rest[0] };
        let mut arcs = vec![arc1, arc2];
        arcs.extend_from_slice(&rest[1..]);
        Oid::from_slice(&arcs)
    })
}

fn arb_bytes(max: usize) -> impl Strategy<Value = Bytes> {
    prop::collection::vec(any::<u8>(), 0..=max).prop_map(Bytes::from)
}

fn arb_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i32>().prop_map(Value::Integer),
        arb_bytes(64).prop_map(Value::OctetString),
        Just(Value::Null),
        arb_oid().prop_map(Value::ObjectIdentifier),
        any::<[u8; 4]>().prop_map(Value::IpAddress),
        any::<u32>().prop_map(Value::Counter32),
        any::<u32>().prop_map(Value::Gauge32),
        any::<u32>().prop_map(Value::TimeTicks),
        arb_bytes(32).prop_map(Value::Opaque),
        any::<u64>().prop_map(Value::Counter64),
        Just(Value::NoSuchObject),
        Just(Value::NoSuchInstance),
        Just(Value::EndOfMibView),
    ]
}

fn arb_varbinds() -> impl Strategy<Value = Vec<VarBind>> {
    prop::collection::vec(
        (arb_oid(), arb_value()).prop_map(|(oid, value)| VarBind::new(oid, value)),
        0..=6,
    )
}

fn arb_engine_id() -> impl Strategy<Value = Bytes> {
    prop::collection::vec(any::<u8>(), 5..=32).prop_map(Bytes::from)
}

fn arb_scoped_pdu() -> impl Strategy<Value = ScopedPdu> {
    (
        arb_engine_id(),
        arb_bytes(16),
        any::<i32>(),
        0i32..=18,
        0i32..=1000,
        arb_varbinds(),
    )
        .prop_map(
            |(engine_id, context_name, request_id, status, index, varbinds)| {
                ScopedPdu::new(
                    EngineId::new(engine_id).unwrap(),
                    context_name,
                    PduBody::Normal(Pdu {
                        pdu_type: trapsink::PduType::SnmpV2Trap,
                        request_id,
                        error_status: ErrorStatus::from_i32(status).unwrap(),
                        error_index: index,
                        varbinds,
                    }),
                )
            },
        )
}

// =============================================================================
// Codec properties
// =============================================================================

proptest! {
    /// decode(D) then re-encode then decode yields an equal structure
    /// (BER is not canonical, so byte equality is not required).
    #[test]
    fn message_decode_reencode_decode_is_stable(
        msg_id in 0i32..=i32::MAX,
        max_size in 484i32..=i32::MAX,
        reportable in any::<bool>(),
        engine_id in arb_engine_id(),
        boots in 0i32..=i32::MAX,
        time in 0i32..=i32::MAX,
        scoped in arb_scoped_pdu(),
    ) {
        let global = MsgGlobalData::new(
            msg_id,
            max_size,
            MsgFlags::new(SecurityLevel::NoAuthNoPriv, reportable),
        );
        let params = SecurityParams::new(engine_id, boots, time, Bytes::new());
        let wire = encode_message(&global, &params, &MsgData::Plaintext(scoped.clone()));

        let packet = Packet::decode(wire).unwrap();
        prop_assert_eq!(&packet.global_data, &global);
        prop_assert_eq!(&packet.security_params, &params);

        let mut decoder = Decoder::new(packet.raw_data().clone());
        let decoded_scoped = ScopedPdu::decode(&mut decoder).unwrap();
        prop_assert_eq!(&decoded_scoped, &scoped);

        // Re-encode from the decoded structure and decode again
        let rewire = encode_message(
            &packet.global_data,
            &packet.security_params,
            &MsgData::Plaintext(decoded_scoped.clone()),
        );
        let repacket = Packet::decode(rewire).unwrap();
        prop_assert_eq!(&repacket.global_data, &global);
        prop_assert_eq!(&repacket.security_params, &params);

        let mut redecoder = Decoder::new(repacket.raw_data().clone());
        prop_assert_eq!(ScopedPdu::decode(&mut redecoder).unwrap(), decoded_scoped);
    }

    /// Engine IDs of 5..=32 bytes are accepted; 0..=4 and 33+ rejected.
    #[test]
    fn engine_id_length_range(len in 0usize..=64) {
        let result = EngineId::new(Bytes::from(vec![0u8; len]));
        prop_assert_eq!(result.is_ok(), (5..=32).contains(&len));
    }

    /// A flag byte is accepted iff it has no bits outside 0x07 and is not
    /// Priv-without-Auth.
    #[test]
    fn msg_flags_byte_space(byte in any::<u8>()) {
        let valid = byte & !0x07 == 0 && byte & 0x03 != 0x02;
        prop_assert_eq!(MsgFlags::from_byte(byte).is_ok(), valid);
    }

    /// msgMaxSize below 484 (including negative) is rejected.
    #[test]
    fn msg_max_size_minimum(size in any::<i32>()) {
        let mut buf = trapsink::ber::EncodeBuf::new();
        buf.push_sequence(|buf| {
            buf.push_integer(3);
            buf.push_octet_string(&[0x04]);
            buf.push_integer(size);
            buf.push_integer(1);
        });
        let mut decoder = Decoder::new(buf.finish());
        let result = MsgGlobalData::decode(&mut decoder);
        prop_assert_eq!(result.is_ok(), size >= 484);
    }

    /// OID BER round-trip.
    #[test]
    fn oid_ber_round_trip(oid in arb_oid()) {
        let encoded = oid.to_ber();
        let decoded = Oid::from_ber(&encoded).unwrap();
        prop_assert_eq!(decoded, oid);
    }
}

// =============================================================================
// Crypto properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Flipping any bit of an authenticated message outside the digest span
    /// breaks verification; flipping any digest bit breaks the comparison.
    #[test]
    fn hmac_detects_any_bit_flip(
        password in prop::collection::vec(any::<u8>(), 1..=16),
        bit in 0usize..8,
        byte_selector in any::<u64>(),
    ) {
        let wire = common::auth_trap_wire(1, 0, 0, false);
        let key = AuthKey::from_password(common::AUTH_PASSWORD, &common::ENGINE);
        let (offset, len) = SecurityParams::find_auth_params_offset(&wire).unwrap();
        let mac = wire[offset..offset + len].to_vec();

        // Untampered verifies
        prop_assert!(auth::verify_message(&key, &wire, offset, &mac));

        // Any single-bit flip fails, wherever it lands
        let target = (byte_selector % wire.len() as u64) as usize;
        let mut tampered = wire.clone();
        tampered[target] ^= 1 << bit;
        let tampered_mac = tampered[offset..offset + len].to_vec();
        prop_assert!(!auth::verify_message(&key, &tampered, offset, &tampered_mac));

        // A key derived from a different password computes a different MAC
        let other = AuthKey::from_password(&password, &common::ENGINE);
        if other.as_bytes() != key.as_bytes() {
            prop_assert!(!auth::verify_message(&other, &wire, offset, &mac));
        }
    }

    /// AES-128-CFB decrypt(encrypt(p)) == p for all plaintext lengths.
    #[test]
    fn aes_cfb_round_trip(
        key_bytes in prop::collection::vec(any::<u8>(), 16..=20),
        plaintext in prop::collection::vec(any::<u8>(), 0..=600),
        boots in 0i32..=i32::MAX,
        time in 0i32..=i32::MAX,
        salt in any::<u64>(),
    ) {
        let key = PrivKey::from_bytes(key_bytes).unwrap();
        let (ciphertext, priv_params) = key.encrypt(&plaintext, boots, time, salt).unwrap();
        prop_assert_eq!(ciphertext.len(), plaintext.len());

        let decrypted = key.decrypt(&ciphertext, boots, time, &priv_params).unwrap();
        prop_assert_eq!(decrypted.as_ref(), plaintext.as_slice());
    }

    /// password_to_key is deterministic, 20 bytes, and engine-sensitive.
    #[test]
    fn password_to_key_properties(
        password in prop::collection::vec(any::<u8>(), 1..=24),
        engine_a in arb_engine_id(),
        engine_b in arb_engine_id(),
    ) {
        let first = password_to_key(&password, &engine_a);
        let second = password_to_key(&password, &engine_a);
        prop_assert_eq!(first, second);
        prop_assert_eq!(first.len(), 20);

        if engine_a != engine_b {
            prop_assert_ne!(first, password_to_key(&password, &engine_b));
        }
    }
}
