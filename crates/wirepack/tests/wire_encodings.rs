// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com
//
// Randomized round-trip coverage across every wire encoding the number
// descriptor can express, in one mixed record with unaligned bit offsets.

use wirepack::{
    load_value, member_by_index, pack_partial, store_value, unpack_partial, BasicKind, ByteOrder,
    GenericValue, ModuleBuilder, NumberDescriptor, NumberEncoding, Registry, TypeId,
};

struct Mixed {
    db: Registry,
    record: TypeId,
    native_bytes: usize,
    packed_bits: usize,
}

fn mixed_module() -> Mixed {
    let mut schema = ModuleBuilder::new("mixed", 7);
    let be = NumberDescriptor::default();
    let u7 = schema.unsigned("u7", 7);
    let s12 = schema.signed("s12", 12);
    let ones9 = schema
        .number(
            "ones9",
            BasicKind::SignedInt,
            9,
            NumberDescriptor {
                encoding: NumberEncoding::OnesComplement,
                ..be
            },
        )
        .expect("ones complement");
    let mag16 = schema
        .number(
            "mag16",
            BasicKind::SignedInt,
            16,
            NumberDescriptor {
                encoding: NumberEncoding::SignMagnitude,
                ..be
            },
        )
        .expect("sign magnitude");
    let bcd16 = schema
        .number(
            "bcd16",
            BasicKind::UnsignedInt,
            16,
            NumberDescriptor {
                encoding: NumberEncoding::Bcd,
                ..be
            },
        )
        .expect("bcd");
    let le32 = schema
        .number(
            "le32",
            BasicKind::UnsignedInt,
            32,
            NumberDescriptor {
                byte_order: ByteOrder::LittleEndian,
                ..be
            },
        )
        .expect("little endian");
    let rev5 = schema
        .number(
            "rev5",
            BasicKind::UnsignedInt,
            5,
            NumberDescriptor {
                lsb_first: true,
                ..be
            },
        )
        .expect("lsb first");
    let inv8 = schema
        .number(
            "inv8",
            BasicKind::UnsignedInt,
            8,
            NumberDescriptor {
                invert_bits: true,
                ..be
            },
        )
        .expect("inverted");
    let f32t = schema.float("f32", 32).expect("f32");
    let f64t = schema.float("f64", 64).expect("f64");

    let record = schema
        .record("Mixed")
        .field("u7", u7)
        .field("s12", s12)
        .field("ones9", ones9)
        .padding(3)
        .field("mag16", mag16)
        .field("bcd16", bcd16)
        .field("le32", le32)
        .field("rev5", rev5)
        .field("inv8", inv8)
        .field("f32", f32t)
        .field("f64", f64t)
        .build()
        .expect("record");

    let mut db = Registry::new();
    db.register(schema.build()).expect("register");
    let info = wirepack::type_info(&db, record).expect("info");
    Mixed {
        db,
        record,
        native_bytes: info.native_bytes as usize,
        packed_bits: info.packed_bits as usize,
    }
}

fn random_values() -> Vec<GenericValue> {
    vec![
        GenericValue::Unsigned(fastrand::u64(0..1 << 7)),
        GenericValue::Signed(fastrand::i64(-(1 << 11)..1 << 11)),
        GenericValue::Signed(fastrand::i64(-255..256)),
        // Padding entry has no value; indices below skip it.
        GenericValue::Signed(fastrand::i64(-32767..32768)),
        GenericValue::Unsigned(fastrand::u64(0..10_000)),
        GenericValue::Unsigned(fastrand::u64(0..1 << 32)),
        GenericValue::Unsigned(fastrand::u64(0..1 << 5)),
        GenericValue::Unsigned(fastrand::u64(0..1 << 8)),
        GenericValue::Float((fastrand::f32() * 1000.0 - 500.0) as f64),
        GenericValue::Float(fastrand::f64() * 1e9 - 5e8),
    ]
}

/// Member indices of the value-bearing fields (index 3 is padding).
const FIELD_INDICES: [u32; 10] = [0, 1, 2, 4, 5, 6, 7, 8, 9, 10];

#[test]
fn test_random_round_trips_across_encodings() {
    let m = mixed_module();
    for _ in 0..200 {
        let values = random_values();
        let mut native = vec![0u8; m.native_bytes];
        for (slot, value) in FIELD_INDICES.iter().zip(&values) {
            let member = member_by_index(&m.db, m.record, *slot).expect("member");
            store_value(
                &m.db,
                member.type_id,
                &mut native,
                member.native_offset_bytes as usize,
                value,
            )
            .expect("store");
        }

        let mut packed = vec![0u8; m.packed_bits.div_ceil(8)];
        let mut id = m.record;
        let bits =
            pack_partial(&m.db, &mut id, &mut packed, &native, m.packed_bits, 0).expect("pack");
        assert_eq!(bits, m.packed_bits);

        let mut decoded = vec![0u8; m.native_bytes];
        let mut id = m.record;
        let bytes =
            unpack_partial(&m.db, &mut id, &mut decoded, &packed, m.packed_bits, 0).expect("unpack");
        assert_eq!(bytes, m.native_bytes);

        for (slot, value) in FIELD_INDICES.iter().zip(&values) {
            let member = member_by_index(&m.db, m.record, *slot).expect("member");
            let back = load_value(
                &m.db,
                member.type_id,
                &decoded,
                member.native_offset_bytes as usize,
            )
            .expect("load");
            // f32 fields narrow the stored f64 on write, so compare the
            // re-loaded value against the same narrowing.
            let expected = match (member.type_id, value) {
                (_, GenericValue::Float(v)) if member.packed_bits == 32 => {
                    GenericValue::Float((*v as f32) as f64)
                }
                _ => *value,
            };
            assert_eq!(back, expected);
        }
    }
}

#[test]
fn test_padding_bits_pack_as_zero() {
    let m = mixed_module();
    let native = vec![0u8; m.native_bytes];
    let mut packed = vec![0xFFu8; m.packed_bits.div_ceil(8)];
    let mut id = m.record;
    pack_partial(&m.db, &mut id, &mut packed, &native, m.packed_bits, 0).expect("pack");
    // Padding occupies stream bits 28..31, the middle of byte 3.
    assert_eq!(packed[3] & 0b0000_1110, 0);
}
