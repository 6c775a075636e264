// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com
//
// Binding-surface coverage: descriptor viewports over shared buffers,
// compatibility checking, introspection queries and display conversion.

use wirepack::{
    check_compatible, member_by_index, member_by_native_offset, scalar_from_string,
    scalar_to_string, type_info, BasicKind, Buffer, Compatibility, Descriptor, DisplayHint,
    EnumLabel, GenericValue, ModuleBuilder, Registry, Status, TypeId,
};

struct Fixture {
    db: Registry,
    u32t: TypeId,
    mode: TypeId,
    flag: TypeId,
    addr: TypeId,
    pair: TypeId,
    frame: TypeId,
    frame_a: TypeId,
    frame_b: TypeId,
}

fn fixture() -> Fixture {
    let mut schema = ModuleBuilder::new("tlm", 3);
    let u8t = schema.unsigned("u8", 8);
    let u32t = schema.unsigned("u32", 32);
    let mode = schema.enumeration(
        "mode",
        8,
        vec![
            EnumLabel::new("SAFE", 0),
            EnumLabel::new("NOMINAL", 1),
            EnumLabel::new("SCIENCE", 2),
        ],
    );
    let flag = schema.unsigned("flag", 8);
    schema
        .set_display(flag, DisplayHint::Boolean)
        .expect("display");
    let addr = schema.unsigned("addr", 32);
    schema
        .set_display(addr, DisplayHint::Address)
        .expect("display");
    let pair = schema
        .record("Pair")
        .field("lo", u32t)
        .field("hi", u32t)
        .build()
        .expect("pair");
    let frame = schema
        .record("Frame")
        .field("kind", u8t)
        .build()
        .expect("frame");
    let frame_a = schema
        .derive("FrameA", frame)
        .constrain("kind", 1u64)
        .build()
        .expect("frame a");
    let frame_b = schema
        .derive("FrameB", frame)
        .field("extra", u32t)
        .constrain("kind", 2u64)
        .build()
        .expect("frame b");

    let mut db = Registry::new();
    db.register(schema.build()).expect("register");
    Fixture {
        db,
        u32t,
        mode,
        flag,
        addr,
        pair,
        frame,
        frame_a,
        frame_b,
    }
}

#[test]
fn test_sub_descriptor_writes_only_its_window() {
    let f = fixture();
    let buffer = Buffer::managed(8);
    let mut parent = Descriptor::new(&f.db, f.pair).expect("descriptor");
    parent.set_buffer(&buffer);
    assert!(parent.is_valid());

    let hi = member_by_index(&f.db, f.pair, 1).expect("hi member");
    assert_eq!(hi.native_offset_bytes, 4);
    let child = parent.sub_object(&f.db, &hi).expect("sub object");
    assert_eq!(child.offset(), 4);
    assert_eq!(child.length(), 4);

    child
        .store_scalar(&f.db, &GenericValue::Unsigned(0xAABB_CCDD))
        .expect("store");
    // Only bytes [4..8) of the parent's backing storage changed.
    let mut raw = [0u8; 8];
    buffer.read(0, &mut raw).expect("read");
    assert_eq!(&raw[0..4], &[0u8; 4]);
    assert_eq!(&raw[4..8], &0xAABB_CCDDu32.to_ne_bytes());
    assert_eq!(
        child.load_scalar(&f.db).expect("load"),
        GenericValue::Unsigned(0xAABB_CCDD)
    );
}

#[test]
fn test_descriptor_release_order_frees_last() {
    let f = fixture();
    let buffer = Buffer::managed(8);
    assert_eq!(buffer.ref_count(), 0);

    let mut d1 = Descriptor::new(&f.db, f.pair).expect("d1");
    d1.set_buffer(&buffer);
    let d2 = d1.sub_object(&f.db, &member_by_index(&f.db, f.pair, 0).expect("lo")).expect("d2");
    let d3 = d1.sub_object(&f.db, &member_by_index(&f.db, f.pair, 1).expect("hi")).expect("d3");
    assert_eq!(buffer.ref_count(), 3);

    drop(d2);
    assert_eq!(buffer.ref_count(), 2);
    drop(d3);
    assert_eq!(buffer.ref_count(), 1);
    drop(d1);
    assert_eq!(buffer.ref_count(), 0);
    // Last handle: the storage is still intact and reclaimed exactly once.
    assert_eq!(buffer.into_content(), Some(vec![0u8; 8]));
}

#[test]
fn test_set_buffer_replaces_and_ignores_reattach() {
    let f = fixture();
    let first = Buffer::managed(8);
    let second = Buffer::managed(8);
    let mut descriptor = Descriptor::new(&f.db, f.pair).expect("descriptor");

    descriptor.set_buffer(&first);
    assert_eq!(first.ref_count(), 1);
    descriptor.set_buffer(&first);
    assert_eq!(first.ref_count(), 1);

    descriptor.set_buffer(&second);
    assert_eq!(first.ref_count(), 0);
    assert_eq!(second.ref_count(), 1);

    descriptor.clear_buffer();
    assert_eq!(second.ref_count(), 0);
    assert!(!descriptor.is_valid());
}

#[test]
fn test_descriptor_window_cannot_exceed_buffer() {
    let f = fixture();
    let buffer = Buffer::managed(4);
    let mut descriptor = Descriptor::new(&f.db, f.pair).expect("descriptor");
    descriptor.set_buffer(&buffer);
    assert!(!descriptor.is_valid());
    assert_eq!(
        descriptor.store_scalar(&f.db, &GenericValue::Unsigned(1)),
        Err(Status::BufferSizeError)
    );
}

#[test]
fn test_compatibility_classes() {
    let f = fixture();
    let base_sized = Descriptor::new_for_derivatives(&f.db, f.frame).expect("base");
    let base_plain = Descriptor::new(&f.db, f.frame).expect("base plain");
    let a = Descriptor::new(&f.db, f.frame_a).expect("a");
    let b = Descriptor::new(&f.db, f.frame_b).expect("b");
    let lo = Descriptor::new(&f.db, f.u32t).expect("lo");
    let addr = Descriptor::new(&f.db, f.addr).expect("addr");
    let pair = Descriptor::new(&f.db, f.pair).expect("pair");

    assert_eq!(check_compatible(&f.db, &b, &b), Compatibility::Exact);
    // Same kind and sizes, different identifiers: still byte-identical.
    assert_eq!(check_compatible(&f.db, &lo, &addr), Compatibility::Exact);
    // Derivative into a base sized for the largest derivative.
    assert_eq!(
        check_compatible(&f.db, &base_sized, &b),
        Compatibility::BaseType
    );
    assert_eq!(
        check_compatible(&f.db, &base_sized, &a),
        Compatibility::BaseType
    );
    // Base descriptor too small for the largest derivative.
    assert_eq!(check_compatible(&f.db, &base_plain, &b), Compatibility::None);
    assert_eq!(check_compatible(&f.db, &pair, &b), Compatibility::None);
    assert_eq!(check_compatible(&f.db, &lo, &pair), Compatibility::None);
}

#[test]
fn test_member_by_native_offset_finds_immediate_child() {
    let f = fixture();
    let hit = member_by_native_offset(&f.db, f.pair, 5).expect("member");
    assert_eq!(hit.native_offset_bytes, 4);
    assert!(hit.type_id.is_similar(f.u32t));
    let first = member_by_native_offset(&f.db, f.pair, 0).expect("member");
    assert_eq!(first.native_offset_bytes, 0);
    assert_eq!(
        member_by_native_offset(&f.db, f.pair, 8),
        Err(Status::InvalidIndex)
    );

    // On a derivative, the base inclusion is the immediate child.
    let base_hit = member_by_native_offset(&f.db, f.frame_b, 0).expect("member");
    assert!(base_hit.type_id.is_similar(f.frame));
}

#[test]
fn test_member_index_errors() {
    let f = fixture();
    assert_eq!(
        member_by_index(&f.db, f.pair, 2),
        Err(Status::InvalidIndex)
    );
    assert_eq!(
        member_by_index(&f.db, f.u32t, 0),
        Err(Status::InvalidIndex)
    );
    let info = type_info(&f.db, f.pair).expect("info");
    assert_eq!(info.kind, BasicKind::Record);
    assert_eq!(info.element_count, 2);
    assert_eq!(info.packed_bits, 64);
    assert_eq!(info.native_bytes, 8);
}

#[test]
fn test_enumeration_display_round_trip() {
    let f = fixture();
    let text =
        scalar_to_string(&f.db, f.mode, &GenericValue::Unsigned(2)).expect("to string");
    assert_eq!(text, "SCIENCE");
    let value = scalar_from_string(&f.db, f.mode, "NOMINAL").expect("from string");
    assert_eq!(value, GenericValue::Unsigned(1));
    // Unlabeled values fall back to numerals both ways.
    assert_eq!(
        scalar_to_string(&f.db, f.mode, &GenericValue::Unsigned(9)).expect("to string"),
        "9"
    );
    assert_eq!(
        scalar_from_string(&f.db, f.mode, "7").expect("from string"),
        GenericValue::Unsigned(7)
    );
    assert_eq!(
        scalar_from_string(&f.db, f.mode, "STANDBY"),
        Err(Status::NameNotFound)
    );
}

#[test]
fn test_boolean_and_address_display() {
    let f = fixture();
    assert_eq!(
        scalar_to_string(&f.db, f.flag, &GenericValue::Unsigned(1)).expect("to string"),
        "TRUE"
    );
    assert_eq!(
        scalar_to_string(&f.db, f.flag, &GenericValue::Unsigned(0)).expect("to string"),
        "FALSE"
    );
    assert_eq!(
        scalar_from_string(&f.db, f.flag, "false").expect("from string"),
        GenericValue::Unsigned(0)
    );
    assert_eq!(
        scalar_to_string(&f.db, f.addr, &GenericValue::Unsigned(0xDEAD)).expect("to string"),
        "0x0000DEAD"
    );
    assert_eq!(
        scalar_from_string(&f.db, f.addr, "0xDEAD").expect("from string"),
        GenericValue::Unsigned(0xDEAD)
    );
}

#[test]
fn test_string_conversion_rejects_composites_and_overflow() {
    let f = fixture();
    assert_eq!(
        scalar_to_string(&f.db, f.pair, &GenericValue::Unsigned(0)),
        Err(Status::InvalidSizeOrType)
    );
    assert_eq!(
        scalar_from_string(&f.db, f.pair, "1"),
        Err(Status::InvalidSizeOrType)
    );
    // 8-bit field: 256 does not fit the declared width.
    assert_eq!(
        scalar_from_string(&f.db, f.flag, "256"),
        Err(Status::InvalidSizeOrType)
    );
    assert_eq!(
        scalar_from_string(&f.db, f.u32t, "4294967295").expect("fits"),
        GenericValue::Unsigned(0xFFFF_FFFF)
    );
}
