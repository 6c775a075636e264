// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Pack/unpack throughput over a representative command packet.

use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use wirepack::{pack_complete, unpack_complete, ComputedFields, ModuleBuilder, Registry, TypeId};

fn command_fixture() -> (Registry, TypeId) {
    let mut schema = ModuleBuilder::new("bench", 1);
    let u3 = schema.unsigned("u3", 3);
    let u1 = schema.unsigned("u1", 1);
    let u11 = schema.unsigned("u11", 11);
    let u2 = schema.unsigned("u2", 2);
    let u14 = schema.unsigned("u14", 14);
    let u16t = schema.unsigned("u16", 16);
    let u8t = schema.unsigned("u8", 8);
    let u32t = schema.unsigned("u32", 32);

    let pri = schema
        .record("PriHdr")
        .field("version", u3)
        .field("ptype", u1)
        .field("sechdr", u1)
        .field("apid", u11)
        .field("grouping", u2)
        .field("sequence", u14)
        .length("length", u16t, -7)
        .build()
        .expect("pri");
    let sec = schema
        .record("CmdSec")
        .field("function", u8t)
        .error_control("checksum", u8t, wirepack::ErrorControl::Crc16Ccitt)
        .build()
        .expect("sec");
    let payload = schema.array("words", u32t, 8).expect("payload");
    let cmd = schema
        .record("Command")
        .field("pri", pri)
        .field("sec", sec)
        .field("data", payload)
        .build()
        .expect("cmd");

    let mut db = Registry::new();
    db.register(schema.build()).expect("register");
    (db, cmd)
}

fn bench_codec(c: &mut Criterion) {
    let (db, cmd) = command_fixture();
    let info = wirepack::type_info(&db, cmd).expect("info");
    let native = vec![0x5Au8; info.native_bytes as usize];
    let bits = info.packed_bits as usize;
    let mut packed = vec![0u8; bits.div_ceil(8)];

    c.bench_function("pack_complete/command", |b| {
        b.iter(|| {
            let mut id = cmd;
            pack_complete(&db, &mut id, black_box(&mut packed), black_box(&native), bits)
                .expect("pack")
        })
    });

    let mut id = cmd;
    pack_complete(&db, &mut id, &mut packed, &native, bits).expect("pack");
    let mut decoded = vec![0u8; info.native_bytes as usize];

    c.bench_function("unpack_complete/command", |b| {
        b.iter(|| {
            let mut id = cmd;
            unpack_complete(
                &db,
                &mut id,
                black_box(&mut decoded),
                black_box(&packed),
                bits,
                ComputedFields::NONE,
            )
            .expect("unpack")
        })
    });
}

criterion_group!(benches, bench_codec);
criterion_main!(benches);
