// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Parser benchmarks.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ldraw_parser::parse;

const SMALL_MODEL: &str = "0 FILE house.ldr\r\n\
0 House\r\n\
0 Name: house.ldr\r\n\
0 Author: Bench\r\n\
1 4 0 0 0 1 0 0 0 1 0 0 0 1 3001.dat\r\n\
1 4 80 0 0 1 0 0 0 1 0 0 0 1 3001.dat\r\n\
0 STEP\r\n\
1 15 40 -24 0 1 0 0 0 1 0 0 0 1 3001.dat\r\n\
0 ROTSTEP 30 45 0 ABS\r\n";

/// Part-like document with many primitives
fn primitive_document(quads: usize) -> String {
    let mut ret = String::from("0 Generated\r\n0 BFC CERTIFY CCW\r\n");
    for i in 0..quads {
        let x = i as f64 * 1.5;
        ret.push_str(&format!(
            "4 16 {} 0 0 {} 0 1.25 {} 8 1.25 {} 8 0\r\n2 24 {} 0 0 {} 8 0\r\n",
            x,
            x + 1.5,
            x + 1.5,
            x,
            x,
            x
        ));
    }
    ret
}

fn parse_small(c: &mut Criterion) {
    c.bench_function("parse_small_model", |b| {
        b.iter(|| parse(black_box(SMALL_MODEL), "house.ldr"))
    });
}

fn parse_primitives(c: &mut Criterion) {
    let content = primitive_document(5_000);
    c.bench_function("parse_10k_primitives", |b| {
        b.iter(|| parse(black_box(&content), "part.dat"))
    });
}

criterion_group!(benches, parse_small, parse_primitives);
criterion_main!(benches);
