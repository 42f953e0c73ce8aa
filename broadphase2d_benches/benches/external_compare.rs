// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

#![cfg(feature = "compare_rstar")]

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};

use broadphase2d::{Aabb, AabbProducer, Broadphase, DynamicAabbTree};

use rstar::primitives::Rectangle;
use rstar::{RTree, AABB};

#[derive(Copy, Clone)]
struct RectBody(Aabb);

struct IdentityProducer;
impl AabbProducer<RectBody> for IdentityProducer {
    fn aabb(&self, object: &RectBody) -> Aabb {
        object.0
    }
}

fn gen_grid_rects(n: usize, cell: f64) -> Vec<RectBody> {
    let mut out = Vec::with_capacity(n * n);
    for y in 0..n {
        for x in 0..n {
            let x0 = x as f64 * cell;
            let y0 = y as f64 * cell;
            out.push(RectBody(Aabb::new(x0, y0, x0 + cell, y0 + cell)));
        }
    }
    out
}

fn to_rstar_rects(v: &[RectBody]) -> Vec<Rectangle<[f64; 2]>> {
    v.iter()
        .map(|r| Rectangle::from_corners([r.0.min_x, r.0.min_y], [r.0.max_x, r.0.max_y]))
        .collect()
}

fn bench_dynamic_tree_external_compare_f64(c: &mut Criterion) {
    let mut group = c.benchmark_group("dynamic_tree_external_compare_f64");
    for &n in &[64usize, 128] {
        let rects = gen_grid_rects(n, 10.0);
        let query = Aabb::new(100.0, 100.0, 500.0, 500.0);
        group.throughput(Throughput::Elements((n * n) as u64));

        group.bench_function(format!("broadphase2d_build_query_n{n}"), |b| {
            b.iter_batched(
                || DynamicAabbTree::new(IdentityProducer),
                |mut idx| {
                    for &r in &rects {
                        idx.insert(r).expect("grid rects are finite");
                    }
                    let hits: usize = idx.detect_aabb(query).count();
                    black_box(hits);
                },
                BatchSize::SmallInput,
            )
        });

        group.bench_function(format!("rstar_build_query_bulk_n{n}"), |b| {
            b.iter_batched(
                || to_rstar_rects(&rects),
                |rectangles| {
                    let tree = RTree::bulk_load(rectangles);
                    let aabb = AABB::from_corners(
                        [query.min_x, query.min_y],
                        [query.max_x, query.max_y],
                    );
                    let hits: usize = tree.locate_in_envelope_intersecting(&aabb).count();
                    black_box(hits);
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

criterion_group!(benches, bench_dynamic_tree_external_compare_f64);
criterion_main!(benches);
