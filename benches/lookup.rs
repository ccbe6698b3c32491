//! Benchmarks for extension data lookup and layout construction.
//!
//! Covers the hot retrieval path for both lookup strategies:
//! - Ordered lookup through a deep single-inheritance chain
//! - Hashed lookup through a wide multiple-inheritance hierarchy
//! - Misses for types that own nothing in the instance
//! - Type creation, which builds and validates the layout

extern crate objlayout;

use criterion::{criterion_group, criterion_main, Criterion};
use objlayout::{
    get_extension_data, LayoutConfig, ManagedTypeRc, ObjectBlock, TypeRegistry, TypeSpec,
};
use std::hint::black_box;

fn registry() -> TypeRegistry {
    TypeRegistry::with_config(LayoutConfig::deterministic(0x5EED))
}

/// Build a single-inheritance chain of `depth` types, each owning 8 bytes
fn chain(registry: &TypeRegistry, depth: usize) -> Vec<ManagedTypeRc> {
    let mut types: Vec<ManagedTypeRc> = Vec::with_capacity(depth);
    for level in 0..depth {
        let mut spec = TypeSpec::new(format!("Level{level}")).extension_size(8);
        if let Some(parent) = types.last() {
            spec = spec.base(parent.handle);
        }
        types.push(registry.create_type(spec).unwrap());
    }
    types
}

/// Benchmark an ordered lookup of the root block from a 32 level deep leaf.
fn bench_ordered_lookup(c: &mut Criterion) {
    let registry = registry();
    let types = chain(&registry, 32);
    let object = ObjectBlock::allocate(types.last().unwrap()).unwrap();
    let root = &types[0];

    c.bench_function("lookup_ordered_deep", |b| {
        b.iter(|| black_box(get_extension_data(black_box(&object), black_box(root))));
    });
}

/// Benchmark hashed lookups across all owners of a 16-way multiple inheritance.
fn bench_hashed_lookup(c: &mut Criterion) {
    let registry = registry();
    let mixins: Vec<ManagedTypeRc> = (0..16)
        .map(|index| {
            registry
                .create_type(TypeSpec::new(format!("Mixin{index}")).extension_size(8))
                .unwrap()
        })
        .collect();
    let leaf = registry
        .create_type(
            TypeSpec::new("Leaf")
                .bases(mixins.iter().map(|mixin| mixin.handle))
                .extension_size(8),
        )
        .unwrap();
    let object = ObjectBlock::allocate(&leaf).unwrap();

    c.bench_function("lookup_hashed_wide", |b| {
        b.iter(|| {
            for mixin in &mixins {
                black_box(get_extension_data(black_box(&object), black_box(mixin)));
            }
        });
    });
}

/// Benchmark a lookup that misses.
fn bench_lookup_miss(c: &mut Criterion) {
    let registry = registry();
    let owner = registry
        .create_type(TypeSpec::new("Owner").extension_size(8))
        .unwrap();
    let stranger = registry
        .create_type(TypeSpec::new("Stranger").extension_size(8))
        .unwrap();
    let object = ObjectBlock::allocate(&owner).unwrap();

    c.bench_function("lookup_miss", |b| {
        b.iter(|| black_box(get_extension_data(black_box(&object), black_box(&stranger))));
    });
}

/// Benchmark creating a type whose layout falls back to hashed lookup.
fn bench_create_hashed_type(c: &mut Criterion) {
    let registry = registry();
    let bases: Vec<ManagedTypeRc> = (0..8)
        .map(|index| {
            registry
                .create_type(TypeSpec::new(format!("Base{index}")).extension_size(16))
                .unwrap()
        })
        .collect();

    c.bench_function("create_hashed_type", |b| {
        b.iter(|| {
            let ty = registry
                .create_type(
                    TypeSpec::new("Derived")
                        .bases(bases.iter().map(|base| base.handle))
                        .extension_size(8),
                )
                .unwrap();
            black_box(ty)
        });
    });
}

criterion_group!(
    benches,
    bench_ordered_lookup,
    bench_hashed_lookup,
    bench_lookup_miss,
    bench_create_hashed_type,
);
criterion_main!(benches);
