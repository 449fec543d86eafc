//! Benchmarks for signature parsing.
//!
//! Every blob is decoded into interned `TypeId`s, so after the first iteration these
//! measure the decoder plus the pool's hash-consing lookups:
//! - Method signatures (simple, generic, byref)
//! - Field and local variable signatures
//! - Type specification and method specification signatures

extern crate dotvtable;

use criterion::{criterion_group, criterion_main, Criterion};
use dotvtable::{
    metadata::{
        signatures::{
            parse_field_signature, parse_local_var_signature, parse_method_signature,
            parse_method_spec_signature, parse_type_spec_signature,
        },
        token::Token,
        typesystem::{ModuleId, TypeDefId, TypeId, TypePool},
    },
    Result,
};
use std::hint::black_box;

const MAX_DEPTH: usize = 50;

/// Resolves every TypeDefOrRef token to a definition in module 0.
fn resolver(pool: &TypePool) -> impl Fn(Token) -> Result<TypeId> + '_ {
    move |token: Token| Ok(pool.def(TypeDefId::new(ModuleId(0), token.row())))
}

/// Benchmark parsing a simple void method with no parameters.
/// Signature: void Method()
fn bench_method_signature_void_no_params(c: &mut Criterion) {
    let pool = TypePool::new();
    let resolve = resolver(&pool);
    // DEFAULT calling convention, 0 params, VOID return
    let signature = [0x00, 0x00, 0x01];

    c.bench_function("sig_method_void_no_params", |b| {
        b.iter(|| {
            let sig =
                parse_method_signature(black_box(&signature), &pool, &resolve, MAX_DEPTH).unwrap();
            black_box(sig)
        });
    });
}

/// Benchmark parsing an instance method with primitive parameters.
/// Signature: int Instance.Method(int a, string b, bool c)
fn bench_method_signature_primitives(c: &mut Criterion) {
    let pool = TypePool::new();
    let resolve = resolver(&pool);
    // HASTHIS, 3 params, I4 return, I4, STRING, BOOLEAN params
    let signature = [0x20, 0x03, 0x08, 0x08, 0x0E, 0x02];

    c.bench_function("sig_method_primitives", |b| {
        b.iter(|| {
            let sig =
                parse_method_signature(black_box(&signature), &pool, &resolve, MAX_DEPTH).unwrap();
            black_box(sig)
        });
    });
}

/// Benchmark parsing a generic method signature.
/// Signature: TResult Method<T, TResult>(T input)
fn bench_method_signature_generic(c: &mut Criterion) {
    let pool = TypePool::new();
    let resolve = resolver(&pool);
    // HASTHIS | GENERIC, 2 generic params, 1 method param, MVAR(1) return, MVAR(0) param
    let signature = [0x30, 0x02, 0x01, 0x1E, 0x01, 0x1E, 0x00];

    c.bench_function("sig_method_generic", |b| {
        b.iter(|| {
            let sig =
                parse_method_signature(black_box(&signature), &pool, &resolve, MAX_DEPTH).unwrap();
            black_box(sig)
        });
    });
}

/// Benchmark parsing a method with byref and class parameters.
/// Signature: void Method(ref int a, Demo.Hello b)
fn bench_method_signature_byref(c: &mut Criterion) {
    let pool = TypePool::new();
    let resolve = resolver(&pool);
    // DEFAULT, 2 params, VOID return, BYREF I4, CLASS TypeDef 2
    let signature = [0x00, 0x02, 0x01, 0x10, 0x08, 0x12, 0x08];

    c.bench_function("sig_method_byref", |b| {
        b.iter(|| {
            let sig =
                parse_method_signature(black_box(&signature), &pool, &resolve, MAX_DEPTH).unwrap();
            black_box(sig)
        });
    });
}

/// Benchmark parsing a field of a closed generic type.
/// Signature: List`1<int32>
fn bench_field_signature_generic_inst(c: &mut Criterion) {
    let pool = TypePool::new();
    let resolve = resolver(&pool);
    // FIELD, GENERICINST CLASS TypeDef 3, 1 arg, I4
    let signature = [0x06, 0x15, 0x12, 0x0C, 0x01, 0x08];

    c.bench_function("sig_field_generic_inst", |b| {
        b.iter(|| {
            let sig =
                parse_field_signature(black_box(&signature), &pool, &resolve, MAX_DEPTH).unwrap();
            black_box(sig)
        });
    });
}

/// Benchmark parsing a local variable signature with pinned and array locals.
fn bench_local_var_signature(c: &mut Criterion) {
    let pool = TypePool::new();
    let resolve = resolver(&pool);
    // LOCAL_SIG, 4 locals: I4, STRING, PINNED BYREF U1, SZARRAY OBJECT
    let signature = [0x07, 0x04, 0x08, 0x0E, 0x45, 0x10, 0x05, 0x1D, 0x1C];

    c.bench_function("sig_local_vars", |b| {
        b.iter(|| {
            let sig = parse_local_var_signature(black_box(&signature), &pool, &resolve, MAX_DEPTH)
                .unwrap();
            black_box(sig)
        });
    });
}

/// Benchmark parsing a multi-dimensional array TypeSpec.
/// Signature: int32[0..2, 0..]
fn bench_type_spec_array(c: &mut Criterion) {
    let pool = TypePool::new();
    let resolve = resolver(&pool);
    // ARRAY I4, rank 2, 1 size (3), 2 lower bounds (0, 0)
    let signature = [0x14, 0x08, 0x02, 0x01, 0x03, 0x02, 0x00, 0x00];

    c.bench_function("sig_type_spec_array", |b| {
        b.iter(|| {
            let ty = parse_type_spec_signature(black_box(&signature), &pool, &resolve, MAX_DEPTH)
                .unwrap();
            black_box(ty)
        });
    });
}

/// Benchmark parsing a MethodSpec instantiation.
/// Signature: <string, Dictionary`2<int32, !!0>>
fn bench_method_spec(c: &mut Criterion) {
    let pool = TypePool::new();
    let resolve = resolver(&pool);
    let signature = [
        0x0A, 0x02, 0x0E, 0x15, 0x12, 0x10, 0x02, 0x08, 0x1E, 0x00,
    ];

    c.bench_function("sig_method_spec", |b| {
        b.iter(|| {
            let sig =
                parse_method_spec_signature(black_box(&signature), &pool, &resolve, MAX_DEPTH)
                    .unwrap();
            black_box(sig)
        });
    });
}

criterion_group!(
    benches,
    bench_method_signature_void_no_params,
    bench_method_signature_primitives,
    bench_method_signature_generic,
    bench_method_signature_byref,
    bench_field_signature_generic_inst,
    bench_local_var_signature,
    bench_type_spec_array,
    bench_method_spec,
);
criterion_main!(benches);
