use std::convert::Infallible;
use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use pcbook::proto::memory::Unit;
use pcbook::proto::{Filter, Memory};
use pcbook::sample;
use pcbook::store::{InMemoryLaptopStore, is_qualified};

fn filter() -> Filter {
    Filter {
        max_price_usd: 3000.0,
        min_cpu_cores: 4,
        min_cpu_ghz: 2.5,
        min_ram: Some(Memory::new(8, Unit::Gigabyte)),
    }
}

fn bench_is_qualified(c: &mut Criterion) {
    let laptop = sample::new_laptop(&mut rand::thread_rng());
    let filter = filter();

    c.bench_function("is_qualified", |b| {
        b.iter(|| is_qualified(black_box(&filter), black_box(&laptop)))
    });
}

fn bench_store_search(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    let filter = filter();
    let mut group = c.benchmark_group("store_search");

    for size in [100usize, 1_000, 10_000] {
        let store = InMemoryLaptopStore::new();
        rt.block_on(async {
            let mut rng = rand::thread_rng();
            for _ in 0..size {
                store.save(&sample::new_laptop(&mut rng)).await.unwrap();
            }
        });

        group.bench_with_input(BenchmarkId::from_parameter(size), &store, |b, store| {
            b.iter(|| {
                rt.block_on(async {
                    let mut found = 0usize;
                    store
                        .search(black_box(&filter), |_| {
                            found += 1;
                            async { Ok::<(), Infallible>(()) }
                        })
                        .await
                        .unwrap();
                    found
                })
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_is_qualified, bench_store_search);
criterion_main!(benches);
