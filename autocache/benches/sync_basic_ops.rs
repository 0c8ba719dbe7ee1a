use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use fibre_autocache::{Cache, CacheBuilder};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

const NUM_KEYS: usize = 1024;
const CONCURRENCY: usize = 4;

// --- Setup ---

fn build_cache() -> Arc<Cache<String>> {
  let cache = CacheBuilder::new()
    .fetcher(|key: &str| Ok(key.to_string()))
    .refresh(Duration::from_secs(60))
    .is_same(|_, a: Option<&String>, b: &String| a == Some(b))
    .build()
    .unwrap();
  Arc::new(cache)
}

fn keys() -> Vec<String> {
  (0..NUM_KEYS).map(|i| format!("key-{i}")).collect()
}

fn warm(cache: &Cache<String>, keys: &[String]) {
  for key in keys {
    cache.set_default(key, key.clone());
  }
}

// Runs `op` over every key on `CONCURRENCY` threads, timing only the work.
fn run_parallel<F>(cache: &Arc<Cache<String>>, keys: &Arc<Vec<String>>, iters: u64, op: F) -> Duration
where
  F: Fn(&Cache<String>, &str) + Send + Sync + Copy + 'static,
{
  let barrier = Arc::new(Barrier::new(CONCURRENCY + 1));
  let handles: Vec<_> = (0..CONCURRENCY)
    .map(|t| {
      let cache = cache.clone();
      let keys = keys.clone();
      let barrier = barrier.clone();
      thread::spawn(move || {
        barrier.wait();
        for i in 0..iters as usize {
          op(&cache, &keys[(i * CONCURRENCY + t) % keys.len()]);
        }
      })
    })
    .collect();

  barrier.wait();
  let start = Instant::now();
  for handle in handles {
    handle.join().unwrap();
  }
  start.elapsed()
}

// --- Benchmark Functions ---

fn bench_get(c: &mut Criterion) {
  let cache = build_cache();
  let keys = Arc::new(keys());
  warm(&cache, &keys);

  let mut group = c.benchmark_group("Get");
  group.throughput(Throughput::Elements(1));
  group.bench_function("single", |b| {
    let mut i = 0;
    b.iter(|| {
      i = (i + 1) % NUM_KEYS;
      black_box(cache.get(&keys[i]).unwrap());
    })
  });
  group.bench_function("parallel", |b| {
    b.iter_custom(|iters| {
      run_parallel(&cache, &keys, iters, |cache, key| {
        black_box(cache.get(key).unwrap());
      })
    })
  });
  group.finish();
  cache.close();
}

fn bench_get_or_set(c: &mut Criterion) {
  let cache = build_cache();
  let keys = Arc::new(keys());
  warm(&cache, &keys);

  let mut group = c.benchmark_group("GetOrSet");
  group.throughput(Throughput::Elements(1));
  group.bench_function("single", |b| {
    let mut i = 0;
    b.iter(|| {
      i = (i + 1) % NUM_KEYS;
      black_box(cache.get_or_set(&keys[i], String::new()));
    })
  });
  group.bench_function("parallel", |b| {
    b.iter_custom(|iters| {
      run_parallel(&cache, &keys, iters, |cache, key| {
        black_box(cache.get_or_set(key, String::new()));
      })
    })
  });
  group.finish();
  cache.close();
}

fn bench_refresh(c: &mut Criterion) {
  let cache = build_cache();
  warm(&cache, &keys());

  let mut group = c.benchmark_group("Refresh");
  group.throughput(Throughput::Elements(NUM_KEYS as u64));
  group.bench_function("sweep", |b| b.iter(|| cache.run_refresh_sweep()));
  group.finish();
  cache.close();
}

criterion_group!(benches, bench_get, bench_get_or_set, bench_refresh);
criterion_main!(benches);
