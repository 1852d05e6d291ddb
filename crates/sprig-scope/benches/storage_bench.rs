use std::sync::Arc;
use std::thread;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use sprig_scope::{Bean, Contextual, ContextualStorage};

fn bench_uncontended(c: &mut Criterion) {
    let storage = ContextualStorage::new(true, false);
    let bean: Arc<dyn Contextual> = Bean::new(|_| Ok(0u64)).into_contextual();
    storage.get_or_create(&bean).unwrap();

    c.bench_function("get_or_create_existing", |b| {
        b.iter(|| black_box(storage.get_or_create(&bean).unwrap()))
    });

    let local = ContextualStorage::new(false, false);
    local.get_or_create(&bean).unwrap();
    c.bench_function("get_or_create_existing_local", |b| {
        b.iter(|| black_box(local.get_or_create(&bean).unwrap()))
    });
}

fn bench_create_destroy(c: &mut Criterion) {
    let beans: Vec<Arc<dyn Contextual>> = (0..64u64).map(|i| Bean::new(move |_| Ok(i)).into_contextual()).collect();
    let storage = ContextualStorage::new(true, true);

    c.bench_function("create_64_then_destroy_all", |b| {
        b.iter(|| {
            for bean in &beans {
                storage.get_or_create(bean).unwrap();
            }
            black_box(storage.destroy_all())
        })
    });
}

fn bench_contended(c: &mut Criterion) {
    let bean: Arc<dyn Contextual> = Bean::new(|_| Ok(0u64)).into_contextual();

    c.bench_function("contended_first_access_8_threads", |b| {
        b.iter(|| {
            let storage = Arc::new(ContextualStorage::new(true, false));
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let storage = storage.clone();
                    let bean = bean.clone();
                    thread::spawn(move || {
                        storage.get_or_create(&bean).unwrap();
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }
        })
    });
}

criterion_group!(benches, bench_uncontended, bench_create_destroy, bench_contended);
criterion_main!(benches);
