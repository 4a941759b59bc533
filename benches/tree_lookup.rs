//! Micro-benchmarks for flat-index lookups on a populated navigation tree.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use navcache::{NavigationTree, PageRecord, SnapshotSpec};

fn populated_tree(nodes: u64) -> NavigationTree {
    let spec = SnapshotSpec::default();
    let mut tree = NavigationTree::new();
    for id in 1..=nodes {
        // Ten children per parent, roots every hundredth node.
        let parent = if id % 100 == 1 { 0 } else { (id / 10).max(1) };
        let record = PageRecord::stub(id, parent, &format!("Page {id}"));
        tree.insert(spec.convert_page(Some(&record)).unwrap());
    }
    tree
}

fn bench_site_map_lookup(c: &mut Criterion) {
    let tree = populated_tree(10_000);
    c.bench_function("site_map_get_10k", |b| {
        b.iter(|| {
            for id in [1_u64, 500, 5_000, 9_999] {
                black_box(tree.get(black_box(id)));
            }
        })
    });
}

fn bench_ancestor_chain(c: &mut Criterion) {
    let tree = populated_tree(10_000);
    c.bench_function("ancestors_of_10k", |b| {
        b.iter(|| black_box(tree.ancestors_of(black_box(9_999))))
    });
}

fn bench_menu_resolution(c: &mut Criterion) {
    let tree = populated_tree(10_000);
    c.bench_function("menu_level_2_10k", |b| {
        b.iter(|| black_box(tree.menu(2, black_box(5_000), None)).len())
    });
}

criterion_group!(
    benches,
    bench_site_map_lookup,
    bench_ancestor_chain,
    bench_menu_resolution
);
criterion_main!(benches);
