use std::sync::Arc;

use flair_transform::{CssCache, TransformOptions, transform};

/// Full pipeline with lightningcss, writing into a scratch directory.
fn bench_transform(bencher: divan::Bencher<'_, '_>, file_path: &str, source: &str) {
    let dir = tempfile::tempdir().unwrap();
    let options = TransformOptions::new()
        .with_css_out_dir(dir.path())
        .with_cache(Arc::new(CssCache::new()));

    bencher.bench_local(|| transform(source, file_path, &options).unwrap());
}

#[divan::bench]
fn button(bencher: divan::Bencher<'_, '_>) {
    bench_transform(bencher, "Button.tsx", include_str!("../tests/fixtures/Button.tsx"));
}

#[divan::bench]
fn card(bencher: divan::Bencher<'_, '_>) {
    bench_transform(bencher, "Card.tsx", include_str!("../tests/fixtures/Card.tsx"));
}

#[divan::bench]
fn siblings(bencher: divan::Bencher<'_, '_>) {
    bench_transform(bencher, "Siblings.tsx", include_str!("../tests/fixtures/Siblings.tsx"));
}

#[divan::bench]
fn dashboard(bencher: divan::Bencher<'_, '_>) {
    bench_transform(bencher, "Dashboard.tsx", include_str!("../tests/fixtures/Dashboard.tsx"));
}

fn main() {
    divan::main();
}
