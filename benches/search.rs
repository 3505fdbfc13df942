use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use tourism_rag::embeddings::HashEmbedder;
use tourism_rag::index::FlatIndex;

const WORDS: &[&str] = &[
    "castle", "mosque", "bazaar", "kebab", "baklava", "museum", "mosaic", "river", "fortress",
    "hotel", "copper", "pistachio", "church", "park", "festival", "roman", "ancient", "market",
];

fn synthetic_documents(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| {
            (0..8)
                .map(|j| WORDS[(i * 7 + j * 13) % WORDS.len()])
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let embedder = HashEmbedder::new(384, 1337);
    let query = embedder.embed_text("historic castle near the river");

    let mut group = c.benchmark_group("flat_index_search");
    for size in [1_000, 10_000] {
        let rows: Vec<Vec<f32>> = synthetic_documents(size)
            .iter()
            .map(|text| embedder.embed_text(text))
            .collect();
        let index = FlatIndex::build(&rows).expect("can build index");

        group.bench_with_input(BenchmarkId::from_parameter(size), &index, |b, index| {
            b.iter(|| index.search(black_box(&query), black_box(45)))
        });
    }
    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
