use criterion::{criterion_group, criterion_main, Criterion};
use locutions::tokenizer::Analyzer;

const TEXT: &str = "Anarchism is a political philosophy and movement that is skeptical of all \
justifications for authority and seeks to abolish the institutions it claims maintain unnecessary \
coercion and hierarchy. Anarchism advocates for the replacement of the state with stateless \
societies and voluntary free associations.";

fn bench_locutions(c: &mut Criterion) {
    let bigrams = Analyzer::new(2);
    c.bench_function("count_bigrams", |b| b.iter(|| bigrams.count(TEXT)));
    let trigrams = Analyzer::new(3);
    c.bench_function("count_trigrams", |b| b.iter(|| trigrams.count(TEXT)));
}

criterion_group!(benches, bench_locutions);
criterion_main!(benches);
