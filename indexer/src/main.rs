use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use locutions::tokenizer::{Algorithm, Analyzer};
use locutions::Store;
use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct InputDoc {
    #[serde(alias = "text", alias = "abstract")]
    body: String,
}

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Count locution frequencies into a persistent store", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Count the locutions of JSON/JSONL documents into a store
    Count {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
        /// Store directory, created when missing
        #[arg(long)]
        store: String,
        /// Words per locution
        #[arg(long, default_value_t = 2)]
        ngram: usize,
        /// Flush to disk after this many documents
        #[arg(long, default_value_t = 10_000)]
        flush_every: u64,
        /// Apply English stemming to tokens
        #[arg(long, default_value_t = false)]
        stem: bool,
    },
    /// Fold sibling stores into one and flush it
    Merge {
        /// Destination store, created when missing
        #[arg(long)]
        into: String,
        /// Stores to fold in, each at most once
        #[arg(required = true)]
        sources: Vec<String>,
    },
    /// Print store size and the most frequent keys
    Stats {
        #[arg(long)]
        store: String,
        #[arg(long, default_value_t = 20)]
        top: usize,
    },
    /// Score the locutions of a sentence against a store
    Score {
        #[arg(long)]
        store: String,
        #[arg(long, default_value_t = 2)]
        ngram: usize,
        #[arg(long, default_value_t = false)]
        stem: bool,
        text: String,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Count { input, store, ngram, flush_every, stem } => {
            let analyzer = analyzer(ngram, stem);
            let mut store = Store::open(&store, true).with_context(|| format!("opening store {store}"))?;
            let docs = count_corpus(Path::new(&input), &mut store, &analyzer, flush_every)?;
            tracing::info!(docs, keys = store.len(), total = store.total(), "count complete");
            Ok(())
        }
        Commands::Merge { into, sources } => merge_stores(&into, &sources),
        Commands::Stats { store, top } => {
            let store = Store::open(&store, false).with_context(|| format!("opening store {store}"))?;
            println!("keys\t{}", store.len());
            println!("documents\t{}", store.total());
            for (key, counts) in top_keys(&store, top) {
                println!("{}\t{}\t{}", counts.tf, counts.df, key);
            }
            Ok(())
        }
        Commands::Score { store, ngram, stem, text } => {
            let store = Store::open(&store, false).with_context(|| format!("opening store {store}"))?;
            for line in score_text(&store, &analyzer(ngram, stem), &text) {
                println!("{line}");
            }
            Ok(())
        }
    }
}

fn analyzer(ngram: usize, stem: bool) -> Analyzer {
    let a = Analyzer::new(ngram);
    if stem { a.with_stemming(Algorithm::English) } else { a }
}

fn input_files(input_path: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input_path.is_dir() {
        for entry in WalkDir::new(input_path).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() {
                if let Some(ext) = p.extension().and_then(|s| s.to_str()) {
                    if matches!(ext, "json" | "jsonl") {
                        files.push(p.to_path_buf());
                    }
                }
            }
        }
    } else if input_path.is_file() {
        files.push(input_path.to_path_buf());
    }
    files
}

/// Count every document under `input`, flushing every `flush_every` documents and at the end.
fn count_corpus(input: &Path, store: &mut Store, analyzer: &Analyzer, flush_every: u64) -> Result<u64> {
    let files = input_files(input);
    if files.is_empty() {
        bail!("no .json or .jsonl input under {}", input.display());
    }
    let mut docs: u64 = 0;
    for file in files {
        let mut ingest = |doc: InputDoc| -> Result<()> {
            store.add_counter(analyzer.count(&doc.body))?;
            docs += 1;
            if flush_every > 0 && docs % flush_every == 0 {
                store.write()?;
                tracing::info!(docs, keys = store.len(), "periodic flush");
            }
            Ok(())
        };
        if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
            read_jsonl(&file, &mut ingest)?;
        } else {
            read_json(&file, &mut ingest)?;
        }
    }
    store.write()?;
    Ok(docs)
}

fn read_jsonl(file: &Path, ingest: &mut impl FnMut(InputDoc) -> Result<()>) -> Result<()> {
    let reader = BufReader::new(File::open(file)?);
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        let doc: InputDoc = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}", file.display(), line_no + 1))?;
        ingest(doc)?;
    }
    Ok(())
}

fn read_json(file: &Path, ingest: &mut impl FnMut(InputDoc) -> Result<()>) -> Result<()> {
    let reader = BufReader::new(File::open(file)?);
    let json: serde_json::Value = serde_json::from_reader(reader)?;
    match json {
        serde_json::Value::Array(arr) => {
            for v in arr {
                ingest(serde_json::from_value(v)?)?;
            }
        }
        serde_json::Value::Object(_) => ingest(serde_json::from_value(json)?)?,
        _ => tracing::warn!(file = %file.display(), "skipping JSON that is neither object nor array"),
    }
    Ok(())
}

fn merge_stores(into: &str, sources: &[String]) -> Result<()> {
    let mut target = Store::open(into, true).with_context(|| format!("opening store {into}"))?;
    let target_dir = fs::canonicalize(target.path())?;
    for src in sources {
        if fs::canonicalize(src).ok().as_ref() == Some(&target_dir) {
            bail!("refusing to merge {src} into itself");
        }
        let other = Store::open(src, false).with_context(|| format!("opening store {src}"))?;
        target.merge(&other);
    }
    target.write()?;
    tracing::info!(into, sources = sources.len(), keys = target.len(), total = target.total(), "merge complete");
    Ok(())
}

fn top_keys(store: &Store, n: usize) -> Vec<(String, locutions::Counts)> {
    let mut items: Vec<_> = store.items().collect();
    items.sort_by(|a, b| b.1.tf.cmp(&a.1.tf).then_with(|| a.0.cmp(&b.0)));
    items.truncate(n);
    items
}

/// One line per locution: its tf-idf, or `!` when the store has never seen it.
fn score_text(store: &Store, analyzer: &Analyzer, text: &str) -> Vec<String> {
    analyzer
        .locutions(text)
        .into_iter()
        .map(|loc| {
            if store.contains(&loc) {
                format!("{:.4}\t{}", store.tf_idf(&loc), loc)
            } else {
                format!("!\t{loc}")
            }
        })
        .collect()
}
