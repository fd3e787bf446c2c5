use anyhow::Result;
use axum::Router;
use clap::Parser;
use std::net::SocketAddr;
use tracing_subscriber::{fmt, EnvFilter};
use server::{build_app, AppOptions};
use tokio::net::TcpListener;

#[derive(Parser)]
struct Args {
    /// Store directory path
    #[arg(long, default_value = "./store")]
    store: String,
    /// Create an empty store when none exists
    #[arg(long, default_value_t = false)]
    create: bool,
    /// Words per locution for /score and /index/batch
    #[arg(long, default_value_t = 2)]
    ngram: usize,
    /// Apply English stemming to tokens
    #[arg(long, default_value_t = false)]
    stem: bool,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();
    let options = AppOptions {
        ngram: args.ngram,
        stem: args.stem,
        create: args.create,
        admin_token: std::env::var("ADMIN_TOKEN").ok(),
    };
    let app: Router = build_app(args.store.clone(), options)?;

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
