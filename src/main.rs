mod api;
mod classifier;
mod config;
mod core;
mod db;
mod llm;
mod narrator;
mod scheduler;
mod signals;
mod types;
mod utils;
mod vault;


use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // .env is optional; real deployments set the environment directly.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() > 1 {
        match args[1].as_str() {
            "--version" | "-V" => {
                println!("braind {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" => {
                println!("braind {}", env!("CARGO_PKG_VERSION"));
                println!("{}\n", env!("CARGO_PKG_DESCRIPTION"));
                println!("Usage: braind");
                println!();
                println!("Configuration is read from the environment:");
                println!("  PORT                 listen port (default 8080)");
                println!("  VAULT_PATH           vault root directory (required)");
                println!("  DB_PATH              SQLite database file (required)");
                println!("  OLLAMA_URL           Ollama base URL (default http://localhost:11434)");
                println!("  OLLAMA_MODEL         light model (default qwen2.5:7b)");
                println!("  OLLAMA_MODEL_HEAVY   heavy model (default qwen2.5:14b)");
                println!("  TOKEN_<ACTOR>        bearer token per actor (at least one required)");
                println!("  TIMEZONE             IANA timezone (default Europe/London)");
                println!();
                println!("Options:");
                println!("  -h, --help       Print help");
                println!("  -V, --version    Print version");
                return Ok(());
            }
            other => {
                eprintln!("Unknown argument: '{}'. Try --help.", other);
                std::process::exit(1);
            }
        }
    }

    let config = config::Config::load()?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(core::run(config))
}
