use std::env;
use std::path::PathBuf;

use passagedb_core::config::Config;
use passagedb_hybrid::RetrievalService;
use tracing::info;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "Usage: passagedb [--config-dir DIR] <query \"<text>\" [k] [--alpha A] [--json] | warm | invalidate>";

fn parse_args() -> (Option<PathBuf>, String, Vec<String>) {
    let mut args: Vec<String> = env::args().skip(1).collect();
    let mut config_dir = None;
    if args.first().map(String::as_str) == Some("--config-dir") {
        args.remove(0);
        if args.is_empty() { eprintln!("{}", USAGE); std::process::exit(1); }
        config_dir = Some(PathBuf::from(args.remove(0)));
    }
    if args.is_empty() { eprintln!("{}", USAGE); std::process::exit(1); }
    let cmd = args.remove(0);
    (config_dir, cmd, args)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let (config_dir, cmd, args) = parse_args();
    let config = match &config_dir {
        Some(dir) => Config::load_from(dir),
        None => Config::load(),
    }
    .map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    let service = RetrievalService::from_config(&config)?;

    match cmd.as_str() {
        "query" => {
            let mut positional = Vec::new();
            let mut alpha = None;
            let mut json = false;
            let mut rest = args.into_iter();
            while let Some(arg) = rest.next() {
                match arg.as_str() {
                    "--json" => json = true,
                    "--alpha" => {
                        let value = rest.next().ok_or_else(|| anyhow::anyhow!("--alpha needs a value"))?;
                        alpha = Some(value.parse::<f32>().map_err(|e| anyhow::anyhow!("bad --alpha '{}': {}", value, e))?);
                    }
                    _ => positional.push(arg),
                }
            }
            let Some(query) = positional.first().cloned() else {
                eprintln!("{}", USAGE);
                std::process::exit(1);
            };
            // negative k behaves like 0
            let top_k = match positional.get(1) {
                Some(raw) => Some(raw.parse::<i64>().map_err(|e| anyhow::anyhow!("bad k '{}': {}", raw, e))?.max(0) as usize),
                None => None,
            };
            let outcome = service.retrieve_detailed_with_alpha(&query, top_k, alpha.unwrap_or(service.alpha()))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
                return Ok(());
            }
            println!("Query: {}", query);
            println!("Dense tier: {} ({})", outcome.dense_tier, outcome.encoder_id.as_deref().unwrap_or("none"));
            println!("Found {} results", outcome.results.len());
            for (i, r) in outcome.results.iter().enumerate() {
                println!("\n  {}. score={:.4}  dense={:.4}  bm25={:.4}  id={}  source={}", i + 1, r.score, r.score_dense, r.score_bm25, r.id, r.source);
                println!("     {}", r.text);
            }
        }
        "warm" => {
            let report = service.warm()?;
            println!("Corpus: {} passages", report.passages);
            match &report.lexical_error {
                None => println!("Lexical index: ready"),
                Some(e) => println!("Lexical index: FAILED ({})", e),
            }
            for t in &report.tiers {
                let status = if t.ready { "ready".to_string() } else { format!("unavailable ({})", t.error.as_deref().unwrap_or("unknown")) };
                println!("Dense {}: {} {}", t.tier, t.encoder_id.as_deref().unwrap_or("-"), status);
            }
        }
        "invalidate" => {
            let ids = service.invalidate_dense_cache()?;
            info!(count = ids.len(), "dense caches invalidated");
            for id in &ids { println!("invalidated {}", id); }
            if ids.is_empty() { println!("No dense tier could be instantiated; nothing invalidated"); }
        }
        _ => { eprintln!("Unknown command: {}\n{}", cmd, USAGE); std::process::exit(1); }
    }
    Ok(())
}
