//! Weight-matrix maintenance tool.
//!
//! Pre-computes interpolation matrices into the on-disk cache, exports them
//! for `matrix-import`, and manages shared-memory segments.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use serde::Serialize;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use regrid::{export_matrix, Method, MethodConfig, MethodKind};
use representation::Representation;
use weight_cache::{CacheConfig, CacheStatsSnapshot, LoaderKind};

#[derive(Parser, Debug)]
#[command(name = "regrid-weights")]
#[command(about = "Pre-compute, export and share interpolation weight matrices")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Cache root directory (overrides REGRID_CACHE_DIR)
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// Matrix loader: disabled, buffer, mmap or shared-memory
    #[arg(long, global = true)]
    loader: Option<LoaderKind>,

    /// Log level
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Assemble a matrix and commit it to the cache
    Precompute(Pair),

    /// Assemble a matrix and write it to a file
    Export {
        #[command(flatten)]
        pair: Pair,

        /// Destination file
        #[arg(long)]
        path: PathBuf,
    },

    /// Copy a cached matrix into shared memory
    LoadShm(Pair),

    /// Remove a matrix's shared-memory segment
    UnloadShm(Pair),
}

/// Input and output grids and the method between them.
#[derive(ClapArgs, Debug)]
struct Pair {
    /// Input grid name (e.g. O320, F48, H64, 0.25/0.25)
    #[arg(long)]
    input: String,

    /// Output grid name
    #[arg(long)]
    output: String,

    /// Interpolation method (overrides the configuration)
    #[arg(long)]
    method: Option<MethodKind>,

    /// YAML method configuration (default: from REGRID_* variables)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct Summary {
    method: String,
    input: String,
    output: String,
    key: String,
    outcome: String,
    rows: usize,
    cols: usize,
    nnz: usize,
    stats: CacheStatsSnapshot,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let mut cache_config = CacheConfig::from_env();
    if let Some(dir) = &args.cache_dir {
        cache_config.cache_dir = dir.clone();
    }
    if let Some(loader) = args.loader {
        cache_config.matrix_loader = loader;
    }
    if let Err(e) = cache_config.validate() {
        bail!("invalid cache configuration: {}", e);
    }

    match &args.command {
        Command::Precompute(pair) => {
            let (method, input, output) = resolve(pair, &cache_config)?;
            let summary = assemble(&method, &input, &output)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Export { pair, path } => {
            let (method, input, output) = resolve(pair, &cache_config)?;
            let (matrix, outcome) = method.assemble(&input, &output)?;
            export_matrix(&matrix, path)
                .with_context(|| format!("writing {}", path.display()))?;
            info!(
                path = %path.display(),
                nnz = matrix.nnz(),
                outcome = ?outcome,
                "Exported weight matrix"
            );
        }
        Command::LoadShm(pair) => {
            let (method, input, output) = resolve(pair, &cache_config)?;
            let key = method.cache_key(&input, &output);
            let cache = cache_config.matrix_cache();
            if !cache.load_shared_memory(&key)? {
                bail!("no cached matrix for {} (run precompute first)", key);
            }
            info!(key = %key, segment = %cache.segment_path(&key).display(), "Loaded into shared memory");
        }
        Command::UnloadShm(pair) => {
            let (method, input, output) = resolve(pair, &cache_config)?;
            let key = method.cache_key(&input, &output);
            let removed = cache_config.matrix_cache().unload_shared_memory(&key)?;
            info!(key = %key, removed, "Unloaded shared memory");
        }
    }

    Ok(())
}

fn resolve(
    pair: &Pair,
    cache_config: &CacheConfig,
) -> Result<(Method, Representation, Representation)> {
    let mut config = match &pair.config {
        Some(path) => MethodConfig::from_yaml_file(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => MethodConfig::from_env(),
    };
    if let Some(kind) = pair.method {
        config.method = kind;
    }

    let input = Representation::from_name(&pair.input)?;
    let output = Representation::from_name(&pair.output)?;
    let method = Method::from_configs(&config, cache_config)?;
    Ok((method, input, output))
}

fn assemble(method: &Method, input: &Representation, output: &Representation) -> Result<Summary> {
    let key = method.cache_key(input, output);
    let (matrix, outcome) = method.assemble(input, output)?;
    let stats = method
        .cache()
        .map(|c| c.stats().snapshot())
        .unwrap_or_default();

    info!(
        key = %key,
        outcome = ?outcome,
        hit_rate = stats.hit_rate,
        "Pre-computed weight matrix"
    );

    Ok(Summary {
        method: method.name().to_string(),
        input: input.short_name(),
        output: output.short_name(),
        key: key.to_string(),
        outcome: format!("{:?}", outcome),
        rows: matrix.rows(),
        cols: matrix.cols(),
        nnz: matrix.nnz(),
        stats,
    })
}
