//! # vfs-shell
//!
//! Command-line access to an agent virtual filesystem stored in S3,
//! PostgreSQL, or memory.
//!
//! ## Quick Start
//! ```bash
//! S3_BUCKET=agent-files S3_ENDPOINT_URL=http://localhost:9000 \
//!     vfs-shell --engine s3 write /notes.md "# Notes"
//! vfs-shell --engine postgres grep TODO --glob "*.md"
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use deepagents_backends::{
    Backend, MemoryBackend, PostgresBackend, PostgresConfig, S3Backend, S3Config,
};

// =============================================================================
// CLI ARGUMENTS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Engine {
    S3,
    Postgres,
    Memory,
}

#[derive(Parser, Debug)]
#[command(
    name = "vfs-shell",
    version,
    about = "Inspect and modify an agent virtual filesystem",
    long_about = r#"
vfs-shell runs single filesystem operations against a storage backend.

Engine settings are read from the environment (a .env file is loaded if present):
  s3        S3_BUCKET, S3_PREFIX, S3_ENDPOINT_URL, S3_REGION, AWS_ACCESS_KEY_ID, ...
  postgres  POSTGRES_HOST, POSTGRES_PORT, POSTGRES_DB, POSTGRES_USER, POSTGRES_TABLE, ...
  memory    nothing; contents are discarded on exit

EXAMPLES:
  vfs-shell --engine s3 ls /
  vfs-shell --engine postgres read /notes.md --offset 10 --limit 20
  vfs-shell --engine s3 edit /notes.md "draft" "final" --all
  vfs-shell --engine postgres upload ./report.md:/reports/q3.md
"#
)]
struct Args {
    /// Storage engine
    #[arg(short = 'e', long, value_enum, env = "VFS_ENGINE", default_value = "s3")]
    engine: Engine,

    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short = 'v', long = "verbose", default_value = "false")]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List a directory (one level, subdirectories end with `/`)
    Ls {
        #[arg(default_value = "/")]
        path: String,
        /// List every file below the path instead
        #[arg(short, long)]
        recursive: bool,
    },
    /// Print a file with line numbers
    Read {
        path: String,
        #[arg(long, default_value_t = 0)]
        offset: usize,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Create a new file (fails if it exists)
    Write { path: String, content: String },
    /// Replace a substring in a file
    Edit {
        path: String,
        old: String,
        new: String,
        /// Replace every occurrence
        #[arg(long)]
        all: bool,
    },
    /// Find files by glob pattern
    Glob {
        pattern: String,
        #[arg(default_value = "/")]
        path: String,
    },
    /// Search file contents
    Grep {
        pattern: String,
        #[arg(long)]
        path: Option<String>,
        /// Restrict to files matching this glob
        #[arg(long = "glob")]
        glob_filter: Option<String>,
        /// Treat the pattern as a regular expression
        #[arg(long)]
        regex: bool,
    },
    /// Delete a file
    Rm { path: String },
    /// Upload local files, given as LOCAL:REMOTE pairs
    Upload {
        #[arg(required = true)]
        files: Vec<String>,
    },
    /// Download files into a local directory
    Download {
        #[arg(required = true)]
        paths: Vec<String>,
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },
}

// =============================================================================
// MAIN FUNCTION
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_logging(args.verbose)?;

    let (backend, postgres) = open_backend(args.engine).await?;
    info!(engine = ?args.engine, "backend ready");

    let result = run(backend.as_ref(), args.command).await;

    if let Some(postgres) = postgres {
        postgres.close().await;
    }

    if let Err(ref e) = result {
        error!(error = %e, "command failed");
    }
    result
}

/// 엔진별 백엔드 생성. PostgreSQL 핸들은 종료 처리를 위해 따로 반환
async fn open_backend(engine: Engine) -> Result<(Arc<dyn Backend>, Option<Arc<PostgresBackend>>)> {
    match engine {
        Engine::S3 => {
            let config = S3Config::from_env().context("loading S3 configuration")?;
            let backend = if config.has_static_credentials() {
                S3Backend::new(&config)?
            } else {
                S3Backend::connect(&config).await?
            };
            let backend: Arc<dyn Backend> = Arc::new(backend);
            Ok((backend, None))
        }
        Engine::Postgres => {
            let config = PostgresConfig::from_env().context("loading PostgreSQL configuration")?;
            let postgres = Arc::new(PostgresBackend::connect(&config).await?);
            let backend: Arc<dyn Backend> = postgres.clone();
            Ok((backend, Some(postgres)))
        }
        Engine::Memory => {
            let backend: Arc<dyn Backend> = Arc::new(MemoryBackend::new());
            Ok((backend, None))
        }
    }
}

async fn run(backend: &dyn Backend, command: Command) -> Result<()> {
    match command {
        Command::Ls { path, recursive } => {
            let entries = if recursive {
                backend.ls_info(&path).await?
            } else {
                backend.ls(&path).await?
            };
            for entry in entries {
                match entry.size {
                    Some(lines) => println!("{:>8}  {}", lines, entry.path),
                    None => println!("{:>8}  {}", "-", entry.path),
                }
            }
        }
        Command::Read { path, offset, limit } => {
            let read = backend.read(&path, offset, limit).await?;
            println!("{}", read.numbered());
        }
        Command::Write { path, content } => {
            let result = backend.write(&path, &content).await?;
            println!("wrote {}", result.path);
        }
        Command::Edit { path, old, new, all } => {
            let result = backend.edit(&path, &old, &new, all).await?;
            println!("replaced {} occurrence(s) in {}", result.occurrences, result.path);
        }
        Command::Glob { pattern, path } => {
            for entry in backend.glob_info(&pattern, &path).await? {
                println!("{}", entry.path);
            }
        }
        Command::Grep { pattern, path, glob_filter, regex } => {
            let matches = if regex {
                backend.grep_regex(&pattern, path.as_deref(), glob_filter.as_deref()).await?
            } else {
                backend.grep_raw(&pattern, path.as_deref(), glob_filter.as_deref()).await?
            };
            for m in matches {
                println!("{}:{}:{}", m.path, m.line, m.text);
            }
        }
        Command::Rm { path } => {
            backend.delete(&path).await?;
            println!("deleted {}", path);
        }
        Command::Upload { files } => {
            let mut payload = Vec::with_capacity(files.len());
            for pair in files {
                let Some((local, remote)) = pair.split_once(':') else {
                    bail!("expected LOCAL:REMOTE, got {}", pair);
                };
                let bytes = tokio::fs::read(local)
                    .await
                    .with_context(|| format!("reading {}", local))?;
                payload.push((remote.to_string(), bytes));
            }

            let mut failed = 0;
            for response in backend.upload_files(payload).await {
                match response.error {
                    None => println!("uploaded {}", response.path),
                    Some(e) => {
                        failed += 1;
                        eprintln!("failed {}: {}", response.path, e);
                    }
                }
            }
            if failed > 0 {
                bail!("{} upload(s) failed", failed);
            }
        }
        Command::Download { paths, out } => {
            let mut failed = 0;
            for response in backend.download_files(paths).await {
                match (response.content, response.error) {
                    (Some(content), None) => {
                        let target = out.join(response.path.trim_start_matches('/'));
                        if let Some(parent) = target.parent() {
                            tokio::fs::create_dir_all(parent).await?;
                        }
                        tokio::fs::write(&target, content)
                            .await
                            .with_context(|| format!("writing {}", target.display()))?;
                        println!("downloaded {} -> {}", response.path, target.display());
                    }
                    (_, error) => {
                        failed += 1;
                        let reason = error.map(|e| e.to_string()).unwrap_or_default();
                        eprintln!("failed {}: {}", response.path, reason);
                    }
                }
            }
            if failed > 0 {
                bail!("{} download(s) failed", failed);
            }
        }
    }
    Ok(())
}

// =============================================================================
// LOGGING INITIALIZATION
// =============================================================================

/// RUST_LOG가 있으면 우선, 없으면 verbose 플래그로 레벨 결정
fn init_logging(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("deepagents_backends={}", default_level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    Ok(())
}
