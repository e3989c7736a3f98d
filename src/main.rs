//! Tree Tracker sync daemon
//!
//! Serves the dashboard over a Unix socket, or runs a single sync
//! operation from the command line.

use anyhow::{anyhow, Context, Result};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use tree_tracker_sync::cache::{Category, UploadedFile};
use tree_tracker_sync::config::SyncConfig;
use tree_tracker_sync::ipc::IpcServer;
use tree_tracker_sync::store::S3Client;
use tree_tracker_sync::sync::SyncService;

/// CLI command
#[derive(Debug)]
enum Command {
    /// Run IPC server mode (default)
    Server,
    Download { categories: Vec<String> },
    Upload {
        local_path: PathBuf,
        category: String,
        remote_key: Option<String>,
    },
    Save { file: PathBuf, category: String },
    Submit { category: String, files: Vec<PathBuf> },
    Help,
}

fn print_help() {
    eprintln!(
        r#"Tree Tracker sync - keep the local data cache in step with the bucket

USAGE:
    tree-tracker-sync                               # Run IPC server (default)
    tree-tracker-sync download <category>...
    tree-tracker-sync upload <local_path> <category> [remote_key]
    tree-tracker-sync save <file> <category>
    tree-tracker-sync submit <category> <file>...
    tree-tracker-sync help

CATEGORIES:
    drone, meteor, model, parcel, planet

COMMANDS:
    (none)    Run IPC server mode (waits for commands from the dashboard)
    download  Fetch every object of the categories not yet in the cache
    upload    Push a local file to <category>/<file name> or to remote_key
    save      Copy a file into the cache without uploading it
    submit    Save each file into the cache, then upload it
    help      Show this help message

ENVIRONMENT:
    AWS_ACCESS_KEY_ID       Access key (legacy name: ACCESS_KEY)
    AWS_SECRET_ACCESS_KEY   Secret key (legacy name: SECRET_KEY)
    AWS_REGION              Signing region (default: us-east-1)
    TREE_TRACKER_BUCKET     Bucket name (default: tree-tracker-store)
    TREE_TRACKER_ENDPOINT   S3-compatible endpoint URL, uses path-style addressing
    TREE_TRACKER_DATA_DIR   Local cache root (default: data)
    TREE_TRACKER_DIR_POLICY create-then-fetch (default) or deferred
    TREE_TRACKER_SOCKET     IPC socket path (default: /tmp/tree-tracker-sync.sock)
    RUST_LOG                Log filter (trace, debug, info, warn, error)

A .env file in the working directory is read on startup.
"#
    );
}

fn parse_args() -> Result<Command> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        return Ok(Command::Server);
    }

    match args[1].as_str() {
        "serve" => Ok(Command::Server),
        "download" => {
            if args.len() < 3 {
                return Err(anyhow!("Usage: tree-tracker-sync download <category>..."));
            }
            Ok(Command::Download {
                categories: args[2..].to_vec(),
            })
        }
        "upload" => {
            if args.len() < 4 || args.len() > 5 {
                return Err(anyhow!(
                    "Usage: tree-tracker-sync upload <local_path> <category> [remote_key]"
                ));
            }
            Ok(Command::Upload {
                local_path: PathBuf::from(&args[2]),
                category: args[3].clone(),
                remote_key: args.get(4).cloned(),
            })
        }
        "save" => {
            if args.len() != 4 {
                return Err(anyhow!("Usage: tree-tracker-sync save <file> <category>"));
            }
            Ok(Command::Save {
                file: PathBuf::from(&args[2]),
                category: args[3].clone(),
            })
        }
        "submit" => {
            if args.len() < 4 {
                return Err(anyhow!("Usage: tree-tracker-sync submit <category> <file>..."));
            }
            Ok(Command::Submit {
                category: args[2].clone(),
                files: args[3..].iter().map(PathBuf::from).collect(),
            })
        }
        "help" | "--help" | "-h" => Ok(Command::Help),
        _ => {
            eprintln!("Unknown command: {}", args[1]);
            Ok(Command::Help)
        }
    }
}

/// Read a file from disk as if it had been uploaded through the dashboard
fn read_upload(path: &Path) -> Result<UploadedFile> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("Not a file name: {}", path.display()))?;
    let contents =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(UploadedFile::new(name, contents))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so command output stays clean on stdout
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let command = match parse_args() {
        Ok(cmd) => cmd,
        Err(e) => {
            eprintln!("Error: {}", e);
            print_help();
            std::process::exit(1);
        }
    };

    if let Command::Help = command {
        print_help();
        return Ok(());
    }

    let config = SyncConfig::from_env()?;
    if config.store.credentials.pair().is_none() {
        // Not fatal here: local-only commands still work
        warn!("No store credentials configured; transfers will fail");
    }

    let client = S3Client::new(&config.store).context("Failed to create S3 client")?;
    let service = Arc::new(SyncService::new(Arc::new(client), &config));

    match command {
        Command::Server => {
            info!(
                bucket = %config.store.bucket,
                data_root = %config.data_root.display(),
                policy = config.directory_policy.as_str(),
                "Starting sync service in IPC server mode"
            );

            let mut ipc_server = IpcServer::new(Arc::clone(&service), &config.socket_path);
            if let Err(e) = ipc_server.start().await {
                error!(error = %e, "Failed to start IPC server");
                return Err(e);
            }
            let ipc_server = Arc::new(ipc_server);

            info!("Ready. Waiting for commands from the dashboard...");

            let running = Arc::clone(&ipc_server);
            let ipc_handle = tokio::spawn(async move {
                if let Err(e) = running.run().await {
                    error!(error = %e, "IPC server error");
                }
            });

            tokio::signal::ctrl_c().await?;

            info!("Received shutdown signal");
            ipc_handle.abort();
            ipc_server.stop().await?;

            info!("Shutdown complete.");
        }
        Command::Download { categories } => {
            let categories = categories
                .iter()
                .map(|c| c.parse::<Category>())
                .collect::<Result<Vec<_>, _>>()?;
            let reports = service.engine().download_all(&categories).await?;
            print_json(&reports)?;
        }
        Command::Upload {
            local_path,
            category,
            remote_key,
        } => {
            let receipt = service
                .engine()
                .upload_str(&local_path, &category, remote_key.as_deref())
                .await?;
            print_json(&receipt)?;
        }
        Command::Save { file, category } => {
            let category: Category = category.parse()?;
            let outcome = service.intake().save_to_cache(&read_upload(&file)?, category)?;
            print_json(&outcome)?;
        }
        Command::Submit { category, files } => {
            let category: Category = category.parse()?;
            let files = files
                .iter()
                .map(|p| read_upload(p))
                .collect::<Result<Vec<_>>>()?;
            let report = service.submit(&files, category).await;
            print_json(&report)?;
            if !report.all_uploaded() {
                return Err(anyhow!("Not every file was uploaded"));
            }
        }
        Command::Help => {}
    }

    Ok(())
}
