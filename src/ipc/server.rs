//! IPC Server - Unix socket server for dashboard communication
//!
//! Handles incoming connections from the dashboard and dispatches commands
//! to the sync service.

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use crate::cache::{Category, UploadedFile};
use crate::ipc::protocol::{
    parse_command, serialize_response, Command, FilePayload, Response, PROTOCOL_VERSION,
};
use crate::sync::{ErrorKind, SyncError, SyncService};

/// IPC Server that listens for commands from the dashboard
pub struct IpcServer {
    service: Arc<SyncService>,
    socket_path: PathBuf,
    listener: Option<UnixListener>,
    /// Active connections counter
    connection_count: Arc<RwLock<u32>>,
}

impl IpcServer {
    pub fn new(service: Arc<SyncService>, socket_path: impl Into<PathBuf>) -> Self {
        Self {
            service,
            socket_path: socket_path.into(),
            listener: None,
            connection_count: Arc::new(RwLock::new(0)),
        }
    }

    /// Bind the socket, replacing a stale socket file if one is left over
    pub async fn start(&mut self) -> Result<()> {
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)
                .context("Failed to remove existing socket file")?;
        }

        let listener =
            UnixListener::bind(&self.socket_path).context("Failed to bind Unix socket")?;

        info!(socket_path = %self.socket_path.display(), "IPC server started");

        self.listener = Some(listener);
        Ok(())
    }

    /// Run the server loop, accepting connections
    pub async fn run(&self) -> Result<()> {
        let listener = self.listener.as_ref().context("Server not started")?;

        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let service = Arc::clone(&self.service);
                    let connection_count = Arc::clone(&self.connection_count);

                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, service, connection_count).await
                        {
                            error!(error = %e, "Connection handler error");
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    /// Stop the IPC server and clean up
    pub async fn stop(&self) -> Result<()> {
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path).context("Failed to remove socket file")?;
        }
        info!("IPC server stopped");
        Ok(())
    }
}

/// Handle a single client connection
async fn handle_connection(
    stream: UnixStream,
    service: Arc<SyncService>,
    connection_count: Arc<RwLock<u32>>,
) -> Result<()> {
    {
        let mut count = connection_count.write().await;
        *count += 1;
        debug!(count = *count, "New connection");
    }

    let (reader, mut writer) = stream.into_split();
    let mut buf_reader = BufReader::new(reader);
    let mut line = String::new();

    // Newline-delimited JSON, one response per command
    loop {
        line.clear();
        match buf_reader.read_line(&mut line).await {
            Ok(0) => {
                debug!("Connection closed by client");
                break;
            }
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }

                let response = match parse_command(trimmed.as_bytes()) {
                    Ok(command) => process_command(command, &service).await,
                    Err(e) => {
                        error!(error = %e, "Failed to parse command");
                        Response::Error {
                            kind: ErrorKind::InvalidInput,
                            error: format!("Invalid command: {}", e),
                        }
                    }
                };

                match serialize_response(&response) {
                    Ok(json) => {
                        if let Err(e) = writer.write_all(&json).await {
                            error!(error = %e, "Failed to write response");
                            break;
                        }
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to serialize response");
                    }
                }
            }
            Err(e) => {
                error!(error = %e, "Failed to read from socket");
                break;
            }
        }
    }

    {
        let mut count = connection_count.write().await;
        *count = count.saturating_sub(1);
        debug!(count = *count, "Connection ended");
    }

    Ok(())
}

fn decode_file(file_name: String, contents: &str) -> Result<UploadedFile, Response> {
    STANDARD
        .decode(contents)
        .map(|bytes| UploadedFile::new(file_name.as_str(), bytes))
        .map_err(|e| Response::Error {
            kind: ErrorKind::InvalidInput,
            error: format!("Invalid base64 contents for '{}': {}", file_name, e),
        })
}

fn decode_files(files: Vec<FilePayload>) -> Result<Vec<UploadedFile>, Response> {
    files
        .into_iter()
        .map(|f| decode_file(f.file_name, &f.contents))
        .collect()
}

fn parse_categories(names: &[String]) -> Result<Vec<Category>, SyncError> {
    names.iter().map(|n| n.parse()).collect()
}

/// Process a command and return a response
pub async fn process_command(command: Command, service: &SyncService) -> Response {
    match command {
        Command::Download { categories } => {
            info!(categories = ?categories, "Processing download command");

            // All names are checked before the first transfer
            let categories = match parse_categories(&categories) {
                Ok(c) => c,
                Err(e) => return e.into(),
            };

            match service.engine().download_all(&categories).await {
                Ok(reports) => Response::Downloaded {
                    downloaded: reports.iter().any(|r| r.downloaded()),
                    reports,
                },
                Err(e) => {
                    error!(error = %e, "Download failed");
                    e.into()
                }
            }
        }

        Command::Upload {
            local_path,
            category,
            remote_key,
        } => {
            info!(local = %local_path, category = %category, "Processing upload command");

            match service
                .engine()
                .upload_str(Path::new(&local_path), &category, remote_key.as_deref())
                .await
            {
                Ok(receipt) => Response::Uploaded {
                    key: receipt.key,
                    size: receipt.size,
                },
                Err(e) => {
                    error!(error = %e, "Upload failed");
                    e.into()
                }
            }
        }

        Command::SaveToCache {
            category,
            file_name,
            contents,
        } => {
            info!(file = %file_name, category = %category, "Processing saveToCache command");

            let category: Category = match category.parse() {
                Ok(c) => c,
                Err(e) => return e.into(),
            };
            let file = match decode_file(file_name, &contents) {
                Ok(f) => f,
                Err(response) => return response,
            };

            match service.intake().save_to_cache(&file, category) {
                Ok(outcome) => Response::Saved { outcome },
                Err(e) => e.into(),
            }
        }

        Command::Submit { category, files } => {
            info!(category = %category, files = files.len(), "Processing submit command");

            let category: Category = match category.parse() {
                Ok(c) => c,
                Err(e) => return e.into(),
            };
            let files = match decode_files(files) {
                Ok(f) => f,
                Err(response) => return response,
            };

            let report = service.submit(&files, category).await;
            Response::Submitted {
                success: report.all_uploaded(),
                report,
            }
        }

        Command::GetStatus => {
            debug!("Processing getStatus command");

            let engine = service.engine();
            Response::Status {
                version: PROTOCOL_VERSION,
                healthy: true,
                bucket: engine.bucket_name().to_string(),
                data_root: engine.layout().root().display().to_string(),
                directory_policy: engine.policy().as_str().to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::DirectoryPolicy;
    use crate::config::{Credentials, StoreConfig, SyncConfig};
    use crate::store::MemoryStore;
    use tempfile::TempDir;

    fn service(dir: &TempDir, store: Arc<MemoryStore>) -> SyncService {
        let config = SyncConfig {
            store: StoreConfig::new(Credentials::default()),
            data_root: dir.path().join("data"),
            directory_policy: DirectoryPolicy::CreateThenFetch,
            socket_path: dir.path().join("sync.sock"),
        };
        SyncService::new(store, &config)
    }

    #[tokio::test]
    async fn test_download_rejects_any_unknown_category_before_io() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());
        let service = service(&dir, store.clone());

        let response = process_command(
            Command::Download {
                categories: vec!["drone".into(), "satellite".into()],
            },
            &service,
        )
        .await;

        assert!(matches!(
            response,
            Response::Error { kind: ErrorKind::InvalidInput, .. }
        ));
        assert_eq!(store.call_count(), 0);
    }

    #[tokio::test]
    async fn test_download_reports_fetches() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());
        store.insert("model/trees.onnx", b"onnx".to_vec());
        let service = service(&dir, store);

        let response = process_command(
            Command::Download {
                categories: vec!["model".into(), "drone".into()],
            },
            &service,
        )
        .await;

        match response {
            Response::Downloaded { downloaded, reports } => {
                assert!(downloaded);
                assert_eq!(reports.len(), 2);
                assert!(!reports[1].downloaded());
            }
            other => panic!("Expected Downloaded, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_save_to_cache_decodes_base64() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir, Arc::new(MemoryStore::new()));

        let response = process_command(
            Command::SaveToCache {
                category: "drone".into(),
                file_name: "a.png".into(),
                contents: STANDARD.encode(b"png bytes"),
            },
            &service,
        )
        .await;

        assert!(matches!(response, Response::Saved { .. }));
        assert_eq!(
            std::fs::read(dir.path().join("data/drone/a.png")).unwrap(),
            b"png bytes"
        );

        let response = process_command(
            Command::SaveToCache {
                category: "drone".into(),
                file_name: "b.png".into(),
                contents: "not base64!".into(),
            },
            &service,
        )
        .await;
        assert!(matches!(
            response,
            Response::Error { kind: ErrorKind::InvalidInput, .. }
        ));
    }

    #[tokio::test]
    async fn test_submit_and_upload() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());
        let service = service(&dir, store.clone());

        let response = process_command(
            Command::Submit {
                category: "drone".into(),
                files: vec![FilePayload {
                    file_name: "site-a.jpg".into(),
                    contents: STANDARD.encode(b"jpeg"),
                }],
            },
            &service,
        )
        .await;
        assert!(matches!(response, Response::Submitted { success: true, .. }));
        assert_eq!(store.object("drone/site-a.jpg"), Some(b"jpeg".to_vec()));

        let missing = dir.path().join("nope.png");
        let response = process_command(
            Command::Upload {
                local_path: missing.display().to_string(),
                category: "drone".into(),
                remote_key: None,
            },
            &service,
        )
        .await;
        assert!(matches!(
            response,
            Response::Error { kind: ErrorKind::InvalidInput, .. }
        ));
    }

    #[tokio::test]
    async fn test_socket_round_trip() {
        let dir = TempDir::new().unwrap();
        let socket_path = dir.path().join("sync.sock");
        let service = Arc::new(service(&dir, Arc::new(MemoryStore::new())));

        let mut server = IpcServer::new(service, &socket_path);
        server.start().await.unwrap();
        let server = Arc::new(server);
        let running = Arc::clone(&server);
        let handle = tokio::spawn(async move { running.run().await });

        let stream = UnixStream::connect(&socket_path).await.unwrap();
        let (reader, mut writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();

        writer.write_all(b"{\"type\":\"getStatus\"}\n").await.unwrap();
        let status = lines.next_line().await.unwrap().unwrap();
        assert!(status.contains(r#""type":"status""#));
        assert!(status.contains(r#""bucket":"memory""#));

        writer.write_all(b"garbage\n").await.unwrap();
        let error = lines.next_line().await.unwrap().unwrap();
        assert!(error.contains(r#""kind":"invalidInput""#));

        handle.abort();
        server.stop().await.unwrap();
        assert!(!socket_path.exists());
    }
}
