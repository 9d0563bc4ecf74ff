//! Extractor driver
//!
//! After the crawl quiesces, cached bodies are served over a loopback HTTP
//! server and an external main-content extractor is fanned out over them
//! as child processes. Each child receives the loopback URL for one body
//! hash and its stdout lands in the extractor output directory under that
//! hash. Non-zero exits are logged and skipped; the server is shut down on
//! every exit path.

use crate::DragnetError;
use axum::extract::{Path as AxumPath, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::available_parallelism;
use tokio::net::TcpListener;
use tokio::process::Command;
use tokio::sync::{oneshot, Semaphore};

/// Drives the external main-content extractor over cached bodies
pub struct ExtractorDriver {
    /// The external extractor command
    pub command: PathBuf,

    /// Directory holding raw bodies, one file per URL hash
    pub body_dir: PathBuf,

    /// Directory receiving extractor output, one file per URL hash
    pub output_dir: PathBuf,
}

impl ExtractorDriver {
    /// Runs the extractor over every recorded hash
    ///
    /// Child processes are bounded by `max(1, cpus - 1)`; the body server
    /// lives on an ephemeral loopback port for the duration of the run.
    pub async fn run(&self, hashes: &BTreeSet<String>) -> Result<(), DragnetError> {
        if hashes.is_empty() {
            return Ok(());
        }

        tokio::fs::create_dir_all(&self.output_dir).await?;

        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let addr = listener.local_addr()?;

        let app = Router::new()
            .route("/:hash", get(serve_body))
            .with_state(Arc::new(self.body_dir.clone()));

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            let shutdown = async {
                let _ = shutdown_rx.await;
            };
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
            {
                tracing::warn!("body server error: {}", e);
            }
        });

        tracing::info!(
            "extracting {} documents via http://{}",
            hashes.len(),
            addr
        );

        let workers = available_parallelism().map(|n| n.get()).unwrap_or(1);
        let semaphore = Arc::new(Semaphore::new(std::cmp::max(1, workers.saturating_sub(1))));

        let mut children = Vec::with_capacity(hashes.len());
        for hash in hashes {
            children.push(tokio::spawn(run_extraction(
                self.command.clone(),
                self.output_dir.clone(),
                addr,
                hash.clone(),
                Arc::clone(&semaphore),
            )));
        }

        for child in children {
            let _ = child.await;
        }

        let _ = shutdown_tx.send(());
        let _ = server.await;

        Ok(())
    }
}

/// Runs one extractor child and captures its stdout
async fn run_extraction(
    command: PathBuf,
    output_dir: PathBuf,
    addr: SocketAddr,
    hash: String,
    semaphore: Arc<Semaphore>,
) {
    let Ok(_permit) = semaphore.acquire_owned().await else {
        return;
    };

    let url = format!("http://{}/{}", addr, hash);

    match Command::new(&command).arg(&url).output().await {
        Ok(output) if output.status.success() => {
            if let Err(e) = tokio::fs::write(output_dir.join(&hash), &output.stdout).await {
                tracing::warn!("failed to write extractor output for {}: {}", hash, e);
            }
        }
        Ok(output) => {
            tracing::warn!("extractor exited with {} for {}", output.status, hash);
        }
        Err(e) => {
            tracing::warn!("failed to spawn extractor for {}: {}", hash, e);
        }
    }
}

/// Serves one raw body from the body store
async fn serve_body(
    State(body_dir): State<Arc<PathBuf>>,
    AxumPath(hash): AxumPath<String>,
) -> Response {
    // Hashes are lowercase hex; anything else never names a body file
    if hash.is_empty() || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
        return StatusCode::NOT_FOUND.into_response();
    }

    match tokio::fs::read(body_dir.join(&hash)).await {
        Ok(bytes) => bytes.into_response(),
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}
