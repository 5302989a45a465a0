//! # Offline Tile Server
//!
//! Serves PNG map tiles from an MBTiles archive at `GET /tiles/{z}/{x}/{y}.png`
//! using the public XYZ row convention.
//!
//! | Outcome                          | Status | Body              |
//! |----------------------------------|--------|-------------------|
//! | tile found                       | 200    | PNG bytes         |
//! | no such tile / row off the grid  | 404    | empty             |
//! | non-numeric segment / bad zoom   | 400    | short message     |
//! | archive error during lookup      | 500    | error description |
//!
//! Lookups run on the blocking pool, so a slow query never holds up other
//! requests.

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::archive::TileSource;
use super::coords::TileKey;
use crate::error::{GroundStationError, Result, TileAddressError};

const PNG_CONTENT_TYPE: &str = "image/png";

/// Build the tile router around a tile source
pub fn router(source: Arc<dyn TileSource>) -> Router {
    Router::new()
        .route("/tiles/:z/:x/:y", get(get_tile))
        .fallback(|| async { StatusCode::NOT_FOUND })
        .with_state(source)
}

/// Builder used to configure and spawn the tile server
#[derive(Clone)]
pub struct TileServerBuilder {
    listen: SocketAddr,
    source: Arc<dyn TileSource>,
}

impl TileServerBuilder {
    pub fn new(listen: SocketAddr, source: Arc<dyn TileSource>) -> Self {
        Self { listen, source }
    }

    /// Bind the listener and start serving in a background task
    pub async fn spawn(self) -> Result<TileServerHandle> {
        let listener = TcpListener::bind(self.listen).await?;
        let local_addr = listener.local_addr()?;
        info!(address = %local_addr, "tile server listening");

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let server = axum::serve(listener, router(self.source)).with_graceful_shutdown(async move {
            let _ = shutdown_rx.changed().await;
        });
        let task = tokio::spawn(async move {
            if let Err(err) = server.await {
                warn!(error = %err, "tile server exited with error");
            }
        });

        Ok(TileServerHandle {
            address: local_addr,
            task,
            shutdown: shutdown_tx,
        })
    }
}

/// Handle to a running tile server
pub struct TileServerHandle {
    address: SocketAddr,
    task: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

impl TileServerHandle {
    /// Address the server is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.address
    }

    /// Request graceful shutdown and wait for in-flight requests to finish
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown.send(true);
        self.task
            .await
            .map_err(|join| GroundStationError::Io(std::io::Error::other(join)))?;
        info!(address = %self.address, "tile server stopped");
        Ok(())
    }
}

async fn get_tile(
    State(source): State<Arc<dyn TileSource>>,
    Path((z, x, y)): Path<(String, String, String)>,
) -> Response {
    let Some(y) = y.strip_suffix(".png") else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let (Ok(zoom), Ok(column), Ok(row)) = (z.parse::<u32>(), x.parse::<u32>(), y.parse::<u32>())
    else {
        debug!(%z, %x, %y, "rejecting non-numeric tile address");
        return (StatusCode::BAD_REQUEST, "tile coordinates must be non-negative integers")
            .into_response();
    };

    let public = TileKey::xyz(zoom, column, row);
    let key = match public.to_archive() {
        Ok(key) => key,
        Err(err @ TileAddressError::ZoomOutOfRange(_)) => {
            return (StatusCode::BAD_REQUEST, err.to_string()).into_response();
        }
        Err(TileAddressError::RowOutOfRange { .. }) => {
            return StatusCode::NOT_FOUND.into_response();
        }
    };

    match tokio::task::spawn_blocking(move || source.lookup(&key)).await {
        Ok(Ok(Some(tile))) => ([(header::CONTENT_TYPE, PNG_CONTENT_TYPE)], tile).into_response(),
        Ok(Ok(None)) => StatusCode::NOT_FOUND.into_response(),
        Ok(Err(err)) => {
            warn!(tile = %public, error = %err, "tile lookup failed");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
        Err(join) => {
            warn!(tile = %public, error = %join, "tile lookup task failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "tile lookup aborted").into_response()
        }
    }
}
