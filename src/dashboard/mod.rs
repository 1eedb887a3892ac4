//! Live training dashboard.
//!
//! Training code talks to a [`Visualizer`]. The browser-facing
//! implementation, [`DashboardServer`], serves a single page that draws
//! loss curves and sample predictions as they arrive over Server-Sent
//! Events. Run with `--no-dashboard` to get a [`NullVisualizer`] instead.

pub mod routes;
pub mod sse;
pub mod state;

use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::thread;

use image::{DynamicImage, ImageOutputFormat, RgbImage};
use serde::{Serialize, Deserialize};
use tiny_http::Server;

use crate::error::{Result, SegError};
use state::{lock, DashboardEvent, DashboardState, SharedState};

/// Handle to a line plot created with [`Visualizer::line_window`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowId(pub usize);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineOptions {
    pub title: String,
    pub xlabel: String,
    pub ylabel: String,
    pub legend: Vec<String>,
}

impl LineOptions {
    pub fn new(title: &str, xlabel: &str, ylabel: &str) -> LineOptions {
        LineOptions {
            title: title.to_owned(),
            xlabel: xlabel.to_owned(),
            ylabel: ylabel.to_owned(),
            legend: vec![ylabel.to_owned()],
        }
    }
}

/// Sink for training curves and images.
pub trait Visualizer {
    fn line_window(&mut self, options: LineOptions) -> Result<WindowId>;
    fn append_line(&mut self, window: WindowId, x: f64, y: f64) -> Result<()>;
    fn image(&mut self, title: &str, image: &RgbImage) -> Result<()>;
}

/// Discards everything.
#[derive(Debug, Default)]
pub struct NullVisualizer {
    windows: usize,
}

impl Visualizer for NullVisualizer {
    fn line_window(&mut self, options: LineOptions) -> Result<WindowId> {
        log::debug!("dashboard disabled; window '{}' not shown", options.title);
        self.windows += 1;
        Ok(WindowId(self.windows - 1))
    }

    fn append_line(&mut self, _window: WindowId, _x: f64, _y: f64) -> Result<()> {
        Ok(())
    }

    fn image(&mut self, title: &str, _image: &RgbImage) -> Result<()> {
        log::debug!("dashboard disabled; image '{}' not shown", title);
        Ok(())
    }
}

/// HTTP dashboard on a background thread. Each request gets its own
/// thread, so long-lived SSE streams never block page loads.
///
/// Dropping the handle stops accepting connections and ends open streams.
pub struct DashboardServer {
    server: Arc<Server>,
    state: SharedState,
    addr: SocketAddr,
}

impl DashboardServer {
    /// Binds `addr` (use port 0 for an ephemeral port) and starts serving.
    pub fn start(addr: &str) -> Result<DashboardServer> {
        let server = Server::http(addr)
            .map_err(|e| SegError::Dashboard(format!("failed to bind {}: {}", addr, e)))?;
        let local = server
            .server_addr()
            .to_ip()
            .ok_or_else(|| SegError::Dashboard(format!("{} is not an IP listener", addr)))?;

        let server = Arc::new(server);
        let state: SharedState = Arc::new(Mutex::new(DashboardState::new()));

        let accept_server = server.clone();
        let accept_state = state.clone();
        thread::Builder::new()
            .name("dashboard".into())
            .spawn(move || {
                for request in accept_server.incoming_requests() {
                    let state = accept_state.clone();
                    thread::spawn(move || routes::dispatch(request, state));
                }
            })
            .map_err(|e| SegError::Dashboard(format!("failed to spawn server thread: {}", e)))?;

        log::info!("dashboard listening on http://{}", local);
        Ok(DashboardServer { server, state, addr: local })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn state(&self) -> SharedState {
        self.state.clone()
    }
}

impl Drop for DashboardServer {
    fn drop(&mut self) {
        lock(&self.state).close_subscribers();
        self.server.unblock();
    }
}

impl Visualizer for DashboardServer {
    fn line_window(&mut self, options: LineOptions) -> Result<WindowId> {
        Ok(WindowId(lock(&self.state).open_window(options)))
    }

    fn append_line(&mut self, window: WindowId, x: f64, y: f64) -> Result<()> {
        lock(&self.state).publish(DashboardEvent::Line { window: window.0, x, y });
        Ok(())
    }

    fn image(&mut self, title: &str, image: &RgbImage) -> Result<()> {
        let png = encode_png(image)?;
        lock(&self.state).add_image(title, image.width(), image.height(), png);
        Ok(())
    }
}

fn encode_png(image: &RgbImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(image.clone())
        .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
        .map_err(|e| SegError::Dashboard(format!("png encoding failed: {}", e)))?;
    Ok(bytes)
}
