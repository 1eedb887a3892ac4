use std::sync::{mpsc, Arc, Mutex, MutexGuard};

use serde::{Serialize, Deserialize};

use crate::dashboard::LineOptions;

/// Everything the dashboard has been told, as a replayable event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DashboardEvent {
    Window { id: usize, options: LineOptions },
    Line { window: usize, x: f64, y: f64 },
    Image { id: usize, title: String, width: u32, height: u32 },
}

impl DashboardEvent {
    /// SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            DashboardEvent::Window { .. } => "window",
            DashboardEvent::Line { .. } => "line",
            DashboardEvent::Image { .. } => "image",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WindowSnapshot {
    pub id: usize,
    pub options: LineOptions,
    pub points: Vec<[f64; 2]>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageSnapshot {
    pub id: usize,
    pub title: String,
    pub url: String,
}

/// JSON body of `GET /state`.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub windows: Vec<WindowSnapshot>,
    pub images: Vec<ImageSnapshot>,
}

#[derive(Default)]
pub struct DashboardState {
    history: Vec<DashboardEvent>,
    /// PNG bytes, indexed by image id.
    images: Vec<Vec<u8>>,
    subscribers: Vec<mpsc::Sender<DashboardEvent>>,
    next_window: usize,
}

impl DashboardState {
    pub fn new() -> Self {
        DashboardState::default()
    }

    pub fn open_window(&mut self, options: LineOptions) -> usize {
        let id = self.next_window;
        self.next_window += 1;
        self.publish(DashboardEvent::Window { id, options });
        id
    }

    pub fn add_image(&mut self, title: &str, width: u32, height: u32, png: Vec<u8>) -> usize {
        let id = self.images.len();
        self.images.push(png);
        self.publish(DashboardEvent::Image { id, title: title.to_owned(), width, height });
        id
    }

    /// Records `event` and forwards it to every live subscriber, dropping
    /// the ones whose receiver has gone away.
    pub fn publish(&mut self, event: DashboardEvent) {
        self.history.push(event.clone());
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Returns the history so far plus a receiver for everything after it.
    /// Both are taken under the same lock, so nothing is missed or doubled.
    pub fn subscribe(&mut self) -> (Vec<DashboardEvent>, mpsc::Receiver<DashboardEvent>) {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        (self.history.clone(), rx)
    }

    /// Disconnects every subscriber; their SSE loops end on the next receive.
    pub fn close_subscribers(&mut self) {
        self.subscribers.clear();
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn image_png(&self, id: usize) -> Option<&[u8]> {
        self.images.get(id).map(Vec::as_slice)
    }

    pub fn history(&self) -> &[DashboardEvent] {
        &self.history
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        let mut windows: Vec<WindowSnapshot> = Vec::new();
        let mut images = Vec::new();
        for event in &self.history {
            match event {
                DashboardEvent::Window { id, options } => windows.push(WindowSnapshot {
                    id: *id,
                    options: options.clone(),
                    points: Vec::new(),
                }),
                DashboardEvent::Line { window, x, y } => {
                    if let Some(w) = windows.iter_mut().find(|w| w.id == *window) {
                        w.points.push([*x, *y]);
                    }
                }
                DashboardEvent::Image { id, title, .. } => images.push(ImageSnapshot {
                    id: *id,
                    title: title.clone(),
                    url: format!("/images/{}.png", id),
                }),
            }
        }
        DashboardSnapshot { windows, images }
    }
}

pub type SharedState = Arc<Mutex<DashboardState>>;

/// Locks the state, recovering from a poisoned mutex.
pub fn lock(state: &SharedState) -> MutexGuard<'_, DashboardState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
