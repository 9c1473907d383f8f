use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use anyhow::Context as _;
use eframe::egui::{self, Context};
use tracing::{error, info};

use crate::config::Config;
use crate::graph::{Snapshot, load_snapshot};

mod camera;
mod frame_loop;
mod interaction;
mod layout;
mod render;
mod session;
mod ui;
mod view;

pub use camera::CameraConfig;
pub use layout::LayoutConfig;
pub use render::RenderConfig;

use session::Session;

/// Where the session reads from and writes to.
#[derive(Clone, Debug)]
pub struct LaunchOptions {
    pub snapshot: Option<PathBuf>,
    pub batch_dir: Option<PathBuf>,
    pub save_path: PathBuf,
    pub config: Config,
}

pub struct GraphApp {
    options: LaunchOptions,
    state: AppState,
}

enum AppState {
    Loading { rx: Receiver<Result<Snapshot, String>> },
    Ready(Box<Session>),
    Error(String),
}

impl GraphApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, options: LaunchOptions) -> Self {
        let state = Self::start_load(options.snapshot.clone());
        Self { options, state }
    }

    fn spawn_load(path: Option<PathBuf>) -> Receiver<Result<Snapshot, String>> {
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            let result = match path.as_deref() {
                Some(path) => read_initial_snapshot(path).map_err(|error| format!("{error:#}")),
                None => Ok(Snapshot::default()),
            };
            let _ = tx.send(result);
        });

        rx
    }

    fn start_load(path: Option<PathBuf>) -> AppState {
        AppState::Loading {
            rx: Self::spawn_load(path),
        }
    }

    fn ready(options: &LaunchOptions, snapshot: Snapshot) -> AppState {
        AppState::Ready(Box::new(Session::new(snapshot, options)))
    }
}

fn read_initial_snapshot(path: &Path) -> anyhow::Result<Snapshot> {
    load_snapshot(path).with_context(|| format!("could not start from {}", path.display()))
}

impl eframe::App for GraphApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        let mut transition = None;

        match &mut self.state {
            AppState::Loading { rx } => {
                match rx.try_recv() {
                    Ok(Ok(snapshot)) => {
                        info!(nodes = snapshot.nodes.len(), "initial graph ready");
                        transition = Some(Self::ready(&self.options, snapshot));
                    }
                    Ok(Err(message)) => {
                        error!(%message, "initial graph failed to load");
                        transition = Some(AppState::Error(message));
                    }
                    Err(TryRecvError::Empty) => {}
                    Err(TryRecvError::Disconnected) => {
                        transition =
                            Some(AppState::Error("Background load worker disconnected".to_owned()));
                    }
                }

                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.vertical_centered(|ui| {
                        ui.add_space(120.0);
                        ui.heading("Loading knowledge graph...");
                        ui.add_space(8.0);
                        ui.spinner();
                    });
                });
                ctx.request_repaint();
            }
            AppState::Error(message) => {
                let mut retry = false;
                let mut start_empty = false;
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.heading("Failed to load the knowledge graph");
                    ui.add_space(6.0);
                    ui.label(message.as_str());
                    ui.add_space(10.0);
                    ui.horizontal(|ui| {
                        retry = ui.button("Retry").clicked();
                        start_empty = ui.button("Start empty").clicked();
                    });
                });
                if retry {
                    transition = Some(Self::start_load(self.options.snapshot.clone()));
                } else if start_empty {
                    transition = Some(Self::ready(&self.options, Snapshot::default()));
                }
            }
            AppState::Ready(session) => session.show(ctx),
        }

        if let Some(next_state) = transition {
            self.state = next_state;
        }
    }
}
