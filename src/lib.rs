//! Viewer for IP activity bitmaps.
//!
//! A backend renders traffic as a bitmap whose rows are address buckets and
//! whose columns are time intervals. This crate displays it, resolves the cell
//! under the pointer, and turns drag gestures or the manual form into zoom
//! requests.
//!
//! - `data`: UI-free core (address ordering, time axis, views, mapping, selection, cadence)
//! - `client`: backend requests, the reqwest implementation and the job dispatcher
//! - `session`: state owner wiring the core to requests and completions
//! - `events`: filtered event subscriptions
//! - `config`, `logging`, `error`: ambient plumbing
//! - `app`, `panels`: egui/eframe front end

pub mod app;
pub mod cli;
pub mod client;
pub mod config;
pub mod data;
pub mod error;
pub mod events;
pub mod logging;
pub mod panels;
pub mod session;

pub use app::{run_viewer, run_viewer_with_events, ViewerApp};
pub use config::ViewerConfig;
pub use data::address::{Address, AddressRange, AddressVersion};
pub use data::selection::{SelectionMachine, SelectionRequest};
pub use data::view::{BitmapType, BitmapView, ViewKind, ViewMode};
pub use error::{Result, ViewerError};
pub use events::{EventController, EventFilter, EventKind, ViewerEvent};
pub use session::ViewerSession;
