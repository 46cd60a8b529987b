//! Desktop front end.
//!
//! | Sub-module       | Responsibility |
//! | ---------------- | -------------- |
//! | [`viewer_app`]   | [`ViewerApp`]: per-frame completion draining, polling and panel layout |
//! | [`run`]          | [`run_viewer()`] entry point: session, backend client and native window |

mod run;
mod viewer_app;

pub use run::{run_viewer, run_viewer_with_events};
pub use viewer_app::ViewerApp;
