//! Engine bridge for a GUI: move requests, live analysis, and move rating.
//!
//! All state that the UI observes lives in [`Controller`], which is owned by
//! the UI thread. Engine I/O happens on worker threads that hand their results
//! back through a [`UiHandle`]; the UI thread runs them from its [`UiLoop`].

pub mod config;
pub mod controller;
pub mod error;
pub mod position;
pub mod rating;
pub mod snapshot;
pub mod throttle;
pub mod ui;
pub mod wdl;

pub use config::BridgeConfig;
pub use controller::{Controller, ControllerBuilder, MoveOutcome};
pub use error::BridgeError;
pub use position::GamePosition;
pub use rating::{MoveRating, RatingLabel};
pub use snapshot::{EvalSnapshot, EvalUpdate};
pub use ui::{UiHandle, UiLoop};
pub use wdl::Wdl;
