//! WMS API service library.
//!
//! Wires the protocol core to an axum HTTP front door and provides the
//! default collaborator implementations: a flat-colour PNG renderer, an
//! in-memory feature query engine, a small-projection projector and a
//! no-SLD engine.

pub mod backends;
pub mod handlers;
pub mod map_loader;
pub mod state;

pub use map_loader::{load_map_config, LoadedMap};
pub use state::AppState;
