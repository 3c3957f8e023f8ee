//! Ratatui front-end. `App` owns the catalog and a stack of screens; each
//! screen wraps one state holder from [`crate::state`] and is drawn from it.

mod app;
mod draw;
mod helpers;
mod keys;
mod preview;
mod terminal;

pub use app::App;
pub use terminal::run_app;
