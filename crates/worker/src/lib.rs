//! Worker Service library: child-process lifecycle, deadline enforcement,
//! hint resolution, and result emission. `main.rs` is a thin CLI
//! front-end over `run`.

pub mod child;
pub mod config;
pub mod process;
pub mod run;

pub use config::WorkerConfig;
