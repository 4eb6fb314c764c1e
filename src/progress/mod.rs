//! Progress reporting for setup sessions

mod handler;
mod logging;
mod terminal;

pub use handler::{NoOpHandler, ProgressEvent, ProgressHandler};
pub use logging::LoggingHandler;
pub use terminal::TerminalHandler;
