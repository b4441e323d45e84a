// procstream CLI library

pub mod bridge;
pub mod cli;
pub mod logging;

pub use bridge::run;
pub use cli::Cli;
pub use logging::{init_logging, VerbosityLevel};
