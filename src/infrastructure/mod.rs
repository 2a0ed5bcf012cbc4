// Infrastructure layer: logging, command line and file formats

pub mod cli;
pub mod logging;
pub mod lp_format;

pub use cli::Cli;
pub use logging::init_logging;
pub use lp_format::{write_lp, LpFormatError};
