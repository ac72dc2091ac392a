pub mod config;
pub mod error;
pub mod parser;
pub mod pitch;
pub mod playback;
pub mod score;
pub mod session;
pub mod timeline;
pub mod xml;

pub use config::PlaybackConfig;
pub use error::*;
pub use parser::{parse_score, ParseOptions};
pub use score::*;
pub use session::Session;
pub use timeline::{PartSelection, Timeline};

use std::fs;
use std::path::Path;

/// Read and parse a MusicXML file with default options.
/// This is the main entry point for the library.
pub fn load_score(path: &Path) -> Result<Score, WaterfallError> {
    let source = fs::read_to_string(path)?;
    parse_score(&source, &ParseOptions::default())
}

/// Parse a score and split it for the given selection in one go
pub fn compile_timeline(
    source: &str,
    selection: &PartSelection,
    config: &PlaybackConfig,
) -> Result<Timeline, WaterfallError> {
    let score = parse_score(source, &config.parse_options(None))?;
    Ok(Timeline::build(&score, selection, config.register()))
}
