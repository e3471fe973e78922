pub mod catalog;
pub mod config;
pub mod error;
pub mod playlist;
pub mod relay;
pub mod schedule;
pub mod stream;

pub use catalog::{CatalogEntry, DirectoryCatalog, FileCatalog, ProcessedSet};
pub use config::{load_streamer_config, PlaylistOrder, StreamerConfig};
pub use error::{ConfigError, Result};
pub use playlist::{
    divide_into_streams, GroupIdentifier, PlaylistArchive, PlaylistError, PlaylistResult,
    PlaylistWriter, StreamGroup,
};
pub use schedule::{ScheduleError, ScheduleWindow};
pub use stream::{
    CommandExecutor, CommandOutcome, EncoderInvocation, GroupOutcome, GroupState, StreamEngine,
    StreamError, StreamReport, StreamResult,
};
