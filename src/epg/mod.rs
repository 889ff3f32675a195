//! EPG (Electronic Programme Guide) module
//!
//! XMLTV parsing, the listing store, filtering and listing sources.

mod filter;
mod parser;
mod source;
mod time;

// Re-export public types
pub use filter::{
    filter_channels,
    filter_programmes,
    ChannelRow,
    ProgrammeOrder,
    ProgrammeRow,
    ProgrammeWindow,
};
pub use parser::{
    Channel,
    EpgParser,
    Listing,
    Programme,
    ProgrammeKey,
};
pub use source::{
    DownloadConfig,
    EpgDownloader,
    ListingSource,
    LoadOrigin,
    ProgressCallback,
};
pub use time::{format_start, format_stop, parse_time};
