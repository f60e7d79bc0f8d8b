//! Season table loading and timeline persistence.

pub mod error;
pub mod loader;
pub mod serializer;

pub use error::{LoadError, MalformedRecord, ReadError, WriteError};
pub use loader::{
    discover_seasons, load_season, CsvFileSource, CsvTextSource, SeasonLoad, SeasonReader,
    SeasonSource, REQUIRED_COLUMNS,
};
pub use serializer::{read_timeline, write_timeline};
