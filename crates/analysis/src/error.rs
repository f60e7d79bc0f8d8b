use thiserror::Error;

/// Internal consistency failures. Any of these aborts the run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("duplicate result for {driver} in {season} {race}")]
    DuplicateDriver { season: u16, race: String, driver: String },

    #[error("lap of {driver} from {found_season} {found_race} handed to session {season} {race}")]
    ForeignLap {
        season: u16,
        race: String,
        driver: String,
        found_season: u16,
        found_race: String,
    },
}
