//! The Match Engine: resolves a catalog game's name against a
//! platform-scoped corpus view.

pub mod engine;
pub mod error;
pub mod index;
pub mod lcs;
pub mod normalize;

pub use engine::{match_game, Candidate, MatchOutcome, MatchQuery, MatchSource};
pub use error::MatchError;
