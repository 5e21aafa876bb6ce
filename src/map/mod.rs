// Whole-map encoding and decoding over an uncompressed stream.
//
// - `encoder`  : MapEncoder, save options and in-memory `encode_all`
// - `decoder`  : MapDecoder, load report, CRC and entity-only reads
// - `collab`   : game identity and auxiliary block collaborators
// - `progress` : progress reporters
//
// Sections are processed strictly in file order. The current `Stage` is
// attached to every fatal error so callers can tell where a stream broke.

pub mod collab;
pub mod decoder;
pub mod encoder;
pub mod progress;

use std::fmt;

use thiserror::Error;

use crate::format::FormatError;

pub use collab::{AuxBlocks, FpsGame, GameIdentity, NamedGame, NoAuxBlocks, RawAuxBlocks};
pub use decoder::{
    LoadCounts, LoadOptions, LoadReport, LoadedWorld, MapDecoder, decode_all, read_entities,
    read_identity,
};
pub use encoder::{BackupPolicy, EncodeStats, MapEncoder, SaveOptions, encode_all};
pub use progress::{LogProgress, NoProgress, ProgressReporter, RecordingProgress};

/// Position of a codec within the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Idle,
    Header,
    Variables,
    Entities,
    VSlots,
    Octree,
    OptionalBlocks,
    Closed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Header => "header",
            Self::Variables => "variables",
            Self::Entities => "entities",
            Self::VSlots => "vslots",
            Self::Octree => "octree",
            Self::OptionalBlocks => "optional blocks",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// A fatal error together with the stage it happened in.
#[derive(Debug, Error)]
#[error("map {stage}: {source}")]
pub struct MapError {
    pub stage: Stage,
    #[source]
    pub source: FormatError,
}

impl MapError {
    pub fn new(stage: Stage, source: impl Into<FormatError>) -> Self {
        Self {
            stage,
            source: source.into(),
        }
    }
}

/// Error adapter for a stage: `.map_err(at(stage))`.
pub(crate) fn at<E: Into<FormatError>>(stage: Stage) -> impl Fn(E) -> MapError {
    move |e| MapError::new(stage, e)
}

/// The collaborators a save or load talks to.
pub struct Collaborators<'c> {
    pub game: &'c dyn GameIdentity,
    pub aux: &'c mut dyn AuxBlocks,
    pub progress: &'c mut dyn ProgressReporter,
}

impl<'c> Collaborators<'c> {
    pub fn new(
        game: &'c dyn GameIdentity,
        aux: &'c mut dyn AuxBlocks,
        progress: &'c mut dyn ProgressReporter,
    ) -> Self {
        Self {
            game,
            aux,
            progress,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_are_ordered() {
        assert!(Stage::Idle < Stage::Header);
        assert!(Stage::Octree < Stage::OptionalBlocks);
        assert!(Stage::OptionalBlocks < Stage::Closed);
    }

    #[test]
    fn error_names_stage() {
        let e = MapError::new(Stage::VSlots, FormatError::TruncatedStream);
        assert_eq!(
            e.to_string(),
            "map vslots: stream ended before the map was complete"
        );
    }
}
