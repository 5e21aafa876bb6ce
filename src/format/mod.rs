// Section codecs of the OCTA map stream.
//
// Each module encodes and decodes one section of the uncompressed stream:
//
// - `header`   : magic, version and section counts
// - `vars`     : map variable overrides
// - `entity`   : game identity block, texture MRU and entity records
// - `vslot`    : run-length coded VSlot table with its variant chains
// - `octree`   : depth-first cube tree with surface payloads
// - `geometry` : face corners and plane solving used by `octree`
// - `stream`   : little-endian string and skip helpers
// - `error`    : the shared `FormatError`

pub mod entity;
pub mod error;
pub mod geometry;
pub mod header;
pub mod octree;
pub mod stream;
pub mod vars;
pub mod vslot;

pub use entity::{GameBlock, MAX_ENTS};
pub use error::FormatError;
pub use header::{Header, MAP_VERSION, MIN_VERSION, OCTA_MAGIC};
pub use octree::{NodeFlags, NodeKind, VertexMask};
