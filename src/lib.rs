//! Octamap: reader/writer for OCTA voxel map files in Rust.
//!
//! A map is a gzip-compressed stream holding a sparse octree of deformable
//! cubes together with texture-slot variants, entities and map variables.
//!
//! The crate provides:
//! - The in-memory world model (`world`)
//! - Section codecs of the uncompressed stream (`format`)
//! - Whole-map encoder/decoder with load reports and CRC (`map`)
//! - File-oriented helpers: gzip, backups, map paths (`io`)
//! - An optional CLI (`cli` feature)
//!
//! # Quick Start
//!
//! ```no_run
//! use octamap::map::{decode_all, encode_all};
//! use octamap::world::{CubeNode, World};
//!
//! let mut world = World::new(1024);
//! world.root[0] = CubeNode::solid();
//!
//! let stream = encode_all(&world, false).unwrap();
//! let loaded = decode_all(&stream).unwrap();
//! assert_eq!(loaded.world, world);
//! assert!(!loaded.report.failed);
//! ```

pub mod format;
pub mod io;
pub mod map;
pub mod world;

#[cfg(feature = "cli")]
pub mod cli;
