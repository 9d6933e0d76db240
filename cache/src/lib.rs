//! Configuration meshing and the on-disk experiment cache.
//!
//! An experiment is described by a flat JSON object. A list of option values
//! per key is [meshed](mesh::mesh) into concrete configurations, each of which
//! is [keyed](key::config_uuid) by a content hash and stored in an [ExpCache].

mod common;
pub mod exp_cache;
pub mod key;
pub mod mesh;

pub use exp_cache::*;
pub use key::*;
pub use mesh::*;
