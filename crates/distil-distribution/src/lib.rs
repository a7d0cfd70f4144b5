//! Core data model: [`Distribution`], [`WorkingSet`], [`Environment`], and
//! [`VersionPinMap`] — the types spec §3 defines, independent of how a particular
//! distribution was fetched or will be materialized.

mod distribution;
mod environment;
mod error;
mod filename;
mod location;
mod metadata;
mod pin_map;
mod precedence;
mod working_set;

pub use distribution::Distribution;
pub use environment::Environment;
pub use error::DistributionError;
pub use filename::parse_versioned_stem;
pub use location::Location;
pub use metadata::{requires_from_metadata, DistMetadata};
pub use pin_map::VersionPinMap;
pub use precedence::Precedence;
pub use working_set::WorkingSet;
