//! Bidirectional mapping between compliance documents and a normalised
//! entity graph.
//!
//! Decoding walks an [`oscal_model::OscalDocument`] top-down, validating
//! identifiers and dates, allocating structural identities and wiring
//! polymorphic owners. Encoding reconstructs the external shape exactly:
//! absent lists stay absent, empty lists stay empty and order is kept.
//! [`Document::to_rows`] flattens the graph into [`EntityRow`]s for storage
//! and [`Document::from_rows`] reassembles it.

pub mod aggregate;
pub mod arena;
pub mod assessment;
pub mod assessment_plan;
pub mod assessment_results;
pub mod back_matter;
pub mod catalog;
pub mod column;
pub mod component_definition;
pub mod document;
pub mod error;
pub mod identity;
pub mod implementation;
pub mod metadata;
pub mod owner;
pub mod poam;
pub mod profile;
pub mod rows;
pub mod scalar;
pub mod ssp;

pub use aggregate::Aggregate;
pub use arena::Table;
pub use column::{Codec, JsonColumn};
pub use document::Document;
pub use error::{FieldPath, MappingError, Result};
pub use identity::{component_uuid, derive_uuid, structural_uuid};
pub use owner::{DocumentKind, Owner, OwnerKind};
pub use rows::{Entity, EntityKind, EntityLink, EntityRow, LinkRelation, RowIndex, RowSet};
