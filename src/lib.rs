//! `graphcore`: a concurrent, incrementally-updated graph state engine.
//!
//! Four subsystems, leaves first: a mutable labelled multigraph with
//! component tracking ([`graph`]), a pluggable cancellable transform
//! pipeline that derives a view-graph and computed attributes
//! ([`transform`], [`transformed_graph`]), a background force-directed
//! layout engine with convergence detection ([`layout`]), and the
//! spatial index that backs its Barnes-Hut approximation ([`spatial`]).
//! [`document`] is the single owning façade that wires all of the
//! above together, the way this crate's design notes describe
//! replacing a parent/child-pointer object framework with one owner
//! plus borrowed references.

pub mod attribute;
pub mod camera;
pub mod component_layout;
pub mod config;
pub mod document;
pub mod error;
pub mod graph;
pub mod id;
pub mod layout;
pub mod positions;
pub mod save;
pub mod search;
pub mod selection;
pub mod spatial;
pub mod transform;
pub mod transformed_graph;

pub use document::Document;
pub use error::{GraphError, GraphResult};
