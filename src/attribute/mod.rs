//! Named, typed value functions over nodes, edges or components, plus
//! the registry that owns them by name.

use bitflags::bitflags;
use regex::Regex;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::error::{GraphError, GraphResult};
use crate::id::{ComponentId, EdgeId, NodeId};

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_ ]*$").expect("static pattern is valid"))
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub enum ElementType {
    Node,
    Edge,
    Component,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    Int(i64),
    Float(f64),
    String(String),
}

impl AttrValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Int(v) => Some(*v as f64),
            AttrValue::Float(v) => Some(*v),
            AttrValue::String(_) => None,
        }
    }

    pub fn render(&self) -> String {
        match self {
            AttrValue::Int(v) => v.to_string(),
            AttrValue::Float(v) => v.to_string(),
            AttrValue::String(v) => v.clone(),
        }
    }
}

bitflags! {
    #[derive(Debug, Copy, Clone, Eq, PartialEq)]
    pub struct AttributeFlags: u8 {
        const FIND_SHARED           = 0x1;
        const SEARCHABLE            = 0x2;
        const VISUALISE_BY_COMPONENT = 0x4;
        const AUTO_RANGE            = 0x8;
    }
}

/// `id -> value` lookup for one element kind, keyed by the raw 32-bit
/// index so a single enum can back all three id kinds without the
/// registry itself being generic.
pub trait ValueFn: Send + Sync {
    fn get(&self, raw_id: u32) -> Option<AttrValue>;
}

impl<F: Fn(u32) -> Option<AttrValue> + Send + Sync> ValueFn for F {
    fn get(&self, raw_id: u32) -> Option<AttrValue> {
        self(raw_id)
    }
}

pub struct Attribute {
    pub name: String,
    pub element_type: ElementType,
    pub flags: AttributeFlags,
    pub range: Option<(f64, f64)>,
    value_fn: Box<dyn ValueFn>,
}

impl Attribute {
    pub fn value_for_node(&self, id: NodeId) -> Option<AttrValue> {
        debug_assert_eq!(self.element_type, ElementType::Node);
        self.value_fn.get(id.index() as u32)
    }

    pub fn value_for_edge(&self, id: EdgeId) -> Option<AttrValue> {
        debug_assert_eq!(self.element_type, ElementType::Edge);
        self.value_fn.get(id.index() as u32)
    }

    pub fn value_for_component(&self, id: ComponentId) -> Option<AttrValue> {
        debug_assert_eq!(self.element_type, ElementType::Component);
        self.value_fn.get(id.index() as u32)
    }

    pub fn is_searchable(&self) -> bool {
        self.flags.contains(AttributeFlags::SEARCHABLE)
    }

    /// Looks up a value by raw index without asserting the element
    /// kind, for callers (the condition compiler, search) that only
    /// ever hold a bare `u32` rather than a typed id.
    pub fn value_fn_raw(&self, raw_id: u32) -> Option<AttrValue> {
        self.value_fn.get(raw_id)
    }
}

/// Insertion-ordered registry of attributes keyed by name. Names are
/// unique; registering an existing name is a `GraphError`, not a panic,
/// since it can legitimately arise from user-authored transform configs.
#[derive(Default)]
pub struct AttributeRegistry {
    order: Vec<String>,
    by_name: FxHashMap<String, Attribute>,
}

impl AttributeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        element_type: ElementType,
        flags: AttributeFlags,
        value_fn: impl Fn(u32) -> Option<AttrValue> + Send + Sync + 'static,
    ) -> GraphResult<()> {
        let name = name.into();
        if !name_pattern().is_match(&name) {
            return Err(GraphError::InvalidAttributeName(name));
        }
        if self.by_name.contains_key(&name) {
            return Err(GraphError::DuplicateAttribute(name));
        }

        self.order.push(name.clone());
        self.by_name.insert(
            name.clone(),
            Attribute {
                name,
                element_type,
                flags,
                range: None,
                value_fn: Box::new(value_fn),
            },
        );
        Ok(())
    }

    pub fn remove(&mut self, name: &str) {
        self.order.retain(|n| n != name);
        self.by_name.remove(name);
    }

    pub fn get(&self, name: &str) -> GraphResult<&Attribute> {
        self.by_name.get(name).ok_or_else(|| GraphError::UnknownAttribute(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn searchable_names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().filter(move |n| self.by_name[*n].is_searchable()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_names() {
        let mut registry = AttributeRegistry::new();
        let err = registry
            .register("1bad", ElementType::Node, AttributeFlags::empty(), |_| None)
            .unwrap_err();
        assert!(matches!(err, GraphError::InvalidAttributeName(_)));
    }

    #[test]
    fn rejects_duplicate_names() {
        let mut registry = AttributeRegistry::new();
        registry.register("Weight", ElementType::Edge, AttributeFlags::empty(), |_| None).unwrap();
        let err = registry
            .register("Weight", ElementType::Edge, AttributeFlags::empty(), |_| None)
            .unwrap_err();
        assert!(matches!(err, GraphError::DuplicateAttribute(_)));
    }

    #[test]
    fn searchable_flag_filters_names() {
        let mut registry = AttributeRegistry::new();
        registry
            .register("Label", ElementType::Node, AttributeFlags::SEARCHABLE, |_| None)
            .unwrap();
        registry.register("Internal", ElementType::Node, AttributeFlags::empty(), |_| None).unwrap();
        let names: Vec<&str> = registry.searchable_names().collect();
        assert_eq!(names, vec!["Label"]);
    }
}
