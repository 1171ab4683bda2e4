//! Term search over searchable node attributes, with merge-set
//! expansion so a match on a tail propagates to its whole head group.

use bitflags::bitflags;
use regex::{Regex, RegexBuilder};
use rustc_hash::FxHashSet;

use crate::attribute::AttributeRegistry;
use crate::graph::mutable_graph::MutableGraph;
use crate::graph::expand_to_merge_sets;
use crate::id::NodeId;
use crate::selection::Selection;

bitflags! {
    #[derive(Debug, Copy, Clone, Eq, PartialEq)]
    pub struct FindOptions: u8 {
        /// Absent means case-insensitive; the flag name follows the
        /// source, where its presence enables case sensitivity.
        const MATCH_CASE = 0x1;
        const MATCH_WHOLE_WORDS = 0x2;
        const MATCH_USING_REGEX = 0x4;
        const MATCH_EXACT = 0x8;
    }
}

/// What a successful `find_nodes` call should do to the current
/// selection; interpreted by [`SearchManager::apply_to_selection`], not
/// by `find_nodes` itself.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum FindSelectStyle {
    #[default]
    None,
    First,
    All,
}

fn compile_pattern(term: &str, options: FindOptions) -> Option<Regex> {
    if options.contains(FindOptions::MATCH_EXACT) {
        return RegexBuilder::new(&format!("^{}$", regex::escape(term))).build().ok();
    }

    let escaped;
    let base = if options.contains(FindOptions::MATCH_USING_REGEX) {
        term
    } else {
        escaped = regex::escape(term);
        &escaped
    };

    let wrapped;
    let pattern = if options.contains(FindOptions::MATCH_WHOLE_WORDS) {
        wrapped = format!(r"\b(?:{base})\b");
        &wrapped
    } else {
        base
    };

    RegexBuilder::new(pattern).case_insensitive(!options.contains(FindOptions::MATCH_CASE)).build().ok()
}

/// Owns the live search term/options/scope and the resulting found-id
/// set, so a later attribute change can `refresh()` the same query.
#[derive(Default)]
pub struct SearchManager {
    term: String,
    options: FindOptions,
    attribute_names: Vec<String>,
    select_style: FindSelectStyle,
    found_node_ids: FxHashSet<NodeId>,
}

impl SearchManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> bool {
        !self.term.is_empty()
    }

    pub fn select_style(&self) -> FindSelectStyle {
        self.select_style
    }

    pub fn found_node_ids(&self) -> &FxHashSet<NodeId> {
        &self.found_node_ids
    }

    /// Runs a new query, returning whether the found-id set changed.
    pub fn find_nodes(
        &mut self,
        graph: &MutableGraph,
        registry: &AttributeRegistry,
        term: impl Into<String>,
        options: FindOptions,
        attribute_names: Vec<String>,
        select_style: FindSelectStyle,
    ) -> bool {
        self.term = term.into();
        self.options = options;
        self.attribute_names = attribute_names;
        self.select_style = select_style;

        if self.term.is_empty() {
            return self.clear_found_node_ids();
        }

        let names: Vec<String> = if self.attribute_names.is_empty() {
            registry.searchable_names().map(str::to_owned).collect()
        } else {
            self.attribute_names.iter().filter(|name| registry.contains(name)).cloned().collect()
        };

        let searchable: Vec<&str> = names
            .iter()
            .filter(|name| registry.get(name).is_ok_and(|a| a.is_searchable()))
            .map(String::as_str)
            .collect();

        if !self.attribute_names.is_empty() && searchable.is_empty() {
            return self.clear_found_node_ids();
        }

        let mut hit_heads = Vec::new();
        if let Some(pattern) = compile_pattern(&self.term, self.options) {
            for head in graph.node_ids().filter(|&n| !graph.is_tail_node(n)) {
                let merge_set: Vec<NodeId> = graph.merge_set_of_node(head).collect();
                let matched = searchable.iter().any(|name| {
                    let Ok(attr) = registry.get(name) else { return false };
                    merge_set.iter().any(|&member| {
                        attr.value_fn_raw(member.index() as u32).is_some_and(|v| pattern.is_match(&v.render()))
                    })
                });

                if matched {
                    hit_heads.push(head);
                }
            }
        }
        let found: FxHashSet<NodeId> = expand_to_merge_sets(graph, hit_heads);

        let changed = found != self.found_node_ids;
        self.found_node_ids = found;
        changed
    }

    pub fn clear_found_node_ids(&mut self) -> bool {
        let changed = !self.found_node_ids.is_empty();
        self.found_node_ids.clear();
        changed
    }

    /// Re-runs the last query as-is, e.g. after a transform run changes
    /// attribute values underneath it.
    pub fn refresh(&mut self, graph: &MutableGraph, registry: &AttributeRegistry) -> bool {
        let (term, options, attribute_names, select_style) =
            (self.term.clone(), self.options, self.attribute_names.clone(), self.select_style);
        self.find_nodes(graph, registry, term, options, attribute_names, select_style)
    }

    /// Interprets `select_style` against the current found-id set.
    pub fn apply_to_selection(&self, selection: &mut Selection) {
        match self.select_style {
            FindSelectStyle::None => {}
            FindSelectStyle::First => {
                if let Some(&first) = self.found_node_ids.iter().min_by_key(|n| n.index()) {
                    selection.select_only([first]);
                }
            }
            FindSelectStyle::All => {
                selection.select_only(self.found_node_ids.iter().copied());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::{AttrValue, AttributeFlags, ElementType};

    fn labelled_graph() -> (MutableGraph, AttributeRegistry) {
        let mut graph = MutableGraph::new();
        let a = graph.add_node();
        let b = graph.add_node();
        let c = graph.add_node();
        graph.add_edge(a, b);
        graph.add_edge(b, c);

        let mut registry = AttributeRegistry::new();
        let labels = [(a.index() as u32, "Apple"), (b.index() as u32, "Banana"), (c.index() as u32, "apple pie")];
        let map: rustc_hash::FxHashMap<u32, String> = labels.iter().map(|&(id, s)| (id, s.to_string())).collect();
        registry
            .register("Label", ElementType::Node, AttributeFlags::SEARCHABLE, move |id| {
                map.get(&id).cloned().map(AttrValue::String)
            })
            .unwrap();

        (graph, registry)
    }

    #[test]
    fn case_insensitive_by_default() {
        let (graph, registry) = labelled_graph();
        let mut search = SearchManager::new();
        let changed = search.find_nodes(&graph, &registry, "apple", FindOptions::empty(), vec![], FindSelectStyle::All);
        assert!(changed);
        assert_eq!(search.found_node_ids().len(), 2);
    }

    #[test]
    fn match_case_makes_it_sensitive() {
        let (graph, registry) = labelled_graph();
        let mut search = SearchManager::new();
        search.find_nodes(&graph, &registry, "apple", FindOptions::MATCH_CASE, vec![], FindSelectStyle::None);
        assert_eq!(search.found_node_ids().len(), 1);
    }

    #[test]
    fn empty_term_clears_results() {
        let (graph, registry) = labelled_graph();
        let mut search = SearchManager::new();
        search.find_nodes(&graph, &registry, "apple", FindOptions::empty(), vec![], FindSelectStyle::None);
        assert!(search.active());
        search.find_nodes(&graph, &registry, "", FindOptions::empty(), vec![], FindSelectStyle::None);
        assert!(!search.active());
        assert!(search.found_node_ids().is_empty());
    }

    #[test]
    fn refresh_reruns_last_query() {
        let (graph, registry) = labelled_graph();
        let mut search = SearchManager::new();
        search.find_nodes(&graph, &registry, "banana", FindOptions::empty(), vec![], FindSelectStyle::None);
        assert_eq!(search.found_node_ids().len(), 1);
        assert!(!search.refresh(&graph, &registry));
    }
}
