//! Cross-module scenarios driven entirely through `Document`'s public
//! command surface, the way the literal end-to-end scenarios in this
//! engine's design documents are stated: as sequences of graph edits
//! and transform/search calls, checked against component counts and
//! view-graph shape rather than against any one subsystem in isolation.

use graphcore::config::EngineConfig;
use graphcore::document::Document;
use graphcore::error::GraphError;
use graphcore::save::{load_from_bytes_with_engine, save_to_bytes};
use graphcore::search::{FindOptions, FindSelectStyle};
use graphcore::transform::condition::{CompareOp, ConditionNode, Literal};
use graphcore::transform::config::ParamValue;
use graphcore::transform::TransformConfig;

fn test_document() -> Document {
    Document::with_engine(EngineConfig::for_tests()).expect("worker pool should build in tests")
}

#[test_log::test]
fn triangle_splits_into_two_components_once_fully_bridged() {
    let mut doc = test_document();
    let a = doc.add_node();
    let b = doc.add_node();
    let c = doc.add_node();
    let ab = doc.add_edge(a, b);
    let bc = doc.add_edge(b, c);
    let ca = doc.add_edge(c, a);

    assert_eq!(doc.graph().num_nodes(), 3);
    assert_eq!(doc.graph().num_edges(), 3);
    assert_eq!(doc.components().num_components(), 1);

    doc.remove_edge(bc);
    assert_eq!(doc.components().num_components(), 1, "still connected through a-b and a-c");

    doc.remove_edge(ca);
    assert_eq!(doc.components().num_components(), 2);
    let _ = ab;
}

#[test_log::test]
fn filter_by_degree_leaves_the_path_s_interior() {
    let mut doc = test_document();
    let nodes: Vec<_> = (0..5).map(|_| doc.add_node()).collect();
    for pair in nodes.windows(2) {
        doc.add_edge(pair[0], pair[1]);
    }

    doc.set_transform_configs(vec![TransformConfig::new("filter")
        .with_parameter("element", ParamValue::Text("node".into()))
        .with_condition(ConditionNode::compare("$degree", CompareOp::Lt, Literal::Number(2.0)))]);

    let view = doc.transformed().expect("pipeline ran");
    assert_eq!(view.num_nodes(), 3, "only N2, N3, N4 keep degree >= 2");
    assert_eq!(view.num_edges(), 2);
}

#[test_log::test]
fn contract_low_weight_edge_leaves_one_node_bridging_to_the_third() {
    let mut doc = test_document();
    let a = doc.add_node();
    let b = doc.add_node();
    let c = doc.add_node();
    let ab = doc.add_edge(a, b);
    doc.add_edge(b, c);

    doc.register_attribute(
        "Weight",
        graphcore::attribute::ElementType::Edge,
        graphcore::attribute::AttributeFlags::empty(),
        move |raw| {
            if raw == ab.index() as u32 {
                Some(graphcore::attribute::AttrValue::Float(0.1))
            } else {
                Some(graphcore::attribute::AttrValue::Float(5.0))
            }
        },
    )
    .unwrap();

    doc.set_transform_configs(vec![TransformConfig::new("contract")
        .with_parameter("element", ParamValue::Text("edge".into()))
        .with_condition(ConditionNode::compare("Weight", CompareOp::Lt, Literal::Number(1.0)))]);

    let view = doc.transformed().expect("pipeline ran");
    assert_eq!(view.num_nodes(), 2, "a and b merge into one head, leaving it and c");
    assert_eq!(view.num_edges(), 1);
}

#[test_log::test]
fn search_then_clear_then_re_search_is_idempotent() {
    let mut doc = test_document();
    let apple = doc.add_node();
    let banana = doc.add_node();
    let apricot = doc.add_node();

    doc.register_attribute(
        "Label",
        graphcore::attribute::ElementType::Node,
        graphcore::attribute::AttributeFlags::SEARCHABLE,
        move |raw| {
            let label = if raw == apple.index() as u32 {
                "apple"
            } else if raw == banana.index() as u32 {
                "banana"
            } else {
                "apricot"
            };
            Some(graphcore::attribute::AttrValue::String(label.into()))
        },
    )
    .unwrap();

    doc.find_nodes("ap", FindOptions::empty(), vec!["Label".into()], FindSelectStyle::All);
    assert!(doc.selection().contains(apple));
    assert!(doc.selection().contains(apricot));
    assert!(!doc.selection().contains(banana));

    doc.clear_selection();
    assert_eq!(doc.selection().len(), 0);

    doc.find_nodes(
        "APPLE",
        FindOptions::MATCH_CASE,
        vec!["Label".into()],
        FindSelectStyle::All,
    );
    assert_eq!(doc.selection().len(), 0, "case-sensitive search for the wrong case matches nothing");
}

#[test_log::test]
fn save_and_reload_round_trips_topology_attributes_and_pipeline() {
    let mut doc = test_document();
    let a = doc.add_node();
    let b = doc.add_node();
    let c = doc.add_node();
    doc.add_edge(a, b);
    doc.add_edge(b, c);
    doc.select([a]);
    doc.set_transform_configs(vec![TransformConfig::new("filter")
        .with_parameter("element", ParamValue::Text("node".into()))
        .with_condition(ConditionNode::compare("$degree", CompareOp::Lt, Literal::Number(1.0)))]);

    let bytes = save_to_bytes(&doc).expect("save should succeed");
    let reloaded = load_from_bytes_with_engine(&bytes, EngineConfig::for_tests()).expect("load should succeed");

    assert_eq!(reloaded.graph().num_nodes(), doc.graph().num_nodes());
    assert_eq!(reloaded.graph().num_edges(), doc.graph().num_edges());
    assert_eq!(reloaded.transform_configs().len(), 1);
    assert!(reloaded.selection().contains(a));
}

#[test_log::test]
fn malformed_save_blob_is_a_typed_error_not_a_panic() {
    let err = load_from_bytes_with_engine(b"not-a-real-save-file", EngineConfig::for_tests()).unwrap_err();
    assert!(matches!(err, GraphError::MalformedSaveFile(_)));
}
