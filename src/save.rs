//! The opaque, self-describing save format: a 4-byte magic, a 2-byte
//! version, then a gzip-compressed JSON payload carrying topology,
//! attribute values, the transform pipeline, cameras and the selection.
//!
//! Loading never touches the gzip stream before checking magic and
//! version, so a file from some other tool (or a future incompatible
//! version of this one) is rejected as a `GraphError` before any
//! decompression work happens.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::attribute::{AttrValue, AttributeFlags, ElementType};
use crate::camera::Camera;
use crate::config::EngineConfig;
use crate::document::Document;
use crate::error::{GraphError, GraphResult};
use crate::id::{ComponentId, EdgeId, NodeId};
use crate::transform::TransformConfig;
use crate::transformed_graph::GraphView;

const MAGIC: [u8; 4] = *b"GRCE";
const VERSION: u16 = 1;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
enum ValueTypeTag {
    Int,
    Float,
    String,
}

impl ValueTypeTag {
    fn of(value: &AttrValue) -> Self {
        match value {
            AttrValue::Int(_) => ValueTypeTag::Int,
            AttrValue::Float(_) => ValueTypeTag::Float,
            AttrValue::String(_) => ValueTypeTag::String,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct NodeRecord {
    id: u32,
    merge_head_id: u32,
    x: f32,
    y: f32,
    z: f32,
}

#[derive(Serialize, Deserialize)]
struct EdgeRecord {
    id: u32,
    source: u32,
    target: u32,
    merge_head_id: u32,
}

#[derive(Serialize, Deserialize)]
struct AttributeRecord {
    name: String,
    element_type: ElementType,
    value_type: ValueTypeTag,
    flags: u8,
    values: Vec<(u32, AttrValue)>,
}

#[derive(Serialize, Deserialize)]
struct CameraRecord {
    component: u32,
    camera: Camera,
}

#[derive(Serialize, Deserialize)]
struct SavePayload {
    node_count: u32,
    edge_count: u32,
    component_count: u32,
    attribute_count: u32,
    nodes: Vec<NodeRecord>,
    edges: Vec<EdgeRecord>,
    attributes: Vec<AttributeRecord>,
    transform_configs: Vec<TransformConfig>,
    cameras: Vec<CameraRecord>,
    selection: Vec<u32>,
}

/// Serialises `document` into the blob described in the external
/// interfaces section: magic, version, then gzip-compressed JSON.
pub fn save_to_bytes(document: &Document) -> GraphResult<Vec<u8>> {
    let payload = build_payload(document);

    let json = serde_json::to_vec(&payload).map_err(|e| GraphError::MalformedSaveFile(e.to_string()))?;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json)?;
    let compressed = encoder.finish()?;

    let mut out = Vec::with_capacity(6 + compressed.len());
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.extend_from_slice(&compressed);
    tracing::info!(bytes = out.len(), nodes = payload.node_count, edges = payload.edge_count, "document saved");
    Ok(out)
}

fn build_payload(document: &Document) -> SavePayload {
    let graph = document.graph();
    let positions_by_head = head_positions(document);

    let nodes: Vec<NodeRecord> = graph
        .node_ids()
        .map(|node| {
            let head = graph.head_of_node(node);
            let position = positions_by_head.get(&head).copied().unwrap_or(glam::Vec3::ZERO);
            NodeRecord {
                id: node.index() as u32,
                merge_head_id: head.index() as u32,
                x: position.x,
                y: position.y,
                z: position.z,
            }
        })
        .collect();

    let edges: Vec<EdgeRecord> = graph
        .edge_ids()
        .map(|edge| EdgeRecord {
            id: edge.index() as u32,
            source: graph.source(edge).index() as u32,
            target: graph.target(edge).index() as u32,
            merge_head_id: graph.head_of_edge(edge).index() as u32,
        })
        .collect();

    let attributes: Vec<AttributeRecord> = document
        .registry()
        .names()
        .map(|name| build_attribute_record(document, name))
        .collect();

    let cameras: Vec<CameraRecord> = document
        .cameras()
        .map(|(component, camera)| CameraRecord { component: component.index() as u32, camera: camera.clone() })
        .collect();

    let selection: Vec<u32> = document.selection().iter().map(|n| n.index() as u32).collect();

    SavePayload {
        node_count: graph.num_nodes() as u32,
        edge_count: graph.num_edges() as u32,
        component_count: document.components().num_components() as u32,
        attribute_count: attributes.len() as u32,
        nodes,
        edges,
        attributes,
        transform_configs: document.transform_configs().to_vec(),
        cameras,
        selection,
    }
}

/// Maps each source head node to the rendered position of whichever
/// `TransformedGraph` id the current pipeline output minted for it.
/// Tail nodes and nodes the pipeline filtered out of the current view
/// have no entry, and fall back to the origin in `build_payload`.
fn head_positions(document: &Document) -> FxHashMap<NodeId, glam::Vec3> {
    let Some(transformed) = document.transformed() else { return FxHashMap::default() };
    transformed
        .node_ids()
        .map(|rendered| (document.graph().head_of_node(rendered), document.positions().get(rendered)))
        .collect()
}

fn build_attribute_record(document: &Document, name: &str) -> AttributeRecord {
    let attribute = document.registry().get(name).expect("name came from the registry's own listing");

    let domain: Vec<u32> = match attribute.element_type {
        ElementType::Node => document.graph().node_ids().map(|n| n.index() as u32).collect(),
        ElementType::Edge => document.graph().edge_ids().map(|e| e.index() as u32).collect(),
        ElementType::Component => document.components().component_ids().map(|c| c.index() as u32).collect(),
        ElementType::None => Vec::new(),
    };

    let values: Vec<(u32, AttrValue)> =
        domain.into_iter().filter_map(|raw_id| attribute.value_fn_raw(raw_id).map(|v| (raw_id, v))).collect();

    let value_type = values.first().map(|(_, v)| ValueTypeTag::of(v)).unwrap_or(ValueTypeTag::Int);

    AttributeRecord {
        name: name.to_string(),
        element_type: attribute.element_type,
        value_type,
        flags: attribute.flags.bits(),
        values,
    }
}

/// Validates the magic and version, decompresses, and rebuilds a fresh
/// `Document` by replaying the saved topology, attributes, transform
/// pipeline, cameras and selection through the ordinary public API - in
/// that order, since attributes may be referenced by transform
/// conditions and positions can only be restored once the pipeline has
/// re-minted the same `TransformedGraph` ids the save walked.
pub fn load_from_bytes(bytes: &[u8]) -> GraphResult<Document> {
    load_from_bytes_with_engine(bytes, EngineConfig::from_env())
}

pub fn load_from_bytes_with_engine(bytes: &[u8], engine: EngineConfig) -> GraphResult<Document> {
    if bytes.len() < 6 {
        return Err(GraphError::MalformedSaveFile("file shorter than the header".into()));
    }
    if bytes[0..4] != MAGIC {
        return Err(GraphError::MalformedSaveFile("bad magic".into()));
    }
    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version != VERSION {
        return Err(GraphError::UnsupportedSaveVersion { found: version, expected: VERSION });
    }

    let mut decoder = GzDecoder::new(&bytes[6..]);
    let mut json = Vec::new();
    decoder.read_to_end(&mut json)?;

    let payload: SavePayload =
        serde_json::from_slice(&json).map_err(|e| GraphError::MalformedSaveFile(e.to_string()))?;

    let mut document = Document::with_engine(engine)?;

    // Nodes are re-added in ascending saved-id order so a fresh
    // `IdPool` (which hands out 0, 1, 2, ... with an empty vacated
    // queue) reproduces the same ids the save walked.
    let mut sorted_nodes = payload.nodes;
    sorted_nodes.sort_by_key(|n| n.id);
    for record in &sorted_nodes {
        let got = document.add_node();
        debug_assert_eq!(got.index() as u32, record.id, "node save-id must be dense and ascending");
    }

    let mut sorted_edges = payload.edges;
    sorted_edges.sort_by_key(|e| e.id);
    for record in &sorted_edges {
        let got = document.add_edge(NodeId::new(record.source), NodeId::new(record.target));
        debug_assert_eq!(got.index() as u32, record.id, "edge save-id must be dense and ascending");
    }

    // Replay merges grouped by head, smallest head first, since
    // `merge_nodes` always canonicalises on the smallest id in the set
    // and the original save walked heads in that same order.
    let mut groups: FxHashMap<u32, Vec<u32>> = FxHashMap::default();
    for record in &sorted_nodes {
        if record.merge_head_id != record.id {
            groups.entry(record.merge_head_id).or_default().push(record.id);
        }
    }
    let mut heads: Vec<u32> = groups.keys().copied().collect();
    heads.sort_unstable();
    for head in heads {
        let mut members = vec![head];
        members.extend(groups[&head].iter().copied());
        document.merge_nodes(members.into_iter().map(NodeId::new));
    }

    for record in &payload.attributes {
        let values: FxHashMap<u32, AttrValue> = record.values.iter().cloned().collect();
        let flags = AttributeFlags::from_bits_truncate(record.flags);
        let _ = document.register_attribute(record.name.clone(), record.element_type, flags, move |raw_id| {
            values.get(&raw_id).cloned()
        });
    }

    document.set_transform_configs(payload.transform_configs);

    let rendered_by_head: FxHashMap<NodeId, NodeId> = match document.transformed() {
        Some(transformed) => {
            transformed.node_ids().map(|rendered| (document.graph().head_of_node(rendered), rendered)).collect()
        }
        None => FxHashMap::default(),
    };
    for record in &sorted_nodes {
        if let Some(&rendered) = rendered_by_head.get(&NodeId::new(record.merge_head_id)) {
            document.restore_position(rendered, glam::Vec3::new(record.x, record.y, record.z));
        }
    }

    for camera in payload.cameras {
        document.set_camera(ComponentId::new(camera.component), camera.camera);
    }

    document.select(payload.selection.into_iter().map(NodeId::new));

    tracing::info!(
        nodes = document.graph().num_nodes(),
        edges = document.graph().num_edges(),
        "document loaded"
    );
    Ok(document)
}
