use std::collections::{BTreeSet, HashMap};

use serde::Serialize;
use tracing::{debug, instrument};

use crate::error::{Result, ToolError};
use crate::model::{ChartKind, FlatTable, Forest, ForestNode, NodeIndex};

/// Converts the flat table into a forest, consuming it.
///
/// Row order does not matter: every record is placed in the arena before any
/// parent link is resolved. All dangling parent names are reported together.
#[instrument(level = "debug", skip_all, fields(record_count = table.len()))]
pub fn build_forest(table: FlatTable) -> Result<Forest> {
    let records = table.into_records();
    let positions: HashMap<String, NodeIndex> = records
        .iter()
        .enumerate()
        .map(|(index, record)| (record.name.clone(), index))
        .collect();

    let mut missing: BTreeSet<String> = BTreeSet::new();
    let mut parents: Vec<Option<NodeIndex>> = Vec::with_capacity(records.len());
    for record in &records {
        match record.parent.as_deref() {
            None => parents.push(None),
            Some(parent) => match positions.get(parent) {
                Some(&index) => parents.push(Some(index)),
                None => {
                    missing.insert(parent.to_string());
                    parents.push(None);
                }
            },
        }
    }

    if !missing.is_empty() {
        return Err(ToolError::UnresolvedParent {
            missing: missing.into_iter().collect(),
        });
    }

    let mut forest = Forest {
        nodes: records
            .into_iter()
            .zip(parents.iter().copied())
            .map(|(record, parent)| ForestNode {
                name: record.name,
                group: record.group,
                distribution: record.distribution,
                attributes: record.attributes,
                continuations: record.continuations,
                parent,
                children: Vec::new(),
            })
            .collect(),
        roots: Vec::new(),
    };

    for (index, parent) in parents.into_iter().enumerate() {
        match parent {
            Some(parent) => forest.nodes[parent].children.push(index),
            None => forest.roots.push(index),
        }
    }

    let reachable = forest.depth_first();
    if reachable.len() != forest.nodes.len() {
        let mut seen = vec![false; forest.nodes.len()];
        for index in reachable {
            seen[index] = true;
        }
        let names = forest
            .nodes
            .iter()
            .zip(seen)
            .filter(|(_, seen)| !seen)
            .map(|(node, _)| node.name.clone())
            .collect();
        return Err(ToolError::DetachedRecords { names });
    }

    debug!(
        node_count = forest.nodes.len(),
        root_count = forest.roots.len(),
        "forest built"
    );
    Ok(forest)
}

/// Flattened view of a node as shown by the chart preview tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeEntry {
    pub value: String,
    pub parent: Option<String>,
    pub expandable: bool,
    pub number: Option<String>,
}

/// Flattens the forest parent-first into tree entries.
pub fn tree_entries(forest: &Forest, kind: ChartKind) -> Vec<TreeEntry> {
    forest
        .depth_first()
        .into_iter()
        .map(|index| {
            let node = forest.node(index);
            TreeEntry {
                value: node.name.clone(),
                parent: node.parent.map(|parent| forest.node(parent).name.clone()),
                expandable: node.is_group(),
                number: node.attribute(kind.number_field()).map(str::to_string),
            }
        })
        .collect()
}

/// Entries whose parent is `parent`; `None` or the kind's root label select
/// the top level.
pub fn children_of(forest: &Forest, kind: ChartKind, parent: Option<&str>) -> Vec<TreeEntry> {
    let parent = parent.filter(|parent| *parent != kind.root_label());
    tree_entries(forest, kind)
        .into_iter()
        .filter(|entry| entry.parent.as_deref() == parent)
        .collect()
}
