use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Header key holding the name of the parent record.
pub const PARENT_FIELD: &str = "parent_name";
/// Header key holding the explicit group flag.
pub const GROUP_FIELD: &str = "is_group";
/// Header key toggling percentage distribution on a cost center.
pub const DISTRIBUTION_ENABLED_FIELD: &str = "enable_distributed_cost_center";
/// Header key naming the cost center that receives a share.
pub const DISTRIBUTION_TARGET_FIELD: &str = "cost_center_(distributed_cost_center)";
/// Header key carrying the percentage of the share.
pub const DISTRIBUTION_PERCENTAGE_FIELD: &str = "percentage_allocation_(distributed_cost_center)";

/// Normalised field name → raw cell text.
pub type Attributes = BTreeMap<String, String>;

/// Which hierarchy a spreadsheet describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChartKind {
    Account,
    CostCenter,
}

impl ChartKind {
    /// Record kind used in the store for nodes of this chart.
    pub fn record_kind(self) -> &'static str {
        match self {
            ChartKind::Account => "Account",
            ChartKind::CostCenter => "Cost Center",
        }
    }

    /// Minimum number of root records a valid chart declares.
    pub fn minimum_roots(self) -> usize {
        match self {
            ChartKind::Account => 4,
            ChartKind::CostCenter => 1,
        }
    }

    /// Attribute holding the human facing number of a node.
    pub fn number_field(self) -> &'static str {
        match self {
            ChartKind::Account => "account_number",
            ChartKind::CostCenter => "cost_center_number",
        }
    }

    /// Label of the synthetic tree root shown by the preview.
    pub fn root_label(self) -> &'static str {
        match self {
            ChartKind::Account => "All Accounts",
            ChartKind::CostCenter => "All Cost Centers",
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.record_kind())
    }
}

/// Explicit group marker read from the `is_group` column.
///
/// A blank cell is `Unspecified`; the cell `"0"` is `Ledger`, never a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GroupFlag {
    #[default]
    Unspecified,
    Ledger,
    Group,
}

impl GroupFlag {
    /// Maps a parsed integer cell onto the flag.
    pub fn from_int(value: i64) -> Self {
        if value == 0 {
            GroupFlag::Ledger
        } else {
            GroupFlag::Group
        }
    }

    /// True only for an explicit non-zero flag.
    pub fn is_group(self) -> bool {
        self == GroupFlag::Group
    }
}

/// One named row of the spreadsheet together with its continuation rows.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    pub name: String,
    /// `None` marks a root record.
    pub parent: Option<String>,
    pub group: GroupFlag,
    /// Parsed `enable_distributed_cost_center` cell; blank means disabled.
    pub distribution: bool,
    /// Remaining columns, `parent_name`, `is_group` and the distribution
    /// toggle excluded.
    pub attributes: Attributes,
    /// Nameless rows that followed this record, in sheet order.
    pub continuations: Vec<Attributes>,
}

impl Record {
    /// A root record with no attributes.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Returns the trimmed attribute value, treating blanks as absent.
    pub fn attribute(&self, field: &str) -> Option<&str> {
        non_blank(self.attributes.get(field))
    }

    /// Whether the `enable_distributed_cost_center` cell held a non-zero number.
    pub fn distribution_enabled(&self) -> bool {
        self.distribution
    }
}

/// Records keyed by their unique name, preserving sheet order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FlatTable {
    records: Vec<Record>,
    index: HashMap<String, usize>,
}

impl FlatTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a record. Returns the record back when the name is already taken.
    pub fn insert(&mut self, record: Record) -> std::result::Result<(), Record> {
        if self.index.contains_key(&record.name) {
            return Err(record);
        }
        self.index.insert(record.name.clone(), self.records.len());
        self.records.push(record);
        Ok(())
    }

    /// Looks a record up by name.
    pub fn get(&self, name: &str) -> Option<&Record> {
        self.index.get(name).map(|&position| &self.records[position])
    }

    /// Mutable lookup by name.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Record> {
        self.index
            .get(name)
            .map(|&position| &mut self.records[position])
    }

    /// Whether a record with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// The most recently inserted record.
    pub fn last_mut(&mut self) -> Option<&mut Record> {
        self.records.last_mut()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in sheet order.
    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    /// Records in sheet order, mutably.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Record> {
        self.records.iter_mut()
    }

    /// Consumes the table, keeping sheet order.
    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}

/// Position of a node inside [`Forest::nodes`].
pub type NodeIndex = usize;

/// A record placed in the hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub struct ForestNode {
    pub name: String,
    pub group: GroupFlag,
    pub distribution: bool,
    pub attributes: Attributes,
    pub continuations: Vec<Attributes>,
    pub parent: Option<NodeIndex>,
    /// Children in sheet order.
    pub children: Vec<NodeIndex>,
}

impl ForestNode {
    /// Returns the trimmed attribute value, treating blanks as absent.
    pub fn attribute(&self, field: &str) -> Option<&str> {
        non_blank(self.attributes.get(field))
    }

    /// A node is a group when it has children or says so explicitly.
    pub fn is_group(&self) -> bool {
        !self.children.is_empty() || self.group.is_group()
    }
}

/// Arena holding every node of the imported hierarchy.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Forest {
    pub nodes: Vec<ForestNode>,
    /// Top level nodes in sheet order.
    pub roots: Vec<NodeIndex>,
}

impl Forest {
    pub fn node(&self, index: NodeIndex) -> &ForestNode {
        &self.nodes[index]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Finds a node by its record name.
    pub fn find(&self, name: &str) -> Option<NodeIndex> {
        self.nodes.iter().position(|node| node.name == name)
    }

    /// Node indices parent-before-child, siblings in sheet order.
    pub fn depth_first(&self) -> Vec<NodeIndex> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<NodeIndex> = self.roots.iter().rev().copied().collect();
        while let Some(index) = stack.pop() {
            order.push(index);
            stack.extend(self.nodes[index].children.iter().rev().copied());
        }
        order
    }
}

/// A pending share of a distributed cost center, still addressed by name.
#[derive(Debug, Clone, PartialEq)]
pub struct DistributionLink {
    pub target: String,
    pub percentage: f64,
}

impl DistributionLink {
    pub fn new(target: impl Into<String>, percentage: f64) -> Self {
        Self {
            target: target.into(),
            percentage,
        }
    }
}

/// Parses an integer cell, accepting integral floats such as `1.0`.
pub fn parse_integer(value: &str) -> Option<i64> {
    let trimmed = value.trim();
    if let Ok(number) = trimmed.parse::<i64>() {
        return Some(number);
    }
    match trimmed.parse::<f64>() {
        Ok(number) if number.is_finite() && number.fract() == 0.0 => Some(number as i64),
        _ => None,
    }
}

/// Parses a percentage cell. `NaN` and infinities are rejected.
pub fn parse_percentage(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|number| number.is_finite())
}

fn non_blank(value: Option<&String>) -> Option<&str> {
    value.map(|value| value.trim()).filter(|value| !value.is_empty())
}
