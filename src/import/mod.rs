//! Materialises a forest as records in a [`RecordStore`].
//!
//! Cost centers are walked here directly. Account charts go through the
//! [`ChartCreator`] seam, followed by a [`CompanyDefaults`] refresh.

use std::collections::BTreeMap;

use serde_json::{Value, json};
use tracing::{debug, info, instrument};

use crate::error::{Result, ToolError};
use crate::model::{
    Attributes, DISTRIBUTION_ENABLED_FIELD, DISTRIBUTION_PERCENTAGE_FIELD,
    DISTRIBUTION_TARGET_FIELD, DistributionLink, Forest, ForestNode, parse_percentage,
};
use crate::store::{Fields, Filter, RecordId, RecordStore, WriteFlags, filter_eq};

/// Record kind of companies in the store.
pub const COMPANY_KIND: &str = "Company";

/// Imported record identifier and its distribution lines, keyed by sheet name.
pub type NameMap = BTreeMap<String, NameEntry>;

#[derive(Debug, Clone, PartialEq)]
pub struct NameEntry {
    pub id: RecordId,
    /// Empty unless the cost center distributes its costs.
    pub links: Vec<DistributionLink>,
}

impl NameEntry {
    pub fn new(id: impl Into<RecordId>, links: Vec<DistributionLink>) -> Self {
        Self {
            id: id.into(),
            links,
        }
    }
}

/// Creates one `Cost Center` record per node, parents before children.
///
/// Returns the name map needed to resolve distribution links afterwards.
/// Any store failure aborts the walk; records created so far are left in place.
#[instrument(level = "info", skip_all, fields(%company, node_count = forest.len()))]
pub fn import_cost_centers(
    store: &mut dyn RecordStore,
    company: &str,
    forest: &Forest,
) -> Result<NameMap> {
    let mut names = NameMap::new();
    let mut assigned: Vec<Option<RecordId>> = vec![None; forest.len()];

    for index in forest.depth_first() {
        let node = forest.node(index);
        let parent_id = node.parent.and_then(|parent| assigned[parent].clone());
        let (fields, links) = cost_center_fields(node, company, parent_id)?;

        let id = store.create("Cost Center", fields, WriteFlags::unchecked())?;
        debug!(name = %node.name, %id, "cost center created");
        names.insert(node.name.clone(), NameEntry::new(id.clone(), links));
        assigned[index] = Some(id);
    }

    info!(created = names.len(), "cost centers imported");
    Ok(names)
}

fn cost_center_fields(
    node: &ForestNode,
    company: &str,
    parent_id: Option<RecordId>,
) -> Result<(Fields, Vec<DistributionLink>)> {
    let mut attributes = node.attributes.clone();
    let enabled = node.distribution;

    let mut lines = vec![split_distribution(&mut attributes)];
    lines.extend(node.continuations.iter().cloned());

    let links = if enabled {
        lines
            .iter()
            .map(distribution_link)
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .flatten()
            .collect()
    } else {
        Vec::new()
    };

    let mut fields = Fields::new();
    fields.insert("cost_center_name".into(), json!(node.name));
    fields.insert("company".into(), json!(company));
    fields.insert(
        "parent_cost_center".into(),
        parent_id.map(Value::from).unwrap_or(Value::Null),
    );
    fields.insert("is_group".into(), json!(u8::from(node.is_group())));
    fields.insert(
        "cost_center_number".into(),
        json!(node.attribute("cost_center_number").unwrap_or_default()),
    );
    fields.insert(DISTRIBUTION_ENABLED_FIELD.into(), json!(u8::from(enabled)));
    for (field, value) in attributes {
        fields.entry(field).or_insert(Value::String(value));
    }

    Ok((fields, links))
}

/// Moves the primary distribution pair out of the attributes.
fn split_distribution(attributes: &mut Attributes) -> Attributes {
    [DISTRIBUTION_TARGET_FIELD, DISTRIBUTION_PERCENTAGE_FIELD]
        .into_iter()
        .filter_map(|field| {
            attributes
                .remove(field)
                .map(|value| (field.to_string(), value))
        })
        .collect()
}

fn distribution_link(line: &Attributes) -> Result<Option<DistributionLink>> {
    let cell = |field: &str| {
        line.get(field)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    };
    let target = cell(DISTRIBUTION_TARGET_FIELD);
    let percentage = cell(DISTRIBUTION_PERCENTAGE_FIELD);
    if target.is_none() && percentage.is_none() {
        return Ok(None);
    }

    let percentage = match percentage {
        None => 0.0,
        Some(value) => parse_percentage(value).ok_or_else(|| ToolError::InvalidLiteral {
            column: DISTRIBUTION_PERCENTAGE_FIELD.to_string(),
            value: value.to_string(),
        })?,
    };
    Ok(Some(DistributionLink::new(
        target.unwrap_or_default(),
        percentage,
    )))
}

/// Materialises an account forest for a company.
pub trait ChartCreator {
    fn create_charts(
        &self,
        store: &mut dyn RecordStore,
        company: &str,
        forest: &Forest,
    ) -> Result<usize>;
}

/// Recomputes company-level settings once an account chart is in place.
pub trait CompanyDefaults {
    fn refresh(&self, store: &mut dyn RecordStore, company: &str) -> Result<()>;
}

/// Writes `Account` records straight into the store.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreChartCreator;

/// Report type an account inherits from its root type.
pub fn report_type(root_type: &str) -> &'static str {
    match root_type {
        "Asset" | "Liability" | "Equity" => "Balance Sheet",
        _ => "Profit and Loss",
    }
}

impl ChartCreator for StoreChartCreator {
    #[instrument(level = "info", skip_all, fields(%company, node_count = forest.len()))]
    fn create_charts(
        &self,
        store: &mut dyn RecordStore,
        company: &str,
        forest: &Forest,
    ) -> Result<usize> {
        let mut assigned: Vec<Option<RecordId>> = vec![None; forest.len()];
        let mut root_types: Vec<Option<String>> = vec![None; forest.len()];

        for index in forest.depth_first() {
            let node = forest.node(index);
            let root_type = node
                .attribute("root_type")
                .map(str::to_string)
                .or_else(|| node.parent.and_then(|parent| root_types[parent].clone()));

            let mut fields = Fields::new();
            fields.insert("account_name".into(), json!(node.name));
            fields.insert("company".into(), json!(company));
            fields.insert(
                "parent_account".into(),
                node.parent
                    .and_then(|parent| assigned[parent].clone())
                    .map(Value::from)
                    .unwrap_or(Value::Null),
            );
            fields.insert("is_group".into(), json!(u8::from(node.is_group())));
            fields.insert(
                "account_number".into(),
                json!(node.attribute("account_number").unwrap_or_default()),
            );
            fields.insert(
                "account_type".into(),
                json!(node.attribute("account_type").unwrap_or_default()),
            );
            if let Some(root_type) = &root_type {
                fields.insert("root_type".into(), json!(root_type));
                fields.insert("report_type".into(), json!(report_type(root_type)));
            }
            for (field, value) in &node.attributes {
                fields
                    .entry(field.clone())
                    .or_insert_with(|| Value::String(value.clone()));
            }

            let id = store.create("Account", fields, WriteFlags::unchecked())?;
            debug!(name = %node.name, %id, "account created");
            assigned[index] = Some(id);
            root_types[index] = root_type;
        }

        info!(created = forest.len(), "accounts imported");
        Ok(forest.len())
    }
}

/// Points the company's default receivable and payable accounts at the
/// first matching ledger account of the new chart.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreCompanyDefaults;

impl StoreCompanyDefaults {
    fn first_ledger(
        store: &dyn RecordStore,
        company: &str,
        account_type: &str,
    ) -> Result<Value> {
        let filter = Filter::from([
            ("company".to_string(), json!(company)),
            ("account_type".to_string(), json!(account_type)),
            ("is_group".to_string(), json!(0)),
        ]);
        Ok(store
            .query("Account", &filter)?
            .into_iter()
            .next()
            .map(|record| Value::from(record.id))
            .unwrap_or(Value::Null))
    }
}

impl CompanyDefaults for StoreCompanyDefaults {
    #[instrument(level = "info", skip(self, store))]
    fn refresh(&self, store: &mut dyn RecordStore, company: &str) -> Result<()> {
        let record = store
            .query(COMPANY_KIND, &filter_eq("company_name", company))?
            .into_iter()
            .next()
            .ok_or_else(|| ToolError::UnknownCompany(company.to_string()))?;

        let mut fields = Fields::new();
        fields.insert(
            "default_receivable_account".into(),
            Self::first_ledger(store, company, "Receivable")?,
        );
        fields.insert(
            "default_payable_account".into(),
            Self::first_ledger(store, company, "Payable")?,
        );
        store.update(COMPANY_KIND, &record.id, fields)
    }
}
