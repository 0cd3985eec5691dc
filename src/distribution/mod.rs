use serde_json::{Value, json};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::error::{Result, ToolError};
use crate::import::NameMap;
use crate::store::{Fields, RecordStore};

/// Child table on a cost center holding its distribution shares.
pub const DISTRIBUTION_TABLE: &str = "distributed_cost_center";

/// Rewrites pending distribution links into identifier based link rows.
///
/// Every source cost center is written once, with all of its shares.
/// Returns the number of link rows appended.
#[instrument(level = "info", skip_all, fields(entry_count = names.len()))]
pub fn resolve_distributions(store: &mut dyn RecordStore, names: &NameMap) -> Result<usize> {
    let mut resolved = 0;

    for (name, entry) in names {
        if entry.links.is_empty() {
            continue;
        }

        let record = store.get("Cost Center", &entry.id)?;
        let mut rows = match record.fields.get(DISTRIBUTION_TABLE) {
            Some(Value::Array(rows)) => rows.clone(),
            _ => Vec::new(),
        };

        for link in &entry.links {
            let target = names
                .get(&link.target)
                .ok_or_else(|| ToolError::UnknownDistributionTarget {
                    source_name: name.clone(),
                    target: link.target.clone(),
                })?;
            rows.push(json!({
                "name": Uuid::new_v4().to_string(),
                "cost_center": target.id,
                "percentage_allocation": link.percentage,
            }));
        }

        resolved += entry.links.len();
        let fields = Fields::from([(DISTRIBUTION_TABLE.to_string(), Value::Array(rows))]);
        store.update("Cost Center", &entry.id, fields)?;
        debug!(%name, links = entry.links.len(), "distribution resolved");
    }

    info!(resolved, "distribution links resolved");
    Ok(resolved)
}
