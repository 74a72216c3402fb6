//! Read-only records fetched from database views.
//!
//! Rows are decoded from the JSON objects returned by the row store. Columns
//! the record does not name are kept in `extra` where the view is wider than
//! the fields this service relies on, so they reach clients untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;

/// Singleton key of the metadata row holding the data version.
pub const GLOBAL_VERSION_ID: &str = "global";

/// Upstream data version written by the external sync job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub id: String,
    pub version: i64,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_synced_at: Option<OffsetDateTime>,
}

/// Item list entry, as rendered by the item browser grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRow {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub rarity: Option<String>,
    #[serde(default)]
    pub item_type: Option<String>,
}

/// Full item record for detail previews.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDetailRow {
    #[serde(flatten)]
    pub item: ItemRow,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Where an item can be obtained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemSourceRow {
    pub item_id: String,
    #[serde(default)]
    pub source_type: Option<String>,
    #[serde(default)]
    pub source_name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One material line of a crafting recipe or a recycling yield.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialRow {
    pub item_id: String,
    pub material_id: String,
    #[serde(default)]
    pub material_name: Option<String>,
    pub quantity: i64,
}

/// One component consumed when repairing an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostRow {
    pub item_id: String,
    pub component_id: String,
    #[serde(default)]
    pub component_name: Option<String>,
    pub quantity: i64,
    #[serde(default)]
    pub unit_cost: Option<f64>,
}

/// Repair-versus-replace economics for a single item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairEconomyRow {
    pub item_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub rarity: Option<String>,
    #[serde(default)]
    pub repair_cost: Option<f64>,
    #[serde(default)]
    pub sell_value: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn version_record_accepts_missing_sync_time() {
        let record: VersionRecord =
            serde_json::from_value(json!({ "id": "global", "version": 7 })).expect("decode");
        assert_eq!(record.version, 7);
        assert!(record.last_synced_at.is_none());
    }

    #[test]
    fn version_record_parses_database_timestamps() {
        let record: VersionRecord = serde_json::from_value(json!({
            "id": "global",
            "version": 3,
            "last_synced_at": "2024-05-01T12:30:00.123456+00:00"
        }))
        .expect("decode");
        let synced = record.last_synced_at.expect("timestamp");
        assert_eq!(synced.year(), 2024);
        assert_eq!(synced.minute(), 30);
    }

    #[test]
    fn detail_row_keeps_unknown_columns() {
        let row: ItemDetailRow = serde_json::from_value(json!({
            "id": "anvil",
            "name": "Anvil",
            "rarity": "rare",
            "weight": 12.5,
            "description": "Heavy."
        }))
        .expect("decode");

        assert_eq!(row.item.name, "Anvil");
        assert_eq!(row.item.rarity.as_deref(), Some("rare"));
        assert_eq!(row.extra.get("weight"), Some(&json!(12.5)));

        let encoded = serde_json::to_value(&row).expect("encode");
        assert_eq!(encoded["description"], json!("Heavy."));
        assert_eq!(encoded["id"], json!("anvil"));
    }
}
