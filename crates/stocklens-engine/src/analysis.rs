//! Inventory analysis engine
//!
//! Derives domain-specific EDA metrics from the raw records plus the
//! transformation result: stock health, category/supplier breakdowns,
//! inventory valuation, low-stock alerts, and top products by value.
//!
//! Column discovery is heuristic: header names are matched case-insensitively
//! by substring against ranked token lists, and a missing column degrades
//! only the metric that needs it, never the whole analysis.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::error::EngineError;
use crate::frame::{cell_text, Frame};
use crate::transform::TransformationResult;

/// Alerts are capped at the first 20 qualifying rows in source order
pub const MAX_ALERTS: usize = 20;

/// Top-products listing is capped at 10 entries
pub const MAX_TOP_PRODUCTS: usize = 10;

const QUANTITY_TOKENS: &[&str] = &["qty", "quantity", "stock", "stock_qty", "on_hand", "quantity_on_hand"];
const PRICE_TOKENS: &[&str] = &["price", "unit_price", "cost", "value", "amount", "unit_cost"];
const REORDER_TOKENS: &[&str] = &["reorder", "reorder_level", "min_stock", "minimum", "min_qty"];
const CATEGORY_TOKENS: &[&str] = &["category", "type", "class", "product_type", "product_category"];
const SUPPLIER_TOKENS: &[&str] = &["supplier", "vendor", "manufacturer", "source", "supplier_name"];
const PRODUCT_TOKENS: &[&str] = &["product", "product_name", "name", "item", "item_name", "product_id"];

/// Find the first column whose lowercased name contains one of the
/// candidate tokens, scanning candidates in ranked order
pub fn find_column<'a>(columns: &'a [String], candidates: &[&str]) -> Option<&'a str> {
    for candidate in candidates {
        if let Some(found) = columns
            .iter()
            .find(|c| c.to_lowercase().contains(candidate))
        {
            return Some(found.as_str());
        }
    }
    None
}

/// Numeric reading of a cell with the loose semantics the metrics use:
/// a missing column or empty cell reads as 0, an unparseable non-empty
/// cell reads as NaN (callers skip or zero it explicitly)
fn field_number(row: &crate::frame::Row, column: Option<&str>) -> f64 {
    let Some(column) = column else { return 0.0 };
    let text = cell_text(row, column);
    let text = text.trim();
    if text.is_empty() {
        return 0.0;
    }
    text.parse::<f64>().unwrap_or(f64::NAN)
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct StockCounts {
    healthy: u64,
    low_stock: u64,
    out_of_stock: u64,
}

/// Partition rows into healthy / low-stock / out-of-stock counts
///
/// Rows with a non-numeric quantity are excluded from all three counters.
fn analyze_stock_status(
    frame: &Frame,
    quantity_col: Option<&str>,
    reorder_col: Option<&str>,
) -> StockCounts {
    let mut counts = StockCounts::default();
    let Some(quantity_col) = quantity_col else {
        tracing::warn!("No quantity column found, cannot analyze stock status");
        return counts;
    };

    for row in &frame.rows {
        let qty = field_number(row, Some(quantity_col));
        if qty.is_nan() {
            continue;
        }

        if qty == 0.0 {
            counts.out_of_stock += 1;
        } else if let Some(reorder_col) = reorder_col {
            let reorder = field_number(row, Some(reorder_col));
            if !reorder.is_nan() && reorder > 0.0 && qty < reorder {
                counts.low_stock += 1;
            } else {
                counts.healthy += 1;
            }
        } else {
            counts.healthy += 1;
        }
    }

    counts
}

/// Frequency count keyed by trimmed raw value; a missing column collapses
/// everything into the default bucket
fn analyze_distribution(
    frame: &Frame,
    column: Option<&str>,
    default_bucket: &str,
) -> BTreeMap<String, u64> {
    let mut distribution = BTreeMap::new();

    let Some(column) = column else {
        distribution.insert(default_bucket.to_string(), frame.rows.len() as u64);
        return distribution;
    };

    for row in &frame.rows {
        let raw = cell_text(row, column);
        let value = raw.trim();
        let key = if value.is_empty() {
            default_bucket
        } else {
            value
        };
        *distribution.entry(key.to_string()).or_insert(0) += 1;
    }

    distribution
}

/// Total inventory value: sum of quantity x price over rows where both are
/// positive, rounded to the nearest integer
fn calculate_inventory_value(
    frame: &Frame,
    quantity_col: Option<&str>,
    price_col: Option<&str>,
) -> i64 {
    let (Some(quantity_col), Some(price_col)) = (quantity_col, price_col) else {
        tracing::warn!("Cannot calculate inventory value without quantity and price columns");
        return 0;
    };

    let mut total = 0.0f64;
    for row in &frame.rows {
        let qty = field_number(row, Some(quantity_col));
        let price = field_number(row, Some(price_col));
        if !qty.is_nan() && !price.is_nan() && qty > 0.0 && price > 0.0 {
            total += qty * price;
        }
    }

    total.round() as i64
}

#[derive(Debug, Clone, Serialize)]
struct LowStockAlert {
    product_id: String,
    name: String,
    current_qty: i64,
    reorder_level: i64,
    status: &'static str,
    unit_price: f64,
    total_value: i64,
}

fn product_name(row: &crate::frame::Row, product_col: Option<&str>, index: usize) -> String {
    let name = product_col
        .map(|c| cell_text(row, c).trim().to_string())
        .unwrap_or_default();
    if name.is_empty() {
        format!("Product {}", index + 1)
    } else {
        name
    }
}

fn round_cents(price: f64) -> f64 {
    (price * 100.0).round() / 100.0
}

/// One alert per out-of-stock or low-stock row, in source order, capped
fn generate_low_stock_alerts(
    frame: &Frame,
    quantity_col: Option<&str>,
    reorder_col: Option<&str>,
    price_col: Option<&str>,
    product_col: Option<&str>,
) -> Vec<LowStockAlert> {
    let mut alerts = Vec::new();
    let Some(quantity_col) = quantity_col else {
        return alerts;
    };

    for (index, row) in frame.rows.iter().enumerate() {
        if alerts.len() >= MAX_ALERTS {
            break;
        }

        let qty = field_number(row, Some(quantity_col));
        if qty.is_nan() {
            continue;
        }
        let reorder = field_number(row, reorder_col);
        let reorder = if reorder.is_nan() { 0.0 } else { reorder };
        let price = field_number(row, price_col);

        if qty == 0.0 || (reorder > 0.0 && qty < reorder) {
            alerts.push(LowStockAlert {
                // 1-based row index, 5-digit zero-padded
                product_id: format!("PROD-{:05}", index + 1),
                name: product_name(row, product_col, index),
                current_qty: qty.round() as i64,
                reorder_level: reorder.round() as i64,
                status: if qty == 0.0 { "OUT_OF_STOCK" } else { "LOW_STOCK" },
                unit_price: if price.is_nan() { 0.0 } else { round_cents(price) },
                total_value: if price.is_nan() {
                    0
                } else {
                    (qty * price).round() as i64
                },
            });
        }
    }

    tracing::debug!(alerts = alerts.len(), "Generated low stock alerts");
    alerts
}

#[derive(Debug, Clone, Serialize)]
struct TopProduct {
    name: String,
    quantity: i64,
    unit_price: f64,
    total_value: i64,
}

/// Rows with positive quantity and price, sorted by total value descending,
/// capped at the top 10
fn generate_top_products(
    frame: &Frame,
    quantity_col: Option<&str>,
    price_col: Option<&str>,
    product_col: Option<&str>,
) -> Vec<TopProduct> {
    let (Some(quantity_col), Some(price_col)) = (quantity_col, price_col) else {
        return Vec::new();
    };

    let mut products = Vec::new();
    for (index, row) in frame.rows.iter().enumerate() {
        let qty = field_number(row, Some(quantity_col));
        let price = field_number(row, Some(price_col));
        if qty.is_nan() || price.is_nan() || qty <= 0.0 || price <= 0.0 {
            continue;
        }
        products.push(TopProduct {
            name: product_name(row, product_col, index),
            quantity: qty.round() as i64,
            unit_price: round_cents(price),
            total_value: (qty * price).round() as i64,
        });
    }

    // Stable sort keeps source order among equal values
    products.sort_by(|a, b| b.total_value.cmp(&a.total_value));
    products.truncate(MAX_TOP_PRODUCTS);
    products
}

/// Run the full inventory analysis over the raw frame and the
/// transformation result, producing the stable external JSON payload
pub fn analyze_inventory(
    frame: &Frame,
    transform: &TransformationResult,
) -> Result<Value, EngineError> {
    if frame.rows.is_empty() {
        return Err(EngineError::EmptyDataset);
    }

    let quantity_col = find_column(&frame.columns, QUANTITY_TOKENS);
    let price_col = find_column(&frame.columns, PRICE_TOKENS);
    let reorder_col = find_column(&frame.columns, REORDER_TOKENS);
    let category_col = find_column(&frame.columns, CATEGORY_TOKENS);
    let supplier_col = find_column(&frame.columns, SUPPLIER_TOKENS);
    let product_col = find_column(&frame.columns, PRODUCT_TOKENS);

    tracing::debug!(
        quantity = ?quantity_col,
        price = ?price_col,
        reorder = ?reorder_col,
        category = ?category_col,
        supplier = ?supplier_col,
        product = ?product_col,
        "Detected inventory columns"
    );

    let stock = analyze_stock_status(frame, quantity_col, reorder_col);
    let category_distribution = analyze_distribution(frame, category_col, "Uncategorized");
    let supplier_distribution = analyze_distribution(frame, supplier_col, "Unknown Supplier");
    let inventory_value = calculate_inventory_value(frame, quantity_col, price_col);
    let alerts =
        generate_low_stock_alerts(frame, quantity_col, reorder_col, price_col, product_col);
    let top_products = generate_top_products(frame, quantity_col, price_col, product_col);

    let stats = &transform.statistics;
    let missing_values_total: usize = stats.missing_values.values().sum();

    let total_cells = stats.total_rows * stats.total_columns;
    let completeness = if total_cells == 0 {
        100.0
    } else {
        (total_cells - missing_values_total.min(total_cells)) as f64 / total_cells as f64 * 100.0
    };

    Ok(json!({
        "summary": {
            "total_products": frame.rows.len(),
            "total_inventory_value": inventory_value,
            "low_stock_count": stock.low_stock,
            "out_of_stock_count": stock.out_of_stock,
            "total_rows": stats.total_rows,
            "total_columns": stats.total_columns,
            "numeric_columns": transform.numeric_columns.len(),
            "categorical_columns": transform.categorical_columns.len(),
            "date_columns": transform.date_columns.len(),
            "duplicates_removed": transform.duplicates_removed,
            "missing_values_total": missing_values_total,
        },
        "stock_status": {
            "healthy": stock.healthy,
            "low_stock": stock.low_stock,
            "out_of_stock": stock.out_of_stock,
        },
        "category_distribution": category_distribution,
        "supplier_distribution": supplier_distribution,
        "top_products_by_value": top_products,
        "low_stock_alerts": alerts,
        "column_types": stats.column_types,
        "missing_values": stats.missing_values,
        "numeric_statistics": stats.numeric_stats,
        "categorical_statistics": stats.categorical_stats,
        "derived_features": transform.derived_features,
        "data_quality": {
            "completeness": completeness,
            "duplicates_removed": transform.duplicates_removed,
            "rows_processed": transform.rows_processed,
        },
        "last_updated": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::load_csv;
    use crate::transform::transform_dataset;

    fn analyze(csv: &str) -> Value {
        let frame = load_csv(csv.as_bytes()).unwrap();
        let transform = transform_dataset(csv.as_bytes()).unwrap();
        analyze_inventory(&frame, &transform).unwrap()
    }

    #[test]
    fn test_find_column_ranked_substring_match() {
        let columns = vec![
            "Product Name".to_string(),
            "Stock Qty".to_string(),
            "Unit Price".to_string(),
        ];

        assert_eq!(find_column(&columns, QUANTITY_TOKENS), Some("Stock Qty"));
        assert_eq!(find_column(&columns, PRICE_TOKENS), Some("Unit Price"));
        assert_eq!(find_column(&columns, REORDER_TOKENS), None);
    }

    #[test]
    fn test_inventory_value_scenario() {
        let results = analyze("qty,price\n100,10\n50,20\n25,40\n");
        assert_eq!(results["summary"]["total_inventory_value"], 3000);
    }

    #[test]
    fn test_stock_status_partition() {
        let results = analyze("qty,reorder\n10,50\n0,25\n100,50\nbad,10\n");

        assert_eq!(results["stock_status"]["low_stock"], 1);
        assert_eq!(results["stock_status"]["out_of_stock"], 1);
        assert_eq!(results["stock_status"]["healthy"], 1);
    }

    #[test]
    fn test_low_stock_alerts_scenario() {
        let results = analyze("qty,reorder\n10,50\n0,25\n100,50\n");
        let alerts = results["low_stock_alerts"].as_array().unwrap();

        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0]["status"], "LOW_STOCK");
        assert_eq!(alerts[0]["product_id"], "PROD-00001");
        assert_eq!(alerts[0]["current_qty"], 10);
        assert_eq!(alerts[1]["status"], "OUT_OF_STOCK");
        assert_eq!(alerts[1]["product_id"], "PROD-00002");
    }

    #[test]
    fn test_alert_name_fallback() {
        let results = analyze("qty\n0\n");
        let alerts = results["low_stock_alerts"].as_array().unwrap();
        assert_eq!(alerts[0]["name"], "Product 1");
    }

    #[test]
    fn test_top_products_sorted_and_capped_fields() {
        let results =
            analyze("item,qty,price\nA,1,5.125\nB,10,20\nC,2,3\n");
        let top = results["top_products_by_value"].as_array().unwrap();

        assert_eq!(top.len(), 3);
        assert_eq!(top[0]["name"], "B");
        assert_eq!(top[0]["total_value"], 200);
        assert_eq!(top[1]["name"], "C");
        assert_eq!(top[2]["name"], "A");
        // Unit price rounded to cents
        assert_eq!(top[2]["unit_price"], 5.13);
    }

    #[test]
    fn test_distribution_default_buckets() {
        let results = analyze("qty\n1\n2\n");

        assert_eq!(results["category_distribution"]["Uncategorized"], 2);
        assert_eq!(results["supplier_distribution"]["Unknown Supplier"], 2);
    }

    #[test]
    fn test_distribution_counts_trimmed_values() {
        let results = analyze("qty,category\n1,Tools\n2,Tools\n3,Parts\n4,\n");

        assert_eq!(results["category_distribution"]["Tools"], 2);
        assert_eq!(results["category_distribution"]["Parts"], 1);
        assert_eq!(results["category_distribution"]["Uncategorized"], 1);
    }

    #[test]
    fn test_empty_dataset_is_an_error() {
        let frame = load_csv(b"qty\n").unwrap();
        let transform = transform_dataset(b"qty\n").unwrap();
        let err = analyze_inventory(&frame, &transform).unwrap_err();
        assert!(matches!(err, EngineError::EmptyDataset));
    }

    #[test]
    fn test_case_insensitive_column_lookup_feeds_metrics() {
        // Headers keep their original casing in the raw frame; metrics must
        // still read the values
        let results = analyze("Quantity,Price\n5,2\n");
        assert_eq!(results["summary"]["total_inventory_value"], 10);
    }

    #[test]
    fn test_completeness_ratio() {
        // 2 columns x 4 rows = 8 cells, 1 missing
        let results = analyze("qty,category\n1,Tools\n2,Tools\n3,Parts\n4,\n");
        let completeness = results["data_quality"]["completeness"].as_f64().unwrap();
        assert!((completeness - 87.5).abs() < 1e-9);
    }

    #[test]
    fn test_payload_contract_top_level_fields() {
        let results = analyze("qty,price\n1,2\n");
        for field in [
            "summary",
            "stock_status",
            "category_distribution",
            "supplier_distribution",
            "top_products_by_value",
            "low_stock_alerts",
            "column_types",
            "missing_values",
            "numeric_statistics",
            "categorical_statistics",
            "derived_features",
            "data_quality",
            "last_updated",
        ] {
            assert!(results.get(field).is_some(), "missing field {field}");
        }
    }
}
