//! Dataset cleaning and transformation pipeline
//!
//! Deterministic, stateless operations over a [`Frame`]:
//! deduplication, column normalization, type inference, categorical
//! encoding, min-max scaling, date parsing, derived features, and summary
//! statistics. [`transform_dataset`] chains the whole pipeline.

use chrono::{NaiveDate, NaiveDateTime, SecondsFormat};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::EngineError;
use crate::frame::{cell_f64, cell_text, is_missing, load_csv, Frame};

/// Rows sampled when inferring a column's type
pub const TYPE_SAMPLE_ROWS: usize = 100;

/// Fraction of non-empty samples that must match for a type to win
pub const TYPE_THRESHOLD: f64 = 0.8;

/// Inferred column type, in match-precedence order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Numeric,
    Date,
    Boolean,
    Categorical,
    Unknown,
}

/// Per-column numeric summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumericStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub q1: f64,
    pub q3: f64,
}

/// One categorical value with its frequency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueCount {
    pub value: String,
    pub count: usize,
}

/// Per-column categorical summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoricalStats {
    pub unique_values: usize,
    pub top_values: Vec<ValueCount>,
    pub missing_count: usize,
}

/// Dataset-wide statistics, computed over the original (normalized) columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataStatistics {
    pub total_rows: usize,
    pub total_columns: usize,
    pub missing_values: BTreeMap<String, usize>,
    pub column_types: BTreeMap<String, ColumnType>,
    pub numeric_stats: BTreeMap<String, NumericStats>,
    pub categorical_stats: BTreeMap<String, CategoricalStats>,
}

/// Outcome of the full transformation pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformationResult {
    pub rows_processed: usize,
    pub columns_processed: usize,
    pub duplicates_removed: usize,
    pub categorical_columns: Vec<String>,
    pub numeric_columns: Vec<String>,
    pub date_columns: Vec<String>,
    pub derived_features: Vec<String>,
    pub statistics: DataStatistics,
}

/// Remove duplicate rows, keeping the first occurrence
///
/// A row is a duplicate when its field-by-field serialization in column
/// order matches a previously seen row. Returns the number removed.
pub fn remove_duplicates(frame: &mut Frame) -> usize {
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(frame.rows.len());
    let mut removed = 0usize;

    for row in frame.rows.drain(..) {
        let cells: Vec<&Value> = frame
            .columns
            .iter()
            .map(|c| row.get(c).unwrap_or(&Value::Null))
            .collect();
        let key = serde_json::to_string(&cells).unwrap_or_default();
        if seen.insert(key) {
            unique.push(row);
        } else {
            removed += 1;
        }
    }

    frame.rows = unique;
    tracing::debug!(removed, "Removed duplicate rows");
    removed
}

/// Normalize a single column name: lowercase, trim, whitespace runs to a
/// single underscore, strip anything outside `[a-z0-9_]`
pub fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_whitespace = false;
    for ch in name.trim().to_lowercase().chars() {
        if ch.is_whitespace() {
            if !in_whitespace {
                out.push('_');
                in_whitespace = true;
            }
        } else {
            in_whitespace = false;
            if ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_' {
                out.push(ch);
            }
        }
    }
    out
}

/// Normalize all column names in the frame
///
/// When two names collapse to the same normalized form the first keeps its
/// position and later cells overwrite earlier ones, matching the load-order
/// overwrite semantics of a keyed row.
pub fn normalize_columns(frame: &mut Frame) {
    let mapping: Vec<(String, String)> = frame
        .columns
        .iter()
        .map(|c| (c.clone(), normalize_name(c)))
        .collect();

    let mut new_columns = Vec::with_capacity(frame.columns.len());
    for (_, normalized) in &mapping {
        if !new_columns.contains(normalized) {
            new_columns.push(normalized.clone());
        }
    }

    for row in &mut frame.rows {
        let mut new_row = HashMap::with_capacity(row.len());
        for (original, normalized) in &mapping {
            if let Some(value) = row.remove(original) {
                new_row.insert(normalized.clone(), value);
            }
        }
        *row = new_row;
    }

    frame.columns = new_columns;
}

fn is_numeric_token(s: &str) -> bool {
    !s.is_empty() && s.parse::<f64>().is_ok()
}

fn is_boolean_token(s: &str) -> bool {
    matches!(
        s.to_lowercase().as_str(),
        "true" | "false" | "yes" | "no" | "1" | "0"
    )
}

/// Parse a date in one of the accepted formats
///
/// Accepted: RFC 3339, `%Y-%m-%d`, `%Y/%m/%d`, `%m/%d/%Y`, `%d-%m-%Y`,
/// `%Y-%m-%d %H:%M:%S`, `%m/%d/%Y %H:%M`.
pub fn parse_flexible_date(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }

    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d-%m-%Y"];
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }

    const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%m/%d/%Y %H:%M"];
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }

    None
}

fn infer_column_type(frame: &Frame, column: &str) -> ColumnType {
    let sample = &frame.rows[..frame.rows.len().min(TYPE_SAMPLE_ROWS)];

    let mut numeric = 0usize;
    let mut date = 0usize;
    let mut boolean = 0usize;
    let mut valid = 0usize;

    for row in sample {
        let text = cell_text(row, column);
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        valid += 1;

        if is_numeric_token(text) {
            numeric += 1;
        } else if parse_flexible_date(text).is_some() {
            date += 1;
        } else if is_boolean_token(text) {
            boolean += 1;
        }
    }

    if valid == 0 {
        return ColumnType::Unknown;
    }

    let threshold = (valid as f64 * TYPE_THRESHOLD).ceil() as usize;
    // Precedence is fixed: numeric, then date, then boolean
    if numeric >= threshold {
        ColumnType::Numeric
    } else if date >= threshold {
        ColumnType::Date
    } else if boolean >= threshold {
        ColumnType::Boolean
    } else {
        ColumnType::Categorical
    }
}

/// Infer the type of every column from up to the first 100 rows
pub fn detect_column_types(frame: &Frame) -> BTreeMap<String, ColumnType> {
    if frame.rows.is_empty() {
        return BTreeMap::new();
    }
    frame
        .columns
        .iter()
        .map(|c| (c.clone(), infer_column_type(frame, c)))
        .collect()
}

/// Columns of a given type, in frame column order
pub fn columns_of_type(
    frame: &Frame,
    types: &BTreeMap<String, ColumnType>,
    wanted: ColumnType,
) -> Vec<String> {
    frame
        .columns
        .iter()
        .filter(|c| types.get(*c) == Some(&wanted))
        .cloned()
        .collect()
}

/// Label-encode categorical columns into `<column>_encoded`
///
/// The value->integer map is built in first-appearance order over non-empty
/// values; empty or unseen values encode to -1.
pub fn encode_categorical(frame: &mut Frame, columns: &[String]) {
    for column in columns {
        let mut mapping: HashMap<String, i64> = HashMap::new();
        let mut next = 0i64;
        for row in &frame.rows {
            let value = cell_text(row, column);
            if value.is_empty() {
                continue;
            }
            mapping.entry(value).or_insert_with(|| {
                let idx = next;
                next += 1;
                idx
            });
        }

        let encoded_column = format!("{column}_encoded");
        for row in &mut frame.rows {
            let value = cell_text(row, column);
            let code = if value.is_empty() {
                -1
            } else {
                mapping.get(&value).copied().unwrap_or(-1)
            };
            row.insert(encoded_column.clone(), Value::from(code));
        }
        frame.add_column(&encoded_column);
    }
    tracing::debug!(columns = columns.len(), "Encoded categorical columns");
}

/// Min-max scale numeric columns into `<column>_scaled` in `[0, 1]`
///
/// A constant column uses a range of 1, scaling every value to 0 rather
/// than dividing by zero. Non-numeric cells get no scaled field.
pub fn scale_numeric(frame: &mut Frame, columns: &[String]) {
    for column in columns {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut any = false;
        for row in &frame.rows {
            if let Some(v) = cell_f64(row, column) {
                min = min.min(v);
                max = max.max(v);
                any = true;
            }
        }
        if !any {
            continue;
        }

        let range = if max - min == 0.0 { 1.0 } else { max - min };
        let scaled_column = format!("{column}_scaled");
        for row in &mut frame.rows {
            if let Some(v) = cell_f64(row, column) {
                row.insert(scaled_column.clone(), Value::from((v - min) / range));
            }
        }
        frame.add_column(&scaled_column);
    }
    tracing::debug!(columns = columns.len(), "Scaled numeric columns");
}

/// Parse date columns into `<column>_parsed` (ISO-8601) plus decomposed
/// `<column>_year` / `<column>_month` (1-indexed) / `<column>_day`
///
/// Unparsable values are skipped without error.
pub fn parse_dates(frame: &mut Frame, columns: &[String]) {
    for column in columns {
        let parsed_column = format!("{column}_parsed");
        let year_column = format!("{column}_year");
        let month_column = format!("{column}_month");
        let day_column = format!("{column}_day");
        let mut any = false;

        for row in &mut frame.rows {
            let text = cell_text(row, column);
            let Some(dt) = parse_flexible_date(&text) else {
                continue;
            };
            any = true;

            use chrono::Datelike;
            let iso = dt.and_utc().to_rfc3339_opts(SecondsFormat::Millis, true);
            row.insert(parsed_column.clone(), Value::String(iso));
            row.insert(year_column.clone(), Value::from(dt.year() as i64));
            row.insert(month_column.clone(), Value::from(dt.month() as i64));
            row.insert(day_column.clone(), Value::from(dt.day() as i64));
        }

        if any {
            frame.add_column(&parsed_column);
            frame.add_column(&year_column);
            frame.add_column(&month_column);
            frame.add_column(&day_column);
        }
    }
    tracing::debug!(columns = columns.len(), "Parsed date columns");
}

/// Add per-row `numeric_sum` and `numeric_avg` across all numeric columns
///
/// The average's denominator counts only cells that parse as numbers; rows
/// with none get an average of 0. Returns the derived feature names.
pub fn create_derived_features(frame: &mut Frame, numeric_columns: &[String]) -> Vec<String> {
    if numeric_columns.is_empty() {
        return Vec::new();
    }

    for row in &mut frame.rows {
        let mut sum = 0.0f64;
        let mut count = 0usize;
        for column in numeric_columns {
            if let Some(v) = cell_f64(row, column) {
                sum += v;
                count += 1;
            }
        }
        let avg = if count > 0 { sum / count as f64 } else { 0.0 };
        row.insert("numeric_sum".to_string(), Value::from(sum));
        row.insert("numeric_avg".to_string(), Value::from(avg));
    }

    frame.add_column("numeric_sum");
    frame.add_column("numeric_avg");
    vec!["numeric_sum".to_string(), "numeric_avg".to_string()]
}

fn numeric_stats(frame: &Frame, column: &str) -> NumericStats {
    let mut values: Vec<f64> = frame
        .rows
        .iter()
        .filter_map(|row| cell_f64(row, column))
        .collect();
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    if values.is_empty() {
        return NumericStats {
            min: 0.0,
            max: 0.0,
            mean: 0.0,
            median: 0.0,
            std_dev: 0.0,
            q1: 0.0,
            q3: 0.0,
        };
    }

    let n = values.len();
    let min = values[0];
    let max = values[n - 1];
    let mean = values.iter().sum::<f64>() / n as f64;
    // Floor-indexed median and quartiles: even-length arrays take the
    // lower-middle element
    let median = values[n / 2];
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
    let q1 = values[(n as f64 * 0.25).floor() as usize];
    let q3 = values[(n as f64 * 0.75).floor() as usize];

    NumericStats {
        min,
        max,
        mean,
        median,
        std_dev: variance.sqrt(),
        q1,
        q3,
    }
}

fn categorical_stats(frame: &Frame, column: &str) -> CategoricalStats {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut first_seen: Vec<String> = Vec::new();
    let mut missing = 0usize;

    for row in &frame.rows {
        let value = cell_text(row, column);
        if value.is_empty() {
            missing += 1;
        } else {
            if !counts.contains_key(&value) {
                first_seen.push(value.clone());
            }
            *counts.entry(value).or_insert(0) += 1;
        }
    }

    // Stable sort keeps first-seen order among equal counts
    let mut ordered: Vec<ValueCount> = first_seen
        .into_iter()
        .map(|value| {
            let count = counts[&value];
            ValueCount { value, count }
        })
        .collect();
    ordered.sort_by(|a, b| b.count.cmp(&a.count));
    ordered.truncate(10);

    CategoricalStats {
        unique_values: counts.len(),
        top_values: ordered,
        missing_count: missing,
    }
}

/// Compute dataset statistics over the original (normalized) columns
///
/// Derived columns added by the pipeline are not counted in totals or
/// missing values; numeric and categorical summaries follow the inferred
/// column types.
pub fn calculate_statistics(
    frame: &Frame,
    column_types: &BTreeMap<String, ColumnType>,
) -> DataStatistics {
    let mut statistics = DataStatistics {
        total_rows: frame.row_count(),
        total_columns: column_types.len(),
        missing_values: BTreeMap::new(),
        column_types: column_types.clone(),
        numeric_stats: BTreeMap::new(),
        categorical_stats: BTreeMap::new(),
    };

    if frame.rows.is_empty() {
        return statistics;
    }

    for (column, column_type) in column_types {
        let missing = frame
            .rows
            .iter()
            .filter(|row| is_missing(row, column))
            .count();
        statistics.missing_values.insert(column.clone(), missing);

        match column_type {
            ColumnType::Numeric => {
                statistics
                    .numeric_stats
                    .insert(column.clone(), numeric_stats(frame, column));
            }
            ColumnType::Categorical => {
                statistics
                    .categorical_stats
                    .insert(column.clone(), categorical_stats(frame, column));
            }
            _ => {}
        }
    }

    statistics
}

/// Run the full transformation pipeline over raw CSV bytes
pub fn transform_dataset(bytes: &[u8]) -> Result<TransformationResult, EngineError> {
    let mut frame = load_csv(bytes)?;
    tracing::debug!(rows = frame.row_count(), "Starting transformation");

    let duplicates_removed = remove_duplicates(&mut frame);
    normalize_columns(&mut frame);

    let column_types = detect_column_types(&frame);
    let categorical_columns = columns_of_type(&frame, &column_types, ColumnType::Categorical);
    let numeric_columns = columns_of_type(&frame, &column_types, ColumnType::Numeric);
    let date_columns = columns_of_type(&frame, &column_types, ColumnType::Date);

    encode_categorical(&mut frame, &categorical_columns);
    scale_numeric(&mut frame, &numeric_columns);
    parse_dates(&mut frame, &date_columns);
    let derived_features = create_derived_features(&mut frame, &numeric_columns);

    let statistics = calculate_statistics(&frame, &column_types);

    let result = TransformationResult {
        rows_processed: frame.row_count(),
        columns_processed: column_types.len(),
        duplicates_removed,
        categorical_columns,
        numeric_columns,
        date_columns,
        derived_features,
        statistics,
    };

    tracing::debug!(
        rows = result.rows_processed,
        columns = result.columns_processed,
        duplicates_removed = result.duplicates_removed,
        "Transformation complete"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn frame_from_csv(data: &str) -> Frame {
        load_csv(data.as_bytes()).unwrap()
    }

    #[test]
    fn test_remove_duplicates_counts() {
        let mut frame = frame_from_csv("a\n1\n1\n2\n");
        let removed = remove_duplicates(&mut frame);

        assert_eq!(removed, 1);
        assert_eq!(frame.row_count(), 2);
        assert_eq!(cell_text(&frame.rows[0], "a"), "1");
        assert_eq!(cell_text(&frame.rows[1], "a"), "2");
    }

    #[test]
    fn test_remove_duplicates_keeps_first_occurrence_order() {
        let mut frame = frame_from_csv("a,b\nx,1\ny,2\nx,1\nz,3\ny,2\n");
        let removed = remove_duplicates(&mut frame);

        assert_eq!(removed, 2);
        let names: Vec<String> = frame.rows.iter().map(|r| cell_text(r, "a")).collect();
        assert_eq!(names, vec!["x", "y", "z"]);
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  Product Name "), "product_name");
        assert_eq!(normalize_name("Unit   Price ($)"), "unit_price_");
        assert_eq!(normalize_name("Qty"), "qty");
        assert_eq!(normalize_name("stock-level"), "stocklevel");
    }

    #[test]
    fn test_normalize_columns_renames_cells() {
        let mut frame = frame_from_csv("Product Name,QTY\nWidget,3\n");
        normalize_columns(&mut frame);

        assert_eq!(frame.columns, vec!["product_name", "qty"]);
        assert_eq!(cell_text(&frame.rows[0], "product_name"), "Widget");
        assert_eq!(cell_text(&frame.rows[0], "qty"), "3");
    }

    #[test]
    fn test_detect_column_types_precedence() {
        let frame = frame_from_csv(
            "num,date,flag,cat\n1,2024-01-01,yes,apple\n2,2024-02-01,no,pear\n3.5,2024-03-15,yes,apple\n",
        );
        let types = detect_column_types(&frame);

        assert_eq!(types["num"], ColumnType::Numeric);
        assert_eq!(types["date"], ColumnType::Date);
        assert_eq!(types["flag"], ColumnType::Boolean);
        assert_eq!(types["cat"], ColumnType::Categorical);
    }

    #[test]
    fn test_detect_column_types_unknown_when_all_empty() {
        let frame = frame_from_csv("blank,x\n,1\n,2\n");
        let types = detect_column_types(&frame);

        assert_eq!(types["blank"], ColumnType::Unknown);
        assert_eq!(types["x"], ColumnType::Numeric);
    }

    #[test]
    fn test_detect_column_types_numeric_wins_over_boolean() {
        // 1/0 are both numeric and boolean tokens; numeric has precedence
        let frame = frame_from_csv("bit\n1\n0\n1\n");
        let types = detect_column_types(&frame);
        assert_eq!(types["bit"], ColumnType::Numeric);
    }

    #[test]
    fn test_encode_categorical_first_appearance_order() {
        let mut frame = frame_from_csv("cat\npear\napple\npear\n\n");
        encode_categorical(&mut frame, &["cat".to_string()]);

        assert_eq!(frame.rows[0]["cat_encoded"], Value::from(0));
        assert_eq!(frame.rows[1]["cat_encoded"], Value::from(1));
        assert_eq!(frame.rows[2]["cat_encoded"], Value::from(0));
        assert!(frame.columns.contains(&"cat_encoded".to_string()));
    }

    #[test]
    fn test_encode_categorical_empty_is_minus_one() {
        let mut frame = frame_from_csv("cat\napple\n,\n");
        encode_categorical(&mut frame, &["cat".to_string()]);

        assert_eq!(frame.rows[0]["cat_encoded"], Value::from(0));
        assert_eq!(frame.rows[1]["cat_encoded"], Value::from(-1));
    }

    #[test]
    fn test_scale_numeric_bounds() {
        let mut frame = frame_from_csv("n\n10\n20\n30\n");
        scale_numeric(&mut frame, &["n".to_string()]);

        assert_eq!(frame.rows[0]["n_scaled"], Value::from(0.0));
        assert_eq!(frame.rows[1]["n_scaled"], Value::from(0.5));
        assert_eq!(frame.rows[2]["n_scaled"], Value::from(1.0));
    }

    #[test]
    fn test_scale_numeric_constant_column() {
        let mut frame = frame_from_csv("n\n7\n7\n7\n");
        scale_numeric(&mut frame, &["n".to_string()]);

        for row in &frame.rows {
            assert_eq!(row["n_scaled"], Value::from(0.0));
        }
    }

    #[test]
    fn test_parse_dates_decomposition() {
        let mut frame = frame_from_csv("d\n2024-03-15\nnot-a-date\n");
        parse_dates(&mut frame, &["d".to_string()]);

        assert_eq!(frame.rows[0]["d_year"], Value::from(2024));
        assert_eq!(frame.rows[0]["d_month"], Value::from(3));
        assert_eq!(frame.rows[0]["d_day"], Value::from(15));
        assert_eq!(
            frame.rows[0]["d_parsed"],
            Value::String("2024-03-15T00:00:00.000Z".to_string())
        );
        // Unparsable value skipped without error
        assert!(!frame.rows[1].contains_key("d_parsed"));
    }

    #[test]
    fn test_parse_flexible_date_formats() {
        assert!(parse_flexible_date("2024-01-15").is_some());
        assert!(parse_flexible_date("2024/01/15").is_some());
        assert!(parse_flexible_date("01/15/2024").is_some());
        assert!(parse_flexible_date("15-01-2024").is_some());
        assert!(parse_flexible_date("2024-01-15T10:30:00Z").is_some());
        assert!(parse_flexible_date("2024-01-15 10:30:00").is_some());
        assert!(parse_flexible_date("banana").is_none());
        assert!(parse_flexible_date("").is_none());
    }

    #[test]
    fn test_derived_features() {
        let mut frame = frame_from_csv("a,b\n1,2\n3,\n");
        let features =
            create_derived_features(&mut frame, &["a".to_string(), "b".to_string()]);

        assert_eq!(features, vec!["numeric_sum", "numeric_avg"]);
        assert_eq!(frame.rows[0]["numeric_sum"], Value::from(3.0));
        assert_eq!(frame.rows[0]["numeric_avg"], Value::from(1.5));
        // Empty cell excluded from the average's denominator
        assert_eq!(frame.rows[1]["numeric_sum"], Value::from(3.0));
        assert_eq!(frame.rows[1]["numeric_avg"], Value::from(3.0));
    }

    #[test]
    fn test_numeric_stats_floor_indexing() {
        let frame = frame_from_csv("n\n1\n2\n3\n4\n");
        let stats = numeric_stats(&frame, "n");

        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 4.0);
        assert_eq!(stats.mean, 2.5);
        // Even-length arrays take values[len / 2]
        assert_eq!(stats.median, 3.0);
        assert_eq!(stats.q1, 2.0);
        assert_eq!(stats.q3, 4.0);
        assert!((stats.std_dev - 1.118033988749895).abs() < 1e-12);
    }

    #[test]
    fn test_categorical_stats_tie_order() {
        let frame = frame_from_csv("c\npear\napple\napple\npear\nplum\n\n");
        let stats = categorical_stats(&frame, "c");

        assert_eq!(stats.unique_values, 3);
        assert_eq!(stats.missing_count, 1);
        // pear and apple tie at 2; pear was seen first
        assert_eq!(stats.top_values[0].value, "pear");
        assert_eq!(stats.top_values[1].value, "apple");
        assert_eq!(stats.top_values[2].value, "plum");
    }

    #[test]
    fn test_transform_dataset_end_to_end() {
        let csv = "Product Name,Qty,Unit Price,Category,Added On\n\
                   Widget,10,2.50,Tools,2024-01-01\n\
                   Widget,10,2.50,Tools,2024-01-01\n\
                   Gadget,0,5.00,Tools,2024-02-01\n\
                   Sprocket,25,1.25,Parts,2024-03-01\n";
        let result = transform_dataset(csv.as_bytes()).unwrap();

        assert_eq!(result.duplicates_removed, 1);
        assert_eq!(result.rows_processed, 3);
        assert_eq!(result.columns_processed, 5);
        assert_eq!(result.numeric_columns, vec!["qty", "unit_price"]);
        assert_eq!(result.categorical_columns, vec!["product_name", "category"]);
        assert_eq!(result.date_columns, vec!["added_on"]);
        assert_eq!(result.derived_features, vec!["numeric_sum", "numeric_avg"]);
        assert_eq!(result.statistics.total_rows, 3);
        assert_eq!(result.statistics.total_columns, 5);
    }

    #[test]
    fn test_transform_dataset_deterministic() {
        let csv = "name,qty,price\nA,1,10\nB,2,20\nA,1,10\nC,,30\n";
        let first = transform_dataset(csv.as_bytes()).unwrap();
        let second = transform_dataset(csv.as_bytes()).unwrap();

        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    proptest! {
        #[test]
        fn prop_scaled_values_stay_in_unit_interval(values in proptest::collection::vec(-1e9f64..1e9f64, 1..50)) {
            let mut csv = String::from("n\n");
            for v in &values {
                csv.push_str(&format!("{v}\n"));
            }
            let mut frame = frame_from_csv(&csv);
            scale_numeric(&mut frame, &["n".to_string()]);

            for row in &frame.rows {
                let scaled = row["n_scaled"].as_f64().unwrap();
                prop_assert!((0.0..=1.0).contains(&scaled));
            }
        }
    }
}
