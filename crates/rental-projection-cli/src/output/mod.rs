pub mod csv_out;
pub mod json;
pub mod minimal;
pub mod table;

use crate::OutputFormat;
use serde_json::{Map, Value};

/// Dispatch output to the appropriate formatter.
pub fn format_output(format: &OutputFormat, value: &Value) {
    match format {
        OutputFormat::Json => json::print_json(value),
        OutputFormat::Table => table::print_table(value),
        OutputFormat::Csv => csv_out::print_csv(value),
        OutputFormat::Minimal => minimal::print_minimal(value),
    }
}

/// Per-period rows of a result: projection years (followed by the
/// post-loan-term record, if any) or amortization entries. Nested objects
/// are flattened with an underscore, so `exit.irr` becomes `exit_irr`.
pub fn record_rows(result: &Map<String, Value>) -> Option<Vec<Map<String, Value>>> {
    let mut records: Vec<&Value> = match result.get("years").or_else(|| result.get("entries")) {
        Some(Value::Array(items)) => items.iter().collect(),
        _ => return None,
    };
    if let Some(post) = result.get("post_loan_term").filter(|v| !v.is_null()) {
        records.push(post);
    }

    let rows = records
        .into_iter()
        .filter_map(Value::as_object)
        .map(|record| {
            let mut row = Map::new();
            flatten_into(&mut row, "", record);
            row
        })
        .collect();
    Some(rows)
}

/// Union of the keys of all rows, in first-seen order.
pub fn row_headers(rows: &[Map<String, Value>]) -> Vec<String> {
    let mut headers: Vec<String> = Vec::new();
    for row in rows {
        for key in row.keys() {
            if !headers.contains(key) {
                headers.push(key.clone());
            }
        }
    }
    headers
}

/// Scalar fields of a result, leaving out the per-period collections.
pub fn summary_fields(result: &Map<String, Value>) -> Vec<(&String, &Value)> {
    result
        .iter()
        .filter(|(_, v)| !v.is_array() && !v.is_object())
        .collect()
}

fn flatten_into(row: &mut Map<String, Value>, prefix: &str, record: &Map<String, Value>) {
    for (key, value) in record {
        let name = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}_{key}")
        };
        match value {
            Value::Object(inner) => flatten_into(row, &name, inner),
            _ => {
                row.insert(name, value.clone());
            }
        }
    }
}
