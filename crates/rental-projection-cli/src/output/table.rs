use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

use super::{record_rows, row_headers, summary_fields};

/// Format output as tables using the tabled crate: a field/value summary,
/// then one row per period when the result has them.
pub fn print_table(value: &Value) {
    match value {
        Value::Object(map) => {
            if let Some(Value::Object(result)) = map.get("result") {
                print_result_tables(result, map);
            } else {
                print_fields(map.iter().collect());
            }
        }
        _ => println!("{}", format_value(value)),
    }
}

fn print_result_tables(result: &Map<String, Value>, envelope: &Map<String, Value>) {
    print_fields(summary_fields(result));

    if let Some(rows) = record_rows(result) {
        println!();
        print_rows(&rows);
    }

    if let Some(Value::Array(failures)) = result.get("irr_failures") {
        for failure in failures {
            if let (Some(year), Some(reason)) = (failure.get("year"), failure.get("reason")) {
                println!("IRR undefined in year {}: {}", format_value(year), format_value(reason));
            }
        }
    }

    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings.iter().filter_map(Value::as_str) {
                println!("  - {}", w);
            }
        }
    }

    if let Some(Value::String(meth)) = envelope.get("methodology") {
        println!("\nMethodology: {}", meth);
    }
}

fn print_fields(fields: Vec<(&String, &Value)>) {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (key, val) in fields {
        builder.push_record([key.as_str(), &format_value(val)]);
    }
    println!("{}", Table::from(builder));
}

fn print_rows(rows: &[Map<String, Value>]) {
    if rows.is_empty() {
        println!("(no periods)");
        return;
    }

    let headers = row_headers(rows);
    let mut builder = Builder::default();
    builder.push_record(headers.clone());
    for row in rows {
        let cells: Vec<String> = headers
            .iter()
            .map(|h| row.get(h).map(format_value).unwrap_or_default())
            .collect();
        builder.push_record(cells);
    }
    println!("{}", Table::from(builder));
}

/// Decimal strings are shortened to two places for display.
fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => match s.parse::<rust_decimal::Decimal>() {
            Ok(d) => d.round_dp(2).normalize().to_string(),
            Err(_) => s.clone(),
        },
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "-".to_string(),
        Value::Array(arr) => arr.iter().map(format_value).collect::<Vec<_>>().join(", "),
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decimals_rounded_for_display() {
        assert_eq!(format_value(&json!("4151.2637")), "4151.26");
        assert_eq!(format_value(&json!("100000")), "100000");
        assert_eq!(format_value(&json!("Direct")), "Direct");
        assert_eq!(format_value(&Value::Null), "-");
    }
}
