use serde_json::Value;

/// Print just the key answer value from the output.
///
/// A projection prints the rate of return of an exit at the last loan year;
/// other results print the first well-known field present, then fall back
/// to the first field of the result object.
pub fn print_minimal(value: &Value) {
    let result_obj = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    if let Some(irr) = final_exit_irr(result_obj) {
        println!("{}", format_minimal(irr));
        return;
    }

    let priority_keys = ["tax_due", "monthly_payment", "total_interest"];

    if let Value::Object(map) = result_obj {
        for key in &priority_keys {
            if let Some(val) = map.get(*key) {
                if !val.is_null() {
                    println!("{}", format_minimal(val));
                    return;
                }
            }
        }

        if let Some((key, val)) = map.iter().next() {
            println!("{}: {}", key, format_minimal(val));
            return;
        }
    }

    println!("{}", format_minimal(result_obj));
}

fn final_exit_irr(result: &Value) -> Option<&Value> {
    result
        .get("years")?
        .as_array()?
        .last()?
        .get("exit")?
        .get("irr")
}

fn format_minimal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
