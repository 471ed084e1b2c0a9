use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

/// Scenario columns, in display order.
const SCENARIO_COLUMNS: [&str; 3] = ["conservative", "base", "optimistic"];

/// Format output as tables using the tabled crate.
pub fn print_table(value: &Value) {
    match value {
        Value::Object(map) => {
            if let Some(result) = map.get("result") {
                print_result_tables(result);
                print_envelope_notes(map);
            } else if let Some(Value::Array(results)) = map.get("results") {
                print_array_table(results);
            } else if let Some(scenarios @ Value::Object(_)) = map.get("scenarios") {
                print_scenario_table(scenarios);
            } else {
                print_object_table(None, map);
            }
        }
        Value::Array(arr) => print_array_table(arr),
        _ => println!("{value}"),
    }
}

/// Scalars first as one Field/Value table, then one table per nested object.
fn print_result_tables(result: &Value) {
    let Value::Object(res_map) = result else {
        println!("{result}");
        return;
    };

    let scalars: Map<String, Value> = res_map
        .iter()
        .filter(|(_, v)| !v.is_object())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    print_object_table(None, &scalars);

    for (key, val) in res_map {
        match (key.as_str(), val) {
            ("scenarios", scenarios) => {
                println!("\nScenarios:");
                print_scenario_table(scenarios);
            }
            (_, Value::Object(nested)) => {
                println!();
                print_object_table(Some(key), nested);
            }
            _ => {}
        }
    }
}

fn print_envelope_notes(envelope: &Map<String, Value>) {
    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings {
                if let Value::String(s) = w {
                    println!("  - {s}");
                }
            }
        }
    }

    if let Some(Value::String(meth)) = envelope.get("methodology") {
        println!("\nMethodology: {meth}");
    }
}

fn print_object_table(title: Option<&str>, map: &Map<String, Value>) {
    if let Some(t) = title {
        println!("{t}:");
    }
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (key, val) in map {
        builder.push_record([key.as_str(), &format_value(val)]);
    }
    println!("{}", Table::from(builder));
}

/// One row per metric, one column per scenario.
fn print_scenario_table(scenarios: &Value) {
    let Value::Object(by_name) = scenarios else {
        println!("{scenarios}");
        return;
    };

    let metrics: Vec<String> = by_name
        .get("base")
        .and_then(Value::as_object)
        .map(|m| m.keys().filter(|k| *k != "name").cloned().collect())
        .unwrap_or_default();

    let mut builder = Builder::default();
    let mut header = vec!["Metric".to_string()];
    header.extend(SCENARIO_COLUMNS.iter().map(|s| s.to_string()));
    builder.push_record(header);

    for metric in &metrics {
        let mut row = vec![metric.clone()];
        for column in SCENARIO_COLUMNS {
            row.push(
                by_name
                    .get(column)
                    .and_then(|s| s.get(metric))
                    .map(format_value)
                    .unwrap_or_default(),
            );
        }
        builder.push_record(row);
    }

    println!("{}", Table::from(builder));
}

fn print_array_table(arr: &[Value]) {
    if arr.is_empty() {
        println!("(empty)");
        return;
    }

    if let Some(Value::Object(first)) = arr.first() {
        let headers: Vec<String> = first.keys().cloned().collect();
        let mut builder = Builder::default();
        builder.push_record(&headers);

        for item in arr {
            if let Value::Object(map) = item {
                let row: Vec<String> = headers
                    .iter()
                    .map(|h| map.get(h.as_str()).map(format_value).unwrap_or_default())
                    .collect();
                builder.push_record(row);
            }
        }

        println!("{}", Table::from(builder));
    } else {
        for item in arr {
            println!("{}", format_value(item));
        }
    }
}

/// Render a cell. Long decimal strings are shown to two places.
fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => shorten_decimal(s),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "-".to_string(),
        Value::Array(arr) => arr.iter().map(format_value).collect::<Vec<_>>().join(", "),
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}

fn shorten_decimal(s: &str) -> String {
    match s.parse::<rust_decimal::Decimal>() {
        Ok(d) if d.scale() > 2 => d.round_dp(2).to_string(),
        _ => s.to_string(),
    }
}
