//! Output formatting for CLI commands.

use serde::Serialize;
use serde_json::Value;

use crate::cli::args::{FalxArgs, OutputFormat};
use crate::error::Result;

/// Output a result in the format selected on the command line.
pub fn output_result<T: Serialize>(message: &str, result: &T, args: &FalxArgs) -> Result<()> {
    match args.output_format {
        OutputFormat::Human => output_human(message, result, args),
        OutputFormat::Json => output_json(result, args),
    }
}

/// Output in human-readable format, picking a renderer by response shape.
fn output_human<T: Serialize>(message: &str, result: &T, args: &FalxArgs) -> Result<()> {
    if args.verbosity() > 0 {
        println!("{message}");
        println!();
    }

    let value = serde_json::to_value(result)?;
    let shape = value.as_object();

    if shape.is_some_and(|o| o.get("data").and_then(|d| d.get("hits")).is_some()) {
        print_search_response(&value);
    } else if shape.is_some_and(|o| o.contains_key("suggestions")) {
        print_suggest_response(&value);
    } else if shape.is_some_and(|o| o.contains_key("indices")) {
        print_index_list(&value);
    } else {
        print_generic(&value);
    }
    Ok(())
}

fn print_search_response(value: &Value) {
    let Some(data) = value.get("data") else {
        return;
    };

    if let Some(hits) = data.get("hits").and_then(|h| h.as_array()) {
        for (i, hit) in hits.iter().enumerate() {
            let id = hit.get("id").and_then(|v| v.as_str()).unwrap_or("?");
            let score = hit.get("score").and_then(|s| s.as_f64()).unwrap_or(0.0);
            println!("{}. {id}  (score {score:.3})", i + 1);

            if let Some(source) = hit.get("source").and_then(|s| s.as_object()) {
                for (field, field_value) in source {
                    println!("   {field}: {}", format_value(field_value));
                }
            }
            if let Some(highlight) = hit.get("highlight").and_then(|h| h.as_object()) {
                for (field, fragments) in highlight {
                    println!("   {field} ~ {}", format_value(fragments));
                }
            }
            println!();
        }
    }

    let total = data.get("total").and_then(|t| t.as_u64()).unwrap_or(0);
    let took = value.get("took").and_then(|t| t.as_u64()).unwrap_or(0);
    if let Some(pagination) = data.get("pagination") {
        let page = pagination
            .get("currentPage")
            .and_then(|p| p.as_u64())
            .unwrap_or(1);
        let pages = pagination
            .get("totalPages")
            .and_then(|p| p.as_u64())
            .unwrap_or(1);
        println!("Total: {total} hits  (page {page}/{pages}, {took}ms)");
    } else {
        println!("Total: {total} hits  ({took}ms)");
    }

    if let Some(facets) = value.get("facets").and_then(|f| f.as_object()) {
        println!();
        println!("Facets:");
        for (name, facet) in facets {
            println!("{name}:");
            if let Some(buckets) = facet.get("buckets").and_then(|b| b.as_array()) {
                for bucket in buckets {
                    let key = bucket.get("key").and_then(|k| k.as_str()).unwrap_or("?");
                    let count = bucket.get("count").and_then(|c| c.as_u64()).unwrap_or(0);
                    println!("  {key} ({count})");
                }
            }
        }
    }
}

fn print_suggest_response(value: &Value) {
    if let Some(suggestions) = value.get("suggestions").and_then(|s| s.as_array()) {
        if suggestions.is_empty() {
            println!("No suggestions.");
        }
        for suggestion in suggestions {
            let text = suggestion.get("text").and_then(|t| t.as_str()).unwrap_or("?");
            let freq = suggestion.get("freq").and_then(|f| f.as_u64()).unwrap_or(0);
            println!("{text}  ({freq} documents)");
        }
    }
}

fn print_index_list(value: &Value) {
    if let Some(indices) = value.get("indices").and_then(|i| i.as_array()) {
        if indices.is_empty() {
            println!("No indices.");
            return;
        }
        for index in indices {
            let name = index.get("name").and_then(|n| n.as_str()).unwrap_or("?");
            let status = index.get("status").and_then(|s| s.as_str()).unwrap_or("?");
            let documents = index
                .get("documentCount")
                .and_then(|d| d.as_u64())
                .unwrap_or(0);
            println!("{name}  [{status}]  {documents} documents");
        }
    }
}

/// Output generic data as key-value lines.
fn print_generic(value: &Value) {
    match value {
        Value::Object(obj) => {
            for (key, val) in obj {
                println!("{key}: {}", format_value(val));
            }
        }
        _ => println!("{}", format_value(value)),
    }
}

/// Output in JSON format.
fn output_json<T: Serialize>(result: &T, args: &FalxArgs) -> Result<()> {
    let json = if args.pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };

    println!("{json}");
    Ok(())
}

/// Format a JSON value for display.
fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(arr) => {
            let formatted_values = arr.iter().map(format_value).collect::<Vec<_>>().join(", ");
            format!("[{formatted_values}]")
        }
        Value::Object(obj) => {
            let formatted_entries = obj
                .iter()
                .map(|(k, v)| format!("{k}: {}", format_value(v)))
                .collect::<Vec<_>>()
                .join(", ");
            format!("{{{formatted_entries}}}")
        }
        Value::Null => "null".to_string(),
    }
}
