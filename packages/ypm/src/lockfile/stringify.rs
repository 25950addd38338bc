use std::cmp::Ordering;

use super::{parse::LOCKFILE_VERSION, value::{LockObject, LockValue}};

#[cfg(test)]
#[path = "./stringify.test.rs"]
mod stringify_tests;

const HEADER: &str = "# THIS IS AN AUTOGENERATED FILE. DO NOT EDIT THIS FILE DIRECTLY.";

fn priority(key: &str) -> usize {
    match key {
        "name" => 1,
        "version" => 2,
        "uid" => 3,
        "resolved" => 4,
        "integrity" => 5,
        "registry" => 6,
        "dependencies" => 7,
        _ => 100,
    }
}

fn priority_then_alpha(a: &str, b: &str) -> Ordering {
    priority(a).cmp(&priority(b))
        .then_with(|| a.cmp(b))
}

fn should_wrap_key(key: &str) -> bool {
    key.starts_with("true")
        || key.starts_with("false")
        || key.chars().any(|c| matches!(c, ':' | '\\' | '"' | ',' | '[' | ']') || c.is_whitespace())
        || !key.starts_with(|c: char| c.is_ascii_alphabetic())
}

fn quote(value: &str) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|_| format!("\"{}\"", value))
}

fn maybe_wrap(key: &str) -> String {
    if should_wrap_key(key) {
        quote(key)
    } else {
        key.to_string()
    }
}

fn render_scalar(value: &LockValue) -> String {
    match value {
        LockValue::String(value) => maybe_wrap(value),
        LockValue::Number(value) => value.to_string(),
        LockValue::Boolean(value) => value.to_string(),
        LockValue::Object(_) => String::new(),
    }
}

fn stringify_object(object: &LockObject, indent: &str, top_level: bool) -> String {
    let mut groups: Vec<(Vec<&String>, &LockValue)> = object.groups.iter()
        .map(|(keys, value)| {
            let mut keys: Vec<&String> = keys.iter().collect();
            keys.sort();
            (keys, value)
        })
        .filter(|(keys, _)| !keys.is_empty())
        .collect();

    groups.sort_by(|(a, _), (b, _)| {
        let a_first = a.iter().min_by(|x, y| priority_then_alpha(x, y));
        let b_first = b.iter().min_by(|x, y| priority_then_alpha(x, y));
        priority_then_alpha(a_first.map_or("", |k| k.as_str()), b_first.map_or("", |k| k.as_str()))
    });

    let mut lines = vec![];

    for (keys, value) in groups {
        let key_line = keys.iter()
            .map(|key| maybe_wrap(key))
            .collect::<Vec<_>>()
            .join(", ");

        match value {
            LockValue::Object(nested) => {
                let nested_indent = format!("{}  ", indent);
                let mut block = format!("{}:\n{}", key_line, stringify_object(nested, &nested_indent, false));

                if top_level {
                    block.push('\n');
                }

                lines.push(block);
            },

            scalar => {
                lines.push(format!("{} {}", key_line, render_scalar(scalar)));
            },
        }
    }

    format!("{}{}", indent, lines.join(&format!("\n{}", indent)))
}

/// Serializes a lockfile object. Blocks sharing the same value are written
/// once, their keys joined by commas.
pub fn stringify(object: &LockObject, no_header: bool) -> String {
    let body
        = stringify_object(object, "", true);

    if no_header {
        return body;
    }

    [
        HEADER.to_string(),
        format!("# yarn lockfile v{}", LOCKFILE_VERSION),
        "\n".to_string(),
        body,
    ].join("\n")
}
