//! Value formatting applied to a renderer's raw value before wrapping.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;

use chrono_tz::Tz;
use serde_json::{Map, Number, Value};

use crate::domain::attributes::AttributeMap;
use crate::util::html::strip_tags;
use crate::util::text::ucwords;
use crate::util::timezone::parse_stored_datetime;

const DEFAULT_DELIMITER: &str = ", ";
const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";
const DEFAULT_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M";
/// Deepest array nesting `php_unserialize` accepts.
pub const MAX_UNSERIALIZE_DEPTH: usize = 64;

/// Handles a `format` kind this module does not know. `None` leaves the
/// value unchanged.
pub type FormatFilter = Arc<dyn Fn(&Value, &AttributeMap) -> Option<String> + Send + Sync>;

#[derive(Clone, Default)]
pub struct FormatFilters {
    filters: BTreeMap<String, FormatFilter>,
}

impl FormatFilters {
    pub fn register(&mut self, kind: &str, filter: FormatFilter) {
        self.filters.insert(kind.trim().to_ascii_lowercase(), filter);
    }

    fn apply(&self, kind: &str, value: &Value, attrs: &AttributeMap) -> Option<String> {
        self.filters.get(kind).and_then(|filter| filter(value, attrs))
    }
}

/// Format `value` according to `attrs["format"]`.
pub fn format_value(value: &Value, attrs: &AttributeMap, filters: &FormatFilters, tz: Tz) -> String {
    let kind = attrs.trimmed("format").to_ascii_lowercase();
    let delimiter = match attrs.get("delimiter") {
        Some(delimiter) => delimiter.as_text(),
        None => DEFAULT_DELIMITER.to_string(),
    };

    match kind.as_str() {
        "" | "raw" => value_to_text(value),
        "date" => format_date(value, attrs, tz, DEFAULT_DATE_FORMAT),
        "datetime" => format_date(value, attrs, tz, DEFAULT_DATETIME_FORMAT),
        "number" => {
            let text = value_to_text(value);
            match text.trim().parse::<f64>() {
                Ok(number) => number_format(number, attrs.int("decimals").clamp(0, 10) as usize),
                Err(_) => text,
            }
        }
        "json" => serde_json::to_string(value).unwrap_or_default(),
        "serialize" => php_serialize(value),
        "unserialize" => join_values(&maybe_unserialize(value), &delimiter),
        "print" => print_r(&maybe_unserialize(value), 0),
        "export" => var_export(&maybe_unserialize(value), 0),
        "implode" | "values" => join_values(&maybe_unserialize(value), &delimiter),
        "keys" => entries(&maybe_unserialize(value))
            .into_iter()
            .map(|(key, _)| key)
            .collect::<Vec<_>>()
            .join(&delimiter),
        "keys-values" | "keys_values" => entries(&maybe_unserialize(value))
            .into_iter()
            .map(|(key, item)| format!("{key}: {}", value_to_text(item)))
            .collect::<Vec<_>>()
            .join(&delimiter),
        "capitalize" => ucwords(&value_to_text(value)),
        "uppercase" | "upper" => value_to_text(value).to_uppercase(),
        "lowercase" | "lower" => value_to_text(value).to_lowercase(),
        "strip-tags" | "strip_tags" => strip_tags(&value_to_text(value)),
        other => filters
            .apply(other, value, attrs)
            .unwrap_or_else(|| value_to_text(value)),
    }
}

/// Scalar text form; lists and maps join their items with `", "`.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => String::new(),
        Value::Number(number) => number.to_string(),
        Value::String(text) => text.clone(),
        Value::Array(_) | Value::Object(_) => join_values(value, DEFAULT_DELIMITER),
    }
}

fn join_values(value: &Value, delimiter: &str) -> String {
    match value {
        Value::Array(_) | Value::Object(_) => entries(value)
            .into_iter()
            .map(|(_, item)| value_to_text(item))
            .collect::<Vec<_>>()
            .join(delimiter),
        scalar => value_to_text(scalar),
    }
}

fn entries(value: &Value) -> Vec<(String, &Value)> {
    match value {
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(index, item)| (index.to_string(), item))
            .collect(),
        Value::Object(map) => map.iter().map(|(key, item)| (key.clone(), item)).collect(),
        _ => Vec::new(),
    }
}

fn format_date(value: &Value, attrs: &AttributeMap, tz: Tz, default_format: &str) -> String {
    let text = value_to_text(value);
    let Some(parsed) = parse_stored_datetime(&text, tz) else {
        return text;
    };

    let custom = attrs.trimmed("date_format");
    let pattern = if custom.is_empty() {
        default_format
    } else {
        custom.as_str()
    };

    let mut rendered = String::new();
    match write!(rendered, "{}", parsed.format(pattern)) {
        Ok(()) => rendered,
        Err(_) => text,
    }
}

/// Fixed decimals with `,` thousands grouping, e.g. `1,234.50`.
pub fn number_format(value: f64, decimals: usize) -> String {
    let fixed = format!("{:.*}", decimals, value.abs());
    let (integer, fraction) = match fixed.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (fixed.as_str(), None),
    };

    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (index, digit) in integer.chars().enumerate() {
        if index > 0 && (integer.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let is_zero = fixed.chars().all(|ch| ch == '0' || ch == '.');
    let mut out = String::new();
    if value.is_sign_negative() && !is_zero {
        out.push('-');
    }
    out.push_str(&grouped);
    if let Some(fraction) = fraction {
        out.push('.');
        out.push_str(fraction);
    }
    out
}

// ----------------------------------------------------------------------------
// Host serialization format (`s:5:"hello";`, `a:1:{i:0;b:1;}`)
// ----------------------------------------------------------------------------

pub fn php_serialize(value: &Value) -> String {
    match value {
        Value::Null => "N;".to_string(),
        Value::Bool(flag) => format!("b:{};", u8::from(*flag)),
        Value::Number(number) => match number.as_i64() {
            Some(integer) => format!("i:{integer};"),
            None => format!("d:{};", number.as_f64().unwrap_or(0.0)),
        },
        Value::String(text) => format!("s:{}:\"{}\";", text.len(), text),
        Value::Array(items) => {
            let body: String = items
                .iter()
                .enumerate()
                .map(|(index, item)| format!("i:{index};{}", php_serialize(item)))
                .collect();
            format!("a:{}:{{{}}}", items.len(), body)
        }
        Value::Object(map) => {
            let body: String = map
                .iter()
                .map(|(key, item)| {
                    format!("{}{}", php_serialize(&Value::String(key.clone())), php_serialize(item))
                })
                .collect();
            format!("a:{}:{{{}}}", map.len(), body)
        }
    }
}

/// Decode a serialized string; anything else (or malformed input) is `None`.
/// Arrays nested deeper than [`MAX_UNSERIALIZE_DEPTH`] are malformed.
pub fn php_unserialize(raw: &str) -> Option<Value> {
    let mut parser = Unserializer {
        input: raw.trim().as_bytes(),
        pos: 0,
        depth: 0,
    };
    let value = parser.value()?;
    (parser.pos == parser.input.len()).then_some(value)
}

fn maybe_unserialize(value: &Value) -> Value {
    match value {
        Value::String(text) => php_unserialize(text).unwrap_or_else(|| value.clone()),
        other => other.clone(),
    }
}

struct Unserializer<'a> {
    input: &'a [u8],
    pos: usize,
    depth: usize,
}

impl Unserializer<'_> {
    fn expect(&mut self, byte: u8) -> Option<()> {
        (self.input.get(self.pos) == Some(&byte)).then(|| self.pos += 1)
    }

    fn until(&mut self, stop: u8) -> Option<&str> {
        let start = self.pos;
        let offset = self.input[start..].iter().position(|&byte| byte == stop)?;
        self.pos = start + offset + 1;
        std::str::from_utf8(&self.input[start..start + offset]).ok()
    }

    fn value(&mut self) -> Option<Value> {
        let tag = *self.input.get(self.pos)?;
        self.pos += 1;
        match tag {
            b'N' => {
                self.expect(b';')?;
                Some(Value::Null)
            }
            b'b' => {
                self.expect(b':')?;
                let flag = self.until(b';')?;
                Some(Value::Bool(flag == "1"))
            }
            b'i' => {
                self.expect(b':')?;
                let integer: i64 = self.until(b';')?.parse().ok()?;
                Some(Value::Number(integer.into()))
            }
            b'd' => {
                self.expect(b':')?;
                let float: f64 = self.until(b';')?.parse().ok()?;
                Number::from_f64(float).map(Value::Number)
            }
            b's' => {
                self.expect(b':')?;
                let len: usize = self.until(b':')?.parse().ok()?;
                self.expect(b'"')?;
                let end = self.pos.checked_add(len)?;
                let text = std::str::from_utf8(self.input.get(self.pos..end)?).ok()?;
                self.pos = end;
                self.expect(b'"')?;
                self.expect(b';')?;
                Some(Value::String(text.to_string()))
            }
            b'a' => {
                if self.depth >= MAX_UNSERIALIZE_DEPTH {
                    return None;
                }
                self.depth += 1;
                self.expect(b':')?;
                let count: usize = self.until(b':')?.parse().ok()?;
                self.expect(b'{')?;
                let mut pairs = Vec::with_capacity(count.min(1024));
                for _ in 0..count {
                    let key = match self.value()? {
                        Value::String(key) => key,
                        Value::Number(index) => index.to_string(),
                        _ => return None,
                    };
                    let item = self.value()?;
                    pairs.push((key, item));
                }
                self.expect(b'}')?;
                self.depth -= 1;

                let sequential = pairs
                    .iter()
                    .enumerate()
                    .all(|(index, (key, _))| *key == index.to_string());
                if sequential {
                    Some(Value::Array(pairs.into_iter().map(|(_, item)| item).collect()))
                } else {
                    Some(Value::Object(pairs.into_iter().collect::<Map<_, _>>()))
                }
            }
            _ => None,
        }
    }
}

// ----------------------------------------------------------------------------
// Debug dumps
// ----------------------------------------------------------------------------

fn print_r(value: &Value, indent: usize) -> String {
    match value {
        Value::Array(_) | Value::Object(_) => {
            let pad = " ".repeat(indent);
            let mut out = format!("Array\n{pad}(\n");
            for (key, item) in entries(value) {
                out.push_str(&format!(
                    "{pad}    [{key}] => {}\n",
                    print_r(item, indent + 8)
                ));
            }
            out.push_str(&format!("{pad})\n"));
            out
        }
        scalar => value_to_text(scalar),
    }
}

fn var_export(value: &Value, indent: usize) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        Value::String(text) => format!("'{}'", text.replace('\\', "\\\\").replace('\'', "\\'")),
        Value::Array(_) | Value::Object(_) => {
            let pad = " ".repeat(indent);
            let mut out = String::from("array (\n");
            for (key, item) in entries(value) {
                let key = match value {
                    Value::Array(_) => key,
                    _ => var_export(&Value::String(key), 0),
                };
                let rendered = match item {
                    Value::Array(_) | Value::Object(_) => {
                        format!("\n{pad}  {}", var_export(item, indent + 2))
                    }
                    scalar => var_export(scalar, 0),
                };
                out.push_str(&format!("{pad}  {key} => {rendered},\n"));
            }
            out.push_str(&format!("{pad})"));
            out
        }
    }
}
