//! Output formatting

use clap::ValueEnum;
use serde::Serialize;
use serde_json::Value;
use tabled::{Table, Tabled};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Yaml,
}

#[derive(Tabled)]
struct Row {
    key: String,
    value: String,
}

impl OutputFormat {
    pub fn print<T: Serialize>(&self, data: &T) {
        println!("{}", self.render(data));
    }

    pub fn render<T: Serialize>(&self, data: &T) -> String {
        match self {
            OutputFormat::Json => serde_json::to_string_pretty(data).unwrap_or_default(),
            OutputFormat::Yaml => serde_yaml::to_string(data).unwrap_or_default(),
            OutputFormat::Table => {
                let value = serde_json::to_value(data).unwrap_or(Value::Null);
                Table::new(rows(&value)).to_string()
            }
        }
    }
}

/// Top-level entries as key/value rows; nested values stay compact JSON
fn rows(value: &Value) -> Vec<Row> {
    let cell = |v: &Value| match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    match value {
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| Row { key: k.clone(), value: cell(v) })
            .collect(),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| Row { key: i.to_string(), value: cell(v) })
            .collect(),
        other => vec![Row { key: String::new(), value: cell(other) }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_table_rows() {
        let rendered = OutputFormat::Table.render(&json!({"err_msg": "服务异常", "count": 2}));
        assert!(rendered.contains("err_msg"));
        assert!(rendered.contains("服务异常"));
    }

    #[test]
    fn test_yaml_and_json() {
        let data = json!({"satisfied": true});
        assert!(OutputFormat::Yaml.render(&data).contains("satisfied: true"));
        assert!(OutputFormat::Json.render(&data).contains("\"satisfied\": true"));
    }
}
