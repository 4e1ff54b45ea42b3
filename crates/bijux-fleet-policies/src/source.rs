// SPDX-License-Identifier: Apache-2.0

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::violation::{PolicyViolation, ViolationKind};

const DOCUMENT_EXTENSIONS: &[&str] = &["json", "yaml", "yml"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Yaml,
}

impl DocumentFormat {
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => Self::Yaml,
            _ => Self::Json,
        }
    }
}

/// Expands source paths into document files. Directories are walked
/// recursively; the result is sorted so loads are order-stable.
pub fn discover_documents(sources: &[PathBuf]) -> Result<Vec<PathBuf>, PolicyViolation> {
    let mut files = Vec::new();
    for source in sources {
        if source.is_file() {
            files.push(source.clone());
        } else if source.is_dir() {
            walk(source, &mut files)?;
        } else {
            return Err(PolicyViolation::new(
                ViolationKind::Schema,
                "source.missing",
                &source.display().to_string(),
                "policy source path does not exist",
            ));
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}

fn walk(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), PolicyViolation> {
    let unreadable = |e: std::io::Error| {
        PolicyViolation::new(
            ViolationKind::Schema,
            "source.unreadable",
            &dir.display().to_string(),
            format!("read policy directory failed: {e}"),
        )
    };
    for entry in fs::read_dir(dir).map_err(unreadable)? {
        let path = entry.map_err(unreadable)?.path();
        if path.is_dir() {
            walk(&path, out)?;
        } else if path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| DOCUMENT_EXTENSIONS.contains(&e))
        {
            out.push(path);
        }
    }
    Ok(())
}

pub fn parse_document(path: &Path) -> Result<Value, PolicyViolation> {
    let display = path.display().to_string();
    let raw = fs::read_to_string(path).map_err(|e| {
        PolicyViolation::new(
            ViolationKind::Schema,
            "source.unreadable",
            &display,
            format!("read policy document failed: {e}"),
        )
    })?;
    parse_document_text(&raw, DocumentFormat::from_path(path), &display)
}

pub fn parse_document_text(
    raw: &str,
    format: DocumentFormat,
    display: &str,
) -> Result<Value, PolicyViolation> {
    let parsed = match format {
        DocumentFormat::Json => serde_json::from_str::<Value>(raw).map_err(|e| e.to_string()),
        DocumentFormat::Yaml => serde_yaml::from_str::<Value>(raw).map_err(|e| e.to_string()),
    };
    parsed.map_err(|e| {
        PolicyViolation::new(
            ViolationKind::Schema,
            "policy.document.parse",
            display,
            format!("invalid {}: {e}", format_label(format)),
        )
    })
}

fn format_label(format: DocumentFormat) -> &'static str {
    match format {
        DocumentFormat::Json => "JSON",
        DocumentFormat::Yaml => "YAML",
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_document_text, DocumentFormat};
    use serde_json::json;

    #[test]
    fn yaml_and_json_parse_to_the_same_value() {
        let yaml = "name: fw-baseline\nsettings:\n  timeout: 300\n  enabled: true\n";
        let json_text = r#"{"name":"fw-baseline","settings":{"timeout":300,"enabled":true}}"#;
        let a = parse_document_text(yaml, DocumentFormat::Yaml, "a.yaml").expect("yaml");
        let b = parse_document_text(json_text, DocumentFormat::Json, "b.json").expect("json");
        assert_eq!(a, b);
        assert_eq!(a["settings"]["timeout"], json!(300));
    }

    #[test]
    fn parse_failures_are_schema_violations() {
        let err = parse_document_text("{", DocumentFormat::Json, "bad.json").expect_err("invalid");
        assert_eq!(err.rule, "policy.document.parse");
        assert!(err.message.starts_with("invalid JSON"));
    }
}
