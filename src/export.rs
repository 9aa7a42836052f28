use crate::error::Result;
use chrono::Utc;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Write `items` to `{output_dir}/{prefix}_{timestamp}.json`, creating the
/// directory as needed. Returns the path written.
pub fn persist_to_json<T: Serialize>(items: &[T], prefix: &str, output_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(output_dir)?;

    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    let filename = format!("{}_{timestamp}.json", file_stem(prefix));
    let filepath = output_dir.join(filename);

    let json_content = serde_json::to_string_pretty(items)?;
    fs::write(&filepath, json_content)?;

    Ok(filepath)
}

/// Keep file names portable: anything but ASCII alphanumerics becomes `_`.
fn file_stem(prefix: &str) -> String {
    let stem: String = prefix
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    if stem.is_empty() {
        "outreach".to_string()
    } else {
        stem
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn writes_pretty_json_under_sanitized_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = persist_to_json(&[json!({ "a": 1 })], "Crohn Disease/emails", dir.path()).unwrap();

        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("crohn_disease_emails_"));
        assert!(name.ends_with(".json"));

        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, json!([{ "a": 1 }]));
    }
}
