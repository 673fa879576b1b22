//! Model manifest (`info.json`) loading.

use std::{fs, path::Path};

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// One pretrained voice as listed in `info.json`.
///
/// Descriptors are loaded once at startup and immutable thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Speaker index passed to the multi-speaker checkpoint.
    pub sid: i64,
    pub name_en: String,
    pub name_zh: String,
    pub title: String,
    #[serde(default)]
    pub cover: Option<String>,
    /// Example text pre-filled in the input form.
    pub example: String,
    /// Source language tag of the voice ("Chinese" or "Japanese").
    pub language: String,
    /// Path to the exported ONNX checkpoint.
    pub model: String,
}

/// Load `info.json`.
///
/// Accepts either a JSON array of entries or an object keyed by arbitrary
/// ids; the object form is sorted by `sid` so tab order stays stable.
pub fn load_manifest<P: AsRef<Path>>(p: P) -> anyhow::Result<Vec<ModelInfo>> {
    let text = fs::read_to_string(p.as_ref())
        .with_context(|| format!("Failed to load {}", p.as_ref().display()))?;
    parse_manifest(&text).with_context(|| format!("{} is not a valid manifest", p.as_ref().display()))
}

fn parse_manifest(text: &str) -> anyhow::Result<Vec<ModelInfo>> {
    let json: serde_json::Value =
        serde_json::from_str(text).with_context(|| "info.json is not valid JSON")?;

    match json {
        serde_json::Value::Array(_) => Ok(serde_json::from_value(json)?),
        serde_json::Value::Object(obj) => {
            let mut models: Vec<ModelInfo> = obj
                .into_iter()
                .map(|(key, v)| {
                    serde_json::from_value(v)
                        .with_context(|| format!("invalid manifest entry for key {key}"))
                })
                .collect::<anyhow::Result<_>>()?;
            models.sort_by_key(|m| m.sid);
            Ok(models)
        }
        _ => Err(anyhow::anyhow!("info.json must be a JSON array or object")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENTRY: &str = r#"{
        "sid": 4,
        "name_en": "Ayaka",
        "name_zh": "绫华",
        "title": "Ayaka (Genshin)",
        "example": "こんにちは",
        "language": "Japanese",
        "model": "models/g_ayaka.onnx"
    }"#;

    #[test]
    fn parses_array_form() {
        let models = parse_manifest(&format!("[{ENTRY}]")).unwrap();
        assert_eq!(models.len(), 1);
        assert_eq!(models[0].sid, 4);
        assert_eq!(models[0].name_en, "Ayaka");
        assert!(models[0].cover.is_none());
    }

    #[test]
    fn parses_object_form_sorted_by_sid() {
        let second = ENTRY.replace("\"sid\": 4", "\"sid\": 1");
        let models = parse_manifest(&format!(r#"{{"a": {ENTRY}, "b": {second}}}"#)).unwrap();
        assert_eq!(models.len(), 2);
        assert_eq!(models[0].sid, 1);
        assert_eq!(models[1].sid, 4);
    }

    #[test]
    fn rejects_non_collection() {
        assert!(parse_manifest("42").is_err());
        assert!(parse_manifest("not json").is_err());
    }
}
