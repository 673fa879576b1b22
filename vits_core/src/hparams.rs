//! Hyperparameter config (`config.json`) loading.
//!
//! The config carries the symbol table the checkpoints were trained on plus
//! the data-pipeline switches the service needs (`add_blank`, sampling rate,
//! cleaner names). The architecture-size sections are payload for the ONNX
//! exporter and are not parsed here.

use std::{fs, path::Path};

use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hparams {
    pub data: DataConfig,
    pub symbols: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default)]
    pub text_cleaners: Vec<String>,
    pub sampling_rate: u32,
    #[serde(default)]
    pub add_blank: bool,
    #[serde(default)]
    pub n_speakers: Option<i64>,
}

impl Hparams {
    pub fn from_file<P: AsRef<Path>>(p: P) -> anyhow::Result<Self> {
        let text = fs::read_to_string(p.as_ref())
            .with_context(|| format!("Failed to load {}", p.as_ref().display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("{} is not a valid hyperparameter config", p.as_ref().display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_config() {
        let json = r#"{
            "data": {
                "text_cleaners": ["zh_ja_mixture_cleaners"],
                "sampling_rate": 22050,
                "add_blank": true,
                "n_speakers": 804
            },
            "symbols": ["_", ",", ".", "a", "b"]
        }"#;
        let hps: Hparams = serde_json::from_str(json).unwrap();
        assert_eq!(hps.data.sampling_rate, 22050);
        assert!(hps.data.add_blank);
        assert_eq!(hps.symbols.len(), 5);
        assert_eq!(hps.data.text_cleaners, vec!["zh_ja_mixture_cleaners"]);
    }

    #[test]
    fn optional_fields_default() {
        let json = r#"{ "data": { "sampling_rate": 22050 }, "symbols": ["_"] }"#;
        let hps: Hparams = serde_json::from_str(json).unwrap();
        assert!(!hps.data.add_blank);
        assert!(hps.data.text_cleaners.is_empty());
        assert!(hps.data.n_speakers.is_none());
    }
}
