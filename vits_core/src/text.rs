//! Request text preparation and symbol-table tokenization.
//!
//! The checkpoints were trained on a fixed symbol table shipped in the
//! hyperparameter config; tokenization here is the post-cleaning lookup step
//! of the original `text_to_sequence`. Unknown characters are silently
//! skipped.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

/// Language selector from the UI dropdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Chinese,
    Japanese,
    /// Caller supplies explicit `[ZH]`/`[JA]` tags.
    Mix,
}

impl TryFrom<u8> for Language {
    type Error = u8;

    fn try_from(v: u8) -> Result<Self, u8> {
        match v {
            0 => Ok(Language::Chinese),
            1 => Ok(Language::Japanese),
            2 => Ok(Language::Mix),
            other => Err(other),
        }
    }
}

/// Slider defaults for a language: (noise_scale, noise_scale_w, length_scale).
/// Chinese voices read a little slow at length scale 1.0, hence 1.2.
pub fn slider_defaults(language: Language) -> (f32, f32, f32) {
    match language {
        Language::Chinese => (0.6, 0.668, 1.2),
        _ => (0.6, 0.668, 1.0),
    }
}

/// Bracketed two-letter language tags, excluded from the length count.
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[[A-Z]{2}\]").unwrap());

/// Outcome of preparing request text for synthesis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreparedText {
    Ready(String),
    TooLong { len: usize, limit: usize },
}

/// Strip newlines and spaces, enforce the character limit (tag markers
/// excluded from the count), and wrap in language tags.
pub fn prepare_text(text: &str, language: Language, limit: Option<usize>) -> PreparedText {
    let text: String = text.chars().filter(|c| !matches!(c, '\n' | '\r' | ' ')).collect();

    if let Some(limit) = limit {
        let len = TAG_RE.replace_all(&text, "").chars().count();
        if len > limit {
            return PreparedText::TooLong { len, limit };
        }
    }

    let wrapped = match language {
        Language::Chinese => format!("[ZH]{text}[ZH]"),
        Language::Japanese => format!("[JA]{text}[JA]"),
        Language::Mix => text,
    };
    PreparedText::Ready(wrapped)
}

/// Character -> id mapping built from the config's symbol list.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    ids: HashMap<char, i64>,
}

impl SymbolTable {
    /// Build from the `symbols` list. Only single-character symbols are
    /// addressable by lookup; ordering determines the id.
    pub fn new(symbols: &[String]) -> Self {
        let mut ids = HashMap::with_capacity(symbols.len());
        for (i, sym) in symbols.iter().enumerate() {
            let mut chars = sym.chars();
            if let (Some(c), None) = (chars.next(), chars.next()) {
                ids.entry(c).or_insert(i as i64);
            }
        }
        Self { ids }
    }

    /// Map text to symbol ids, skipping characters not in the table.
    pub fn text_to_sequence(&self, text: &str) -> Vec<i64> {
        text.chars().filter_map(|c| self.ids.get(&c).copied()).collect()
    }
}

/// Interleave `item` between and around all ids: `n` ids become `2n + 1`.
pub fn intersperse(ids: &[i64], item: i64) -> Vec<i64> {
    let mut out = Vec::with_capacity(ids.len() * 2 + 1);
    out.push(item);
    for &id in ids {
        out.push(id);
        out.push(item);
    }
    out
}
