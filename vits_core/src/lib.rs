//! Core synthesis library: manifest, hyperparameters, tokenization, ONNX
//! inference and caching for a multi-voice VITS demo service.

pub mod hparams;
pub mod infer;
pub mod manifest;
pub mod text;
pub mod wav;

use std::{
    hash::{Hash, Hasher},
    path::Path,
    sync::Arc,
    time::Instant,
};

use ahash::AHasher;
use dashmap::DashMap;
use lru::LruCache;
use tokio::sync::RwLock as TokioRwLock;
use tokio::time::Duration;

pub use hparams::Hparams;
pub use infer::{InferenceParams, VitsSession};
pub use manifest::ModelInfo;
pub use text::{Language, PreparedText, SymbolTable};

// Cached checkpoint session
#[derive(Debug)]
struct CachedSession {
    session: Arc<VitsSession>,
    last_accessed: Instant,
}

// Cached synthesis response
#[derive(Clone)]
struct CachedResponse {
    audio_base64: String,
    sample_rate: u32,
    duration_ms: u64,
    cached_at: Instant,
}

/// Owns the model manifest, the symbol table and the checkpoint/response
/// caches. One instance per process, shared behind an `Arc`.
#[derive(Clone)]
pub struct VitsManager {
    models: Arc<Vec<ModelInfo>>,
    hparams: Arc<Hparams>,
    symbols: Arc<SymbolTable>,
    // checkpoint path -> loaded session; DashMap for concurrent access
    cache: Arc<DashMap<String, CachedSession>>,
    max_cache_size: usize,
    // (model, prepared text, knobs) -> encoded response
    response_cache: Arc<TokioRwLock<LruCache<u64, CachedResponse>>>,
    response_cache_ttl: Duration,
}

impl VitsManager {
    pub fn new(models: Vec<ModelInfo>, hparams: Hparams) -> Self {
        let symbols = Arc::new(SymbolTable::new(&hparams.symbols));
        Self {
            models: Arc::new(models),
            hparams: Arc::new(hparams),
            symbols,
            cache: Arc::new(DashMap::new()),
            max_cache_size: 8,
            response_cache: Arc::new(TokioRwLock::new(LruCache::new(
                std::num::NonZeroUsize::new(500).unwrap(),
            ))),
            response_cache_ttl: Duration::from_secs(3600),
        }
    }

    /// Load `info.json` and `config.json` from disk.
    pub fn new_from_files<P: AsRef<Path>, Q: AsRef<Path>>(
        manifest_path: P,
        config_path: Q,
    ) -> anyhow::Result<Self> {
        let models = manifest::load_manifest(manifest_path)?;
        let hparams = Hparams::from_file(config_path)?;
        Ok(Self::new(models, hparams))
    }

    pub fn models(&self) -> &[ModelInfo] {
        &self.models
    }

    pub fn model(&self, index: usize) -> Option<&ModelInfo> {
        self.models.get(index)
    }

    /// Sampling rate of every checkpoint in the manifest (22050 for this
    /// model family).
    pub fn sample_rate(&self) -> u32 {
        self.hparams.data.sampling_rate
    }

    pub fn hparams(&self) -> &Hparams {
        &self.hparams
    }

    /// Get or load the session for a checkpoint path, with LRU eviction.
    fn get_or_create_session(&self, model_path: &str) -> anyhow::Result<Arc<VitsSession>> {
        if let Some(mut cached) = self.cache.get_mut(model_path) {
            cached.last_accessed = Instant::now();
            return Ok(cached.session.clone());
        }

        let session = Arc::new(VitsSession::load(model_path)?);

        if self.cache.len() >= self.max_cache_size {
            let mut oldest_key: Option<String> = None;
            let mut oldest_time = Instant::now();
            for entry in self.cache.iter() {
                if entry.last_accessed < oldest_time {
                    oldest_time = entry.last_accessed;
                    oldest_key = Some(entry.key().clone());
                }
            }
            if let Some(key) = oldest_key {
                self.cache.remove(&key);
            }
        }

        self.cache.insert(
            model_path.to_string(),
            CachedSession { session: session.clone(), last_accessed: Instant::now() },
        );
        Ok(session)
    }

    /// Eagerly load every checkpoint in the manifest. Failures are returned
    /// so the caller can decide whether a missing file is fatal.
    pub fn preload_all(&self) -> anyhow::Result<()> {
        for info in self.models.iter() {
            self.get_or_create_session(&info.model)?;
        }
        Ok(())
    }

    fn cache_key(model_index: usize, prepared_text: &str, params: InferenceParams) -> u64 {
        let mut hasher = AHasher::default();
        model_index.hash(&mut hasher);
        prepared_text.hash(&mut hasher);
        params.noise_scale.to_bits().hash(&mut hasher);
        params.noise_scale_w.to_bits().hash(&mut hasher);
        params.length_scale.to_bits().hash(&mut hasher);
        hasher.finish()
    }

    /// Synchronous synthesis: prepared (tag-wrapped) text -> waveform.
    ///
    /// Blocks on the ONNX call; run under `spawn_blocking` from async code.
    pub fn synthesize(
        &self,
        model_index: usize,
        prepared_text: &str,
        params: InferenceParams,
    ) -> anyhow::Result<(Vec<f32>, u32)> {
        let info = self
            .model(model_index)
            .ok_or_else(|| anyhow::anyhow!("unknown model index {model_index}"))?;

        let mut sequence = self.symbols.text_to_sequence(prepared_text);
        // Checked before interspersing: blanks would turn an unmatched text
        // into a non-empty sequence and synthesize garbage.
        if sequence.is_empty() {
            anyhow::bail!("no character in the text matched the symbol table");
        }
        if self.hparams.data.add_blank {
            sequence = text::intersperse(&sequence, 0);
        }

        let session = self.get_or_create_session(&info.model)?;
        let samples = session.infer(&sequence, info.sid, params)?;
        Ok((samples, self.sample_rate()))
    }

    /// Async synthesis with response caching. Returns
    /// `(audio_base64, sample_rate, duration_ms, cache_hit)`.
    pub async fn synthesize_cached(
        &self,
        model_index: usize,
        prepared_text: &str,
        params: InferenceParams,
    ) -> anyhow::Result<(String, u32, u64, bool)> {
        let cache_key = Self::cache_key(model_index, prepared_text, params);
        {
            let cache = self.response_cache.read().await;
            if let Some(cached) = cache.peek(&cache_key) {
                if Instant::now().duration_since(cached.cached_at) < self.response_cache_ttl {
                    return Ok((
                        cached.audio_base64.clone(),
                        cached.sample_rate,
                        cached.duration_ms,
                        true,
                    ));
                }
            }
        }

        // Cache miss: synthesize and encode in one blocking task. The
        // manager is all-Arc inside, so the clone shares every cache.
        let this = self.clone();
        let prepared = prepared_text.to_string();
        let (audio_base64, sample_rate, duration_ms) = tokio::task::spawn_blocking(move || {
            let (samples, sample_rate) = this.synthesize(model_index, &prepared, params)?;
            let duration_ms = (samples.len() as f32 / sample_rate as f32 * 1000.0) as u64;
            let audio_base64 = wav::encode_wav_base64(&samples, sample_rate)?;
            Ok::<(String, u32, u64), anyhow::Error>((audio_base64, sample_rate, duration_ms))
        })
        .await
        .map_err(|e| anyhow::anyhow!("Task join error: {e}"))??;

        {
            let mut cache = self.response_cache.write().await;
            cache.put(
                cache_key,
                CachedResponse {
                    audio_base64: audio_base64.clone(),
                    sample_rate,
                    duration_ms,
                    cached_at: Instant::now(),
                },
            );
        }

        Ok((audio_base64, sample_rate, duration_ms, false))
    }
}

impl std::fmt::Debug for VitsManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VitsManager")
            .field("models", &self.models.len())
            .field("sample_rate", &self.sample_rate())
            .field("cached_sessions", &self.cache.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_hparams() -> Hparams {
        serde_json::from_str(
            r#"{
                "data": { "sampling_rate": 22050, "add_blank": true },
                "symbols": ["_", ",", ".", "a", "b"]
            }"#,
        )
        .unwrap()
    }

    fn test_model() -> ModelInfo {
        serde_json::from_str(
            r#"{
                "sid": 0,
                "name_en": "Test",
                "name_zh": "测试",
                "title": "Test voice",
                "example": "ab",
                "language": "Chinese",
                "model": "does/not/exist.onnx"
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn sample_rate_comes_from_config() {
        let mgr = VitsManager::new(vec![test_model()], test_hparams());
        assert_eq!(mgr.sample_rate(), 22050);
    }

    #[test]
    fn unknown_model_index_errors() {
        let mgr = VitsManager::new(vec![test_model()], test_hparams());
        let err = mgr.synthesize(9, "ab", InferenceParams::default()).unwrap_err();
        assert!(err.to_string().contains("unknown model index"));
    }

    #[test]
    fn missing_checkpoint_errors() {
        let mgr = VitsManager::new(vec![test_model()], test_hparams());
        assert!(mgr.synthesize(0, "ab", InferenceParams::default()).is_err());
    }

    #[test]
    fn cache_key_is_sensitive_to_knobs() {
        let base = InferenceParams::default();
        let k1 = VitsManager::cache_key(0, "ab", base);
        let k2 = VitsManager::cache_key(0, "ab", InferenceParams { noise_scale: 0.7, ..base });
        let k3 = VitsManager::cache_key(1, "ab", base);
        assert_ne!(k1, k2);
        assert_ne!(k1, k3);
        assert_eq!(k1, VitsManager::cache_key(0, "ab", base));
    }

    #[test]
    fn missing_config_files_error() {
        assert!(VitsManager::new_from_files("no/such/info.json", "no/such/config.json").is_err());
    }

    #[test]
    fn unmatched_text_errors_even_with_add_blank() {
        // add_blank is set in test_hparams; without the pre-check the blanks
        // would make the sequence non-empty and inference would proceed.
        let mgr = VitsManager::new(vec![test_model()], test_hparams());
        let err = mgr.synthesize(0, "好好", InferenceParams::default()).unwrap_err();
        assert!(err.to_string().contains("symbol table"));
    }

    #[tokio::test]
    async fn fresh_response_cache_entry_is_served_without_synthesis() {
        let mgr = VitsManager::new(vec![test_model()], test_hparams());
        let params = InferenceParams::default();
        let key = VitsManager::cache_key(0, "ab", params);
        {
            let mut cache = mgr.response_cache.write().await;
            cache.put(
                key,
                CachedResponse {
                    audio_base64: "cached-audio".to_string(),
                    sample_rate: 22050,
                    duration_ms: 123,
                    cached_at: Instant::now(),
                },
            );
        }

        // The checkpoint does not exist, so a hit is the only way this
        // can succeed.
        let (audio, sample_rate, duration_ms, cached) =
            mgr.synthesize_cached(0, "ab", params).await.unwrap();
        assert!(cached);
        assert_eq!(audio, "cached-audio");
        assert_eq!(sample_rate, 22050);
        assert_eq!(duration_ms, 123);
    }

    #[tokio::test]
    async fn expired_response_cache_entry_falls_through() {
        let mut mgr = VitsManager::new(vec![test_model()], test_hparams());
        mgr.response_cache_ttl = Duration::ZERO;
        let params = InferenceParams::default();
        let key = VitsManager::cache_key(0, "ab", params);
        {
            let mut cache = mgr.response_cache.write().await;
            cache.put(
                key,
                CachedResponse {
                    audio_base64: "stale-audio".to_string(),
                    sample_rate: 22050,
                    duration_ms: 123,
                    cached_at: Instant::now(),
                },
            );
        }

        // Expired entry is skipped; synthesis runs and fails on the missing
        // checkpoint instead of serving the stale audio.
        assert!(mgr.synthesize_cached(0, "ab", params).await.is_err());
    }
}
