//! Common utilities for integration tests

use std::sync::Arc;

use axum::Router;

use server::app::{build_router, AppState};
use server::config::ServerConfig;
use vits_core::{Hparams, ModelInfo, VitsManager};

fn test_hparams() -> Hparams {
    serde_json::from_str(
        r#"{
            "data": {
                "text_cleaners": ["zh_ja_mixture_cleaners"],
                "sampling_rate": 22050,
                "add_blank": true,
                "n_speakers": 804
            },
            "symbols": ["_", ",", ".", "!", "?", "-", "~", "…",
                        "A", "E", "I", "N", "O", "Q", "U",
                        "a", "b", "d", "e", "f", "g", "h", "i", "j", "k", "l",
                        "m", "n", "o", "p", "r", "s", "t", "u", "v", "w", "y", "z",
                        " "]
        }"#,
    )
    .unwrap()
}

fn test_models() -> Vec<ModelInfo> {
    serde_json::from_str(
        r#"[
            {
                "sid": 0,
                "name_en": "Mana",
                "name_zh": "真菜",
                "title": "Mana (demo)",
                "example": "你好，世界",
                "language": "Chinese",
                "model": "models/missing_mana.onnx"
            },
            {
                "sid": 1,
                "name_en": "Yuki",
                "name_zh": "雪",
                "title": "Yuki (demo)",
                "example": "こんにちは",
                "language": "Japanese",
                "cover": "covers/yuki.png",
                "model": "models/missing_yuki.onnx"
            }
        ]"#,
    )
    .unwrap()
}

/// Create a test app instance. The checkpoints do not exist on disk, so
/// only paths that never reach ONNX inference return success.
pub fn create_test_app() -> Router {
    create_test_app_with_config(ServerConfig {
        web_dir: "does-not-exist".to_string(),
        text_limit: Some(100),
        ..ServerConfig::default()
    })
}

pub fn create_test_app_with_config(config: ServerConfig) -> Router {
    let vits = Arc::new(VitsManager::new(test_models(), test_hparams()));
    build_router(AppState::new(vits, config))
}
