//! ONNX inference for exported VITS checkpoints.
//!
//! Uses [`ort`] (ONNX Runtime Rust bindings). The exported `SynthesizerTrn`
//! graph takes four inputs:
//!
//! | Name            | Shape      | dtype |
//! |-----------------|------------|-------|
//! | `input`         | `[1, n]`   | int64 |
//! | `input_lengths` | `[1]`      | int64 |
//! | `scales`        | `[3]`      | f32   |
//! | `sid`           | `[1]`      | int64 |
//!
//! `scales` is `[noise_scale, length_scale, noise_w]`. Output 0 is the raw
//! waveform at the config's sampling rate.

use std::{path::Path, sync::Mutex};

use anyhow::{Context, Result};
use ort::{session::Session, value::Tensor};

/// Tunable synthesis knobs, one set per request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InferenceParams {
    /// Stochasticity of the prior.
    pub noise_scale: f32,
    /// Stochasticity of the duration predictor.
    pub noise_scale_w: f32,
    /// Phoneme duration multiplier (higher is slower).
    pub length_scale: f32,
}

impl Default for InferenceParams {
    fn default() -> Self {
        Self { noise_scale: 0.6, noise_scale_w: 0.668, length_scale: 1.0 }
    }
}

/// One loaded checkpoint. `run` needs `&mut Session`, so the session sits
/// behind a `Mutex`; the manager serializes synthesis anyway.
pub struct VitsSession {
    session: Mutex<Session>,
}

impl std::fmt::Debug for VitsSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VitsSession").field("session", &"<ort::Session>").finish()
    }
}

impl VitsSession {
    pub fn load<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let session = Session::builder()
            .context("Failed to create ORT session builder")?
            .commit_from_file(model_path.as_ref())
            .with_context(|| format!("Cannot load ONNX checkpoint: {}", model_path.as_ref().display()))?;
        Ok(Self { session: Mutex::new(session) })
    }

    /// Symbol-id sequence -> waveform samples.
    pub fn infer(&self, sequence: &[i64], sid: i64, params: InferenceParams) -> Result<Vec<f32>> {
        if sequence.is_empty() {
            anyhow::bail!("empty symbol sequence (no character matched the symbol table)");
        }
        let seq_len = sequence.len();

        let t_input = Tensor::<i64>::from_array(([1usize, seq_len], sequence.to_vec()))
            .context("Failed to build input tensor")?;
        let t_lengths = Tensor::<i64>::from_array(([1usize], vec![seq_len as i64]))
            .context("Failed to build input_lengths tensor")?;
        let t_scales = Tensor::<f32>::from_array((
            [3usize],
            vec![params.noise_scale, params.length_scale, params.noise_scale_w],
        ))
        .context("Failed to build scales tensor")?;
        let t_sid = Tensor::<i64>::from_array(([1usize], vec![sid]))
            .context("Failed to build sid tensor")?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow::anyhow!("ORT session lock poisoned, restart the server"))?;
        let outputs = session
            .run(ort::inputs![
                "input" => t_input,
                "input_lengths" => t_lengths,
                "scales" => t_scales,
                "sid" => t_sid,
            ])
            .context("ONNX inference failed")?;

        // Output 0 is the waveform (shape [1, 1, T]); flatten it.
        let (_shape, audio) = outputs[0]
            .try_extract_tensor::<f32>()
            .context("Failed to extract waveform tensor")?;
        Ok(audio.to_vec())
    }
}
