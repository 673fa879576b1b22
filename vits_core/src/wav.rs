//! WAV encoding for synthesized waveforms.

use std::io::Cursor;

use anyhow::Result;
use base64::Engine;

/// Encode PCM f32 samples as 16-bit mono WAV and return the bytes.
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    // WAV header (44 bytes) + 2 bytes per sample
    let estimated_size = 44 + samples.len() * 2;
    let mut cursor = Cursor::new(Vec::<u8>::with_capacity(estimated_size));

    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| anyhow::anyhow!("wav write err: {e}"))?;

        const I16_MAX_F32: f32 = i16::MAX as f32;
        for &s in samples {
            // f32 [-1.0, 1.0] -> i16
            let v = (s.clamp(-1.0, 1.0) * I16_MAX_F32) as i16;
            writer
                .write_sample(v)
                .map_err(|e| anyhow::anyhow!("wav sample err: {e}"))?;
        }
        // writer drops here, finalizing the header
    }

    Ok(cursor.into_inner())
}

/// Convenience: WAV bytes, base64-encoded for embedding in a JSON response.
pub fn encode_wav_base64(samples: &[f32], sample_rate: u32) -> Result<String> {
    let buf = encode_wav(samples, sample_rate)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(buf))
}
