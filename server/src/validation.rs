use crate::error::ApiError;

/// Slider bounds from the UI: noise scale and noise weight run 0.1..=1.0,
/// length scale 0.1..=2.0.
const NOISE_RANGE: (f32, f32) = (0.1, 1.0);
const LENGTH_RANGE: (f32, f32) = (0.1, 2.0);

/// Validate a synthesis request before touching any model.
pub fn validate_synthesis_request(
    text: &str,
    language: u8,
    noise_scale: f32,
    noise_scale_w: f32,
    length_scale: f32,
) -> Result<(), ApiError> {
    if text.trim().is_empty() {
        return Err(ApiError::InvalidInput("Text cannot be empty".to_string()));
    }

    if language > 2 {
        return Err(ApiError::InvalidInput(format!(
            "Invalid language selector: {language}. Expected 0 (Chinese), 1 (Japanese) or 2 (Mix)"
        )));
    }

    check_range("noise_scale", noise_scale, NOISE_RANGE)?;
    check_range("noise_scale_w", noise_scale_w, NOISE_RANGE)?;
    check_range("length_scale", length_scale, LENGTH_RANGE)?;

    Ok(())
}

fn check_range(name: &str, value: f32, (min, max): (f32, f32)) -> Result<(), ApiError> {
    if !value.is_finite() || value < min || value > max {
        return Err(ApiError::InvalidInput(format!(
            "{name} must be between {min} and {max}, got {value}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_request_passes() {
        assert!(validate_synthesis_request("你好", 0, 0.6, 0.668, 1.2).is_ok());
        assert!(validate_synthesis_request("text", 2, 0.1, 1.0, 2.0).is_ok());
    }

    #[test]
    fn empty_text_rejected() {
        let result = validate_synthesis_request("", 0, 0.6, 0.668, 1.0);
        assert!(result.is_err());
        if let Err(ApiError::InvalidInput(msg)) = result {
            assert!(msg.contains("empty"));
        }

        assert!(validate_synthesis_request("   ", 0, 0.6, 0.668, 1.0).is_err());
    }

    #[test]
    fn language_selector_out_of_range() {
        assert!(validate_synthesis_request("text", 3, 0.6, 0.668, 1.0).is_err());
        assert!(validate_synthesis_request("text", 255, 0.6, 0.668, 1.0).is_err());
    }

    #[test]
    fn knob_bounds_enforced() {
        assert!(validate_synthesis_request("text", 0, 0.0, 0.668, 1.0).is_err());
        assert!(validate_synthesis_request("text", 0, 1.1, 0.668, 1.0).is_err());
        assert!(validate_synthesis_request("text", 0, 0.6, 0.0, 1.0).is_err());
        assert!(validate_synthesis_request("text", 0, 0.6, 0.668, 2.5).is_err());
        assert!(validate_synthesis_request("text", 0, f32::NAN, 0.668, 1.0).is_err());
    }
}
