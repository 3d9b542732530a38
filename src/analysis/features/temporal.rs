// Temporal module - Time-domain feature extraction
//
// References:
// - Peeters, G. (2004). A large set of audio features for sound description
// - Lerch, A. (2012). An Introduction to Audio Content Analysis

/// Compute zero-crossing rate (ZCR)
///
/// Formula: ZCR = crossings / (N - 1)
///
/// High ZCR indicates high-frequency or noise-like content, low ZCR
/// indicates low-frequency or tonal content.
///
/// # Returns
/// Zero-crossing rate (0.0 to 1.0)
pub fn compute_zcr(audio: &[f32]) -> f32 {
    if audio.len() < 2 {
        return 0.0;
    }

    let crossings = audio
        .windows(2)
        .filter(|w| (w[1] >= 0.0 && w[0] < 0.0) || (w[1] < 0.0 && w[0] >= 0.0))
        .count();

    crossings as f32 / (audio.len() - 1) as f32
}

/// Root-mean-square amplitude
pub fn compute_rms(audio: &[f32]) -> f32 {
    if audio.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = audio.iter().map(|&x| (x as f64) * (x as f64)).sum();
    (sum_sq / audio.len() as f64).sqrt() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zcr_alternating() {
        let signal: Vec<f32> = (0..101).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        assert!((compute_zcr(&signal) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_zcr_constant_is_zero() {
        assert_eq!(compute_zcr(&[0.5; 64]), 0.0);
        assert_eq!(compute_zcr(&[0.5]), 0.0);
    }

    #[test]
    fn test_rms_of_square_wave() {
        let signal: Vec<f32> = (0..100).map(|i| if i % 2 == 0 { 0.5 } else { -0.5 }).collect();
        assert!((compute_rms(&signal) - 0.5).abs() < 1e-6);
        assert_eq!(compute_rms(&[]), 0.0);
    }
}
