use std::sync::LazyLock;

use anyhow::{bail, Result};

pub const DEFAULT_PHRED_OFFSET: u8 = 33;
const MAXIMUM_PHRED_SCORE: u8 = 126;

// Error rate for each phred score: 10^(-score / 10).
static SCORE_TO_ERROR_RATE: LazyLock<[f64; 128]> = LazyLock::new(|| {
    let mut rates = [0.0; 128];
    for (score, rate) in rates.iter_mut().enumerate() {
        *rate = 10f64.powf(-(score as f64) / 10.0);
    }
    rates
});

///////////////////////////////
/// Average per-base error rate over an ASCII-encoded phred score string.
///
/// An empty string has an average error rate of 0.0.
pub fn average_error_rate(scores: &[u8], phred_offset: u8) -> Result<f64> {
    if scores.is_empty() {
        return Ok(0.0);
    }
    let mut total = 0.0;
    for &score in scores {
        if score < phred_offset || score > MAXIMUM_PHRED_SCORE {
            bail!(
                "phred score character '{}' ({}) out of range for offset {}",
                score as char,
                score,
                phred_offset
            );
        }
        total += SCORE_TO_ERROR_RATE[(score - phred_offset) as usize];
    }
    Ok(total / scores.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_table_values() {
        assert_eq!(SCORE_TO_ERROR_RATE[0], 1.0);
        assert!((SCORE_TO_ERROR_RATE[10] - 0.1).abs() < 1e-12);
        assert!((SCORE_TO_ERROR_RATE[20] - 0.01).abs() < 1e-12);
        assert!((SCORE_TO_ERROR_RATE[40] - 0.0001).abs() < 1e-12);
    }

    #[test]
    fn test_average_error_rate() {
        // '!' is phred 0 (p=1.0), '+' is phred 10 (p=0.1).
        let average = average_error_rate(b"!+", DEFAULT_PHRED_OFFSET).unwrap();
        assert!((average - 0.55).abs() < 1e-12);
        // High quality read passes a strict threshold.
        let average = average_error_rate(b"IIII", DEFAULT_PHRED_OFFSET).unwrap();
        assert!(average < 0.001);
    }

    #[test]
    fn test_empty_scores() {
        assert_eq!(average_error_rate(b"", DEFAULT_PHRED_OFFSET).unwrap(), 0.0);
    }

    #[test]
    fn test_out_of_range_score() {
        assert!(average_error_rate(b"\x1f", DEFAULT_PHRED_OFFSET).is_err());
        assert!(average_error_rate(&[127], DEFAULT_PHRED_OFFSET).is_err());
    }
}
