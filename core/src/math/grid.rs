/// Rounds to the nearest integer, ties away from zero.
pub fn round_half_away(value: f64) -> f64 {
    // f64::round already rounds half-way cases away from zero.
    value.round()
}

/// Maps a sample index onto a grid whose rate is scaled by `ratio`.
pub fn rescale_sample(sample: usize, ratio: f64) -> usize {
    round_half_away(sample as f64 * ratio).max(0.0) as usize
}

/// Signed variant for event arrays, which may reference samples before the
/// first retained one.
pub fn rescale_index(sample: i64, ratio: f64) -> i64 {
    round_half_away(sample as f64 * ratio) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ties_round_away_from_zero() {
        assert_eq!(round_half_away(2.5), 3.0);
        assert_eq!(round_half_away(-2.5), -3.0);
        assert_eq!(rescale_index(-5, 0.5), -3);
    }

    #[test]
    fn rescale_follows_rate_ratio() {
        assert_eq!(rescale_sample(100, 250.0 / 1000.0), 25);
        assert_eq!(rescale_sample(3, 0.5), 2);
        assert_eq!(rescale_sample(7, 2.0), 14);
    }
}
