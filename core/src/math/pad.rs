use serde::{Deserialize, Serialize};

/// Edge extension applied before spectral processing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PadMode {
    /// Odd reflection about the edge sample, limited to the signal length
    /// and zero beyond it.
    ReflectLimited,
    Reflect,
    Symmetric,
    Edge,
    Constant,
    Mean,
    Median,
    Wrap,
    LinearRamp,
}

/// Extends `row` by `left` and `right` samples.
pub fn pad_row(row: &[f64], left: usize, right: usize, mode: PadMode) -> Vec<f64> {
    let n = row.len();
    let mut out = Vec::with_capacity(n + left + right);
    if n == 0 {
        out.resize(left + right, 0.0);
        return out;
    }

    for offset in (1..=left).rev() {
        out.push(left_value(row, offset, left, mode));
    }
    out.extend_from_slice(row);
    for offset in 1..=right {
        out.push(right_value(row, offset, right, mode));
    }
    out
}

fn left_value(row: &[f64], offset: usize, width: usize, mode: PadMode) -> f64 {
    let n = row.len();
    let first = row[0];
    match mode {
        PadMode::ReflectLimited => {
            if offset < n {
                2.0 * first - row[offset]
            } else {
                0.0
            }
        }
        PadMode::Reflect => row[reflect_index(-(offset as i64), n)],
        PadMode::Symmetric => row[symmetric_index(-(offset as i64), n)],
        PadMode::Edge => first,
        PadMode::Constant => 0.0,
        PadMode::Mean => mean(row),
        PadMode::Median => median(row),
        PadMode::Wrap => row[wrap_index(-(offset as i64), n)],
        PadMode::LinearRamp => first * (width - offset) as f64 / width as f64,
    }
}

fn right_value(row: &[f64], offset: usize, width: usize, mode: PadMode) -> f64 {
    let n = row.len();
    let last = row[n - 1];
    let position = (n - 1) as i64 + offset as i64;
    match mode {
        PadMode::ReflectLimited => {
            if offset < n {
                2.0 * last - row[n - 1 - offset]
            } else {
                0.0
            }
        }
        PadMode::Reflect => row[reflect_index(position, n)],
        PadMode::Symmetric => row[symmetric_index(position, n)],
        PadMode::Edge => last,
        PadMode::Constant => 0.0,
        PadMode::Mean => mean(row),
        PadMode::Median => median(row),
        PadMode::Wrap => row[wrap_index(position, n)],
        PadMode::LinearRamp => last * (width - offset) as f64 / width as f64,
    }
}

fn reflect_index(position: i64, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let period = 2 * (n as i64 - 1);
    let folded = position.rem_euclid(period);
    if folded < n as i64 {
        folded as usize
    } else {
        (period - folded) as usize
    }
}

fn symmetric_index(position: i64, n: usize) -> usize {
    let period = 2 * n as i64;
    let folded = position.rem_euclid(period);
    if folded < n as i64 {
        folded as usize
    } else {
        (period - 1 - folded) as usize
    }
}

fn wrap_index(position: i64, n: usize) -> usize {
    position.rem_euclid(n as i64) as usize
}

fn mean(row: &[f64]) -> f64 {
    row.iter().sum::<f64>() / row.len() as f64
}

fn median(row: &[f64]) -> f64 {
    let mut sorted = row.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}
