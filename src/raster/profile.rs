//! One-dimensional signal helpers for projection-profile analysis.

use image::GrayImage;

/// Vertical projection profile: summed foreground intensity per pixel column.
pub fn vertical_projection(binary: &GrayImage) -> Vec<f64> {
    let (w, h) = (binary.width() as usize, binary.height() as usize);
    let raw = binary.as_raw();
    let mut profile = vec![0.0f64; w];
    for y in 0..h {
        let row = &raw[y * w..(y + 1) * w];
        for (acc, &v) in profile.iter_mut().zip(row) {
            *acc += v as f64;
        }
    }
    profile
}

/// Horizontal projection profile: summed foreground intensity per pixel row.
pub fn horizontal_projection(binary: &GrayImage) -> Vec<f64> {
    let w = binary.width() as usize;
    if w == 0 {
        return vec![0.0; binary.height() as usize];
    }
    binary
        .as_raw()
        .chunks(w)
        .map(|row| row.iter().map(|&v| v as f64).sum())
        .collect()
}

/// Savitzky–Golay smoothing with a quadratic fit over `window` samples.
///
/// Samples beyond either end are replicated from the nearest edge value.
/// `window` must be odd; even windows are widened by one.
pub fn savgol_smooth(signal: &[f64], window: usize) -> Vec<f64> {
    let n = signal.len();
    if n == 0 {
        return Vec::new();
    }
    let half = (window.max(3) | 1) / 2;
    let coeffs = savgol_quadratic_coefficients(half);
    (0..n)
        .map(|i| {
            coeffs
                .iter()
                .enumerate()
                .map(|(k, c)| {
                    let j = i as isize + k as isize - half as isize;
                    let j = j.clamp(0, n as isize - 1) as usize;
                    c * signal[j]
                })
                .sum()
        })
        .collect()
}

/// Smoothing coefficients of a least-squares quadratic (equivalently cubic)
/// fit evaluated at the window centre.
fn savgol_quadratic_coefficients(half: usize) -> Vec<f64> {
    let m = half as f64;
    let norm = (2.0 * m - 1.0) * (2.0 * m + 1.0) * (2.0 * m + 3.0);
    let base = 3.0 * (3.0 * m * m + 3.0 * m - 1.0);
    (-(half as isize)..=half as isize)
        .map(|i| {
            let i = i as f64;
            (base - 15.0 * i * i) / norm
        })
        .collect()
}

/// Indices of local maxima with value at least `min_height`, thinned so no
/// two kept peaks are closer than `distance` samples.
///
/// Flat-topped peaks report their middle sample. When two peaks compete
/// for the same neighbourhood the taller one wins.
pub fn find_peaks(signal: &[f64], min_height: f64, distance: usize) -> Vec<usize> {
    let n = signal.len();
    let mut candidates = Vec::new();
    let mut i = 1;
    while i + 1 < n {
        if signal[i - 1] < signal[i] {
            let mut ahead = i + 1;
            while ahead + 1 < n && signal[ahead] == signal[i] {
                ahead += 1;
            }
            if signal[ahead] < signal[i] {
                let middle = (i + ahead - 1) / 2;
                if signal[middle] >= min_height {
                    candidates.push(middle);
                }
                i = ahead;
                continue;
            }
        }
        i += 1;
    }

    if distance <= 1 || candidates.len() < 2 {
        return candidates;
    }

    let mut by_height = candidates.clone();
    by_height.sort_by(|&a, &b| {
        signal[b]
            .partial_cmp(&signal[a])
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.cmp(&a))
    });
    let mut kept: Vec<usize> = Vec::with_capacity(by_height.len());
    for idx in by_height {
        if kept.iter().all(|&k| k.abs_diff(idx) >= distance) {
            kept.push(idx);
        }
    }
    kept.sort_unstable();
    kept
}
