/// 2D Median Filtering
///
/// Sliding-window median along one axis of a spectrogram, used to separate
/// harmonic (horizontally smooth) from percussive (vertically smooth)
/// structure before Wiener soft-masking.

use ndarray::Array2;

fn window_median(window: &mut Vec<f64>) -> f64 {
    window.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let n = window.len();
    if n % 2 == 1 {
        window[n / 2]
    } else {
        (window[n / 2 - 1] + window[n / 2]) * 0.5
    }
}

/// Median filter along the frequency (row) axis, kernel centered on each bin.
pub fn median_filter_vertical(data: &Array2<f64>, kernel_size: usize) -> Array2<f64> {
    let (rows, cols) = data.dim();
    let mut out = Array2::zeros((rows, cols));
    let half = kernel_size / 2;

    for c in 0..cols {
        for r in 0..rows {
            let start = r.saturating_sub(half);
            let end = (r + half + 1).min(rows);
            let mut window: Vec<f64> = (start..end).map(|i| data[[i, c]]).collect();
            out[[r, c]] = window_median(&mut window);
        }
    }
    out
}

/// Median filter along the time (column) axis, kernel centered on each frame.
pub fn median_filter_horizontal(data: &Array2<f64>, kernel_size: usize) -> Array2<f64> {
    let (rows, cols) = data.dim();
    let mut out = Array2::zeros((rows, cols));
    let half = kernel_size / 2;

    for r in 0..rows {
        for c in 0..cols {
            let start = c.saturating_sub(half);
            let end = (c + half + 1).min(cols);
            let mut window: Vec<f64> = (start..end).map(|i| data[[r, i]]).collect();
            out[[r, c]] = window_median(&mut window);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_filter_vertical() {
        let data = Array2::from_elem((10, 5), 1.0);
        let filtered = median_filter_vertical(&data, 3);
        assert_eq!(filtered.dim(), (10, 5));
        assert!(filtered.iter().all(|&v| (v - 1.0).abs() < 1e-12));
    }

    #[test]
    fn test_median_filter_horizontal() {
        let data = Array2::from_elem((10, 5), 1.0);
        let filtered = median_filter_horizontal(&data, 3);
        assert_eq!(filtered.dim(), (10, 5));
        assert!(filtered.iter().all(|&v| (v - 1.0).abs() < 1e-12));
    }

    #[test]
    fn spike_is_suppressed_by_vertical_median() {
        let mut data = Array2::from_elem((9, 1), 0.0);
        data[[4, 0]] = 100.0;
        let filtered = median_filter_vertical(&data, 5);
        assert!(filtered[[4, 0]] < 1.0);
    }

    #[test]
    fn spike_is_suppressed_by_horizontal_median() {
        let mut data = Array2::from_elem((1, 9), 0.0);
        data[[0, 4]] = 100.0;
        let filtered = median_filter_horizontal(&data, 5);
        assert!(filtered[[0, 4]] < 1.0);
    }
}
