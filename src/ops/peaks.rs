//! Peak picking with topographic prominence.

/// A local maximum of a 1-D signal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    pub index: usize,
    pub prominence: f64,
}

/// Indices of local maxima. A flat top counts once, at its middle sample.
/// The first and last samples are never peaks.
pub fn local_maxima(x: &[f64]) -> Vec<usize> {
    let mut peaks = Vec::new();
    if x.len() < 3 {
        return peaks;
    }

    let last = x.len() - 1;
    let mut i = 1;
    while i < last {
        if x[i - 1] < x[i] {
            let mut ahead = i + 1;
            while ahead < last && x[ahead] == x[i] {
                ahead += 1;
            }
            if x[ahead] < x[i] {
                peaks.push((i + ahead - 1) / 2);
                i = ahead;
            }
        }
        i += 1;
    }
    peaks
}

/// Height of the peak above the higher of its two bases. Each base is the
/// lowest point between the peak and the nearest higher sample (or the
/// signal edge) on that side.
pub fn prominence(x: &[f64], peak: usize) -> f64 {
    let height = x[peak];

    let mut left_min = height;
    let mut i = peak;
    loop {
        if x[i] > height {
            break;
        }
        left_min = left_min.min(x[i]);
        if i == 0 {
            break;
        }
        i -= 1;
    }

    let mut right_min = height;
    for &v in &x[peak..] {
        if v > height {
            break;
        }
        right_min = right_min.min(v);
    }

    height - left_min.max(right_min)
}

/// Peaks whose prominence is at least `min_prominence`, in index order.
pub fn find_peaks(x: &[f64], min_prominence: f64) -> Vec<Peak> {
    local_maxima(x)
        .into_iter()
        .map(|index| Peak { index, prominence: prominence(x, index) })
        .filter(|p| p.prominence >= min_prominence)
        .collect()
}
