//! Median Absolute Deviation noise estimation on wavelet detail coefficients.

const HIST_BINS: usize = 65_536;
const MAD_DIVISOR: f32 = 0.6745;

/// Robust noise scale of a detail sub-band via a histogram median.
///
/// Builds a 65,536-bin histogram of `|round(x)|` clamped to the bin range,
/// finds the median bin by cumulative count, linearly interpolates within
/// it, and divides by the standard MAD-to-sigma constant. Returns `0` for
/// buffers of length `<= 1`.
pub fn mad_rgb(buffer: &[f32]) -> f32 {
    if buffer.len() <= 1 {
        return 0.0;
    }

    let mut hist = vec![0u32; HIST_BINS];
    for &x in buffer {
        let v = x.round().abs();
        let bin = if v as i64 >= HIST_BINS as i64 {
            HIST_BINS - 1
        } else {
            v as usize
        };
        hist[bin] += 1;
    }

    let total = buffer.len() as u64;
    let target = total / 2;
    let mut cumulative = 0u64;
    let mut median_bin = 0usize;
    let mut count_before = 0u64;
    for (bin, &count) in hist.iter().enumerate() {
        let next = cumulative + count as u64;
        if next > target {
            median_bin = bin;
            count_before = cumulative;
            break;
        }
        cumulative = next;
    }

    let bin_count = hist[median_bin].max(1) as f64;
    let within_bin = (target as u64 - count_before) as f64 / bin_count;
    let median = median_bin as f64 + within_bin;

    (median / MAD_DIVISOR as f64) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_or_single_is_zero() {
        assert_eq!(mad_rgb(&[]), 0.0);
        assert_eq!(mad_rgb(&[5.0]), 0.0);
    }

    #[test]
    fn matches_reference_median_on_uniform_data() {
        let data: Vec<f32> = (0..1000).map(|i| (i % 100) as f32).collect();
        let mut sorted = data.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let reference_median = sorted[sorted.len() / 2] as f64;
        let got = mad_rgb(&data) as f64 * MAD_DIVISOR as f64;
        assert!(
            (got - reference_median).abs() <= 0.5,
            "got {got} reference {reference_median}"
        );
    }

    #[test]
    fn is_deterministic() {
        let data: Vec<f32> = (0..500).map(|i| ((i * 37) % 211) as f32).collect();
        assert_eq!(mad_rgb(&data), mad_rgb(&data));
    }
}
