/// Median-filtered mean: a median window of size `median_window` is
/// stepped across `samples`, each step contributing the median of its
/// sub-window, and the per-step medians are averaged.
///
/// The window shrinks to the sample count during warm-up rather than
/// reading past the filled region. An even window contributes the mean
/// of the two central sorted elements. `scratch` is reused between
/// calls so the hot loop does not allocate.
pub fn median_filtered_mean(samples: &[f64], median_window: usize, scratch: &mut Vec<f64>) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let m = median_window.clamp(1, samples.len());
    let steps = samples.len() - m + 1;
    let mut sum = 0.0;
    for z in 0..steps {
        scratch.clear();
        scratch.extend_from_slice(&samples[z..z + m]);
        // m <= 16 in practice; a plain sort is fine here
        scratch.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        sum += if m % 2 == 0 {
            (scratch[m / 2 - 1] + scratch[m / 2]) / 2.0
        } else {
            scratch[m / 2]
        };
    }
    sum / steps as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(samples: &[f64], m: usize) -> f64 {
        let mut scratch = Vec::new();
        median_filtered_mean(samples, m, &mut scratch)
    }

    #[test]
    fn constant_input_converges_exactly() {
        for w in 1..=12usize {
            for m in 1..=w {
                let samples = vec![0.7; w];
                assert_eq!(run(&samples, m), 0.7, "W={w} M={m}");
            }
        }
    }

    #[test]
    fn rejects_a_single_spike() {
        let samples = [5.0, 5.0, 5.0, 100.0, 5.0, 5.0, 5.0];
        assert_eq!(run(&samples, 3), 5.0);
    }

    #[test]
    fn even_window_uses_central_pair() {
        // windows [1,3] and [3,5]: medians 2 and 4
        assert_eq!(run(&[1.0, 3.0, 5.0], 2), 3.0);
    }

    #[test]
    fn window_shrinks_during_warmup() {
        // fewer samples than the nominal window: no padding, no stale reads
        assert_eq!(run(&[2.0], 5), 2.0);
        assert_eq!(run(&[2.0, 4.0], 5), 3.0);
    }
}
