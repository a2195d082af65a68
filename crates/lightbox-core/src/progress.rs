/// Clamp a reported percentage into 0.0..=100.0. NaN counts as no progress.
pub fn clamp_percent(percentage: f64) -> f64 {
    if percentage.is_nan() {
        0.0
    } else {
        percentage.clamp(0.0, 100.0)
    }
}

/// Map one item's progress onto its slice of an ordered batch.
///
/// Item `index` of `total` owns `[index/total*100, (index+1)/total*100)`;
/// the final item's slice is closed at 100. A non-final item reaching 100
/// has no value inside its half-open slice, so `None` is returned and the
/// next item's first report stands for it.
pub fn scale_batch_progress(index: usize, total: usize, percentage: f64) -> Option<f64> {
    if total == 0 || index >= total {
        return None;
    }
    let pct = clamp_percent(percentage);
    if pct >= 100.0 && index + 1 < total {
        return None;
    }
    Some((index as f64 * 100.0 + pct) / total as f64)
}

/// Mean of the given percentages; an empty set is 0.
pub fn aggregate(percentages: impl IntoIterator<Item = f64>) -> f64 {
    let (sum, count) = percentages
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), p| (sum + clamp_percent(p), count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_handles_out_of_range_and_nan() {
        assert_eq!(clamp_percent(-5.0), 0.0);
        assert_eq!(clamp_percent(250.0), 100.0);
        assert_eq!(clamp_percent(f64::NAN), 0.0);
        assert_eq!(clamp_percent(42.5), 42.5);
    }

    #[test]
    fn batch_of_three_maps_into_disjoint_slices() {
        let third = 100.0 / 3.0;
        for pct in [0.0, 10.0, 50.0, 99.9] {
            let v = scale_batch_progress(0, 3, pct).unwrap();
            assert!((0.0..third).contains(&v), "item 0 at {pct}: {v}");
            let v = scale_batch_progress(1, 3, pct).unwrap();
            assert!((third..2.0 * third).contains(&v), "item 1 at {pct}: {v}");
            let v = scale_batch_progress(2, 3, pct).unwrap();
            assert!((2.0 * third..=100.0).contains(&v), "item 2 at {pct}: {v}");
        }
        assert_eq!(scale_batch_progress(2, 3, 100.0), Some(100.0));
    }

    #[test]
    fn non_final_completion_is_suppressed() {
        assert_eq!(scale_batch_progress(0, 3, 100.0), None);
        assert_eq!(scale_batch_progress(1, 3, 100.0), None);
        assert_eq!(scale_batch_progress(0, 1, 100.0), Some(100.0));
    }

    #[test]
    fn out_of_range_index_is_ignored() {
        assert_eq!(scale_batch_progress(3, 3, 10.0), None);
        assert_eq!(scale_batch_progress(0, 0, 10.0), None);
    }

    #[test]
    fn aggregate_is_mean() {
        assert_eq!(aggregate(Vec::<f64>::new()), 0.0);
        assert_eq!(aggregate([100.0, 50.0, 0.0]), 50.0);
    }
}
