use ndarray::ArrayView1;
use std::ops::Range;

/// Index of the first sample strictly above `value` in an ascending sequence.
pub fn first_above(sorted: ArrayView1<f64>, value: f64) -> usize {
    match sorted.as_slice() {
        Some(slice) => slice.partition_point(|&v| v <= value),
        None => sorted.iter().take_while(|&&v| v <= value).count(),
    }
}

/// Sample indices whose value lies in `(min, max]`.
pub fn window(sorted: ArrayView1<f64>, min: f64, max: f64) -> Range<usize> {
    let start = first_above(sorted, min);
    let end = first_above(sorted, max).max(start);
    start..end
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn window_is_open_below_and_closed_above() {
        let altitude = array![1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(window(altitude.view(), 2.0, 4.0), 2..4);
        assert_eq!(window(altitude.view(), 0.0, 10.0), 0..5);
    }

    #[test]
    fn window_outside_samples_is_empty() {
        let altitude = array![1.0, 2.0, 20.0];
        assert!(window(altitude.view(), 3.0, 10.0).is_empty());
        assert!(window(altitude.view(), 30.0, 40.0).is_empty());
    }

    #[test]
    fn non_uniform_spacing_is_searched_correctly() {
        let altitude = array![0.1, 0.15, 0.9, 0.91, 7.5, 21.0];
        assert_eq!(first_above(altitude.view(), 0.9), 3);
    }
}
