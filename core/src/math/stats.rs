use ndarray::ArrayView1;

pub struct StatsHelper;

impl StatsHelper {
    /// Arithmetic mean, `None` for an empty view.
    pub fn mean(samples: ArrayView1<f64>) -> Option<f64> {
        samples.mean()
    }

    /// Trapezoid area between two points of a sampled curve.
    pub fn trapezoid(y_lo: f64, y_hi: f64, x_lo: f64, x_hi: f64) -> f64 {
        (y_hi + y_lo) / 2.0 * (x_hi - x_lo)
    }
}
