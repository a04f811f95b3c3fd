// ============================================================
// Layer 4 — Score Rescaler
// ============================================================
// Linear remapping of similarity scores from one closed
// interval to another:
//
//   v' = to.lo + (v - from.lo) * (to.hi - to.lo) / (from.hi - from.lo)
//
// Both ranges are ScoreRange values, which can only be built
// ascending with a finite non-zero width, so the division is safe
// and the result stays finite.

use crate::domain::batch::ScoreRange;

pub fn rescale_value(v: f64, from: ScoreRange, to: ScoreRange) -> f64 {
    to.lo() + (v - from.lo()) * to.width() / from.width()
}

pub fn rescale(values: &[f64], from: ScoreRange, to: ScoreRange) -> Vec<f64> {
    values.iter().map(|&v| rescale_value(v, from, to)).collect()
}
