//! Numeric helpers shared by IoU and the decoders.

/// Guard used for every division in the IoU family.
pub(crate) const EPSILON: f32 = 1e-6;

/// Returns true when `value` is too close to zero to divide by.
#[inline]
pub(crate) fn is_near_zero(value: f32) -> bool {
    value.abs() < EPSILON
}

/// Logistic sigmoid.
#[inline]
pub(crate) fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::{is_near_zero, sigmoid};

    #[test]
    fn sigmoid_is_centered_at_half() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-6);
        assert!(sigmoid(20.0) > 0.999);
        assert!(sigmoid(-20.0) < 1e-3);
    }

    #[test]
    fn sigmoid_is_symmetric() {
        for x in [0.25f32, 1.0, 3.5] {
            assert!((sigmoid(x) + sigmoid(-x) - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn near_zero_respects_epsilon() {
        assert!(is_near_zero(5e-7));
        assert!(is_near_zero(-5e-7));
        assert!(!is_near_zero(2e-6));
    }
}
