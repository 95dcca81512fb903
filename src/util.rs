use rand::Rng;

pub fn partial_cmp_equal<T: PartialOrd>(lhs: &T, rhs: &T) -> bool {
    matches!(lhs.partial_cmp(rhs), Some(std::cmp::Ordering::Equal))
}

/// An exponential deviate with the given rate,
/// or infinity when the rate is zero.
pub(crate) fn exponential_deviate<R: Rng>(rng: &mut R, rate: f64) -> f64 {
    if rate <= 0.0 {
        return f64::INFINITY;
    }
    let u: f64 = rng.gen();
    -(1.0 - u).ln() / rate
}
