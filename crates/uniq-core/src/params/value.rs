//! Scalar-or-range parameter values.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// A transform parameter: either a concrete number or an inclusive range
/// sampled uniformly once per job.
///
/// In TOML/JSON a fixed value is a bare number and a range is a two-element
/// array, e.g. `rotation = [-2.0, 2.0]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Fixed(f64),
    Range(f64, f64),
}

impl Value {
    pub fn range(min: f64, max: f64) -> Self {
        Self::Range(min, max)
    }

    /// Resolve to a concrete scalar. Reversed bounds are swapped, equal
    /// bounds return that bound without consuming randomness.
    pub fn resolve<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match *self {
            Self::Fixed(v) => v,
            Self::Range(a, b) => {
                let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
                if lo == hi {
                    lo
                } else {
                    rng.gen_range(lo..=hi)
                }
            }
        }
    }

    /// Resolve and clamp into `[min, max]`. Non-finite values become `fallback`.
    pub fn resolve_clamped<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        min: f64,
        max: f64,
        fallback: f64,
    ) -> f64 {
        let v = self.resolve(rng);
        if v.is_finite() {
            v.clamp(min, max)
        } else {
            fallback
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Fixed(v)
    }
}

/// Resolve an optional value, treating "unset" as the operation's no-op.
pub(crate) fn resolve_or<R: Rng + ?Sized>(
    value: Option<Value>,
    rng: &mut R,
    min: f64,
    max: f64,
    noop: f64,
) -> f64 {
    value.map_or(noop, |v| v.resolve_clamped(rng, min, max, noop))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_fixed_resolves_to_itself() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(Value::Fixed(3.5).resolve(&mut rng), 3.5);
    }

    #[test]
    fn test_range_stays_inside_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        let v = Value::range(-2.0, 2.0);
        for _ in 0..1000 {
            let x = v.resolve(&mut rng);
            assert!((-2.0..=2.0).contains(&x));
        }
    }

    #[test]
    fn test_reversed_and_degenerate_ranges() {
        let mut rng = StdRng::seed_from_u64(7);
        let x = Value::range(5.0, 1.0).resolve(&mut rng);
        assert!((1.0..=5.0).contains(&x));
        assert_eq!(Value::range(4.0, 4.0).resolve(&mut rng), 4.0);
    }

    #[test]
    fn test_clamp_and_non_finite_fallback() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(Value::Fixed(99.0).resolve_clamped(&mut rng, -10.0, 10.0, 0.0), 10.0);
        assert_eq!(
            Value::Fixed(f64::NAN).resolve_clamped(&mut rng, -10.0, 10.0, 0.0),
            0.0
        );
    }

    #[test]
    fn test_unset_is_noop() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(resolve_or(None, &mut rng, 0.0, 10.0, 0.0), 0.0);
    }

    #[test]
    fn test_deserialize_scalar_and_pair() {
        #[derive(Deserialize)]
        struct Doc {
            a: Value,
            b: Value,
        }
        let doc: Doc = toml::from_str("a = 1.5\nb = [-2.0, 2.0]\n").unwrap();
        assert_eq!(doc.a, Value::Fixed(1.5));
        assert_eq!(doc.b, Value::Range(-2.0, 2.0));
    }
}
