use nalgebra::{DVector, Vector2};
use rand::Rng;
use rv::dist::Gaussian;
use rv::traits::Sampleable;

use crate::error::{Error, Result};

#[allow(clippy::needless_pass_by_value)]
#[cfg(test)]
pub(crate) fn convert_to_unicode(data: Vec<Vec<f64>>) -> Vec<Vec<char>> {
    // Define the range for mapping values from 0 to 1 to Unicode characters.
    const MIN_VALUE: f64 = 0.0;
    const MAX_VALUE: f64 = 1.0;

    const MIN_CHAR_CODE: u32 = 0x2588; // U+2588 FULL BLOCK
    const MAX_CHAR_CODE: u32 = 0x2591; // U+2591 LIGHT SHADE

    let unicode_range = MAX_CHAR_CODE - MIN_CHAR_CODE;

    data.iter()
        .map(|row| {
            row.iter()
                .map(|&value| {
                    let value = value.clamp(MIN_VALUE, MAX_VALUE);
                    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                    let code = MIN_CHAR_CODE
                        + (f64::from(unicode_range) * (value - MIN_VALUE) / (MAX_VALUE - MIN_VALUE))
                            as u32;
                    std::char::from_u32(code).expect("to be valid by construction")
                })
                .collect()
        })
        .collect()
}

/// Prevent the inner value from being verbosely / pretty printed during a debug.
pub(crate) struct NoPrettyPrint<T: std::fmt::Debug>(pub T);

impl<T: std::fmt::Debug> NoPrettyPrint<T> {
    pub const fn new(t: T) -> Self {
        Self(t)
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for NoPrettyPrint<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Prevent "{:#?}" from being used.
        write!(f, "{:?}", self.0)
    }
}

/// Zero-mean Gaussian used as a random-walk step.
pub(crate) fn walk(field: &'static str, step: f64) -> Result<Gaussian> {
    Gaussian::new(0.0, step).map_err(|e| Error::InvalidConfig {
        field,
        message: format!("{e:?}"),
    })
}

/// `x` plus independent Gaussian steps in every coordinate.
pub(crate) fn jitter<R: Rng>(x: &DVector<f64>, step: &Gaussian, rng: &mut R) -> DVector<f64> {
    let noise: Vec<f64> = step.sample(x.len(), rng);
    x + DVector::from_vec(noise)
}

pub(crate) fn jitter2<R: Rng>(x: &Vector2<f64>, step: &Gaussian, rng: &mut R) -> Vector2<f64> {
    let dx: f64 = step.draw(rng);
    let dy: f64 = step.draw(rng);
    x + Vector2::new(dx, dy)
}

/// Multiply a positive scalar by a log-normal factor.
pub(crate) fn scale_walk<R: Rng>(x: f64, step: &Gaussian, rng: &mut R) -> f64 {
    let ln_factor: f64 = step.draw(rng);
    x * ln_factor.exp()
}

/// Axis-aligned box that segment endpoints are drawn from.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Bounds {
    pub lower: Vector2<f64>,
    pub upper: Vector2<f64>,
}

impl Bounds {
    pub fn new(field: &'static str, lower: Vector2<f64>, upper: Vector2<f64>) -> Result<Self> {
        if lower.iter().zip(upper.iter()).all(|(l, u)| l < u) {
            Ok(Self { lower, upper })
        } else {
            Err(Error::InvalidConfig {
                field,
                message: format!("empty bounding box {lower:?} .. {upper:?}"),
            })
        }
    }

    pub fn contains(&self, x: &Vector2<f64>) -> bool {
        (0..2).all(|i| self.lower[i] <= x[i] && x[i] <= self.upper[i])
    }

    pub fn draw<R: Rng>(&self, rng: &mut R) -> Vector2<f64> {
        Vector2::new(
            rng.random_range(self.lower.x..self.upper.x),
            rng.random_range(self.lower.y..self.upper.y),
        )
    }
}

/// Where a point lies relative to a directed segment.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct SegmentProjection {
    /// Fraction of the way from start to end, in `[0, 1]`.
    pub along: f64,
    /// Signed perpendicular offset.
    pub offset: f64,
    pub length: f64,
}

/// Project `x` onto the segment `start -> end`; `None` if the foot of the perpendicular falls
/// outside the segment or the segment has no length.
pub(crate) fn project_onto_segment(
    start: &Vector2<f64>,
    end: &Vector2<f64>,
    x: &DVector<f64>,
) -> Option<SegmentProjection> {
    let direction = end - start;
    let length = direction.norm();
    if !(length > f64::EPSILON) {
        return None;
    }

    let rel = Vector2::new(x[0], x[1]) - start;
    let along = rel.dot(&direction) / (length * length);
    if !(0.0..=1.0).contains(&along) {
        return None;
    }

    let offset = direction.perp(&rel) / length;
    Some(SegmentProjection {
        along,
        offset,
        length,
    })
}
