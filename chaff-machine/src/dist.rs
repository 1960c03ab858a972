use rand::Rng;
use rand_distr::{Distribution, Geometric, LogNormal, Normal, Pareto, Poisson, Weibull};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DistError {
    #[error("distribution parameter is not finite")]
    NonFinite,
    #[error("uniform bounds are inverted")]
    InvertedBounds,
    #[error("parameter out of domain: {0}")]
    OutOfDomain(&'static str),
}

/// The distribution families machines sample timeouts, padding sizes and
/// blocking durations from.
///
/// Parameters are opaque configuration as far as the scheduler is concerned;
/// they are validated once, at machine construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DistKind {
    Uniform { low: f64, high: f64 },
    Normal { mean: f64, stdev: f64 },
    LogNormal { mu: f64, sigma: f64 },
    Geometric { success: f64 },
    Pareto { scale: f64, shape: f64 },
    Poisson { lambda: f64 },
    Weibull { scale: f64, shape: f64 },
}

/// A sampling distribution with a constant offset and an optional clamp.
///
/// Samples are non-negative: negative draws (e.g. from a normal) floor at
/// zero before the offset is added. A `clamp` of zero disables clamping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dist {
    pub kind: DistKind,
    /// Added to every sample.
    pub offset: f64,
    /// Upper bound applied after the offset. Zero means unbounded.
    pub clamp: f64,
}

impl Dist {
    /// A distribution that always yields `value`.
    pub fn constant(value: f64) -> Self {
        Self { kind: DistKind::Uniform { low: value, high: value }, offset: 0.0, clamp: 0.0 }
    }

    /// Checks that every parameter is finite and inside the family's domain.
    ///
    /// Machines refuse to construct around an invalid distribution, so
    /// sampling never has to fail at transition time.
    pub fn validate(&self) -> Result<(), DistError> {
        if !self.offset.is_finite() || !self.clamp.is_finite() {
            return Err(DistError::NonFinite);
        }
        if self.offset < 0.0 || self.clamp < 0.0 {
            return Err(DistError::OutOfDomain("offset and clamp must be non-negative"));
        }

        match self.kind {
            DistKind::Uniform { low, high } => {
                if !low.is_finite() || !high.is_finite() {
                    return Err(DistError::NonFinite);
                }
                if low > high {
                    return Err(DistError::InvertedBounds);
                }
                if low < 0.0 {
                    return Err(DistError::OutOfDomain("uniform bounds must be non-negative"));
                }
            }
            DistKind::Normal { mean, stdev } => {
                if !mean.is_finite() || !stdev.is_finite() {
                    return Err(DistError::NonFinite);
                }
                if stdev < 0.0 {
                    return Err(DistError::OutOfDomain("stdev must be non-negative"));
                }
            }
            DistKind::LogNormal { mu, sigma } => {
                if !mu.is_finite() || !sigma.is_finite() {
                    return Err(DistError::NonFinite);
                }
                if sigma < 0.0 {
                    return Err(DistError::OutOfDomain("sigma must be non-negative"));
                }
            }
            DistKind::Geometric { success } => {
                if !success.is_finite() {
                    return Err(DistError::NonFinite);
                }
                if success <= 0.0 || success > 1.0 {
                    return Err(DistError::OutOfDomain("success probability must be in (0, 1]"));
                }
            }
            DistKind::Pareto { scale, shape } | DistKind::Weibull { scale, shape } => {
                if !scale.is_finite() || !shape.is_finite() {
                    return Err(DistError::NonFinite);
                }
                if scale <= 0.0 || shape <= 0.0 {
                    return Err(DistError::OutOfDomain("scale and shape must be positive"));
                }
            }
            DistKind::Poisson { lambda } => {
                if !lambda.is_finite() {
                    return Err(DistError::NonFinite);
                }
                if lambda <= 0.0 {
                    return Err(DistError::OutOfDomain("lambda must be positive"));
                }
            }
        }

        Ok(())
    }

    /// Draws one sample.
    ///
    /// Total on validated distributions. An invalid family (only reachable
    /// by skipping [`Dist::validate`]) degrades to the bare offset.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let raw = match self.kind {
            DistKind::Uniform { low, high } => {
                if low < high {
                    rng.gen_range(low..high)
                } else {
                    low
                }
            }
            DistKind::Normal { mean, stdev } => match Normal::new(mean, stdev) {
                Ok(dist) => dist.sample(rng),
                Err(_) => 0.0,
            },
            DistKind::LogNormal { mu, sigma } => match LogNormal::new(mu, sigma) {
                Ok(dist) => dist.sample(rng),
                Err(_) => 0.0,
            },
            DistKind::Geometric { success } => match Geometric::new(success) {
                Ok(dist) => dist.sample(rng) as f64,
                Err(_) => 0.0,
            },
            DistKind::Pareto { scale, shape } => match Pareto::new(scale, shape) {
                Ok(dist) => dist.sample(rng),
                Err(_) => 0.0,
            },
            DistKind::Poisson { lambda } => match Poisson::new(lambda) {
                Ok(dist) => dist.sample(rng),
                Err(_) => 0.0,
            },
            DistKind::Weibull { scale, shape } => match Weibull::new(scale, shape) {
                Ok(dist) => dist.sample(rng),
                Err(_) => 0.0,
            },
        };

        let value = raw.max(0.0) + self.offset;
        if self.clamp > 0.0 {
            value.min(self.clamp)
        } else {
            value
        }
    }
}
