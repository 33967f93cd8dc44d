//! Parametrized distributions for workload sampling.
//!
//! Parameter tuples follow the `loc`/`scale` convention of common fitting
//! tools, so fitted tuples can be used unchanged.

use std::fmt;

use rand::Rng;
use rand::distr::{Distribution, Uniform};
use rand_distr::{Exp1, InverseGaussian, LogNormal, Normal};
use serde::{Deserialize, Serialize};

use super::simulation::SimulationError;

/// Distribution family a parameter tuple is interpreted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionFamily {
    /// `(mu, loc, scale)`: `loc + scale * IG(mean = mu, shape = 1)`
    InverseGaussian,
    /// `(loc, scale)`
    Normal,
    /// `(s, loc, scale)`: `loc + scale * exp(s * N(0, 1))`
    LogNormal,
    /// `(loc, scale)`: `loc + scale * Exp(1)`
    Exponential,
    /// `(loc, scale)`: uniform on `[loc, loc + scale)`
    Uniform,
    /// `(value)`
    Constant,
}

impl DistributionFamily {
    /// Number of parameters the family expects.
    pub fn arity(self) -> usize {
        match self {
            DistributionFamily::InverseGaussian | DistributionFamily::LogNormal => 3,
            DistributionFamily::Normal
            | DistributionFamily::Exponential
            | DistributionFamily::Uniform => 2,
            DistributionFamily::Constant => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DistributionFamily::InverseGaussian => "inverse_gaussian",
            DistributionFamily::Normal => "normal",
            DistributionFamily::LogNormal => "log_normal",
            DistributionFamily::Exponential => "exponential",
            DistributionFamily::Uniform => "uniform",
            DistributionFamily::Constant => "constant",
        }
    }
}

impl fmt::Display for DistributionFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered tuple of real numbers interpreted by a distribution family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    pub family: DistributionFamily,
    pub params: Vec<f64>,
}

impl ParameterSet {
    pub fn new(family: DistributionFamily, params: impl Into<Vec<f64>>) -> Self {
        Self {
            family,
            params: params.into(),
        }
    }

    pub fn inverse_gaussian(mu: f64, loc: f64, scale: f64) -> Self {
        Self::new(DistributionFamily::InverseGaussian, [mu, loc, scale])
    }

    pub fn constant(value: f64) -> Self {
        Self::new(DistributionFamily::Constant, [value])
    }

    /// Builds a sampleable distribution from the tuple.
    ///
    /// # Errors
    ///
    /// - `SimulationError::InvalidParameters` - Wrong arity, non-finite values, non-positive scale,
    ///   or parameters rejected by the distribution itself
    pub fn build(&self) -> Result<FittedDistribution, SimulationError> {
        let invalid = |reason: String| SimulationError::InvalidParameters {
            reason: format!("{} {:?}: {reason}", self.family, self.params),
        };

        if self.params.len() != self.family.arity() {
            return Err(invalid(format!(
                "expected {} parameters, got {}",
                self.family.arity(),
                self.params.len()
            )));
        }
        if self.params.iter().any(|p| !p.is_finite()) {
            return Err(invalid("parameters must be finite".to_string()));
        }

        let p = &self.params;
        let positive_scale = |scale: f64| {
            if scale > 0.0 {
                Ok(scale)
            } else {
                Err(invalid("scale must be positive".to_string()))
            }
        };

        let distribution = match self.family {
            DistributionFamily::InverseGaussian => FittedDistribution::InverseGaussian {
                base: InverseGaussian::new(p[0], 1.0).map_err(|e| invalid(e.to_string()))?,
                loc: p[1],
                scale: positive_scale(p[2])?,
            },
            DistributionFamily::Normal => FittedDistribution::Normal(
                Normal::new(p[0], positive_scale(p[1])?).map_err(|e| invalid(e.to_string()))?,
            ),
            DistributionFamily::LogNormal => FittedDistribution::LogNormal {
                base: LogNormal::new(0.0, p[0]).map_err(|e| invalid(e.to_string()))?,
                loc: p[1],
                scale: positive_scale(p[2])?,
            },
            DistributionFamily::Exponential => FittedDistribution::Exponential {
                loc: p[0],
                scale: positive_scale(p[1])?,
            },
            DistributionFamily::Uniform => FittedDistribution::Uniform(
                Uniform::new(p[0], p[0] + positive_scale(p[1])?)
                    .map_err(|e| invalid(e.to_string()))?,
            ),
            DistributionFamily::Constant => FittedDistribution::Constant(p[0]),
        };

        Ok(distribution)
    }

    /// Draws `count` independent samples.
    ///
    /// # Errors
    ///
    /// - `SimulationError::InvalidParameters` - The tuple does not describe a valid distribution
    pub fn sample<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        count: usize,
    ) -> Result<Vec<f64>, SimulationError> {
        Ok(self.build()?.sample_n(rng, count))
    }
}

/// A parameter set validated and ready to sample.
#[derive(Debug, Clone)]
pub enum FittedDistribution {
    InverseGaussian {
        base: InverseGaussian<f64>,
        loc: f64,
        scale: f64,
    },
    Normal(Normal<f64>),
    LogNormal {
        base: LogNormal<f64>,
        loc: f64,
        scale: f64,
    },
    Exponential {
        loc: f64,
        scale: f64,
    },
    Uniform(Uniform<f64>),
    Constant(f64),
}

impl FittedDistribution {
    /// Draws `count` independent samples.
    pub fn sample_n<R: Rng + ?Sized>(&self, rng: &mut R, count: usize) -> Vec<f64> {
        (0..count).map(|_| self.sample(rng)).collect()
    }
}

impl Distribution<f64> for FittedDistribution {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match self {
            FittedDistribution::InverseGaussian { base, loc, scale } => {
                loc + scale * base.sample(rng)
            }
            FittedDistribution::Normal(normal) => normal.sample(rng),
            FittedDistribution::LogNormal { base, loc, scale } => loc + scale * base.sample(rng),
            FittedDistribution::Exponential { loc, scale } => {
                let unit: f64 = Exp1.sample(rng);
                loc + scale * unit
            }
            FittedDistribution::Uniform(uniform) => uniform.sample(rng),
            FittedDistribution::Constant(value) => *value,
        }
    }
}

/// Parameter sets for the three sampled workload dimensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleParameters {
    pub size: ParameterSet,
    pub interval: ParameterSet,
    pub duration: ParameterSet,
}

impl SampleParameters {
    /// Inverse Gaussian fits of a recorded application trace.
    ///
    /// Sizes in bytes, intervals and durations in microseconds.
    pub fn reference_workload() -> Self {
        Self {
            size: ParameterSet::inverse_gaussian(
                4.4104723603507887,
                -2.6088737757264524,
                38.771521098316683,
            ),
            interval: ParameterSet::inverse_gaussian(
                1.1323738333275997,
                453.39611575820913,
                3727.4636141720862,
            ),
            duration: ParameterSet::inverse_gaussian(
                2.4486917249574072,
                399004.31314749306,
                4145977.1006420013,
            ),
        }
    }

    /// Deterministic workload with fixed size, interval and duration.
    pub fn constant(size: f64, interval: f64, duration: f64) -> Self {
        Self {
            size: ParameterSet::constant(size),
            interval: ParameterSet::constant(interval),
            duration: ParameterSet::constant(duration),
        }
    }
}

/// Raw samples consumed by the event generator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampledWorkload {
    pub sizes: Vec<f64>,
    pub intervals: Vec<f64>,
    pub durations: Vec<f64>,
}

impl SampledWorkload {
    /// Number of complete (size, interval, duration) triples.
    pub fn len(&self) -> usize {
        self.sizes
            .len()
            .min(self.intervals.len())
            .min(self.durations.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Samples whole workloads from validated parameters.
#[derive(Debug, Clone)]
pub struct WorkloadSampler {
    size: FittedDistribution,
    interval: FittedDistribution,
    duration: FittedDistribution,
}

impl WorkloadSampler {
    /// Validates all three parameter sets up front.
    ///
    /// # Errors
    ///
    /// - `SimulationError::InvalidParameters` - Any of the three sets is invalid
    pub fn new(parameters: &SampleParameters) -> Result<Self, SimulationError> {
        let labelled = |name: &str, set: &ParameterSet| {
            set.build().map_err(|error| match error {
                SimulationError::InvalidParameters { reason } => {
                    SimulationError::InvalidParameters {
                        reason: format!("{name}: {reason}"),
                    }
                }
                other => other,
            })
        };

        Ok(Self {
            size: labelled("size", &parameters.size)?,
            interval: labelled("interval", &parameters.interval)?,
            duration: labelled("duration", &parameters.duration)?,
        })
    }

    /// Draws `count` triples, intervals first, then durations, then sizes.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R, count: usize) -> SampledWorkload {
        let intervals = self.interval.sample_n(rng, count);
        let durations = self.duration.sample_n(rng, count);
        let sizes = self.size.sample_n(rng, count);

        SampledWorkload {
            sizes,
            intervals,
            durations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deterministic::DeterministicRng;

    #[test]
    fn test_family_arity_is_checked() {
        let set = ParameterSet::new(DistributionFamily::InverseGaussian, [1.0, 2.0]);
        let result = set.build();
        assert!(matches!(
            result,
            Err(SimulationError::InvalidParameters { .. })
        ));
    }

    #[test]
    fn test_non_positive_parameters_rejected() {
        let bad_scale = ParameterSet::inverse_gaussian(1.0, 0.0, 0.0);
        assert!(bad_scale.build().is_err());

        let bad_mean = ParameterSet::inverse_gaussian(-1.0, 0.0, 1.0);
        assert!(bad_mean.build().is_err());

        let non_finite = ParameterSet::new(DistributionFamily::Normal, [f64::NAN, 1.0]);
        assert!(non_finite.build().is_err());
    }

    #[test]
    fn test_family_serialization() {
        let set = ParameterSet::new(DistributionFamily::LogNormal, [0.5, 0.0, 1.0]);
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"{"family":"log_normal","params":[0.5,0.0,1.0]}"#);

        let parsed: ParameterSet = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, set);
    }

    #[test]
    fn test_constant_distribution() {
        let mut rng = DeterministicRng::from_seed(1);
        let values = ParameterSet::constant(3.5).sample(&mut rng, 4).unwrap();
        assert_eq!(values, vec![3.5; 4]);
    }

    #[test]
    fn test_shifted_distributions_respect_support() {
        let mut rng = DeterministicRng::from_seed(9);

        let uniform = ParameterSet::new(DistributionFamily::Uniform, [10.0, 5.0]);
        for value in uniform.sample(&mut rng, 200).unwrap() {
            assert!((10.0..15.0).contains(&value));
        }

        let exponential = ParameterSet::new(DistributionFamily::Exponential, [100.0, 2.0]);
        for value in exponential.sample(&mut rng, 200).unwrap() {
            assert!(value >= 100.0);
        }

        let inverse_gaussian = ParameterSet::inverse_gaussian(1.0, 50.0, 10.0);
        for value in inverse_gaussian.sample(&mut rng, 200).unwrap() {
            assert!(value >= 50.0);
        }
    }

    #[test]
    fn test_sampling_is_reproducible() {
        let parameters = SampleParameters::reference_workload();
        let sampler = WorkloadSampler::new(&parameters).unwrap();

        let first = sampler.sample(&mut DeterministicRng::from_seed(7), 100);
        let second = sampler.sample(&mut DeterministicRng::from_seed(7), 100);

        assert_eq!(first, second);
        assert_eq!(first.len(), 100);
    }

    #[test]
    fn test_invalid_set_is_labelled() {
        let mut parameters = SampleParameters::reference_workload();
        parameters.duration = ParameterSet::new(DistributionFamily::Normal, [0.0]);

        match WorkloadSampler::new(&parameters) {
            Err(SimulationError::InvalidParameters { reason }) => {
                assert!(reason.starts_with("duration:"), "{reason}");
            }
            other => panic!("Expected InvalidParameters, got {other:?}"),
        }
    }
}
