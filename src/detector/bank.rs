//! The estimator bank runs every configured estimator on the same window.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::config::{BankConfig, FrequencyBand};
use crate::detector::{EstimatorKind, PitchEstimate, PitchEstimator};
use crate::utils::buffer::centered_window;

/// One estimator's result, tagged with its kind and static weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedEstimate {
    pub kind: EstimatorKind,
    pub estimate: PitchEstimate,
    pub weight: f64,
}

struct Member {
    kind: EstimatorKind,
    weight: f64,
    estimator: Box<dyn PitchEstimator>,
}

pub struct EstimatorBank {
    members: Vec<Member>,
    window_size: usize,
}

impl EstimatorBank {
    pub fn new(config: &BankConfig, band: FrequencyBand) -> Self {
        let members = config
            .estimators
            .iter()
            .map(|member| Member {
                kind: member.kind,
                weight: member.weight,
                estimator: member.kind.build(band),
            })
            .collect();
        EstimatorBank {
            members,
            window_size: config.window_size,
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Run every estimator on the centred `window_size` samples of `signal`.
    /// Results come back in configuration order.
    pub fn run(&self, signal: &[f64], sample_rate: usize) -> Vec<WeightedEstimate> {
        let window = centered_window(signal, self.window_size);

        let evaluate = |member: &Member| {
            let estimate = member.estimator.estimate(window, sample_rate);
            log::debug!(
                "{}: {:.2} Hz (confidence {:.3})",
                member.kind.name(),
                estimate.frequency_hz,
                estimate.confidence
            );
            WeightedEstimate {
                kind: member.kind,
                estimate,
                weight: member.weight,
            }
        };

        #[cfg(feature = "parallel")]
        let results = self.members.par_iter().map(evaluate).collect();
        #[cfg(not(feature = "parallel"))]
        let results = self.members.iter().map(evaluate).collect();

        results
    }
}
