//! CO2 emissions derived from the generation mix.

use crate::core::Frame;
use crate::error::{ForecastError, Result};
use crate::ingest::feed::RawObservation;
use serde::{Deserialize, Serialize};

/// Emission factors (kg CO2 per generated unit) of the polluting sources.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmissionFactors {
    pub aut: f64,
    pub car: f64,
    pub cc: f64,
    #[serde(rename = "cogenResto")]
    pub cogen_resto: f64,
    pub gf: f64,
    #[serde(rename = "termRenov")]
    pub term_renov: f64,
}

impl Default for EmissionFactors {
    fn default() -> Self {
        Self {
            aut: 0.27,
            car: 0.95,
            cc: 0.37,
            cogen_resto: 0.27,
            gf: 0.7,
            term_renov: 0.27,
        }
    }
}

impl EmissionFactors {
    /// `(source code, factor)` pairs in feed order.
    pub fn sources(&self) -> [(&'static str, f64); 6] {
        [
            ("aut", self.aut),
            ("car", self.car),
            ("cc", self.cc),
            ("cogenResto", self.cogen_resto),
            ("gf", self.gf),
            ("termRenov", self.term_renov),
        ]
    }

    /// Weighted sum of the polluting sources of one observation.
    pub fn emissions_for(&self, observation: &RawObservation) -> Result<f64> {
        self.sources().iter().try_fold(0.0, |total, &(code, factor)| {
            let magnitude = observation
                .source(code)
                .ok_or_else(|| ForecastError::Schema(code.to_string()))?;
            Ok(total + magnitude * factor)
        })
    }
}

/// Build a text-indexed emissions frame from raw observations.
///
/// Timestamps are copied untouched so the anomaly corrector can still see the
/// daylight-saving markers.
pub fn emissions_frame(
    observations: &[RawObservation],
    factors: &EmissionFactors,
    time_column: &str,
    value_column: &str,
) -> Result<Frame> {
    let mut timestamps = Vec::with_capacity(observations.len());
    let mut values = Vec::with_capacity(observations.len());
    for observation in observations {
        timestamps.push(observation.ts.clone());
        values.push(factors.emissions_for(observation)?);
    }
    tracing::debug!(rows = values.len(), "computed emissions from generation mix");
    Frame::from_text(time_column, value_column, timestamps, values)
}
