//! Parsing of the hourly/10-minute generation-mix feed.

use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const FEED_PREFIX: &str = "null({\"valoresHorariosGeneracion\":";
const FEED_SUFFIX: &str = "});";

/// One observation of the generation mix.
///
/// `ts` is kept verbatim: it may carry the `2A`/`2B` daylight-saving markers,
/// which only exist in the textual form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawObservation {
    pub ts: String,
    #[serde(flatten)]
    pub sources: BTreeMap<String, f64>,
}

impl RawObservation {
    pub fn new(ts: impl Into<String>) -> Self {
        Self {
            ts: ts.into(),
            sources: BTreeMap::new(),
        }
    }

    /// Builder-style insert of a source magnitude.
    pub fn with_source(mut self, code: impl Into<String>, magnitude: f64) -> Self {
        self.sources.insert(code.into(), magnitude);
        self
    }

    /// Generation magnitude for an energy-source code.
    pub fn source(&self, code: &str) -> Option<f64> {
        self.sources.get(code).copied()
    }
}

/// Parse a feed payload into observations.
///
/// The payload is either a bare JSON array or the array wrapped as
/// `null({"valoresHorariosGeneracion":[...]});`.
pub fn parse_generation_feed(payload: &str) -> Result<Vec<RawObservation>> {
    let body = strip_wrapper(payload.trim());
    serde_json::from_str(body).map_err(|e| ForecastError::Parse(format!("generation feed: {e}")))
}

fn strip_wrapper(payload: &str) -> &str {
    let body = payload.strip_prefix(FEED_PREFIX).unwrap_or(payload);
    body.strip_suffix(FEED_SUFFIX).unwrap_or(body).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wrapped_payload() {
        let payload = r#"null({"valoresHorariosGeneracion":[
            {"ts":"2020-08-29 21:00","dem":26342,"gf":0,"car":437,"cc":4849},
            {"ts":"2020-08-29 21:10","dem":27102,"gf":0,"car":442,"cc":4628}
        ]});"#;

        let observations = parse_generation_feed(payload).unwrap();
        assert_eq!(observations.len(), 2);
        assert_eq!(observations[0].ts, "2020-08-29 21:00");
        assert_eq!(observations[0].source("car"), Some(437.0));
        assert_eq!(observations[1].source("cc"), Some(4628.0));
        assert_eq!(observations[1].source("sol"), None);
    }

    #[test]
    fn parses_bare_array() {
        let observations =
            parse_generation_feed(r#"[{"ts":"2020-10-25 2B:00","car":10.5}]"#).unwrap();
        assert_eq!(observations[0].ts, "2020-10-25 2B:00");
        assert_eq!(observations[0].source("car"), Some(10.5));
    }

    #[test]
    fn rejects_malformed_payload() {
        let result = parse_generation_feed("<html>service unavailable</html>");
        assert!(matches!(result, Err(ForecastError::Parse(_))));

        let result = parse_generation_feed(r#"[{"car": 1.0}]"#);
        assert!(matches!(result, Err(ForecastError::Parse(_))));
    }
}
