use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::LimitsError;

pub const DEFAULT_MAX_DURATION: f64 = 10.0;
pub const DEFAULT_ERROR_RATE: f64 = 0.1;
pub const DEFAULT_REQUEST_RATE: f64 = 1.0;

/// Parameters the driver samples with.
///
/// Every instance reachable through the public API satisfies
/// `max_duration > 0`, `0 <= error_rate <= 1` and `request_rate > 0`,
/// all finite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationConfig {
    /// Exclusive upper bound of the sampled latency (seconds).
    pub max_duration: f64,
    /// Probability of a sample being marked as failed.
    pub error_rate: f64,
    /// Samples per second.
    pub request_rate: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            max_duration: DEFAULT_MAX_DURATION,
            error_rate: DEFAULT_ERROR_RATE,
            request_rate: DEFAULT_REQUEST_RATE,
        }
    }
}

impl SimulationConfig {
    pub fn new(max_duration: f64, error_rate: f64, request_rate: f64) -> Result<Self, LimitsError> {
        Ok(Self {
            max_duration: Field::MaxDuration.check(max_duration)?,
            error_rate: Field::ErrorRate.check(error_rate)?,
            request_rate: Field::RequestRate.check(request_rate)?,
        })
    }

    /// Copy of `self` with every present field of `delta` written over it.
    pub fn merged(&self, delta: &ConfigDelta) -> Self {
        Self {
            max_duration: delta.max_duration.unwrap_or(self.max_duration),
            error_rate: delta.error_rate.unwrap_or(self.error_rate),
            request_rate: delta.request_rate.unwrap_or(self.request_rate),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    MaxDuration,
    ErrorRate,
    RequestRate,
}

impl Field {
    pub const ALL: [Field; 3] = [Field::MaxDuration, Field::ErrorRate, Field::RequestRate];

    /// Name used on the wire (form keys, JSON).
    pub fn name(self) -> &'static str {
        match self {
            Field::MaxDuration => "maxDuration",
            Field::ErrorRate => "errorRate",
            Field::RequestRate => "requestRate",
        }
    }

    pub fn from_name(name: &str) -> Option<Field> {
        Field::ALL.into_iter().find(|f| f.name() == name)
    }

    pub fn expected_range(self) -> &'static str {
        match self {
            Field::MaxDuration | Field::RequestRate => "must be a finite number > 0",
            Field::ErrorRate => "must be between 0 and 1",
        }
    }

    /// Range check only. NaN and infinities never pass.
    pub fn check(self, value: f64) -> Result<f64, LimitsError> {
        let valid = value.is_finite()
            && match self {
                Field::MaxDuration | Field::RequestRate => value > 0.0,
                Field::ErrorRate => (0.0..=1.0).contains(&value),
            };

        if valid {
            Ok(value)
        } else {
            Err(LimitsError::out_of_range(self, value))
        }
    }

    pub fn parse(self, raw: &str) -> Result<f64, LimitsError> {
        raw.parse::<f64>()
            .map_err(|_| LimitsError::malformed(self, raw))
    }

    /// Parse followed by the range check.
    pub fn validate(self, raw: &str) -> Result<f64, LimitsError> {
        self.check(self.parse(raw)?)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A validated partial update. Absent fields are left untouched by the store.
///
/// Fields are private so a delta can only come out of validation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ConfigDelta {
    max_duration: Option<f64>,
    error_rate: Option<f64>,
    request_rate: Option<f64>,
}

impl ConfigDelta {
    pub fn new(
        max_duration: Option<f64>,
        error_rate: Option<f64>,
        request_rate: Option<f64>,
    ) -> Result<Self, LimitsError> {
        Ok(Self {
            max_duration: max_duration.map(|v| Field::MaxDuration.check(v)).transpose()?,
            error_rate: error_rate.map(|v| Field::ErrorRate.check(v)).transpose()?,
            request_rate: request_rate.map(|v| Field::RequestRate.check(v)).transpose()?,
        })
    }

    pub fn get(&self, field: Field) -> Option<f64> {
        match field {
            Field::MaxDuration => self.max_duration,
            Field::ErrorRate => self.error_rate,
            Field::RequestRate => self.request_rate,
        }
    }

    pub fn is_empty(&self) -> bool {
        Field::ALL.iter().all(|f| self.get(*f).is_none())
    }
}

/// Raw update as delivered by the transport: each field optional, unparsed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LimitsForm {
    #[serde(rename = "maxDuration")]
    pub max_duration: Option<String>,
    #[serde(rename = "errorRate")]
    pub error_rate: Option<String>,
    #[serde(rename = "requestRate")]
    pub request_rate: Option<String>,
}

impl LimitsForm {
    /// Records `raw` for `field` unless a value is already present; the first
    /// occurrence of a repeated key wins.
    pub fn set_if_absent(&mut self, field: Field, raw: String) {
        let slot = match field {
            Field::MaxDuration => &mut self.max_duration,
            Field::ErrorRate => &mut self.error_rate,
            Field::RequestRate => &mut self.request_rate,
        };
        slot.get_or_insert(raw);
    }

    /// Validates every present field; the first failure rejects the whole form.
    pub fn into_delta(self) -> Result<ConfigDelta, LimitsError> {
        let validate = |field: Field, raw: Option<String>| {
            raw.map(|raw| field.validate(&raw)).transpose()
        };

        Ok(ConfigDelta {
            max_duration: validate(Field::MaxDuration, self.max_duration)?,
            error_rate: validate(Field::ErrorRate, self.error_rate)?,
            request_rate: validate(Field::RequestRate, self.request_rate)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(max: Option<&str>, err: Option<&str>, rate: Option<&str>) -> LimitsForm {
        LimitsForm {
            max_duration: max.map(str::to_string),
            error_rate: err.map(str::to_string),
            request_rate: rate.map(str::to_string),
        }
    }

    #[test]
    fn test_defaults() {
        let cfg = SimulationConfig::default();
        assert_eq!(cfg.max_duration, 10.0);
        assert_eq!(cfg.error_rate, 0.1);
        assert_eq!(cfg.request_rate, 1.0);
    }

    #[test]
    fn test_new_rejects_each_invariant() {
        assert!(SimulationConfig::new(10.0, 0.1, 1.0).is_ok());
        assert_eq!(
            SimulationConfig::new(0.0, 0.1, 1.0),
            Err(LimitsError::out_of_range(Field::MaxDuration, 0.0))
        );
        assert_eq!(
            SimulationConfig::new(10.0, 1.01, 1.0),
            Err(LimitsError::out_of_range(Field::ErrorRate, 1.01))
        );
        assert_eq!(
            SimulationConfig::new(10.0, 0.1, -2.0),
            Err(LimitsError::out_of_range(Field::RequestRate, -2.0))
        );
    }

    #[test]
    fn test_error_rate_bounds_are_inclusive() {
        assert_eq!(Field::ErrorRate.check(0.0), Ok(0.0));
        assert_eq!(Field::ErrorRate.check(1.0), Ok(1.0));
        assert!(Field::ErrorRate.check(-0.0001).is_err());
    }

    #[test]
    fn test_non_finite_values_are_out_of_range() {
        for field in Field::ALL {
            assert!(field.check(f64::NAN).is_err());
            assert!(field.check(f64::INFINITY).is_err());
            assert!(field.validate("NaN").is_err());
            assert_eq!(field.validate("inf").unwrap_err().kind(), "out_of_range");
        }
    }

    #[test]
    fn test_parse_failure_is_malformed() {
        let err = Field::RequestRate.validate("abc").unwrap_err();
        assert_eq!(err, LimitsError::malformed(Field::RequestRate, "abc"));

        let err = Field::MaxDuration.validate("").unwrap_err();
        assert_eq!(err.kind(), "malformed");
    }

    #[test]
    fn test_form_partial_update() {
        let delta = form(None, Some("0.5"), None).into_delta().unwrap();
        assert_eq!(delta.get(Field::ErrorRate), Some(0.5));
        assert_eq!(delta.get(Field::MaxDuration), None);
        assert_eq!(delta.get(Field::RequestRate), None);

        let merged = SimulationConfig::default().merged(&delta);
        assert_eq!(merged, SimulationConfig::new(10.0, 0.5, 1.0).unwrap());
    }

    #[test]
    fn test_form_rejects_whole_update_on_any_bad_field() {
        let err = form(Some("5"), Some("0.2"), Some("abc"))
            .into_delta()
            .unwrap_err();
        assert_eq!(err.field(), Some(Field::RequestRate));

        let err = form(Some("-1"), None, None).into_delta().unwrap_err();
        assert_eq!(err, LimitsError::out_of_range(Field::MaxDuration, -1.0));
    }

    #[test]
    fn test_empty_form_is_empty_delta() {
        let delta = LimitsForm::default().into_delta().unwrap();
        assert!(delta.is_empty());
        assert_eq!(
            SimulationConfig::default().merged(&delta),
            SimulationConfig::default()
        );
    }

    #[test]
    fn test_delta_new_validates_present_fields_only() {
        assert!(ConfigDelta::new(None, None, None).unwrap().is_empty());
        assert!(ConfigDelta::new(Some(3.0), None, Some(20.0)).is_ok());
        assert!(ConfigDelta::new(None, Some(2.0), None).is_err());
    }

    #[test]
    fn test_from_name_and_first_value_wins() {
        assert_eq!(Field::from_name("errorRate"), Some(Field::ErrorRate));
        assert_eq!(Field::from_name("error_rate"), None);

        let mut form = LimitsForm::default();
        form.set_if_absent(Field::ErrorRate, "0.3".to_string());
        form.set_if_absent(Field::ErrorRate, "0.9".to_string());
        assert_eq!(form.error_rate.as_deref(), Some("0.3"));
    }

    #[test]
    fn test_serializes_with_wire_names() {
        let value = serde_json::to_value(SimulationConfig::default()).unwrap();
        assert_eq!(value["maxDuration"], 10.0);
        assert_eq!(value["errorRate"], 0.1);
        assert_eq!(value["requestRate"], 1.0);
    }
}
