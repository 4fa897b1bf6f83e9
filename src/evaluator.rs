//! Raw test input validation and PASS/FAIL evaluation against a curve.
//!
//! Evaluation is pure: it reads the curve, builds an immutable [`Test`]
//! and never touches the form or the store.

use serde::{Deserialize, Serialize};

use crate::error::{FieldTestError, Result};
use crate::record::{
    Curve, DeflectionTest, MoistureTest, Test, TestMethod, TestType, Verdict,
};

/// Intermediate weighings the drying log has room for.
pub const MAX_INTERMEDIATE_WEIGHTS: usize = 8;

/// Moisture test fields as typed by the operator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoistureInput {
    pub station: String,
    pub feet_cl: String,
    pub depth: String,
    pub canister: String,
    pub test_method: String,
    pub wet_weight: String,
    pub intermediate_weights: Vec<String>,
    pub dry_weight: String,
    pub notes: String,
}

/// Deflection test fields as typed by the operator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeflectionInput {
    pub station: String,
    pub feet_cl: String,
    pub readings: Vec<String>,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TestInput {
    Moisture(MoistureInput),
    Deflection(DeflectionInput),
}

/// A test submission that can be judged against a curve.
pub trait Evaluable {
    fn test_type(&self) -> TestType;

    /// Validate the raw fields and produce the test record for `form_id`.
    fn evaluate(&self, form_id: &str, curve: &Curve) -> Result<Test>;
}

impl Evaluable for MoistureInput {
    fn test_type(&self) -> TestType {
        TestType::Moisture
    }

    fn evaluate(&self, form_id: &str, curve: &Curve) -> Result<Test> {
        let station = required("station", &self.station)?;
        let feet_cl = required("feet_cl", &self.feet_cl)?;
        let method = required("test_method", &self.test_method)?;
        let wet_raw = required("wet_weight", &self.wet_weight)?;
        let dry_raw = required("dry_weight", &self.dry_weight)?;

        let test_method: TestMethod = method.parse()?;
        let wet_weight = measurement("wet_weight", wet_raw)?;
        let dry_weight = measurement("dry_weight", dry_raw)?;
        if wet_weight <= 0.0 {
            return Err(FieldTestError::InvalidMeasurement(format!(
                "wet_weight must be positive, got {wet_weight}"
            )));
        }
        if dry_weight <= 0.0 {
            return Err(FieldTestError::InvalidMeasurement(format!(
                "dry_weight must be positive, got {dry_weight}"
            )));
        }
        if dry_weight > wet_weight {
            return Err(FieldTestError::InvalidMeasurement(format!(
                "dry_weight {dry_weight} exceeds wet_weight {wet_weight}"
            )));
        }
        let intermediate_weights = self.intermediate_log()?;

        let (loss, moisture_content) = moisture_content(wet_weight, dry_weight);
        derived("moisture_content", moisture_content)?;
        let result = Verdict::from_pass(
            curve
                .moisture_limits
                .accepts(curve.optimum_moisture, moisture_content),
        );

        Ok(Test::Moisture(MoistureTest {
            test_id: TestType::Moisture.test_id(form_id),
            station: station.to_string(),
            feet_cl: feet_cl.to_string(),
            depth: self.depth.trim().to_string(),
            canister: self.canister.trim().to_string(),
            test_method,
            wet_weight,
            intermediate_weights,
            dry_weight,
            loss,
            moisture_content,
            result,
            notes: self.notes.trim().to_string(),
        }))
    }
}

impl MoistureInput {
    fn intermediate_log(&self) -> Result<Vec<f64>> {
        let entries: Vec<&str> = self
            .intermediate_weights
            .iter()
            .map(|w| w.trim())
            .filter(|w| !w.is_empty())
            .collect();
        if entries.len() > MAX_INTERMEDIATE_WEIGHTS {
            return Err(FieldTestError::InvalidMeasurement(format!(
                "at most {MAX_INTERMEDIATE_WEIGHTS} intermediate weights, got {}",
                entries.len()
            )));
        }
        entries
            .into_iter()
            .map(|raw| {
                let weight = measurement("intermediate_weights", raw)?;
                if weight <= 0.0 {
                    return Err(FieldTestError::InvalidMeasurement(format!(
                        "intermediate weight must be positive, got {weight}"
                    )));
                }
                Ok(weight)
            })
            .collect()
    }
}

impl Evaluable for DeflectionInput {
    fn test_type(&self) -> TestType {
        TestType::Deflection
    }

    fn evaluate(&self, form_id: &str, curve: &Curve) -> Result<Test> {
        let station = required("station", &self.station)?;
        let feet_cl = required("feet_cl", &self.feet_cl)?;

        let raw: Vec<&str> = self
            .readings
            .iter()
            .map(|r| r.trim())
            .filter(|r| !r.is_empty())
            .collect();
        if raw.is_empty() {
            return Err(FieldTestError::validation("readings"));
        }
        let readings = raw
            .into_iter()
            .map(|r| {
                let reading = measurement("readings", r)?;
                if reading < 0.0 {
                    return Err(FieldTestError::InvalidMeasurement(format!(
                        "deflection reading must not be negative, got {reading}"
                    )));
                }
                Ok(reading)
            })
            .collect::<Result<Vec<f64>>>()?;

        let tolerance = curve
            .deflection_tolerance
            .ok_or_else(|| FieldTestError::MissingTolerance(curve.name.clone()))?;

        let average_deflection = mean(&readings);
        derived("average_deflection", average_deflection)?;
        let result = Verdict::from_pass(
            tolerance
                .limits
                .accepts(tolerance.target, average_deflection),
        );

        Ok(Test::Deflection(DeflectionTest {
            test_id: TestType::Deflection.test_id(form_id),
            station: station.to_string(),
            feet_cl: feet_cl.to_string(),
            readings,
            average_deflection,
            result,
            notes: self.notes.trim().to_string(),
        }))
    }
}

impl TestInput {
    pub fn as_evaluable(&self) -> &dyn Evaluable {
        match self {
            TestInput::Moisture(input) => input,
            TestInput::Deflection(input) => input,
        }
    }

    pub fn test_type(&self) -> TestType {
        self.as_evaluable().test_type()
    }

    /// Free-text fields worth offering as suggestions next time.
    pub fn recent_fields(&self) -> Vec<(&'static str, &str)> {
        use crate::schema::recent;
        match self {
            TestInput::Moisture(m) => vec![
                (recent::STATION, m.station.as_str()),
                (recent::FEET_CL, m.feet_cl.as_str()),
                (recent::CANISTER, m.canister.as_str()),
            ],
            TestInput::Deflection(d) => vec![
                (recent::STATION, d.station.as_str()),
                (recent::FEET_CL, d.feet_cl.as_str()),
            ],
        }
    }
}

/// Validate `input` against `curve` and build the test record.
pub fn evaluate(input: &TestInput, form_id: &str, curve: &Curve) -> Result<Test> {
    input.as_evaluable().evaluate(form_id, curve)
}

/// `(loss, moisture %)` for a wet/dry weighing.
pub fn moisture_content(wet_weight: f64, dry_weight: f64) -> (f64, f64) {
    let loss = wet_weight - dry_weight;
    (loss, (loss / wet_weight) * 100.0)
}

/// Scales before summing so large readings cannot overflow.
fn mean(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    values.iter().map(|v| v / n).sum()
}

/// Stored records must round-trip through JSON, which has no infinity.
fn derived(field: &str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(FieldTestError::InvalidMeasurement(format!(
            "{field} is out of range: {value}"
        )))
    }
}

fn required<'a>(field: &str, value: &'a str) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(FieldTestError::validation(field));
    }
    Ok(value)
}

fn measurement(field: &str, raw: &str) -> Result<f64> {
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(FieldTestError::InvalidMeasurement(format!(
            "{field} is not a number: {raw:?}"
        ))),
    }
}
