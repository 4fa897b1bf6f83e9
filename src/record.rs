//! Persisted record types: curves, forms and the tests embedded in them.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::FieldTestError;

/// Storage segment a curve or form lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Partition {
    Active,
    Archived,
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Partition::Active => f.write_str("active"),
            Partition::Archived => f.write_str("archived"),
        }
    }
}

pub const BOUNDARY_EPSILON: f64 = 1e-9;

/// Offsets around a base value; stored as a `[lower, upper]` pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f64, f64)", into = "(f64, f64)")]
pub struct Limits {
    pub lower: f64,
    pub upper: f64,
}

impl Limits {
    pub fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    /// Inclusive acceptance window `[base + lower, base + upper]`.
    pub fn window(&self, base: f64) -> (f64, f64) {
        (base + self.lower, base + self.upper)
    }

    /// Edges count as inside, within float noise.
    pub fn accepts(&self, base: f64, value: f64) -> bool {
        let (low, high) = self.window(base);
        low - BOUNDARY_EPSILON <= value && value <= high + BOUNDARY_EPSILON
    }
}

impl From<(f64, f64)> for Limits {
    fn from((lower, upper): (f64, f64)) -> Self {
        Self { lower, upper }
    }
}

impl From<Limits> for (f64, f64) {
    fn from(limits: Limits) -> Self {
        (limits.lower, limits.upper)
    }
}

/// Deflection acceptance band, analogous to optimum moisture plus limits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeflectionTolerance {
    pub target: f64,
    pub limits: Limits,
}

/// Reference compaction targets for a soil/source/sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Curve {
    pub name: String,
    pub soil_type: String,
    pub source: String,
    pub sample_id: String,
    pub ngi: String,
    pub target_dtv: f64,
    pub optimum_moisture: f64,
    pub moisture_limits: Limits,
    #[serde(default)]
    pub deflection_tolerance: Option<DeflectionTolerance>,
    #[serde(default)]
    pub notes: String,
}

impl Curve {
    /// Text the curve search matches against.
    pub fn display_line(&self) -> String {
        format!(
            "{} | {} | {} | {}",
            self.name, self.source, self.sample_id, self.ngi
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormStatus {
    Incomplete,
    Pending,
    Complete,
    Closed,
}

impl FormStatus {
    /// Listing order: open work first.
    pub fn rank(&self) -> u8 {
        match self {
            FormStatus::Incomplete => 0,
            FormStatus::Pending => 1,
            FormStatus::Complete => 2,
            FormStatus::Closed => 3,
        }
    }

    /// Complete and Closed forms take no further edits and may be archived.
    pub fn is_terminal(&self) -> bool {
        matches!(self, FormStatus::Complete | FormStatus::Closed)
    }
}

impl fmt::Display for FormStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FormStatus::Incomplete => "Incomplete",
            FormStatus::Pending => "Pending",
            FormStatus::Complete => "Complete",
            FormStatus::Closed => "Closed",
        };
        f.write_str(s)
    }
}

/// PASS/FAIL outcome of a single test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    #[serde(rename = "PASS")]
    Pass,
    #[serde(rename = "FAIL")]
    Fail,
}

impl Verdict {
    pub fn from_pass(pass: bool) -> Self {
        if pass {
            Verdict::Pass
        } else {
            Verdict::Fail
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Pass => f.write_str("PASS"),
            Verdict::Fail => f.write_str("FAIL"),
        }
    }
}

/// Form-level result: a verdict, or Pending until one exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Outcome {
    #[default]
    Pending,
    #[serde(rename = "PASS")]
    Pass,
    #[serde(rename = "FAIL")]
    Fail,
}

impl From<Verdict> for Outcome {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Pass => Outcome::Pass,
            Verdict::Fail => Outcome::Fail,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Pending => f.write_str("Pending"),
            Outcome::Pass => f.write_str("PASS"),
            Outcome::Fail => f.write_str("FAIL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TestType {
    Moisture,
    Deflection,
}

impl TestType {
    pub const ALL: [TestType; 2] = [TestType::Moisture, TestType::Deflection];

    fn suffix(&self) -> &'static str {
        match self {
            TestType::Moisture => "_M",
            TestType::Deflection => "_D",
        }
    }

    /// `T<form id without leading F><_M|_D>`
    pub fn test_id(&self, form_id: &str) -> String {
        let stem = form_id.strip_prefix('F').unwrap_or(form_id);
        format!("T{stem}{}", self.suffix())
    }
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestType::Moisture => f.write_str("Moisture"),
            TestType::Deflection => f.write_str("Deflection"),
        }
    }
}

impl FromStr for TestType {
    type Err = FieldTestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "moisture" | "m" => Ok(TestType::Moisture),
            "deflection" | "d" => Ok(TestType::Deflection),
            _ => Err(FieldTestError::validation("type")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TestMethod {
    Oven,
    Stove,
    Speedy,
}

impl FromStr for TestMethod {
    type Err = FieldTestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "oven" => Ok(TestMethod::Oven),
            "stove" => Ok(TestMethod::Stove),
            "speedy" => Ok(TestMethod::Speedy),
            _ => Err(FieldTestError::validation("test_method")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoistureTest {
    pub test_id: String,
    pub station: String,
    pub feet_cl: String,
    pub depth: String,
    pub canister: String,
    pub test_method: TestMethod,
    pub wet_weight: f64,
    /// Drying-progress log; not part of the moisture formula.
    pub intermediate_weights: Vec<f64>,
    pub dry_weight: f64,
    pub loss: f64,
    pub moisture_content: f64,
    pub result: Verdict,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeflectionTest {
    pub test_id: String,
    pub station: String,
    pub feet_cl: String,
    pub readings: Vec<f64>,
    pub average_deflection: f64,
    pub result: Verdict,
    pub notes: String,
}

/// A submitted measurement. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Test {
    Moisture(MoistureTest),
    Deflection(DeflectionTest),
}

impl Test {
    pub fn test_type(&self) -> TestType {
        match self {
            Test::Moisture(_) => TestType::Moisture,
            Test::Deflection(_) => TestType::Deflection,
        }
    }

    pub fn test_id(&self) -> &str {
        match self {
            Test::Moisture(t) => &t.test_id,
            Test::Deflection(t) => &t.test_id,
        }
    }

    pub fn result(&self) -> Verdict {
        match self {
            Test::Moisture(t) => t.result,
            Test::Deflection(t) => t.result,
        }
    }

    pub fn station(&self) -> &str {
        match self {
            Test::Moisture(t) => &t.station,
            Test::Deflection(t) => &t.station,
        }
    }

    pub fn feet_cl(&self) -> &str {
        match self {
            Test::Moisture(t) => &t.feet_cl,
            Test::Deflection(t) => &t.feet_cl,
        }
    }

    pub fn notes(&self) -> &str {
        match self {
            Test::Moisture(t) => &t.notes,
            Test::Deflection(t) => &t.notes,
        }
    }

    /// The derived value the verdict was decided on.
    pub fn measured(&self) -> f64 {
        match self {
            Test::Moisture(t) => t.moisture_content,
            Test::Deflection(t) => t.average_deflection,
        }
    }
}

/// One inspection record for a site visit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Form {
    pub form_id: String,
    pub date: NaiveDateTime,
    pub last_update: NaiveDateTime,
    pub inspector_name: String,
    pub project_no: String,
    pub contract_no: String,
    pub curve_name: String,
    pub status: FormStatus,
    pub tests: Vec<Test>,
    pub moisture_result: Outcome,
    pub deflection_result: Outcome,
    pub overall_result: Outcome,
    #[serde(default)]
    pub close_reason: Option<String>,
}

impl Form {
    pub fn test(&self, kind: TestType) -> Option<&Test> {
        self.tests.iter().find(|t| t.test_type() == kind)
    }

    pub fn has_test(&self, kind: TestType) -> bool {
        self.test(kind).is_some()
    }

    /// Test types that can still be submitted.
    pub fn open_slots(&self) -> Vec<TestType> {
        TestType::ALL
            .into_iter()
            .filter(|kind| !self.has_test(*kind))
            .collect()
    }

    /// Text the form search matches against.
    pub fn display_line(&self) -> String {
        format!(
            "{} | {} | {} | {}",
            self.form_id,
            self.status,
            self.inspector_name,
            self.date.format("%Y%m%d_%H%M")
        )
    }
}

/// Who is creating a form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inspector {
    pub name: String,
    pub initials: String,
}

/// Operator-editable form header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormDetails {
    pub project_no: String,
    pub contract_no: String,
    pub curve_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limits_window_is_inclusive() {
        let limits = Limits::new(-2.0, 2.0);
        assert_eq!(limits.window(12.0), (10.0, 14.0));
        assert!(limits.accepts(12.0, 10.0));
        assert!(limits.accepts(12.0, 14.0));
        assert!(!limits.accepts(12.0, 14.01));
    }

    #[test]
    fn test_limits_serialize_as_pair() {
        let json = serde_json::to_string(&Limits::new(-2.0, 1.5)).unwrap();
        assert_eq!(json, "[-2.0,1.5]");
        let back: Limits = serde_json::from_str("[-1, 3]").unwrap();
        assert_eq!(back, Limits::new(-1.0, 3.0));
    }

    #[test]
    fn test_test_id_strips_form_prefix() {
        assert_eq!(
            TestType::Moisture.test_id("FJL20240615_0930_1"),
            "TJL20240615_0930_1_M"
        );
        assert_eq!(
            TestType::Deflection.test_id("FJL20240615_0930_1"),
            "TJL20240615_0930_1_D"
        );
    }

    #[test]
    fn test_outcome_wire_names() {
        assert_eq!(serde_json::to_string(&Outcome::Pass).unwrap(), "\"PASS\"");
        assert_eq!(serde_json::to_string(&Outcome::Pending).unwrap(), "\"Pending\"");
        assert_eq!(serde_json::to_string(&Verdict::Fail).unwrap(), "\"FAIL\"");
    }

    #[test]
    fn test_method_parse_is_case_insensitive() {
        assert_eq!("speedy".parse::<TestMethod>().unwrap(), TestMethod::Speedy);
        assert_eq!(" Oven ".parse::<TestMethod>().unwrap(), TestMethod::Oven);
        assert!(matches!(
            "microwave".parse::<TestMethod>(),
            Err(FieldTestError::Validation { field }) if field == "test_method"
        ));
    }

    #[test]
    fn test_status_rank_orders_open_work_first() {
        let mut statuses = vec![
            FormStatus::Closed,
            FormStatus::Complete,
            FormStatus::Incomplete,
            FormStatus::Pending,
        ];
        statuses.sort_by_key(|s| s.rank());
        assert_eq!(
            statuses,
            vec![
                FormStatus::Incomplete,
                FormStatus::Pending,
                FormStatus::Complete,
                FormStatus::Closed
            ]
        );
        assert!(FormStatus::Closed.is_terminal());
        assert!(!FormStatus::Pending.is_terminal());
    }
}
