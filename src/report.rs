//! Read-only form + curve view handed to the report renderer.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{FieldTestError, Result};
use crate::model::FieldTestModel;
use crate::record::{FormStatus, Limits, Outcome, Partition, Test};
use crate::store::Store;

/// A form with its curve's fields flattened in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedForm {
    pub form_id: String,
    pub partition: Partition,
    pub date: NaiveDateTime,
    pub last_update: NaiveDateTime,
    pub inspector_name: String,
    pub project_no: String,
    pub contract_no: String,
    pub status: FormStatus,
    pub close_reason: Option<String>,
    pub moisture_result: Outcome,
    pub deflection_result: Outcome,
    pub overall_result: Outcome,
    pub tests: Vec<Test>,

    pub curve_name: String,
    pub soil_type: String,
    pub source: String,
    pub sample_id: String,
    pub ngi: String,
    pub target_dtv: f64,
    pub optimum_moisture: f64,
    pub moisture_limits: Limits,
    pub moisture_window: (f64, f64),
    pub deflection_window: Option<(f64, f64)>,
    pub curve_notes: String,
}

impl<S: Store> FieldTestModel<S> {
    /// Resolve a form (active or archived) against its curve, which may
    /// itself have been archived since.
    pub fn resolved_form(&self, form_id: &str) -> Result<ResolvedForm> {
        let (form, partition) = self.locate_form(form_id)?;
        if form.curve_name.is_empty() {
            return Err(FieldTestError::MissingCurve(format!(
                "form {form_id} has no curve assigned"
            )));
        }
        let (curve, _) = self
            .curves()
            .resolve(&form.curve_name)?
            .ok_or_else(|| FieldTestError::MissingCurve(form.curve_name.clone()))?;

        Ok(ResolvedForm {
            form_id: form.form_id,
            partition,
            date: form.date,
            last_update: form.last_update,
            inspector_name: form.inspector_name,
            project_no: form.project_no,
            contract_no: form.contract_no,
            status: form.status,
            close_reason: form.close_reason,
            moisture_result: form.moisture_result,
            deflection_result: form.deflection_result,
            overall_result: form.overall_result,
            tests: form.tests,
            moisture_window: curve.moisture_limits.window(curve.optimum_moisture),
            deflection_window: curve
                .deflection_tolerance
                .map(|t| t.limits.window(t.target)),
            curve_name: curve.name,
            soil_type: curve.soil_type,
            source: curve.source,
            sample_id: curve.sample_id,
            ngi: curve.ngi,
            target_dtv: curve.target_dtv,
            optimum_moisture: curve.optimum_moisture,
            moisture_limits: curve.moisture_limits,
            curve_notes: curve.notes,
        })
    }
}
