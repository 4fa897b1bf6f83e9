use std::path::{Path, PathBuf};

use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyModule;
use pyo3_polars::PyDataFrame;
use serde::Serialize;

use crate::config::EngineConfig;
use crate::curves::CurveInput;
use crate::error::FieldTestError;
use crate::evaluator::TestInput;
use crate::fs_store::FsStore;
use crate::model::FieldTestModel;
use crate::record::{Curve, FormDetails, Partition};
use crate::schema;
use crate::table;

impl From<FieldTestError> for PyErr {
    fn from(err: FieldTestError) -> PyErr {
        if err.is_input_error() {
            PyValueError::new_err(err.to_string())
        } else {
            PyRuntimeError::new_err(err.to_string())
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> PyResult<String> {
    Ok(serde_json::to_string(value).map_err(FieldTestError::from)?)
}

/// Operator payloads; malformed JSON is an input error.
fn from_json<T: serde::de::DeserializeOwned>(text: &str) -> PyResult<T> {
    serde_json::from_str(text).map_err(|err| PyValueError::new_err(err.to_string()))
}

fn partition(archived: bool) -> Partition {
    if archived {
        Partition::Archived
    } else {
        Partition::Active
    }
}

fn details(project_no: &str, contract_no: &str, curve_name: &str) -> FormDetails {
    FormDetails {
        project_no: project_no.to_string(),
        contract_no: contract_no.to_string(),
        curve_name: curve_name.to_string(),
    }
}

#[pyclass(name = "FieldTests")]
pub struct FieldTests {
    model: FieldTestModel<FsStore>,
}

#[pymethods]
impl FieldTests {
    /// Open the on-device store. `config_path` points at an optional TOML
    /// file; `base_dir` overrides its storage root.
    #[new]
    #[pyo3(signature = (base_dir=None, config_path=None))]
    fn new(base_dir: Option<String>, config_path: Option<String>) -> PyResult<Self> {
        let mut config = match config_path {
            Some(path) => EngineConfig::load(Path::new(&path))?,
            None => EngineConfig::default(),
        };
        if let Some(dir) = base_dir {
            config = config.with_base_dir(PathBuf::from(dir));
        }
        Ok(Self {
            model: FieldTestModel::open(config)?,
        })
    }

    // ── Session ─────────────────────────────────────────────────────────────

    #[pyo3(signature = (inspector_name, inspector_initials, district=""))]
    fn save_general_info(
        &self,
        inspector_name: &str,
        inspector_initials: &str,
        district: &str,
    ) -> PyResult<String> {
        let info = self
            .model
            .save_general_info(inspector_name, inspector_initials, district)?;
        to_json(&info)
    }

    fn general_info(&self) -> PyResult<String> {
        to_json(&self.model.general_info()?)
    }

    fn suggestions(&self, field: &str) -> PyResult<Vec<String>> {
        Ok(self.model.suggestions(field)?)
    }

    fn change_admin_passcode(&self, master: &str, new_passcode: &str) -> PyResult<()> {
        Ok(self.model.change_admin_passcode(master, new_passcode)?)
    }

    // ── Curves ──────────────────────────────────────────────────────────────

    #[pyo3(signature = (archived=false, query=""))]
    fn curves(&self, archived: bool, query: &str) -> PyResult<PyDataFrame> {
        let curves = self.model.curves().search(partition(archived), query)?;
        Ok(PyDataFrame(table::curves_frame(&curves)?))
    }

    #[pyo3(signature = (name, archived=false))]
    fn curve(&self, name: &str, archived: bool) -> PyResult<String> {
        to_json(&self.model.curves().get(name, partition(archived))?)
    }

    /// `curve_json` carries the admin's raw field strings.
    fn create_curve(&self, passcode: &str, curve_json: &str) -> PyResult<String> {
        let grant = self.model.authorize_admin(passcode)?;
        let input: CurveInput = from_json(curve_json)?;
        let curve: Curve = self.model.create_curve(&grant, &input)?;
        to_json(&curve)
    }

    fn archive_curve(&self, passcode: &str, name: &str) -> PyResult<()> {
        let grant = self.model.authorize_admin(passcode)?;
        Ok(self.model.archive_curve(&grant, name)?)
    }

    // ── Forms ───────────────────────────────────────────────────────────────

    #[pyo3(signature = (archived=false, query=""))]
    fn forms(&self, archived: bool, query: &str) -> PyResult<PyDataFrame> {
        let listing = self.model.list_forms(partition(archived), query)?;
        Ok(PyDataFrame(table::forms_frame(&listing)?))
    }

    fn form(&self, form_id: &str) -> PyResult<String> {
        to_json(&self.model.form(form_id)?)
    }

    fn form_tests(&self, form_id: &str) -> PyResult<PyDataFrame> {
        let form = self.model.form(form_id)?;
        Ok(PyDataFrame(table::tests_frame(&form)?))
    }

    fn resolved_form(&self, form_id: &str) -> PyResult<String> {
        to_json(&self.model.resolved_form(form_id)?)
    }

    /// New form for the inspector saved with `save_general_info`.
    #[pyo3(signature = (project_no="", contract_no="", curve_name=""))]
    fn create_form(&self, project_no: &str, contract_no: &str, curve_name: &str) -> PyResult<String> {
        let form = self
            .model
            .create_form_for_session(details(project_no, contract_no, curve_name))?;
        to_json(&form)
    }

    fn update_details(
        &self,
        form_id: &str,
        project_no: &str,
        contract_no: &str,
        curve_name: &str,
    ) -> PyResult<String> {
        let form = self
            .model
            .update_details(form_id, details(project_no, contract_no, curve_name))?;
        to_json(&form)
    }

    /// `test_json` is a tagged object, e.g.
    /// `{"type": "Moisture", "wet_weight": "200", ...}`.
    fn submit_test(&self, form_id: &str, test_json: &str) -> PyResult<String> {
        let input: TestInput = from_json(test_json)?;
        to_json(&self.model.submit_test(form_id, &input)?)
    }

    fn complete_form(&self, form_id: &str) -> PyResult<String> {
        to_json(&self.model.complete_form(form_id)?)
    }

    fn close_form(&self, form_id: &str, reason: &str) -> PyResult<String> {
        to_json(&self.model.close_form(form_id, reason)?)
    }

    fn archive_forms(&self, form_ids: Vec<String>) -> PyResult<()> {
        let ids: Vec<&str> = form_ids.iter().map(String::as_str).collect();
        Ok(self.model.archive_forms(&ids)?)
    }

    #[pyo3(signature = (path, archived=false, query=""))]
    fn export_forms_csv(&self, path: &str, archived: bool, query: &str) -> PyResult<()> {
        let listing = self.model.list_forms(partition(archived), query)?;
        let mut df = table::forms_frame(&listing)?;
        Ok(table::write_csv(&mut df, path)?)
    }
}

/// Export schema constants as Python submodules
pub(crate) fn add_schema_exports(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Form
    let form = PyModule::new(m.py(), "form")?;
    form.add("FORM_ID", schema::form::FORM_ID)?;
    form.add("STATUS", schema::form::STATUS)?;
    form.add("INSPECTOR_NAME", schema::form::INSPECTOR_NAME)?;
    form.add("PROJECT_NO", schema::form::PROJECT_NO)?;
    form.add("CONTRACT_NO", schema::form::CONTRACT_NO)?;
    form.add("CURVE_NAME", schema::form::CURVE_NAME)?;
    form.add("DATE", schema::form::DATE)?;
    form.add("LAST_UPDATE", schema::form::LAST_UPDATE)?;
    form.add("MOISTURE_RESULT", schema::form::MOISTURE_RESULT)?;
    form.add("DEFLECTION_RESULT", schema::form::DEFLECTION_RESULT)?;
    form.add("OVERALL_RESULT", schema::form::OVERALL_RESULT)?;
    form.add("STALENESS", schema::form::STALENESS)?;
    m.add_submodule(&form)?;

    // Curve
    let curve = PyModule::new(m.py(), "curve")?;
    curve.add("NAME", schema::curve::NAME)?;
    curve.add("SOIL_TYPE", schema::curve::SOIL_TYPE)?;
    curve.add("SOURCE", schema::curve::SOURCE)?;
    curve.add("SAMPLE_ID", schema::curve::SAMPLE_ID)?;
    curve.add("NGI", schema::curve::NGI)?;
    curve.add("TARGET_DTV", schema::curve::TARGET_DTV)?;
    curve.add("OPTIMUM_MOISTURE", schema::curve::OPTIMUM_MOISTURE)?;
    curve.add("MOISTURE_LOWER", schema::curve::MOISTURE_LOWER)?;
    curve.add("MOISTURE_UPPER", schema::curve::MOISTURE_UPPER)?;
    curve.add("DEFLECTION_TARGET", schema::curve::DEFLECTION_TARGET)?;
    curve.add("DEFLECTION_LOWER", schema::curve::DEFLECTION_LOWER)?;
    curve.add("DEFLECTION_UPPER", schema::curve::DEFLECTION_UPPER)?;
    curve.add("NOTES", schema::curve::NOTES)?;
    m.add_submodule(&curve)?;

    // Test
    let test = PyModule::new(m.py(), "test")?;
    test.add("TEST_ID", schema::test::TEST_ID)?;
    test.add("TYPE", schema::test::TYPE)?;
    test.add("STATION", schema::test::STATION)?;
    test.add("FEET_CL", schema::test::FEET_CL)?;
    test.add("MEASURED", schema::test::MEASURED)?;
    test.add("RESULT", schema::test::RESULT)?;
    test.add("NOTES", schema::test::NOTES)?;
    m.add_submodule(&test)?;

    // Recent-value fields
    let recent = PyModule::new(m.py(), "recent")?;
    recent.add("STATION", schema::recent::STATION)?;
    recent.add("FEET_CL", schema::recent::FEET_CL)?;
    recent.add("CANISTER", schema::recent::CANISTER)?;
    recent.add("INSPECTOR_NAME", schema::recent::INSPECTOR_NAME)?;
    recent.add("PROJECT_NO", schema::recent::PROJECT_NO)?;
    recent.add("CONTRACT_NO", schema::recent::CONTRACT_NO)?;
    m.add_submodule(&recent)?;

    Ok(())
}

#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<FieldTests>()?;
    add_schema_exports(m)?;
    Ok(())
}
