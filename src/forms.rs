//! Form lifecycle: creation, test submission, completion and closing.
//!
//! ```text
//! Incomplete ──(both tests in)──▶ Pending ──complete──▶ Complete
//!      │                            │
//!      └──────────close─────────────┴──────────────────▶ Closed
//! ```
//!
//! Every mutation runs under the model's writer lock and commits the form,
//! its standalone test record and the recent-value cache as one unit.

use tracing::{debug, info, warn};

use crate::error::{FieldTestError, Result};
use crate::evaluator::{evaluate, TestInput};
use crate::listing::{arrange, FormListing};
use crate::model::FieldTestModel;
use crate::record::{
    Form, FormDetails, FormStatus, Inspector, Outcome, Partition, Test, TestType, Verdict,
};
use crate::schema::recent;
use crate::store::{read_as, to_record, RecordKey, RecordKind, Store};

/// `PASS` iff every recorded test passed; `Pending` until one exists.
pub fn overall_outcome(tests: &[Test]) -> Outcome {
    if tests.is_empty() {
        Outcome::Pending
    } else if tests.iter().all(|t| t.result() == Verdict::Pass) {
        Outcome::Pass
    } else {
        Outcome::Fail
    }
}

impl Form {
    /// Append a freshly evaluated test and recompute results and status.
    fn record_test(&mut self, test: Test, at: chrono::NaiveDateTime) {
        let outcome = Outcome::from(test.result());
        match test.test_type() {
            TestType::Moisture => self.moisture_result = outcome,
            TestType::Deflection => self.deflection_result = outcome,
        }
        self.tests.push(test);
        self.overall_result = overall_outcome(&self.tests);
        self.status = if self.open_slots().is_empty() {
            FormStatus::Pending
        } else {
            FormStatus::Incomplete
        };
        self.last_update = at;
    }
}

impl<S: Store> FieldTestModel<S> {
    // ── Reads ───────────────────────────────────────────────────────────────

    /// A form from whichever partition holds it.
    pub fn form(&self, form_id: &str) -> Result<Form> {
        self.locate_form(form_id).map(|(form, _)| form)
    }

    pub fn locate_form(&self, form_id: &str) -> Result<(Form, Partition)> {
        for partition in [Partition::Active, Partition::Archived] {
            if let Some(form) = read_as(self.store(), &RecordKey::form(form_id, partition))? {
                return Ok((form, partition));
            }
        }
        Err(FieldTestError::NotFound(format!("form {form_id}")))
    }

    /// Standalone audit copies of a form's tests.
    pub fn tests(&self, form_id: &str) -> Result<Vec<Test>> {
        let (_, partition) = self.locate_form(form_id)?;
        let kind = RecordKind::Test {
            form_id: form_id.to_string(),
        };
        let mut tests = Vec::new();
        for test_id in self.store().ids(&kind, partition)? {
            if let Some(test) = read_as(self.store(), &RecordKey::test(form_id, &test_id, partition))? {
                tests.push(test);
            }
        }
        Ok(tests)
    }

    /// Forms in `partition` matching `query`, annotated and ordered.
    pub fn list_forms(&self, partition: Partition, query: &str) -> Result<Vec<FormListing>> {
        let forms = self.forms_in(partition)?;
        debug!(%partition, count = forms.len(), query, "Listing forms");
        Ok(arrange(forms, query, self.now(), &self.config().staleness))
    }

    pub(crate) fn forms_in(&self, partition: Partition) -> Result<Vec<Form>> {
        let mut forms = Vec::new();
        for form_id in self.store().ids(&RecordKind::Form, partition)? {
            if let Some(form) = read_as(self.store(), &RecordKey::form(&form_id, partition))? {
                forms.push(form);
            }
        }
        Ok(forms)
    }

    /// An active form, or the reason it cannot be edited.
    fn editable_form(&self, form_id: &str) -> Result<Form> {
        match self.locate_form(form_id)? {
            (form, Partition::Active) => Ok(form),
            (_, Partition::Archived) => {
                warn!(form_id, "Rejected edit of archived form");
                Err(FieldTestError::ReadOnlyArchive(format!("form {form_id}")))
            }
        }
    }

    fn check_curve(&self, curve_name: &str) -> Result<()> {
        if !curve_name.is_empty() && !self.curves().exists(curve_name, Partition::Active)? {
            return Err(FieldTestError::MissingCurve(curve_name.to_string()));
        }
        Ok(())
    }

    // ── Create ──────────────────────────────────────────────────────────────

    /// Start a new Incomplete form for `inspector`.
    ///
    /// The id is `F<initials><yyyymmdd_HHMM>_<n>`, where `n` follows the
    /// inspector's forms already in the active partition. The id is reserved
    /// with a create-only insert, so a clash bumps `n` instead of
    /// overwriting.
    pub fn create_form(&self, inspector: &Inspector, details: FormDetails) -> Result<Form> {
        let name = inspector.name.trim();
        if name.is_empty() {
            return Err(FieldTestError::validation("inspector_name"));
        }
        let initials = inspector.initials.trim();
        if initials.is_empty() || !initials.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(FieldTestError::validation("inspector_initials"));
        }
        let details = trimmed(details);

        let _guard = self.lock_writer();
        self.check_curve(&details.curve_name)?;
        let now = self.now();
        let prefix = format!("F{initials}");
        let existing = self
            .store()
            .ids(&RecordKind::Form, Partition::Active)?
            .iter()
            .filter(|id| {
                id.strip_prefix(&prefix)
                    .is_some_and(|rest| rest.starts_with(|c: char| c.is_ascii_digit()))
            })
            .count();

        let stamp = now.format("%Y%m%d_%H%M");
        let mut sequence = existing + 1;
        let form = loop {
            let form_id = format!("{prefix}{stamp}_{sequence}");
            sequence += 1;
            if self
                .store()
                .read(&RecordKey::form(&form_id, Partition::Archived))?
                .is_some()
            {
                continue;
            }
            let form = Form {
                form_id,
                date: now,
                last_update: now,
                inspector_name: name.to_string(),
                project_no: details.project_no.clone(),
                contract_no: details.contract_no.clone(),
                curve_name: details.curve_name.clone(),
                status: FormStatus::Incomplete,
                tests: Vec::new(),
                moisture_result: Outcome::Pending,
                deflection_result: Outcome::Pending,
                overall_result: Outcome::Pending,
                close_reason: None,
            };
            let key = RecordKey::form(&form.form_id, Partition::Active);
            if self.store().insert(&key, &to_record(&form)?)? {
                break form;
            }
            debug!(form_id = %form.form_id, "Form id taken, trying next sequence");
        };

        let entries = [
            (recent::INSPECTOR_NAME, form.inspector_name.as_str()),
            (recent::PROJECT_NO, form.project_no.as_str()),
            (recent::CONTRACT_NO, form.contract_no.as_str()),
        ];
        if let Err(err) = self.commit_recent(&entries) {
            warn!(form_id = %form.form_id, error = %err, "Rolling back form reservation");
            if let Err(remove_err) = self
                .store()
                .remove(&RecordKey::form(&form.form_id, Partition::Active))
            {
                warn!(form_id = %form.form_id, error = %remove_err, "Could not release form reservation");
            }
            return Err(err);
        }

        info!(form_id = %form.form_id, inspector = %form.inspector_name, "Form created");
        Ok(form)
    }

    fn commit_recent(&self, entries: &[(&str, &str)]) -> Result<()> {
        if let Some((values, record)) = self.stage_recent(entries)? {
            self.store().commit(&[record])?;
            self.adopt_recent(values);
        }
        Ok(())
    }

    // ── Edit header ─────────────────────────────────────────────────────────

    /// Replace the project, contract and curve fields of an open form.
    pub fn update_details(&self, form_id: &str, details: FormDetails) -> Result<Form> {
        let details = trimmed(details);
        let _guard = self.lock_writer();
        let mut form = self.editable_form(form_id)?;
        if form.status.is_terminal() {
            return Err(FieldTestError::InvalidTransition(format!(
                "form {form_id} is {} and can no longer be edited",
                form.status
            )));
        }
        if details.curve_name != form.curve_name && !form.tests.is_empty() {
            return Err(FieldTestError::InvalidTransition(format!(
                "form {form_id} already has tests evaluated against curve {}",
                form.curve_name
            )));
        }
        self.check_curve(&details.curve_name)?;

        form.project_no = details.project_no;
        form.contract_no = details.contract_no;
        form.curve_name = details.curve_name;
        form.last_update = self.now();

        let mut writes = vec![(RecordKey::form(form_id, Partition::Active), to_record(&form)?)];
        let staged = self.stage_recent(&[
            (recent::PROJECT_NO, form.project_no.as_str()),
            (recent::CONTRACT_NO, form.contract_no.as_str()),
        ])?;
        if let Some((_, record)) = &staged {
            writes.push(record.clone());
        }
        self.store().commit(&writes)?;
        if let Some((values, _)) = staged {
            self.adopt_recent(values);
        }
        info!(form_id, curve = %form.curve_name, "Form details updated");
        Ok(form)
    }

    // ── Submit test ─────────────────────────────────────────────────────────

    /// Evaluate `input` against the form's curve and record the result.
    pub fn submit_test(&self, form_id: &str, input: &TestInput) -> Result<Form> {
        let _guard = self.lock_writer();
        let mut form = self.editable_form(form_id)?;
        let kind = input.test_type();

        if form.status.is_terminal() {
            return Err(FieldTestError::InvalidTransition(format!(
                "form {form_id} is {}",
                form.status
            )));
        }
        if form.has_test(kind) {
            return Err(FieldTestError::InvalidTransition(format!(
                "form {form_id} already has a {kind} test"
            )));
        }
        if form.curve_name.is_empty() {
            return Err(FieldTestError::MissingCurve(format!(
                "form {form_id} has no curve assigned"
            )));
        }
        let curve = match self.curves().get(&form.curve_name, Partition::Active) {
            Ok(curve) => curve,
            Err(FieldTestError::NotFound(_)) => {
                return Err(FieldTestError::MissingCurve(form.curve_name.clone()))
            }
            Err(err) => return Err(err),
        };

        let test = evaluate(input, form_id, &curve)?;
        let test_key = RecordKey::test(form_id, test.test_id(), Partition::Active);
        let test_record = to_record(&test)?;
        let verdict = test.result();
        form.record_test(test, self.now());

        let mut writes = vec![
            (test_key, test_record),
            (RecordKey::form(form_id, Partition::Active), to_record(&form)?),
        ];
        let staged = self.stage_recent(&input.recent_fields())?;
        if let Some((_, record)) = &staged {
            writes.push(record.clone());
        }
        self.store().commit(&writes)?;
        if let Some((values, _)) = staged {
            self.adopt_recent(values);
        }

        info!(
            form_id,
            test = %kind,
            result = %verdict,
            overall = %form.overall_result,
            status = %form.status,
            "Test recorded"
        );
        Ok(form)
    }

    // ── Complete / close ────────────────────────────────────────────────────

    pub fn complete_form(&self, form_id: &str) -> Result<Form> {
        let _guard = self.lock_writer();
        let mut form = self.editable_form(form_id)?;
        if form.status != FormStatus::Pending {
            return Err(FieldTestError::InvalidTransition(format!(
                "only Pending forms can be completed; {form_id} is {}",
                form.status
            )));
        }
        form.status = FormStatus::Complete;
        form.last_update = self.now();
        self.store()
            .commit(&[(RecordKey::form(form_id, Partition::Active), to_record(&form)?)])?;
        info!(form_id, overall = %form.overall_result, "Form completed");
        Ok(form)
    }

    /// Close an open form with a reason. Closed forms take no more tests.
    pub fn close_form(&self, form_id: &str, reason: &str) -> Result<Form> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(FieldTestError::validation("close_reason"));
        }
        let _guard = self.lock_writer();
        let mut form = self.editable_form(form_id)?;
        if form.status.is_terminal() {
            return Err(FieldTestError::InvalidTransition(format!(
                "form {form_id} is already {}",
                form.status
            )));
        }
        form.status = FormStatus::Closed;
        form.close_reason = Some(reason.to_string());
        form.last_update = self.now();
        self.store()
            .commit(&[(RecordKey::form(form_id, Partition::Active), to_record(&form)?)])?;
        info!(form_id, reason, "Form closed");
        Ok(form)
    }
}

fn trimmed(details: FormDetails) -> FormDetails {
    FormDetails {
        project_no: details.project_no.trim().to_string(),
        contract_no: details.contract_no.trim().to_string(),
        curve_name: details.curve_name.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{DeflectionTest, MoistureTest, TestMethod};

    fn moisture(result: Verdict) -> Test {
        Test::Moisture(MoistureTest {
            test_id: "T1_M".into(),
            station: "1".into(),
            feet_cl: "2".into(),
            depth: String::new(),
            canister: String::new(),
            test_method: TestMethod::Oven,
            wet_weight: 200.0,
            intermediate_weights: vec![],
            dry_weight: 180.0,
            loss: 20.0,
            moisture_content: 10.0,
            result,
            notes: String::new(),
        })
    }

    fn deflection(result: Verdict) -> Test {
        Test::Deflection(DeflectionTest {
            test_id: "T1_D".into(),
            station: "1".into(),
            feet_cl: "2".into(),
            readings: vec![0.5],
            average_deflection: 0.5,
            result,
            notes: String::new(),
        })
    }

    #[test]
    fn test_overall_outcome() {
        assert_eq!(overall_outcome(&[]), Outcome::Pending);
        assert_eq!(overall_outcome(&[moisture(Verdict::Pass)]), Outcome::Pass);
        assert_eq!(overall_outcome(&[moisture(Verdict::Fail)]), Outcome::Fail);
        assert_eq!(
            overall_outcome(&[moisture(Verdict::Pass), deflection(Verdict::Fail)]),
            Outcome::Fail
        );
        assert_eq!(
            overall_outcome(&[moisture(Verdict::Pass), deflection(Verdict::Pass)]),
            Outcome::Pass
        );
    }
}
