//! End-of-life moves from the active to the archived partition.

use std::collections::BTreeSet;

use tracing::{info, warn};

use crate::error::{FieldTestError, Result};
use crate::model::FieldTestModel;
use crate::record::Partition;
use crate::session::AdminGrant;
use crate::store::{RecordKey, Store};

impl<S: Store> FieldTestModel<S> {
    /// Archive Complete or Closed forms together with their test records.
    ///
    /// Every target is checked before anything moves, so one ineligible id
    /// leaves all of them in place.
    pub fn archive_forms(&self, form_ids: &[&str]) -> Result<()> {
        let _guard = self.lock_writer();
        let mut seen = BTreeSet::new();
        let form_ids: Vec<&str> = form_ids
            .iter()
            .copied()
            .filter(|form_id| seen.insert(*form_id))
            .collect();
        for &form_id in &form_ids {
            let (form, partition) = self.locate_form(form_id)?;
            if partition == Partition::Archived {
                warn!(form_id, "Form is already archived");
                return Err(FieldTestError::ReadOnlyArchive(format!("form {form_id}")));
            }
            if !form.status.is_terminal() {
                warn!(form_id, status = %form.status, "Refusing to archive open form");
                return Err(FieldTestError::InvalidState(format!(
                    "form {form_id} is {}; only Complete or Closed forms can be archived",
                    form.status
                )));
            }
        }
        for &form_id in &form_ids {
            self.store()
                .relocate(&RecordKey::form(form_id, Partition::Active), Partition::Archived)?;
            info!(form_id, "Form archived");
        }
        Ok(())
    }

    /// Archive a curve no open form still depends on.
    pub fn archive_curve(&self, _grant: &AdminGrant, name: &str) -> Result<()> {
        let _guard = self.lock_writer();
        let curves = self.curves();
        if curves.exists(name, Partition::Archived)? {
            warn!(curve = %name, "Curve is already archived");
            return Err(FieldTestError::ReadOnlyArchive(format!("curve {name}")));
        }
        let open: Vec<String> = self
            .forms_in(Partition::Active)?
            .into_iter()
            .filter(|form| form.curve_name == name && !form.status.is_terminal())
            .map(|form| form.form_id)
            .collect();
        if !open.is_empty() {
            warn!(curve = %name, forms = ?open, "Curve still in use");
            return Err(FieldTestError::CurveInUse(format!(
                "{name} is referenced by {}",
                open.join(", ")
            )));
        }
        curves.archive(name)
    }
}
