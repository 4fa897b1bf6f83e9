//! Device session info and the admin passcode gate.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::curves::CurveInput;
use crate::error::{FieldTestError, Result};
use crate::model::FieldTestModel;
use crate::record::{Curve, Form, FormDetails, Inspector};
use crate::schema::layout;
use crate::store::{read_as, to_record, RecordKey, Store};

/// Who is operating the device today.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneralInfo {
    pub inspector_name: String,
    pub inspector_initials: String,
    pub district: String,
    /// Session start, `yyyymmdd_HHMM`.
    pub date: String,
}

impl GeneralInfo {
    pub fn inspector(&self) -> Inspector {
        Inspector {
            name: self.inspector_name.clone(),
            initials: self.inspector_initials.clone(),
        }
    }
}

/// Proof that the admin passcode was entered. Required by curve
/// administration.
#[derive(Debug)]
pub struct AdminGrant {
    _private: (),
}

#[derive(Debug, Serialize, Deserialize)]
struct Passcodes {
    admin_sha256: String,
}

fn digest(passcode: &str) -> String {
    hex::encode(Sha256::digest(passcode.as_bytes()))
}

impl<S: Store> FieldTestModel<S> {
    pub fn save_general_info(
        &self,
        inspector_name: &str,
        inspector_initials: &str,
        district: &str,
    ) -> Result<GeneralInfo> {
        let inspector_name = inspector_name.trim();
        if inspector_name.is_empty() {
            return Err(FieldTestError::validation("inspector_name"));
        }
        let initials = inspector_initials.trim().to_ascii_uppercase();
        if initials.is_empty() || !initials.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(FieldTestError::validation("inspector_initials"));
        }
        let info = GeneralInfo {
            inspector_name: inspector_name.to_string(),
            inspector_initials: initials,
            district: district.trim().to_string(),
            date: self.now().format("%Y%m%d_%H%M").to_string(),
        };
        self.store()
            .commit(&[(RecordKey::setting(layout::GENERAL_INFO), to_record(&info)?)])?;
        info!(inspector = %info.inspector_name, district = %info.district, "Session info saved");
        Ok(info)
    }

    pub fn general_info(&self) -> Result<GeneralInfo> {
        read_as(self.store(), &RecordKey::setting(layout::GENERAL_INFO))?
            .ok_or_else(|| FieldTestError::NotFound("general info".into()))
    }

    /// Create a form for the inspector recorded in the session info.
    pub fn create_form_for_session(&self, details: FormDetails) -> Result<Form> {
        let info = self.general_info()?;
        self.create_form(&info.inspector(), details)
    }

    // ── Admin ───────────────────────────────────────────────────────────────

    pub fn authorize_admin(&self, passcode: &str) -> Result<AdminGrant> {
        if digest(passcode) != self.admin_digest()? {
            warn!("Admin passcode rejected");
            return Err(FieldTestError::Unauthorized);
        }
        Ok(AdminGrant { _private: () })
    }

    /// Replace the admin passcode. Needs the master passcode.
    pub fn change_admin_passcode(&self, master: &str, new_passcode: &str) -> Result<()> {
        if digest(master) != self.config().master_passcode_sha256 {
            warn!("Master passcode rejected");
            return Err(FieldTestError::Unauthorized);
        }
        if new_passcode.trim().is_empty() {
            return Err(FieldTestError::validation("passcode"));
        }
        let record = Passcodes {
            admin_sha256: digest(new_passcode),
        };
        self.store()
            .commit(&[(RecordKey::setting(layout::PASSCODES), to_record(&record)?)])?;
        info!("Admin passcode changed");
        Ok(())
    }

    fn admin_digest(&self) -> Result<String> {
        let stored: Option<Passcodes> =
            read_as(self.store(), &RecordKey::setting(layout::PASSCODES))?;
        Ok(stored
            .map(|p| p.admin_sha256)
            .unwrap_or_else(|| self.config().admin_passcode_sha256.clone()))
    }

    /// Parse the admin's input and add the curve to the active partition.
    pub fn create_curve(&self, _grant: &AdminGrant, input: &CurveInput) -> Result<Curve> {
        let curve = input.parse()?;
        let _guard = self.lock_writer();
        self.curves().create(&curve)?;
        Ok(curve)
    }
}
