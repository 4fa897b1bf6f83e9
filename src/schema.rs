/// Column and field-name constants for fieldtests frames and records.
/// Single source of truth - exported to Python via PyO3.

// ── Form listing columns ────────────────────────────────────────────────────
pub mod form {
    pub const FORM_ID: &str = "form_id";
    pub const STATUS: &str = "status";
    pub const INSPECTOR_NAME: &str = "inspector_name";
    pub const PROJECT_NO: &str = "project_no";
    pub const CONTRACT_NO: &str = "contract_no";
    pub const CURVE_NAME: &str = "curve_name";
    pub const DATE: &str = "date";
    pub const LAST_UPDATE: &str = "last_update";
    pub const MOISTURE_RESULT: &str = "moisture_result";
    pub const DEFLECTION_RESULT: &str = "deflection_result";
    pub const OVERALL_RESULT: &str = "overall_result";
    pub const STALENESS: &str = "staleness";
}

// ── Curve columns ───────────────────────────────────────────────────────────
pub mod curve {
    pub const NAME: &str = "name";
    pub const SOIL_TYPE: &str = "soil_type";
    pub const SOURCE: &str = "source";
    pub const SAMPLE_ID: &str = "sample_id";
    pub const NGI: &str = "ngi";
    pub const TARGET_DTV: &str = "target_dtv";
    pub const OPTIMUM_MOISTURE: &str = "optimum_moisture";
    pub const MOISTURE_LOWER: &str = "moisture_lower";
    pub const MOISTURE_UPPER: &str = "moisture_upper";
    pub const DEFLECTION_TARGET: &str = "deflection_target";
    pub const DEFLECTION_LOWER: &str = "deflection_lower";
    pub const DEFLECTION_UPPER: &str = "deflection_upper";
    pub const NOTES: &str = "notes";
}

// ── Test columns ────────────────────────────────────────────────────────────
pub mod test {
    pub const TEST_ID: &str = "test_id";
    pub const TYPE: &str = "type";
    pub const STATION: &str = "station";
    pub const FEET_CL: &str = "feet_cl";
    pub const MEASURED: &str = "measured";
    pub const RESULT: &str = "result";
    pub const NOTES: &str = "notes";
}

// ── Recent-value cache fields ───────────────────────────────────────────────
pub mod recent {
    pub const STATION: &str = "station";
    pub const FEET_CL: &str = "feet_cl";
    pub const CANISTER: &str = "canister";
    pub const INSPECTOR_NAME: &str = "inspector_name";
    pub const PROJECT_NO: &str = "project_no";
    pub const CONTRACT_NO: &str = "contract_no";

    pub const ALL: [&str; 6] = [
        STATION,
        FEET_CL,
        CANISTER,
        INSPECTOR_NAME,
        PROJECT_NO,
        CONTRACT_NO,
    ];
}

// ── On-disk layout ──────────────────────────────────────────────────────────
pub mod layout {
    pub const CURVES_DIR: &str = "Curves";
    pub const ARCHIVED_CURVES_DIR: &str = "ArchivedCurves";
    pub const FORMS_DIR: &str = "Forms";
    pub const ARCHIVED_FORMS_DIR: &str = "ArchivedForms";
    pub const TESTS_DIR: &str = "Tests";
    pub const FORM_FILE: &str = "form.json";

    pub const RECENT_ENTRIES: &str = "recent_entries";
    pub const GENERAL_INFO: &str = "general_info";
    pub const PASSCODES: &str = "passcodes";
}
