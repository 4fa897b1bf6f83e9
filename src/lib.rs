//! Field-test inspection engine: compaction curves, moisture and deflection
//! test evaluation, and the inspection form lifecycle.
//!
//! The engine is driven through [`FieldTestModel`]. With the `python`
//! feature the same model is exposed to a Python front-end as
//! `_core.FieldTests`.

mod archive;
mod clock;
mod config;
mod curves;
mod error;
mod evaluator;
mod forms;
mod fs_store;
mod listing;
mod model;
mod recent;
mod record;
mod report;
mod session;
mod store;

pub mod schema;
pub mod table;

#[cfg(feature = "python")]
mod python;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{EngineConfig, StalenessConfig};
pub use curves::{CurveInput, CurveRepository};
pub use error::{FieldTestError, Result};
pub use evaluator::{
    evaluate, moisture_content, DeflectionInput, Evaluable, MoistureInput, TestInput,
    MAX_INTERMEDIATE_WEIGHTS,
};
pub use forms::overall_outcome;
pub use fs_store::FsStore;
pub use listing::{FormListing, Staleness};
pub use model::FieldTestModel;
pub use recent::RecentValues;
pub use record::{
    Curve, DeflectionTest, DeflectionTolerance, Form, FormDetails, FormStatus, Inspector,
    Limits, MoistureTest, Outcome, Partition, Test, TestMethod, TestType, Verdict,
    BOUNDARY_EPSILON,
};
pub use report::ResolvedForm;
pub use session::{AdminGrant, GeneralInfo};
pub use store::{MemoryStore, RecordKey, RecordKind, Store};
