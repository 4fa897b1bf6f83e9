#![allow(dead_code)]

use std::sync::Arc;

use _core::{
    CurveInput, DeflectionInput, EngineConfig, FieldTestModel, FormDetails, Inspector,
    ManualClock, MoistureInput, Store, TestInput,
};
use chrono::{NaiveDate, NaiveDateTime};

pub const ADMIN: &str = "1984";

pub fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, day)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

pub fn engine<S: Store>(store: S) -> (FieldTestModel<S>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(at(1, 8, 30)));
    let model = FieldTestModel::with_store(EngineConfig::default(), store).with_clock(clock.clone());
    (model, clock)
}

pub fn clay_curve(name: &str) -> CurveInput {
    CurveInput {
        name: name.into(),
        soil_type: "Silty clay".into(),
        source: "Borrow pit 4".into(),
        sample_id: "S-12".into(),
        ngi: "NGI-7".into(),
        target_dtv: "110.5".into(),
        optimum_moisture: "12.0".into(),
        lower_limit: "-2.0".into(),
        upper_limit: "2.0".into(),
        deflection_target: "0.50".into(),
        deflection_lower: "-0.10".into(),
        deflection_upper: "0.10".into(),
        notes: String::new(),
    }
}

pub fn add_curve<S: Store>(model: &FieldTestModel<S>, name: &str) {
    let grant = model.authorize_admin(ADMIN).unwrap();
    model.create_curve(&grant, &clay_curve(name)).unwrap();
}

pub fn jordan() -> Inspector {
    Inspector {
        name: "Jordan Lee".into(),
        initials: "JL".into(),
    }
}

pub fn details(curve_name: &str) -> FormDetails {
    FormDetails {
        project_no: "P-2024-17".into(),
        contract_no: "C-881".into(),
        curve_name: curve_name.into(),
    }
}

pub fn moisture(wet: &str, dry: &str) -> TestInput {
    TestInput::Moisture(MoistureInput {
        station: "12+50".into(),
        feet_cl: "6 LT".into(),
        depth: "6".into(),
        canister: "C3".into(),
        test_method: "Oven".into(),
        wet_weight: wet.into(),
        intermediate_weights: vec!["195".into(), "188".into()],
        dry_weight: dry.into(),
        notes: String::new(),
    })
}

pub fn deflection(readings: &[&str]) -> TestInput {
    TestInput::Deflection(DeflectionInput {
        station: "12+75".into(),
        feet_cl: "4 RT".into(),
        readings: readings.iter().map(|r| r.to_string()).collect(),
        notes: String::new(),
    })
}
