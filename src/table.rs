//! Polars frames over forms, curves and tests, plus CSV export.

use std::fs::File;
use std::path::Path;

use chrono::NaiveDateTime;
use polars::datatypes::TimeUnit;
use polars::prelude::*;

use crate::error::Result;
use crate::listing::FormListing;
use crate::record::{Curve, Form};
use crate::schema::{curve, form, test};

fn datetime_column(name: &str, values: &[NaiveDateTime]) -> Result<Column> {
    let micros: Vec<i64> = values
        .iter()
        .map(|dt| dt.and_utc().timestamp_micros())
        .collect();
    let series = Series::new(name.into(), micros)
        .cast(&DataType::Datetime(TimeUnit::Microseconds, None))?;
    Ok(series.into())
}

/// One row per listed form, in listing order.
pub fn forms_frame(listing: &[FormListing]) -> Result<DataFrame> {
    let mut ids = Vec::with_capacity(listing.len());
    let mut statuses = Vec::with_capacity(listing.len());
    let mut inspectors = Vec::with_capacity(listing.len());
    let mut projects = Vec::with_capacity(listing.len());
    let mut contracts = Vec::with_capacity(listing.len());
    let mut curves = Vec::with_capacity(listing.len());
    let mut dates = Vec::with_capacity(listing.len());
    let mut updates = Vec::with_capacity(listing.len());
    let mut moisture = Vec::with_capacity(listing.len());
    let mut deflection = Vec::with_capacity(listing.len());
    let mut overall = Vec::with_capacity(listing.len());
    let mut staleness = Vec::with_capacity(listing.len());

    for FormListing { form: f, staleness: s } in listing {
        ids.push(f.form_id.clone());
        statuses.push(f.status.to_string());
        inspectors.push(f.inspector_name.clone());
        projects.push(f.project_no.clone());
        contracts.push(f.contract_no.clone());
        curves.push(f.curve_name.clone());
        dates.push(f.date);
        updates.push(f.last_update);
        moisture.push(f.moisture_result.to_string());
        deflection.push(f.deflection_result.to_string());
        overall.push(f.overall_result.to_string());
        staleness.push(s.to_string());
    }

    let df = DataFrame::new(vec![
        Column::new(form::FORM_ID.into(), &ids),
        Column::new(form::STATUS.into(), &statuses),
        Column::new(form::INSPECTOR_NAME.into(), &inspectors),
        Column::new(form::PROJECT_NO.into(), &projects),
        Column::new(form::CONTRACT_NO.into(), &contracts),
        Column::new(form::CURVE_NAME.into(), &curves),
        datetime_column(form::DATE, &dates)?,
        datetime_column(form::LAST_UPDATE, &updates)?,
        Column::new(form::MOISTURE_RESULT.into(), &moisture),
        Column::new(form::DEFLECTION_RESULT.into(), &deflection),
        Column::new(form::OVERALL_RESULT.into(), &overall),
        Column::new(form::STALENESS.into(), &staleness),
    ])?;
    Ok(df)
}

/// Curves with limits split into columns. Tolerance columns are null for
/// curves without a deflection tolerance.
pub fn curves_frame(curves: &[Curve]) -> Result<DataFrame> {
    let names: Vec<&str> = curves.iter().map(|c| c.name.as_str()).collect();
    let soil: Vec<&str> = curves.iter().map(|c| c.soil_type.as_str()).collect();
    let sources: Vec<&str> = curves.iter().map(|c| c.source.as_str()).collect();
    let samples: Vec<&str> = curves.iter().map(|c| c.sample_id.as_str()).collect();
    let ngi: Vec<&str> = curves.iter().map(|c| c.ngi.as_str()).collect();
    let dtv: Vec<f64> = curves.iter().map(|c| c.target_dtv).collect();
    let optimum: Vec<f64> = curves.iter().map(|c| c.optimum_moisture).collect();
    let lower: Vec<f64> = curves.iter().map(|c| c.moisture_limits.lower).collect();
    let upper: Vec<f64> = curves.iter().map(|c| c.moisture_limits.upper).collect();
    let d_target: Vec<Option<f64>> = curves
        .iter()
        .map(|c| c.deflection_tolerance.map(|t| t.target))
        .collect();
    let d_lower: Vec<Option<f64>> = curves
        .iter()
        .map(|c| c.deflection_tolerance.map(|t| t.limits.lower))
        .collect();
    let d_upper: Vec<Option<f64>> = curves
        .iter()
        .map(|c| c.deflection_tolerance.map(|t| t.limits.upper))
        .collect();
    let notes: Vec<&str> = curves.iter().map(|c| c.notes.as_str()).collect();

    let df = DataFrame::new(vec![
        Column::new(curve::NAME.into(), &names),
        Column::new(curve::SOIL_TYPE.into(), &soil),
        Column::new(curve::SOURCE.into(), &sources),
        Column::new(curve::SAMPLE_ID.into(), &samples),
        Column::new(curve::NGI.into(), &ngi),
        Column::new(curve::TARGET_DTV.into(), &dtv),
        Column::new(curve::OPTIMUM_MOISTURE.into(), &optimum),
        Column::new(curve::MOISTURE_LOWER.into(), &lower),
        Column::new(curve::MOISTURE_UPPER.into(), &upper),
        Column::new(curve::DEFLECTION_TARGET.into(), &d_target),
        Column::new(curve::DEFLECTION_LOWER.into(), &d_lower),
        Column::new(curve::DEFLECTION_UPPER.into(), &d_upper),
        Column::new(curve::NOTES.into(), &notes),
    ])?;
    Ok(df)
}

/// The form's embedded tests. `measured` is moisture % or mean deflection.
pub fn tests_frame(f: &Form) -> Result<DataFrame> {
    let ids: Vec<&str> = f.tests.iter().map(|t| t.test_id()).collect();
    let types: Vec<String> = f.tests.iter().map(|t| t.test_type().to_string()).collect();
    let stations: Vec<&str> = f.tests.iter().map(|t| t.station()).collect();
    let offsets: Vec<&str> = f.tests.iter().map(|t| t.feet_cl()).collect();
    let measured: Vec<f64> = f.tests.iter().map(|t| t.measured()).collect();
    let results: Vec<String> = f.tests.iter().map(|t| t.result().to_string()).collect();
    let notes: Vec<&str> = f.tests.iter().map(|t| t.notes()).collect();

    let df = DataFrame::new(vec![
        Column::new(test::TEST_ID.into(), &ids),
        Column::new(test::TYPE.into(), &types),
        Column::new(test::STATION.into(), &stations),
        Column::new(test::FEET_CL.into(), &offsets),
        Column::new(test::MEASURED.into(), &measured),
        Column::new(test::RESULT.into(), &results),
        Column::new(test::NOTES.into(), &notes),
    ])?;
    Ok(df)
}

/// Write `df` to `path` with a header row, replacing any existing file.
pub fn write_csv(df: &mut DataFrame, path: impl AsRef<Path>) -> Result<()> {
    let mut file = File::create(path.as_ref())?;
    CsvWriter::new(&mut file).include_header(true).finish(df)?;
    Ok(())
}
