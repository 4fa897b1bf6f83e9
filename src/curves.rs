//! Curve repository: immutable compaction targets keyed by name.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{FieldTestError, Result};
use crate::record::{Curve, DeflectionTolerance, Limits, Partition};
use crate::store::{read_as, to_record, RecordKey, RecordKind, Store};

pub struct CurveRepository<'a, S: Store + ?Sized> {
    store: &'a S,
}

impl<'a, S: Store + ?Sized> CurveRepository<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Curves in `partition`, read lazily. Every call rescans the store.
    pub fn list(&self, partition: Partition) -> Result<impl Iterator<Item = Result<Curve>> + 'a> {
        let store = self.store;
        let names = store.ids(&RecordKind::Curve, partition)?;
        debug!(%partition, count = names.len(), "Listing curves");
        Ok(names.into_iter().filter_map(move |name| {
            // A curve archived mid-iteration is simply skipped.
            read_as::<Curve, S>(store, &RecordKey::curve(&name, partition)).transpose()
        }))
    }

    pub fn get(&self, name: &str, partition: Partition) -> Result<Curve> {
        read_as(self.store, &RecordKey::curve(name, partition))?
            .ok_or_else(|| FieldTestError::NotFound(format!("curve {name} ({partition})")))
    }

    pub fn exists(&self, name: &str, partition: Partition) -> Result<bool> {
        Ok(self
            .store
            .read(&RecordKey::curve(name, partition))?
            .is_some())
    }

    /// Active copy first, then archived.
    pub fn resolve(&self, name: &str) -> Result<Option<(Curve, Partition)>> {
        for partition in [Partition::Active, Partition::Archived] {
            if let Some(curve) = read_as(self.store, &RecordKey::curve(name, partition))? {
                return Ok(Some((curve, partition)));
            }
        }
        Ok(None)
    }

    pub fn create(&self, curve: &Curve) -> Result<()> {
        validate(curve)?;
        if self.exists(&curve.name, Partition::Archived)? {
            return Err(FieldTestError::DuplicateName(curve.name.clone()));
        }
        let key = RecordKey::curve(&curve.name, Partition::Active);
        if !self.store.insert(&key, &to_record(curve)?)? {
            return Err(FieldTestError::DuplicateName(curve.name.clone()));
        }
        info!(curve = %curve.name, "Curve created");
        Ok(())
    }

    /// Move a curve from active to archived in one step.
    pub fn archive(&self, name: &str) -> Result<()> {
        let key = RecordKey::curve(name, Partition::Active);
        if self.store.read(&key)?.is_none() {
            return Err(FieldTestError::NotFound(format!("curve {name} (active)")));
        }
        self.store.relocate(&key, Partition::Archived)?;
        info!(curve = %name, "Curve archived");
        Ok(())
    }

    /// Case-insensitive match over `name | source | sample_id | ngi`.
    pub fn search(&self, partition: Partition, query: &str) -> Result<Vec<Curve>> {
        let needle = query.trim().to_lowercase();
        let mut found = Vec::new();
        for curve in self.list(partition)? {
            let curve = curve?;
            if needle.is_empty() || curve.display_line().to_lowercase().contains(&needle) {
                found.push(curve);
            }
        }
        Ok(found)
    }
}

fn validate(curve: &Curve) -> Result<()> {
    let name = curve.name.trim();
    if name.is_empty()
        || name != curve.name
        || name.contains(['/', '\\'])
        || name.starts_with('.')
        || name.ends_with(".tmp")
    {
        return Err(FieldTestError::validation("name"));
    }
    if !(curve.target_dtv.is_finite() && curve.optimum_moisture.is_finite()) {
        return Err(FieldTestError::InvalidMeasurement(
            "curve values must be finite".into(),
        ));
    }
    check_limits("moisture_limits", &curve.moisture_limits)?;
    if let Some(tolerance) = &curve.deflection_tolerance {
        if !tolerance.target.is_finite() {
            return Err(FieldTestError::InvalidMeasurement(
                "deflection target must be finite".into(),
            ));
        }
        check_limits("deflection_tolerance", &tolerance.limits)?;
    }
    Ok(())
}

fn check_limits(field: &str, limits: &Limits) -> Result<()> {
    if !(limits.lower.is_finite() && limits.upper.is_finite()) || limits.lower > limits.upper {
        return Err(FieldTestError::validation(field));
    }
    Ok(())
}

/// Curve fields as typed on the admin screen.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurveInput {
    pub name: String,
    pub soil_type: String,
    pub source: String,
    pub sample_id: String,
    pub ngi: String,
    pub target_dtv: String,
    pub optimum_moisture: String,
    pub lower_limit: String,
    pub upper_limit: String,
    /// Leave all three deflection fields blank for a moisture-only curve.
    pub deflection_target: String,
    pub deflection_lower: String,
    pub deflection_upper: String,
    pub notes: String,
}

impl CurveInput {
    pub fn parse(&self) -> Result<Curve> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(FieldTestError::validation("name"));
        }

        let deflection = [
            &self.deflection_target,
            &self.deflection_lower,
            &self.deflection_upper,
        ];
        let deflection_tolerance = if deflection.iter().all(|v| v.trim().is_empty()) {
            None
        } else {
            Some(DeflectionTolerance {
                target: number("deflection_target", &self.deflection_target)?,
                limits: Limits::new(
                    number("deflection_lower", &self.deflection_lower)?,
                    number("deflection_upper", &self.deflection_upper)?,
                ),
            })
        };

        let curve = Curve {
            name: name.to_string(),
            soil_type: self.soil_type.trim().to_string(),
            source: self.source.trim().to_string(),
            sample_id: self.sample_id.trim().to_string(),
            ngi: self.ngi.trim().to_string(),
            target_dtv: number("target_dtv", &self.target_dtv)?,
            optimum_moisture: number("optimum_moisture", &self.optimum_moisture)?,
            moisture_limits: Limits::new(
                number("lower_limit", &self.lower_limit)?,
                number("upper_limit", &self.upper_limit)?,
            ),
            deflection_tolerance,
            notes: self.notes.trim().to_string(),
        };
        validate(&curve)?;
        Ok(curve)
    }
}

fn number(field: &str, raw: &str) -> Result<f64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(FieldTestError::validation(field));
    }
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(FieldTestError::InvalidMeasurement(format!(
            "{field} is not a number: {raw:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn input(name: &str) -> CurveInput {
        CurveInput {
            name: name.into(),
            soil_type: "Silty Clay".into(),
            source: "Pit 4".into(),
            sample_id: "S-19".into(),
            ngi: "N1".into(),
            target_dtv: "118.5".into(),
            optimum_moisture: "12".into(),
            lower_limit: "-2".into(),
            upper_limit: "2".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_moisture_only_curve() {
        let curve = input(" A-1 ").parse().unwrap();
        assert_eq!(curve.name, "A-1");
        assert_eq!(curve.moisture_limits, Limits::new(-2.0, 2.0));
        assert!(curve.deflection_tolerance.is_none());
    }

    #[test]
    fn test_parse_rejects_inverted_limits() {
        let mut raw = input("A-1");
        raw.lower_limit = "3".into();
        assert!(matches!(
            raw.parse(),
            Err(FieldTestError::Validation { field }) if field == "moisture_limits"
        ));
    }

    #[test]
    fn test_parse_partial_deflection_fields() {
        let mut raw = input("A-1");
        raw.deflection_target = "0.5".into();
        assert!(matches!(
            raw.parse(),
            Err(FieldTestError::Validation { field }) if field == "deflection_lower"
        ));
    }

    #[test]
    fn test_scratch_file_names_are_rejected() {
        assert!(matches!(
            input("x.tmp").parse(),
            Err(FieldTestError::Validation { field }) if field == "name"
        ));

        let store = MemoryStore::new();
        let repo = CurveRepository::new(&store);
        let mut curve = input("A-1").parse().unwrap();
        curve.name = "x.tmp".into();
        assert!(matches!(
            repo.create(&curve),
            Err(FieldTestError::Validation { field }) if field == "name"
        ));
        assert!(repo.list(Partition::Active).unwrap().next().is_none());
    }

    #[test]
    fn test_create_then_get_and_duplicate() {
        let store = MemoryStore::new();
        let repo = CurveRepository::new(&store);
        let curve = input("A-1").parse().unwrap();
        repo.create(&curve).unwrap();
        assert_eq!(repo.get("A-1", Partition::Active).unwrap(), curve);
        assert!(matches!(
            repo.create(&curve),
            Err(FieldTestError::DuplicateName(_))
        ));
    }

    #[test]
    fn test_duplicate_checks_archived_partition() {
        let store = MemoryStore::new();
        let repo = CurveRepository::new(&store);
        let curve = input("A-1").parse().unwrap();
        repo.create(&curve).unwrap();
        repo.archive("A-1").unwrap();
        assert!(matches!(
            repo.create(&curve),
            Err(FieldTestError::DuplicateName(_))
        ));
    }

    #[test]
    fn test_archive_is_a_move() {
        let store = MemoryStore::new();
        let repo = CurveRepository::new(&store);
        let curve = input("X").parse().unwrap();
        repo.create(&curve).unwrap();
        repo.archive("X").unwrap();

        assert!(matches!(
            repo.get("X", Partition::Active),
            Err(FieldTestError::NotFound(_))
        ));
        assert_eq!(repo.get("X", Partition::Archived).unwrap(), curve);
        assert!(matches!(repo.archive("X"), Err(FieldTestError::NotFound(_))));
    }

    #[test]
    fn test_list_reflects_latest_state() {
        let store = MemoryStore::new();
        let repo = CurveRepository::new(&store);
        repo.create(&input("B").parse().unwrap()).unwrap();
        repo.create(&input("A").parse().unwrap()).unwrap();

        let names: Vec<String> = repo
            .list(Partition::Active)
            .unwrap()
            .map(|c| c.unwrap().name)
            .collect();
        assert_eq!(names, vec!["A", "B"]);

        repo.archive("A").unwrap();
        assert_eq!(repo.list(Partition::Active).unwrap().count(), 1);
        assert_eq!(repo.list(Partition::Archived).unwrap().count(), 1);
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let store = MemoryStore::new();
        let repo = CurveRepository::new(&store);
        repo.create(&input("A-1").parse().unwrap()).unwrap();
        let mut other = input("B-2");
        other.source = "River Bar".into();
        repo.create(&other.parse().unwrap()).unwrap();

        let hits = repo.search(Partition::Active, "river").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "B-2");
        assert_eq!(repo.search(Partition::Active, "").unwrap().len(), 2);
    }
}
