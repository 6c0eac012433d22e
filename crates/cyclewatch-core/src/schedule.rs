//! Schedule loading.
//!
//! A [`ScheduleSource`] hands back the raw [`CycleTable`]; [`load`] validates
//! every entry, derives its occurrence table and, if the source is missing or
//! unreadable, regenerates the canonical default and retries once.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::TimeDelta;
use tracing::{info, warn};
use uuid::Uuid;

use crate::cycle::{CycleDefinition, CycleTable, OccurrenceTable};
use crate::error::{ScheduleLoadError, ValidationError};
use crate::storage::data_dir;

/// File name of the schedule inside the data directory.
pub const SCHEDULE_FILE: &str = "cycles.toml";

/// Where a schedule comes from.
pub trait ScheduleSource {
    /// Human-readable location, for logs.
    fn describe(&self) -> String;

    fn load(&self) -> Result<CycleTable, ScheduleLoadError>;

    /// Replace the stored schedule with [`CycleTable::canonical`].
    fn regenerate(&self) -> Result<(), ScheduleLoadError>;
}

/// Schedule stored as a TOML file.
#[derive(Debug, Clone)]
pub struct TomlFileSource {
    path: PathBuf,
}

impl TomlFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `cycles.toml` in the data directory.
    pub fn default_location() -> std::io::Result<Self> {
        Ok(Self::new(data_dir()?.join(SCHEDULE_FILE)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ScheduleSource for TomlFileSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn load(&self) -> Result<CycleTable, ScheduleLoadError> {
        let content = std::fs::read_to_string(&self.path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ScheduleLoadError::Missing {
                    path: self.path.clone(),
                }
            } else {
                ScheduleLoadError::ReadFailed {
                    path: self.path.clone(),
                    source,
                }
            }
        })?;
        CycleTable::from_toml_str(&content)
    }

    fn regenerate(&self) -> Result<(), ScheduleLoadError> {
        let content = CycleTable::canonical().to_toml_string()?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ScheduleLoadError::RegenerateFailed(e.to_string()))?;
        }
        std::fs::write(&self.path, content)
            .map_err(|e| ScheduleLoadError::RegenerateFailed(e.to_string()))
    }
}

/// Schedule held in memory as TOML text.
#[derive(Debug, Default)]
pub struct InlineSource {
    content: Mutex<Option<String>>,
}

impl InlineSource {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: Mutex::new(Some(content.into())),
        }
    }

    /// A source with nothing in it yet.
    pub fn empty() -> Self {
        Self::default()
    }
}

impl ScheduleSource for InlineSource {
    fn describe(&self) -> String {
        "<inline>".to_string()
    }

    fn load(&self) -> Result<CycleTable, ScheduleLoadError> {
        let guard = self
            .content
            .lock()
            .map_err(|_| ScheduleLoadError::ParseFailed("inline source poisoned".into()))?;
        match guard.as_deref() {
            Some(content) => CycleTable::from_toml_str(content),
            None => Err(ScheduleLoadError::Missing {
                path: PathBuf::from("<inline>"),
            }),
        }
    }

    fn regenerate(&self) -> Result<(), ScheduleLoadError> {
        let content = CycleTable::canonical().to_toml_string()?;
        let mut guard = self
            .content
            .lock()
            .map_err(|_| ScheduleLoadError::RegenerateFailed("inline source poisoned".into()))?;
        *guard = Some(content);
        Ok(())
    }
}

/// A validated cycle together with its derived occurrences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedCycle {
    pub definition: CycleDefinition,
    pub occurrences: OccurrenceTable,
}

/// An entry that was excluded from tracking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleWarning {
    pub cycle_id: Uuid,
    pub cycle_name: String,
    pub error: ValidationError,
}

impl std::fmt::Display for ScheduleWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cycle '{}' ({}) skipped: {}", self.cycle_name, self.cycle_id, self.error)
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoadedSchedule {
    pub cycles: Vec<TrackedCycle>,
    pub warnings: Vec<ScheduleWarning>,
}

/// Load and validate a schedule, regenerating the default once on failure.
///
/// # Errors
///
/// Returns the error of the second attempt if the regenerated schedule
/// cannot be loaded either, or the regeneration error itself.
pub fn load(source: &dyn ScheduleSource) -> Result<LoadedSchedule, ScheduleLoadError> {
    info!("Loading cycle schedule from {}", source.describe());
    let table = match source.load() {
        Ok(table) => table,
        Err(err) => {
            warn!("Error loading cycle schedule ({err}), re-creating default");
            source.regenerate()?;
            source.load()?
        }
    };
    let loaded = build(table);
    info!(
        "Loaded {} cycles ({} skipped)",
        loaded.cycles.len(),
        loaded.warnings.len()
    );
    Ok(loaded)
}

/// Validate every entry of `table` and derive occurrence tables. Invalid
/// entries are excluded and reported as warnings.
pub fn build(table: CycleTable) -> LoadedSchedule {
    let mut loaded = LoadedSchedule::default();
    let mut seen = HashSet::new();

    for definition in table.cycles {
        let result = validate(&definition, &seen);
        match result {
            Ok(occurrences) => {
                seen.insert(definition.id);
                loaded.cycles.push(TrackedCycle {
                    definition,
                    occurrences,
                });
            }
            Err(error) => {
                let warning = ScheduleWarning {
                    cycle_id: definition.id,
                    cycle_name: definition.name,
                    error,
                };
                warn!("{warning}");
                loaded.warnings.push(warning);
            }
        }
    }
    loaded
}

fn validate(
    definition: &CycleDefinition,
    seen: &HashSet<Uuid>,
) -> Result<OccurrenceTable, ValidationError> {
    if seen.contains(&definition.id) {
        return Err(ValidationError::DuplicateId(definition.id));
    }
    if definition.length < TimeDelta::zero() {
        return Err(ValidationError::NegativeLength {
            length_secs: definition.length.num_seconds(),
        });
    }
    OccurrenceTable::generate(definition.delay, definition.recurrence)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_CYCLES: &str = r#"
[[cycle]]
name = "Dry Top Crash"
id = "6d0a1c3e-5b1f-4a2e-9c10-00000000000c"
map_id = 988
waypoint_code = "[&BIAHAAA=]"
length = "00:40:00"
recurrence = "01:00:00"
delay = "00:00:00"

[[cycle]]
name = "Broken"
id = "00000000-0000-0000-0000-0000000000ff"
map_id = 1
length = "00:10:00"
recurrence = "01:00:00"
delay = "02:00:00"
"#;

    #[test]
    fn invalid_entry_is_excluded_with_warning() {
        let loaded = load(&InlineSource::new(TWO_CYCLES)).unwrap();
        assert_eq!(loaded.cycles.len(), 1);
        assert_eq!(loaded.cycles[0].definition.waypoint_code, "[&BIAHAAA=]");
        assert_eq!(loaded.cycles[0].occurrences.len(), 24);
        assert_eq!(loaded.warnings.len(), 1);
        assert_eq!(loaded.warnings[0].cycle_name, "Broken");
        assert!(matches!(
            loaded.warnings[0].error,
            ValidationError::DelayNotBelowRecurrence { .. }
        ));
    }

    #[test]
    fn duplicate_ids_keep_first() {
        let mut table = CycleTable::canonical();
        let mut dup = table.cycles[0].clone();
        dup.name = "Copy".into();
        table.cycles.push(dup);
        let loaded = build(table);
        assert_eq!(loaded.cycles.len(), 13);
        assert!(matches!(loaded.warnings[0].error, ValidationError::DuplicateId(_)));
    }

    #[test]
    fn negative_length_is_rejected() {
        let mut table = CycleTable::canonical();
        table.cycles[0].length = TimeDelta::minutes(-5);
        let loaded = build(table);
        assert_eq!(loaded.cycles.len(), 12);
        assert!(matches!(loaded.warnings[0].error, ValidationError::NegativeLength { .. }));
    }

    #[test]
    fn missing_source_regenerates_default() {
        let source = InlineSource::empty();
        let loaded = load(&source).unwrap();
        assert_eq!(loaded.cycles.len(), 13);
        assert!(loaded.warnings.is_empty());
        // Second load reads the regenerated content directly.
        assert_eq!(source.load().unwrap(), CycleTable::canonical());
    }

    #[test]
    fn unparsable_source_regenerates_default() {
        let loaded = load(&InlineSource::new("this is not toml [[")).unwrap();
        assert_eq!(loaded.cycles.len(), 13);
    }

    #[test]
    fn out_of_range_duration_regenerates_default() {
        let source = InlineSource::new(
            r#"
[[cycle]]
name = "Huge"
id = "00000000-0000-0000-0000-0000000000ee"
map_id = 1
length = "100000000000000:00:00"
recurrence = "01:00:00"
delay = "00:00:00"
"#,
        );
        assert!(matches!(source.load(), Err(ScheduleLoadError::ParseFailed(_))));

        let loaded = load(&source).unwrap();
        assert_eq!(loaded.cycles.len(), 13);
        assert_eq!(source.load().unwrap(), CycleTable::canonical());
    }

    struct AlwaysBroken;

    impl ScheduleSource for AlwaysBroken {
        fn describe(&self) -> String {
            "broken".into()
        }
        fn load(&self) -> Result<CycleTable, ScheduleLoadError> {
            Err(ScheduleLoadError::ParseFailed("nope".into()))
        }
        fn regenerate(&self) -> Result<(), ScheduleLoadError> {
            Ok(())
        }
    }

    #[test]
    fn second_failure_is_fatal() {
        let err = load(&AlwaysBroken).unwrap_err();
        assert!(matches!(err, ScheduleLoadError::ParseFailed(_)));
    }
}
