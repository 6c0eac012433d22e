//! Schedule table: the static definition of every tracked cycle.
//!
//! The table is serialized as TOML with one `[[cycle]]` entry per cycle.
//! Durations are written as `"HH:MM:SS"` strings.

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ScheduleLoadError;

/// Well-known identifiers of the canonical cycles.
pub mod ids {
    use uuid::Uuid;

    pub const VERDANT_BRINK_DAY: Uuid = Uuid::from_u128(0x6d0a1c3e_5b1f_4a2e_9c10_000000000001);
    pub const VERDANT_BRINK_NIGHT: Uuid = Uuid::from_u128(0x6d0a1c3e_5b1f_4a2e_9c10_000000000002);
    pub const VERDANT_BRINK_NIGHT_BOSSES: Uuid =
        Uuid::from_u128(0x6d0a1c3e_5b1f_4a2e_9c10_000000000003);
    pub const AURIC_BASIN_PILLARS: Uuid = Uuid::from_u128(0x6d0a1c3e_5b1f_4a2e_9c10_000000000004);
    pub const AURIC_BASIN_CHALLENGES: Uuid =
        Uuid::from_u128(0x6d0a1c3e_5b1f_4a2e_9c10_000000000005);
    pub const AURIC_BASIN_OCTOVINE: Uuid = Uuid::from_u128(0x6d0a1c3e_5b1f_4a2e_9c10_000000000006);
    pub const AURIC_BASIN_RESET: Uuid = Uuid::from_u128(0x6d0a1c3e_5b1f_4a2e_9c10_000000000007);
    pub const TANGLED_DEPTHS_OUTPOSTS: Uuid =
        Uuid::from_u128(0x6d0a1c3e_5b1f_4a2e_9c10_000000000008);
    pub const TANGLED_DEPTHS_PREP: Uuid = Uuid::from_u128(0x6d0a1c3e_5b1f_4a2e_9c10_000000000009);
    pub const TANGLED_DEPTHS_GERENT: Uuid =
        Uuid::from_u128(0x6d0a1c3e_5b1f_4a2e_9c10_00000000000a);
    pub const DRAGONS_STAND_START: Uuid = Uuid::from_u128(0x6d0a1c3e_5b1f_4a2e_9c10_00000000000b);
    pub const DRY_TOP_CRASH: Uuid = Uuid::from_u128(0x6d0a1c3e_5b1f_4a2e_9c10_00000000000c);
    pub const DRY_TOP_SANDSTORM: Uuid = Uuid::from_u128(0x6d0a1c3e_5b1f_4a2e_9c10_00000000000d);
}

/// One recurring in-world event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleDefinition {
    pub name: String,
    pub id: Uuid,
    /// Region/zone the cycle takes place in.
    pub map_id: u32,
    /// Display name of the zone, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_name: Option<String>,
    /// Chat/location code, passed through unmodified.
    #[serde(default)]
    pub waypoint_code: String,
    /// Duration of the active phase.
    #[serde(with = "hms")]
    pub length: TimeDelta,
    /// Spacing between occurrence starts.
    #[serde(with = "hms")]
    pub recurrence: TimeDelta,
    /// Offset of the first occurrence within a day.
    #[serde(with = "hms")]
    pub delay: TimeDelta,
}

impl CycleDefinition {
    fn canonical(
        name: &str,
        id: Uuid,
        map_id: u32,
        length: (i64, i64),
        recurrence: (i64, i64),
        delay: (i64, i64),
    ) -> Self {
        let hm = |(h, m): (i64, i64)| TimeDelta::hours(h) + TimeDelta::minutes(m);
        Self {
            name: name.to_string(),
            id,
            map_id,
            map_name: None,
            waypoint_code: "[&BM0CAAA=]".to_string(),
            length: hm(length),
            recurrence: hm(recurrence),
            delay: hm(delay),
        }
    }
}

/// The full schedule table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleTable {
    #[serde(rename = "cycle", default)]
    pub cycles: Vec<CycleDefinition>,
}

impl CycleTable {
    /// The canonical default schedule, used when no schedule exists yet or
    /// the stored one cannot be read.
    pub fn canonical() -> Self {
        use ids::*;
        Self {
            cycles: vec![
                CycleDefinition::canonical("Verdant Brink Day", VERDANT_BRINK_DAY, 1052, (1, 15), (2, 0), (0, 30)),
                CycleDefinition::canonical("Verdant Brink Night", VERDANT_BRINK_NIGHT, 1052, (0, 25), (2, 0), (1, 45)),
                CycleDefinition::canonical("Verdant Brink Night Bosses", VERDANT_BRINK_NIGHT_BOSSES, 1052, (0, 20), (2, 0), (0, 10)),
                CycleDefinition::canonical("Auric Basin Pillars", AURIC_BASIN_PILLARS, 1043, (1, 15), (2, 0), (1, 30)),
                CycleDefinition::canonical("Auric Basin Challenges", AURIC_BASIN_CHALLENGES, 1043, (0, 15), (2, 0), (0, 45)),
                CycleDefinition::canonical("Auric Basin Octovine", AURIC_BASIN_OCTOVINE, 1043, (0, 20), (2, 0), (1, 0)),
                CycleDefinition::canonical("Auric Basin Reset", AURIC_BASIN_RESET, 1043, (0, 10), (2, 0), (1, 20)),
                CycleDefinition::canonical("Tangled Depths Outposts", TANGLED_DEPTHS_OUTPOSTS, 1045, (1, 35), (2, 0), (0, 50)),
                CycleDefinition::canonical("Tangled Depths Prep", TANGLED_DEPTHS_PREP, 1045, (0, 5), (2, 0), (0, 25)),
                CycleDefinition::canonical("Tangled Depths Gerent", TANGLED_DEPTHS_GERENT, 1045, (0, 20), (2, 0), (0, 30)),
                CycleDefinition::canonical("Dragon's Stand Start", DRAGONS_STAND_START, 1041, (2, 0), (2, 0), (1, 30)),
                CycleDefinition::canonical("Dry Top Crash", DRY_TOP_CRASH, 988, (0, 40), (1, 0), (0, 0)),
                CycleDefinition::canonical("Dry Top Sandstorm", DRY_TOP_SANDSTORM, 988, (0, 20), (1, 0), (0, 40)),
            ],
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ScheduleLoadError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml_string(&self) -> Result<String, ScheduleLoadError> {
        toml::to_string_pretty(self).map_err(|e| ScheduleLoadError::RegenerateFailed(e.to_string()))
    }

    pub fn get(&self, id: Uuid) -> Option<&CycleDefinition> {
        self.cycles.iter().find(|c| c.id == id)
    }

    pub fn len(&self) -> usize {
        self.cycles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cycles.is_empty()
    }
}

/// `"[-]HH:MM[:SS]"` (de)serialization for `TimeDelta`.
pub mod hms {
    use chrono::TimeDelta;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn format(value: TimeDelta) -> String {
        let total = value.num_seconds();
        let sign = if total < 0 { "-" } else { "" };
        let abs = total.unsigned_abs();
        format!("{sign}{:02}:{:02}:{:02}", abs / 3600, (abs / 60) % 60, abs % 60)
    }

    pub fn parse(s: &str) -> Result<TimeDelta, String> {
        let trimmed = s.trim();
        let (negative, body) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let parts: Vec<&str> = body.split(':').collect();
        if !(2..=3).contains(&parts.len()) {
            return Err(format!("expected HH:MM[:SS], got '{s}'"));
        }
        let mut fields = [0i64; 3];
        for (slot, part) in fields.iter_mut().zip(&parts) {
            *slot = part
                .parse::<i64>()
                .map_err(|_| format!("invalid number '{part}' in '{s}'"))?;
            if *slot < 0 {
                return Err(format!("negative component in '{s}'"));
            }
        }
        if fields[1] >= 60 || fields[2] >= 60 {
            return Err(format!("minutes and seconds must be below 60 in '{s}'"));
        }
        let out_of_range = || format!("duration out of range in '{s}'");
        let secs = fields[0]
            .checked_mul(3600)
            .and_then(|h| h.checked_add(fields[1] * 60 + fields[2]))
            .ok_or_else(out_of_range)?;
        TimeDelta::try_seconds(if negative { -secs } else { secs }).ok_or_else(out_of_range)
    }

    pub fn serialize<S: Serializer>(value: &TimeDelta, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<TimeDelta, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse(&s).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_table_has_13_cycles() {
        let table = CycleTable::canonical();
        assert_eq!(table.len(), 13);
    }

    #[test]
    fn canonical_ids_are_distinct() {
        let table = CycleTable::canonical();
        let mut ids: Vec<Uuid> = table.cycles.iter().map(|c| c.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 13);
    }

    #[test]
    fn canonical_table_survives_toml() {
        let table = CycleTable::canonical();
        let text = table.to_toml_string().unwrap();
        assert!(text.contains("[[cycle]]"));
        assert!(text.contains("delay = \"00:30:00\""));
        let parsed = CycleTable::from_toml_str(&text).unwrap();
        assert_eq!(parsed, table);
    }

    #[test]
    fn get_finds_by_id() {
        let table = CycleTable::canonical();
        let dry_top = table.get(ids::DRY_TOP_CRASH).unwrap();
        assert_eq!(dry_top.name, "Dry Top Crash");
        assert_eq!(dry_top.recurrence, TimeDelta::hours(1));
        assert!(table.get(Uuid::nil()).is_none());
    }

    #[test]
    fn hms_parses_optional_seconds_and_sign() {
        assert_eq!(hms::parse("01:15").unwrap(), TimeDelta::minutes(75));
        assert_eq!(hms::parse("00:00:30").unwrap(), TimeDelta::seconds(30));
        assert_eq!(hms::parse("-00:10:00").unwrap(), TimeDelta::minutes(-10));
        assert_eq!(hms::parse("24:00:00").unwrap(), TimeDelta::hours(24));
    }

    #[test]
    fn hms_rejects_garbage() {
        assert!(hms::parse("soon").is_err());
        assert!(hms::parse("01").is_err());
        assert!(hms::parse("01:75:00").is_err());
        assert!(hms::parse("1:2:3:4").is_err());
    }

    #[test]
    fn hms_rejects_out_of_range_hours() {
        assert!(hms::parse("100000000000000:00:00").is_err());
        assert!(hms::parse("9223372036854775807:00").is_err());
        assert!(hms::parse("-100000000000000:00").is_err());
    }

    #[test]
    fn hms_formats_negative_values() {
        assert_eq!(hms::format(TimeDelta::minutes(-90)), "-01:30:00");
        assert_eq!(hms::format(TimeDelta::seconds(3661)), "01:01:01");
    }

    #[test]
    fn malformed_document_is_parse_error() {
        let err = CycleTable::from_toml_str("[[cycle]]\nname = 3").unwrap_err();
        assert!(matches!(err, ScheduleLoadError::ParseFailed(_)));
    }
}
