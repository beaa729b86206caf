use std::collections::BTreeMap;

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde_json::Value;

use crate::model::ids::AuditEntryId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum AuditLevel {
    #[default]
    Info,
    Warning,
    Error,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditActor {
    pub id: u64,
    pub name: String,
    pub email: Option<String>,
}

/// One row of the clinic's activity log (bitácora).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    pub id: AuditEntryId,
    pub actor: Option<AuditActor>,
    pub action: String,
    /// Model or table the action touched.
    pub table: Option<String>,
    pub record_id: Option<u64>,
    /// Display text of the touched record, as the backend rendered it.
    pub record_repr: Option<String>,
    pub description: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub at: DateTime<Utc>,
    pub level: AuditLevel,
    /// Record state before the action, when the backend captured it.
    pub before: Option<Value>,
    pub after: Option<Value>,
}

/// A field whose value differs between an entry's before and after states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub field: String,
    /// `None` when the field did not exist before.
    pub before: Option<Value>,
    pub after: Value,
}

impl AuditEntry {
    /// Fields of the after state that differ from the before state.
    ///
    /// Empty unless both states are present and are JSON objects. Fields
    /// dropped by the action are not listed.
    #[must_use]
    pub fn changes(&self) -> Vec<FieldChange> {
        let (Some(Value::Object(before)), Some(Value::Object(after))) = (&self.before, &self.after)
        else {
            return Vec::new();
        };
        after
            .iter()
            .filter(|(field, value)| before.get(field.as_str()) != Some(*value))
            .map(|(field, value)| FieldChange {
                field: field.clone(),
                before: before.get(field.as_str()).cloned(),
                after: value.clone(),
            })
            .collect()
    }
}

/// Inclusive calendar-date range; either end may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    #[must_use]
    pub fn new(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        Self { from, to }
    }

    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.is_none_or(|from| date >= from) && self.to.is_none_or(|to| date <= to)
    }

    /// A range whose start is after its end matches nothing.
    #[must_use]
    pub fn is_inverted(&self) -> bool {
        matches!((self.from, self.to), (Some(from), Some(to)) if from > to)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditFilters {
    pub user: Option<u64>,
    pub action: Option<String>,
    pub table: Option<String>,
    pub dates: DateRange,
    pub search: Option<String>,
    pub level: Option<AuditLevel>,
    pub ip_address: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl AuditFilters {
    /// Client-side check used when narrowing an already-fetched page.
    #[must_use]
    pub fn matches(&self, entry: &AuditEntry) -> bool {
        let user_ok = self
            .user
            .is_none_or(|user| entry.actor.as_ref().map(|a| a.id) == Some(user));
        let action_ok = self
            .action
            .as_deref()
            .is_none_or(|action| entry.action.eq_ignore_ascii_case(action));
        let table_ok = self
            .table
            .as_deref()
            .is_none_or(|table| entry.table.as_deref() == Some(table));
        let level_ok = self.level.is_none_or(|level| entry.level == level);
        let ip_ok = self
            .ip_address
            .as_deref()
            .is_none_or(|ip| entry.ip_address.as_deref() == Some(ip.trim()));
        let search_ok = self.search.as_deref().is_none_or(|search| {
            let haystack = format!(
                "{} {} {}",
                entry.description,
                entry.action,
                entry.actor.as_ref().map_or("", |a| a.name.as_str())
            )
            .to_lowercase();
            haystack.contains(&search.to_lowercase())
        });

        user_ok
            && action_ok
            && table_ok
            && level_ok
            && ip_ok
            && search_ok
            && self.dates.contains(entry.at.date_naive())
    }
}

//
// ─── STATISTICS ────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq)]
pub struct ActionCount {
    pub action: String,
    pub count: u64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableCount {
    pub table: String,
    pub count: u64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserCount {
    pub user_id: u64,
    pub user_name: String,
    pub count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelCount {
    pub level: AuditLevel,
    pub count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayCount {
    pub date: NaiveDate,
    pub count: u64,
}

/// Activity summary of the log over a period.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AuditStats {
    pub total: u64,
    /// Most frequent first.
    pub by_action: Vec<ActionCount>,
    pub by_table: Vec<TableCount>,
    pub by_user: Vec<UserCount>,
    pub by_level: Vec<LevelCount>,
    /// The seven days ending `today`, oldest first, zero days included.
    pub last_days: Vec<DayCount>,
}

pub const STATS_DAYS: u64 = 7;

impl AuditStats {
    #[must_use]
    pub fn from_entries(entries: &[AuditEntry], today: NaiveDate) -> Self {
        let total = entries.len() as u64;

        let mut actions: BTreeMap<&str, u64> = BTreeMap::new();
        let mut tables: BTreeMap<&str, u64> = BTreeMap::new();
        let mut users: BTreeMap<u64, (&str, u64)> = BTreeMap::new();
        let mut levels: BTreeMap<AuditLevel, u64> = BTreeMap::new();
        let mut days: BTreeMap<NaiveDate, u64> = BTreeMap::new();
        for entry in entries {
            *actions.entry(entry.action.as_str()).or_default() += 1;
            if let Some(table) = &entry.table {
                *tables.entry(table.as_str()).or_default() += 1;
            }
            if let Some(actor) = &entry.actor {
                users.entry(actor.id).or_insert((actor.name.as_str(), 0)).1 += 1;
            }
            *levels.entry(entry.level).or_default() += 1;
            *days.entry(entry.at.date_naive()).or_default() += 1;
        }

        let mut by_action: Vec<ActionCount> = actions
            .into_iter()
            .map(|(action, count)| ActionCount {
                action: action.to_owned(),
                count,
                percentage: share(count, total),
            })
            .collect();
        by_action.sort_by(|a, b| b.count.cmp(&a.count));

        let mut by_table: Vec<TableCount> = tables
            .into_iter()
            .map(|(table, count)| TableCount {
                table: table.to_owned(),
                count,
                percentage: share(count, total),
            })
            .collect();
        by_table.sort_by(|a, b| b.count.cmp(&a.count));

        let mut by_user: Vec<UserCount> = users
            .into_iter()
            .map(|(user_id, (name, count))| UserCount {
                user_id,
                user_name: name.to_owned(),
                count,
            })
            .collect();
        by_user.sort_by(|a, b| b.count.cmp(&a.count));

        let last_days = (0..STATS_DAYS)
            .rev()
            .filter_map(|back| today.checked_sub_days(Days::new(back)))
            .map(|date| DayCount {
                date,
                count: days.get(&date).copied().unwrap_or(0),
            })
            .collect();

        Self {
            total,
            by_action,
            by_table,
            by_user,
            by_level: levels
                .into_iter()
                .map(|(level, count)| LevelCount { level, count })
                .collect(),
            last_days,
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn share(count: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    count as f64 / total as f64 * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> AuditEntry {
        AuditEntry {
            id: AuditEntryId::new(1),
            actor: Some(AuditActor {
                id: 5,
                name: "Ana Pérez".into(),
                email: None,
            }),
            action: "actualizar".into(),
            table: Some("sesion_tratamiento".into()),
            record_id: Some(88),
            record_repr: None,
            description: "Sesión editada".into(),
            ip_address: Some("10.0.0.4".into()),
            user_agent: None,
            at: crate::time::fixed_now(),
            level: AuditLevel::Info,
            before: None,
            after: None,
        }
    }

    #[test]
    fn filters_match_on_all_given_fields() {
        let filters = AuditFilters {
            user: Some(5),
            action: Some("ACTUALIZAR".into()),
            table: Some("sesion_tratamiento".into()),
            search: Some("ana".into()),
            ..AuditFilters::default()
        };
        assert!(filters.matches(&entry()));
    }

    #[test]
    fn filters_reject_other_users() {
        let filters = AuditFilters {
            user: Some(6),
            ..AuditFilters::default()
        };
        assert!(!filters.matches(&entry()));
    }

    #[test]
    fn date_range_bounds_are_inclusive() {
        let day = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();
        assert!(DateRange::new(Some(day), Some(day)).contains(day));
        assert!(!DateRange::new(day.succ_opt(), None).contains(day));
        assert!(DateRange::new(day.succ_opt(), Some(day)).is_inverted());
    }

    #[test]
    fn filters_match_on_ip_address() {
        let mut filters = AuditFilters {
            ip_address: Some("10.0.0.4".into()),
            ..AuditFilters::default()
        };
        assert!(filters.matches(&entry()));
        filters.ip_address = Some("10.0.0.5".into());
        assert!(!filters.matches(&entry()));
    }

    #[test]
    fn changes_list_fields_that_differ() {
        let mut edited = entry();
        edited.before = Some(serde_json::json!({"estado": "activo", "nombre": "Ana", "rol": 2}));
        edited.after = Some(serde_json::json!({"estado": "inactivo", "nombre": "Ana", "correo": "a@x.com"}));

        let changes = edited.changes();
        assert_eq!(changes.len(), 2);
        let estado = changes.iter().find(|c| c.field == "estado").unwrap();
        assert_eq!(estado.before, Some(serde_json::json!("activo")));
        assert_eq!(estado.after, serde_json::json!("inactivo"));
        let correo = changes.iter().find(|c| c.field == "correo").unwrap();
        assert_eq!(correo.before, None);
    }

    #[test]
    fn changes_need_both_states() {
        let mut created = entry();
        created.after = Some(serde_json::json!({"nombre": "Ana"}));
        assert!(created.changes().is_empty());
    }

    #[test]
    fn stats_count_by_action_table_user_and_day() {
        let today = crate::time::fixed_now().date_naive();
        let mut second = entry();
        second.id = AuditEntryId::new(2);
        second.action = "eliminar".into();
        second.level = AuditLevel::Warning;
        let mut third = entry();
        third.id = AuditEntryId::new(3);
        third.actor = None;
        third.table = None;
        third.at -= chrono::Duration::days(10);

        let stats = AuditStats::from_entries(&[entry(), second, third], today);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.by_action[0].action, "actualizar");
        assert_eq!(stats.by_action[0].count, 2);
        assert!((stats.by_action[1].percentage - 100.0 / 3.0).abs() < 1e-9);
        assert_eq!(stats.by_table[0].count, 2);
        assert_eq!(stats.by_user, vec![UserCount {
            user_id: 5,
            user_name: "Ana Pérez".into(),
            count: 2,
        }]);
        assert_eq!(stats.by_level[0], LevelCount { level: AuditLevel::Info, count: 2 });
        assert_eq!(stats.last_days.len(), 7);
        assert_eq!(stats.last_days[6], DayCount { date: today, count: 2 });
        assert_eq!(stats.last_days.iter().map(|d| d.count).sum::<u64>(), 2);
    }
}
