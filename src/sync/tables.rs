//! Whitelist of tables that participate in device sync.

use std::fmt;

use crate::error::{AppError, Result};

/// A table clients are allowed to pull from and push to.
///
/// Everything else (device registry, audit log) is server-managed and never
/// crosses the sync boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncTable {
    Classes,
    Tasks,
    CalendarEvents,
    Habits,
    HabitLogs,
}

impl SyncTable {
    /// Every syncable table; a pull with no table list covers all of these.
    pub const ALL: [SyncTable; 5] = [
        SyncTable::Classes,
        SyncTable::Tasks,
        SyncTable::CalendarEvents,
        SyncTable::Habits,
        SyncTable::HabitLogs,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncTable::Classes => "classes",
            SyncTable::Tasks => "tasks",
            SyncTable::CalendarEvents => "calendar_events",
            SyncTable::Habits => "habits",
            SyncTable::HabitLogs => "habit_logs",
        }
    }

    /// Resolve a client-supplied table name against the whitelist.
    pub fn from_name(name: &str) -> Result<SyncTable> {
        match name {
            "classes" => Ok(SyncTable::Classes),
            "tasks" => Ok(SyncTable::Tasks),
            "calendar_events" => Ok(SyncTable::CalendarEvents),
            "habits" => Ok(SyncTable::Habits),
            "habit_logs" => Ok(SyncTable::HabitLogs),
            other => Err(AppError::InvalidTable(other.to_string())),
        }
    }
}

impl fmt::Display for SyncTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_names_resolve() {
        for table in SyncTable::ALL {
            assert_eq!(SyncTable::from_name(table.as_str()).unwrap(), table);
        }
    }

    #[test]
    fn unknown_names_are_rejected() {
        for name in ["users", "user_devices", "sync_logs", "", "Tasks"] {
            assert!(SyncTable::from_name(name).is_err(), "{name} should be rejected");
        }
    }

    #[test]
    fn rejection_names_the_table() {
        let err = SyncTable::from_name("auth_tokens").unwrap_err();
        assert!(err.to_string().contains("auth_tokens"));
    }
}
