//! Record model and the read-only store the engine aggregates from.
//!
//! The engine never owns persistence.  It consumes a [`RecordStore`] that can
//! enumerate maintenance tasks and resolve equipment and user references, and
//! it treats any query failure as fatal to the request in progress.
//! [`MemoryStore`] is the bundled implementation used for embedding and tests.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure raised by a record-store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record store query failed: {0}")]
    Backend(String),
}

/// Lifecycle state of a maintenance task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl TaskStatus {
    /// Human-readable label used in report tables.
    pub fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::InProgress => "In Progress",
            Self::Completed => "Completed",
            Self::Cancelled => "Cancelled",
        }
    }
}

/// Role assigned to an application user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Technician,
    Engineer,
    Admin,
}

impl UserRole {
    /// Whether the role performs maintenance work.  Staff performance rows
    /// are restricted to operational roles.
    pub fn is_operational(self) -> bool {
        matches!(self, Self::Technician | Self::Engineer)
    }
}

/// A spare part consumed while carrying out a task.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PartUsed {
    pub name: String,
    /// Missing quantity counts as a single unit.
    pub quantity: Option<u32>,
}

/// A maintenance task as stored by the tracking application.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceTask {
    pub id: String,
    pub description: String,
    pub task_type: Option<String>,
    pub status: TaskStatus,
    pub equipment_id: Option<String>,
    pub assigned_to: Option<String>,
    pub created_at: DateTime<Utc>,
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub parts_used: Vec<PartUsed>,
}

/// A piece of biomedical equipment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Equipment {
    pub id: String,
    pub name: String,
    pub department: String,
    pub category: String,
}

/// An application user that tasks can be assigned to.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub role: UserRole,
}

/// Read-only access to the records a report is built from.
pub trait RecordStore {
    /// Returns every maintenance task.
    fn tasks(&self) -> Result<Vec<MaintenanceTask>, StoreError>;

    /// Resolves an equipment reference, `None` when the id is unknown.
    fn equipment(&self, id: &str) -> Result<Option<Equipment>, StoreError>;

    /// Resolves a user reference, `None` when the id is unknown.
    fn user(&self, id: &str) -> Result<Option<User>, StoreError>;
}

/// In-memory [`RecordStore`] backed by plain collections.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    tasks: Vec<MaintenanceTask>,
    equipment: HashMap<String, Equipment>,
    users: HashMap<String, User>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a task and returns the updated store.
    pub fn with_task(mut self, task: MaintenanceTask) -> Self {
        self.tasks.push(task);
        self
    }

    /// Adds a piece of equipment and returns the updated store.
    pub fn with_equipment(mut self, equipment: Equipment) -> Self {
        self.equipment.insert(equipment.id.clone(), equipment);
        self
    }

    /// Adds a user and returns the updated store.
    pub fn with_user(mut self, user: User) -> Self {
        self.users.insert(user.id.clone(), user);
        self
    }
}

impl RecordStore for MemoryStore {
    fn tasks(&self) -> Result<Vec<MaintenanceTask>, StoreError> {
        Ok(self.tasks.clone())
    }

    fn equipment(&self, id: &str) -> Result<Option<Equipment>, StoreError> {
        Ok(self.equipment.get(id).cloned())
    }

    fn user(&self, id: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users.get(id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn task(id: &str) -> MaintenanceTask {
        MaintenanceTask {
            id: id.to_string(),
            description: "Inspect infusion pump".to_string(),
            task_type: None,
            status: TaskStatus::Pending,
            equipment_id: None,
            assigned_to: None,
            created_at: Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
            due_date: None,
            parts_used: Vec::new(),
        }
    }

    #[test]
    fn memory_store_resolves_references() {
        let store = MemoryStore::new()
            .with_task(task("t1"))
            .with_equipment(Equipment {
                id: "e1".to_string(),
                name: "Infusion Pump".to_string(),
                department: "ICU".to_string(),
                category: "Pump".to_string(),
            })
            .with_user(User {
                id: "u1".to_string(),
                name: "Dana Reyes".to_string(),
                role: UserRole::Technician,
            });

        assert_eq!(store.tasks().unwrap().len(), 1);
        assert_eq!(store.equipment("e1").unwrap().unwrap().department, "ICU");
        assert!(store.equipment("missing").unwrap().is_none());
        assert_eq!(store.user("u1").unwrap().unwrap().name, "Dana Reyes");
    }

    #[test]
    fn operational_roles_exclude_admin() {
        assert!(UserRole::Technician.is_operational());
        assert!(UserRole::Engineer.is_operational());
        assert!(!UserRole::Admin.is_operational());
    }
}
