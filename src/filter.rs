//! Normalization of raw request filters into a canonical predicate.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::request::Filter;
use crate::store::Equipment;

/// Canonical query predicate derived from a [`Filter`].
///
/// The date range is inclusive on both ends and applies to record creation
/// time.  Non-empty department or category sets mark the predicate as
/// requiring the equipment join: a record must resolve to equipment whose
/// department/category is in the respective set before it can match.
#[derive(Clone, Debug)]
pub struct TaskPredicate {
    date_from: Option<DateTime<Utc>>,
    date_to: Option<DateTime<Utc>>,
    departments: HashSet<String>,
    categories: HashSet<String>,
    staff: Option<String>,
}

impl TaskPredicate {
    /// Canonicalizes a raw filter.  Blank list entries are discarded.
    pub fn normalize(filter: &Filter) -> Self {
        let clean = |values: &[String]| {
            values
                .iter()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .collect::<HashSet<_>>()
        };
        Self {
            date_from: filter.date_from,
            date_to: filter.date_to,
            departments: clean(&filter.departments),
            categories: clean(&filter.categories),
            staff: filter
                .staff
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        }
    }

    /// Whether matching must resolve equipment references before grouping.
    pub fn needs_equipment_join(&self) -> bool {
        !self.departments.is_empty() || !self.categories.is_empty()
    }

    /// Inclusive creation-time bound check.
    pub fn matches_dates(&self, created_at: DateTime<Utc>) -> bool {
        if let Some(from) = self.date_from {
            if created_at < from {
                return false;
            }
        }
        if let Some(to) = self.date_to {
            if created_at > to {
                return false;
            }
        }
        true
    }

    /// Staff restriction check against a task's assignee.
    pub fn matches_staff(&self, assigned_to: Option<&str>) -> bool {
        match &self.staff {
            Some(staff) => assigned_to == Some(staff.as_str()),
            None => true,
        }
    }

    /// Joined equipment check.  Only meaningful when
    /// [`needs_equipment_join`](Self::needs_equipment_join) is true; a record
    /// whose equipment cannot be resolved never matches a join filter.
    pub fn matches_equipment(&self, equipment: Option<&Equipment>) -> bool {
        let Some(equipment) = equipment else {
            return !self.needs_equipment_join();
        };
        if !self.departments.is_empty() && !self.departments.contains(&equipment.department) {
            return false;
        }
        if !self.categories.is_empty() && !self.categories.contains(&equipment.category) {
            return false;
        }
        true
    }
}
