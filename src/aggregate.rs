//! Aggregation of filtered maintenance records into report datasets.
//!
//! Each sub-aggregate is a pure function of the filtered record set (and the
//! reference instant where relevant), so running the engine twice over an
//! unchanged store yields identical datasets.  Sort orders always use
//! explicit multi-key comparators and never rely on input order.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};

use crate::error::ReportError;
use crate::filter::TaskPredicate;
use crate::request::SectionKind;
use crate::store::{MaintenanceTask, RecordStore, StoreError, TaskStatus};

/// Maximum number of overdue rows carried into a report.
pub const OVERDUE_LIMIT: usize = 10;
/// Maximum number of spare-part rows carried into a report.
pub const SPARE_PART_LIMIT: usize = 20;
/// Label for records whose equipment or department cannot be resolved.
pub const UNRESOLVED: &str = "—";
/// Label grouping tasks without a usable type.
pub const TYPE_FALLBACK: &str = "N/A";

/// Task counts per lifecycle status.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatusTotals {
    pub pending: u32,
    pub in_progress: u32,
    pub completed: u32,
    pub cancelled: u32,
}

impl StatusTotals {
    pub fn total(self) -> u32 {
        self.pending + self.in_progress + self.completed + self.cancelled
    }
}

/// Task count for one free-form type label.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeCount {
    pub label: String,
    pub count: u32,
}

/// A task past its due date that is not yet completed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OverdueItem {
    pub task_id: String,
    pub description: String,
    pub equipment: String,
    pub due_date: DateTime<Utc>,
}

/// Per-assignee task counts, restricted to operational roles.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StaffPerformance {
    pub name: String,
    pub pending: u32,
    pub in_progress: u32,
    pub completed: u32,
    pub cancelled: u32,
    pub total: u32,
}

/// Summed usage of one spare part across the matching records.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SparePartUsage {
    pub part: String,
    pub qty_used: u32,
}

/// Task count per equipment department.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DepartmentLoad {
    pub department: String,
    pub count: u32,
}

/// Completed-task count for one calendar day.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrendPoint {
    pub day: NaiveDate,
    pub completed: u32,
}

/// A compliance line item.  No compliance schema exists in the record store,
/// so this section carries a fixed placeholder table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComplianceRow {
    pub requirement: String,
    pub status: String,
    pub note: String,
}

/// All aggregates a report can draw from, keyed by section.
///
/// Entries for sections that were not requested stay at their defaults.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Dataset {
    pub status_totals: StatusTotals,
    pub type_totals: Vec<TypeCount>,
    pub overdue: Vec<OverdueItem>,
    pub staff: Vec<StaffPerformance>,
    pub spare_parts: Vec<SparePartUsage>,
    pub department_load: Vec<DepartmentLoad>,
    pub trend: Vec<TrendPoint>,
    pub compliance: Vec<ComplianceRow>,
}

/// Runs every sub-aggregate the requested sections need.
///
/// A store failure in any sub-aggregate aborts the whole build; there is no
/// partial-dataset success.
pub fn build_dataset<S: RecordStore>(
    store: &S,
    predicate: &TaskPredicate,
    sections: &[SectionKind],
    now: DateTime<Utc>,
) -> Result<Dataset, ReportError> {
    let tasks = filtered_tasks(store, predicate)?;
    let mut dataset = Dataset::default();
    for kind in sections {
        match kind {
            SectionKind::TaskSummary => {
                dataset.status_totals = status_totals(&tasks);
                dataset.type_totals = type_totals(&tasks);
            }
            SectionKind::OverdueTasks => dataset.overdue = overdue_items(store, &tasks, now)?,
            SectionKind::StaffPerformance => dataset.staff = staff_performance(store, &tasks)?,
            SectionKind::SparePartsUsage => dataset.spare_parts = spare_part_usage(&tasks),
            SectionKind::DepartmentLoad => {
                dataset.department_load = department_load(store, &tasks)?
            }
            SectionKind::CompletionTrend => dataset.trend = completion_trend(&tasks),
            SectionKind::Compliance => dataset.compliance = compliance_rows(),
        }
    }
    Ok(dataset)
}

/// Applies the predicate to the full task set, resolving the equipment join
/// only when the predicate requires it.
fn filtered_tasks<S: RecordStore>(
    store: &S,
    predicate: &TaskPredicate,
) -> Result<Vec<MaintenanceTask>, StoreError> {
    let mut matching = Vec::new();
    for task in store.tasks()? {
        if !predicate.matches_dates(task.created_at) {
            continue;
        }
        if !predicate.matches_staff(task.assigned_to.as_deref()) {
            continue;
        }
        if predicate.needs_equipment_join() {
            let equipment = match &task.equipment_id {
                Some(id) => store.equipment(id)?,
                None => None,
            };
            if !predicate.matches_equipment(equipment.as_ref()) {
                continue;
            }
        }
        matching.push(task);
    }
    Ok(matching)
}

fn status_totals(tasks: &[MaintenanceTask]) -> StatusTotals {
    let mut totals = StatusTotals::default();
    for task in tasks {
        match task.status {
            TaskStatus::Pending => totals.pending += 1,
            TaskStatus::InProgress => totals.in_progress += 1,
            TaskStatus::Completed => totals.completed += 1,
            TaskStatus::Cancelled => totals.cancelled += 1,
        }
    }
    totals
}

fn type_totals(tasks: &[MaintenanceTask]) -> Vec<TypeCount> {
    let mut counts: BTreeMap<String, u32> = BTreeMap::new();
    for task in tasks {
        let label = task
            .task_type
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(TYPE_FALLBACK);
        *counts.entry(label.to_string()).or_default() += 1;
    }
    let mut rows: Vec<TypeCount> = counts
        .into_iter()
        .map(|(label, count)| TypeCount { label, count })
        .collect();
    rows.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
    rows
}

fn overdue_items<S: RecordStore>(
    store: &S,
    tasks: &[MaintenanceTask],
    now: DateTime<Utc>,
) -> Result<Vec<OverdueItem>, StoreError> {
    let mut items = Vec::new();
    for task in tasks {
        let Some(due) = task.due_date else {
            continue;
        };
        if due >= now || task.status == TaskStatus::Completed {
            continue;
        }
        let equipment = match &task.equipment_id {
            Some(id) => store.equipment(id)?.map(|e| e.name),
            None => None,
        };
        items.push(OverdueItem {
            task_id: task.id.clone(),
            description: task.description.clone(),
            equipment: equipment.unwrap_or_else(|| UNRESOLVED.to_string()),
            due_date: due,
        });
    }
    items.sort_by(|a, b| {
        a.due_date
            .cmp(&b.due_date)
            .then_with(|| a.task_id.cmp(&b.task_id))
    });
    items.truncate(OVERDUE_LIMIT);
    Ok(items)
}

fn staff_performance<S: RecordStore>(
    store: &S,
    tasks: &[MaintenanceTask],
) -> Result<Vec<StaffPerformance>, StoreError> {
    let mut by_assignee: BTreeMap<String, StaffPerformance> = BTreeMap::new();
    for task in tasks {
        let Some(assignee) = &task.assigned_to else {
            continue;
        };
        let Some(user) = store.user(assignee)? else {
            continue;
        };
        if !user.role.is_operational() {
            continue;
        }
        let row = by_assignee
            .entry(assignee.clone())
            .or_insert_with(|| StaffPerformance {
                name: user.name,
                ..StaffPerformance::default()
            });
        match task.status {
            TaskStatus::Pending => row.pending += 1,
            TaskStatus::InProgress => row.in_progress += 1,
            TaskStatus::Completed => row.completed += 1,
            TaskStatus::Cancelled => row.cancelled += 1,
        }
    }
    let mut rows: Vec<StaffPerformance> = by_assignee.into_values().collect();
    for row in &mut rows {
        row.total = row.pending + row.in_progress + row.completed + row.cancelled;
    }
    rows.sort_by(|a, b| {
        b.completed
            .cmp(&a.completed)
            .then_with(|| b.total.cmp(&a.total))
            .then_with(|| a.name.cmp(&b.name))
    });
    Ok(rows)
}

fn spare_part_usage(tasks: &[MaintenanceTask]) -> Vec<SparePartUsage> {
    let mut by_part: BTreeMap<String, u32> = BTreeMap::new();
    for task in tasks {
        for part in &task.parts_used {
            *by_part.entry(part.name.clone()).or_default() += part.quantity.unwrap_or(1);
        }
    }
    let mut rows: Vec<SparePartUsage> = by_part
        .into_iter()
        .map(|(part, qty_used)| SparePartUsage { part, qty_used })
        .collect();
    rows.sort_by(|a, b| {
        b.qty_used
            .cmp(&a.qty_used)
            .then_with(|| a.part.cmp(&b.part))
    });
    rows.truncate(SPARE_PART_LIMIT);
    rows
}

fn department_load<S: RecordStore>(
    store: &S,
    tasks: &[MaintenanceTask],
) -> Result<Vec<DepartmentLoad>, StoreError> {
    let mut by_department: BTreeMap<String, u32> = BTreeMap::new();
    for task in tasks {
        let department = match &task.equipment_id {
            Some(id) => store.equipment(id)?.map(|e| e.department),
            None => None,
        };
        let department = department.unwrap_or_else(|| UNRESOLVED.to_string());
        *by_department.entry(department).or_default() += 1;
    }
    let mut rows: Vec<DepartmentLoad> = by_department
        .into_iter()
        .map(|(department, count)| DepartmentLoad { department, count })
        .collect();
    rows.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.department.cmp(&b.department))
    });
    Ok(rows)
}

fn completion_trend(tasks: &[MaintenanceTask]) -> Vec<TrendPoint> {
    let mut by_day: BTreeMap<NaiveDate, u32> = BTreeMap::new();
    for task in tasks {
        if task.status != TaskStatus::Completed {
            continue;
        }
        *by_day.entry(task.created_at.date_naive()).or_default() += 1;
    }
    by_day
        .into_iter()
        .map(|(day, completed)| TrendPoint { day, completed })
        .collect()
}

fn compliance_rows() -> Vec<ComplianceRow> {
    let rows = [
        (
            "Preventive maintenance coverage",
            "Tracked",
            "Derived from scheduled task completion",
        ),
        (
            "Calibration certificates",
            "Pending data source",
            "No calibration registry connected",
        ),
        (
            "Electrical safety inspections",
            "Pending data source",
            "No inspection registry connected",
        ),
    ];
    rows.iter()
        .map(|(requirement, status, note)| ComplianceRow {
            requirement: requirement.to_string(),
            status: status.to_string(),
            note: note.to_string(),
        })
        .collect()
}
