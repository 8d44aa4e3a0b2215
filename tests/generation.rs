use std::collections::HashMap;
use std::fs;

use chrono::{DateTime, TimeZone, Utc};
use sha2::{Digest, Sha256};

use bmet_reports::aggregate::build_dataset;
use bmet_reports::charts::NullChartRenderer;
use bmet_reports::filter::TaskPredicate;
use bmet_reports::generator::{DocumentWriter, ReportContent, ReportMeta};
use bmet_reports::pdf::PdfReportWriter;
use bmet_reports::request::{Filter, OutputFormat, ReportRequest, SectionKind, VisualOptions};
use bmet_reports::store::{
    Equipment, MaintenanceTask, MemoryStore, PartUsed, TaskStatus, User, UserRole,
};
use bmet_reports::workbook::XlsxReportWriter;
use bmet_reports::ReportEngine;

fn instant(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, day, hour, 0, 0).unwrap()
}

fn fixture_store() -> MemoryStore {
    let mut store = MemoryStore::new()
        .with_equipment(Equipment {
            id: "e-vent".to_string(),
            name: "Ventilator V60".to_string(),
            department: "ICU".to_string(),
            category: "Respiratory".to_string(),
        })
        .with_equipment(Equipment {
            id: "e-xray".to_string(),
            name: "Portable X-Ray".to_string(),
            department: "Radiology".to_string(),
            category: "Imaging".to_string(),
        })
        .with_user(User {
            id: "u-ana".to_string(),
            name: "Ana Kovac".to_string(),
            role: UserRole::Technician,
        })
        .with_user(User {
            id: "u-raj".to_string(),
            name: "Raj Patel".to_string(),
            role: UserRole::Engineer,
        })
        .with_user(User {
            id: "u-admin".to_string(),
            name: "Site Admin".to_string(),
            role: UserRole::Admin,
        });

    let specs: Vec<(&str, TaskStatus, Option<&str>, Option<&str>, u32)> = vec![
        ("t1", TaskStatus::Completed, Some("e-vent"), Some("u-ana"), 1),
        ("t2", TaskStatus::Completed, Some("e-vent"), Some("u-raj"), 2),
        ("t3", TaskStatus::Pending, Some("e-xray"), Some("u-ana"), 3),
        ("t4", TaskStatus::InProgress, Some("e-xray"), Some("u-raj"), 4),
        ("t5", TaskStatus::Pending, None, Some("u-admin"), 5),
        ("t6", TaskStatus::Cancelled, Some("e-vent"), None, 6),
        ("t7", TaskStatus::Completed, Some("e-xray"), Some("u-ana"), 6),
    ];
    for (id, status, equipment, assignee, day) in specs {
        store = store.with_task(MaintenanceTask {
            id: id.to_string(),
            description: format!("Maintenance job {id}"),
            task_type: if day % 2 == 0 {
                Some("Preventive".to_string())
            } else {
                None
            },
            status,
            equipment_id: equipment.map(str::to_string),
            assigned_to: assignee.map(str::to_string),
            created_at: instant(day, 9),
            due_date: Some(instant(day + 2, 17)),
            parts_used: vec![PartUsed {
                name: "Filter X".to_string(),
                quantity: Some(day % 3 + 1),
            }],
        });
    }
    store
}

fn fixture_content<'a>(
    dataset: &'a bmet_reports::aggregate::Dataset,
    filters: &'a Filter,
    charts: &'a HashMap<SectionKind, bmet_reports::charts::ChartImage>,
    sections: &'a [SectionKind],
) -> ReportContent<'a> {
    ReportContent {
        sections,
        dataset,
        charts,
        meta: ReportMeta {
            generated_at: instant(20, 12),
            requested_by: "integration",
            filters,
            include_summary: true,
        },
    }
}

/// Zeroes out volatile metadata (dates, document ids) so renders of the same
/// content can be compared byte for byte.
fn scrub_pdf(bytes: &[u8]) -> Vec<u8> {
    fn scrub_after(data: &mut [u8], marker: &[u8], terminator: u8) {
        let mut index = 0;
        while index + marker.len() <= data.len() {
            if data[index..].starts_with(marker) {
                let mut cursor = index + marker.len();
                while cursor < data.len() && data[cursor] != terminator {
                    if !matches!(data[cursor], b'<' | b'>' | b'/' | b' ' | b'\n' | b'\r' | b'\t') {
                        data[cursor] = b'0';
                    }
                    cursor += 1;
                }
                index = cursor;
            }
            index += 1;
        }
    }

    let mut normalized = bytes.to_vec();
    scrub_after(&mut normalized, b"/CreationDate(", b')');
    scrub_after(&mut normalized, b"/ModDate(", b')');
    scrub_after(&mut normalized, b"/Producer(", b')');
    scrub_after(&mut normalized, b"/ID[", b']');
    scrub_after(&mut normalized, b"/ID [", b']');
    scrub_after(&mut normalized, b"<xmp:CreateDate>", b'<');
    scrub_after(&mut normalized, b"<xmp:ModifyDate>", b'<');
    scrub_after(&mut normalized, b"<xmp:MetadataDate>", b'<');
    scrub_after(&mut normalized, b"<xmpMM:DocumentID>", b'<');
    scrub_after(&mut normalized, b"<xmpMM:InstanceID>", b'<');
    scrub_after(&mut normalized, b"<xmpMM:VersionID>", b'<');
    normalized
}

fn normalized_hash(bytes: &[u8]) -> [u8; 32] {
    Sha256::digest(scrub_pdf(bytes)).into()
}

#[test]
fn pdf_report_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let engine = ReportEngine::new(fixture_store(), dir.path());
    let mut request = ReportRequest::new(
        SectionKind::ALL.to_vec(),
        Filter::default(),
        OutputFormat::Pdf,
    );
    request.visuals = VisualOptions {
        charts: true,
        summary: true,
    };
    request.requested_by = Some("integration".to_string());

    let artifact = engine.generate(&request).unwrap();

    assert_eq!(artifact.mime_type, "application/pdf");
    assert!(artifact.filename.ends_with(".pdf"));
    let bytes = fs::read(&artifact.path).unwrap();
    assert!(bytes.starts_with(b"%PDF"));
    assert!(bytes.len() > 1_000);
}

#[test]
fn xlsx_report_end_to_end_without_chart_capability() {
    let dir = tempfile::tempdir().unwrap();
    let engine = ReportEngine::new(fixture_store(), dir.path())
        .with_chart_renderer(Box::new(NullChartRenderer));
    let mut request = ReportRequest::new(
        SectionKind::ALL.to_vec(),
        Filter::default(),
        OutputFormat::Xlsx,
    );
    request.visuals = VisualOptions {
        charts: true,
        summary: true,
    };

    let artifact = engine.generate(&request).unwrap();

    assert!(artifact
        .mime_type
        .starts_with("application/vnd.openxmlformats"));
    let bytes = fs::read(&artifact.path).unwrap();
    assert!(bytes.starts_with(b"PK"));
}

#[test]
fn wire_request_generates_a_filtered_report() {
    let dir = tempfile::tempdir().unwrap();
    let engine = ReportEngine::new(fixture_store(), dir.path())
        .with_chart_renderer(Box::new(NullChartRenderer));
    let request = ReportRequest::from_json(
        r#"{
            "reports": ["task_summary", "department_load"],
            "filters": {"departments": ["ICU"]},
            "options": {"format": "pdf"},
            "requestedBy": "ops"
        }"#,
    )
    .unwrap();

    let artifact = engine.generate(&request).unwrap();
    assert!(fs::read(&artifact.path).unwrap().starts_with(b"%PDF"));
}

#[test]
fn pdf_rendering_is_deterministic_for_identical_content() {
    let store = fixture_store();
    let filters = Filter::default();
    let predicate = TaskPredicate::normalize(&filters);
    let sections = SectionKind::ALL.to_vec();
    let dataset = build_dataset(&store, &predicate, &sections, instant(20, 12)).unwrap();
    let charts = HashMap::new();

    let render = || {
        let content = fixture_content(&dataset, &filters, &charts, &sections);
        PdfReportWriter::new().render(&content).unwrap()
    };
    let first = render();
    let second = render();

    assert_eq!(first.len(), second.len());
    assert_eq!(normalized_hash(&first), normalized_hash(&second));
}

#[test]
fn both_writers_accept_the_same_content() {
    let store = fixture_store();
    let filters = Filter::default();
    let predicate = TaskPredicate::normalize(&filters);
    let sections = SectionKind::ALL.to_vec();
    let dataset = build_dataset(&store, &predicate, &sections, instant(20, 12)).unwrap();
    let charts = HashMap::new();

    let content = fixture_content(&dataset, &filters, &charts, &sections);
    let pdf = PdfReportWriter::new().render(&content).unwrap();
    let xlsx = XlsxReportWriter::new().render(&content).unwrap();

    assert!(pdf.starts_with(b"%PDF"));
    assert!(xlsx.starts_with(b"PK"));
}
