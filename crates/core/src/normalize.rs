//! Mapping from raw server payloads to the display domain model.
//!
//! Both normalizers are pure: the current time and the filament profile are
//! passed in, so the same payload always yields the same value.

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::format::{
    format_duration, format_end_time, format_megabytes, format_upload_date, FilamentProfile,
    FormattedDuration,
};
use crate::job::{JobSnapshot, PrinterState};
use crate::raw::{RawFileEntry, RawFilament, RawFolderListing, RawJobStatus};

/// Inputs to [`normalize`] that do not come from the payload.
#[derive(Debug, Clone, Copy)]
pub struct NormalizeContext {
    pub filament: FilamentProfile,
    /// Local wall-clock time the snapshot is built at.
    pub now: NaiveDateTime,
}

impl NormalizeContext {
    pub fn now(filament: FilamentProfile) -> Self {
        Self {
            filament,
            now: chrono::Local::now().naive_local(),
        }
    }
}

/// Build a [`JobSnapshot`] from a job status payload.
///
/// Returns `None` when no job file is loaded on the printer.
pub fn normalize(raw: &RawJobStatus, ctx: &NormalizeContext) -> Option<JobSnapshot> {
    let job = raw.job.as_ref()?;
    let file = job.file.as_ref()?;
    let name = file.name.as_deref().filter(|n| !n.is_empty())?;

    let display = file.display.as_deref().filter(|d| !d.is_empty()).unwrap_or(name);
    let progress = raw.progress.clone().unwrap_or_default();

    let seconds_remaining = progress.print_time_left.or_else(|| {
        job.estimated_print_time
            .map(|estimate| (estimate - progress.print_time.unwrap_or(0.0)).max(0.0))
    });

    Some(JobSnapshot {
        status: PrinterState::parse(raw.state.as_deref().unwrap_or("Unknown")),
        filename: strip_extension(display).to_string(),
        progress_percent: progress_percent(progress.filepos, file.size),
        filament_amount: filament_grams(job.filament.as_ref(), &ctx.filament),
        time_left: format_duration(progress.print_time_left),
        time_printed: format_duration(progress.print_time),
        estimated_print_time: format_duration(job.estimated_print_time),
        estimated_end_time: format_end_time(ctx.now, seconds_remaining),
    })
}

/// `round(filepos / size * 100)` clamped to `0..=100`.
///
/// A missing or zero file size yields 0.
pub fn progress_percent(filepos: Option<f64>, size: Option<f64>) -> u8 {
    match (filepos, size) {
        (Some(pos), Some(size)) if size > 0.0 && pos.is_finite() && size.is_finite() => {
            (pos / size * 100.0).round().clamp(0.0, 100.0) as u8
        }
        _ => 0,
    }
}

fn filament_grams(filament: Option<&RawFilament>, profile: &FilamentProfile) -> Option<f64> {
    let length = filament?.tool0.as_ref()?.length?;
    Some(profile.grams(length))
}

fn strip_extension(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    }
}

/// One row of a folder listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FolderEntry {
    Folder {
        path: String,
        name: String,
        /// Unknown when the server did not include the children.
        child_count: Option<usize>,
    },
    File {
        path: String,
        name: String,
        size_mb: String,
        print_time: FormattedDuration,
        filament_amount: Option<f64>,
        date: Option<String>,
    },
}

impl FolderEntry {
    pub fn name(&self) -> &str {
        match self {
            Self::Folder { name, .. } | Self::File { name, .. } => name,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Self::Folder { path, .. } | Self::File { path, .. } => path,
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, Self::Folder { .. })
    }
}

/// Normalize a folder listing: folders first, then files, each sorted by name.
pub fn normalize_folder(raw: RawFolderListing, filament: &FilamentProfile) -> Vec<FolderEntry> {
    let mut entries: Vec<FolderEntry> = raw
        .into_entries()
        .iter()
        .map(|entry| normalize_file_entry(entry, filament))
        .collect();

    entries.sort_by(|a, b| {
        b.is_folder()
            .cmp(&a.is_folder())
            .then_with(|| a.name().cmp(b.name()))
    });
    entries
}

/// Normalize a single file or folder entry.
pub fn normalize_file_entry(entry: &RawFileEntry, filament: &FilamentProfile) -> FolderEntry {
    let name = entry.name.clone().unwrap_or_default();
    let path = format!("/{}", entry.path.as_deref().unwrap_or(&name));

    if entry.kind.as_deref() == Some("folder") {
        return FolderEntry::Folder {
            path,
            name,
            child_count: entry.children.as_ref().map(Vec::len),
        };
    }

    let analysis = entry.gcode_analysis.clone().unwrap_or_default();
    FolderEntry::File {
        path,
        name,
        size_mb: format_megabytes(entry.size.unwrap_or(0.0)),
        print_time: format_duration(analysis.estimated_print_time),
        filament_amount: filament_grams(analysis.filament.as_ref(), filament),
        date: entry.date.and_then(format_upload_date),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn ctx() -> NormalizeContext {
        NormalizeContext {
            filament: FilamentProfile::default(),
            now: NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(14, 0, 0)
                .unwrap(),
        }
    }

    fn status(value: serde_json::Value) -> RawJobStatus {
        serde_json::from_value(value).expect("valid payload")
    }

    fn printing() -> RawJobStatus {
        status(json!({
            "state": "Printing",
            "job": {
                "file": { "name": "benchy.gcode", "display": "benchy.gcode", "size": 1000000 },
                "estimatedPrintTime": 7200,
                "filament": { "tool0": { "length": 1000.0, "volume": 2.4 } }
            },
            "progress": { "filepos": 500000, "printTime": 3600, "printTimeLeft": 3000 }
        }))
    }

    #[test]
    fn full_payload() {
        let snapshot = normalize(&printing(), &ctx()).expect("job is loaded");
        assert_eq!(snapshot.status, PrinterState::Printing);
        assert_eq!(snapshot.filename, "benchy");
        assert_eq!(snapshot.progress_percent, 50);
        assert_eq!(snapshot.filament_amount, Some(3.0));
        assert_eq!(snapshot.time_left.value, "0:50");
        assert_eq!(snapshot.time_printed.value, "1:00");
        assert_eq!(snapshot.estimated_print_time.value, "2:00");
        assert_eq!(snapshot.estimated_end_time, "14:50");
    }

    #[test]
    fn no_job_is_none() {
        assert!(normalize(&status(json!({ "state": "Operational", "job": null })), &ctx()).is_none());
        assert!(normalize(&status(json!({ "job": { "file": {} } })), &ctx()).is_none());
        assert!(normalize(&status(json!({ "job": { "file": { "name": "" } } })), &ctx()).is_none());
        assert!(normalize(&status(json!({})), &ctx()).is_none());
    }

    #[test]
    fn progress_is_clamped_and_safe() {
        assert_eq!(progress_percent(Some(0.0), Some(0.0)), 0);
        assert_eq!(progress_percent(Some(10.0), None), 0);
        assert_eq!(progress_percent(None, Some(100.0)), 0);
        assert_eq!(progress_percent(Some(1_000_100.0), Some(1_000_000.0)), 100);
        assert_eq!(progress_percent(Some(-5.0), Some(100.0)), 0);
        assert_eq!(progress_percent(Some(994.0), Some(1000.0)), 99);
        assert_eq!(progress_percent(Some(996.0), Some(1000.0)), 100);

        for pos in (0..=2000).step_by(7) {
            let p = progress_percent(Some(pos as f64), Some(1000.0));
            assert!(p <= 100);
        }
    }

    #[test]
    fn missing_times_are_unknown() {
        let snapshot = normalize(
            &status(json!({
                "state": "Operational",
                "job": { "file": { "name": "cube.gcode", "size": 0 } },
                "progress": { "filepos": null, "printTime": null, "printTimeLeft": null }
            })),
            &ctx(),
        )
        .expect("job is loaded");

        assert_eq!(snapshot.progress_percent, 0);
        assert!(snapshot.time_left.is_unknown());
        assert!(snapshot.time_printed.is_unknown());
        assert!(snapshot.estimated_print_time.is_unknown());
        assert_eq!(snapshot.estimated_end_time, "--:--");
        assert!(snapshot.filament_amount.is_none());
    }

    #[test]
    fn end_time_falls_back_to_estimate() {
        let snapshot = normalize(
            &status(json!({
                "state": "Printing",
                "job": { "file": { "name": "cube.gcode" }, "estimatedPrintTime": 5400 },
                "progress": { "printTime": 1800 }
            })),
            &ctx(),
        )
        .unwrap();
        assert_eq!(snapshot.estimated_end_time, "15:00");
    }

    #[test]
    fn huge_time_left_does_not_panic() {
        let snapshot = normalize(
            &status(json!({
                "state": "Printing",
                "job": { "file": { "name": "cube.gcode" }, "estimatedPrintTime": 1.0e17 },
                "progress": { "printTimeLeft": 1.0e13 }
            })),
            &ctx(),
        )
        .expect("job is loaded");
        assert_eq!(snapshot.estimated_end_time, "--:--");
        assert!(!snapshot.time_left.is_unknown());
    }

    #[test]
    fn unknown_state_passes_through() {
        let mut raw = printing();
        raw.state = Some("Printing from SD".into());
        let snapshot = normalize(&raw, &ctx()).unwrap();
        assert_eq!(snapshot.status.as_str(), "Printing from SD");
        assert_eq!(
            serde_json::to_value(&snapshot).unwrap()["status"],
            "Printing from SD"
        );
    }

    #[test]
    fn display_name_keeps_inner_dots() {
        assert_eq!(strip_extension("part.v2.gcode"), "part.v2");
        assert_eq!(strip_extension(".hidden"), ".hidden");
        assert_eq!(strip_extension("noext"), "noext");
    }

    #[test]
    fn folder_listing_sorted_folders_first() {
        let raw: RawFolderListing = serde_json::from_value(json!({
            "children": [
                { "name": "z.gcode", "path": "parts/z.gcode", "type": "machinecode", "size": 2500000,
                  "gcodeAnalysis": { "estimatedPrintTime": 3600, "filament": { "tool0": { "length": 1000 } } } },
                { "name": "brackets", "path": "parts/brackets", "type": "folder", "children": [{}, {}] },
                { "name": "a.gcode", "path": "parts/a.gcode", "type": "machinecode" },
                { "name": "archive", "path": "parts/archive", "type": "folder" }
            ]
        }))
        .unwrap();

        let entries = normalize_folder(raw, &FilamentProfile::default());
        let names: Vec<&str> = entries.iter().map(FolderEntry::name).collect();
        assert_eq!(names, ["archive", "brackets", "a.gcode", "z.gcode"]);

        assert_eq!(
            entries[1],
            FolderEntry::Folder {
                path: "/parts/brackets".into(),
                name: "brackets".into(),
                child_count: Some(2),
            }
        );
        match &entries[3] {
            FolderEntry::File { size_mb, print_time, filament_amount, .. } => {
                assert_eq!(size_mb, "2.5");
                assert_eq!(print_time.value, "1:00");
                assert_eq!(*filament_amount, Some(3.0));
            }
            other => panic!("expected file, got {other:?}"),
        }
        match &entries[2] {
            FolderEntry::File { print_time, filament_amount, date, .. } => {
                assert!(print_time.is_unknown());
                assert!(filament_amount.is_none());
                assert!(date.is_none());
            }
            other => panic!("expected file, got {other:?}"),
        }
    }
}
