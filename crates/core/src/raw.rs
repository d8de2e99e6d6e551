//! Wire shapes returned by the OctoPrint REST API.
//!
//! Every field is optional and defaults when absent or `null`: the server
//! omits nested objects depending on printer state and installed plugins, and
//! the normalizers decide what a missing value means.

use serde::Deserialize;

/// Response of `GET /api/job`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawJobStatus {
    /// Printer state string, e.g. `"Printing"` or `"Operational"`.
    pub state: Option<String>,
    pub job: Option<RawJob>,
    pub progress: Option<RawProgress>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawJob {
    pub file: Option<RawJobFile>,
    pub estimated_print_time: Option<f64>,
    pub filament: Option<RawFilament>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawJobFile {
    pub name: Option<String>,
    pub display: Option<String>,
    pub path: Option<String>,
    /// File size in bytes.
    pub size: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawProgress {
    /// Bytes of the file already sent to the printer.
    pub filepos: Option<f64>,
    pub print_time: Option<f64>,
    pub print_time_left: Option<f64>,
}

/// Filament usage per extruder; only the first tool is displayed.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawFilament {
    pub tool0: Option<RawToolFilament>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawToolFilament {
    /// Length in millimetres.
    pub length: Option<f64>,
    pub volume: Option<f64>,
}

/// Response of `GET /api/files/local[/<folder>]`.
///
/// The root listing carries `files`; a folder lookup returns the folder
/// itself with its entries under `children`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawFolderListing {
    pub files: Option<Vec<RawFileEntry>>,
    pub children: Option<Vec<RawFileEntry>>,
}

impl RawFolderListing {
    /// Reconcile both listing shapes into one list of entries.
    pub fn into_entries(self) -> Vec<RawFileEntry> {
        self.files.or(self.children).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawFileEntry {
    pub name: Option<String>,
    pub display: Option<String>,
    pub path: Option<String>,
    /// `"folder"`, `"machinecode"` or `"model"`.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub size: Option<f64>,
    /// Upload time as a unix timestamp.
    pub date: Option<i64>,
    pub children: Option<Vec<RawFileEntry>>,
    pub gcode_analysis: Option<RawGcodeAnalysis>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawGcodeAnalysis {
    pub estimated_print_time: Option<f64>,
    pub filament: Option<RawFilament>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tolerates_nulls_everywhere() {
        let raw: RawJobStatus = serde_json::from_value(serde_json::json!({
            "state": "Operational",
            "job": {
                "file": { "name": null, "size": null },
                "estimatedPrintTime": null,
                "filament": null
            },
            "progress": { "filepos": null, "printTime": null, "printTimeLeft": null }
        }))
        .expect("nulls should deserialize");

        let job = raw.job.expect("job object present");
        assert!(job.file.expect("file object present").name.is_none());
        assert!(job.filament.is_none());
    }

    #[test]
    fn tolerates_empty_object() {
        let raw: RawJobStatus = serde_json::from_str("{}").expect("empty object");
        assert!(raw.state.is_none());
        assert!(raw.job.is_none());
    }

    #[test]
    fn listing_prefers_files_then_children() {
        let root: RawFolderListing = serde_json::from_value(serde_json::json!({
            "files": [{ "name": "a.gcode", "type": "machinecode" }]
        }))
        .unwrap();
        assert_eq!(root.into_entries().len(), 1);

        let folder: RawFolderListing = serde_json::from_value(serde_json::json!({
            "name": "parts",
            "type": "folder",
            "children": [{ "name": "b.gcode" }, { "name": "c.gcode" }]
        }))
        .unwrap();
        assert_eq!(folder.into_entries().len(), 2);

        let empty: RawFolderListing = serde_json::from_str("{}").unwrap();
        assert!(empty.into_entries().is_empty());
    }
}
