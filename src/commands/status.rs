// `media-setup status`: what the status store says about each manifest component.
// Read-only: never downloads, prompts or runs anything.

use crate::errors::{InstallerError, Result};
use crate::libs::manifest_loading;
use crate::libs::status_store::{FileStatusStore, StatusRecord, StatusStore};
use crate::log_info;
use colored::Colorize;
use prettytable::{Table, row};
use serde::Serialize;

/// How a component's record relates to the version the manifest requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Standing {
    UpToDate,
    Outdated,
    NotInstalled,
    /// A record exists for a component the manifest no longer mentions.
    Unknown,
}

impl Standing {
    fn label(self) -> &'static str {
        match self {
            Standing::UpToDate => "up to date",
            Standing::Outdated => "outdated",
            Standing::NotInstalled => "not installed",
            Standing::Unknown => "not in manifest",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusRow {
    pub component: String,
    pub required: Option<String>,
    pub installed: Option<String>,
    pub recorded_at: Option<String>,
    pub standing: Standing,
}

/// Joins manifest order with the stored records. Records of components that are not in
/// the manifest are appended at the end.
pub fn build_rows(required: &[(String, String)], records: &[StatusRecord]) -> Vec<StatusRow> {
    let mut rows: Vec<StatusRow> = required
        .iter()
        .map(|(name, version)| {
            let record = records.iter().find(|r| &r.component == name);
            let standing = match record {
                Some(r) if &r.installed_version == version => Standing::UpToDate,
                Some(_) => Standing::Outdated,
                None => Standing::NotInstalled,
            };
            StatusRow {
                component: name.clone(),
                required: Some(version.clone()),
                installed: record.map(|r| r.installed_version.clone()),
                recorded_at: record
                    .and_then(|r| r.recorded_at)
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string()),
                standing,
            }
        })
        .collect();

    for record in records {
        if !required.iter().any(|(name, _)| name == &record.component) {
            rows.push(StatusRow {
                component: record.component.clone(),
                required: None,
                installed: Some(record.installed_version.clone()),
                recorded_at: record
                    .recorded_at
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string()),
                standing: Standing::Unknown,
            });
        }
    }
    rows
}

pub fn run(config: Option<String>, workdir: Option<String>, json: bool) -> Result<()> {
    let loaded = manifest_loading::load(config.as_deref(), workdir.as_deref())?;
    let store = FileStatusStore::new(loaded.config.status_dir());
    let required: Vec<(String, String)> = loaded
        .manifest
        .components
        .iter()
        .map(|c| (c.name.clone(), c.version.clone()))
        .collect();
    let rows = build_rows(&required, &store.list()?);

    if json {
        let out = serde_json::to_string_pretty(&rows)
            .map_err(|e| InstallerError::Config(format!("cannot serialize status: {e}")))?;
        println!("{out}");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_titles(row!["Component", "Required", "Installed", "Recorded", "Status"]);
    for r in &rows {
        table.add_row(row![
            r.component,
            r.required.as_deref().unwrap_or("-"),
            r.installed.as_deref().unwrap_or("-"),
            r.recorded_at.as_deref().unwrap_or("-"),
            r.standing.label()
        ]);
    }
    table.printstd();

    let terminal_done = rows
        .iter()
        .filter(|r| r.standing != Standing::Unknown)
        .last()
        .is_some_and(|r| r.standing == Standing::UpToDate);
    if terminal_done {
        log_info!("{}", "Pipeline is fully installed.".green());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, version: &str) -> StatusRecord {
        StatusRecord {
            component: name.into(),
            installed_version: version.into(),
            recorded_at: None,
        }
    }

    #[test]
    fn rows_follow_manifest_order_and_flag_orphans() {
        let required = vec![
            ("prereqs".to_string(), "1.0".to_string()),
            ("tsduck".to_string(), "3.38".to_string()),
            ("ffmpeg".to_string(), "7.1".to_string()),
        ];
        let records = vec![
            record("ffmpeg", "7.0"),
            record("old-driver", "0.9"),
            record("prereqs", "1.0"),
        ];

        let rows = build_rows(&required, &records);
        let summary: Vec<_> = rows.iter().map(|r| (r.component.as_str(), r.standing)).collect();

        assert_eq!(
            summary,
            vec![
                ("prereqs", Standing::UpToDate),
                ("tsduck", Standing::NotInstalled),
                ("ffmpeg", Standing::Outdated),
                ("old-driver", Standing::Unknown),
            ]
        );
        assert_eq!(rows[2].installed.as_deref(), Some("7.0"));
        assert_eq!(rows[3].required, None);
    }

    #[test]
    fn standing_serializes_in_snake_case() {
        let json = serde_json::to_string(&Standing::NotInstalled).unwrap();
        assert_eq!(json, "\"not_installed\"");
    }
}
