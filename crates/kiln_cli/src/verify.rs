//! The `kiln verify` subcommand.

use crate::{ReportFormat, VerifyArgs};
use kiln_store::{EntryStatus, IntermediateStore};

/// Scans every entry and reports its status. Exits 0 when every entry is
/// current, 1 otherwise.
pub fn run(store: &IntermediateStore, args: &VerifyArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let entries = store.verify()?;
    let all_current = entries.iter().all(|e| e.status == EntryStatus::Current);

    match args.format {
        ReportFormat::Text => {
            for entry in &entries {
                let status = match entry.status {
                    EntryStatus::Current => "current",
                    EntryStatus::Stale => "stale",
                    EntryStatus::Corrupt => "corrupt",
                };
                let source = entry
                    .source
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "<unknown source>".to_string());
                println!("{status:8} {} {source} ({} bytes)", entry.key, entry.size);
            }
            println!(
                "{} entries, {} current",
                entries.len(),
                entries
                    .iter()
                    .filter(|e| e.status == EntryStatus::Current)
                    .count()
            );
        }
        ReportFormat::Json => {
            let report: Vec<serde_json::Value> = entries
                .iter()
                .map(|entry| {
                    serde_json::json!({
                        "key": entry.key,
                        "source": entry.source,
                        "size": entry.size,
                        "status": match entry.status {
                            EntryStatus::Current => "current",
                            EntryStatus::Stale => "stale",
                            EntryStatus::Corrupt => "corrupt",
                        },
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(if all_current { 0 } else { 1 })
}
