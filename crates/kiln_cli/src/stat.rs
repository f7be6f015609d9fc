//! The `kiln stat` subcommand.

use kiln_store::{EntryStatus, IntermediateStore};

/// Prints a summary of the store namespace. Always exits 0.
pub fn run(store: &IntermediateStore) -> Result<i32, Box<dyn std::error::Error>> {
    let entries = store.verify()?;
    let total_bytes: u64 = entries.iter().map(|e| e.size).sum();
    let count_of = |status: EntryStatus| entries.iter().filter(|e| e.status == status).count();

    println!("store: {}", store.namespace_dir().display());
    println!("entries: {}", entries.len());
    println!("  current: {}", count_of(EntryStatus::Current));
    println!("  stale:   {}", count_of(EntryStatus::Stale));
    println!("  corrupt: {}", count_of(EntryStatus::Corrupt));
    println!("payload bytes: {total_bytes}");
    Ok(0)
}
