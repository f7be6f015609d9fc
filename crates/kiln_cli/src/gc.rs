//! The `kiln gc` subcommand.

use crate::GcArgs;
use kiln_common::AssetKey;
use kiln_store::{EntryStatus, IntermediateStore};

/// Removes entries that no longer validate (stale fingerprints or corrupt
/// files). Always exits 0; a failed removal is a hard error.
pub fn run(store: &IntermediateStore, args: &GcArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let entries = store.verify()?;
    let (live, dead): (Vec<_>, Vec<_>) = entries
        .into_iter()
        .partition(|e| e.status == EntryStatus::Current);

    if args.dry_run {
        for entry in &dead {
            println!("would remove {}", entry.key);
        }
        println!("{} entries would be removed, {} kept", dead.len(), live.len());
        return Ok(0);
    }

    let live_keys: Vec<AssetKey> = live
        .iter()
        .filter_map(|e| u64::from_str_radix(&e.key, 16).ok())
        .map(AssetKey::from_raw)
        .collect();
    let removed = store.gc(&live_keys)?;
    println!("{removed} entries removed, {} kept", live.len());
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_store::SourceIdentity;

    fn populate(dir: &std::path::Path, store: &IntermediateStore) -> (SourceIdentity, SourceIdentity) {
        let keep_path = dir.join("keep.hlsl");
        std::fs::write(&keep_path, "keep").unwrap();
        let keep = SourceIdentity::capture(&keep_path);
        store.commit(&keep, b"keep", Vec::new()).unwrap();

        let dead_path = dir.join("dead.hlsl");
        std::fs::write(&dead_path, "v1").unwrap();
        let dead = SourceIdentity::capture(&dead_path);
        store.commit(&dead, b"dead", Vec::new()).unwrap();
        // Source edited after commit: the entry is now stale.
        std::fs::write(&dead_path, "v2").unwrap();

        (keep, dead)
    }

    #[test]
    fn removes_stale_entries_only() {
        let dir = tempfile::tempdir().unwrap();
        let store = IntermediateStore::open(dir.path(), "0.1.0", "debug").unwrap();
        let (keep, dead) = populate(dir.path(), &store);

        assert_eq!(run(&store, &GcArgs { dry_run: false }).unwrap(), 0);
        assert!(store.fetch(&keep).is_some());
        assert!(store.fetch(&SourceIdentity::capture(dead.path())).is_none());
        assert_eq!(store.verify().unwrap().len(), 1);
    }

    #[test]
    fn dry_run_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = IntermediateStore::open(dir.path(), "0.1.0", "debug").unwrap();
        populate(dir.path(), &store);

        assert_eq!(run(&store, &GcArgs { dry_run: true }).unwrap(), 0);
        assert_eq!(store.verify().unwrap().len(), 2);
    }
}
