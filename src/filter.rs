use crate::model::{ChangeSet, Changelog};

/// Changesets of `changelog` that apply to `database`, in their original
/// order. The changelog itself is left as parsed.
pub fn filter_for_database<'a>(changelog: &'a Changelog, database: &str) -> Vec<&'a ChangeSet> {
    changelog
        .change_sets
        .iter()
        .filter(|cs| cs.applies_to(database))
        .collect()
}

/// Copies of `retained` whose recorded path is `target_filename`.
pub fn rewrite_paths(retained: &[&ChangeSet], target_filename: &str) -> Vec<ChangeSet> {
    retained
        .iter()
        .map(|cs| ChangeSet {
            file_path: target_filename.to_string(),
            ..(*cs).clone()
        })
        .collect()
}
