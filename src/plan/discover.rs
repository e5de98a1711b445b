//! Plan file discovery for the dashboard launch form

use std::path::Path;

use walkdir::{DirEntry, WalkDir};

/// Suffix identifying plan files
pub const PLAN_SUFFIX: &str = ".config.json";

const SKIPPED_DIRS: &[&str] = &["node_modules", "target", "dist", "build"];

fn is_skipped(entry: &DirEntry) -> bool {
    if entry.depth() == 0 {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || (entry.file_type().is_dir() && SKIPPED_DIRS.contains(&name.as_ref()))
}

/// Plan files under `root` (at most two directory levels down), as sorted
/// paths relative to `root`
pub fn discover_plan_files(root: &Path) -> Vec<String> {
    let mut found: Vec<String> = WalkDir::new(root)
        .max_depth(3)
        .into_iter()
        .filter_entry(|entry| !is_skipped(entry))
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| entry.file_name().to_string_lossy().ends_with(PLAN_SUFFIX))
        .filter_map(|entry| {
            entry
                .path()
                .strip_prefix(root)
                .ok()
                .map(|p| p.to_string_lossy().into_owned())
        })
        .collect();
    found.sort();
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_discovers_nested_and_skips_ignored_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("plans/basic")).unwrap();
        fs::create_dir_all(root.join("plans/basic/too/deep")).unwrap();
        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::create_dir_all(root.join(".hidden")).unwrap();

        fs::write(root.join("top.config.json"), "{}").unwrap();
        fs::write(root.join("plans/basic/rp.config.json"), "{}").unwrap();
        fs::write(root.join("plans/basic/too/deep/x.config.json"), "{}").unwrap();
        fs::write(root.join("node_modules/pkg/y.config.json"), "{}").unwrap();
        fs::write(root.join(".hidden/z.config.json"), "{}").unwrap();
        fs::write(root.join("plans/notes.json"), "{}").unwrap();

        let found = discover_plan_files(root);
        let expected = vec![
            Path::new("plans").join("basic").join("rp.config.json").to_string_lossy().into_owned(),
            "top.config.json".to_string(),
        ];
        assert_eq!(found, expected);
    }
}
