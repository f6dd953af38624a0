//! `catalog.json` directory listings for the results tree, so static pages
//! can discover files without a directory-listing server.

use crate::config::CatalogOptions;
use crate::error::{RecorderError, RecorderResult};
use serde::Serialize;
use std::fs;
use std::path::Path;

pub const CATALOG_FILENAME: &str = "catalog.json";

#[derive(Debug, Default, Serialize)]
struct Catalog {
    files: Vec<String>,
    folders: Vec<String>,
}

/// Write a `catalog.json` into `root` and every directory below it.
///
/// Each catalog lists the directory's immediate files and subfolders, sorted.
/// Folders named in `dont_catalog` are left out of the listing; folders named
/// in `dont_descend`, and symlinked folders, are not walked into.
pub fn catalog_tree(root: &Path, options: &CatalogOptions) -> RecorderResult<()> {
    let mut names = Vec::new();
    let entries = fs::read_dir(root)
        .map_err(|err| RecorderError::io(format!("failed to list {}", root.display()), err))?;
    for entry in entries {
        let entry = entry
            .map_err(|err| RecorderError::io(format!("failed to list {}", root.display()), err))?;
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();

    let mut catalog = Catalog::default();
    for name in names {
        let full = root.join(&name);
        if full.is_file() {
            catalog.files.push(name);
        } else if full.is_dir() {
            let is_link = fs::symlink_metadata(&full)
                .map(|meta| meta.file_type().is_symlink())
                .unwrap_or(false);
            if !is_link && !options.dont_descend.contains(&name) {
                catalog_tree(&full, options)?;
            }
            if !options.dont_catalog.contains(&name) {
                catalog.folders.push(name);
            }
        }
    }

    let data = serde_json::to_vec_pretty(&catalog)
        .map_err(|err| RecorderError::serialize("failed to serialize catalog", err))?;
    let target = root.join(CATALOG_FILENAME);
    fs::write(&target, data)
        .map_err(|err| RecorderError::io(format!("failed to write {}", target.display()), err))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::indexing_slicing)]
    use super::*;

    fn read_catalog(dir: &Path) -> serde_json::Value {
        serde_json::from_slice(&fs::read(dir.join(CATALOG_FILENAME)).unwrap()).unwrap()
    }

    #[test]
    fn catalogs_recursively_with_skips() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        fs::write(root.join("b.json"), "{}").unwrap();
        fs::write(root.join("a.txt"), "x").unwrap();
        fs::create_dir_all(root.join("logs/inner")).unwrap();
        fs::create_dir_all(root.join("__pycache__")).unwrap();
        fs::create_dir_all(root.join("diagnostics")).unwrap();
        fs::write(root.join("logs/run.log"), "x").unwrap();

        catalog_tree(root, &CatalogOptions::default()).unwrap();

        let top = read_catalog(root);
        assert_eq!(top["files"], serde_json::json!(["a.txt", "b.json"]));
        assert_eq!(top["folders"], serde_json::json!(["diagnostics", "logs"]));

        let logs = read_catalog(&root.join("logs"));
        assert_eq!(logs["files"], serde_json::json!(["run.log"]));
        assert_eq!(logs["folders"], serde_json::json!(["inner"]));
        assert!(root.join("logs/inner").join(CATALOG_FILENAME).exists());

        assert!(!root.join("diagnostics").join(CATALOG_FILENAME).exists());
        assert!(root.join("__pycache__").join(CATALOG_FILENAME).exists());
    }
}
