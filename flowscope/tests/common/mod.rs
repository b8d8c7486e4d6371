//! Fake recipes and directory helpers shared by the integration tests.

#![allow(dead_code)]

use flowscope::prelude::*;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

pub const SLABS_PER_BULK: u32 = 4;

/// Splits a bulk structure into its slabs.
pub fn make_slabs(bulk: u32) -> Vec<u32> {
    (0..SLABS_PER_BULK).map(|i| bulk * 100 + i).collect()
}

pub fn relax_job(slab: u32) -> anyhow::Result<PathBuf> {
    write_result(slab, "relaxed")
}

pub fn static_job(slab: u32) -> anyhow::Result<PathBuf> {
    write_result(slab, "static")
}

pub async fn relax_job_async(slab: u32) -> anyhow::Result<PathBuf> {
    tokio::task::yield_now().await;
    write_result(slab, "relaxed")
}

pub async fn static_job_async(slab: u32) -> anyhow::Result<PathBuf> {
    tokio::task::yield_now().await;
    write_result(slab, "static")
}

fn write_result(slab: u32, label: &str) -> anyhow::Result<PathBuf> {
    let dir = make_job_dir()?;
    fs::write(dir.join("result.txt"), format!("{label} {slab}"))?;
    Ok(dir)
}

/// The job directories one `bulk_to_slabs_flow` run produces, relative to
/// its base directory.
pub fn expected_bulk_to_slabs_dirs() -> BTreeSet<String> {
    (0..SLABS_PER_BULK)
        .flat_map(|i| {
            [
                format!("bulk_to_slabs_flow/bulk_to_slabs_subflow/relax_job-{i}"),
                format!("bulk_to_slabs_flow/bulk_to_slabs_subflow/static_job-{i}"),
            ]
        })
        .collect()
}

/// Returns every directory under `root` that has no subdirectories, as
/// `/`-separated paths relative to `root`.
pub fn leaf_dirs(root: &Path) -> BTreeSet<String> {
    let mut leaves = BTreeSet::new();
    collect_leaves(root, root, &mut leaves);
    leaves
}

fn collect_leaves(root: &Path, dir: &Path, leaves: &mut BTreeSet<String>) {
    let subdirs: Vec<PathBuf> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| path.is_dir())
        .collect();

    if subdirs.is_empty() && dir != root {
        let relative = dir.strip_prefix(root).unwrap();
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        leaves.insert(parts.join("/"));
    }
    for sub in subdirs {
        collect_leaves(root, &sub, leaves);
    }
}

/// Names of the immediate subdirectories of `root`.
pub fn child_dirs(root: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(root)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| path.is_dir())
        .map(|path| path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
