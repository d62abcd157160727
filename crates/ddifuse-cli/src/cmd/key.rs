use std::path::Path;

use anyhow::Result;
use clap::Args;
use ddifuse_core::cache::CacheManager;
use ddifuse_core::config::load_config;
use serde::Serialize;

use crate::output::{OutputMode, kv, render};

#[derive(Args, Debug)]
pub struct KeyArgs {
    /// First drug of the pair.
    pub drug_a: String,
    /// Second drug of the pair.
    pub drug_b: String,
}

#[derive(Debug, Serialize)]
struct KeyReport {
    key: String,
    path: String,
}

/// Print the context cache key for a pair; argument order does not matter.
pub fn run_key(args: &KeyArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let mut config = load_config(project_root)?;
    config.apply_env_overrides(|k| std::env::var(k).ok());
    let cache = CacheManager::new(config.cache_root(project_root), config.cache.schema_version);

    let key = cache.context_key(&args.drug_a, &args.drug_b);
    let path = cache.contexts.path_for(&key).display().to_string();
    let report = KeyReport { key, path };
    render(output, &report, |r, w| {
        writeln!(w, "{}", r.key)?;
        kv(w, "path", &r.path)
    })
}
