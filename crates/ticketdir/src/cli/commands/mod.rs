pub mod build;
pub mod render;

use std::path::Path;

use anyhow::Result;

use crate::clean::CleanerRules;
use crate::config::RuntimePaths;

fn load_rules(rules_path: Option<&Path>, runtime_paths: &RuntimePaths) -> Result<CleanerRules> {
    match rules_path {
        Some(path) => CleanerRules::load(&runtime_paths.resolve(path)?),
        None => Ok(CleanerRules::default()),
    }
}
