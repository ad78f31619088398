//! Builder definitions and per-build properties.

use std::collections::HashMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::plan::BuildSequence;

/// A builder definition: what to build and where it may run. Defined once at
/// configuration time; the assembler turns its sequences into a reusable
/// plan template at registration.
#[derive(Debug, Clone)]
pub struct Builder {
    pub name: String,
    /// Capacity cost claimed against a worker, fixed at registration.
    pub job_weight: u32,
    pub sequences: Vec<BuildSequence>,
    /// Names of workers this builder may dispatch to, bound from the pool
    /// at registration time.
    pub eligible_workers: Vec<String>,
    pub tags: Vec<String>,
    /// Default for the package-saving predicate.
    pub save_packages: bool,
}

impl Builder {
    pub fn new(name: impl Into<String>, job_weight: u32) -> Self {
        Self {
            name: name.into(),
            job_weight,
            sequences: Vec::new(),
            eligible_workers: Vec::new(),
            tags: Vec::new(),
            save_packages: false,
        }
    }

    pub fn with_sequence(mut self, sequence: BuildSequence) -> Self {
        self.sequences.push(sequence);
        self
    }

    pub fn with_workers(mut self, workers: Vec<String>) -> Self {
        self.eligible_workers = workers;
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_save_packages(mut self, save: bool) -> Self {
        self.save_packages = save;
        self
    }
}

/// Placeholder values resolved per triggered build.
///
/// Plan templates carry `${{ name }}` placeholders in argv and env values;
/// materialization stamps them with the triggered build's properties.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildProperties {
    values: HashMap<String, String>,
}

impl BuildProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn branch(&self) -> Option<&str> {
        self.get("branch")
    }

    pub fn build_number(&self) -> Option<&str> {
        self.get("build_number")
    }

    /// Resolve `${{ name }}` placeholders. Unknown placeholders resolve to
    /// the empty string.
    pub fn interpolate(&self, input: &str) -> String {
        let re = Regex::new(r"\$\{\{\s*([^}\s][^}]*?)\s*\}\}").unwrap();
        re.replace_all(input, |caps: &regex::Captures| {
            let key = caps.get(1).map_or("", |m| m.as_str());
            self.get(key).unwrap_or_default().to_string()
        })
        .to_string()
    }
}
