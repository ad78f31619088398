//! Named option sets for generated commands.
//!
//! Step producers build their argv through a [`FlagSet`] so that the same
//! named option declared twice is caught at assembly time instead of
//! silently overwriting. Some commands legitimately repeat options; those
//! opt in with [`FlagSet::allowing_duplicates`].

use std::collections::HashSet;

use crucible_core::{Error, Result};

/// One named option with an optional rendered value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flag {
    pub name: String,
    pub value: Option<String>,
}

impl Flag {
    pub fn new(name: impl Into<String>, value: Option<String>) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    /// Switch-style flag with no right-hand side, e.g. `--trace`.
    pub fn switch(name: impl Into<String>) -> Self {
        Self::new(name, None)
    }

    /// Rendered argv fragment; an empty value renders nothing, so a flag
    /// can be declared and still disabled.
    fn as_cmd_arg(&self) -> Option<String> {
        match &self.value {
            None => Some(format!("--{}", self.name)),
            Some(value) if value.is_empty() => None,
            Some(value) => Some(format!("--{}={}", self.name, value)),
        }
    }
}

/// Accumulates named options for one generated command.
#[derive(Debug, Clone)]
pub struct FlagSet {
    base_cmd: Vec<String>,
    allow_duplicates: bool,
    names: HashSet<String>,
    flags: Vec<Flag>,
}

impl FlagSet {
    pub fn new(base_cmd: Vec<String>) -> Self {
        Self {
            base_cmd,
            allow_duplicates: false,
            names: HashSet::new(),
            flags: Vec::new(),
        }
    }

    pub fn allowing_duplicates(base_cmd: Vec<String>) -> Self {
        Self {
            allow_duplicates: true,
            ..Self::new(base_cmd)
        }
    }

    /// Append one flag. Re-declaring a name is a configuration error
    /// unless duplicates were explicitly allowed for this set.
    pub fn append(&mut self, flag: Flag) -> Result<()> {
        if !self.allow_duplicates && self.names.contains(&flag.name) {
            // Slow error path: find the existing value only to report it.
            let existing = self
                .flags
                .iter()
                .find(|other| other.name == flag.name)
                .and_then(|other| other.value.clone());
            return Err(Error::DuplicateFlag {
                name: flag.name,
                existing,
                new: flag.value,
            });
        }
        self.names.insert(flag.name.clone());
        self.flags.push(flag);
        Ok(())
    }

    pub fn extend(&mut self, flags: impl IntoIterator<Item = Flag>) -> Result<()> {
        for flag in flags {
            self.append(flag)?;
        }
        Ok(())
    }

    /// The command as argv: base command, then flags sorted by name,
    /// skipping empty renderings.
    pub fn generate(&self) -> Vec<String> {
        let mut result = self.base_cmd.clone();
        let mut flags: Vec<&Flag> = self.flags.iter().collect();
        flags.sort_by(|a, b| a.name.cmp(&b.name));
        result.extend(flags.iter().filter_map(|flag| flag.as_cmd_arg()));
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_generate_sorts_by_name() {
        let mut set = FlagSet::new(vec!["cmake".into()]);
        set.extend([
            Flag::new("parallel", Some("8".into())),
            Flag::switch("trace"),
            Flag::new("build-type", Some("Release".into())),
        ])
        .unwrap();
        assert_eq!(
            set.generate(),
            vec!["cmake", "--build-type=Release", "--parallel=8", "--trace"]
        );
    }

    #[test]
    fn test_duplicate_flag_is_config_error() {
        let mut set = FlagSet::new(vec!["cmake".into()]);
        set.append(Flag::new("parallel", Some("8".into()))).unwrap();
        let err = set
            .append(Flag::new("parallel", Some("16".into())))
            .unwrap_err();
        assert!(matches!(
            err,
            crucible_core::Error::DuplicateFlag { name, .. } if name == "parallel"
        ));
    }

    #[test]
    fn test_duplicates_allowed_when_opted_in() {
        let mut set = FlagSet::allowing_duplicates(vec!["mtr".into()]);
        set.append(Flag::new("mysqld", Some("--a".into()))).unwrap();
        set.append(Flag::new("mysqld", Some("--b".into()))).unwrap();
        assert_eq!(set.generate().len(), 3);
    }

    #[test]
    fn test_empty_value_renders_nothing() {
        let mut set = FlagSet::new(vec!["cmake".into()]);
        set.append(Flag::new("disabled", Some(String::new()))).unwrap();
        assert_eq!(set.generate(), vec!["cmake"]);
    }
}
