//! Where the list of experiments to run comes from

use super::Settings;
use crate::unlearn::Method;
use crate::{Error, Result};
use std::path::PathBuf;
use std::str::FromStr;

/// Source of the experiment list, parsed from `--load`
#[derive(Debug, Clone, PartialEq)]
pub enum ExperimentSource {
    /// `""`: a single experiment from the command-line flags
    CommandLine,
    /// `exp`: one experiment per unlearning method
    BuiltIn,
    /// An inline JSON list of override objects
    Inline(Vec<serde_json::Value>),
    /// A JSON file holding a list of override objects
    File(PathBuf),
}

impl FromStr for ExperimentSource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        Ok(match s {
            "" => Self::CommandLine,
            "exp" => Self::BuiltIn,
            _ if s.starts_with('[') => Self::Inline(parse_list(s)?),
            _ => Self::File(PathBuf::from(s)),
        })
    }
}

fn parse_list(content: &str) -> Result<Vec<serde_json::Value>> {
    serde_json::from_str(content)
        .map_err(|e| Error::Config(format!("experiments must be a JSON list of objects: {e}")))
}

impl ExperimentSource {
    /// Expand into validated settings, each layered onto `command_line`
    pub fn experiments(&self, command_line: &Settings) -> Result<Vec<Settings>> {
        let overrides = match self {
            Self::CommandLine => {
                command_line.validate()?;
                return Ok(vec![command_line.clone()]);
            }
            Self::BuiltIn => Method::ALL
                .iter()
                .map(|m| serde_json::json!({ "method": m.name() }))
                .collect(),
            Self::Inline(list) => list.clone(),
            Self::File(path) => {
                if !path.exists() {
                    return Err(Error::Config(format!(
                        "experiment file {} does not exist",
                        path.display()
                    )));
                }
                parse_list(&std::fs::read_to_string(path)?)?
            }
        };
        if overrides.is_empty() {
            return Err(Error::Config("experiment list is empty".into()));
        }
        overrides.iter().map(|o| command_line.with_overrides(o)).collect()
    }

    pub fn describe(&self) -> String {
        match self {
            Self::CommandLine => "command line".to_string(),
            Self::BuiltIn => "built-in experiment set".to_string(),
            Self::Inline(list) => format!("inline list of {}", list.len()),
            Self::File(path) => path.display().to_string(),
        }
    }
}
