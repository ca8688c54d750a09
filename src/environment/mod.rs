//! Named variable environments and `{{placeholder}}` substitution
//!
//! An [`EnvironmentStore`] holds an ordered list of environments, exactly one
//! of which is active. Scripts write into the active environment through
//! [`EnvironmentStore::set_variable`], and every later substitution in the
//! same run observes those writes.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use thiserror::Error;

static PLACEHOLDER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{(\w+)\}\}").expect("placeholder pattern is valid")
});

/// Name given to the environment created for an empty store
pub const DEFAULT_ENVIRONMENT: &str = "Default";

/// Environment store errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvironmentError {
    #[error("environment index {index} out of range ({len} environments)")]
    OutOfRange { index: usize, len: usize },

    #[error("environment not found: {0}")]
    NotFound(String),

    #[error("cannot remove the last environment")]
    LastEnvironment,
}

/// A named set of variables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub name: String,
    #[serde(default)]
    pub variables: IndexMap<String, String>,
}

impl Environment {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variables: IndexMap::new(),
        }
    }

    /// Builder-style variable insertion
    pub fn with_variable(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }
}

/// Ordered environments plus the index of the active one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentStore {
    environments: Vec<Environment>,
    active: usize,
}

impl Default for EnvironmentStore {
    fn default() -> Self {
        Self {
            environments: vec![Environment::new(DEFAULT_ENVIRONMENT)],
            active: 0,
        }
    }
}

impl EnvironmentStore {
    /// Create a store from persisted environments.
    ///
    /// An empty list yields the default store; an out-of-range active index
    /// falls back to the first environment.
    pub fn new(environments: Vec<Environment>, active: usize) -> Self {
        if environments.is_empty() {
            return Self::default();
        }
        let active = if active < environments.len() { active } else { 0 };
        Self { environments, active }
    }

    pub fn environments(&self) -> &[Environment] {
        &self.environments
    }

    pub fn len(&self) -> usize {
        self.environments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.environments.is_empty()
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn active(&self) -> &Environment {
        &self.environments[self.active]
    }

    /// Snapshot of the active environment's variables
    pub fn variables(&self) -> IndexMap<String, String> {
        self.active().variables.clone()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.active().variables.get(key).map(String::as_str)
    }

    /// Replace every `{{name}}` with the active environment's value.
    ///
    /// Unknown names are left untouched.
    pub fn substitute(&self, text: &str) -> String {
        if !text.contains("{{") {
            return text.to_string();
        }
        let variables = &self.active().variables;
        PLACEHOLDER_RE
            .replace_all(text, |caps: &Captures<'_>| match variables.get(&caps[1]) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            })
            .into_owned()
    }

    /// Set a variable on the active environment
    pub fn set_variable(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let active = self.active;
        self.environments[active]
            .variables
            .insert(key.into(), value.into());
    }

    /// Remove a variable from the active environment
    pub fn unset_variable(&mut self, key: &str) -> Option<String> {
        let active = self.active;
        self.environments[active].variables.shift_remove(key)
    }

    pub fn switch_active(&mut self, index: usize) -> Result<(), EnvironmentError> {
        if index >= self.environments.len() {
            return Err(EnvironmentError::OutOfRange {
                index,
                len: self.environments.len(),
            });
        }
        self.active = index;
        Ok(())
    }

    /// Find an environment index by exact name
    pub fn find(&self, name: &str) -> Option<usize> {
        self.environments.iter().position(|env| env.name == name)
    }

    /// Resolve a user-supplied selector: an environment name or a 1-based
    /// position
    pub fn resolve(&self, selector: &str) -> Result<usize, EnvironmentError> {
        if let Some(index) = self.find(selector) {
            return Ok(index);
        }
        match selector.parse::<usize>() {
            Ok(n) if n >= 1 && n <= self.environments.len() => Ok(n - 1),
            Ok(n) => Err(EnvironmentError::OutOfRange {
                index: n.saturating_sub(1),
                len: self.environments.len(),
            }),
            Err(_) => Err(EnvironmentError::NotFound(selector.to_string())),
        }
    }

    /// Append an environment and return its index
    pub fn add(&mut self, environment: Environment) -> usize {
        self.environments.push(environment);
        self.environments.len() - 1
    }

    pub fn remove(&mut self, index: usize) -> Result<Environment, EnvironmentError> {
        if index >= self.environments.len() {
            return Err(EnvironmentError::OutOfRange {
                index,
                len: self.environments.len(),
            });
        }
        if self.environments.len() == 1 {
            return Err(EnvironmentError::LastEnvironment);
        }
        let removed = self.environments.remove(index);
        if self.active > index || self.active >= self.environments.len() {
            self.active = self.active.saturating_sub(1);
        }
        Ok(removed)
    }
}
