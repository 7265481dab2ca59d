//! Per-step pre-processing.
//!
//! A transform is a pure `&Table -> Result<Table>` function applied to the
//! plan's table before one step runs. It is either attached directly or named
//! and resolved through a [`TransformRegistry`] handed to the plan.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{Result, TermError};
use crate::table::Table;

pub type TransformFn = Arc<dyn Fn(&Table) -> Result<Table> + Send + Sync>;

#[derive(Clone)]
pub enum Preprocess {
    Function(TransformFn),
    Named(String),
}

impl Preprocess {
    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&Table) -> Result<Table> + Send + Sync + 'static,
    {
        Preprocess::Function(Arc::new(f))
    }

    pub fn named(name: impl Into<String>) -> Self {
        Preprocess::Named(name.into())
    }

    /// Short description used in reports.
    pub fn describe(&self) -> String {
        match self {
            Preprocess::Function(_) => "<function>".to_string(),
            Preprocess::Named(name) => name.clone(),
        }
    }
}

impl fmt::Debug for Preprocess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Preprocess::Function(_) => f.write_str("Preprocess::Function(..)"),
            Preprocess::Named(name) => f.debug_tuple("Preprocess::Named").field(name).finish(),
        }
    }
}

/// Named transforms available to a plan.
#[derive(Clone, Default)]
pub struct TransformRegistry {
    transforms: HashMap<String, TransformFn>,
}

impl TransformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&Table) -> Result<Table> + Send + Sync + 'static,
    {
        self.transforms.insert(name.into(), Arc::new(f));
    }

    /// Builder form of [`register`](Self::register).
    pub fn with<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Table) -> Result<Table> + Send + Sync + 'static,
    {
        self.register(name, f);
        self
    }

    pub fn get(&self, name: &str) -> Option<&TransformFn> {
        self.transforms.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.transforms.contains_key(name)
    }

    /// The function behind `pre`.
    ///
    /// # Errors
    ///
    /// `InvalidSpecification` when a named transform is not registered.
    pub fn resolve(&self, pre: &Preprocess) -> Result<TransformFn> {
        match pre {
            Preprocess::Function(f) => Ok(Arc::clone(f)),
            Preprocess::Named(name) => self.get(name).cloned().ok_or_else(|| {
                TermError::invalid_spec(format!("no pre-processing transform named '{name}'"))
            }),
        }
    }
}

impl fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.transforms.keys().collect();
        names.sort();
        f.debug_struct("TransformRegistry")
            .field("transforms", &names)
            .finish()
    }
}
