//! Fresh names and visibility for synthesized members.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Generates names that cannot collide with each other.
///
/// Every generated name either starts with `$` or contains one, which the
/// source language does not allow in identifiers.
#[derive(Debug, Default)]
pub struct NameGen {
    used: HashMap<String, u32>,
}

impl NameGen {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `base` the first time, then `base$1`, `base$2`, ...
    pub fn fresh(&mut self, base: &str) -> String {
        let count = self.used.entry(base.to_owned()).or_insert(0);
        let name = if *count == 0 {
            base.to_owned()
        } else {
            format!("{base}${count}")
        };
        *count += 1;
        name
    }

    /// Name of the state-machine type synthesized for `method`.
    pub fn state_machine_type(&mut self, method: &str) -> String {
        self.fresh(&format!("{method}$Iterator"))
    }

    /// Name of a field that holds a hoisted variable.
    pub fn hoisted_field(&mut self, variable: &str) -> String {
        self.fresh(variable)
    }

    /// Name of the field remembering a parameter's original argument.
    pub fn proxy_field(&mut self, parameter: &str) -> String {
        self.fresh(&format!("{parameter}$init"))
    }

    /// Name of an extracted cleanup method.
    pub fn finally_method(&mut self) -> String {
        self.fresh("$finally")
    }
}

/// Accessibility of a synthesized declaration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Visibility {
    Public,
    /// Visible to the enclosing compilation unit only.
    Internal,
    Private,
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Visibility::Public => write!(f, "public"),
            Visibility::Internal => write!(f, "internal"),
            Visibility::Private => write!(f, "private"),
        }
    }
}

/// Decides the accessibility of generated members. Nothing generated is public.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VisibilityPolicy {
    pub state_machine_type: Visibility,
    /// Fields are written by the kick-off body, which lives outside the type.
    pub fields: Visibility,
    pub constructor: Visibility,
    /// Protocol methods are explicit interface implementations.
    pub protocol_methods: Visibility,
    pub helper_methods: Visibility,
}

impl Default for VisibilityPolicy {
    fn default() -> Self {
        Self {
            state_machine_type: Visibility::Private,
            fields: Visibility::Internal,
            constructor: Visibility::Internal,
            protocol_methods: Visibility::Private,
            helper_methods: Visibility::Private,
        }
    }
}
