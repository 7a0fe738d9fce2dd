//! Role-based authorization.
//!
//! Each command declares default roles on its [`CommandDescriptor`]. A
//! configuration table keyed by command name may override them: when the
//! table has an entry for a command, that entry alone decides, and an empty
//! list makes the command public.

use std::collections::{HashMap, HashSet};

use hexbot_core::{RoleId, UserId};

use crate::command::CommandDescriptor;
use crate::error::DispatchError;

/// Maps command names to the roles allowed to run them.
#[derive(Debug, Clone, Default)]
pub struct PermissionStore {
    overrides: HashMap<String, HashSet<RoleId>>,
}

impl PermissionStore {
    /// Creates a store with no overrides.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store from a `command -> roles` table.
    pub fn from_table<I, K, R, V>(table: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: IntoIterator<Item = R>,
        R: Into<RoleId>,
    {
        let overrides = table
            .into_iter()
            .map(|(command, roles)| {
                (
                    command.into(),
                    roles.into_iter().map(Into::into).collect(),
                )
            })
            .collect();
        Self { overrides }
    }

    /// Sets the roles for one command, replacing any previous entry.
    pub fn with_command<I, R>(mut self, command: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<RoleId>,
    {
        self.overrides
            .insert(command.into(), roles.into_iter().map(Into::into).collect());
        self
    }

    /// Returns `true` if the table has an entry for `command`.
    pub fn overrides(&self, command: &str) -> bool {
        self.overrides.contains_key(command)
    }

    /// Returns `true` if anyone may run the command.
    pub fn is_public(&self, descriptor: &CommandDescriptor) -> bool {
        match self.overrides.get(descriptor.name()) {
            Some(roles) => roles.is_empty(),
            None => descriptor.required_roles().is_empty(),
        }
    }

    /// Returns `true` if a user holding `user_roles` may run the command.
    pub fn is_authorized(&self, descriptor: &CommandDescriptor, user_roles: &[RoleId]) -> bool {
        match self.overrides.get(descriptor.name()) {
            Some(roles) => roles.is_empty() || user_roles.iter().any(|r| roles.contains(r)),
            None => {
                let required = descriptor.required_roles();
                required.is_empty() || user_roles.iter().any(|r| required.contains(r))
            }
        }
    }

    /// Like [`is_authorized`](Self::is_authorized), but returns the dispatch
    /// error on refusal.
    pub fn authorize(
        &self,
        descriptor: &CommandDescriptor,
        user: &UserId,
        user_roles: &[RoleId],
    ) -> Result<(), DispatchError> {
        if self.is_authorized(descriptor, user_roles) {
            Ok(())
        } else {
            Err(DispatchError::Unauthorized {
                command: descriptor.name().to_string(),
                user: user.clone(),
            })
        }
    }

    pub fn len(&self) -> usize {
        self.overrides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }
}
