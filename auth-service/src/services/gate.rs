//! Authorization gates for the directory dashboards.
//!
//! Gates are pure functions of the requesting [`Actor`] and, where relevant,
//! the target [`Structure`]. They hold no state, never fail and never touch
//! storage. Callers that fetched the resource themselves are responsible for
//! answering "denied" and "not found" identically when existence of the
//! resource is itself sensitive.

use service_core::error::AppError;
use std::fmt;

use crate::models::{Actor, Role, Structure};

/// Message used for every gate denial.
pub const ACCESS_DENIED_MESSAGE: &str = "You are not allowed to perform this action.";

/// Named gates, as request layers refer to them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GateName {
    ManageAdminDashboard,
    ManageOwnStructure,
}

impl GateName {
    pub fn as_str(&self) -> &'static str {
        match self {
            GateName::ManageAdminDashboard => "manage-admin-dashboard",
            GateName::ManageOwnStructure => "manage-own-structure",
        }
    }

    /// Pair the name with an optional target. Gates that take no resource ignore it.
    pub fn with_resource<'a>(&self, resource: Option<&'a Structure>) -> Ability<'a> {
        match self {
            GateName::ManageAdminDashboard => Ability::ManageAdminDashboard,
            GateName::ManageOwnStructure => Ability::ManageOwnStructure(resource),
        }
    }
}

impl fmt::Display for GateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for GateName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manage-admin-dashboard" => Ok(GateName::ManageAdminDashboard),
            "manage-own-structure" => Ok(GateName::ManageOwnStructure),
            _ => Err(format!("Unknown gate: {}", s)),
        }
    }
}

/// An action to be checked, together with the resource it targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ability<'a> {
    /// Anything under the admin dashboard.
    ManageAdminDashboard,
    /// Mutations on a structure the actor owns. `None` gates category access
    /// only, e.g. a listing endpoint; the caller must check ownership itself
    /// once it knows the target.
    ManageOwnStructure(Option<&'a Structure>),
}

impl Ability<'_> {
    pub fn name(&self) -> GateName {
        match self {
            Ability::ManageAdminDashboard => GateName::ManageAdminDashboard,
            Ability::ManageOwnStructure(_) => GateName::ManageOwnStructure,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Gate;

impl Gate {
    pub fn can(actor: &Actor, ability: Ability<'_>) -> bool {
        let allowed = match ability {
            Ability::ManageAdminDashboard => Self::manage_admin_dashboard(actor),
            Ability::ManageOwnStructure(resource) => Self::manage_own_structure(actor, resource),
        };

        if !allowed {
            tracing::debug!(
                actor_id = %actor.id,
                role = %actor.role,
                gate = %ability.name(),
                "Gate denied"
            );
        }
        allowed
    }

    /// Entry point for layers that still carry gate names as strings.
    /// Unknown names are denied.
    pub fn can_named(actor: &Actor, name: &str, resource: Option<&Structure>) -> bool {
        match name.parse::<GateName>() {
            Ok(gate) => Self::can(actor, gate.with_resource(resource)),
            Err(e) => {
                tracing::warn!(actor_id = %actor.id, error = %e, "Unknown gate requested");
                false
            }
        }
    }

    /// [`Gate::can`], with a denial turned into a 403.
    pub fn authorize(actor: &Actor, ability: Ability<'_>) -> Result<(), AppError> {
        if Self::can(actor, ability) {
            Ok(())
        } else {
            Err(AppError::Forbidden(anyhow::anyhow!(ACCESS_DENIED_MESSAGE)))
        }
    }

    fn manage_admin_dashboard(actor: &Actor) -> bool {
        match actor.role {
            Role::Admin => true,
            Role::HealthStructure | Role::Standard => false,
        }
    }

    fn manage_own_structure(actor: &Actor, resource: Option<&Structure>) -> bool {
        match actor.role {
            Role::HealthStructure => resource.map_or(true, |s| s.is_owned_by(actor.id)),
            Role::Admin | Role::Standard => false,
        }
    }
}
