//! Permission gating for device capabilities.
//!
//! A capture or pick needs camera access plus read and write access to
//! shared media. The broker recomputes the required [`PermissionSet`] for
//! every request, asks the [`PermissionGate`] whether it is already held,
//! and otherwise prompts for the whole set at once.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::broker::{CapabilityKind, Correlation};

/// An OS-level grant the broker may require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Camera,
    WriteMedia,
    ReadMedia,
}

impl Permission {
    /// Every permission, in the order the platform prompt lists them.
    pub const ALL: [Permission; 3] = [
        Permission::Camera,
        Permission::WriteMedia,
        Permission::ReadMedia,
    ];

    /// Manifest identifier used by the host platform.
    pub fn manifest_name(&self) -> &'static str {
        match self {
            Permission::Camera => "android.permission.CAMERA",
            Permission::WriteMedia => "android.permission.WRITE_EXTERNAL_STORAGE",
            Permission::ReadMedia => "android.permission.READ_EXTERNAL_STORAGE",
        }
    }

    /// Reverse lookup of [`manifest_name`](Self::manifest_name).
    pub fn from_manifest_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.manifest_name() == name)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.manifest_name())
    }
}

/// The set of grants a request needs. Prompted for atomically.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PermissionSet {
    permissions: BTreeSet<Permission>,
}

impl PermissionSet {
    /// Create a set from the given permissions.
    pub fn new(permissions: impl IntoIterator<Item = Permission>) -> Self {
        Self {
            permissions: permissions.into_iter().collect(),
        }
    }

    /// Grants required before dispatching `kind`.
    ///
    /// Both capabilities need all three: the capture writes a file into
    /// shared storage and the picker reads from it.
    pub fn required_for(_kind: CapabilityKind) -> Self {
        Self::new(Permission::ALL)
    }

    pub fn contains(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }

    pub fn iter(&self) -> impl Iterator<Item = Permission> + '_ {
        self.permissions.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.permissions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty()
    }

    /// Manifest names in prompt order.
    pub fn manifest_names(&self) -> Vec<&'static str> {
        Permission::ALL
            .into_iter()
            .filter(|p| self.contains(*p))
            .map(|p| p.manifest_name())
            .collect()
    }
}

/// Per-permission answers delivered by a prompt.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PermissionGrants {
    grants: BTreeMap<Permission, bool>,
}

impl PermissionGrants {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grants every permission in `set`.
    pub fn all_granted(set: &PermissionSet) -> Self {
        set.iter().map(|p| (p, true)).collect()
    }

    /// Builder: record an answer for `permission`.
    pub fn with(mut self, permission: Permission, granted: bool) -> Self {
        self.grants.insert(permission, granted);
        self
    }

    pub fn is_granted(&self, permission: Permission) -> bool {
        self.grants.get(&permission).copied().unwrap_or(false)
    }

    /// Required permissions that were refused or never answered.
    pub fn missing(&self, required: &PermissionSet) -> Vec<Permission> {
        required.iter().filter(|p| !self.is_granted(*p)).collect()
    }

    /// True when every required permission was granted. An empty answer
    /// never satisfies a non-empty set.
    pub fn satisfies(&self, required: &PermissionSet) -> bool {
        self.missing(required).is_empty()
    }
}

impl FromIterator<(Permission, bool)> for PermissionGrants {
    fn from_iter<I: IntoIterator<Item = (Permission, bool)>>(iter: I) -> Self {
        Self {
            grants: iter.into_iter().collect(),
        }
    }
}

/// Collaborator that checks and requests OS grants.
///
/// `prompt_for` must answer exactly once, later, through
/// `CapabilityBroker::on_permission_result` with the same correlation.
pub trait PermissionGate: Send + Sync {
    /// Whether every permission in `set` is currently held.
    fn check_granted(&self, set: &PermissionSet) -> bool;

    /// Show the platform prompt for the whole set.
    fn prompt_for(&self, set: &PermissionSet, correlation: &Correlation);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_set_covers_all_grants() {
        let set = PermissionSet::required_for(CapabilityKind::Pick);
        assert_eq!(set.len(), 3);
        assert!(set.contains(Permission::Camera));
        assert!(set.contains(Permission::ReadMedia));
        assert!(set.contains(Permission::WriteMedia));
        assert_eq!(
            set.manifest_names(),
            vec![
                "android.permission.CAMERA",
                "android.permission.WRITE_EXTERNAL_STORAGE",
                "android.permission.READ_EXTERNAL_STORAGE",
            ]
        );
    }

    #[test]
    fn test_manifest_name_lookup() {
        for permission in Permission::ALL {
            assert_eq!(
                Permission::from_manifest_name(permission.manifest_name()),
                Some(permission)
            );
        }
        assert_eq!(Permission::from_manifest_name("android.permission.INTERNET"), None);
    }

    #[test]
    fn test_any_refusal_fails_the_set() {
        let required = PermissionSet::required_for(CapabilityKind::Capture);
        for refused in Permission::ALL {
            let grants: PermissionGrants = Permission::ALL
                .into_iter()
                .map(|p| (p, p != refused))
                .collect();
            assert!(!grants.satisfies(&required));
            assert_eq!(grants.missing(&required), vec![refused]);
        }
        assert!(PermissionGrants::all_granted(&required).satisfies(&required));
    }

    #[test]
    fn test_empty_grants_never_satisfy() {
        let required = PermissionSet::required_for(CapabilityKind::Capture);
        assert!(!PermissionGrants::new().satisfies(&required));
        assert!(PermissionGrants::new().satisfies(&PermissionSet::default()));
    }
}
