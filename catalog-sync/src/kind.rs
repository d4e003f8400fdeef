//! Entity kinds and instance origins.

use serde::{Deserialize, Serialize};

/// The closed set of entity kinds a catalog instance exposes.
///
/// Every record belongs to exactly one kind. The string forms double as
/// transformation-config keys and as the embedded-object keys that mark a
/// nested child of another kind (e.g. the `users` list inside an
/// organization).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Users,
    Groups,
    Organizations,
    Packages,
    Resources,
}

impl EntityKind {
    /// Every kind.
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Users,
        EntityKind::Groups,
        EntityKind::Organizations,
        EntityKind::Packages,
        EntityKind::Resources,
    ];

    /// Kinds processed as top-level datasets, in dependency order so that a
    /// kind's ID-reference targets are cached before its delta materializes.
    /// Resources ride inside packages and never appear here.
    pub const SYNC_ORDER: [EntityKind; 4] = [
        EntityKind::Users,
        EntityKind::Groups,
        EntityKind::Organizations,
        EntityKind::Packages,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Users => "users",
            EntityKind::Groups => "groups",
            EntityKind::Organizations => "organizations",
            EntityKind::Packages => "packages",
            EntityKind::Resources => "resources",
        }
    }

    /// Parse a config key or embedded-object key into a kind.
    pub fn parse(name: &str) -> Option<EntityKind> {
        match name {
            "users" => Some(EntityKind::Users),
            "groups" => Some(EntityKind::Groups),
            "organizations" => Some(EntityKind::Organizations),
            "packages" => Some(EntityKind::Packages),
            "resources" => Some(EntityKind::Resources),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which catalog instance a piece of data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Origin {
    Src,
    Dest,
}

impl Origin {
    pub const BOTH: [Origin; 2] = [Origin::Src, Origin::Dest];

    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::Src => "src",
            Origin::Dest => "dest",
        }
    }
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
