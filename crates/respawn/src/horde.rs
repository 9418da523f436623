//! # Horde Types
//!
//! Pool keys, level categories and the pooled body used by the horde demo.

use respawn_core::{Poolable, Prototype};
use respawn_spawner::PrototypeCatalog;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Every pool in the horde demo.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HordeKey {
    /// Logic controller shared by every level.
    Controller,
    /// Farm.
    Chicken,
    /// Farm.
    Pig,
    /// The Beach.
    Crab,
    /// The Beach.
    Gull,
    /// The Wild West.
    Bandit,
    /// The Wild West.
    Coyote,
}

impl HordeKey {
    /// All keys, controller first.
    pub const ALL: [Self; 7] = [
        Self::Controller,
        Self::Chicken,
        Self::Pig,
        Self::Crab,
        Self::Gull,
        Self::Bandit,
        Self::Coyote,
    ];

    /// Catalog name used in configuration files.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Controller => "controller",
            Self::Chicken => "chicken",
            Self::Pig => "pig",
            Self::Crab => "crab",
            Self::Gull => "gull",
            Self::Bandit => "bandit",
            Self::Coyote => "coyote",
        }
    }

    /// Hit points a fresh body starts with.
    #[must_use]
    pub const fn max_hp(self) -> u32 {
        match self {
            Self::Controller => 0,
            Self::Chicken | Self::Gull => 20,
            Self::Crab | Self::Coyote => 40,
            Self::Pig => 60,
            Self::Bandit => 80,
        }
    }
}

/// Level a spawn is drawn for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelType {
    /// Chickens and pigs.
    Farm,
    /// Crabs and gulls.
    TheBeach,
    /// Bandits and coyotes.
    TheWildWest,
}

impl LevelType {
    /// Name as written in configuration files and on the command line.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Farm => "farm",
            Self::TheBeach => "the_beach",
            Self::TheWildWest => "the_wild_west",
        }
    }
}

impl fmt::Display for LevelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LevelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "farm" => Ok(Self::Farm),
            "the_beach" | "beach" => Ok(Self::TheBeach),
            "the_wild_west" | "wild_west" => Ok(Self::TheWildWest),
            other => Err(format!("unknown level: {other}")),
        }
    }
}

/// Pooled body of a controller or an actor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HordeBody {
    /// Pool the body belongs to.
    pub kind: HordeKey,
    /// Current hit points.
    pub hp: u32,
    /// Hit points restored on every spawn.
    pub max_hp: u32,
    /// Times this body has been handed out.
    pub lives: u32,
}

impl HordeBody {
    /// Returns true while the body can take hits.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.hp > 0
    }

    /// Applies damage, returning true if it was lethal.
    pub fn hit(&mut self, damage: u32) -> bool {
        self.hp = self.hp.saturating_sub(damage);
        self.hp == 0
    }
}

impl Poolable for HordeBody {
    fn on_get_from_pool(&mut self) {
        self.hp = self.max_hp;
        self.lives += 1;
    }

    fn on_return_to_pool(&mut self) {
        self.hp = 0;
    }
}

/// Prototype stamping [`HordeBody`] values for one key.
#[derive(Clone, Copy, Debug)]
pub struct BodyPrototype {
    key: HordeKey,
}

impl BodyPrototype {
    /// Prototype for `key`.
    #[must_use]
    pub const fn new(key: HordeKey) -> Self {
        Self { key }
    }
}

impl Prototype<HordeKey, HordeBody> for BodyPrototype {
    fn key(&self) -> HordeKey {
        self.key
    }

    fn instantiate(&self) -> HordeBody {
        HordeBody {
            kind: self.key,
            hp: 0,
            max_hp: self.key.max_hp(),
            lives: 0,
        }
    }
}

/// Catalog with one prototype per [`HordeKey`], registered by name.
#[must_use]
pub fn catalog() -> PrototypeCatalog<HordeKey, HordeBody> {
    let mut catalog = PrototypeCatalog::new();
    for key in HordeKey::ALL {
        catalog.register(key.name(), Arc::new(BodyPrototype::new(key)));
    }
    catalog
}
