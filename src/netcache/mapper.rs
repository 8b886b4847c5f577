//! Archetype-keyed property resolution with memoization.
//!
//! Actors are spawned from archetype paths such as
//! `Archetypes.Car.Car_Default`, while the net cache is keyed by class
//! names. [`archetype_to_class`] bridges the two and [`PropertyMapper`]
//! caches the resolved property map per archetype for the lifetime of one
//! decode.
//!
//! # Archetype naming
//!
//! A handful of archetypes map to fixed classes. Every other archetype maps
//! to `.` followed by its last path segment, which the tree matches as a
//! class-name suffix. Replays in the wild also suggest a suffix
//! normalisation (`_Default` to `_TA`, dropping `Archetype`, `_0` and
//! `Default__`), but the established behaviour leaves the segment verbatim.
//! [`ArchetypeNaming::Verbatim`] is the default; [`ArchetypeNaming::Normalized`]
//! exists so the two can be compared against real captures.

use std::collections::HashMap;

use crate::error::{ParserError, Result};
use crate::netcache::{NetCacheTree, ResolvedPropertyMap};

/// Archetypes whose class cannot be derived from their path.
const SPECIAL_ARCHETYPES: [(&str, &str); 4] = [
    (
        "GameInfo_Soccar.GameInfo.GameInfo_Soccar:GameReplicationInfoArchetype",
        "TAGame.GRI_TA",
    ),
    (
        "GameInfo_Season.GameInfo.GameInfo_Season:GameReplicationInfoArchetype",
        "TAGame.GRI_TA",
    ),
    (
        "Archetypes.GameEvent.GameEvent_Season:CarArchetype",
        "TAGame.Car_Season_TA",
    ),
    ("Archetypes.Ball.CubeBall", "TAGame.Ball_TA"),
];

/// How the fallback path derives a class name from an archetype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArchetypeNaming {
    /// Use the last path segment unchanged.
    #[default]
    Verbatim,
    /// Rewrite the last path segment's suffixes first.
    Normalized,
}

/// Maps an archetype path to the net-cache class name used for resolution.
///
/// # Example
///
/// ```
/// use rl_replay_parser::netcache::{archetype_to_class, ArchetypeNaming};
///
/// assert_eq!(
///     archetype_to_class("Archetypes.Ball.CubeBall", ArchetypeNaming::Verbatim),
///     "TAGame.Ball_TA"
/// );
/// assert_eq!(
///     archetype_to_class("TAGame.Default__PRI_TA", ArchetypeNaming::Verbatim),
///     ".Default__PRI_TA"
/// );
/// ```
#[must_use]
pub fn archetype_to_class(archetype: &str, naming: ArchetypeNaming) -> String {
    if let Some((_, class)) = SPECIAL_ARCHETYPES
        .iter()
        .find(|(special, _)| *special == archetype)
    {
        return (*class).to_string();
    }

    let segment = archetype
        .rsplit('.')
        .next()
        .and_then(|tail| tail.rsplit(':').next())
        .unwrap_or(archetype);

    match naming {
        ArchetypeNaming::Verbatim => format!(".{segment}"),
        ArchetypeNaming::Normalized => format!(".{}", normalize_segment(segment)),
    }
}

fn normalize_segment(segment: &str) -> String {
    segment
        .replace("_Default", "_TA")
        .replace("Archetype", "")
        .replace("_0", "")
        .replace('0', "_TA")
        .replace('1', "_TA")
        .replace("Default__", "")
}

/// Resolves on-wire property ids for actors of a given archetype.
///
/// One mapper belongs to one decode session; its cache is never shared
/// between replays.
#[derive(Debug)]
pub struct PropertyMapper<'t> {
    tree: &'t NetCacheTree,
    naming: ArchetypeNaming,
    memo: HashMap<String, ResolvedPropertyMap>,
}

impl<'t> PropertyMapper<'t> {
    /// Creates a mapper with verbatim archetype naming.
    #[must_use]
    pub fn new(tree: &'t NetCacheTree) -> Self {
        Self::with_naming(tree, ArchetypeNaming::default())
    }

    /// Creates a mapper with the given archetype naming.
    #[must_use]
    pub fn with_naming(tree: &'t NetCacheTree, naming: ArchetypeNaming) -> Self {
        PropertyMapper {
            tree,
            naming,
            memo: HashMap::new(),
        }
    }

    /// Net-cache class name for `archetype`.
    #[must_use]
    pub fn class_for(&self, archetype: &str) -> String {
        archetype_to_class(archetype, self.naming)
    }

    /// The resolved property map for `archetype`, computed on first use.
    ///
    /// # Errors
    ///
    /// Returns `ParserError::UnknownClass` if the archetype's class is not in the tree.
    pub fn resolved(&mut self, archetype: &str) -> Result<&ResolvedPropertyMap> {
        if !self.memo.contains_key(archetype) {
            let class_name = self.class_for(archetype);
            let map = self.tree.resolve(&class_name)?;
            self.memo.insert(archetype.to_string(), map);
        }
        self.memo
            .get(archetype)
            .ok_or_else(|| ParserError::UnknownClass {
                class_name: self.class_for(archetype),
            })
    }

    /// Object-table index of wire property `prop_id` on `archetype`.
    ///
    /// # Errors
    ///
    /// - `ParserError::UnknownClass` if the archetype's class is not in the tree
    /// - `ParserError::UnmappedProperty` if `prop_id` is absent from the resolved map
    pub fn get_property_name(&mut self, archetype: &str, prop_id: u32) -> Result<u32> {
        self.resolved(archetype)?
            .get(&prop_id)
            .copied()
            .ok_or_else(|| ParserError::UnmappedProperty {
                archetype: archetype.to_string(),
                prop_id,
            })
    }

    /// Highest wire property id valid for `archetype`, or 0 if it has none.
    ///
    /// # Errors
    ///
    /// Returns `ParserError::UnknownClass` if the archetype's class is not in the tree.
    pub fn max_property_id(&mut self, archetype: &str) -> Result<u32> {
        Ok(self
            .resolved(archetype)?
            .keys()
            .next_back()
            .copied()
            .unwrap_or(0))
    }

    /// Number of archetypes resolved so far.
    #[must_use]
    pub fn cached(&self) -> usize {
        self.memo.len()
    }
}
