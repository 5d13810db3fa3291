//! Border-transition tile selection.
//!
//! A border tile depicts the edge between an outer terrain type and an inner
//! one. Each defined `(outer, inner)` pair owns two adjacent tile ids: the
//! primary id and its alternate at `+1`. Pairs without an entry fall back to
//! the outer type's plain fill.

use std::sync::LazyLock;

use rustc_hash::FxHashMap;
use tessera_terrain::LandscapeType::{self, *};
use thiserror::Error;

/// `(outer, inner, primary tile id)`.
const BORDER_PAIRS: &[(LandscapeType, LandscapeType, u16)] = &[
    // Water depth rings
    (Water1, Water2, 84),
    (Water2, Water1, 86),
    (Water2, Water3, 88),
    (Water3, Water2, 90),
    (Water3, Water4, 92),
    (Water4, Water3, 94),
    (Water4, Water5, 96),
    (Water5, Water4, 98),
    (Water5, Water6, 100),
    (Water6, Water5, 102),
    (Water6, Water7, 104),
    (Water7, Water6, 106),
    (Water7, Water8, 108),
    (Water8, Water7, 110),
    // Coast
    (Water1, Sand, 39),
    (Sand, Water1, 37),
    (Grass, Sand, 114),
    (Sand, Grass, 112),
    // Dry lands
    (Grass, Desert, 181),
    (Desert, Grass, 183),
    (Grass, DryGrass, 116),
    (DryGrass, Grass, 118),
    (DryGrass, Desert, 136),
    (Desert, DryGrass, 138),
    (Earth, Grass, 170),
    (Grass, Earth, 168),
    // Mountains
    (Grass, MountainBorderOuter, 116),
    (MountainBorderOuter, Grass, 118),
    (MountainBorderOuter, MountainBorder, 120),
    (MountainBorder, MountainBorderOuter, 122),
    (MountainBorder, Mountain, 124),
    (Mountain, MountainBorder, 126),
    (Mountain, Snow, 156),
    (Snow, Mountain, 158),
    (Mountain, SnowBorder, 156),
    (SnowBorder, Mountain, 158),
    (SnowBorder, Snow, 160),
    (Snow, SnowBorder, 162),
    (Gravel, MountainBorder, 231),
    (MountainBorder, Gravel, 233),
    // Rivers
    (Grass, River1, 52),
    (River1, Grass, 54),
    (Grass, River2, 56),
    (River2, Grass, 58),
    (Grass, River3, 60),
    (River3, Grass, 62),
    (Grass, River4, 64),
    (River4, Grass, 66),
    (Sand, River1, 68),
    (River1, Sand, 70),
    (Sand, River2, 72),
    (River2, Sand, 74),
    (Sand, River3, 76),
    (River3, Sand, 78),
    (Sand, River4, 80),
    (River4, Sand, 82),
    // Flattened ground
    (Grass, Flattened, 172),
    (Flattened, Grass, 174),
    (Desert, SharpFlattenedDesert, 218),
    (SharpFlattenedDesert, Desert, 220),
    (Desert, FlattenedDesert, 222),
    (FlattenedDesert, Desert, 224),
    // Moor
    (Grass, MoorBorder, 201),
    (MoorBorder, Grass, 203),
    (MoorBorder, MoorInner, 205),
    (MoorInner, MoorBorder, 207),
    (MoorInner, Moor, 209),
    (Moor, MoorInner, 211),
];

static STANDARD: LazyLock<BorderTable> = LazyLock::new(BorderTable::standard);

/// A pair listed twice while building a [`BorderTable`].
#[derive(Debug, Error, PartialEq, Eq)]
#[error("border pair ({outer:?}, {inner:?}) defined twice")]
pub struct DuplicateBorder {
    pub outer: LandscapeType,
    pub inner: LandscapeType,
}

/// Lookup from `(outer, inner)` to the primary border tile id.
#[derive(Debug, Clone)]
pub struct BorderTable {
    pairs: FxHashMap<(LandscapeType, LandscapeType), u16>,
}

impl BorderTable {
    /// Build a table, rejecting any pair listed more than once.
    pub fn from_pairs(
        pairs: &[(LandscapeType, LandscapeType, u16)],
    ) -> Result<Self, DuplicateBorder> {
        let mut map = FxHashMap::default();
        map.reserve(pairs.len());
        for &(outer, inner, id) in pairs {
            if map.insert((outer, inner), id).is_some() {
                return Err(DuplicateBorder { outer, inner });
            }
        }
        Ok(Self { pairs: map })
    }

    /// The built-in landscape border table.
    pub fn standard() -> Self {
        let mut pairs = FxHashMap::default();
        for &(outer, inner, id) in BORDER_PAIRS {
            let previous = pairs.insert((outer, inner), id);
            debug_assert!(
                previous.is_none(),
                "border pair ({outer:?}, {inner:?}) defined twice"
            );
        }
        Self { pairs }
    }

    /// The shared built-in table.
    pub fn global() -> &'static Self {
        &STANDARD
    }

    /// Primary tile id of a defined pair.
    pub fn get(&self, outer: LandscapeType, inner: LandscapeType) -> Option<u16> {
        self.pairs.get(&(outer, inner)).copied()
    }

    /// Tile id for the edge between `outer` and `inner`.
    ///
    /// Undefined pairs use `outer`'s plain image and ignore `use_alternate`.
    pub fn select(&self, outer: LandscapeType, inner: LandscapeType, use_alternate: bool) -> u16 {
        match self.get(outer, inner) {
            Some(id) if use_alternate => id + 1,
            Some(id) => id,
            None => outer.image_number(),
        }
    }

    /// Iterate over `((outer, inner), primary id)`.
    pub fn iter(&self) -> impl Iterator<Item = ((LandscapeType, LandscapeType), u16)> + '_ {
        self.pairs.iter().map(|(&k, &v)| (k, v))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// [`BorderTable::select`] on the built-in table.
pub fn select_border(outer: LandscapeType, inner: LandscapeType, use_alternate: bool) -> u16 {
    STANDARD.select(outer, inner, use_alternate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TILE_COUNT;

    #[test]
    fn test_standard_table_has_no_duplicates() {
        let table = BorderTable::from_pairs(BORDER_PAIRS).unwrap();
        assert_eq!(table.len(), BORDER_PAIRS.len());
    }

    #[test]
    fn test_duplicate_pair_rejected() {
        let result = BorderTable::from_pairs(&[(Grass, Sand, 114), (Grass, Sand, 40)]);
        assert_eq!(
            result.unwrap_err(),
            DuplicateBorder {
                outer: Grass,
                inner: Sand
            }
        );
    }

    #[test]
    fn test_defined_pairs_alternate_is_next_id() {
        for ((outer, inner), _) in BorderTable::global().iter() {
            let primary = select_border(outer, inner, false);
            let alternate = select_border(outer, inner, true);
            assert_eq!(alternate, primary + 1, "({outer:?}, {inner:?})");
        }
    }

    #[test]
    fn test_reverse_pair_has_its_own_entry() {
        let table = BorderTable::global();
        for ((outer, inner), id) in table.iter() {
            if let Some(reverse) = table.get(inner, outer) {
                assert_ne!(id, reverse, "({outer:?}, {inner:?}) shares its reverse id");
            }
        }
        assert_eq!(select_border(Mountain, Snow, false), 156);
        assert_eq!(select_border(Snow, Mountain, false), 158);
    }

    #[test]
    fn test_undefined_pairs_fall_back_to_outer_plain() {
        let table = BorderTable::global();
        for outer in LandscapeType::ALL {
            for inner in LandscapeType::ALL {
                if table.get(outer, inner).is_some() {
                    continue;
                }
                assert_eq!(select_border(outer, inner, false), outer.image_number());
                assert_eq!(select_border(outer, inner, true), outer.image_number());
            }
        }
    }

    #[test]
    fn test_all_ids_exist_in_tile_table() {
        for outer in LandscapeType::ALL {
            for inner in LandscapeType::ALL {
                for alt in [false, true] {
                    let id = select_border(outer, inner, alt);
                    assert!(id < TILE_COUNT, "({outer:?}, {inner:?}, {alt}) -> {id}");
                }
            }
        }
    }
}
