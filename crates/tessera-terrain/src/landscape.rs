//! Landscape types and their plain atlas tiles.

/// A terrain type at one grid point.
///
/// Every type has a plain image number: the atlas tile id of its own
/// continuous fill texture. Several types share a fill (the ring types that
/// only exist to produce layered border transitions).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LandscapeType {
    Grass,
    DryGrass,
    Desert,
    Sand,
    Earth,
    DryEarth,
    Mud,
    Water1,
    Water2,
    Water3,
    Water4,
    Water5,
    Water6,
    Water7,
    Water8,
    River1,
    River2,
    River3,
    River4,
    MountainBorderOuter,
    MountainBorder,
    Mountain,
    SnowBorder,
    Snow,
    MoorBorder,
    MoorInner,
    Moor,
    Flattened,
    FlattenedDesert,
    SharpFlattenedDesert,
    Gravel,
}

impl LandscapeType {
    /// Every landscape type, in declaration order.
    pub const ALL: [LandscapeType; 31] = [
        Self::Grass,
        Self::DryGrass,
        Self::Desert,
        Self::Sand,
        Self::Earth,
        Self::DryEarth,
        Self::Mud,
        Self::Water1,
        Self::Water2,
        Self::Water3,
        Self::Water4,
        Self::Water5,
        Self::Water6,
        Self::Water7,
        Self::Water8,
        Self::River1,
        Self::River2,
        Self::River3,
        Self::River4,
        Self::MountainBorderOuter,
        Self::MountainBorder,
        Self::Mountain,
        Self::SnowBorder,
        Self::Snow,
        Self::MoorBorder,
        Self::MoorInner,
        Self::Moor,
        Self::Flattened,
        Self::FlattenedDesert,
        Self::SharpFlattenedDesert,
        Self::Gravel,
    ];

    /// Atlas tile id of this type's continuous fill texture.
    pub const fn image_number(self) -> u16 {
        match self {
            Self::Grass | Self::MountainBorderOuter => 0,
            Self::DryGrass => 1,
            Self::Mud => 2,
            Self::Sand => 3,
            Self::Earth => 4,
            Self::DryEarth => 7,
            Self::Water8 | Self::River1 | Self::River2 | Self::River3 | Self::River4 => 10,
            Self::Water7 => 11,
            Self::Water6 => 12,
            Self::Water5 => 13,
            Self::Water4 => 14,
            Self::Water3 => 15,
            Self::Water2 => 16,
            Self::Water1 => 17,
            Self::Desert => 18,
            Self::Mountain | Self::MountainBorder => 21,
            Self::Snow | Self::SnowBorder => 24,
            Self::Gravel => 31,
            Self::Flattened => 35,
            Self::Moor | Self::MoorInner => 36,
            Self::MoorBorder => 176,
            Self::FlattenedDesert => 217,
            Self::SharpFlattenedDesert => 230,
        }
    }

    /// True for the water depths and rivers.
    pub const fn is_water(self) -> bool {
        matches!(
            self,
            Self::Water1
                | Self::Water2
                | Self::Water3
                | Self::Water4
                | Self::Water5
                | Self::Water6
                | Self::Water7
                | Self::Water8
                | Self::River1
                | Self::River2
                | Self::River3
                | Self::River4
        )
    }

    /// Water type for a depth in `1..=8`, clamped.
    pub fn water(depth: u8) -> Self {
        match depth.clamp(1, 8) {
            1 => Self::Water1,
            2 => Self::Water2,
            3 => Self::Water3,
            4 => Self::Water4,
            5 => Self::Water5,
            6 => Self::Water6,
            7 => Self::Water7,
            _ => Self::Water8,
        }
    }
}
