//! Fixed placement of every landscape tile on the atlas.

/// Width and height of the atlas in texels.
pub const ATLAS_SIZE: u32 = 1024;

/// Side length of one atlas grid cell in texels.
pub const GRID_UNIT: u32 = 32;

/// Number of tile ids (`0..TILE_COUNT`).
pub const TILE_COUNT: u16 = 235;

/// A rectangular atlas region.
///
/// `size_cells` is 1 for isolated border tiles and `2..=5` for continuous
/// tiles, where it is the number of tiles wide plus one and doubles as the
/// wrap modulus for texture coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AtlasTile {
    pub grid_x: u16,
    pub grid_y: u16,
    pub size_cells: u16,
}

impl AtlasTile {
    const fn new(grid_x: u16, grid_y: u16, size_cells: u16) -> Self {
        Self {
            grid_x,
            grid_y,
            size_cells,
        }
    }

    /// Top-left corner in texels.
    pub const fn origin(self) -> (u32, u32) {
        (self.grid_x as u32 * GRID_UNIT, self.grid_y as u32 * GRID_UNIT)
    }

    /// Side length in texels.
    pub const fn extent(self) -> u32 {
        self.size_cells as u32 * GRID_UNIT
    }

    pub const fn is_continuous(self) -> bool {
        self.size_cells > 1
    }
}

/// Atlas placement of a tile id, or `None` past the end of the table.
pub const fn tile(id: u16) -> Option<AtlasTile> {
    let t = match id {
        0..=4 => AtlasTile::new(id * 5, 0, 5),
        5 => AtlasTile::new(30, 0, 1),
        6 => AtlasTile::new(31, 0, 1),
        7 => AtlasTile::new(25, 0, 5),
        8 => AtlasTile::new(30, 1, 1),
        9 => AtlasTile::new(31, 1, 1),
        10 => AtlasTile::new(0, 5, 5),
        11..=17 => AtlasTile::new((id - 11) * 2, 20, 2),
        18 => AtlasTile::new(5, 5, 5),
        19 => AtlasTile::new(31, 5, 1),
        20 => AtlasTile::new(30, 6, 1),
        21 => AtlasTile::new(10, 5, 5),
        22 => AtlasTile::new(31, 6, 1),
        23 => AtlasTile::new(30, 7, 1),
        24 => AtlasTile::new(15, 5, 5),
        25 => AtlasTile::new(31, 7, 1),
        26 => AtlasTile::new(30, 8, 1),
        27 => AtlasTile::new(31, 8, 1),
        28 => AtlasTile::new(30, 9, 1),
        29 => AtlasTile::new(31, 9, 1),
        30 => AtlasTile::new(30, 10, 1),
        31 => AtlasTile::new(20, 5, 5),
        32 => AtlasTile::new(31, 10, 1),
        33 => AtlasTile::new(30, 11, 1),
        34 => AtlasTile::new(31, 11, 1),
        35 => AtlasTile::new(25, 5, 5),
        36 => AtlasTile::new(0, 10, 5),
        37 => AtlasTile::new(30, 13, 1),
        38 => AtlasTile::new(31, 13, 1),
        39 => AtlasTile::new(30, 14, 1),
        40 => AtlasTile::new(31, 14, 1),
        41..=72 => AtlasTile::new(id - 41, 15, 1),
        73..=97 => AtlasTile::new(id - 73, 16, 1),
        98 => AtlasTile::new(30, 16, 1),
        99 => AtlasTile::new(31, 12, 1),
        100 => AtlasTile::new(25, 12, 1),
        101..=106 => AtlasTile::new(id - 75, 16, 1),
        107..=138 => AtlasTile::new(id - 107, 17, 1),
        139..=170 => AtlasTile::new(id - 139, 18, 1),
        171..=175 => AtlasTile::new(id - 171, 19, 1),
        176 => AtlasTile::new(5, 10, 5),
        177..=202 => AtlasTile::new(id - 171, 19, 1),
        203..=216 => AtlasTile::new(id - 203, 22, 1),
        217 => AtlasTile::new(14, 20, 5),
        218..=229 => AtlasTile::new(id - 217, 23, 1),
        230 => AtlasTile::new(19, 20, 5),
        231 => AtlasTile::new(13, 23, 1),
        232..=234 => AtlasTile::new(id - 232, 24, 1),
        _ => return None,
    };
    Some(t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_id_has_a_tile() {
        for id in 0..TILE_COUNT {
            assert!(tile(id).is_some(), "tile {id} missing");
        }
        assert!(tile(TILE_COUNT).is_none());
    }

    #[test]
    fn test_tiles_fit_inside_atlas() {
        for id in 0..TILE_COUNT {
            let t = tile(id).unwrap();
            assert!(t.size_cells >= 1);
            let (x, y) = t.origin();
            assert!(x + t.extent() <= ATLAS_SIZE, "tile {id} overflows horizontally");
            assert!(y + t.extent() <= ATLAS_SIZE, "tile {id} overflows vertically");
        }
    }

    #[test]
    fn test_continuous_tiles_do_not_overlap() {
        let continuous: Vec<(u16, AtlasTile)> = (0..TILE_COUNT)
            .map(|id| (id, tile(id).unwrap()))
            .filter(|(_, t)| t.is_continuous())
            .collect();
        for (i, (id_a, a)) in continuous.iter().enumerate() {
            for (id_b, b) in &continuous[i + 1..] {
                let apart = a.grid_x + a.size_cells <= b.grid_x
                    || b.grid_x + b.size_cells <= a.grid_x
                    || a.grid_y + a.size_cells <= b.grid_y
                    || b.grid_y + b.size_cells <= a.grid_y;
                assert!(apart, "tiles {id_a} and {id_b} overlap");
            }
        }
    }

    #[test]
    fn test_known_positions() {
        assert_eq!(tile(0), Some(AtlasTile::new(0, 0, 5)));
        assert_eq!(tile(17), Some(AtlasTile::new(12, 20, 2)));
        assert_eq!(tile(72), Some(AtlasTile::new(31, 15, 1)));
        assert_eq!(tile(106), Some(AtlasTile::new(31, 16, 1)));
        assert_eq!(tile(202), Some(AtlasTile::new(31, 19, 1)));
        assert_eq!(tile(229), Some(AtlasTile::new(12, 23, 1)));
        assert_eq!(tile(234), Some(AtlasTile::new(2, 24, 1)));
    }
}
