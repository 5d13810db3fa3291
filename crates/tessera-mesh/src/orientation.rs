//! Texel offsets of a triangle's corners inside its atlas cell.
//!
//! Offsets are listed in vertex emission order. Up triangles emit
//! `(x, y) (x, y+1) (x+1, y+1)`; down triangles emit `(x, y) (x+1, y+1) (x+1, y)`.
//! In an up image the apex is at `(16, 0)` and the base corners at `(0, 16)`
//! and `(32, 16)`; in a down image the apex is at `(16, 32)`.

/// Which half of a cell a triangle covers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TriangleKind {
    Up,
    Down,
}

/// How a triangle is rotated onto its tile image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Orientation {
    /// Plain fill of a single landscape type.
    Continuous,
    /// Left and right corners match; the middle corner differs.
    Straight,
    /// Left and middle corners match.
    Left,
    /// The remaining cases.
    Right,
}

const CONTINUOUS_UP: [[i32; 2]; 3] = [[16, 0], [0, 16], [32, 16]];
const STRAIGHT_UP: [[i32; 2]; 3] = [[16, 0], [0, 16], [32, 16]];
const LEFT_UP: [[i32; 2]; 3] = [[0, 16], [32, 16], [16, 0]];
const RIGHT_UP: [[i32; 2]; 3] = [[32, 16], [16, 0], [0, 16]];

const CONTINUOUS_DOWN: [[i32; 2]; 3] = [[0, 0], [16, 16], [32, 0]];
const STRAIGHT_DOWN: [[i32; 2]; 3] = [[0, 16], [16, 32], [32, 16]];
const LEFT_DOWN: [[i32; 2]; 3] = [[32, 16], [0, 16], [16, 32]];
const RIGHT_DOWN: [[i32; 2]; 3] = [[16, 32], [32, 16], [0, 16]];

impl Orientation {
    /// Corner texel offsets for a triangle of `kind`, in emission order.
    pub const fn texel_offsets(self, kind: TriangleKind) -> [[i32; 2]; 3] {
        match (kind, self) {
            (TriangleKind::Up, Self::Continuous) => CONTINUOUS_UP,
            (TriangleKind::Up, Self::Straight) => STRAIGHT_UP,
            (TriangleKind::Up, Self::Left) => LEFT_UP,
            (TriangleKind::Up, Self::Right) => RIGHT_UP,
            (TriangleKind::Down, Self::Continuous) => CONTINUOUS_DOWN,
            (TriangleKind::Down, Self::Straight) => STRAIGHT_DOWN,
            (TriangleKind::Down, Self::Left) => LEFT_DOWN,
            (TriangleKind::Down, Self::Right) => RIGHT_DOWN,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Orientation; 4] = [
        Orientation::Continuous,
        Orientation::Straight,
        Orientation::Left,
        Orientation::Right,
    ];

    fn sorted(mut corners: [[i32; 2]; 3]) -> [[i32; 2]; 3] {
        corners.sort();
        corners
    }

    #[test]
    fn test_border_orientations_rotate_the_same_corners() {
        for kind in [TriangleKind::Up, TriangleKind::Down] {
            let straight = sorted(Orientation::Straight.texel_offsets(kind));
            assert_eq!(sorted(Orientation::Left.texel_offsets(kind)), straight);
            assert_eq!(sorted(Orientation::Right.texel_offsets(kind)), straight);
        }
    }

    #[test]
    fn test_offsets_stay_inside_one_cell() {
        for kind in [TriangleKind::Up, TriangleKind::Down] {
            for orientation in ALL {
                for [u, v] in orientation.texel_offsets(kind) {
                    assert!((0..=32).contains(&u) && (0..=32).contains(&v));
                }
            }
        }
    }

    #[test]
    fn test_continuous_matches_world_shape() {
        // Up: apex on top, base below. Down: base on top, apex below.
        assert_eq!(
            Orientation::Continuous.texel_offsets(TriangleKind::Up),
            [[16, 0], [0, 16], [32, 16]]
        );
        assert_eq!(
            Orientation::Continuous.texel_offsets(TriangleKind::Down),
            [[0, 0], [16, 16], [32, 0]]
        );
    }
}
