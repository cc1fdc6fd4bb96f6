//! Player hitbox as a small set of primitive shapes
//!
//! Each ship model is a composite of circles and capsules (line segments
//! with a radius) relative to the player's center. A target touching any
//! primitive is a hit.

use glam::Vec2;

use crate::closest_point_on_segment;
use crate::settings::ShipModel;

/// One hitbox primitive, in player-local coordinates (y down)
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HullShape {
    Circle { center: Vec2, radius: f32 },
    Capsule { a: Vec2, b: Vec2, radius: f32 },
}

impl HullShape {
    /// Does a circle at `center` (world space) overlap this shape placed at `origin`?
    pub fn overlaps_circle(&self, origin: Vec2, center: Vec2, radius: f32) -> bool {
        match *self {
            HullShape::Circle { center: c, radius: r } => {
                let reach = r + radius;
                (origin + c).distance_squared(center) <= reach * reach
            }
            HullShape::Capsule { a, b, radius: r } => {
                let closest = closest_point_on_segment(center, origin + a, origin + b);
                let reach = r + radius;
                closest.distance_squared(center) <= reach * reach
            }
        }
    }
}

const ARROW: [HullShape; 3] = [
    HullShape::Circle {
        center: Vec2::new(0.0, 2.0),
        radius: 10.0,
    },
    HullShape::Capsule {
        a: Vec2::new(-6.0, 6.0),
        b: Vec2::new(-18.0, 14.0),
        radius: 4.0,
    },
    HullShape::Capsule {
        a: Vec2::new(6.0, 6.0),
        b: Vec2::new(18.0, 14.0),
        radius: 4.0,
    },
];

const SAUCER: [HullShape; 2] = [
    HullShape::Capsule {
        a: Vec2::new(-20.0, 6.0),
        b: Vec2::new(20.0, 6.0),
        radius: 6.0,
    },
    HullShape::Circle {
        center: Vec2::new(0.0, -4.0),
        radius: 9.0,
    },
];

const NEEDLE: [HullShape; 2] = [
    HullShape::Capsule {
        a: Vec2::new(0.0, -16.0),
        b: Vec2::new(0.0, 12.0),
        radius: 5.0,
    },
    HullShape::Circle {
        center: Vec2::new(0.0, 12.0),
        radius: 8.0,
    },
];

/// Hitbox primitives for a ship model
pub fn hull_for(model: ShipModel) -> &'static [HullShape] {
    match model {
        ShipModel::Arrow => &ARROW,
        ShipModel::Saucer => &SAUCER,
        ShipModel::Needle => &NEEDLE,
    }
}

/// Does a circle overlap any primitive of the ship at `origin`?
pub fn hull_overlaps(model: ShipModel, origin: Vec2, center: Vec2, radius: f32) -> bool {
    hull_for(model)
        .iter()
        .any(|shape| shape.overlaps_circle(origin, center, radius))
}
