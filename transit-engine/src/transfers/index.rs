//! R-tree of stop positions.
//!
//! Lookups are two-stage: a bounding-box query in degrees narrows the
//! candidates, then the caller filters by great-circle distance.

use rstar::{AABB, PointDistance, RTree, RTreeObject};

use crate::domain::Coordinates;
use crate::network::{NetworkModel, StopIdx};

/// Metres per degree of latitude (mean).
const METRES_PER_DEGREE: f64 = 111_320.0;

#[derive(Debug, Clone)]
pub(crate) struct StopNode {
    pub(crate) stop: StopIdx,
    /// [lon, lat]
    point: [f64; 2],
}

impl RTreeObject for StopNode {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.point)
    }
}

impl PointDistance for StopNode {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.point[0] - point[0];
        let dy = self.point[1] - point[1];
        dx * dx + dy * dy
    }
}

/// Spatial index over every stop in a model.
pub(crate) struct StopIndex {
    tree: RTree<StopNode>,
}

impl StopIndex {
    pub(crate) fn build(model: &NetworkModel) -> Self {
        let nodes = model
            .stops()
            .iter()
            .enumerate()
            .map(|(i, stop)| StopNode {
                stop: StopIdx(i),
                point: [stop.location.lon(), stop.location.lat()],
            })
            .collect();
        Self {
            tree: RTree::bulk_load(nodes),
        }
    }

    /// Stops whose bounding box lies within `radius_m` of `center`.
    ///
    /// This over-approximates the circle; callers check the real distance.
    pub(crate) fn candidates(
        &self,
        center: &Coordinates,
        radius_m: f64,
    ) -> impl Iterator<Item = StopIdx> + '_ {
        let dlat = radius_m / METRES_PER_DEGREE;
        let cos_lat = center.lat().to_radians().cos();
        let dlon = if cos_lat > 1e-6 {
            (dlat / cos_lat).min(180.0)
        } else {
            180.0
        };
        let envelope = AABB::from_corners(
            [center.lon() - dlon, center.lat() - dlat],
            [center.lon() + dlon, center.lat() + dlat],
        );
        self.tree
            .locate_in_envelope(&envelope)
            .map(|node| node.stop)
    }

    pub(crate) fn len(&self) -> usize {
        self.tree.size()
    }
}
