pub mod dataset;
pub mod hotspot;
pub mod picking;
pub mod query;
pub mod selection;
pub mod spatial;
pub mod viewport;
pub mod visibility;

pub use dataset::*;
pub use hotspot::*;
pub use picking::*;
pub use query::*;
pub use selection::*;
pub use spatial::RTree;
pub use viewport::*;
pub use visibility::*;

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::dataset::HotspotSet;
    use crate::hotspot::{HotspotKind, HotspotRecord, Shape};
    use crate::spatial::{Item, RTree};

    pub(crate) fn record(id: &str, shape: Shape, rings: Vec<Vec<(f64, f64)>>) -> HotspotRecord {
        HotspotRecord {
            id: id.to_string(),
            kind: HotspotKind::AudioOnly,
            shape,
            rings,
            title: None,
            audio_url: None,
            image_url: None,
            link_url: None,
        }
    }

    /// Axis-aligned square with its lower corner at `(x, y)`.
    pub(crate) fn square(id: &str, x: f64, y: f64, size: f64) -> HotspotRecord {
        record(
            id,
            Shape::Polygon,
            vec![vec![(x, y), (x + size, y), (x + size, y + size), (x, y + size)]],
        )
    }

    pub(crate) fn tree_for(set: &HotspotSet) -> RTree {
        RTree::bulk_load(
            set.iter()
                .map(|(handle, h)| Item {
                    handle,
                    bounds: h.bbox(),
                })
                .collect(),
        )
    }
}
