use foundation::bounds::Aabb2;
use foundation::handles::Handle;
use foundation::math::Vec2;
use serde::{Deserialize, Serialize};

/// Stable address of a hotspot within one loaded [`crate::HotspotSet`].
pub type HotspotHandle = Handle;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HotspotKind {
    AudioOnly,
    AudioLink,
    AudioImage,
    AudioImageLink,
    AudioSound,
}

impl HotspotKind {
    pub fn has_image(self) -> bool {
        matches!(self, HotspotKind::AudioImage | HotspotKind::AudioImageLink)
    }

    pub fn has_link(self) -> bool {
        matches!(self, HotspotKind::AudioLink | HotspotKind::AudioImageLink)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Shape {
    /// Rings after the first are holes.
    #[default]
    #[serde(alias = "polygon")]
    Polygon,
    /// Every ring is an independent outline.
    #[serde(alias = "multipolygon", alias = "multi_polygon")]
    MultiPolygon,
}

/// One record of the external hotspot dataset, as authored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotspotRecord {
    pub id: String,
    pub kind: HotspotKind,
    #[serde(default)]
    pub shape: Shape,
    pub rings: Vec<Vec<(f64, f64)>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Media {
    pub title: Option<String>,
    pub audio_url: Option<String>,
    pub image_url: Option<String>,
    pub link_url: Option<String>,
}

/// Why a dataset record was refused at load time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    EmptyId,
    DuplicateId,
    NoRings,
    DegenerateRing { ring: usize, distinct_points: usize },
    NonFiniteCoordinate { ring: usize },
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::EmptyId => write!(f, "empty id"),
            RejectReason::DuplicateId => write!(f, "duplicate id"),
            RejectReason::NoRings => write!(f, "no rings"),
            RejectReason::DegenerateRing {
                ring,
                distinct_points,
            } => write!(
                f,
                "ring {ring} has {distinct_points} distinct points (need at least 3)"
            ),
            RejectReason::NonFiniteCoordinate { ring } => {
                write!(f, "ring {ring} has a non-finite coordinate")
            }
        }
    }
}

/// A validated hotspot. Geometry and bounds are fixed at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Hotspot {
    id: String,
    kind: HotspotKind,
    shape: Shape,
    rings: Vec<Vec<Vec2>>,
    bbox: Aabb2,
    media: Media,
}

impl Hotspot {
    /// Validates a record and computes its bounding box.
    ///
    /// A closing point equal to the first is dropped so rings are stored open.
    pub fn from_record(record: HotspotRecord) -> Result<Self, RejectReason> {
        if record.id.trim().is_empty() {
            return Err(RejectReason::EmptyId);
        }
        if record.rings.is_empty() {
            return Err(RejectReason::NoRings);
        }

        let mut rings: Vec<Vec<Vec2>> = Vec::with_capacity(record.rings.len());
        for (ring_idx, raw) in record.rings.iter().enumerate() {
            if raw.iter().any(|(x, y)| !x.is_finite() || !y.is_finite()) {
                return Err(RejectReason::NonFiniteCoordinate { ring: ring_idx });
            }
            let mut ring: Vec<Vec2> = raw.iter().map(|&p| Vec2::from(p)).collect();
            if ring.len() >= 2 && ring.first() == ring.last() {
                ring.pop();
            }
            let distinct = count_distinct(&ring);
            if distinct < 3 {
                return Err(RejectReason::DegenerateRing {
                    ring: ring_idx,
                    distinct_points: distinct,
                });
            }
            rings.push(ring);
        }

        let bbox = Aabb2::from_points(rings.iter().flatten().map(|p| (p.x, p.y)))
            .ok_or(RejectReason::NoRings)?;

        Ok(Self {
            id: record.id,
            kind: record.kind,
            shape: record.shape,
            rings,
            bbox,
            media: Media {
                title: record.title,
                audio_url: record.audio_url,
                image_url: record.image_url,
                link_url: record.link_url,
            },
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> HotspotKind {
        self.kind
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn rings(&self) -> &[Vec<Vec2>] {
        &self.rings
    }

    pub fn bbox(&self) -> Aabb2 {
        self.bbox
    }

    pub fn center(&self) -> Vec2 {
        self.bbox.center()
    }

    pub fn media(&self) -> &Media {
        &self.media
    }
}

fn count_distinct(ring: &[Vec2]) -> usize {
    let mut seen: Vec<Vec2> = Vec::with_capacity(ring.len());
    for p in ring {
        if !seen.contains(p) {
            seen.push(*p);
        }
    }
    seen.len()
}
