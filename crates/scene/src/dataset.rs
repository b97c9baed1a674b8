use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::{info, warn};

use crate::hotspot::{Hotspot, HotspotHandle, HotspotRecord, RejectReason};

#[derive(Debug)]
pub enum DatasetError {
    Parse(serde_json::Error),
}

impl std::fmt::Display for DatasetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatasetError::Parse(e) => write!(f, "failed to parse hotspot dataset: {e}"),
        }
    }
}

impl std::error::Error for DatasetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DatasetError::Parse(e) => Some(e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedHotspot {
    /// Position of the record in the source dataset.
    pub position: usize,
    pub id: String,
    pub reason: RejectReason,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub accepted: usize,
    pub rejected: Vec<RejectedHotspot>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DatasetDocument {
    List(Vec<HotspotRecord>),
    Wrapped { hotspots: Vec<HotspotRecord> },
}

/// An immutable, generation-stamped collection of validated hotspots.
///
/// Reloading builds a new set with a new generation; nothing is ever patched
/// in place. Handles index the accepted hotspots densely in dataset order.
#[derive(Debug, Clone)]
pub struct HotspotSet {
    generation: u32,
    hotspots: Vec<Hotspot>,
    by_id: BTreeMap<String, u32>,
    version: String,
}

impl HotspotSet {
    pub fn empty(generation: u32) -> Self {
        Self::load(Vec::new(), generation).0
    }

    /// Validates every record; invalid ones are skipped with a warning.
    pub fn load(records: Vec<HotspotRecord>, generation: u32) -> (Self, LoadReport) {
        let mut hotspots: Vec<Hotspot> = Vec::with_capacity(records.len());
        let mut by_id: BTreeMap<String, u32> = BTreeMap::new();
        let mut report = LoadReport::default();
        let mut hasher = blake3::Hasher::new();

        for (position, record) in records.into_iter().enumerate() {
            let id = record.id.clone();
            let result = if by_id.contains_key(&id) {
                Err(RejectReason::DuplicateId)
            } else {
                Hotspot::from_record(record)
            };

            match result {
                Ok(hotspot) => {
                    fingerprint(&mut hasher, &hotspot);
                    by_id.insert(id, hotspots.len() as u32);
                    hotspots.push(hotspot);
                }
                Err(reason) => {
                    warn!("rejecting hotspot #{position} ({id:?}): {reason}");
                    report.rejected.push(RejectedHotspot {
                        position,
                        id,
                        reason,
                    });
                }
            }
        }

        report.accepted = hotspots.len();
        let version = hasher.finalize().to_hex().to_string();
        if report.accepted > 0 || !report.rejected.is_empty() {
            info!(
                "loaded {} hotspots ({} rejected), generation {generation}",
                report.accepted,
                report.rejected.len()
            );
        }

        (
            Self {
                generation,
                hotspots,
                by_id,
                version,
            },
            report,
        )
    }

    /// Parses a dataset document: either a bare array of records or an
    /// object with a `hotspots` array.
    pub fn from_json(json: &str, generation: u32) -> Result<(Self, LoadReport), DatasetError> {
        let doc: DatasetDocument = serde_json::from_str(json).map_err(DatasetError::Parse)?;
        let records = match doc {
            DatasetDocument::List(records) => records,
            DatasetDocument::Wrapped { hotspots } => hotspots,
        };
        Ok(Self::load(records, generation))
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Content fingerprint of the accepted geometry (blake3, hex).
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn len(&self) -> usize {
        self.hotspots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hotspots.is_empty()
    }

    /// Resolves a handle; handles from another generation resolve to `None`.
    pub fn get(&self, handle: HotspotHandle) -> Option<&Hotspot> {
        if !handle.is_from(self.generation) {
            return None;
        }
        self.hotspots.get(handle.index() as usize)
    }

    pub fn handle_of(&self, id: &str) -> Option<HotspotHandle> {
        self.by_id
            .get(id)
            .map(|&idx| HotspotHandle::new(idx, self.generation))
    }

    pub fn iter(&self) -> impl Iterator<Item = (HotspotHandle, &Hotspot)> {
        let generation = self.generation;
        self.hotspots
            .iter()
            .enumerate()
            .map(move |(idx, h)| (HotspotHandle::new(idx as u32, generation), h))
    }
}

fn fingerprint(hasher: &mut blake3::Hasher, hotspot: &Hotspot) {
    hasher.update(hotspot.id().as_bytes());
    hasher.update(&[0]);
    hasher.update(&[hotspot.kind() as u8, hotspot.shape() as u8]);
    for ring in hotspot.rings() {
        hasher.update(&(ring.len() as u64).to_le_bytes());
        for p in ring {
            hasher.update(&p.x.to_le_bytes());
            hasher.update(&p.y.to_le_bytes());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::HotspotSet;
    use crate::fixtures::square;
    use crate::hotspot::RejectReason;
    use foundation::handles::Handle;
    use pretty_assertions::assert_eq;

    #[test]
    fn bad_records_are_skipped_and_the_rest_load() {
        let mut degenerate = square("bad", 0.0, 0.0, 10.0);
        degenerate.rings = vec![vec![(0.0, 0.0), (1.0, 1.0)]];
        let records = vec![
            square("a", 0.0, 0.0, 10.0),
            degenerate,
            square("a", 50.0, 50.0, 10.0),
            square("b", 20.0, 20.0, 10.0),
        ];

        let (set, report) = HotspotSet::load(records, 1);
        assert_eq!(set.len(), 2);
        assert_eq!(report.accepted, 2);
        assert_eq!(report.rejected.len(), 2);
        assert_eq!(report.rejected[0].position, 1);
        assert_eq!(report.rejected[1].reason, RejectReason::DuplicateId);
        assert_eq!(set.handle_of("b"), Some(Handle::new(1, 1)));
    }

    #[test]
    fn stale_generation_handles_do_not_resolve() {
        let (set, _) = HotspotSet::load(vec![square("a", 0.0, 0.0, 1.0)], 3);
        assert!(set.get(Handle::new(0, 3)).is_some());
        assert!(set.get(Handle::new(0, 2)).is_none());
        assert!(set.get(Handle::new(1, 3)).is_none());
    }

    #[test]
    fn parses_both_document_shapes() {
        let list = r#"[{"id":"x","kind":"audio_image","rings":[[[0,0],[4,0],[4,4],[0,4]]]}]"#;
        let wrapped = r#"{"hotspots":[{"id":"x","kind":"audio_image","shape":"Polygon","rings":[[[0,0],[4,0],[4,4],[0,4]]]}]}"#;
        let (a, _) = HotspotSet::from_json(list, 0).unwrap();
        let (b, _) = HotspotSet::from_json(wrapped, 0).unwrap();
        assert_eq!(a.len(), 1);
        assert_eq!(a.version(), b.version());
        assert!(HotspotSet::from_json("{not json", 0).is_err());
    }

    #[test]
    fn version_tracks_geometry() {
        let (a, _) = HotspotSet::load(vec![square("a", 0.0, 0.0, 1.0)], 0);
        let (b, _) = HotspotSet::load(vec![square("a", 0.0, 0.0, 2.0)], 0);
        assert_ne!(a.version(), b.version());
    }
}
