use foundation::bounds::Aabb2;
use foundation::math::Vec2;
use foundation::math::precision::stable_total_cmp_f64;

use crate::hotspot::HotspotHandle;

/// Bulk-loaded R-tree over hotspot bounding boxes.
///
/// Built once per dataset load with Sort-Tile-Recursive packing and never
/// mutated afterwards.
///
/// Ordering contract:
/// - `query_aabb` returns handles in ascending `index()` order.
#[derive(Debug, Clone, Default)]
pub struct RTree {
    nodes: Vec<Node>,
    root: Option<usize>,
    len: usize,
}

#[derive(Debug, Clone)]
enum Node {
    Leaf { bounds: Aabb2, items: Vec<Item> },
    Internal { bounds: Aabb2, children: Vec<usize> },
}

impl Node {
    fn bounds(&self) -> Aabb2 {
        match self {
            Node::Leaf { bounds, .. } | Node::Internal { bounds, .. } => *bounds,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Item {
    pub handle: HotspotHandle,
    pub bounds: Aabb2,
}

/// Maximum children per node.
pub const NODE_MAX: usize = 8;

impl RTree {
    pub fn bulk_load(items: Vec<Item>) -> Self {
        let len = items.len();
        if items.is_empty() {
            return Self::default();
        }

        let mut nodes: Vec<Node> = Vec::new();
        let mut level: Vec<usize> = Vec::new();
        for group in str_pack(items, |i| (i.bounds.center(), i.handle.index() as usize)) {
            let bounds = union_all(group.iter().map(|i| i.bounds));
            nodes.push(Node::Leaf {
                bounds,
                items: group,
            });
            level.push(nodes.len() - 1);
        }

        while level.len() > 1 {
            let groups = str_pack(level, |&idx| (nodes[idx].bounds().center(), idx));
            let mut next: Vec<usize> = Vec::with_capacity(groups.len());
            for children in groups {
                let bounds = union_all(children.iter().map(|&c| nodes[c].bounds()));
                nodes.push(Node::Internal { bounds, children });
                next.push(nodes.len() - 1);
            }
            level = next;
        }

        Self {
            root: level.first().copied(),
            nodes,
            len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of node levels from root to leaves (0 when empty).
    pub fn height(&self) -> usize {
        let mut height = 0;
        let mut cursor = self.root;
        while let Some(idx) = cursor {
            height += 1;
            cursor = match &self.nodes[idx] {
                Node::Leaf { .. } => None,
                Node::Internal { children, .. } => children.first().copied(),
            };
        }
        height
    }

    /// Items whose bounds intersect `query`, in ascending handle index order.
    pub fn query_aabb(&self, query: &Aabb2) -> Vec<HotspotHandle> {
        let Some(root) = self.root else {
            return Vec::new();
        };

        let mut hits: Vec<HotspotHandle> = Vec::new();
        let mut stack: Vec<usize> = vec![root];

        while let Some(idx) = stack.pop() {
            match &self.nodes[idx] {
                Node::Leaf { bounds, items } => {
                    if !bounds.intersects(query) {
                        continue;
                    }
                    hits.extend(
                        items
                            .iter()
                            .filter(|item| item.bounds.intersects(query))
                            .map(|item| item.handle),
                    );
                }
                Node::Internal { bounds, children } => {
                    if bounds.intersects(query) {
                        stack.extend(children.iter().rev().copied());
                    }
                }
            }
        }

        hits.sort_by_key(|h| h.index());
        hits.dedup();
        hits
    }

    /// Degenerate-box query: items whose bounds contain `(x, y)`.
    pub fn query_point(&self, x: f64, y: f64) -> Vec<HotspotHandle> {
        self.query_aabb(&Aabb2::point(x, y))
    }
}

/// Sort-Tile-Recursive grouping: sort by x into vertical slices, sort each
/// slice by y, then cut runs of `NODE_MAX`.
///
/// `key` yields the entry's center plus a tie-break so equal centers pack
/// the same way regardless of input order.
fn str_pack<T>(mut entries: Vec<T>, key: impl Fn(&T) -> (Vec2, usize)) -> Vec<Vec<T>> {
    let groups = entries.len().div_ceil(NODE_MAX);
    let slices = (groups as f64).sqrt().ceil().max(1.0) as usize;
    let slice_len = slices * NODE_MAX;

    entries.sort_by(|a, b| {
        let (ca, ta) = key(a);
        let (cb, tb) = key(b);
        stable_total_cmp_f64(ca.x, cb.x).then_with(|| ta.cmp(&tb))
    });

    let mut out: Vec<Vec<T>> = Vec::with_capacity(groups);
    let mut rest = entries;
    while !rest.is_empty() {
        let tail = rest.split_off(slice_len.min(rest.len()));
        let mut slice = std::mem::replace(&mut rest, tail);
        slice.sort_by(|a, b| {
            let (ca, ta) = key(a);
            let (cb, tb) = key(b);
            stable_total_cmp_f64(ca.y, cb.y).then_with(|| ta.cmp(&tb))
        });
        while !slice.is_empty() {
            let tail = slice.split_off(NODE_MAX.min(slice.len()));
            out.push(std::mem::replace(&mut slice, tail));
        }
    }
    out
}

fn union_all(mut boxes: impl Iterator<Item = Aabb2>) -> Aabb2 {
    let first = boxes.next().unwrap_or(Aabb2::point(0.0, 0.0));
    boxes.fold(first, |acc, b| acc.union(&b))
}

#[cfg(test)]
mod tests {
    use super::{Item, RTree};
    use foundation::bounds::Aabb2;
    use foundation::handles::Handle;

    fn h(idx: u32) -> Handle {
        Handle::new(idx, 0)
    }

    fn grid(n: u32) -> Vec<Item> {
        (0..n * n)
            .map(|i| {
                let x = (i % n) as f64 * 10.0;
                let y = (i / n) as f64 * 10.0;
                Item {
                    handle: h(i),
                    bounds: Aabb2::new([x, y], [x + 5.0, y + 5.0]),
                }
            })
            .collect()
    }

    #[test]
    fn query_returns_handles_in_index_order() {
        let items = vec![
            Item {
                handle: h(2),
                bounds: Aabb2::new([10.0, 0.0], [11.0, 1.0]),
            },
            Item {
                handle: h(1),
                bounds: Aabb2::new([0.0, 0.0], [1.0, 1.0]),
            },
            Item {
                handle: h(3),
                bounds: Aabb2::new([0.5, 0.5], [2.0, 2.0]),
            },
        ];
        let tree = RTree::bulk_load(items);
        let hits = tree.query_aabb(&Aabb2::new([0.25, 0.25], [1.5, 1.5]));
        assert_eq!(hits, vec![h(1), h(3)]);
    }

    #[test]
    fn matches_linear_scan_on_a_grid() {
        let items = grid(20);
        let tree = RTree::bulk_load(items.clone());
        assert_eq!(tree.len(), 400);
        assert!(tree.height() >= 3);

        let queries = [
            Aabb2::new([0.0, 0.0], [33.0, 12.0]),
            Aabb2::new([95.0, 95.0], [96.0, 96.0]),
            Aabb2::new([-50.0, -50.0], [-1.0, -1.0]),
            Aabb2::new([0.0, 0.0], [1000.0, 1000.0]),
        ];
        for q in queries {
            let mut expected: Vec<Handle> = items
                .iter()
                .filter(|i| i.bounds.intersects(&q))
                .map(|i| i.handle)
                .collect();
            expected.sort_by_key(|h| h.index());
            assert_eq!(tree.query_aabb(&q), expected);
        }
    }

    #[test]
    fn build_is_input_order_independent_for_results() {
        let a = grid(5);
        let mut b = a.clone();
        b.reverse();
        let q = Aabb2::new([12.0, 12.0], [31.0, 31.0]);
        assert_eq!(RTree::bulk_load(a).query_aabb(&q), RTree::bulk_load(b).query_aabb(&q));
    }

    #[test]
    fn point_query_and_empty_tree() {
        let tree = RTree::bulk_load(grid(3));
        assert_eq!(tree.query_point(12.0, 2.0), vec![h(1)]);
        assert!(tree.query_point(7.0, 7.0).is_empty());
        assert!(RTree::bulk_load(Vec::new()).query_point(0.0, 0.0).is_empty());
    }
}
