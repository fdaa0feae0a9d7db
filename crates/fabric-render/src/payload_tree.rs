use fabric_core::{Arena, NodeId, Rect};

use smallvec::SmallVec;

/// A region quad-tree of rectangles with attached payloads, for finding what intersects a clip rectangle.
///
/// Items live in the deepest node that fully contains them. Items that straddle a split line (or fall outside the root bounds)
/// stay in the parent.
pub struct PayloadTree<T> {
    nodes: Arena<QuadNode>,
    root: NodeId,
    items: Vec<(Rect, T)>,
    max_depth: u8,
    split_threshold: usize,
}

struct QuadNode {
    bounds: Rect,
    depth: u8,
    items: SmallVec<[u32; 8]>,
    children: Option<[NodeId; 4]>,
}

impl<T> PayloadTree<T> {
    pub fn new(bounds: Rect, max_depth: u8, split_threshold: usize) -> Self {
        let mut nodes = Arena::new();
        let root = nodes.insert(QuadNode {
            bounds,
            depth: 0,
            items: SmallVec::new(),
            children: None,
        });
        Self {
            nodes,
            root,
            items: Vec::new(),
            max_depth,
            split_threshold: split_threshold.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn insert(&mut self, rect: Rect, payload: T) {
        let item = self.items.len() as u32;
        self.items.push((rect, payload));

        let mut node_id = self.root;
        loop {
            let next = self.nodes[node_id]
                .children
                .and_then(|children| children.into_iter().find(|&c| self.nodes[c].bounds.contains_rect(&rect)));
            match next {
                Some(child) => node_id = child,
                None => break,
            }
        }
        self.nodes[node_id].items.push(item);
        self.maybe_split(node_id);
    }

    fn maybe_split(&mut self, node_id: NodeId) {
        let node = &self.nodes[node_id];
        if node.children.is_some() || node.depth >= self.max_depth || node.items.len() <= self.split_threshold {
            return;
        }
        let depth = node.depth + 1;
        let quads = node.bounds.quadrants();
        let children = quads.map(|bounds| {
            self.nodes.insert(QuadNode {
                bounds,
                depth,
                items: SmallVec::new(),
                children: None,
            })
        });

        let old_items = std::mem::take(&mut self.nodes[node_id].items);
        let mut kept = SmallVec::new();
        for item in old_items {
            let rect = self.items[item as usize].0;
            match children.iter().find(|&&c| self.nodes[c].bounds.contains_rect(&rect)) {
                Some(&child) => self.nodes[child].items.push(item),
                None => kept.push(item),
            }
        }
        let node = &mut self.nodes[node_id];
        node.items = kept;
        node.children = Some(children);

        for child in children {
            self.maybe_split(child);
        }
    }

    /// Visits every item whose rectangle touches `area`, in insertion order.
    pub fn query(&self, area: &Rect) -> Vec<&(Rect, T)> {
        let mut hits = Vec::new();
        let mut stack = vec![self.root];
        while let Some(node_id) = stack.pop() {
            let node = &self.nodes[node_id];
            // The root also holds items that lie outside its bounds, so never cull it.
            if node_id != self.root && !node.bounds.touches(area) {
                continue;
            }
            for &item in node.items.iter() {
                if self.items[item as usize].0.touches(area) {
                    hits.push(item);
                }
            }
            if let Some(children) = node.children {
                stack.extend(children);
            }
        }
        hits.sort_unstable();
        hits.into_iter().map(|i| &self.items[i as usize]).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Rect, T)> {
        self.items.iter()
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn query_matches_brute_force() {
        let mut tree = PayloadTree::new(Rect::new(0, 0, 1000, 1000), 6, 2);
        let mut all = Vec::new();
        for i in 0..200 {
            let x = (i * 37) % 990;
            let y = (i * 91) % 990;
            let w = 1 + (i % 7) * 3;
            let rect = Rect::new(x, y, w, 5);
            tree.insert(rect, i);
            all.push((rect, i));
        }
        // Something outside the root bounds is still found.
        tree.insert(Rect::new(-50, -50, 10, 10), 999);
        all.push((Rect::new(-50, -50, 10, 10), 999));

        for area in [
            Rect::new(0, 0, 100, 100),
            Rect::new(500, 200, 250, 40),
            Rect::new(-60, -60, 20, 20),
            Rect::new(0, 0, 1000, 1000),
        ] {
            let got: Vec<i32> = tree.query(&area).into_iter().map(|(_, p)| *p).collect();
            let want: Vec<i32> = all.iter().filter(|(r, _)| r.touches(&area)).map(|(_, p)| *p).collect();
            assert_eq!(got, want);
        }
        assert_eq!(tree.len(), 201);
    }
}
