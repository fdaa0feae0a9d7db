use crate::offering::WorldPieceOffering;

use fabric_core::{Arena, Dim, NodeId, Rect, SmallKeyHashMap};

use std::fmt;
use std::ops::{Index, IndexMut};

/// Identifies a tile by its depth and exact world rectangle.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct TileKey {
    pub depth: u8,
    pub rect: Rect,
}

impl TileKey {
    pub const fn new(depth: u8, rect: Rect) -> Self {
        Self { depth, rect }
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "d{}@({},{} {}x{})",
            self.depth, self.rect.x, self.rect.y, self.rect.width, self.rect.height
        )
    }
}

pub struct TileNode {
    key: TileKey,
    parent: Option<NodeId>,
    children: Option<[NodeId; 4]>,
    pub offering: WorldPieceOffering,
}

impl TileNode {
    pub fn key(&self) -> TileKey {
        self.key
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> Option<[NodeId; 4]> {
        self.children
    }
}

/// A quad-tree over the world. Each level halves the world rectangle in both directions while the tile pixel size stays the
/// same, so every level is one zoom step. Children are only allocated when something below them is requested.
pub struct TileTree {
    nodes: Arena<TileNode>,
    root: NodeId,
    index: SmallKeyHashMap<TileKey, NodeId>,
    tile_dim: Dim,
    max_depth: u8,
}

impl TileTree {
    pub fn new(world: Rect, tile_dim: Dim, max_depth: u8) -> Self {
        let mut nodes = Arena::new();
        let key = TileKey::new(0, world);
        let root = nodes.insert(TileNode {
            key,
            parent: None,
            children: None,
            offering: WorldPieceOffering::new(world, tile_dim),
        });
        let mut index = SmallKeyHashMap::default();
        index.insert(key, root);
        Self {
            nodes,
            root,
            index,
            tile_dim,
            max_depth,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn world(&self) -> Rect {
        self.nodes[self.root].key.rect
    }

    pub fn tile_dim(&self) -> Dim {
        self.tile_dim
    }

    pub fn max_depth(&self) -> u8 {
        self.max_depth
    }

    /// Number of tiles allocated so far.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Option<&TileNode> {
        self.nodes.get(id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut TileNode> {
        self.nodes.get_mut(id)
    }

    pub fn find(&self, key: &TileKey) -> Option<NodeId> {
        self.index.get(key).copied()
    }

    /// The four children of `id`, allocating them on first use. `None` at the maximum depth.
    pub fn split(&mut self, id: NodeId) -> Option<[NodeId; 4]> {
        let node = &self.nodes[id];
        if let Some(children) = node.children {
            return Some(children);
        }
        if node.key.depth >= self.max_depth {
            return None;
        }
        let depth = node.key.depth + 1;
        let quads = node.key.rect.quadrants();
        let tile_dim = self.tile_dim;
        let children = quads.map(|rect| {
            let key = TileKey::new(depth, rect);
            let child = self.nodes.insert(TileNode {
                key,
                parent: Some(id),
                children: None,
                offering: WorldPieceOffering::new(rect, tile_dim),
            });
            self.index.insert(key, child);
            child
        });
        self.nodes[id].children = Some(children);
        Some(children)
    }

    /// Finds the tile for `key`, allocating the path down to it. Returns `None` if `key` does not name a tile of this tree:
    /// too deep, or a rectangle that is not exactly one of the quad-tree cells at that depth.
    pub fn find_or_create(&mut self, key: &TileKey) -> Option<NodeId> {
        if let Some(id) = self.find(key) {
            return Some(id);
        }
        if key.depth > self.max_depth {
            return None;
        }
        let mut id = self.root;
        for _ in 0..key.depth {
            let children = self.split(id)?;
            id = children
                .into_iter()
                .find(|&c| self.nodes[c].key.rect.contains_rect(&key.rect))?;
        }
        (self.nodes[id].key == *key).then(|| id)
    }

    /// Strict ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.nodes[id].parent, move |&p| self.nodes[p].parent)
    }

    /// All tiles down to `depth`, allocating as needed, in breadth-first order.
    pub fn breadth_first(&mut self, depth: u8) -> Vec<NodeId> {
        let mut order = vec![self.root];
        let mut next = 0;
        while next < order.len() {
            let id = order[next];
            next += 1;
            if self.nodes[id].key.depth < depth {
                if let Some(children) = self.split(id) {
                    order.extend(children);
                }
            }
        }
        order
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &TileNode)> {
        self.nodes.iter()
    }
}

impl Index<NodeId> for TileTree {
    type Output = TileNode;

    fn index(&self, id: NodeId) -> &TileNode {
        &self.nodes[id]
    }
}

impl IndexMut<NodeId> for TileTree {
    fn index_mut(&mut self, id: NodeId) -> &mut TileNode {
        &mut self.nodes[id]
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
