//! The read-only inputs consumed by the renderers: node and link geometry, annotations and display options.

use fabric_core::{MinMax, Rect, Rgba, SmallKeyHashMap, GRID_SIZE};

use serde::{Deserialize, Serialize};
use smallvec::{smallvec, SmallVec};

/// A node is drawn as a horizontal line on its row, covering one or more column segments.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct NodeInfo {
    pub name: String,
    pub row: i32,
    pub color_key: String,
    /// Segments used when shadow links are hidden.
    pub segments: SmallVec<[MinMax; 1]>,
    /// Segments used when shadow links are shown.
    pub shadow_segments: SmallVec<[MinMax; 1]>,
    pub drain_zones: Vec<DrainZone>,
    pub shadow_drain_zones: Vec<DrainZone>,
}

impl NodeInfo {
    /// A node spanning `columns` in both shadow modes, with no drain zones.
    pub fn new(name: impl Into<String>, row: i32, color_key: impl Into<String>, columns: MinMax) -> Self {
        Self {
            name: name.into(),
            row,
            color_key: color_key.into(),
            segments: smallvec![columns],
            shadow_segments: smallvec![columns],
            drain_zones: Vec::new(),
            shadow_drain_zones: Vec::new(),
        }
    }

    pub fn with_drain_zone(mut self, zone: DrainZone) -> Self {
        self.drain_zones.push(zone);
        self.shadow_drain_zones.push(zone);
        self
    }

    #[inline]
    pub fn segments(&self, shadows: bool) -> &[MinMax] {
        if shadows {
            &self.shadow_segments
        } else {
            &self.segments
        }
    }

    #[inline]
    pub fn drain_zones(&self, shadows: bool) -> &[DrainZone] {
        if shadows {
            &self.shadow_drain_zones
        } else {
            &self.drain_zones
        }
    }

    /// The columns spanned by all segments together.
    pub fn column_range(&self, shadows: bool) -> Option<MinMax> {
        let segs = self.segments(shadows);
        let first = *segs.first()?;
        Some(segs.iter().skip(1).fold(first, |mut acc, s| {
            acc.include(s.min);
            acc.include(s.max);
            acc
        }))
    }
}

/// A run of adjacent columns under a node row where that node's links cluster.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct DrainZone {
    pub columns: MinMax,
}

impl DrainZone {
    pub const fn new(columns: MinMax) -> Self {
        Self { columns }
    }
}

/// A link is drawn as a vertical line on its column between the rows of its endpoints.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct LinkInfo {
    pub source_row: i32,
    pub target_row: i32,
    /// Column when shadow links are shown.
    pub column: i32,
    /// Column when shadow links are hidden. `None` for shadow links, which disappear in that mode.
    pub column_no_shadows: Option<i32>,
    pub color_key: String,
    pub directed: bool,
    pub is_shadow: bool,
}

impl LinkInfo {
    pub fn new(column: i32, source_row: i32, target_row: i32, color_key: impl Into<String>) -> Self {
        Self {
            source_row,
            target_row,
            column,
            column_no_shadows: Some(column),
            color_key: color_key.into(),
            directed: false,
            is_shadow: false,
        }
    }

    pub fn directed(mut self, directed: bool) -> Self {
        self.directed = directed;
        self
    }

    #[inline]
    pub fn top_row(&self) -> i32 {
        self.source_row.min(self.target_row)
    }

    #[inline]
    pub fn bottom_row(&self) -> i32 {
        self.source_row.max(self.target_row)
    }

    #[inline]
    pub fn column(&self, shadows: bool) -> Option<i32> {
        if shadows {
            Some(self.column)
        } else {
            self.column_no_shadows
        }
    }
}

/// The complete network layout, in the form produced by the layout engine.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct FabricModel {
    pub nodes: Vec<NodeInfo>,
    pub links: Vec<LinkInfo>,
}

impl FabricModel {
    pub fn new(nodes: Vec<NodeInfo>, links: Vec<LinkInfo>) -> Self {
        Self { nodes, links }
    }

    pub fn row_range(&self) -> Option<MinMax> {
        let mut iter = self.nodes.iter().map(|n| n.row);
        let first = iter.next()?;
        Some(iter.fold(MinMax::point(first), |mut acc, r| {
            acc.include(r);
            acc
        }))
    }

    pub fn column_range(&self, shadows: bool) -> Option<MinMax> {
        let mut range: Option<MinMax> = None;
        let mut include = |c: i32| match range.as_mut() {
            Some(r) => r.include(c),
            None => range = Some(MinMax::point(c)),
        };
        for link in self.links.iter() {
            if let Some(c) = link.column(shadows) {
                include(c);
            }
        }
        for node in self.nodes.iter() {
            if let Some(cols) = node.column_range(shadows) {
                include(cols.min);
                include(cols.max);
            }
        }
        range
    }

    /// The world rectangle covering every row and column, with one grid step of margin on each side.
    pub fn world_extent(&self, shadows: bool) -> Rect {
        let rows = self.row_range().unwrap_or(MinMax::point(0));
        let cols = self.column_range(shadows).unwrap_or(MinMax::point(0));
        Rect::new(
            (cols.min - 1) * GRID_SIZE,
            (rows.min - 1) * GRID_SIZE,
            (cols.count() + 1) * GRID_SIZE,
            (rows.count() + 1) * GRID_SIZE,
        )
    }
}

/// A named, colored span of rows (node annotations) or columns (link annotations).
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Annotation {
    pub name: String,
    pub range: MinMax,
    pub color: Rgba,
}

impl Annotation {
    pub fn new(name: impl Into<String>, range: MinMax, color: Rgba) -> Self {
        Self {
            name: name.into(),
            range,
            color,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct AnnotationSet {
    /// Spans of rows.
    pub node: Vec<Annotation>,
    /// Spans of columns.
    pub link: Vec<Annotation>,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct DisplayOptions {
    pub show_shadows: bool,
    /// Shade the drain zone under each node.
    pub shade_nodes: bool,
    /// Drain zones narrower than this many columns get no label.
    pub min_drain_zone: i32,
    pub background: Rgba,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            show_shadows: true,
            shade_nodes: true,
            min_drain_zone: 1,
            background: Rgba::WHITE,
        }
    }
}

/// Maps the symbolic color keys carried by nodes and links to real colors.
pub trait ColorGenerator: Send + Sync {
    fn color(&self, key: &str) -> Rgba;

    /// Translucent variant used for drain zone shading.
    fn zone_color(&self, key: &str) -> Rgba {
        self.color(key).with_alpha(48)
    }
}

/// A fixed table of named colors. Unknown keys are hashed onto the default cycle.
#[derive(Clone, Debug)]
pub struct ColorPalette {
    named: SmallKeyHashMap<String, Rgba>,
    cycle: Vec<Rgba>,
}

impl Default for ColorPalette {
    fn default() -> Self {
        Self {
            named: SmallKeyHashMap::default(),
            cycle: vec![
                Rgba::opaque(0x1f, 0x77, 0xb4),
                Rgba::opaque(0xff, 0x7f, 0x0e),
                Rgba::opaque(0x2c, 0xa0, 0x2c),
                Rgba::opaque(0xd6, 0x27, 0x28),
                Rgba::opaque(0x94, 0x67, 0xbd),
                Rgba::opaque(0x8c, 0x56, 0x4b),
                Rgba::opaque(0xe3, 0x77, 0xc2),
                Rgba::opaque(0x17, 0xbe, 0xcf),
            ],
        }
    }
}

impl ColorPalette {
    pub fn with_color(mut self, key: impl Into<String>, color: Rgba) -> Self {
        self.named.insert(key.into(), color);
        self
    }
}

impl ColorGenerator for ColorPalette {
    fn color(&self, key: &str) -> Rgba {
        if let Some(c) = self.named.get(key) {
            return *c;
        }
        // FNV-1a, so the choice is stable across runs.
        let hash = key
            .bytes()
            .fold(0x811c_9dc5u32, |h, b| (h ^ b as u32).wrapping_mul(0x0100_0193));
        self.cycle[hash as usize % self.cycle.len()]
    }
}

/// Receives progress while a scene is being built. Returning `false` cancels the build.
pub trait ProgressMonitor {
    fn update(&mut self, done: usize, total: usize) -> bool;
}

/// A monitor that never cancels.
pub struct NoProgress;

impl ProgressMonitor for NoProgress {
    fn update(&mut self, _done: usize, _total: usize) -> bool {
        true
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
    fn shadow_links_vanish_without_shadows() {
        let mut shadow = LinkInfo::new(3, 2, 0, "a");
        shadow.is_shadow = true;
        shadow.column_no_shadows = None;
        let model = FabricModel::new(
            vec![NodeInfo::new("n0", 0, "a", MinMax::new(0, 3)), NodeInfo::new("n2", 2, "b", MinMax::new(0, 2))],
            vec![LinkInfo::new(0, 0, 2, "a"), shadow],
        );

        assert_eq!(model.links[1].top_row(), 0);
        assert_eq!(model.links[1].bottom_row(), 2);
        assert_eq!(model.column_range(true), Some(MinMax::new(0, 3)));
        assert_eq!(model.row_range(), Some(MinMax::new(0, 2)));
        assert_eq!(model.world_extent(true), Rect::new(-10, -10, 50, 40));
    }

    #[test]
    fn palette_is_stable() {
        let palette = ColorPalette::default().with_color("x", Rgba::BLACK);
        assert_eq!(palette.color("x"), Rgba::BLACK);
        assert_eq!(palette.color("unknown"), palette.color("unknown"));
        assert_eq!(palette.zone_color("x").a, 48);
    }
}
