//! The vector rendering path.
//!
//! A [`SceneCache`] is built once per model/display-option change. Node and link lines are not stored as paint objects; instead
//! two flat lookup arrays (row → node, column → link) let a paint pass reconstruct just the lines that fall inside its clip.
//! Labels, drain zone shading and annotation bands are precomputed and indexed by a [`PayloadTree`].

use crate::canvas::{Canvas, RasterCanvas};
use crate::fonts::{FontLadder, FontMetrics};
use crate::model::{AnnotationSet, ColorGenerator, DisplayOptions, FabricModel, ProgressMonitor};
use crate::payload_tree::PayloadTree;
use crate::primitives::{BoxPath, GlyphPath, LinePath, TextPath};

use fabric_core::{Dim, MinMax, PixelFormat, Raster, Rect, Rgba, SmallKeyHashSet, GRID_SIZE};

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Marks an empty slot in the row and column lookup arrays.
const NO_ENTRY: u32 = u32::MAX;

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SceneConfig {
    /// Candidate sizes for drain zone labels.
    pub label_font_sizes: Vec<f32>,
    pub node_label_font_size: f32,
    /// Fraction of the clip span added on each side when choosing rows and columns to paint.
    pub clip_pad_fraction: f64,
    /// Lower bound for the clip padding, in grid steps.
    pub min_clip_pad_steps: i32,
    /// Fraction of the full extent used as the margin of annotation bands.
    pub annotation_pad_fraction: f64,
    /// Lower bound for the annotation margin, in world units.
    pub min_annotation_pad: i32,
    /// Half the edge length of the link end markers, in world units.
    pub glyph_half_size: i32,
    pub payload_tree_depth: u8,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            label_font_sizes: vec![24.0, 18.0, 12.0, 9.0, 6.0],
            node_label_font_size: 9.0,
            clip_pad_fraction: 0.1,
            min_clip_pad_steps: 10,
            annotation_pad_fraction: 0.05,
            min_annotation_pad: 2 * GRID_SIZE,
            glyph_half_size: GRID_SIZE / 4,
            payload_tree_depth: 8,
        }
    }
}

/// Everything a scene is built from.
pub struct SceneInputs<'a> {
    pub model: &'a FabricModel,
    pub options: &'a DisplayOptions,
    pub colors: &'a dyn ColorGenerator,
    pub annotations: &'a AnnotationSet,
    pub metrics: &'a dyn FontMetrics,
    /// The world rectangle the scene is laid out in.
    pub extents: Rect,
}

/// Restricts a paint pass to a highlighted subset, e.g. the current selection.
#[derive(Clone, Debug, Default)]
pub struct Reduction {
    pub rows: SmallKeyHashSet<i32>,
    pub columns: SmallKeyHashSet<i32>,
    pub names: SmallKeyHashSet<String>,
}

impl Reduction {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() && self.columns.is_empty() && self.names.is_empty()
    }
}

/// How many primitives of each kind a paint pass drew.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PaintStats {
    pub lines: usize,
    pub glyphs: usize,
    pub boxes: usize,
    pub texts: usize,
}

impl PaintStats {
    pub fn total(&self) -> usize {
        self.lines + self.glyphs + self.boxes + self.texts
    }
}

#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
enum Layer {
    Annotation,
    ZoneShade,
    Label,
}

enum Payload {
    Band(BoxPath),
    BandLabel(TextPath),
    ZoneShade(BoxPath),
    /// Node or drain zone label, with the node name for reductions.
    NodeLabel { node: String, text: TextPath },
}

impl Payload {
    fn layer(&self) -> Layer {
        match self {
            Payload::Band(_) | Payload::BandLabel(_) => Layer::Annotation,
            Payload::ZoneShade(_) => Layer::ZoneShade,
            Payload::NodeLabel { .. } => Layer::Label,
        }
    }
}

struct NodeRecord {
    row: i32,
    segments: SmallVec<[MinMax; 1]>,
    color: Rgba,
}

struct LinkRecord {
    column: i32,
    source_row: i32,
    target_row: i32,
    directed: bool,
    color: Rgba,
}

/// The prebuilt scene for the vector rendering path.
pub struct SceneCache {
    nodes: Vec<NodeRecord>,
    links: Vec<LinkRecord>,
    min_row: i32,
    row_to_node: Vec<u32>,
    min_col: i32,
    col_to_link: Vec<u32>,
    /// `link_prefix[i]` is the number of links in the first `i` column slots.
    link_prefix: Vec<u32>,
    payloads: PayloadTree<Payload>,
    background: Rgba,
    clip_pad_fraction: f64,
    min_clip_pad: i32,
    glyph_half_size: i32,
}

impl SceneCache {
    /// Builds the scene. Returns `None` if `progress` cancels the build.
    pub fn build(inputs: &SceneInputs, config: &SceneConfig, progress: &mut dyn ProgressMonitor) -> Option<Self> {
        let SceneInputs {
            model,
            options,
            colors,
            annotations,
            metrics,
            extents,
        } = *inputs;
        let shadows = options.show_shadows;
        let total = model.nodes.len() + model.links.len();
        let mut done = 0;

        // Lookup arrays are offset by the smallest row/column so sub-views that don't start at zero stay compact.
        let rows = model.row_range().unwrap_or(MinMax::new(0, -1));
        let cols = model.column_range(shadows).unwrap_or(MinMax::new(0, -1));
        let mut row_to_node = vec![NO_ENTRY; rows.count().max(0) as usize];
        let mut col_to_link = vec![NO_ENTRY; cols.count().max(0) as usize];

        let label_ladder = FontLadder::new(config.label_font_sizes.clone());
        let mut payloads = PayloadTree::new(extents, config.payload_tree_depth, 16);

        let mut nodes = Vec::with_capacity(model.nodes.len());
        for node in model.nodes.iter() {
            let segments: SmallVec<[MinMax; 1]> = node.segments(shadows).iter().copied().collect();
            let color = colors.color(&node.color_key);
            let y = node.row * GRID_SIZE;

            if let Some(first) = segments.iter().map(|s| s.min).min() {
                // Node name sits to the left of the start of the line.
                let size = config.node_label_font_size;
                let width = metrics.string_width(&node.name, size).ceil() as i32;
                let x = first * GRID_SIZE - GRID_SIZE / 2 - width;
                let text_y = y + (size / 3.0) as i32;
                let bounds = Rect::new(x, text_y - size.ceil() as i32, width.max(1), size.ceil() as i32);
                payloads.insert(
                    bounds,
                    Payload::NodeLabel {
                        node: node.name.clone(),
                        text: TextPath {
                            text: node.name.clone(),
                            x,
                            y: text_y,
                            size,
                            rotated: false,
                            color: Rgba::BLACK,
                            bounds,
                        },
                    },
                );
            }

            for zone in node.drain_zones(shadows) {
                let zone_cols = zone.columns;
                if options.shade_nodes {
                    let rect = Rect::from_min_and_lub(
                        zone_cols.min * GRID_SIZE - GRID_SIZE / 2,
                        y - GRID_SIZE / 2,
                        zone_cols.max * GRID_SIZE + GRID_SIZE / 2,
                        y + GRID_SIZE / 2,
                    );
                    payloads.insert(rect, Payload::ZoneShade(BoxPath::new(rect, colors.zone_color(&node.color_key))));
                }
                if zone_cols.count() < options.min_drain_zone {
                    continue;
                }
                let available = (zone_cols.count() * GRID_SIZE) as f64;
                let font = label_ladder.fit(metrics, &node.name, available);
                let width = metrics.string_width(&node.name, font.size).ceil() as i32;
                let height = font.size.ceil() as i32;
                let center_x = (zone_cols.min * GRID_SIZE + zone_cols.max * GRID_SIZE) / 2;
                let text = if font.rotated {
                    let x = center_x + height / 2;
                    let text_y = y - GRID_SIZE / 4;
                    TextPath {
                        text: node.name.clone(),
                        x,
                        y: text_y,
                        size: font.size,
                        rotated: true,
                        color: color.with_alpha(255),
                        bounds: Rect::new(x - height, text_y - width, height, width.max(1)),
                    }
                } else {
                    let x = center_x - width / 2;
                    let text_y = y - GRID_SIZE / 4;
                    TextPath {
                        text: node.name.clone(),
                        x,
                        y: text_y,
                        size: font.size,
                        rotated: false,
                        color: color.with_alpha(255),
                        bounds: Rect::new(x, text_y - height, width.max(1), height),
                    }
                };
                payloads.insert(
                    text.bounds,
                    Payload::NodeLabel {
                        node: node.name.clone(),
                        text,
                    },
                );
            }

            let slot = (node.row - rows.min) as usize;
            row_to_node[slot] = nodes.len() as u32;
            nodes.push(NodeRecord {
                row: node.row,
                segments,
                color,
            });

            done += 1;
            if !progress.update(done, total) {
                return None;
            }
        }

        let mut links = Vec::with_capacity(model.links.len());
        for link in model.links.iter() {
            done += 1;
            let column = match link.column(shadows) {
                Some(c) => c,
                None => continue,
            };
            let slot = (column - cols.min) as usize;
            if col_to_link[slot] != NO_ENTRY {
                log::warn!("Column {} is claimed by more than one link", column);
            }
            col_to_link[slot] = links.len() as u32;
            links.push(LinkRecord {
                column,
                source_row: link.source_row,
                target_row: link.target_row,
                directed: link.directed,
                color: colors.color(&link.color_key),
            });
            if !progress.update(done, total) {
                return None;
            }
        }

        let mut link_prefix = Vec::with_capacity(col_to_link.len() + 1);
        link_prefix.push(0);
        for &slot in col_to_link.iter() {
            let last = *link_prefix.last().unwrap_or(&0);
            link_prefix.push(last + (slot != NO_ENTRY) as u32);
        }

        Self::insert_annotations(&mut payloads, annotations, metrics, extents, config);

        log::debug!(
            "Built scene with {} nodes, {} links, {} payloads",
            nodes.len(),
            links.len(),
            payloads.len()
        );

        Some(Self {
            nodes,
            links,
            min_row: rows.min,
            row_to_node,
            min_col: cols.min,
            col_to_link,
            link_prefix,
            payloads,
            background: options.background,
            clip_pad_fraction: config.clip_pad_fraction,
            min_clip_pad: config.min_clip_pad_steps * GRID_SIZE,
            glyph_half_size: config.glyph_half_size,
        })
    }

    fn insert_annotations(
        payloads: &mut PayloadTree<Payload>,
        annotations: &AnnotationSet,
        metrics: &dyn FontMetrics,
        extents: Rect,
        config: &SceneConfig,
    ) {
        let pad_x = annotation_pad(extents.width, config);
        let pad_y = annotation_pad(extents.height, config);

        // Node annotations are horizontal bands over a span of rows.
        for annot in annotations.node.iter() {
            let rect = Rect::from_min_and_lub(
                extents.x - pad_x,
                annot.range.min * GRID_SIZE - GRID_SIZE / 2,
                extents.max_x() + pad_x,
                annot.range.max * GRID_SIZE + GRID_SIZE / 2,
            );
            payloads.insert(rect, Payload::Band(BoxPath::new(rect, annot.color)));
            let size = config.node_label_font_size;
            let width = metrics.string_width(&annot.name, size).ceil() as i32;
            let label_bounds = Rect::new(rect.x, rect.y, width + 1, size as i32 + 1);
            payloads.insert(
                label_bounds,
                Payload::BandLabel(TextPath {
                    text: annot.name.clone(),
                    x: rect.x,
                    y: rect.y + size as i32,
                    size,
                    rotated: false,
                    color: Rgba::BLACK,
                    bounds: label_bounds,
                }),
            );
        }

        // Link annotations are vertical bands over a span of columns.
        for annot in annotations.link.iter() {
            let rect = Rect::from_min_and_lub(
                annot.range.min * GRID_SIZE - GRID_SIZE / 2,
                extents.y - pad_y,
                annot.range.max * GRID_SIZE + GRID_SIZE / 2,
                extents.max_y() + pad_y,
            );
            payloads.insert(rect, Payload::Band(BoxPath::new(rect, annot.color)));
        }
    }

    pub fn background(&self) -> Rgba {
        self.background
    }

    /// Number of links whose column lies in `columns`.
    pub fn links_in_columns(&self, columns: MinMax) -> u32 {
        let n = self.col_to_link.len() as i32;
        let lo = (columns.min - self.min_col).clamp(0, n);
        let hi = (columns.max - self.min_col + 1).clamp(0, n);
        if hi <= lo {
            return 0;
        }
        self.link_prefix[hi as usize] - self.link_prefix[lo as usize]
    }

    /// Estimated link density when `world` is drawn into `screen`.
    pub fn links_per_pixel(&self, world: Rect, screen: Dim) -> f64 {
        let columns = MinMax::new(
            world.x.div_euclid(GRID_SIZE),
            (world.max_x() - 1).div_euclid(GRID_SIZE),
        );
        self.links_in_columns(columns) as f64 / screen.width.max(1) as f64
    }

    fn padded_clip(&self, clip: &Rect) -> Rect {
        let pad_x = ((clip.width as f64 * self.clip_pad_fraction) as i32).max(self.min_clip_pad);
        let pad_y = ((clip.height as f64 * self.clip_pad_fraction) as i32).max(self.min_clip_pad);
        clip.padded(pad_x, pad_y)
    }

    /// Paints everything that touches `clip` (or everything, if `clip` is `None`).
    ///
    /// With a `reduction`, annotation and shading layers are skipped and only the reduction's rows, columns and named labels
    /// are drawn.
    pub fn paint(&self, canvas: &mut dyn Canvas, clip: Option<&Rect>, reduction: Option<&Reduction>) -> PaintStats {
        let mut stats = PaintStats::default();
        let area = clip.map(|c| self.padded_clip(c));

        let hits = match area {
            Some(a) => self.payloads.query(&a),
            None => self.payloads.iter().collect(),
        };
        let mut layered: Vec<_> = hits.into_iter().map(|(_, p)| p).collect();
        layered.sort_by_key(|p| p.layer());

        if reduction.is_none() {
            for payload in layered.iter() {
                match payload {
                    Payload::Band(b) | Payload::ZoneShade(b) => stats.boxes += b.paint(canvas, clip),
                    Payload::BandLabel(t) => stats.texts += t.paint(canvas, clip),
                    Payload::NodeLabel { .. } => {}
                }
            }
        }

        self.paint_nodes(canvas, clip, area.as_ref(), reduction, &mut stats);
        self.paint_links(canvas, clip, area.as_ref(), reduction, &mut stats);

        for payload in layered.iter() {
            if let Payload::NodeLabel { node, text } = payload {
                if reduction.map_or(true, |r| r.names.contains(node)) {
                    stats.texts += text.paint(canvas, clip);
                }
            }
        }
        stats
    }

    fn paint_nodes(
        &self,
        canvas: &mut dyn Canvas,
        clip: Option<&Rect>,
        area: Option<&Rect>,
        reduction: Option<&Reduction>,
        stats: &mut PaintStats,
    ) {
        let slots = slot_range(area.map(|a| (a.y, a.max_y())), self.min_row, self.row_to_node.len());
        for slot in slots {
            let index = self.row_to_node[slot];
            if index == NO_ENTRY {
                continue;
            }
            let node = &self.nodes[index as usize];
            if reduction.map_or(false, |r| !r.rows.contains(&node.row)) {
                continue;
            }
            let y = node.row * GRID_SIZE;
            for seg in node.segments.iter() {
                let line = LinePath::horizontal(y, seg.min * GRID_SIZE, seg.max * GRID_SIZE, node.color);
                stats.lines += line.paint(canvas, clip);
            }
        }
    }

    fn paint_links(
        &self,
        canvas: &mut dyn Canvas,
        clip: Option<&Rect>,
        area: Option<&Rect>,
        reduction: Option<&Reduction>,
        stats: &mut PaintStats,
    ) {
        let slots = slot_range(area.map(|a| (a.x, a.max_x())), self.min_col, self.col_to_link.len());
        for slot in slots {
            let index = self.col_to_link[slot];
            if index == NO_ENTRY {
                continue;
            }
            let link = &self.links[index as usize];
            if reduction.map_or(false, |r| !r.columns.contains(&link.column)) {
                continue;
            }
            let x = link.column * GRID_SIZE;
            let line = LinePath::vertical(x, link.source_row * GRID_SIZE, link.target_row * GRID_SIZE, link.color);
            stats.lines += line.paint(canvas, clip);

            let glyph = GlyphPath {
                x,
                source_y: link.source_row * GRID_SIZE,
                target_y: link.target_row * GRID_SIZE,
                half_size: self.glyph_half_size,
                directed: link.directed,
                color: link.color,
            };
            stats.glyphs += glyph.paint(canvas, clip);
        }
    }

    /// Paints just the `reduction` onto a transparent raster, for overlaying a selection.
    pub fn paint_selection(&self, reduction: &Reduction, world: Rect, screen: Dim) -> Raster {
        let mut raster = Raster::new(screen, PixelFormat::Argb);
        let mut canvas = RasterCanvas::new(&mut raster, world);
        self.paint(&mut canvas, Some(&world), Some(reduction));
        raster
    }
}

fn annotation_pad(span: i32, config: &SceneConfig) -> i32 {
    let raw = ((span as f64 * config.annotation_pad_fraction) as i32).max(config.min_annotation_pad);
    // Snap up to whole grid steps.
    ((raw + GRID_SIZE - 1) / GRID_SIZE) * GRID_SIZE
}

/// Lookup-array slots whose grid line lies in the world span `[lo, hi)`. All slots if there is no span.
fn slot_range(span: Option<(i32, i32)>, min_index: i32, len: usize) -> std::ops::Range<usize> {
    let len_i = len as i64;
    match span {
        None => 0..len,
        Some((lo, hi)) => {
            let first = (lo.div_euclid(GRID_SIZE) as i64 - min_index as i64).clamp(0, len_i);
            let last = ((hi.div_euclid(GRID_SIZE) as i64 + 1) - min_index as i64).clamp(0, len_i);
            first as usize..(last.max(first)) as usize
        }
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
