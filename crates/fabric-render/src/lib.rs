//! Turns a fabric model into pixels.
//!
//! Two renderers share one model: [`SceneCache`] draws every node and link line individually, and [`BucketRenderer`]
//! accumulates line density when a view holds too many links per pixel for that to be readable or fast. [`DrawerSet`]
//! picks between them per tile.

pub mod bucket;
pub mod canvas;
pub mod drawer;
pub mod fonts;
pub mod model;
pub mod payload_tree;
pub mod primitives;
pub mod scene;

pub use bucket::{BucketConfig, BucketRenderer};
pub use canvas::{Canvas, RasterCanvas, Transform};
pub use drawer::{select_renderer, DrawerSet, LinkDensity, RendererKind, TileDrawer};
pub use fonts::{ApproxFontMetrics, FontLadder, FontMetrics, LabelFont};
pub use model::{
    Annotation, AnnotationSet, ColorGenerator, ColorPalette, DisplayOptions, DrainZone, FabricModel, LinkInfo, NoProgress,
    NodeInfo, ProgressMonitor,
};
pub use payload_tree::PayloadTree;
pub use primitives::{BoxPath, GlyphPath, LinePath, TextPath};
pub use scene::{PaintStats, Reduction, SceneCache, SceneConfig, SceneInputs};

// Re-exports.
pub use fabric_core;
