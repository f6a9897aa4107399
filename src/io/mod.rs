//! I/O modules for scene archives, job graphs, rasters and catalogs

pub mod catalog;
pub mod graph;
pub mod raster;
pub mod safe;
pub mod template;

pub use catalog::CatalogBuilder;
pub use graph::{Element, GraphNode, JobGraph, SourceRef};
pub use raster::{GeoTiffOptions, RasterProfile};
pub use safe::SafeArchive;
pub use template::{GraphTemplate, PlaceholderRenderer, Substitutions};
