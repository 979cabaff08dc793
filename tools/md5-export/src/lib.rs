//! md5-export library
//!
//! Converts skinned scenes into idTech 4 `.md5mesh` / `.md5anim` files. The
//! pipeline runs skeleton -> submeshes -> animation -> text, reading the scene
//! only through [`scene::SceneAdapter`].

pub mod animation;
pub mod diagnostics;
pub mod error;
pub mod export;
pub mod interpolate;
pub mod manifest;
pub mod mesh;
pub mod scene;
pub mod skeleton;

pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
pub use error::{ExportError, Result};
pub use export::{
    BatchReport, ExportMode, ExportReport, ExportSettings, RenderedUnit, export_file, export_scene,
    render_unit,
};
pub use manifest::{ExportManifest, build_all};
pub use scene::{SceneAdapter, load_scene};
pub use skeleton::{Skeleton, build_skeleton};
