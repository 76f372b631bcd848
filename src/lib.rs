#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod assets;
pub mod errors;
pub mod scene;
pub mod tasks;

pub use assets::{AssetDecoder, AssetPipeline, ColorSpace, GltfDecoder, LoadStage, ModelConfig};
pub use errors::TalosError;
pub use scene::{
    DirtyFlags, EditTarget, Environment, Material, Mesh, Object, PendingEdit, SceneEditor,
    SceneGraph, SceneStore, Transform,
};
pub use tasks::{TaskQueue, WorkerPool};
