//! Client-side presentation layer for a grid-simulation workflow server.
//!
//! Four cooperating pieces: decision-tree decoding and statistics
//! aggregation (`tree`, `stats`), geometry (`layout`), a retained scene with
//! view transforms (`scene`, `render`, `transform`, `color`), and a typed
//! push-message client with its REST sidecar (`dispatch`). Everything except
//! the dispatch layer is synchronous and pure, so a host shell can drive it
//! from any event loop.

pub mod color;
pub mod config;
pub mod dispatch;
pub mod layout;
pub mod logging;
pub mod render;
pub mod scene;
pub mod stats;
pub mod transform;
pub mod tree;

pub use config::Config;
pub use dispatch::{ConnectionState, DispatchClient, PushMessage, RestClient, Session, Update};
pub use layout::{Bounds, NodeBox, TreeLayout};
pub use render::TreeRenderer;
pub use scene::Scene;
pub use stats::{compute_stats, NodeStats};
pub use transform::{Affine2, PointerEvent, ViewTool};
pub use tree::{Tree, TreeNode, TreeResult};
