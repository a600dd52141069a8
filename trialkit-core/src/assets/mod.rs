//! Media asset bookkeeping: typed keys, batch planning, resolution and
//! preloading.

pub mod keys;
pub mod planner;
pub mod preload;
pub mod resolver;

pub use keys::{AssetKey, AssetKind, AssetRefs, ItemField, camelize};
pub use planner::{AssetBatch, AssetPlan, batch_items, full_asset_set, plan_asset_batches};
pub use preload::{AssetPreloader, PreloadPipeline, RecordingPreloader};
pub use resolver::{AssetCatalog, AssetResolver, AudioAsset, PermissiveResolver};
