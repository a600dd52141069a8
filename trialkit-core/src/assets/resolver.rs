//! Asset resolution.
//!
//! The session never touches media directly. It asks an [`AssetResolver`]
//! whether a key resolves to a URI and how long an audio asset plays.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::keys::{AssetKey, AssetKind};

/// Resolves camel-cased asset keys to URIs.
pub trait AssetResolver: Send + Sync {
    /// URI of an asset, or `None` when the asset does not exist.
    fn resolve(&self, kind: AssetKind, key: &AssetKey) -> Option<String>;

    /// Playback duration of an audio asset, when known.
    fn audio_duration(&self, _key: &AssetKey) -> Option<Duration> {
        None
    }
}

/// An audio asset entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioAsset {
    pub uri: String,
    #[serde(default)]
    pub duration_ms: Option<u64>,
}

/// Static asset manifest, typically loaded from JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetCatalog {
    pub images: BTreeMap<AssetKey, String>,
    pub audio: BTreeMap<AssetKey, AudioAsset>,
}

impl AssetCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_image(mut self, key: &str, uri: impl Into<String>) -> Self {
        self.images.insert(AssetKey::from_reference(key), uri.into());
        self
    }

    #[must_use]
    pub fn with_audio(mut self, key: &str, uri: impl Into<String>, duration: Duration) -> Self {
        self.audio.insert(
            AssetKey::from_reference(key),
            AudioAsset {
                uri: uri.into(),
                duration_ms: Some(duration.as_millis() as u64),
            },
        );
        self
    }

    /// All keys of a kind, in key order.
    pub fn keys(&self, kind: AssetKind) -> Box<dyn Iterator<Item = &AssetKey> + '_> {
        match kind {
            AssetKind::Image => Box::new(self.images.keys()),
            AssetKind::Audio => Box::new(self.audio.keys()),
        }
    }

    pub fn len(&self) -> usize {
        self.images.len() + self.audio.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AssetResolver for AssetCatalog {
    fn resolve(&self, kind: AssetKind, key: &AssetKey) -> Option<String> {
        match kind {
            AssetKind::Image => self.images.get(key).cloned(),
            AssetKind::Audio => self.audio.get(key).map(|a| a.uri.clone()),
        }
    }

    fn audio_duration(&self, key: &AssetKey) -> Option<Duration> {
        self.audio
            .get(key)
            .and_then(|a| a.duration_ms)
            .map(Duration::from_millis)
    }
}

/// Resolver that accepts every key. Used when media checks are disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissiveResolver;

impl AssetResolver for PermissiveResolver {
    fn resolve(&self, _kind: AssetKind, key: &AssetKey) -> Option<String> {
        Some(key.to_string())
    }
}
