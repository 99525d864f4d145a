use serde::{Deserialize, Serialize};

/// Terminal dimensions: the initial size carried in `ExecMeta`, and the
/// shape resize notifications are translated into on either side of the
/// SSH `window-change` channel request that carries them. Field names
/// match the original `pty.Winsize` JSON shape (`Rows`, `Cols`, `X`, `Y`)
/// so a capture of `ExecMeta` traffic reads the same regardless of which
/// side wrote it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinSize {
    #[serde(rename = "Rows")]
    pub rows: u16,
    #[serde(rename = "Cols")]
    pub cols: u16,
    #[serde(rename = "X", default)]
    pub xpix: u16,
    #[serde(rename = "Y", default)]
    pub ypix: u16,
}

impl WinSize {
    pub const DEFAULT: WinSize = WinSize {
        rows: 24,
        cols: 80,
        xpix: 0,
        ypix: 0,
    };
}

impl Default for WinSize {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Extra data carried on an `"exec"` SSH channel open request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecMeta {
    #[serde(rename = "Size")]
    pub winsize: WinSize,
    #[serde(rename = "Cmd")]
    pub cmd: String,
    #[serde(rename = "Args")]
    pub args: Vec<String>,
}

/// Extra data carried on a `"share-dir"` SSH channel open request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MountDirMeta {
    #[serde(rename = "Path")]
    pub path: String,
    #[serde(rename = "CacheLimit")]
    pub cache_limit: i64,
}

/// `MountDirMeta::cache_limit` default when the caller passes a
/// non-positive value.
pub const DEFAULT_CACHE_LIMIT: i64 = 2048;

impl MountDirMeta {
    pub fn effective_cache_limit(&self) -> i64 {
        if self.cache_limit > 0 {
            self.cache_limit
        } else {
            DEFAULT_CACHE_LIMIT
        }
    }
}
