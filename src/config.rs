use std::path::Path;

use crate::filter::{EngineSettings, FilterMode};
use crate::foundation::error::{VidconvError, VidconvResult};
use crate::kernel::{AppliedKernel, DEFAULT_DIVISOR, Kernel, SHARPEN_3X3, prepare};
use crate::perf::DEFAULT_FPS_WINDOW;

/// Session configuration, usually loaded from JSON.
///
/// ```json
/// {
///   "kernel": [[-1, -1, 1], [-1, 14, -1], [1, -1, -1]],
///   "divisor": 4,
///   "fps_window": 20,
///   "threads": 4,
///   "mode": "accelerated",
///   "verify": false
/// }
/// ```
///
/// Every field is optional; missing fields take the defaults above.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Authored kernel rows. Rotated once at session start.
    pub kernel: Vec<Vec<i32>>,
    /// Fixed normalization divisor.
    pub divisor: i32,
    /// Samples per FPS window.
    pub fps_window: usize,
    /// Accelerated engine workers; `None` uses rayon defaults.
    pub threads: Option<usize>,
    /// Mode used when no other selector is given.
    pub mode: FilterMode,
    /// Cross-check accelerated output against the reference engine every tick.
    pub verify: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            kernel: SHARPEN_3X3.iter().map(|r| r.to_vec()).collect(),
            divisor: DEFAULT_DIVISOR,
            fps_window: DEFAULT_FPS_WINDOW,
            threads: None,
            mode: FilterMode::default(),
            verify: false,
        }
    }
}

impl SessionConfig {
    pub fn from_json(json: &str) -> VidconvResult<Self> {
        let cfg: Self =
            serde_json::from_str(json).map_err(|e| VidconvError::serde(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_path(path: impl AsRef<Path>) -> VidconvResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            VidconvError::validation(format!("read config '{}': {e}", path.display()))
        })?;
        Self::from_json(&text)
    }

    pub fn validate(&self) -> VidconvResult<()> {
        self.authored_kernel()?;
        self.engine_settings().validate()?;
        if self.fps_window == 0 {
            return Err(VidconvError::validation("fps_window must be >= 1"));
        }
        Ok(())
    }

    pub fn authored_kernel(&self) -> VidconvResult<Kernel> {
        Kernel::from_rows(&self.kernel)
    }

    /// Validate and rotate the configured kernel.
    pub fn applied_kernel(&self) -> VidconvResult<AppliedKernel> {
        Ok(prepare(&self.authored_kernel()?))
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            divisor: self.divisor,
            threads: self.threads,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_gives_defaults() {
        let cfg = SessionConfig::from_json("{}").unwrap();
        assert_eq!(cfg, SessionConfig::default());
        assert_eq!(cfg.authored_kernel().unwrap(), Kernel::sharpen());
        assert_eq!(cfg.mode, FilterMode::Accelerated);
    }

    #[test]
    fn parses_all_fields() {
        let cfg = SessionConfig::from_json(
            r#"{"kernel":[[0,0,0],[0,1,0],[0,0,0]],"divisor":1,"fps_window":5,
                "threads":2,"mode":"reference","verify":true}"#,
        )
        .unwrap();
        assert_eq!(cfg.divisor, 1);
        assert_eq!(cfg.fps_window, 5);
        assert_eq!(cfg.threads, Some(2));
        assert_eq!(cfg.mode, FilterMode::Reference);
        assert!(cfg.verify);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            SessionConfig::from_json(r#"{"kernel":[[1,2],[3,4]]}"#),
            Err(VidconvError::UnsupportedKernelSize(_))
        ));
        assert!(SessionConfig::from_json(r#"{"divisor":0}"#).is_err());
        assert!(SessionConfig::from_json(r#"{"fps_window":0}"#).is_err());
        assert!(SessionConfig::from_json(r#"{"threads":0}"#).is_err());
        assert!(matches!(
            SessionConfig::from_json(r#"{"mode":"wasm"}"#),
            Err(VidconvError::Serde(_))
        ));
        assert!(SessionConfig::from_json(r#"{"colour":"red"}"#).is_err());
    }
}
