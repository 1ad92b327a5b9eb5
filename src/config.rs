use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::VerifierError;
use crate::mismatch::{ClassifyPolicy, MismatchCategory};
use crate::spatial::LayerRange;

const DEFAULT_TICK_BUDGET_MS: u64 = 50;
const DEFAULT_MAX_HIGHLIGHTED_POSITIONS: usize = 1000;
const DEFAULT_MAX_HUD_LINES: usize = 10;
const DEFAULT_RECHECK_MARGIN: i32 = 1;

/// Per-category display colours. The verifier only passes them through.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CategoryColors {
    pub correct: [f32; 4],
    pub missing: [f32; 4],
    pub extra: [f32; 4],
    pub wrong_type: [f32; 4],
    pub wrong_variant: [f32; 4],
}

impl Default for CategoryColors {
    fn default() -> Self {
        Self {
            correct: [0.2, 1.0, 0.2, 0.1],
            missing: [0.0, 1.0, 1.0, 0.25],
            extra: [1.0, 0.0, 1.0, 0.25],
            wrong_type: [1.0, 0.0, 0.0, 0.25],
            wrong_variant: [1.0, 0.7, 0.0, 0.25],
        }
    }
}

impl CategoryColors {
    pub fn for_category(&self, category: MismatchCategory) -> [f32; 4] {
        match category {
            MismatchCategory::Missing => self.missing,
            MismatchCategory::Extra => self.extra,
            MismatchCategory::WrongType => self.wrong_type,
            MismatchCategory::WrongVariant => self.wrong_variant,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VerifierConfig {
    /// Wall-clock slice a session may spend scanning per tick.
    pub tick_budget_ms: u64,
    pub ignore_existing_fluids: bool,
    pub max_highlighted_positions: usize,
    pub max_hud_lines: usize,
    /// Restricts scanning to a slab, e.g. the currently displayed layers.
    pub layer_range: Option<LayerRange>,
    /// Neighbourhood (in blocks) that must be loaded before a changed position is rechecked.
    pub recheck_margin: i32,
    pub colors: CategoryColors,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl VerifierConfig {
    pub fn with_defaults() -> Self {
        Self {
            tick_budget_ms: DEFAULT_TICK_BUDGET_MS,
            ignore_existing_fluids: false,
            max_highlighted_positions: DEFAULT_MAX_HIGHLIGHTED_POSITIONS,
            max_hud_lines: DEFAULT_MAX_HUD_LINES,
            layer_range: None,
            recheck_margin: DEFAULT_RECHECK_MARGIN,
            colors: CategoryColors::default(),
        }
    }

    pub fn tick_budget(&self) -> Duration {
        Duration::from_millis(self.tick_budget_ms)
    }

    pub fn classify_policy(&self) -> ClassifyPolicy {
        ClassifyPolicy {
            ignore_existing_fluids: self.ignore_existing_fluids,
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, VerifierError> {
        serde_json::from_str(json).map_err(|error| VerifierError::ConfigParse {
            message: error.to_string(),
        })
    }

    pub fn load(path: &Path) -> Result<Self, VerifierError> {
        let raw = std::fs::read_to_string(path).map_err(|error| VerifierError::ConfigRead {
            path: path.display().to_string(),
            message: error.to_string(),
        })?;
        Self::from_json_str(&raw)
    }
}
