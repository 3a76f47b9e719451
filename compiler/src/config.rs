// config.rs — Compiler options
//
// Tunables consumed by propagation and type inference. Options load from a
// JSON file (every field optional) and the driver may override single
// fields from the command line afterwards.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::diag::{codes, Diagnostic};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompilerOptions {
    /// Narrowing passes used to bound a recursive group from above.
    pub narrowing_limit: u32,
    /// Consecutive growth steps a bound may take before it is forced.
    pub widening_limit: u32,
    /// Rewrite `enable`/`control` into guarded control signals.
    pub enable_control: bool,
    /// Clamp slider and number-entry values into their declared range.
    pub range_ui: bool,
    /// Flush-to-zero mode for recursive signals (0 disables it).
    pub ftz_mode: u32,
    /// Reject delays whose amount is not provably bounded and non-negative.
    pub causality: bool,
    /// Upper bound (exclusive) for soundfile part indices.
    pub max_soundfile_parts: u32,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            narrowing_limit: 3,
            widening_limit: 10,
            enable_control: true,
            range_ui: false,
            ftz_mode: 0,
            causality: false,
            max_soundfile_parts: 256,
        }
    }
}

impl CompilerOptions {
    pub fn from_json(text: &str) -> Result<Self, Diagnostic> {
        let opts: CompilerOptions = serde_json::from_str(text).map_err(|e| {
            Diagnostic::error(codes::E0402, format!("invalid options file: {e}"))
        })?;
        opts.validate()?;
        Ok(opts)
    }

    pub fn load(path: &Path) -> Result<Self, Diagnostic> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Diagnostic::error(
                codes::E0402,
                format!("cannot read options file '{}': {e}", path.display()),
            )
        })?;
        Self::from_json(&text).map_err(|d| d.with_context(path.display().to_string()))
    }

    pub fn validate(&self) -> Result<(), Diagnostic> {
        if self.narrowing_limit == 0 {
            return Err(Diagnostic::error(
                codes::E0402,
                "narrowing_limit must be at least 1",
            ));
        }
        if self.max_soundfile_parts == 0 {
            return Err(Diagnostic::error(
                codes::E0402,
                "max_soundfile_parts must be at least 1",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let opts = CompilerOptions::from_json(r#"{ "causality": true }"#).unwrap();
        assert!(opts.causality);
        assert_eq!(opts.widening_limit, 10);
        assert_eq!(opts.max_soundfile_parts, 256);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = CompilerOptions::from_json(r#"{ "widen": 3 }"#).unwrap_err();
        assert_eq!(err.code, Some(codes::E0402));
    }

    #[test]
    fn zero_narrowing_is_invalid() {
        let err = CompilerOptions::from_json(r#"{ "narrowing_limit": 0 }"#).unwrap_err();
        assert!(err.message.contains("narrowing_limit"));
    }
}
