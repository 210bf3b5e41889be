//! Severity-threshold policy
//!
//! Every policy-governed diagnostic flows through one [`Policy::enforce`]
//! gate: the call site never decides throw/log/collect itself. A policy is
//! constructed per evaluation from the caller's bindings and owns that
//! evaluation's diagnostics bag.

use crate::codes::{DiagnosticCode, Severity};
use crate::error::{Diagnostic, Result};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Threshold configuration, in severity-level units (0..70).
///
/// A code participates in a bucket when its severity is strictly below the
/// bucket's threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PolicyConfig {
    pub validation_level: u8,
    pub log_level: u8,
    pub collect_level: u8,
    pub throw_level: u8,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            validation_level: Severity::Warning.level(),
            log_level: Severity::Notice.level(),
            collect_level: crate::codes::SEVERITY_CEILING,
            throw_level: Severity::Warning.level(),
        }
    }
}

impl PolicyConfig {
    /// A configuration that never throws: everything is collected instead.
    pub fn lenient() -> Self {
        Self {
            throw_level: 0,
            ..Self::default()
        }
    }
}

/// The per-evaluation policy view plus diagnostics bag.
pub struct Policy {
    config: PolicyConfig,
    collected: Mutex<Vec<Diagnostic>>,
}

impl Policy {
    pub fn new(config: PolicyConfig) -> Self {
        Self {
            config,
            collected: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    pub fn severity_for(&self, code: DiagnosticCode) -> u8 {
        code.severity().level()
    }

    /// Whether a validation guarded by `code` should run at all.
    pub fn should_validate(&self, code: DiagnosticCode) -> bool {
        self.severity_for(code) < self.config.validation_level
    }

    /// Collect and/or log the diagnostic per the thresholds; returns true
    /// when the caller must propagate it as an error.
    pub fn enforce(&self, diagnostic: &Diagnostic) -> bool {
        let severity = self.severity_for(diagnostic.code);
        if severity < self.config.collect_level {
            self.collected
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(diagnostic.clone());
        }
        if severity < self.config.log_level {
            match diagnostic.code.severity() {
                Severity::Fatal | Severity::Invalid | Severity::Error => {
                    tracing::error!(code = %diagnostic.code, "{diagnostic}")
                }
                Severity::Warning => tracing::warn!(code = %diagnostic.code, "{diagnostic}"),
                Severity::Notice | Severity::Info => {
                    tracing::info!(code = %diagnostic.code, "{diagnostic}")
                }
                Severity::Debug => tracing::debug!(code = %diagnostic.code, "{diagnostic}"),
            }
        }
        severity < self.config.throw_level
    }

    /// Enforce and propagate: `Err` when the diagnostic crosses the throw
    /// threshold, `Ok` when it was downgraded to log/collect.
    pub fn check(&self, diagnostic: Diagnostic) -> Result<()> {
        if self.enforce(&diagnostic) {
            Err(diagnostic.into())
        } else {
            Ok(())
        }
    }

    /// Snapshot of the diagnostics collected so far.
    pub fn collected(&self) -> Vec<Diagnostic> {
        self.collected
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Drain the diagnostics bag.
    pub fn take_collected(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.collected.lock().unwrap_or_else(|e| e.into_inner()))
    }
}
