// =============================================================================
// Dispatch Safety Oracle
// =============================================================================
//
// A runtime scheduler asks, per call target, whether invocations may run in
// parallel. The answer is derived from a completed classification: a function
// qualifies when it is isolated, a method when both the method and its object
// type are. Everything else must be serialized on one strand.
//
// Reports are cached per program fingerprint, so repeated queries against an
// unchanged program never re-run the analysis. The cache is a `DashMap`, so
// one oracle can be shared between scheduler threads.

use crate::ast::{FnId, Name, Program};
use crate::config::CheckConfig;
use crate::error::{IsoError, IsoResult};
use crate::hash::Fingerprint;
use crate::isolation::{check_program, Report};
use dashmap::DashMap;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum DispatchVerdict {
    /// Invocations may run concurrently.
    SafeConcurrent,
    /// Invocations must run one at a time on the same strand.
    SerializeOnSameStrand,
}

impl DispatchVerdict {
    pub fn is_concurrent(self) -> bool {
        self == DispatchVerdict::SafeConcurrent
    }
}

/// A function, or a method of an object type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DispatchTarget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<Name>,
    pub method: Name,
}

impl DispatchTarget {
    pub fn function(name: impl Into<Name>) -> Self {
        Self {
            object: None,
            method: name.into(),
        }
    }

    pub fn method(object: impl Into<Name>, method: impl Into<Name>) -> Self {
        Self {
            object: Some(object.into()),
            method: method.into(),
        }
    }

    pub fn fn_id(&self) -> FnId {
        FnId {
            object: self.object.clone(),
            name: self.method.clone(),
        }
    }
}

impl fmt::Display for DispatchTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fn_id())
    }
}

/// Derive the verdict for `target` from a finished report.
pub fn dispatch_verdict(report: &Report, target: &DispatchTarget) -> IsoResult<DispatchVerdict> {
    let id = target.fn_id();
    let Some(verdict) = report.function_verdict(&id) else {
        return Err(IsoError::UnknownTarget(id.to_string()));
    };
    let object_ok = match &target.object {
        Some(object) => report.is_isolated_object(object),
        None => true,
    };
    Ok(if verdict.isolated && object_ok {
        DispatchVerdict::SafeConcurrent
    } else {
        DispatchVerdict::SerializeOnSameStrand
    })
}

pub struct DispatchOracle {
    config: CheckConfig,
    cache: DashMap<Fingerprint, Arc<Report>>,
}

impl DispatchOracle {
    pub fn new(config: CheckConfig) -> Self {
        Self {
            config,
            cache: DashMap::new(),
        }
    }

    /// Classification of `program`, computed at most once per fingerprint.
    pub fn report(&self, program: &Program) -> IsoResult<Arc<Report>> {
        let key = Fingerprint::of_program(program)?;
        if let Some(report) = self.cache.get(&key) {
            debug!("dispatch cache hit for {:?}", key);
            return Ok(Arc::clone(report.value()));
        }
        debug!("dispatch cache miss for {:?}, classifying `{}`", key, program.name);
        let report = Arc::new(check_program(program, &self.config));
        let entry = self.cache.entry(key).or_insert(report);
        Ok(Arc::clone(entry.value()))
    }

    pub fn query(&self, program: &Program, target: &DispatchTarget) -> IsoResult<DispatchVerdict> {
        let report = self.report(program)?;
        dispatch_verdict(&report, target)
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    pub fn clear(&self) {
        self.cache.clear();
    }
}

impl Default for DispatchOracle {
    fn default() -> Self {
        Self::new(CheckConfig::default())
    }
}
