//! Scripted sources for unit tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::sources::{ReputationSource, SourceError, SourceResult};

pub enum Behavior {
    Score(f64),
    Fail(SourceError),
    Slow(Duration, f64),
    /// Returned verbatim, bypassing the `SourceResult` constructors.
    Raw(SourceResult),
}

pub struct MockSource {
    name: &'static str,
    behavior: Behavior,
    calls: AtomicU32,
}

impl MockSource {
    pub fn new(name: &'static str, behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            name,
            behavior,
            calls: AtomicU32::new(0),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReputationSource for MockSource {
    fn name(&self) -> &str {
        self.name
    }

    async fn check_domain(&self, domain: &str) -> Result<SourceResult, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Score(s) => Ok(SourceResult::success(
                self.name,
                *s,
                serde_json::json!({ "domain": domain }),
            )),
            Behavior::Fail(e) => Err(e.clone()),
            Behavior::Raw(result) => Ok(result.clone()),
            Behavior::Slow(delay, s) => {
                tokio::time::sleep(*delay).await;
                Ok(SourceResult::success(self.name, *s, serde_json::Value::Null))
            }
        }
    }
}
