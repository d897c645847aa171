use crate::authz::AuthorizationDecision;
use crate::middleware::authenticate::AuthOutcome;
use crate::middleware::device::DeviceInfo;
use crate::middleware::headers::HeaderSnapshot;
use crate::middleware::rate_limit::RateLimitOutcome;
use crate::pipeline::stage::StageId;
use crate::types::Principal;

/// Result recorded by one stage
#[derive(Debug, Clone, PartialEq)]
pub enum StageResult {
    Empty,
    Device(DeviceInfo),
    Headers(HeaderSnapshot),
    Authenticated(AuthOutcome),
    RateLimit(RateLimitOutcome),
    Authorized(AuthorizationDecision),
}

/// Per-request accumulator of stage results, in execution order.
///
/// Owned by a single [`Bolt`](crate::pipeline::Bolt); stages only ever see
/// it through a shared reference.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    entries: Vec<(StageId, StageResult)>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a stage result. Re-recording a stage replaces its entry in place.
    pub fn record(&mut self, stage: StageId, result: StageResult) {
        match self.entries.iter_mut().find(|(id, _)| *id == stage) {
            Some(entry) => entry.1 = result,
            None => self.entries.push((stage, result)),
        }
    }

    pub fn get(&self, stage: StageId) -> Option<&StageResult> {
        self.entries
            .iter()
            .find(|(id, _)| *id == stage)
            .map(|(_, result)| result)
    }

    pub fn contains(&self, stage: StageId) -> bool {
        self.get(stage).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stage names in the order they were recorded
    pub fn stages(&self) -> impl Iterator<Item = StageId> + '_ {
        self.entries.iter().map(|(id, _)| *id)
    }

    pub fn device(&self) -> Option<&DeviceInfo> {
        match self.get(StageId::Device) {
            Some(StageResult::Device(info)) => Some(info),
            _ => None,
        }
    }

    pub fn headers(&self) -> Option<&HeaderSnapshot> {
        match self.get(StageId::Headers) {
            Some(StageResult::Headers(snapshot)) => Some(snapshot),
            _ => None,
        }
    }

    pub fn authentication(&self) -> Option<&AuthOutcome> {
        match self.get(StageId::Authenticate) {
            Some(StageResult::Authenticated(outcome)) => Some(outcome),
            _ => None,
        }
    }

    pub fn principal(&self) -> Option<&Principal> {
        match self.authentication() {
            Some(AuthOutcome::Principal(principal)) => Some(principal),
            _ => None,
        }
    }

    pub fn rate_limit(&self) -> Option<&RateLimitOutcome> {
        match self.get(StageId::RateLimit) {
            Some(StageResult::RateLimit(outcome)) => Some(outcome),
            _ => None,
        }
    }

    pub fn authorization(&self) -> Option<&AuthorizationDecision> {
        match self.get(StageId::Authorize) {
            Some(StageResult::Authorized(decision)) => Some(decision),
            _ => None,
        }
    }
}
