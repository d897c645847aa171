use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::pipeline::{Flow, PipelineRequest, Stage, StageError, StageInput, StageResult};

/// Lower-cased header name to value, for headers that are valid UTF-8
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderSnapshot(BTreeMap<String, String>);

impl HeaderSnapshot {
    pub fn from_request(request: &PipelineRequest) -> Self {
        let headers = request
            .headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        Self(headers)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

pub struct HeadersStage;

#[async_trait]
impl Stage for HeadersStage {
    async fn execute(&self, input: StageInput<'_>) -> Result<Flow, StageError> {
        Ok(Flow::next(StageResult::Headers(HeaderSnapshot::from_request(
            input.request,
        ))))
    }
}
