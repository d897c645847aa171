use async_trait::async_trait;

use crate::pipeline::{Flow, PipelineRequest, Stage, StageError, StageInput, StageResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub ip: String,
    pub user_agent: Option<String>,
}

impl DeviceInfo {
    /// Caller address. With `trust_proxy`: first `X-Forwarded-For` hop, then
    /// `X-Real-IP`, then the peer. Otherwise the peer alone.
    pub fn from_request(request: &PipelineRequest, trust_proxy: bool) -> Self {
        let forwarded = trust_proxy
            .then(|| forwarded_ip(request))
            .flatten()
            .map(str::to_string);

        let ip = forwarded
            .or_else(|| request.remote_addr.map(|addr| addr.to_string()))
            .unwrap_or_else(|| "unknown".to_string());

        Self {
            ip,
            user_agent: request.header_str("user-agent").map(str::to_string),
        }
    }
}

fn forwarded_ip(request: &PipelineRequest) -> Option<&str> {
    request
        .header_str("x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .or_else(|| request.header_str("x-real-ip"))
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

pub struct DeviceStage {
    trust_proxy: bool,
}

impl DeviceStage {
    pub fn new(trust_proxy: bool) -> Self {
        Self { trust_proxy }
    }
}

#[async_trait]
impl Stage for DeviceStage {
    async fn execute(&self, input: StageInput<'_>) -> Result<Flow, StageError> {
        let device = DeviceInfo::from_request(input.request, self.trust_proxy);
        tracing::trace!("Device: ip={} agent={:?}", device.ip, device.user_agent);
        Ok(Flow::next(StageResult::Device(device)))
    }
}
