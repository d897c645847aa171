pub mod authenticate;
pub mod authorize;
pub mod device;
pub mod headers;
pub mod rate_limit;
pub mod response;

pub use authenticate::{is_public_route, AuthOutcome, AuthenticateStage, PUBLIC_ROUTES};
pub use authorize::AuthorizeStage;
pub use device::{DeviceInfo, DeviceStage};
pub use headers::{HeaderSnapshot, HeadersStage};
pub use rate_limit::{RateLimitOutcome, RateLimitStage};
pub use response::{PipelineResponse, ResponseDispatcher};
