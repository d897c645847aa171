//! HTTP surface: `/health` and the single `/api/:moduleName/:fnName` route.

use axum::{
    body::Bytes,
    extract::{ConnectInfo, Path, Query, State},
    http::{HeaderMap, Method},
    response::{IntoResponse, Json, Response},
    routing::{any, get},
    Router,
};
use futures::FutureExt;
use serde_json::{json, Map, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::TokenService;
use crate::authz::{AuthorizationResolver, PermissionService, ResourceLookup, SchoolScopePolicy};
use crate::config::AppConfig;
use crate::error::ApiError;
use crate::handlers::{HandlerCall, HandlerRegistry};
use crate::middleware::{
    is_public_route, AuthenticateStage, AuthorizeStage, DeviceStage, HeadersStage, RateLimitStage,
};
use crate::pipeline::{Bolt, PipelineRequest, Stack, StackError, StageId, StageRegistry};
use crate::store::{AccountStore, CounterStore, MemoryCounterStore, MemoryDirectory};

/// Collaborators the pipeline is assembled from
pub struct Services {
    pub tokens: Arc<dyn TokenService>,
    pub accounts: Arc<dyn AccountStore>,
    pub lookup: Arc<dyn ResourceLookup>,
    pub permissions: Arc<dyn PermissionService>,
    pub counters: Arc<dyn CounterStore>,
    pub handlers: HandlerRegistry,
}

impl Services {
    /// Everything backed by one in-memory directory
    pub fn in_memory(directory: Arc<MemoryDirectory>, tokens: Arc<dyn TokenService>) -> Self {
        Self {
            tokens: tokens.clone(),
            accounts: directory.clone(),
            lookup: directory.clone(),
            permissions: Arc::new(SchoolScopePolicy),
            counters: Arc::new(MemoryCounterStore::new()),
            handlers: HandlerRegistry::with_directory(directory, tokens),
        }
    }
}

/// Shared per-process state: stage registry, the two stacks, handlers
#[derive(Clone, Debug)]
pub struct AppState {
    registry: Arc<StageRegistry>,
    protected: Stack,
    public: Stack,
    handlers: Arc<HandlerRegistry>,
}

impl AppState {
    pub fn new(services: Services, config: &AppConfig) -> Result<Self, StackError> {
        let rate_limited = config.rate_limit.enabled;
        let resolver = Arc::new(AuthorizationResolver::new(services.lookup, services.permissions));

        let mut registry = StageRegistry::new()
            .register(StageId::Device, DeviceStage::new(config.server.trust_proxy))
            .register(StageId::Headers, HeadersStage)
            .register(
                StageId::Authenticate,
                AuthenticateStage::new(services.tokens, services.accounts),
            )
            .register(StageId::Authorize, AuthorizeStage::new(resolver));
        if rate_limited {
            registry = registry.register(
                StageId::RateLimit,
                RateLimitStage::new(
                    services.counters,
                    config.rate_limit.max_requests,
                    Duration::from_secs(config.rate_limit.window_secs),
                ),
            );
        }

        let protected = Stack::new(
            [
                Some(StageId::Device),
                Some(StageId::Headers),
                Some(StageId::Authenticate),
                rate_limited.then_some(StageId::RateLimit),
                Some(StageId::Authorize),
            ]
            .into_iter()
            .flatten(),
        )?;
        let public = Stack::new(
            [
                Some(StageId::Device),
                Some(StageId::Headers),
                rate_limited.then_some(StageId::RateLimit),
            ]
            .into_iter()
            .flatten(),
        )?;

        tracing::info!(
            "Pipeline ready: protected={:?} public={:?}",
            protected.ids().iter().map(StageId::name).collect::<Vec<_>>(),
            public.ids().iter().map(StageId::name).collect::<Vec<_>>()
        );

        Ok(Self {
            registry: Arc::new(registry),
            protected,
            public,
            handlers: Arc::new(services.handlers),
        })
    }

    pub fn stack_for(&self, module: &str, function: &str) -> &Stack {
        if is_public_route(module, function) {
            &self.public
        } else {
            &self.protected
        }
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/:module_name/:fn_name", any(dispatch))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({
        "ok": true,
        "data": {
            "status": "healthy",
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }
    }))
}

async fn dispatch(
    State(state): State<AppState>,
    Path((module_name, fn_name)): Path<(String, String)>,
    method: Method,
    Query(query): Query<Map<String, Value>>,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    body: Bytes,
) -> Response {
    let mut request = PipelineRequest::new(method, module_name, fn_name)
        .with_headers(headers)
        .with_query(query);
    if !body.is_empty() {
        request = match serde_json::from_slice::<Value>(&body) {
            Ok(value) => request.with_body(value),
            Err(e) => request.with_malformed_body(e.to_string()),
        };
    }
    if let Some(ConnectInfo(addr)) = connect_info {
        request = request.with_remote_addr(addr.ip());
    }

    let stack = state.stack_for(&request.module, &request.function).clone();
    let handlers = state.handlers.clone();

    let mut bolt = Bolt::new(stack, state.registry.clone(), request).on_done(move |req, ctx| {
        let module = req.module.clone();
        let function = req.function.clone();
        let body_error = req.body_error.clone();
        let call = HandlerCall::new(req.params())
            .with_scope(ctx.authorization().and_then(|decision| decision.scope.clone()));
        async move {
            if let Some(e) = body_error {
                tracing::debug!("Rejected malformed JSON body for {}.{}: {}", module, function, e);
                return Err(ApiError::bad_request("Invalid JSON body"));
            }
            handlers.dispatch(&module, &function, call).await
        }
        .boxed()
    });

    bolt.run().await;
    bolt.into_response().into_response()
}
