//! API layer - HTTP endpoint handlers organized by domain.

mod events;
mod health;
mod messages;
mod metrics;
mod routes;
mod templates;

pub use events::{publish_event, PublishEventRequest};
pub use health::{health, HealthResponse};
pub use messages::{get_message, resolve_message, PublishTarget, ResolveRequest, ResolveResponse};
pub use metrics::prometheus_metrics;
pub use routes::api_routes;
pub use templates::{list_templates, register_template, TemplateListResponse};
