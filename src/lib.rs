//! Geodesist Dispatch Bridge
//!
//! Webhook-driven integration between AmoCRM and the Wappi MAX messaging
//! API: when a lead enters the configured "assigned" status, the geodesist
//! named on the lead gets a MAX message with the job details, and an audit
//! note is written back onto the lead.
//!
//! # Modules
//!
//! - `config`: Configuration management.
//! - `crm_client`: AmoCRM v4 API client.
//! - `dedup`: Webhook de-duplication set.
//! - `errors`: Error handling types.
//! - `handlers`: Application state and health endpoints.
//! - `messaging`: Wappi MAX API client.
//! - `models`: Typed views over AmoCRM lead/contact/pipeline payloads.
//! - `phone`: Phone normalization and extraction.
//! - `pipeline`: Background dispatch workflow and message composition.
//! - `status_resolver`: Status-name to status-id resolution with caching.
//! - `webhook_handler`: Inbound webhook endpoint.
//! - `webhook_models`: Canonical inbound event and response envelope.

pub mod config;
pub mod crm_client;
pub mod dedup;
pub mod errors;
pub mod handlers;
pub mod messaging;
pub mod models;
pub mod phone;
pub mod pipeline;
pub mod status_resolver;
pub mod webhook_handler;
pub mod webhook_models;
