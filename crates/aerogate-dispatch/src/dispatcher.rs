// crates/aerogate-dispatch/src/dispatcher.rs
// ============================================================================
// Module: Webhook Dispatcher
// Description: At-least-once POST delivery of gateway events.
// Purpose: Fan out events to registered endpoints with a durable delivery log.
// Dependencies: aerogate-core, reqwest, rand, serde_json
// ============================================================================

//! ## Overview
//! The dispatcher implements the core `EventSink`: on every gateway event it
//! loads the matching registrations, re-runs the SSRF guard, and POSTs the
//! event JSON with bounded retries and jittered backoff. Every delivery is
//! logged with its attempt count and last response status. Orchestration
//! never fails on delivery errors; the log is the escalation surface.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use aerogate_core::Clock;
use aerogate_core::EventSink;
use aerogate_core::GatewayEvent;
use aerogate_core::NewDelivery;
use aerogate_core::WebhookRegistration;
use aerogate_core::WebhookStore;
use rand::Rng;
use reqwest::blocking::Client;

use crate::guard::validate_webhook_url;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Webhook delivery configuration.
///
/// # Invariants
/// - `timeout_ms` applies to the full request lifecycle of each attempt.
/// - `max_attempts` is at least 1.
/// - `allow_private_networks = false` re-rejects private targets before
///   every POST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookConfig {
    /// Per-attempt timeout in milliseconds.
    pub timeout_ms: u64,
    /// Maximum POST attempts per delivery.
    pub max_attempts: u32,
    /// User agent string for outbound requests.
    pub user_agent: String,
    /// Allow requests to private/link-local/loopback addresses.
    pub allow_private_networks: bool,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5_000,
            max_attempts: 3,
            user_agent: "aerogate/0.1".to_string(),
            allow_private_networks: false,
        }
    }
}

// ============================================================================
// SECTION: Dispatcher
// ============================================================================

/// At-least-once webhook dispatcher backed by a registration store.
pub struct WebhookDispatcher<S: WebhookStore + Send + Sync> {
    /// Registration and delivery-log storage.
    store: Arc<S>,
    /// Host clock for delivery stamps.
    clock: Arc<dyn Clock>,
    /// Delivery configuration.
    config: WebhookConfig,
    /// Outbound HTTP client.
    client: Option<Client>,
}

impl<S: WebhookStore + Send + Sync> WebhookDispatcher<S> {
    /// Creates a dispatcher; the HTTP client is built once up front.
    #[must_use]
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, config: WebhookConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .ok();
        Self {
            store,
            clock,
            config,
            client,
        }
    }

    /// Delivers one event to one registration with bounded retries.
    fn deliver(&self, registration: &WebhookRegistration, event: &GatewayEvent) {
        let Some(client) = &self.client else {
            self.log(registration, event, 0, None, false);
            return;
        };
        let mut last_status = None;
        for attempt in 1..=self.config.max_attempts.max(1) {
            // TOCTOU guard: the URL must still resolve publicly immediately
            // before every POST; a rebind between attempts fails closed.
            if !self.config.allow_private_networks
                && validate_webhook_url(&registration.url).is_err()
            {
                self.log(registration, event, attempt - 1, last_status, false);
                return;
            }
            let response = client.post(&registration.url).json(event).send();
            match response {
                Ok(response) => {
                    let status = response.status().as_u16();
                    last_status = Some(status);
                    if response.status().is_success() {
                        self.log(registration, event, attempt, last_status, true);
                        return;
                    }
                }
                Err(_) => {
                    last_status = None;
                }
            }
            if attempt < self.config.max_attempts {
                let jitter = rand::thread_rng().gen_range(0..100);
                thread::sleep(Duration::from_millis(u64::from(attempt) * 200 + jitter));
            }
        }
        self.log(registration, event, self.config.max_attempts, last_status, false);
    }

    /// Appends one delivery-log row; the sink seam is infallible, so a log
    /// write failure has nowhere to propagate and is dropped.
    fn log(
        &self,
        registration: &WebhookRegistration,
        event: &GatewayEvent,
        attempts: u32,
        last_status: Option<u16>,
        success: bool,
    ) {
        let _ = self.store.record_delivery(
            NewDelivery {
                webhook_id: registration.webhook_id,
                event_kind: event.kind,
                attempts,
                last_status,
                success,
            },
            self.clock.now(),
        );
    }
}

impl<S: WebhookStore + Send + Sync> EventSink for WebhookDispatcher<S> {
    fn emit(&self, event: &GatewayEvent) {
        let Ok(registrations) = self.store.webhooks_for_event(event.kind) else {
            return;
        };
        for registration in registrations {
            self.deliver(&registration, event);
        }
    }
}
