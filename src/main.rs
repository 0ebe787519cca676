//! `carelink-sync` - watches the dashboard event channel.
//!
//! ```text
//! carelink-sync patient:42 user:7
//! ```
//!
//! Joins the given scopes, keeps a live medication and alert view for every
//! `patient:` scope, and logs each decoded event until interrupted.

use std::sync::Arc;

use carelink_sync::adapters::{EnvCredentialSource, RestApiConfig, RestEntityApi, WsTransport};
use carelink_sync::application::{ConnectionManager, PatientView, SubscriptionHandle};
use carelink_sync::config::{AppConfig, LogFormat, LoggingConfig};
use carelink_sync::domain::events::EventName;
use carelink_sync::domain::foundation::{PatientId, ScopeId};
use carelink_sync::ports::{CredentialSource, EntityApi, Transport};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    config.validate()?;
    init_tracing(&config.logging);

    let scopes = std::env::args()
        .skip(1)
        .map(|arg| arg.parse::<ScopeId>())
        .collect::<Result<Vec<_>, _>>()?;

    let credentials: Arc<dyn CredentialSource> =
        Arc::new(EnvCredentialSource::new(config.api.credential_var.clone()));
    let api: Arc<dyn EntityApi> = Arc::new(RestEntityApi::new(
        RestApiConfig {
            base_url: config.api_base_url(),
            timeout: config.api.request_timeout(),
        },
        Arc::clone(&credentials),
    )?);

    let url = config.transport.ws_url()?;
    let manager = ConnectionManager::new(
        Arc::new(WsTransport::new()) as Arc<dyn Transport>,
        url.clone(),
        config.reconnect.policy(),
    );

    let _loggers = log_every_event(&manager);
    spawn_status_logger(&manager);

    let mut patient_views = Vec::new();
    for scope in scopes {
        if scope.kind() == "patient" {
            let patient = PatientId::new(scope.id());
            let view = PatientView::open(
                patient,
                Arc::clone(&api),
                manager.clone(),
                config.views.seen_capacity,
            )
            .await?;
            let medications = view.medications();
            let alerts = view.alerts();
            tracing::info!(
                patient = %view.patient(),
                active_medications = medications.active_count(),
                open_alerts = alerts.open_count(),
                "Patient baseline loaded"
            );
            patient_views.push(view);
        } else {
            manager.join(scope);
        }
    }

    manager.connect(credentials.credential()).await?;
    tracing::info!(%url, scopes = ?manager.held_scopes(), "Watching event channel");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for interrupt");
    }

    for view in &patient_views {
        tracing::info!(
            patient = %view.patient(),
            active_medications = view.medications().active_count(),
            open_alerts = view.alerts().open_count(),
            schedule_revision = view.schedule_revision(),
            "Patient view closing"
        );
    }
    drop(patient_views);
    manager.disconnect();
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

fn log_every_event(manager: &ConnectionManager) -> Vec<SubscriptionHandle> {
    EventName::ALL
        .into_iter()
        .map(|name| {
            manager.dispatcher().on_fn(name, "EventLogger", |event| {
                tracing::info!(
                    event = %event.name().as_str(),
                    id = ?event.stable_id(),
                    scope = ?event.scope(),
                    "Event received"
                );
                Ok(())
            })
        })
        .collect()
}

fn spawn_status_logger(manager: &ConnectionManager) {
    let mut updates = manager.status_updates();
    tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let snapshot = updates.borrow_and_update().clone();
            tracing::info!(
                status = %snapshot.status,
                attempt = snapshot.attempt,
                last_error = ?snapshot.last_error,
                "Connection status changed"
            );
        }
    });
}
