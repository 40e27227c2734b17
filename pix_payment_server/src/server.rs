use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::*;
use pix_payment_engine::{HttpOrderForwarder, PaymentFlowApi, SimulationApi, SqliteDatabase};
use pix_processor::{ProcessorApi, ProcessorError};

use crate::{
    config::{ServerConfig, ServerOptions},
    errors::ServerError,
    middleware::WebhookSignatureFactory,
    routes::{
        dev_approve,
        generate_pix_dev,
        health,
        CheckPaymentRoute,
        GeneratePixRoute,
        PaymentRecordRoute,
        PaymentStatusRoute,
        PrintOrderRoute,
    },
    webhook_routes::ProcessorWebhookRoute,
    ws::{create_realtime_event_handlers, ws_entry, WsHub},
};

pub type LivePaymentFlowApi = PaymentFlowApi<SqliteDatabase, ProcessorApi, HttpOrderForwarder>;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.run_migrations().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let processor =
        ProcessorApi::new(config.processor.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    preflight_checks(&config, &processor).await?;
    let forwarder = HttpOrderForwarder::new(config.print_webhook_url.clone(), config.print_timeout)
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;

    let hub = web::Data::new(WsHub::new());
    let handlers = create_realtime_event_handlers(hub.clone().into_inner());
    let producers = handlers.producers();
    handlers.start_handlers().await;

    let flow_api = PaymentFlowApi::new(db, processor, forwarder, producers.clone())
        .with_email_domain(config.processor.fake_email_domain.clone());
    let simulation = SimulationApi::new(producers).with_auto_approve(config.dev_auto_approve);
    let srv = create_server_instance(config, web::Data::new(flow_api), web::Data::new(simulation), hub)?;
    srv.await.map_err(ServerError::IOError)
}

/// Probes the processor credentials, so that a bad access token is found at start-up rather than by the first
/// customer.
async fn preflight_checks(config: &ServerConfig, processor: &ProcessorApi) -> Result<(), ServerError> {
    if !config.requires_processor_credentials() {
        info!("🧪️ Payments are simulated. Skipping the processor credential check.");
        return Ok(());
    }
    if !config.processor.has_credentials() {
        return Err(ServerError::ConfigurationError(
            "PIX_PROCESSOR_ACCESS_TOKEN must be set unless payments are simulated".into(),
        ));
    }
    if config.skip_credential_check {
        warn!("🚨️ Skipping the processor credential check. Make sure PIX_PROCESSOR_ACCESS_TOKEN is valid.");
        return Ok(());
    }
    match processor.validate_credentials().await {
        Ok(account) => {
            info!("💳️ Processor credentials are valid for account {}", account["id"]);
            Ok(())
        },
        Err(ProcessorError::Unauthorized { status }) => {
            error!("💳️ The processor rejected the access token ({status}). Check PIX_PROCESSOR_ACCESS_TOKEN.");
            Err(ServerError::Unauthorized)
        },
        Err(e) => {
            warn!("💳️ Could not validate the processor credentials. Starting anyway. {e}");
            Ok(())
        },
    }
}

pub fn create_server_instance(
    config: ServerConfig,
    flow_api: web::Data<LivePaymentFlowApi>,
    simulation: web::Data<SimulationApi>,
    hub: web::Data<WsHub>,
) -> Result<Server, ServerError> {
    let options = ServerOptions::from_config(&config);
    let webhook_secret = config.webhook_secret.clone();
    let signature_policy = config.signature_policy;
    let srv = HttpServer::new(move || {
        let webhook_scope = web::scope("/api/webhook")
            .wrap(WebhookSignatureFactory::new(webhook_secret.clone(), signature_policy, options.production))
            .service(ProcessorWebhookRoute::<SqliteDatabase, ProcessorApi, HttpOrderForwarder>::new());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("pix::access_log"))
            .app_data(flow_api.clone())
            .app_data(simulation.clone())
            .app_data(hub.clone())
            .app_data(web::Data::new(options))
            .service(health)
            .service(ws_entry)
            .service(webhook_scope)
            .service(GeneratePixRoute::<SqliteDatabase, ProcessorApi, HttpOrderForwarder>::new())
            .service(CheckPaymentRoute::<SqliteDatabase, ProcessorApi, HttpOrderForwarder>::new())
            .service(PaymentStatusRoute::<SqliteDatabase, ProcessorApi, HttpOrderForwarder>::new())
            .service(PaymentRecordRoute::<SqliteDatabase, ProcessorApi, HttpOrderForwarder>::new())
            .service(PrintOrderRoute::<SqliteDatabase, ProcessorApi, HttpOrderForwarder>::new())
            .service(generate_pix_dev)
            .service(dev_approve)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
