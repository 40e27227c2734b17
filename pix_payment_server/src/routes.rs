//! Request handler definitions
//!
//! Define each route and its handler here. The webhook handler lives in [`crate::webhook_routes`].
//!
//! Handlers must never block the worker thread. Every call into the engine, the processor or the printer is async.
//!
//! Most handlers are generic over the storage backend, the payment processor and the order forwarder so that endpoint
//! tests can swap in mocks. Actix can't register generic handlers directly, hence the [`route!`] macro.
use actix_web::{get, post, web, HttpRequest, HttpResponse, Responder};
use log::*;
use pix_payment_engine::{
    db_types::PaymentId,
    OrderForwarder,
    PaymentFlowApi,
    PaymentRecordStore,
    SimulationApi,
};
use pix_processor::PaymentProcessor;
use serde_json::Value;

use crate::{
    config::ServerOptions,
    data_objects::{
        CreatePixRequest,
        DevApproval,
        PaymentStatusResponse,
        PixChargeResponse,
        ProxiedPrint,
        SimulatedStatus,
    },
    errors::ServerError,
    helpers::{idempotency_key, qr_svg_base64},
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal $(| $alias:literal)* impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let handler = $name::< $( [< T $bounds:camel >], )+>;
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to(handler);
                actix_web::dev::HttpServiceFactory::register(res, config);
                $(
                    let alias = actix_web::Resource::new($alias)
                        .guard(actix_web::guard::$method())
                        .to(handler);
                    actix_web::dev::HttpServiceFactory::register(alias, config);
                )*
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Create payment  ---------------------------------------------------
route!(generate_pix => Post "/api/generate-pix" | "/api/criar-pagamento" | "/criar-pagamento" impl PaymentRecordStore, PaymentProcessor, OrderForwarder);
/// Creates a PIX charge for an order and returns the QR code and copy-paste code for the customer.
///
/// The order payload in `orderData` is stored with the payment and sent to the printer once the payment is approved.
/// Send the same `x-idempotency-key` header when retrying a failed request.
///
/// When payments are simulated, no charge is created and a simulated payment is returned instead.
pub async fn generate_pix<B, P, F>(
    req: HttpRequest,
    body: web::Json<CreatePixRequest>,
    api: web::Data<PaymentFlowApi<B, P, F>>,
    simulation: web::Data<SimulationApi>,
    options: web::Data<ServerOptions>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentRecordStore,
    P: PaymentProcessor,
    F: OrderForwarder,
{
    let request = body.into_inner();
    if options.simulate_payments {
        let (amount, order_id) = request.amount_and_order_id()?;
        debug!("💻️ Payments are simulated. Creating a simulated payment for order {order_id}");
        let payment = simulation.create_payment(Some(order_id), amount).await?;
        let qr = qr_svg_base64(&payment.copy_paste_code)?;
        return Ok(HttpResponse::Ok().json(PixChargeResponse::from_simulated(&payment, qr)));
    }
    let request = request.into_payment_request(idempotency_key(&req))?;
    debug!("💻️ Creating PIX payment for order {} ({})", request.order_id, request.amount);
    let created = api.create_payment(request).await.map_err(|e| {
        warn!("💻️ Could not create PIX payment. {e}");
        ServerError::from(e)
    })?;
    let response = PixChargeResponse::from_created(created, qr_svg_base64)?;
    Ok(HttpResponse::Ok().json(response))
}

//----------------------------------------------   Status checks  ---------------------------------------------------
route!(check_payment => Get "/api/check-payment/{id}" impl PaymentRecordStore, PaymentProcessor, OrderForwarder);
/// The status endpoint clients poll. Final statuses come from the local record; otherwise the processor is asked.
///
/// This never reports `approved` unless the processor said so. If the processor can't be reached, the stored status
/// (or `pending`) is returned with an `error` field.
pub async fn check_payment<B, P, F>(
    path: web::Path<String>,
    api: web::Data<PaymentFlowApi<B, P, F>>,
    simulation: web::Data<SimulationApi>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentRecordStore,
    P: PaymentProcessor,
    F: OrderForwarder,
{
    let id = path.into_inner();
    trace!("💻️ Status check for payment {id}");
    if SimulationApi::is_simulated_id(&id) {
        let status = simulation.status(&id).await?;
        return Ok(HttpResponse::Ok().json(SimulatedStatus { status, simulated: true }));
    }
    let report = api.check_status(&PaymentId::from(id)).await?;
    Ok(HttpResponse::Ok().json(report))
}

route!(payment_status => Get "/api/payment-status/{id}" impl PaymentRecordStore, PaymentProcessor, OrderForwarder);
/// Always asks the processor for the status of the payment, and reconciles the answer.
pub async fn payment_status<B, P, F>(
    path: web::Path<String>,
    api: web::Data<PaymentFlowApi<B, P, F>>,
    simulation: web::Data<SimulationApi>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentRecordStore,
    P: PaymentProcessor,
    F: OrderForwarder,
{
    let id = path.into_inner();
    if SimulationApi::is_simulated_id(&id) {
        let status = simulation.status(&id).await?;
        return Ok(HttpResponse::Ok().json(SimulatedStatus { status, simulated: true }));
    }
    debug!("💻️ Forced status lookup for payment {id}");
    let report = api.forced_lookup(&PaymentId::from(id)).await?;
    Ok(HttpResponse::Ok().json(PaymentStatusResponse::from(report)))
}

route!(payment_record => Get "/api/payments/{id}" impl PaymentRecordStore, PaymentProcessor, OrderForwarder);
/// The stored payment record, as the engine sees it.
pub async fn payment_record<B, P, F>(
    path: web::Path<String>,
    api: web::Data<PaymentFlowApi<B, P, F>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentRecordStore,
    P: PaymentProcessor,
    F: OrderForwarder,
{
    let id = PaymentId::from(path.into_inner());
    let record = api.db().fetch_record(&id).await?.ok_or_else(|| ServerError::NotFound(format!("Payment {id}")))?;
    Ok(HttpResponse::Ok().json(record))
}

//----------------------------------------------   Printing  ---------------------------------------------------
route!(print_order => Post "/api/print-order" impl PaymentRecordStore, PaymentProcessor, OrderForwarder);
/// Sends an order straight to the printer, e.g. for a reprint. This does not touch any payment record.
pub async fn print_order<B, P, F>(
    body: web::Json<Value>,
    api: web::Data<PaymentFlowApi<B, P, F>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentRecordStore,
    P: PaymentProcessor,
    F: OrderForwarder,
{
    let payload = body.into_inner();
    debug!("🖨️ Proxying print request to the print webhook");
    let response = api.fulfillment().forward_order(&payload).await.map_err(|e| {
        warn!("🖨️ Print proxy failed. {e}");
        ServerError::from(e)
    })?;
    let proxied = serde_json::from_str::<Value>(&response.body).unwrap_or(Value::String(response.body));
    Ok(HttpResponse::Ok().json(ProxiedPrint { ok: true, proxied }))
}

//----------------------------------------------   Dev  ---------------------------------------------------
/// Creates a simulated payment. Disabled in production unless `PIX_ALLOW_DEV_ENDPOINTS` is set.
#[post("/api/generate-pix-dev")]
pub async fn generate_pix_dev(
    body: web::Json<CreatePixRequest>,
    simulation: web::Data<SimulationApi>,
    options: web::Data<ServerOptions>,
) -> Result<HttpResponse, ServerError> {
    check_dev_endpoints(&options)?;
    let (amount, order_id) = body.into_inner().dev_amount_and_order_id()?;
    info!("🧪️ Dev PIX requested for order {} ({amount})", order_id.as_deref().unwrap_or("<none>"));
    let payment = simulation.create_payment(order_id, amount).await?;
    let qr = qr_svg_base64(&payment.copy_paste_code)?;
    Ok(HttpResponse::Ok().json(PixChargeResponse::from_simulated(&payment, qr)))
}

/// Approves a simulated payment and notifies subscribers. Never triggers fulfillment.
#[post("/api/dev-approve/{id}")]
pub async fn dev_approve(
    path: web::Path<String>,
    simulation: web::Data<SimulationApi>,
    options: web::Data<ServerOptions>,
) -> Result<HttpResponse, ServerError> {
    check_dev_endpoints(&options)?;
    let payment = simulation.approve(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(DevApproval { ok: true, id: payment.id, status: payment.status }))
}

fn check_dev_endpoints(options: &ServerOptions) -> Result<(), ServerError> {
    if options.dev_endpoints_enabled() {
        Ok(())
    } else {
        warn!("💻️ Dev endpoint called on a production server. Denying access.");
        Err(ServerError::Forbidden("Dev endpoints are disabled in production".into()))
    }
}
