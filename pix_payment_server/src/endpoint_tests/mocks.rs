use mockall::mock;
use pix_payment_engine::{ForwardError, ForwardResponse, OrderForwarder};
use pix_processor::{
    data_objects::{NewCharge, ProcessorPayment},
    PaymentProcessor,
    ProcessorError,
};
use serde_json::{json, Value};

mock! {
    pub Processor {}
    impl PaymentProcessor for Processor {
        async fn create_payment(&self, charge: &NewCharge, idempotency_key: &str) -> Result<ProcessorPayment, ProcessorError>;
        async fn fetch_payment(&self, payment_id: &str) -> Result<ProcessorPayment, ProcessorError>;
    }
}

mock! {
    pub Forwarder {}
    impl OrderForwarder for Forwarder {
        fn is_configured(&self) -> bool;
        async fn forward(&self, payload: &Value) -> Result<ForwardResponse, ForwardError>;
    }
}

/// A processor answer for `id` with the given status
pub fn processor_payment(id: &str, status: &str) -> ProcessorPayment {
    let date_approved = (status == "approved").then_some("2024-06-10T12:00:00.000-03:00");
    ProcessorPayment::try_from(json!({
        "id": id,
        "status": status,
        "status_detail": format!("{status}_detail"),
        "date_approved": date_approved,
        "external_reference": "A1",
        "point_of_interaction": { "transaction_data": { "qr_code": "00020126PIX", "qr_code_base64": "iVBORw0K" } }
    }))
    .expect("valid processor payment")
}

/// A forwarder that is switched off. Any attempt to forward is a test failure.
pub fn idle_forwarder() -> MockForwarder {
    let mut forwarder = MockForwarder::new();
    forwarder.expect_is_configured().return_const(false);
    forwarder.expect_forward().never();
    forwarder
}
