pub mod errors;
pub mod flow_objects;
pub mod fulfillment_api;
pub mod payment_flow_api;
pub mod simulation_api;
