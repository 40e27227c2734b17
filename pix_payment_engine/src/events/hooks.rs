use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{EventHandler, EventProducer, Handler, PaymentUpdatedEvent};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub payment_updated_producer: Vec<EventProducer<PaymentUpdatedEvent>>,
}

impl EventProducers {
    pub async fn publish_payment_updated(&self, event: PaymentUpdatedEvent) {
        for emitter in &self.payment_updated_producer {
            emitter.publish_event(event.clone()).await;
        }
    }
}

pub struct EventHandlers {
    pub on_payment_updated: Option<EventHandler<PaymentUpdatedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_payment_updated = hooks.on_payment_updated.map(|f| EventHandler::new(buffer_size, f));
        Self { on_payment_updated }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_payment_updated {
            result.payment_updated_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_payment_updated {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_payment_updated: Option<Handler<PaymentUpdatedEvent>>,
}

impl EventHooks {
    pub fn on_payment_updated<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PaymentUpdatedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_payment_updated = Some(Arc::new(f));
        self
    }
}
