use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{EventHandler, EventProducer, Handler, MatchSettledEvent, PaymentStatusEvent};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub payment_status_producer: Vec<EventProducer<PaymentStatusEvent>>,
    pub match_settled_producer: Vec<EventProducer<MatchSettledEvent>>,
}

pub struct EventHandlers {
    pub on_payment_status: Option<EventHandler<PaymentStatusEvent>>,
    pub on_match_settled: Option<EventHandler<MatchSettledEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_payment_status = hooks.on_payment_status.map(|f| EventHandler::new(buffer_size, f));
        let on_match_settled = hooks.on_match_settled.map(|f| EventHandler::new(buffer_size, f));
        Self { on_payment_status, on_match_settled }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_payment_status {
            result.payment_status_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_match_settled {
            result.match_settled_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_payment_status {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_match_settled {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_payment_status: Option<Handler<PaymentStatusEvent>>,
    pub on_match_settled: Option<Handler<MatchSettledEvent>>,
}

impl EventHooks {
    pub fn on_payment_status<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PaymentStatusEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_payment_status = Some(Arc::new(f));
        self
    }

    pub fn on_match_settled<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(MatchSettledEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_match_settled = Some(Arc::new(f));
        self
    }
}
