//! The payment gateway: an external, unreliable service that takes mobile
//! money payments and reports the outcome asynchronously.

use std::sync::Arc;

use thiserror::Error;

use crate::model::common::ExternalId;

mod http;
pub use http::HttpGateway;

mod report;
pub use report::{ReportError, TransactionReport};

/// A shared, type-erased gateway client, as kept in Rocket's managed state.
pub type GatewayHandle = Arc<dyn PaymentGateway>;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Request to the payment gateway failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Payment gateway timed out")]
    Timeout,
    #[error("Payment gateway rejected the request with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// A payment the gateway is asked to collect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    pub external_id: ExternalId,
    pub payer_phone: String,
    pub amount: u32,
}

#[rocket::async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Ask the gateway to start collecting a payment. Success only means the
    /// request was accepted; the outcome arrives later by callback.
    async fn initiate(&self, request: &PaymentRequest) -> Result<(), GatewayError>;

    /// The gateway's current status for a transaction, or `None` if it
    /// cannot report one.
    async fn transaction_status(
        &self,
        external_id: &ExternalId,
    ) -> Result<Option<String>, GatewayError>;
}

#[cfg(test)]
pub use stub::StubGateway;

#[cfg(test)]
mod stub {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use super::*;

    /// A scripted gateway for tests. Clones share the same script.
    #[derive(Debug, Clone, Default)]
    pub struct StubGateway {
        state: Arc<Mutex<StubState>>,
    }

    #[derive(Debug, Default)]
    struct StubState {
        reject_payments: bool,
        statuses: HashMap<ExternalId, String>,
        initiated: Vec<PaymentRequest>,
    }

    impl StubGateway {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make every following initiation fail.
        pub fn reject_payments(&self, reject: bool) {
            self.state.lock().unwrap().reject_payments = reject;
        }

        /// Have the status query report `status` for the given transaction.
        pub fn report_status(&self, external_id: &ExternalId, status: &str) {
            self.state
                .lock()
                .unwrap()
                .statuses
                .insert(external_id.clone(), status.to_string());
        }

        /// Every payment accepted so far, oldest first.
        pub fn initiated(&self) -> Vec<PaymentRequest> {
            self.state.lock().unwrap().initiated.clone()
        }
    }

    #[rocket::async_trait]
    impl PaymentGateway for StubGateway {
        async fn initiate(&self, request: &PaymentRequest) -> Result<(), GatewayError> {
            let mut state = self.state.lock().unwrap();
            if state.reject_payments {
                return Err(GatewayError::Rejected {
                    status: 503,
                    body: "service unavailable".to_string(),
                });
            }
            state.initiated.push(request.clone());
            Ok(())
        }

        async fn transaction_status(
            &self,
            external_id: &ExternalId,
        ) -> Result<Option<String>, GatewayError> {
            Ok(self.state.lock().unwrap().statuses.get(external_id).cloned())
        }
    }
}
