use log::info;

use crate::{
    error::{Error, Result},
    gateway::{PaymentGateway, PaymentRequest, TransactionReport},
    ledger::Ledger,
    model::common::{ExternalId, Msisdn},
    Config,
};

/// Payments made outside the vote flow, and corrections from gateway reports.
pub struct Payments<'a> {
    ledger: &'a dyn Ledger,
    gateway: &'a dyn PaymentGateway,
    config: &'a Config,
}

impl<'a> Payments<'a> {
    pub fn new(ledger: &'a dyn Ledger, gateway: &'a dyn PaymentGateway, config: &'a Config) -> Self {
        Self {
            ledger,
            gateway,
            config,
        }
    }

    /// Ask the gateway to collect `amount` from a Kenyan mobile number.
    /// No vote is attached to the payment.
    pub async fn initiate(&self, phone: &str, amount: i64) -> Result<ExternalId> {
        let amount = u32::try_from(amount)
            .ok()
            .filter(|amount| *amount > 0)
            .ok_or_else(|| Error::validation("Amount must be greater than 0"))?;
        let msisdn = phone
            .parse::<Msisdn>()
            .map_err(|e| Error::validation(e.to_string()))?;

        let request = PaymentRequest {
            external_id: ExternalId::generate(self.config.external_id_prefix()),
            payer_phone: msisdn.to_string(),
            amount,
        };
        self.gateway.initiate(&request).await?;
        info!("Direct payment {} of {amount} initiated", request.external_id);
        Ok(request.external_id)
    }

    /// Overwrite a vote's amount with the one in a gateway transaction report.
    pub async fn apply_report(&self, text: &str) -> Result<TransactionReport> {
        let report = TransactionReport::parse(text).map_err(|e| Error::validation(e.to_string()))?;
        if !self
            .ledger
            .set_vote_amount(&report.external_id, report.amount)
            .await?
        {
            return Err(Error::not_found(format!(
                "vote with ExternalId {} not found",
                report.external_id
            )));
        }
        info!(
            "Vote {} amount set to {} from transaction report",
            report.external_id, report.amount
        );
        Ok(report)
    }
}
