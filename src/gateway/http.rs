use log::{debug, info};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::{config::GatewayConfig, model::common::ExternalId};

use super::{GatewayError, PaymentGateway, PaymentRequest};

/// Talks to the gateway's JSON API over HTTPS.
pub struct HttpGateway {
    client: Client,
    config: GatewayConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InitiationBody<'a> {
    impala_merchant_id: &'a str,
    currency: &'a str,
    amount: u32,
    payer_phone: &'a str,
    #[serde(rename = "mobileMoneySP")]
    mobile_money_sp: &'a str,
    external_id: &'a str,
    callback_url: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusQuery<'a> {
    impala_merchant_id: &'a str,
    external_id: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusReply {
    #[serde(default)]
    transaction_status: Option<String>,
}

impl HttpGateway {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self { client, config })
    }

    /// POST `body` to `url`, returning the response text of a 2xx response.
    async fn post<B: Serialize + Sync>(&self, url: &str, body: &B) -> Result<String, GatewayError> {
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.config.gateway_token)
            .json(body)
            .send()
            .await
            .map_err(classify)?;
        let status = response.status();
        let text = response.text().await.map_err(classify)?;
        if !status.is_success() {
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(text)
    }
}

fn classify(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Transport(err)
    }
}

#[rocket::async_trait]
impl PaymentGateway for HttpGateway {
    async fn initiate(&self, request: &PaymentRequest) -> Result<(), GatewayError> {
        let body = InitiationBody {
            impala_merchant_id: &self.config.merchant_id,
            currency: &self.config.currency,
            amount: request.amount,
            payer_phone: &request.payer_phone,
            mobile_money_sp: &self.config.money_service_provider,
            external_id: request.external_id.as_str(),
            callback_url: &self.config.callback_url,
        };
        let reply = self.post(&self.config.gateway_url, &body).await?;
        info!(
            "Gateway accepted payment {}: {reply}",
            request.external_id
        );
        Ok(())
    }

    async fn transaction_status(
        &self,
        external_id: &ExternalId,
    ) -> Result<Option<String>, GatewayError> {
        let Some(url) = &self.config.gateway_status_url else {
            return Ok(None);
        };
        let query = StatusQuery {
            impala_merchant_id: &self.config.merchant_id,
            external_id: external_id.as_str(),
        };
        let reply = self.post(url, &query).await?;
        debug!("Gateway status for {external_id}: {reply}");
        // A body we cannot read is treated as "no status yet".
        Ok(rocket::serde::json::from_str::<StatusReply>(&reply)
            .ok()
            .and_then(|reply| reply.transaction_status))
    }
}
