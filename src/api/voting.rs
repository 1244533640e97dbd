use log::info;
use rocket::{serde::json::Json, Route, State};

use crate::{
    error::{Error, Result},
    logging::RequestId,
    model::api::{
        CallbackReply, Message, MpesaCallback, PaymentInput, PaymentReply, ReportUpload,
        VoteReceipt, VoteRequest,
    },
    service::{Payments, Reconciler, VoteIntent, VoteIntents},
    Config, GatewayHandle, LedgerHandle,
};

use super::{accept, JsonBody};

pub fn routes() -> Vec<Route> {
    routes![vote, mpesa_callback, mpesa, update_db]
}

#[post("/vote", data = "<request>")]
async fn vote(
    request: JsonBody<'_, VoteRequest>,
    ledger: &State<LedgerHandle>,
    gateway: &State<GatewayHandle>,
    config: &State<Config>,
) -> Result<Json<VoteReceipt>> {
    let intent = VoteIntent::try_from(accept(request)?)?;
    let external_id = VoteIntents::new(ledger.inner().as_ref(), gateway.inner().as_ref(), config)
        .submit(intent)
        .await?;
    Ok(Json(VoteReceipt {
        message: "Vote recorded pending payment confirmation".to_string(),
        external_id,
    }))
}

/// Called by the gateway once a payment is resolved. Every business outcome
/// is acknowledged with 200 so the gateway only retries on server errors.
#[post("/mpesa-callback", data = "<callback>")]
async fn mpesa_callback(
    request_id: &RequestId,
    callback: JsonBody<'_, MpesaCallback>,
    ledger: &State<LedgerHandle>,
    config: &State<Config>,
) -> Result<Json<CallbackReply>> {
    let callback = accept(callback)?;
    info!(
        "req{request_id} gateway reports '{}' for {}",
        callback.transaction_status, callback.external_id
    );

    let reconciler = Reconciler::new(ledger.inner().as_ref(), config);
    let (message, status) = match reconciler
        .handle_callback(&callback.external_id, &callback.transaction_status)
        .await
    {
        Ok(settlement) => (
            format!("Vote status updated to {settlement}"),
            settlement.as_str(),
        ),
        Err(Error::PendingVoteNotFound(external_id)) => {
            info!("req{request_id} no pending vote for {external_id}");
            ("Pending vote not found".to_string(), "not_found")
        }
        Err(e) => return Err(e),
    };
    Ok(Json(CallbackReply {
        message,
        status: status.to_string(),
        external_id: callback.external_id,
    }))
}

#[post("/mpesa", data = "<input>")]
async fn mpesa(
    input: JsonBody<'_, PaymentInput>,
    ledger: &State<LedgerHandle>,
    gateway: &State<GatewayHandle>,
    config: &State<Config>,
) -> Result<Json<PaymentReply>> {
    let input = accept(input)?;
    let transaction = Payments::new(ledger.inner().as_ref(), gateway.inner().as_ref(), config)
        .initiate(&input.phone, input.amount)
        .await?;
    Ok(Json(PaymentReply {
        message: "MPESA STK push initiated, waiting for callback".to_string(),
        transaction,
    }))
}

#[post("/updateDB", data = "<upload>")]
async fn update_db(
    upload: JsonBody<'_, ReportUpload>,
    ledger: &State<LedgerHandle>,
    gateway: &State<GatewayHandle>,
    config: &State<Config>,
) -> Result<Json<Message>> {
    let upload = accept(upload)?;
    Payments::new(ledger.inner().as_ref(), gateway.inner().as_ref(), config)
        .apply_report(&upload.text)
        .await?;
    Ok(Json(Message::new("Transaction amount updated successfully")))
}
