use rocket::{http::Status, response::status, serde::json::Json, Route, State};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            CreatedCandidate, CreatedCategory, CreatedPosition, Message, NewCandidate,
            NewCategory, NewPosition,
        },
        common::CategoryId,
    },
    LedgerHandle,
};

use super::{accept, required_name, JsonBody};

pub fn routes() -> Vec<Route> {
    routes![
        create_category,
        delete_category,
        create_position,
        create_candidate
    ]
}

#[post("/createcategories", data = "<body>")]
async fn create_category(
    body: JsonBody<'_, NewCategory>,
    ledger: &State<LedgerHandle>,
) -> Result<status::Custom<Json<CreatedCategory>>> {
    let body = accept(body)?;
    let category = ledger.insert_category(required_name(&body.name)?).await?;
    Ok(status::Custom(
        Status::Created,
        Json(CreatedCategory {
            message: "Category created successfully".to_string(),
            category: category.into(),
        }),
    ))
}

/// Positions of the deleted category are left in place.
#[delete("/categories/<category_id>")]
async fn delete_category(
    category_id: CategoryId,
    ledger: &State<LedgerHandle>,
) -> Result<Json<Message>> {
    if !ledger.delete_category(category_id).await? {
        return Err(Error::not_found("Category not found"));
    }
    Ok(Json(Message::new("Category deleted successfully")))
}

#[post("/createpositions", data = "<body>")]
async fn create_position(
    body: JsonBody<'_, NewPosition>,
    ledger: &State<LedgerHandle>,
) -> Result<status::Custom<Json<CreatedPosition>>> {
    let body = accept(body)?;
    let name = required_name(&body.name)?;
    if ledger.category(body.category_id).await?.is_none() {
        return Err(Error::not_found("Category not found"));
    }
    let position = ledger.insert_position(name, body.category_id).await?;
    Ok(status::Custom(
        Status::Created,
        Json(CreatedPosition {
            message: "Position created successfully".to_string(),
            position: position.into(),
        }),
    ))
}

#[post("/createcandidates", data = "<body>")]
async fn create_candidate(
    body: JsonBody<'_, NewCandidate>,
    ledger: &State<LedgerHandle>,
) -> Result<status::Custom<Json<CreatedCandidate>>> {
    let body = accept(body)?;
    let name = required_name(&body.name)?;
    if ledger.position(body.position_id).await?.is_none() {
        return Err(Error::not_found("Position not found"));
    }
    let candidate = ledger.insert_candidate(name, body.position_id).await?;
    Ok(status::Custom(
        Status::Created,
        Json(CreatedCandidate {
            message: "Candidate created successfully".to_string(),
            candidate: candidate.into(),
        }),
    ))
}
