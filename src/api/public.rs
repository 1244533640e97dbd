use std::collections::HashMap;

use rocket::{serde::json::Json, Route, State};

use crate::{
    error::Result,
    model::{
        api::{
            CandidateDesc, CandidateGroup, CategoryDesc, CategoryResult, Listing, PositionDesc,
            PositionGroup, VotersSummary,
        },
        common::{CategoryId, PositionId},
    },
    service::Standings,
    Config, LedgerHandle,
};

pub fn routes() -> Vec<Route> {
    routes![
        categories,
        positions,
        candidates,
        check_candidates_position,
        voters_summary
    ]
}

/// All categories, newest first.
#[get("/categories")]
async fn categories(ledger: &State<LedgerHandle>) -> Result<Json<Vec<CategoryDesc>>> {
    let categories = ledger
        .categories()
        .await?
        .into_iter()
        .rev()
        .map(CategoryDesc::from)
        .collect();
    Ok(Json(categories))
}

/// The positions of one category, or every position grouped by category.
#[get("/positions?<category_id>")]
async fn positions(
    category_id: Option<CategoryId>,
    ledger: &State<LedgerHandle>,
) -> Result<Json<Listing<PositionDesc, PositionGroup>>> {
    if let Some(category_id) = category_id {
        let positions = ledger.positions(Some(category_id)).await?;
        return Ok(Json(Listing::Flat(
            positions.into_iter().map(PositionDesc::from).collect(),
        )));
    }

    let mut by_category = HashMap::<CategoryId, Vec<PositionDesc>>::new();
    for position in ledger.positions(None).await? {
        by_category
            .entry(position.category_id)
            .or_default()
            .push(position.into());
    }
    // Categories without positions are left out.
    let groups = ledger
        .categories()
        .await?
        .into_iter()
        .filter_map(|category| {
            by_category
                .remove(&category.id)
                .map(|positions| PositionGroup {
                    category_id: category.id,
                    category_name: category.name,
                    positions,
                })
        })
        .collect();
    Ok(Json(Listing::Grouped(groups)))
}

/// The candidates of one position, or every candidate grouped by position.
#[get("/candidates?<position_id>")]
async fn candidates(
    position_id: Option<PositionId>,
    ledger: &State<LedgerHandle>,
) -> Result<Json<Listing<CandidateDesc, CandidateGroup>>> {
    if let Some(position_id) = position_id {
        let candidates = ledger.candidates(Some(position_id)).await?;
        return Ok(Json(Listing::Flat(
            candidates.into_iter().map(CandidateDesc::from).collect(),
        )));
    }

    let mut by_position = HashMap::<PositionId, Vec<CandidateDesc>>::new();
    for candidate in ledger.candidates(None).await? {
        by_position
            .entry(candidate.position_id)
            .or_default()
            .push(candidate.into());
    }
    let category_names = ledger
        .categories()
        .await?
        .into_iter()
        .map(|category| (category.id, category.name))
        .collect::<HashMap<_, _>>();
    // Positions without candidates, or whose category is gone, are left out.
    let groups = ledger
        .positions(None)
        .await?
        .into_iter()
        .filter_map(|position| {
            let category_name = category_names.get(&position.category_id)?.clone();
            let candidates = by_position.remove(&position.id)?;
            Some(CandidateGroup {
                position_id: position.id,
                position_name: position.name,
                category_name,
                candidates,
            })
        })
        .collect();
    Ok(Json(Listing::Grouped(groups)))
}

/// Ranked standings of every position.
#[get("/checkcandidatesposition")]
async fn check_candidates_position(
    ledger: &State<LedgerHandle>,
    config: &State<Config>,
) -> Result<Json<Vec<CategoryResult>>> {
    let standings = Standings::new(ledger.inner().as_ref(), config)
        .compute()
        .await?;
    Ok(Json(standings))
}

#[get("/voters-summary")]
async fn voters_summary(
    ledger: &State<LedgerHandle>,
    config: &State<Config>,
) -> Result<Json<VotersSummary>> {
    let summary = Standings::new(ledger.inner().as_ref(), config)
        .voters_summary()
        .await?;
    Ok(Json(summary))
}
