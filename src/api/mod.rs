use rocket::{
    serde::json::{Error as JsonError, Json},
    Route,
};

use crate::error::{Error, Result};

mod admin;
mod public;
mod voting;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(admin::routes());
    routes.extend(public::routes());
    routes.extend(voting::routes());
    routes
}

/// A JSON request body whose decoding errors are reported by the handler.
type JsonBody<'r, T> = std::result::Result<Json<T>, JsonError<'r>>;

/// Unwrap a JSON body, turning a missing or malformed one into a validation error.
fn accept<T>(body: JsonBody<'_, T>) -> Result<T> {
    body.map(Json::into_inner)
        .map_err(|e| Error::validation(format!("Invalid request body: {e}")))
}

/// Reject blank names, returning the trimmed name otherwise.
fn required_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::validation("name must not be empty"));
    }
    Ok(name.to_string())
}
