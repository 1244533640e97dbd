use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use crate::model::common::ExternalId;

/// A plain-text transaction report sent by the gateway, e.g.
/// `Transaction report {ExternalId:TX_1, Amount:20, NetAmount:19}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionReport {
    pub external_id: ExternalId,
    pub amount: u32,
    pub net_amount: Option<u32>,
    /// Every `Key:Value` pair found, including the ones above.
    pub fields: HashMap<String, String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReportError {
    #[error("invalid input format")]
    MissingOpeningBrace,
    #[error("missing closing brace")]
    MissingClosingBrace,
    #[error("invalid {key} format: '{value}'")]
    InvalidAmount { key: &'static str, value: String },
    #[error("{0} is missing")]
    MissingField(&'static str),
}

fn pair_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(\w+):([a-zA-Z0-9_-]+)").expect("pattern is valid"))
}

fn parse_amount(
    fields: &HashMap<String, String>,
    key: &'static str,
) -> Result<Option<u32>, ReportError> {
    fields
        .get(key)
        .map(|value| {
            value.parse::<u32>().map_err(|_| ReportError::InvalidAmount {
                key,
                value: value.clone(),
            })
        })
        .transpose()
}

impl TransactionReport {
    /// Parse the `Key:Value` pairs between the first `{` and the last `}`.
    /// Values are runs of ASCII letters, digits, `-` and `_`.
    pub fn parse(text: &str) -> Result<Self, ReportError> {
        let start = text.find('{').ok_or(ReportError::MissingOpeningBrace)?;
        let body = &text[start..];
        let end = body.rfind('}').ok_or(ReportError::MissingClosingBrace)?;
        let body = &body[..=end];

        let fields = pair_pattern()
            .captures_iter(body)
            .map(|caps| (caps[1].to_string(), caps[2].to_string()))
            .collect::<HashMap<_, _>>();

        let amount = parse_amount(&fields, "Amount")?;
        let net_amount = parse_amount(&fields, "NetAmount")?;
        let external_id = fields
            .get("ExternalId")
            .cloned()
            .ok_or(ReportError::MissingField("ExternalId"))?;
        let amount = amount.ok_or(ReportError::MissingField("Amount"))?;

        Ok(Self {
            external_id: external_id.into(),
            amount,
            net_amount,
            fields,
        })
    }
}
