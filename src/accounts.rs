// src/accounts.rs

use anyhow::{Context, Result};
use futures::TryStreamExt;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, instrument, trace};

use crate::api::SearchService;

pub const QUERY_CUSTOMER_IDS: &str = "
    SELECT
        customer_client.descriptive_name,
        customer_client.id,
        customer_client.manager
    FROM customer_client
    ";

/// The `customer_client` part of one result row.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRecord {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default)]
    pub descriptive_name: String,
    #[serde(default)]
    pub manager: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountRow {
    customer_client: AccountRecord,
}

// int64 comes over the wire as a string, but accept plain numbers too
fn de_id<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<String, D::Error> {
    match Value::deserialize(d)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "customer id must be a string or number, got {}",
            other
        ))),
    }
}

impl AccountRecord {
    pub fn from_row(row: &Value) -> Result<Self> {
        AccountRow::deserialize(row)
            .map(|r| r.customer_client)
            .with_context(|| format!("decoding customer_client from {}", row))
    }
}

/// Map every non-manager account reachable from `customer_id` to its name.
///
/// If an id shows up more than once the last row seen wins.
#[instrument(level = "info", skip(service))]
pub async fn get_customer_ids<S>(service: &S, customer_id: &str) -> Result<HashMap<String, String>>
where
    S: SearchService + ?Sized,
{
    let mut batches = service.search_stream(customer_id, QUERY_CUSTOMER_IDS);
    let mut customer_ids = HashMap::new();
    let mut managers = 0usize;

    while let Some(batch) = batches.try_next().await? {
        for row in &batch.results {
            let account = AccountRecord::from_row(row)?;
            if account.manager {
                trace!(id = %account.id, "skipping manager account");
                managers += 1;
                continue;
            }
            customer_ids.insert(account.id, account.descriptive_name);
        }
    }

    debug!(
        accounts = customer_ids.len(),
        managers, "resolved customer ids"
    );
    Ok(customer_ids)
}
