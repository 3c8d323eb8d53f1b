// src/api/mod.rs

pub mod auth;
pub mod rest;

use anyhow::Result;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use rest::AdsRestClient;

/// One page of a `searchStream` response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchStreamBatch {
    #[serde(default)]
    pub results: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_mask: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Anything that can run a query for an account and hand back its pages.
///
/// The stream is lazy: nothing is requested until it is first polled.
pub trait SearchService {
    fn search_stream<'a>(
        &'a self,
        customer_id: &'a str,
        query: &'a str,
    ) -> BoxStream<'a, Result<SearchStreamBatch>>;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use futures::{stream, StreamExt};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    pub fn init_test_logging() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("info,adsfetch=debug")),
            )
            .with_test_writer()
            .finish();
        // another test may have installed it already
        let _ = tracing::subscriber::set_global_default(subscriber);
    }

    /// Serves canned batches per customer id and records every call.
    #[derive(Default)]
    pub struct FakeSearch {
        pub pages: HashMap<String, Vec<Vec<Value>>>,
        pub calls: Mutex<Vec<(String, String)>>,
        pub fail_for: Option<String>,
    }

    impl FakeSearch {
        pub fn with_pages(mut self, customer_id: &str, pages: Vec<Vec<Value>>) -> Self {
            self.pages.insert(customer_id.to_string(), pages);
            self
        }
    }

    impl SearchService for FakeSearch {
        fn search_stream<'a>(
            &'a self,
            customer_id: &'a str,
            query: &'a str,
        ) -> BoxStream<'a, Result<SearchStreamBatch>> {
            self.calls
                .lock()
                .unwrap()
                .push((customer_id.to_string(), query.to_string()));
            if self.fail_for.as_deref() == Some(customer_id) {
                return stream::once(async move {
                    Err(anyhow::anyhow!("search failed for {}", customer_id))
                })
                .boxed();
            }
            let batches: Vec<Result<SearchStreamBatch>> = self
                .pages
                .get(customer_id)
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .map(|results| {
                    Ok(SearchStreamBatch {
                        results,
                        ..Default::default()
                    })
                })
                .collect();
            stream::iter(batches).boxed()
        }
    }
}
