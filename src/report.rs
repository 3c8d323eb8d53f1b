// src/report.rs

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::api::SearchService;
use crate::customizer::{Customizer, CustomizerTable};
use crate::macros::QueryMacros;
use crate::parser::Parser;
use crate::row::{fields_getter, parse_ads_row};

/// What to ask the API for and how to lay out the answer.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportSpec {
    /// Query sent to the API, with customizers and aliases stripped.
    pub query: String,
    pub fields: Vec<String>,
    pub column_names: Vec<String>,
    pub customizers: CustomizerTable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub column_names: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub fetched_at: DateTime<Utc>,
}

impl ReportSpec {
    /// Parse a query whose select list may carry customizers:
    ///
    /// ```text
    /// SELECT
    ///     campaign.id,
    ///     ad_group_ad.ad.final_urls:0 AS first_url,
    ///     ad_group_criterion.resource_name~1 AS criterion_id
    /// FROM ad_group_ad
    /// ```
    ///
    /// `field:path` resolves `path` inside the field value, `field~N` takes
    /// the N-th `~`-separated part of it.
    pub fn from_query(text: &str) -> Result<Self> {
        let re = Regex::new(r"(?is)^\s*SELECT\s+(.+?)\s+FROM\s+(.+?)\s*;?\s*$")?;
        let alias_re = Regex::new(r"(?i)\s+AS\s+")?;
        let caps = re
            .captures(text)
            .with_context(|| format!("not a SELECT ... FROM query: {}", text.trim()))?;

        let mut fields = Vec::new();
        let mut column_names = Vec::new();
        let mut customizers = CustomizerTable::new();

        for (i, item) in caps[1]
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .enumerate()
        {
            let mut parts = alias_re.splitn(item, 2);
            let expr = parts.next().unwrap_or_default().trim();
            let alias = parts.next().map(|a| a.trim().to_string());

            let (field, customizer) = parse_select_item(expr)?;
            if let Some(c) = customizer {
                customizers.insert(i, c);
            }
            column_names.push(alias.unwrap_or_else(|| column_name(&field)));
            fields.push(field);
        }

        if fields.is_empty() {
            bail!("query selects no fields");
        }

        let query = format!("SELECT {} FROM {}", fields.join(", "), caps[2].trim());
        Ok(Self {
            query,
            fields,
            column_names,
            customizers,
        })
    }

    /// Substitute `{name}` macros into `text`, then parse it.
    pub fn from_template(text: &str, macros: &QueryMacros) -> Result<Self> {
        let query = macros.substitute(text)?;
        Self::from_query(&query)
    }

    pub fn customizers(&self) -> Option<&CustomizerTable> {
        if self.customizers.is_empty() {
            None
        } else {
            Some(&self.customizers)
        }
    }
}

fn parse_select_item(expr: &str) -> Result<(String, Option<Customizer>)> {
    if let Some((field, path)) = expr.split_once(':') {
        if path.is_empty() {
            bail!("empty nested field in `{}`", expr);
        }
        return Ok((
            field.trim().to_string(),
            Some(Customizer::NestedField(path.trim().to_string())),
        ));
    }
    if let Some((field, index)) = expr.split_once('~') {
        let index: i64 = index
            .trim()
            .parse()
            .with_context(|| format!("bad resource index in `{}`", expr))?;
        return Ok((field.trim().to_string(), Some(Customizer::ResourceIndex(index))));
    }
    Ok((expr.to_string(), None))
}

/// Scripts with `constant` in their name don't depend on the account, so
/// they only run against the first one.
pub fn accounts_for_script<'a>(script_name: &str, accounts: &'a [String]) -> &'a [String] {
    if script_name.contains("constant") {
        &accounts[..accounts.len().min(1)]
    } else {
        accounts
    }
}

/// `campaign.id` → `campaign_id`
pub fn column_name(field: &str) -> String {
    field.replace('.', "_")
}

/// Run `spec.query` for every account and flatten all rows.
#[instrument(level = "info", skip(service, spec, parser), fields(accounts = customer_ids.len()))]
pub async fn fetch_report<S>(
    service: &S,
    customer_ids: &[String],
    spec: &ReportSpec,
    parser: &(dyn Parser + Sync),
) -> Result<Report>
where
    S: SearchService + ?Sized,
{
    let getter = fields_getter(&spec.fields);
    let mut rows = Vec::new();

    for customer_id in customer_ids {
        let mut batches = service.search_stream(customer_id, &spec.query);
        let before = rows.len();
        while let Some(batch) = batches.try_next().await? {
            for row in &batch.results {
                let values = parse_ads_row(row, &getter, parser, spec.customizers())
                    .with_context(|| format!("flattening row for customer {}", customer_id))?;
                rows.push(values);
            }
        }
        debug!(customer_id = %customer_id, rows = rows.len() - before, "fetched");
    }

    info!(rows = rows.len(), "report done");
    Ok(Report {
        column_names: spec.column_names.clone(),
        rows,
        fetched_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{init_test_logging, FakeSearch};
    use crate::parser::RowParser;
    use serde_json::json;

    const QUERY: &str = "
        SELECT
            campaign.id,
            campaign.name AS name,
            ad_group_criterion.resource_name~1 AS criterion_id,
            metrics.top_urls:0
        FROM ad_group_criterion
        WHERE segments.date DURING LAST_7_DAYS
    ";

    #[test]
    fn parses_select_list() -> Result<()> {
        let spec = ReportSpec::from_query(QUERY)?;
        assert_eq!(
            spec.fields,
            vec![
                "campaign.id",
                "campaign.name",
                "ad_group_criterion.resource_name",
                "metrics.top_urls"
            ]
        );
        assert_eq!(
            spec.column_names,
            vec!["campaign_id", "name", "criterion_id", "metrics_top_urls"]
        );
        assert_eq!(spec.customizers[&2], Customizer::ResourceIndex(1));
        assert_eq!(spec.customizers[&3], Customizer::NestedField("0".into()));
        assert_eq!(
            spec.query,
            "SELECT campaign.id, campaign.name, ad_group_criterion.resource_name, metrics.top_urls \
             FROM ad_group_criterion\n        WHERE segments.date DURING LAST_7_DAYS"
        );
        Ok(())
    }

    #[test]
    fn rejects_garbage() {
        assert!(ReportSpec::from_query("campaign.id").is_err());
        assert!(ReportSpec::from_query("SELECT a.b~x FROM a").is_err());
        assert!(ReportSpec::from_query("SELECT a.b: FROM a").is_err());
    }

    #[test]
    fn negative_resource_index() -> Result<()> {
        let spec = ReportSpec::from_query("SELECT a.resource_name~-1 AS last FROM a")?;
        assert_eq!(spec.customizers[&0], Customizer::ResourceIndex(-1));
        assert_eq!(spec.column_names, vec!["last"]);
        Ok(())
    }

    #[test]
    fn template_macros_are_substituted() -> Result<()> {
        let now = chrono::NaiveDate::from_ymd_opt(2024, 5, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let macros = QueryMacros::at(
            [("start".to_string(), ":YYYYMMDD-7".to_string())].into_iter().collect(),
            now,
        );
        let spec = ReportSpec::from_template(
            "SELECT campaign.id FROM campaign WHERE segments.date BETWEEN '{start}' AND '{current_date}'",
            &macros,
        )?;
        assert_eq!(
            spec.query,
            "SELECT campaign.id FROM campaign WHERE segments.date BETWEEN '2024-04-25' AND '2024-05-02'"
        );
        assert!(ReportSpec::from_template("SELECT a.b FROM a WHERE x = {missing}", &macros).is_err());
        Ok(())
    }

    #[test]
    fn constant_scripts_use_first_account_only() {
        let accounts = vec!["1".to_string(), "2".to_string()];
        assert_eq!(accounts_for_script("geo_constant", &accounts), &accounts[..1]);
        assert_eq!(accounts_for_script("campaigns", &accounts), &accounts[..]);
        assert!(accounts_for_script("constant", &[]).is_empty());
    }

    #[test]
    fn plain_query_has_no_customizers() -> Result<()> {
        let spec = ReportSpec::from_query("select customer.id from customer")?;
        assert!(spec.customizers().is_none());
        Ok(())
    }

    #[tokio::test]
    async fn flattens_rows_across_accounts() -> Result<()> {
        let spec = ReportSpec::from_query(
            "SELECT campaign.id, ad_group_criterion.resource_name~1 FROM ad_group_criterion",
        )?;
        let svc = FakeSearch::default()
            .with_pages(
                "1",
                vec![vec![json!({
                    "campaign": {"id": "11"},
                    "adGroupCriterion": {"resourceName": "customers/1/adGroupCriteria/5~99"}
                })]],
            )
            .with_pages(
                "2",
                vec![
                    vec![],
                    vec![json!({
                        "campaign": {"id": "22"},
                        "adGroupCriterion": {"resourceName": "customers/2/adGroupCriteria/6~88"}
                    })],
                ],
            );
        let ids = vec!["1".to_string(), "2".to_string()];
        let report = fetch_report(&svc, &ids, &spec, &RowParser).await?;
        assert_eq!(
            report.column_names,
            vec!["campaign_id", "ad_group_criterion_resource_name"]
        );
        assert_eq!(
            report.rows,
            vec![vec![json!(11), json!(99)], vec![json!(22), json!(88)]]
        );
        let calls = svc.calls.lock().unwrap();
        assert!(calls.iter().all(|(_, q)| q == &spec.query));
        Ok(())
    }

    #[tokio::test]
    async fn omitted_fields_stay_empty_in_reports() -> Result<()> {
        init_test_logging();
        let spec = ReportSpec::from_query(
            "SELECT campaign.id, metrics.clicks, ad_group_criterion.resource_name~0 \
             FROM ad_group_criterion",
        )?;
        let svc = FakeSearch::default().with_pages(
            "1",
            vec![vec![json!({"campaign": {"id": "11"}, "metrics": {}})]],
        );
        let report = fetch_report(&svc, &["1".to_string()], &spec, &RowParser).await?;
        assert_eq!(report.rows, vec![vec![json!(11), json!(0), Value::Null]]);
        Ok(())
    }

    #[tokio::test]
    async fn customizer_error_aborts_report() {
        let spec =
            ReportSpec::from_query("SELECT campaign.name:text FROM campaign").unwrap();
        let svc = FakeSearch::default()
            .with_pages("1", vec![vec![json!({"campaign": {"name": "flat"}})]]);
        let err = fetch_report(&svc, &["1".to_string()], &spec, &RowParser)
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("nested_field(text) is incorrect"));
    }
}
