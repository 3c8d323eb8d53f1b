// src/macros.rs

use anyhow::{bail, Context, Result};
use chrono::{Duration, Local, Months, NaiveDate, NaiveDateTime};
use regex::{Captures, Regex};
use std::collections::{BTreeSet, HashMap};

const DATE_FMT: &str = "%Y-%m-%d";

/// `{name}` parameters for a query, plus the built-in date macros.
///
/// A value of the form `:YYYYMMDD-N`, `:YYYYMM-N` or `:YYYY-N` is replaced
/// by the date N days, months or years before today (`YYYY-MM-DD`).
#[derive(Debug, Clone)]
pub struct QueryMacros {
    values: HashMap<String, String>,
    now: NaiveDateTime,
}

impl QueryMacros {
    pub fn new(values: HashMap<String, String>) -> Self {
        Self::at(values, Local::now().naive_local())
    }

    pub fn at(values: HashMap<String, String>, now: NaiveDateTime) -> Self {
        Self { values, now }
    }

    /// Every macro with dynamic dates expanded and built-ins filled in.
    pub fn resolved(&self) -> Result<HashMap<String, String>> {
        let today = self.now.date();
        let mut out = HashMap::with_capacity(self.values.len() + 4);
        for (key, value) in &self.values {
            let value = if value.starts_with(":YYYY") {
                dynamic_date(key, value, today)?
            } else {
                value.clone()
            };
            out.insert(key.clone(), value);
        }

        let yesterday = today - Duration::days(1);
        let builtins = [
            ("date_iso", today.format("%Y%m%d").to_string()),
            ("yesterday_iso", yesterday.format("%Y%m%d").to_string()),
            ("current_date", today.format(DATE_FMT).to_string()),
            (
                "current_datetime",
                self.now.format("%Y-%m-%d %H:%M:%S").to_string(),
            ),
        ];
        for (key, value) in builtins {
            out.entry(key.to_string()).or_insert(value);
        }
        Ok(out)
    }

    /// Replace `{name}` in `text`. Unknown names and `${...}` expression
    /// blocks are errors; an empty `${}` is dropped.
    pub fn substitute(&self, text: &str) -> Result<String> {
        let values = self.resolved()?;
        let re = Regex::new(r"(\$?)\{([^}]*)\}")?;
        let mut unknown = BTreeSet::new();
        let mut expressions = Vec::new();

        let out = re.replace_all(text, |caps: &Captures| {
            let whole = caps[0].to_string();
            let name = caps[2].trim();
            if !caps[1].is_empty() {
                if !name.is_empty() {
                    expressions.push(whole);
                }
                return String::new();
            }
            match values.get(name) {
                Some(v) => v.clone(),
                None => {
                    unknown.insert(name.to_string());
                    whole
                }
            }
        });

        if !expressions.is_empty() {
            bail!("expression blocks are not supported: {}", expressions.join(", "));
        }
        if !unknown.is_empty() {
            let names: Vec<_> = unknown.into_iter().collect();
            bail!("unknown query params: {}", names.join(", "));
        }
        Ok(out.into_owned())
    }
}

fn dynamic_date(name: &str, value: &str, today: NaiveDate) -> Result<String> {
    let bad_format = || {
        anyhow::anyhow!(
            "macro {} has incorrect format, expected :YYYYMMDD-1, or :YYYYMM-1, or :YYYY-1",
            name
        )
    };
    let mut parts = value.split('-');
    let pattern = parts.next().unwrap_or_default().trim().to_uppercase();
    let delta = parts.next().map(str::trim).unwrap_or_default();
    if pattern.is_empty() || parts.next().is_some() {
        return Err(bad_format());
    }
    if delta.is_empty() {
        return Ok(today.format(DATE_FMT).to_string());
    }
    let ago: u32 = delta
        .parse()
        .with_context(|| format!("macro {}: `{}` is not a number", name, delta))?;

    let date = match pattern.as_str() {
        ":YYYYMMDD" => today.checked_sub_signed(Duration::days(ago.into())),
        ":YYYYMM" => today.checked_sub_months(Months::new(ago)),
        ":YYYY" => ago
            .checked_mul(12)
            .and_then(|m| today.checked_sub_months(Months::new(m))),
        _ => return Err(bad_format()),
    }
    .with_context(|| format!("macro {}: date out of range", name))?;
    Ok(date.format(DATE_FMT).to_string())
}

/// `key=value` from the command line.
pub fn parse_macro_pair(pair: &str) -> Result<(String, String)> {
    match pair.split_once('=') {
        Some((k, v)) if !k.trim().is_empty() => Ok((k.trim().to_string(), v.to_string())),
        _ => bail!("expected key=value, got `{}`", pair),
    }
}
