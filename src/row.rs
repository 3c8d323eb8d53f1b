// src/row.rs

use crate::customizer::{CustomizerTable, RowError};
use crate::parser::Parser;
use crate::path;
use serde_json::Value;

/// Flatten one response row into a list of values.
///
/// `getter` picks the raw values out of `row`. The value at position `i` is
/// passed through `customizers[i]` when present, then through `parser`; a
/// parser that returns `None` leaves the value as it was.
pub fn parse_ads_row<R, G, I>(
    row: &R,
    getter: G,
    parser: &dyn Parser,
    customizers: Option<&CustomizerTable>,
) -> Result<Vec<Value>, RowError>
where
    R: ?Sized,
    G: Fn(&R) -> I,
    I: IntoIterator<Item = Value>,
{
    getter(row)
        .into_iter()
        .enumerate()
        .map(|(i, raw)| {
            let value = match customizers.and_then(|table| table.get(&i)) {
                Some(customizer) => customizer.apply(raw)?,
                None => raw,
            };
            Ok(parser.parse(&value).unwrap_or(value))
        })
        .collect()
}

/// Getter that looks up each of `fields` (dotted paths) on a row.
///
/// The REST format omits fields holding their default value. An omitted
/// `metrics.*` field is numeric, so it comes back as `0`; any other omitted
/// field comes back as `null`.
pub fn fields_getter(fields: &[String]) -> impl Fn(&Value) -> Vec<Value> + '_ {
    move |row: &Value| -> Vec<Value> {
        fields
            .iter()
            .map(|f| {
                path::resolve(row, f)
                    .cloned()
                    .unwrap_or_else(|_| omitted_value(f))
            })
            .collect()
    }
}

fn omitted_value(field: &str) -> Value {
    if field.starts_with("metrics.") {
        Value::from(0)
    } else {
        Value::Null
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::customizer::Customizer;
    use crate::parser::{NoopParser, RowParser};
    use serde_json::json;

    fn list(v: &Value) -> Vec<Value> {
        v.as_array().cloned().unwrap_or_default()
    }

    fn table(entries: Vec<(usize, Customizer)>) -> CustomizerTable {
        entries.into_iter().collect()
    }

    #[test]
    fn empty_parser_keeps_raw_values() {
        let row = json!([10, 20, 30]);
        let never = |_: &Value| -> Option<Value> { None };
        let out = parse_ads_row(&row, list, &never, None).unwrap();
        assert_eq!(out, vec![json!(10), json!(20), json!(30)]);
    }

    #[test]
    fn resource_index_picks_part() {
        let row = json!(["a~b~c"]);
        let c = table(vec![(0, Customizer::ResourceIndex(1))]);
        let out = parse_ads_row(&row, list, &NoopParser, Some(&c)).unwrap();
        assert_eq!(out, vec![json!("b")]);
    }

    #[test]
    fn nested_field_resolves_path() {
        let row = json!([{"inner": {"value": 42}}]);
        let c = table(vec![(0, Customizer::NestedField("inner.value".into()))]);
        let out = parse_ads_row(&row, list, &NoopParser, Some(&c)).unwrap();
        assert_eq!(out, vec![json!(42)]);
    }

    #[test]
    fn bad_nested_field_is_a_configuration_error() {
        let row = json!([{"inner": {"other": 1}}]);
        let c = table(vec![(0, Customizer::NestedField("inner.value".into()))]);
        let err = parse_ads_row(&row, list, &NoopParser, Some(&c)).unwrap_err();
        assert_eq!(
            err,
            RowError::Customizer {
                customizer: Customizer::NestedField("inner.value".into())
            }
        );
    }

    #[test]
    fn empty_row_ignores_customizers() {
        let row = json!([]);
        let c = table(vec![
            (0, Customizer::ResourceIndex(9)),
            (1, Customizer::NestedField("x".into())),
        ]);
        let out = parse_ads_row(&row, list, &NoopParser, Some(&c)).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn customizers_only_touch_their_position() {
        let row = json!(["x~y", "x~y"]);
        let c = table(vec![(1, Customizer::ResourceIndex(0))]);
        let out = parse_ads_row(&row, list, &NoopParser, Some(&c)).unwrap();
        assert_eq!(out, vec![json!("x~y"), json!("x")]);
    }

    #[test]
    fn parser_runs_after_customizer() {
        let row = json!(["customers/1/adGroupAds/55~777"]);
        let c = table(vec![(0, Customizer::ResourceIndex(1))]);
        let out = parse_ads_row(&row, list, &RowParser, Some(&c)).unwrap();
        assert_eq!(out, vec![json!(777)]);
    }

    #[test]
    fn parsed_empty_string_is_kept() {
        let row = json!(["raw"]);
        let blank = |_: &Value| Some(json!(""));
        let out = parse_ads_row(&row, list, &blank, None).unwrap();
        assert_eq!(out, vec![json!("")]);
    }

    #[test]
    fn fields_getter_reads_paths_and_nulls_missing() {
        let row = json!({"campaign": {"id": "7", "name": "Spring"}});
        let fields = vec![
            "campaign.id".to_string(),
            "campaign.name".to_string(),
            "campaign.status".to_string(),
        ];
        let out = parse_ads_row(&row, fields_getter(&fields), &RowParser, None).unwrap();
        assert_eq!(out, vec![json!(7), json!("Spring"), Value::Null]);
    }

    #[test]
    fn omitted_fields_are_not_invented() {
        let row = json!({"campaign": {"id": "11"}, "metrics": {}});
        let fields = vec![
            "campaign.id".to_string(),
            "metrics.clicks".to_string(),
            "ad_group_criterion.resource_name".to_string(),
        ];
        let c = table(vec![(2, Customizer::ResourceIndex(0))]);
        let out = parse_ads_row(&row, fields_getter(&fields), &RowParser, Some(&c)).unwrap();
        assert_eq!(out, vec![json!(11), json!(0), Value::Null]);
    }
}
