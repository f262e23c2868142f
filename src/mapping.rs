//! Column-mapping rules: header key normalization, the best-effort guesser, and
//! manual overrides.
//!
//! Rules are a total map from destination field to either a source header or
//! unassigned (`None`). Every function here that builds rules emits exactly one entry
//! per destination field.

use std::{collections::BTreeMap, sync::OnceLock};

use regex::Regex;

use crate::error::ImportError;

pub type MappingRules = BTreeMap<String, Option<String>>;

static SEPARATOR_RUN: OnceLock<Regex> = OnceLock::new();

fn separator_run() -> &'static Regex {
    SEPARATOR_RUN.get_or_init(|| Regex::new(r"[ \-]+").expect("valid separator pattern"))
}

/// Canonical comparison key for a header: trimmed, lowercased, with every run of
/// spaces and hyphens collapsed to a single underscore.
pub fn normalize_key(value: &str) -> String {
    let lowered = value.trim().to_lowercase();
    separator_run().replace_all(&lowered, "_").into_owned()
}

/// Proposes a source header for each destination field.
///
/// Exact normalized matches win over substring matches, and within each pass the
/// first header in file order wins. The same header may be proposed for several
/// fields.
pub fn guess_rules(fields: &[String], headers: &[String]) -> MappingRules {
    let keyed = headers
        .iter()
        .map(|raw| (raw, normalize_key(raw)))
        .collect::<Vec<_>>();

    fields
        .iter()
        .map(|field| {
            let wanted = normalize_key(field);
            let hit = keyed
                .iter()
                .find(|(_, key)| *key == wanted)
                .or_else(|| keyed.iter().find(|(_, key)| key.contains(&wanted)))
                .map(|(raw, _)| (*raw).clone());
            (field.clone(), hit)
        })
        .collect()
}

/// Rules with every field unassigned.
pub fn empty_rules(fields: &[String]) -> MappingRules {
    fields.iter().map(|field| (field.clone(), None)).collect()
}

/// Assigns (or clears, with `None`) the source header for one destination field.
///
/// Only fields of the schema and headers present in the current file are accepted,
/// mirroring the choices a selection list would offer.
pub fn set_rule(
    rules: &mut MappingRules,
    fields: &[String],
    headers: &[String],
    field: &str,
    source: Option<&str>,
) -> Result<(), ImportError> {
    if !fields.iter().any(|f| f == field) {
        return Err(ImportError::validation(format!(
            "'{field}' is not a field of the destination schema"
        )));
    }
    // Match the header as written first, then its trimmed form.
    let source = match source {
        None => None,
        Some(raw) if raw.trim().is_empty() => None,
        Some(raw) => {
            let header = [raw, raw.trim()]
                .into_iter()
                .find(|candidate| headers.iter().any(|h| h == candidate))
                .ok_or_else(|| {
                    ImportError::validation(format!(
                        "'{raw}' is not a column of the uploaded file"
                    ))
                })?;
            Some(header.to_string())
        }
    };
    rules.insert(field.to_string(), source);
    Ok(())
}

/// Assigned entries only, the shape templates are persisted in.
pub fn cleaned_rules(rules: &MappingRules) -> BTreeMap<String, String> {
    rules
        .iter()
        .filter_map(|(field, source)| source.as_ref().map(|s| (field.clone(), s.clone())))
        .collect()
}

/// Parses a `field=header` override; an empty right-hand side clears the field.
pub fn parse_assignment(value: &str) -> Result<(String, Option<String>), String> {
    let (field, source) = value
        .split_once('=')
        .ok_or_else(|| format!("Expected FIELD=HEADER, got '{value}'"))?;
    let field = field.trim();
    if field.is_empty() {
        return Err("Field name cannot be empty".to_string());
    }
    let source = (!source.trim().is_empty()).then(|| source.to_string());
    Ok((field.to_string(), source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn normalize_key_collapses_separator_runs() {
        assert_eq!(normalize_key("  Order Id "), "order_id");
        assert_eq!(normalize_key("unit - price"), "unit_price");
        assert_eq!(normalize_key("Order--Date"), "order_date");
        assert_eq!(normalize_key("already_snake"), "already_snake");
        assert_eq!(normalize_key(""), "");
    }

    #[test]
    fn normalize_key_lowercases_non_ascii() {
        assert_eq!(normalize_key("Größe Übersicht"), "größe_übersicht");
        assert_eq!(normalize_key("注文 ID"), "注文_id");
    }

    #[test]
    fn guess_prefers_exact_over_partial_match() {
        let fields = strings(&["product"]);
        let headers = strings(&["Product Code", "PRODUCT"]);
        let rules = guess_rules(&fields, &headers);
        assert_eq!(rules["product"].as_deref(), Some("PRODUCT"));
    }

    #[test]
    fn guess_falls_back_to_first_partial_match() {
        let fields = strings(&["order_date", "unit_price"]);
        let headers = strings(&["first order date", "order-date-local", "Price"]);
        let rules = guess_rules(&fields, &headers);
        assert_eq!(rules["order_date"].as_deref(), Some("first order date"));
        assert_eq!(rules["unit_price"], None);
    }

    #[test]
    fn guess_allows_one_header_for_several_fields() {
        let fields = strings(&["customer_id", "customer"]);
        let headers = strings(&["Customer ID"]);
        let rules = guess_rules(&fields, &headers);
        assert_eq!(rules["customer_id"].as_deref(), Some("Customer ID"));
        assert_eq!(rules["customer"].as_deref(), Some("Customer ID"));
    }

    #[test]
    fn guess_with_no_headers_leaves_everything_unassigned() {
        let fields = strings(&["order_id", "quantity"]);
        let rules = guess_rules(&fields, &[]);
        assert_eq!(rules, empty_rules(&fields));
    }

    #[test]
    fn set_rule_validates_field_and_header() {
        let fields = strings(&["order_id", "quantity"]);
        let headers = strings(&["Order Id", "Qty"]);
        let mut rules = guess_rules(&fields, &headers);

        set_rule(&mut rules, &fields, &headers, "quantity", Some("Qty")).expect("assign");
        assert_eq!(rules["quantity"].as_deref(), Some("Qty"));

        let err = set_rule(&mut rules, &fields, &headers, "price", Some("Qty")).unwrap_err();
        assert!(err.is_validation());
        let err = set_rule(&mut rules, &fields, &headers, "quantity", Some("Amount")).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(rules["quantity"].as_deref(), Some("Qty"));

        set_rule(&mut rules, &fields, &headers, "quantity", Some("")).expect("clear");
        assert_eq!(rules["quantity"], None);
    }

    #[test]
    fn set_rule_keeps_padded_header_names() {
        let fields = strings(&["quantity", "notes"]);
        let headers = strings(&[" Qty ", "Notes"]);
        let mut rules = empty_rules(&fields);

        let (_, source) = parse_assignment("quantity= Qty ").expect("parse");
        set_rule(&mut rules, &fields, &headers, "quantity", source.as_deref()).expect("padded");
        assert_eq!(rules["quantity"].as_deref(), Some(" Qty "));

        let (_, source) = parse_assignment("notes = Notes").expect("parse");
        set_rule(&mut rules, &fields, &headers, "notes", source.as_deref()).expect("trimmed");
        assert_eq!(rules["notes"].as_deref(), Some("Notes"));

        let err = set_rule(&mut rules, &fields, &headers, "quantity", Some("Qty ")).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn cleaned_rules_drop_unassigned_entries() {
        let mut rules = MappingRules::new();
        rules.insert("order_id".into(), Some("Order Id".into()));
        rules.insert("quantity".into(), None);
        let cleaned = cleaned_rules(&rules);
        assert_eq!(cleaned.len(), 1);
        assert_eq!(cleaned["order_id"], "Order Id");
    }

    #[test]
    fn parse_assignment_accepts_empty_source() {
        assert_eq!(
            parse_assignment("quantity = Qty").unwrap(),
            ("quantity".to_string(), Some(" Qty".to_string()))
        );
        assert_eq!(parse_assignment("quantity=").unwrap(), ("quantity".to_string(), None));
        assert_eq!(parse_assignment("quantity=  ").unwrap(), ("quantity".to_string(), None));
        assert!(parse_assignment("quantity").is_err());
        assert!(parse_assignment("=Qty").is_err());
    }

    proptest! {
        #[test]
        fn guess_covers_schema_exactly(
            fields in proptest::collection::btree_set("[a-z_ -]{1,10}", 1..8),
            headers in proptest::collection::vec("[A-Za-z_ -]{0,12}", 0..10)
        ) {
            let fields: Vec<String> = fields.into_iter().collect();
            let rules = guess_rules(&fields, &headers);
            prop_assert_eq!(rules.len(), fields.len());
            for field in &fields {
                let value = rules.get(field);
                prop_assert!(value.is_some());
                if let Some(Some(header)) = value {
                    prop_assert!(headers.contains(header));
                }
            }
        }

        #[test]
        fn guess_never_skips_an_exact_match(
            field in "[a-z]{1,6}",
            noise in proptest::collection::vec("[a-z]{0,4}", 0..4)
        ) {
            let mut headers: Vec<String> = noise.iter().map(|n| format!("{n}{field}{n}x")).collect();
            headers.push(field.to_uppercase());
            let rules = guess_rules(&[field.clone()], &headers);
            let chosen = rules[&field].as_deref().map(normalize_key);
            prop_assert_eq!(chosen, Some(normalize_key(&field)));
        }
    }
}
