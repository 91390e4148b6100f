//! Payload formatting: projects an underwriting snapshot into zero or more
//! typed payloads, one per `ProcessorKind`.

use crate::domain::{ProcessorKind, Underwriting};
use serde_json::{json, Map, Value};

/// The fixed dot-path mapping from merchant field name to the flat column
/// it reads.
const FIELD_MAPPING: &[(&str, &str)] = &[
    ("name", "merchant.name"),
    ("ein", "merchant.ein"),
    ("industry", "merchant.industry"),
    ("email", "merchant.email"),
    ("phone", "merchant.phone"),
    ("website", "merchant.website"),
    ("entity_type", "merchant.entity_type"),
    ("incorporation_date", "merchant.incorporation_date"),
    ("state_of_incorporation", "merchant.state_of_incorporation"),
];

fn merchant_field(underwriting: &Underwriting, field: &str) -> Option<Value> {
    let s = match field {
        "name" => &underwriting.merchant_name,
        "ein" => &underwriting.merchant_ein,
        "industry" => &underwriting.merchant_industry,
        "email" => &underwriting.merchant_email,
        "phone" => &underwriting.merchant_phone,
        "website" => &underwriting.merchant_website,
        "entity_type" => &underwriting.merchant_entity_type,
        "incorporation_date" => &underwriting.merchant_incorporation_date,
        "state_of_incorporation" => &underwriting.merchant_state_of_incorporation,
        _ => return None,
    };
    s.as_ref().map(|v| json!(v))
}

fn owners_list(underwriting: &Underwriting) -> Value {
    Value::Array(
        underwriting
            .owners
            .iter()
            .map(|o| {
                json!({
                    "id": o.id.0,
                    "first_name": o.first_name,
                    "last_name": o.last_name,
                    "email": o.email,
                    "phone": o.phone,
                    "ownership_percent": o.ownership_percent,
                    "primary_owner": o.primary_owner,
                })
            })
            .collect(),
    )
}

/// Application payload: requested merchant fields that have data, dot-keyed,
/// plus the owners list. `None` if no `application_form` triggers declared;
/// `Some([])` if triggers declared but no requested field has data;
/// `Some([payload])` otherwise.
fn format_application_payload(
    underwriting: &Underwriting,
    requested_fields: Option<&[String]>,
) -> Option<Vec<Value>> {
    let requested_fields = requested_fields?;

    let mut form = Map::new();
    for (short, dotted) in FIELD_MAPPING {
        if !requested_fields.iter().any(|f| f == dotted) {
            continue;
        }
        if let Some(value) = merchant_field(underwriting, short) {
            form.insert((*dotted).to_string(), value);
        }
    }

    if form.is_empty() {
        return Some(vec![]);
    }

    Some(vec![json!({
        "application_form": Value::Object(form),
        "owners_list": owners_list(underwriting),
    })])
}

/// Stipulation payload: one payload grouping the current revision ids of
/// *all* documents matching the first declared stipulation type.
fn format_stipulation_payload(
    underwriting: &Underwriting,
    stipulation_types: Option<&[String]>,
) -> Option<Vec<Value>> {
    let stipulation_types = stipulation_types?;
    let first_type = match stipulation_types.first() {
        Some(t) => t,
        None => return Some(vec![]),
    };

    let revision_ids: Vec<Value> = underwriting
        .documents
        .iter()
        .filter(|d| &d.stipulation_type == first_type)
        .filter_map(|d| d.current_revision_id.map(|r| json!(r.to_string())))
        .collect();

    if revision_ids.is_empty() {
        return Some(vec![]);
    }

    Some(vec![json!({
        "revision_id": revision_ids.clone(),
        "documents_list": revision_ids,
    })])
}

/// Document payload: one payload per matching document, each carrying a
/// single revision id.
fn format_document_payload(
    underwriting: &Underwriting,
    stipulation_types: Option<&[String]>,
) -> Option<Vec<Value>> {
    let stipulation_types = stipulation_types?;

    let payloads: Vec<Value> = underwriting
        .documents
        .iter()
        .filter(|d| stipulation_types.iter().any(|t| t == &d.stipulation_type))
        .filter_map(|d| {
            d.current_revision_id.map(|r| {
                json!({
                    "revision_id": r.to_string(),
                    "documents_list": [r.to_string()],
                })
            })
        })
        .collect();

    Some(payloads)
}

/// One-off payload for W2's "selective form data" scenario: wraps a
/// caller-supplied dot-keyed form directly, still attaching the owners list
/// so the resulting payload has the same shape `extract` expects.
pub fn build_manual_application_payload(underwriting: &Underwriting, form: &Map<String, Value>) -> Value {
    json!({
        "application_form": Value::Object(form.clone()),
        "owners_list": owners_list(underwriting),
    })
}

/// One-off payload(s) for W2's "selective document data" scenario. Document
/// kind processors get one payload per id; everything else groups all ids
/// into a single payload, matching the Stipulation shape.
pub fn build_manual_document_payloads(kind: ProcessorKind, document_list: &[String]) -> Vec<Value> {
    match kind {
        ProcessorKind::Document => document_list
            .iter()
            .map(|id| json!({"revision_id": id, "documents_list": [id]}))
            .collect(),
        _ => {
            if document_list.is_empty() {
                vec![]
            } else {
                vec![json!({"revision_id": document_list, "documents_list": document_list})]
            }
        }
    }
}

/// Trigger declarations as read off a `Processor`: dot-path fields for
/// `application_form`, stipulation kinds for `documents_list`.
#[derive(Debug, Clone, Default)]
pub struct Triggers {
    pub application_form: Option<Vec<String>>,
    pub documents_list: Option<Vec<String>>,
}

/// `formatPayloadList`. Returns `None` to mean "no triggers declared, skip
/// entirely"; `Some(vec![])` to mean "triggers matched but nothing to do".
pub fn format_payload_list(kind: ProcessorKind, underwriting: &Underwriting, triggers: &Triggers) -> Option<Vec<Value>> {
    match kind {
        ProcessorKind::Application => {
            format_application_payload(underwriting, triggers.application_form.as_deref())
        }
        ProcessorKind::Stipulation => {
            format_stipulation_payload(underwriting, triggers.documents_list.as_deref())
        }
        ProcessorKind::Document => format_document_payload(underwriting, triggers.documents_list.as_deref()),
    }
}
