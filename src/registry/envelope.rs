//! MFDS response envelope and item schemas
//!
//! Both endpoints share the `{header, body}` envelope (sometimes wrapped in
//! `{response: ...}`) but use different item field sets.

use super::transport::TransportError;
use drugmatch_common::RegistryProduct;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::debug;

const SUCCESS_CODES: &[&str] = &["00", "0", "0000"];
const ORIGINAL_MARKER: &str = "신약";
const ACTIVE_CANCEL_NAME: &str = "정상";

/// Which endpoint produced an envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MfdsEndpoint {
    PermitDetail,
    SimplifiedList,
}

impl MfdsEndpoint {
    pub fn label(&self) -> &'static str {
        match self {
            MfdsEndpoint::PermitDetail => "mfds.permit_detail",
            MfdsEndpoint::SimplifiedList => "mfds.simplified_list",
        }
    }

    /// Query parameter carrying the search term
    pub fn search_param(&self) -> &'static str {
        match self {
            MfdsEndpoint::PermitDetail => "item_ingr_name",
            MfdsEndpoint::SimplifiedList => "itemName",
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EnvelopeRoot {
    Wrapped { response: Envelope },
    Bare(Envelope),
}

#[derive(Debug, Deserialize)]
struct Envelope {
    header: Header,
    #[serde(default)]
    body: Option<Body>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Header {
    #[serde(default, deserialize_with = "lenient_string")]
    result_code: String,
    #[serde(default, deserialize_with = "lenient_string")]
    result_msg: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Body {
    #[serde(default, deserialize_with = "lenient_count")]
    total_count: u32,
    #[serde(default)]
    items: Value,
}

/// Detailed permit item
#[derive(Debug, Default, Deserialize)]
struct PermitDetailItem {
    #[serde(rename = "ITEM_SEQ", default, deserialize_with = "lenient_string")]
    item_seq: String,
    #[serde(rename = "ITEM_NAME", default, deserialize_with = "lenient_string")]
    item_name: String,
    #[serde(rename = "ENTP_NAME", default, deserialize_with = "lenient_string")]
    entp_name: String,
    #[serde(rename = "FORM_CODE_NAME", alias = "CHART", default, deserialize_with = "lenient_string")]
    form_code_name: String,
    #[serde(rename = "NEWDRUG_CLASS_NAME", default, deserialize_with = "lenient_string")]
    newdrug_class_name: String,
    #[serde(rename = "CANCEL_DATE", default, deserialize_with = "lenient_string")]
    cancel_date: String,
    #[serde(rename = "CANCEL_NAME", default, deserialize_with = "lenient_string")]
    cancel_name: String,
    #[serde(rename = "MAIN_ITEM_INGR", alias = "MATERIAL_NAME", default, deserialize_with = "lenient_string")]
    main_item_ingr: String,
}

/// Simplified list item
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SimplifiedListItem {
    #[serde(default, deserialize_with = "lenient_string")]
    item_seq: String,
    #[serde(default, deserialize_with = "lenient_string")]
    item_name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    entp_name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    form_code_name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    new_drug_class: String,
    #[serde(default, deserialize_with = "lenient_string")]
    cancel_date: String,
    #[serde(default, deserialize_with = "lenient_string")]
    material_name: String,
}

#[derive(Debug)]
enum RegistryItem {
    PermitDetail(PermitDetailItem),
    SimplifiedList(SimplifiedListItem),
}

impl RegistryItem {
    fn decode(endpoint: MfdsEndpoint, value: Value) -> serde_json::Result<Self> {
        match endpoint {
            MfdsEndpoint::PermitDetail => serde_json::from_value(value).map(RegistryItem::PermitDetail),
            MfdsEndpoint::SimplifiedList => {
                serde_json::from_value(value).map(RegistryItem::SimplifiedList)
            }
        }
    }

    fn into_product(self) -> RegistryProduct {
        match self {
            RegistryItem::PermitDetail(item) => RegistryProduct {
                is_original: is_original(&item.newdrug_class_name),
                is_revoked: is_revoked(&item.cancel_date, &item.cancel_name),
                item_code: item.item_seq,
                product_name: item.item_name,
                manufacturer: item.entp_name,
                dosage_form: item.form_code_name,
                classification: item.newdrug_class_name,
                ingredient_text: item.main_item_ingr,
            },
            RegistryItem::SimplifiedList(item) => RegistryProduct {
                is_original: is_original(&item.new_drug_class),
                is_revoked: is_revoked(&item.cancel_date, ""),
                item_code: item.item_seq,
                product_name: item.item_name,
                manufacturer: item.entp_name,
                dosage_form: item.form_code_name,
                classification: item.new_drug_class,
                ingredient_text: item.material_name,
            },
        }
    }
}

pub fn is_original(classification: &str) -> bool {
    let classification = classification.trim();
    classification.eq_ignore_ascii_case("Y") || classification.contains(ORIGINAL_MARKER)
}

pub fn is_revoked(cancel_date: &str, cancel_name: &str) -> bool {
    let cancel_name = cancel_name.trim();
    !cancel_date.trim().is_empty() || (!cancel_name.is_empty() && cancel_name != ACTIVE_CANCEL_NAME)
}

/// One decoded page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub total_count: u32,
    pub products: Vec<RegistryProduct>,
}

/// Decode one page; a bad envelope or result code is an error (retried by the caller).
pub fn decode_page(endpoint: MfdsEndpoint, value: Value) -> Result<Page, TransportError> {
    let envelope = match serde_json::from_value::<EnvelopeRoot>(value) {
        Ok(EnvelopeRoot::Wrapped { response }) => response,
        Ok(EnvelopeRoot::Bare(envelope)) => envelope,
        Err(err) => return Err(TransportError::Decode(err.to_string())),
    };

    let code = envelope.header.result_code.trim();
    if !SUCCESS_CODES.contains(&code) {
        return Err(TransportError::ResultCode {
            code: code.to_string(),
            message: envelope.header.result_msg,
        });
    }

    let Some(body) = envelope.body else {
        return Ok(Page::default());
    };

    let products = item_values(body.items)
        .into_iter()
        .filter_map(|value| match RegistryItem::decode(endpoint, value) {
            Ok(item) => Some(item.into_product()),
            Err(err) => {
                debug!(endpoint = endpoint.label(), error = %err, "skipping malformed item");
                None
            }
        })
        .collect();

    Ok(Page {
        total_count: body.total_count,
        products,
    })
}

/// `items` as an array, `{item: [..]}`, `{item: {..}}` or nothing
fn item_values(items: Value) -> Vec<Value> {
    match items {
        Value::Array(values) => values,
        Value::Object(mut map) => match map.remove("item") {
            Some(Value::Array(values)) => values,
            Some(item @ Value::Object(_)) => vec![item],
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    })
}

fn lenient_count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_u64().unwrap_or(0).min(u32::MAX as u64) as u32,
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wrapped_envelope_single_item() {
        let value = json!({
            "response": {
                "header": { "resultCode": "00", "resultMsg": "NORMAL SERVICE." },
                "body": {
                    "pageNo": 1, "numOfRows": 100, "totalCount": "1",
                    "items": { "item": {
                        "ITEM_SEQ": 200808876,
                        "ITEM_NAME": "리피토정10밀리그램",
                        "ENTP_NAME": "한국화이자제약",
                        "FORM_CODE_NAME": "필름코팅정",
                        "NEWDRUG_CLASS_NAME": "신약",
                        "CANCEL_DATE": null,
                        "CANCEL_NAME": "정상",
                        "MAIN_ITEM_INGR": "[M040702]아토르바스타틴칼슘삼수화물"
                    } }
                }
            }
        });

        let page = decode_page(MfdsEndpoint::PermitDetail, value).unwrap();
        assert_eq!(page.total_count, 1);
        assert_eq!(page.products.len(), 1);

        let product = &page.products[0];
        assert_eq!(product.item_code, "200808876");
        assert!(product.is_original);
        assert!(!product.is_revoked);
        assert_eq!(product.dosage_form, "필름코팅정");
    }

    #[test]
    fn test_bare_envelope_item_array() {
        let value = json!({
            "header": { "resultCode": "00", "resultMsg": "OK" },
            "body": {
                "totalCount": 2,
                "items": [
                    { "itemSeq": "1", "itemName": "아토르바정", "entpName": "A", "cancelDate": "" },
                    { "itemSeq": "2", "itemName": "아토르캡슐", "entpName": "B", "cancelDate": "20200101" }
                ]
            }
        });

        let page = decode_page(MfdsEndpoint::SimplifiedList, value).unwrap();
        assert_eq!(page.products.len(), 2);
        assert!(!page.products[0].is_revoked);
        assert!(page.products[1].is_revoked);
        assert!(!page.products[0].is_original);
    }

    #[test]
    fn test_nested_item_array_and_empty_items() {
        let value = json!({
            "header": { "resultCode": "0000" },
            "body": { "totalCount": 0, "items": { "item": [] } }
        });
        assert_eq!(
            decode_page(MfdsEndpoint::PermitDetail, value).unwrap(),
            Page::default()
        );

        let value = json!({ "header": { "resultCode": "00" }, "body": { "items": "" } });
        assert!(decode_page(MfdsEndpoint::PermitDetail, value)
            .unwrap()
            .products
            .is_empty());
    }

    #[test]
    fn test_error_result_code() {
        let value = json!({
            "header": { "resultCode": "30", "resultMsg": "SERVICE KEY IS NOT REGISTERED ERROR." }
        });
        let err = decode_page(MfdsEndpoint::PermitDetail, value).unwrap_err();
        assert!(matches!(err, TransportError::ResultCode { ref code, .. } if code == "30"));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_missing_header_is_decode_error() {
        let value = json!({ "body": { "items": [] } });
        assert!(matches!(
            decode_page(MfdsEndpoint::SimplifiedList, value),
            Err(TransportError::Decode(_))
        ));
    }

    #[test]
    fn test_revocation_and_original_rules() {
        assert!(is_revoked("2021-01-01", ""));
        assert!(is_revoked("", "취소"));
        assert!(!is_revoked("", "정상"));
        assert!(!is_revoked(" ", ""));

        assert!(is_original("Y"));
        assert!(is_original("신약(화학)"));
        assert!(!is_original("N"));
        assert!(!is_original(""));
    }
}
