//! Primary registry client (openFDA label and NDC endpoints)
//!
//! Resolves a product name to brand, generic name and active-ingredient text,
//! builds the canonical ingredient base and translates it to a local name.

use super::retry::RetryPolicy;
use super::transport::{Transport, TransportError};
use crate::cache::EnrichmentCache;
use crate::cancel::{CancellationToken, Cancelled};
use crate::config::Settings;
use drugmatch_common::{
    build_ingredient_base, extract_primary_token, first_word, normalize_product_name, Confidence,
    EnrichmentRecord, LocalNameDictionary, SourceRecord,
};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

lazy_static! {
    static ref HEADING_RE: Regex =
        Regex::new(r"(?i)^\s*active\s+ingredients?(?:\s*\([^)]*\))?\s*[:.]?\s*").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimaryEndpoint {
    Label,
    ProductListing,
}

impl PrimaryEndpoint {
    fn path(&self) -> &'static str {
        match self {
            PrimaryEndpoint::Label => "label.json",
            PrimaryEndpoint::ProductListing => "ndc.json",
        }
    }

    fn search(&self, token: &str) -> String {
        let token = token.replace('"', "");
        match self {
            PrimaryEndpoint::Label => format!("openfda.brand_name:\"{}\"", token),
            PrimaryEndpoint::ProductListing => format!("brand_name:\"{}\"", token),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            PrimaryEndpoint::Label => "openfda.label",
            PrimaryEndpoint::ProductListing => "openfda.ndc",
        }
    }
}

// label.json

#[derive(Debug, Default, Deserialize)]
struct LabelResponse {
    #[serde(default)]
    results: Vec<LabelResult>,
}

#[derive(Debug, Default, Deserialize)]
struct LabelResult {
    #[serde(default)]
    openfda: LabelOpenFda,
    #[serde(default)]
    active_ingredient: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LabelOpenFda {
    #[serde(default)]
    brand_name: Vec<String>,
    #[serde(default)]
    generic_name: Vec<String>,
    #[serde(default)]
    application_number: Vec<String>,
}

// ndc.json

#[derive(Debug, Default, Deserialize)]
struct NdcResponse {
    #[serde(default)]
    results: Vec<NdcResult>,
}

#[derive(Debug, Default, Deserialize)]
struct NdcResult {
    #[serde(default)]
    brand_name: Option<String>,
    #[serde(default)]
    generic_name: Option<String>,
    #[serde(default)]
    application_number: Option<String>,
    #[serde(default)]
    active_ingredients: Vec<NdcIngredient>,
}

#[derive(Debug, Default, Deserialize)]
struct NdcIngredient {
    #[serde(default)]
    name: String,
    #[serde(default)]
    strength: String,
}

/// Decoded payload of either endpoint
#[derive(Debug)]
enum PrimaryResponse {
    Label(LabelResponse),
    ProductListing(NdcResponse),
}

/// What the primary registry knows about one product
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrimaryMatch {
    pub brand_name: String,
    pub generic_name: String,
    pub application_number: String,
    pub ingredients: String,
    pub confidence: Confidence,
}

impl PrimaryResponse {
    fn decode(endpoint: PrimaryEndpoint, value: Value) -> Result<Self, TransportError> {
        let decoded = match endpoint {
            PrimaryEndpoint::Label => serde_json::from_value(value).map(PrimaryResponse::Label),
            PrimaryEndpoint::ProductListing => {
                serde_json::from_value(value).map(PrimaryResponse::ProductListing)
            }
        };
        decoded.map_err(|e| TransportError::Decode(e.to_string()))
    }

    fn into_match(self) -> Option<PrimaryMatch> {
        let (brand_name, generic_name, application_number, ingredients) = match self {
            PrimaryResponse::Label(response) => {
                let first = response.results.into_iter().next()?;
                let ingredients = first
                    .active_ingredient
                    .first()
                    .map(|text| HEADING_RE.replace(text.trim(), "").trim().to_string())
                    .unwrap_or_default();
                (
                    first_of(first.openfda.brand_name),
                    first_of(first.openfda.generic_name),
                    first_of(first.openfda.application_number),
                    ingredients,
                )
            }
            PrimaryResponse::ProductListing(response) => {
                let first = response.results.into_iter().next()?;
                let ingredients = first
                    .active_ingredients
                    .iter()
                    .map(|i| format!("{} {}", i.name.trim(), i.strength.trim()).trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
                    .join("; ");
                (
                    first.brand_name.unwrap_or_default().trim().to_string(),
                    first.generic_name.unwrap_or_default().trim().to_string(),
                    first.application_number.unwrap_or_default().trim().to_string(),
                    ingredients,
                )
            }
        };

        let confidence = match (brand_name.is_empty(), ingredients.is_empty()) {
            (false, false) => Confidence::High,
            (true, true) => return None,
            _ => Confidence::Medium,
        };

        Some(PrimaryMatch {
            brand_name,
            generic_name,
            application_number,
            ingredients,
            confidence,
        })
    }
}

fn first_of(values: Vec<String>) -> String {
    values
        .into_iter()
        .next()
        .map(|v| v.trim().to_string())
        .unwrap_or_default()
}

/// openFDA client with translation
pub struct OpenFdaClient {
    transport: Arc<dyn Transport>,
    dictionary: Arc<LocalNameDictionary>,
    cache: Arc<EnrichmentCache>,
    base_url: String,
    api_key: Option<String>,
    retry: RetryPolicy,
    endpoint_delay: Duration,
}

impl OpenFdaClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        dictionary: Arc<LocalNameDictionary>,
        cache: Arc<EnrichmentCache>,
        settings: &Settings,
    ) -> Self {
        Self {
            transport,
            dictionary,
            cache,
            base_url: settings.openfda_base_url.trim_end_matches('/').to_string(),
            api_key: settings.openfda_api_key.clone(),
            retry: RetryPolicy::new(settings.retry_attempts, settings.openfda_backoff),
            endpoint_delay: settings.endpoint_delay,
        }
    }

    /// Enrich one source row.
    ///
    /// Rows with the same normalized name share one cached lookup; the cached
    /// record is re-labelled with this row's identifiers.
    pub async fn enrich(
        &self,
        source: &SourceRecord,
        cancel: &CancellationToken,
    ) -> Result<EnrichmentRecord, Cancelled> {
        let key = normalize_product_name(&source.product_name);
        let normalized = key.clone();
        let record = self
            .cache
            .get_or_try_fetch(key, move || async move { self.fetch(&normalized, cancel).await })
            .await?;
        Ok(record.for_source(source))
    }

    async fn fetch(
        &self,
        normalized: &str,
        cancel: &CancellationToken,
    ) -> Result<EnrichmentRecord, Cancelled> {
        let token = extract_primary_token(normalized);
        let found = self.find(normalized, &token, cancel).await?;

        let ingredient_base = found
            .as_ref()
            .filter(|m| !m.ingredients.is_empty())
            .map(|m| build_ingredient_base(&m.ingredients))
            .filter(|base| !base.is_empty())
            .unwrap_or_else(|| normalized.to_string());

        let translation = self
            .dictionary
            .translate(&ingredient_base, &[token.as_str(), normalized]);

        let found = found.unwrap_or_default();
        info!(
            product = normalized,
            confidence = %found.confidence,
            base = %ingredient_base,
            mapped = translation.mapped,
            "enriched"
        );

        Ok(EnrichmentRecord {
            normalized_name: normalized.to_string(),
            primary_brand_name: found.brand_name,
            primary_generic_name: found.generic_name,
            application_number: found.application_number,
            raw_active_ingredients: found.ingredients,
            ingredient_base,
            confidence: found.confidence,
            local_ingredient_name: translation.local_name.clone(),
            local_search_term: translation.local_name,
            local_name_mapped: translation.mapped,
            ..Default::default()
        })
    }

    /// label → NDC → label with the short first word
    async fn find(
        &self,
        normalized: &str,
        token: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<PrimaryMatch>, Cancelled> {
        if token.is_empty() {
            return Ok(None);
        }

        if let Some(found) = self.lookup(PrimaryEndpoint::Label, token, cancel).await? {
            return Ok(Some(found));
        }

        tokio::time::sleep(self.endpoint_delay).await;
        if let Some(found) = self.lookup(PrimaryEndpoint::ProductListing, token, cancel).await? {
            return Ok(Some(found));
        }

        let short = first_word(normalized);
        if short.is_empty() || short == token {
            return Ok(None);
        }

        tokio::time::sleep(self.endpoint_delay).await;
        self.lookup(PrimaryEndpoint::Label, short, cancel).await
    }

    /// One endpoint query with retries; None when nothing usable came back.
    pub async fn lookup(
        &self,
        endpoint: PrimaryEndpoint,
        token: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<PrimaryMatch>, Cancelled> {
        let url = format!("{}/{}", self.base_url, endpoint.path());
        let mut query = vec![
            ("search", endpoint.search(token)),
            ("limit", "1".to_string()),
        ];
        if let Some(key) = &self.api_key {
            query.push(("api_key", key.clone()));
        }

        let transport = self.transport.as_ref();
        let (url, query) = (&url, &query);
        let Some(response) = self
            .retry
            .run(endpoint.label(), cancel, move || async move {
                let value = transport.get_json(url, query).await?;
                PrimaryResponse::decode(endpoint, value)
            })
            .await?
        else {
            return Ok(None);
        };

        let found = response.into_match();
        debug!(endpoint = endpoint.label(), token, found = found.is_some(), "primary lookup");
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_label_adapter_strips_heading() {
        let value = json!({
            "results": [{
                "openfda": {
                    "brand_name": ["Lipitor"],
                    "generic_name": ["ATORVASTATIN CALCIUM"],
                    "application_number": ["NDA020702"]
                },
                "active_ingredient": ["Active ingredient (in each tablet): Atorvastatin calcium 20 mg"]
            }]
        });
        let found = PrimaryResponse::decode(PrimaryEndpoint::Label, value)
            .unwrap()
            .into_match()
            .unwrap();
        assert_eq!(found.brand_name, "Lipitor");
        assert_eq!(found.application_number, "NDA020702");
        assert_eq!(found.confidence, Confidence::High);
        assert_eq!(build_ingredient_base(&found.ingredients), "ATORVASTATIN");
    }

    #[test]
    fn test_ndc_adapter_joins_ingredients() {
        let value = json!({
            "results": [{
                "brand_name": "Excedrin",
                "generic_name": "Acetaminophen, Aspirin, Caffeine",
                "active_ingredients": [
                    { "name": "ACETAMINOPHEN", "strength": "250 mg/1" },
                    { "name": "ASPIRIN", "strength": "250 mg/1" },
                    { "name": "CAFFEINE", "strength": "65 mg/1" }
                ]
            }]
        });
        let found = PrimaryResponse::decode(PrimaryEndpoint::ProductListing, value)
            .unwrap()
            .into_match()
            .unwrap();
        assert_eq!(
            found.ingredients,
            "ACETAMINOPHEN 250 mg/1; ASPIRIN 250 mg/1; CAFFEINE 65 mg/1"
        );
        assert!(found.application_number.is_empty());
    }

    #[test]
    fn test_brand_only_is_medium() {
        let value = json!({ "results": [{ "openfda": { "brand_name": ["Lipitor"] } }] });
        let found = PrimaryResponse::decode(PrimaryEndpoint::Label, value)
            .unwrap()
            .into_match()
            .unwrap();
        assert_eq!(found.confidence, Confidence::Medium);
        assert!(found.ingredients.is_empty());
    }

    #[test]
    fn test_empty_results_no_match() {
        let value = json!({ "results": [] });
        let response = PrimaryResponse::decode(PrimaryEndpoint::Label, value).unwrap();
        assert!(response.into_match().is_none());

        let value = json!({ "results": [{ "openfda": {} }] });
        let response = PrimaryResponse::decode(PrimaryEndpoint::Label, value).unwrap();
        assert!(response.into_match().is_none());
    }

    #[test]
    fn test_wrong_shape_is_decode_error() {
        let value = json!({ "results": "nope" });
        assert!(matches!(
            PrimaryResponse::decode(PrimaryEndpoint::Label, value),
            Err(TransportError::Decode(_))
        ));
    }

    #[test]
    fn test_search_expressions() {
        assert_eq!(
            PrimaryEndpoint::Label.search("LIPITOR"),
            "openfda.brand_name:\"LIPITOR\""
        );
        assert_eq!(
            PrimaryEndpoint::ProductListing.search("LIPITOR"),
            "brand_name:\"LIPITOR\""
        );
    }
}
