//! Secondary registry client (MFDS)
//!
//! Looks up every registered product for a local-market ingredient term.
//! The detailed permit endpoint is paged; the simplified list endpoint is the
//! fallback when it returns nothing.

use super::envelope::{decode_page, MfdsEndpoint, Page};
use super::retry::RetryPolicy;
use super::transport::Transport;
use super::ProductSource;
use crate::cache::{ProductCache, ProductKey};
use crate::cancel::{CancellationToken, Cancelled};
use crate::config::Settings;
use async_trait::async_trait;
use drugmatch_common::{split_components, RegistryProduct, SearchTerm};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Products found for one effective search term
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LookupOutcome {
    pub products: Vec<RegistryProduct>,
    /// Component term that produced `products` (or the first one tried)
    pub search_term_used: String,
    pub was_mapped: bool,
}

pub struct MfdsClient {
    transport: Arc<dyn Transport>,
    cache: Arc<ProductCache>,
    detail_url: String,
    list_url: String,
    service_key: String,
    retry: RetryPolicy,
    page_size: u32,
    max_pages: u32,
    fallback_delay: Duration,
}

impl MfdsClient {
    pub fn new(transport: Arc<dyn Transport>, cache: Arc<ProductCache>, settings: &Settings) -> Self {
        Self {
            transport,
            cache,
            detail_url: settings.mfds_detail_url.clone(),
            list_url: settings.mfds_list_url.clone(),
            service_key: settings.mfds_service_key.clone(),
            retry: RetryPolicy::new(settings.retry_attempts, settings.mfds_backoff),
            page_size: settings.page_size.max(1),
            max_pages: settings.max_pages.max(1),
            fallback_delay: settings.fallback_delay,
        }
    }

    /// Look up an effective search term.
    ///
    /// The first `;` component is queried; when it finds nothing and the term
    /// is not a manual override, the remaining components are tried in order
    /// and the first non-empty result wins.
    pub async fn lookup(
        &self,
        term: &SearchTerm,
        include_revoked: bool,
        cancel: &CancellationToken,
    ) -> Result<LookupOutcome, Cancelled> {
        let components = if term.is_override() {
            vec![term.term().trim().to_string()]
        } else {
            split_components(term.term())
        };

        let Some((primary, candidates)) = components.split_first() else {
            return Ok(LookupOutcome {
                was_mapped: term.was_mapped(),
                ..Default::default()
            });
        };

        let products = self.lookup_term(primary, include_revoked, cancel).await?;
        if !products.is_empty() || term.is_override() {
            return Ok(LookupOutcome {
                products,
                search_term_used: primary.clone(),
                was_mapped: term.was_mapped(),
            });
        }

        for candidate in candidates {
            tokio::time::sleep(self.fallback_delay).await;
            cancel.check()?;

            let products = self.lookup_term(candidate, include_revoked, cancel).await?;
            if !products.is_empty() {
                info!(term = term.term(), candidate = %candidate, "multi-ingredient fallback hit");
                return Ok(LookupOutcome {
                    products,
                    search_term_used: candidate.clone(),
                    was_mapped: term.was_mapped(),
                });
            }
        }

        Ok(LookupOutcome {
            products: Vec::new(),
            search_term_used: primary.clone(),
            was_mapped: term.was_mapped(),
        })
    }

    /// One component term, cached per (term, include_revoked)
    async fn lookup_term(
        &self,
        term: &str,
        include_revoked: bool,
        cancel: &CancellationToken,
    ) -> Result<Vec<RegistryProduct>, Cancelled> {
        let key = ProductKey::new(term, include_revoked);
        if let Some(cached) = self.cache.get(&key) {
            debug!(term, include_revoked, count = cached.len(), "product cache hit");
            return Ok(cached);
        }

        self.cache
            .get_or_try_fetch(key, move || async move {
                let mut products = self.search_detail(term, cancel).await?;
                if products.is_empty() {
                    products = self.search_list(term, cancel).await?;
                }

                let total = products.len();
                if !include_revoked {
                    products.retain(|p| !p.is_revoked);
                }
                debug!(
                    term,
                    total,
                    revoked_excluded = total - products.len(),
                    "secondary lookup"
                );
                Ok(products)
            })
            .await
    }

    /// Detailed permit endpoint: page 1, then the remaining pages concurrently.
    async fn search_detail(
        &self,
        term: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<RegistryProduct>, Cancelled> {
        let Some(first) = self.fetch_page(MfdsEndpoint::PermitDetail, term, 1, cancel).await? else {
            return Ok(Vec::new());
        };

        let mut products = first.products;
        let pages = self.page_count(first.total_count);
        if pages > 1 {
            let rest = join_all(
                (2..=pages).map(|page| self.fetch_page(MfdsEndpoint::PermitDetail, term, page, cancel)),
            )
            .await;
            for page in rest {
                if let Some(page) = page? {
                    products.extend(page.products);
                }
            }
        }

        Ok(products)
    }

    /// Simplified list endpoint, first page only
    async fn search_list(
        &self,
        term: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<RegistryProduct>, Cancelled> {
        let page = self.fetch_page(MfdsEndpoint::SimplifiedList, term, 1, cancel).await?;
        Ok(page.map(|page| page.products).unwrap_or_default())
    }

    fn page_count(&self, total_count: u32) -> u32 {
        total_count.div_ceil(self.page_size).min(self.max_pages)
    }

    async fn fetch_page(
        &self,
        endpoint: MfdsEndpoint,
        term: &str,
        page: u32,
        cancel: &CancellationToken,
    ) -> Result<Option<Page>, Cancelled> {
        let url = match endpoint {
            MfdsEndpoint::PermitDetail => &self.detail_url,
            MfdsEndpoint::SimplifiedList => &self.list_url,
        };
        let query = vec![
            ("serviceKey", self.service_key.clone()),
            ("type", "json".to_string()),
            ("numOfRows", self.page_size.to_string()),
            ("pageNo", page.to_string()),
            (endpoint.search_param(), term.to_string()),
        ];

        let transport = self.transport.as_ref();
        let query = &query;
        self.retry
            .run(endpoint.label(), cancel, move || async move {
                let value = transport.get_json(url, query).await?;
                decode_page(endpoint, value)
            })
            .await
    }
}

#[async_trait]
impl ProductSource for MfdsClient {
    async fn lookup(
        &self,
        term: &SearchTerm,
        include_revoked: bool,
        cancel: &CancellationToken,
    ) -> Result<LookupOutcome, Cancelled> {
        MfdsClient::lookup(self, term, include_revoked, cancel).await
    }
}
