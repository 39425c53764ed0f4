//! Client for the HSDB Orca-compliance alert listing.

use std::sync::Arc;

use reqwest::StatusCode;
use tracing::{info, warn};

use crate::error::Error;
use crate::transport::HsdbTransport;
use crate::types::{AlertFilters, AlertPage, AlertRecord};

/// Default number of alerts requested per page.
pub const DEFAULT_PAGE_SIZE: u32 = 1000;

/// Default page interval between progress reports.
pub const DEFAULT_PROGRESS_EVERY: u32 = 5;

/// Client for the paginated HSDB alert listing.
pub struct HsdbClient {
    transport: Arc<HsdbTransport>,
    progress_every: u32,
}

impl HsdbClient {
    /// Create a new listing client.
    pub fn new(transport: Arc<HsdbTransport>) -> Self {
        Self {
            transport,
            progress_every: DEFAULT_PROGRESS_EVERY,
        }
    }

    /// Report download progress every `pages` pages instead of the default.
    #[must_use]
    pub fn with_progress_every(mut self, pages: u32) -> Self {
        self.progress_every = pages.max(1);
        self
    }

    /// Build the first listing URL for the given filters.
    ///
    /// The query string contains `page_size` and `page`, then exactly the
    /// filters whose values were provided, in stable order.
    fn listing_url(&self, filters: &AlertFilters, page_size: u32) -> String {
        let mut url = format!(
            "{}/compliance/orca/?page_size={page_size}&page=1",
            self.transport.base_url()
        );
        for (key, value) in filters.query_pairs() {
            url.push('&');
            url.push_str(key);
            url.push('=');
            url.push_str(value);
        }
        url
    }

    /// Drain the listing into a single vector, following `next` links until
    /// the server stops providing one.
    ///
    /// Partial-success contract: a non-200 page response logs the failure
    /// and stops the walk; everything fetched up to that point is returned.
    /// Callers that need a complete result must decide for themselves
    /// whether a partial one is acceptable. Authentication failures are
    /// fatal and propagate as errors.
    ///
    /// Records are yielded in server-provided page order with no client-side
    /// dedup; an alert the server repeats across pages appears twice.
    pub async fn fetch_all(
        &self,
        filters: &AlertFilters,
        page_size: u32,
    ) -> Result<Vec<AlertRecord>, Error> {
        let mut alerts = Vec::new();
        let mut next_url = Some(self.listing_url(filters, page_size));
        let mut pages: u32 = 0;

        info!("downloading HSDB alerts");
        while let Some(url) = next_url.take() {
            let response = self.transport.get(&url).await?;
            let status = response.status();

            if status != StatusCode::OK {
                let body = response.text().await.unwrap_or_default();
                warn!(
                    status = status.as_u16(),
                    body = %body,
                    "error retrieving HSDB alerts, stopping with partial results"
                );
                break;
            }

            let page: AlertPage = response
                .json()
                .await
                .map_err(|e| Error::Http(format!("failed to parse listing page: {e}")))?;

            alerts.extend(page.results);
            next_url = page.next;

            pages += 1;
            if pages % self.progress_every == 0 {
                info!(pages, alerts = alerts.len(), "download progress");
            }
        }

        info!(pages, alerts = alerts.len(), "HSDB download finished");
        Ok(alerts)
    }
}
