//! Client for the Orca alert query endpoint.

use std::sync::Arc;

use reqwest::StatusCode;

use crate::error::Error;
use crate::transport::OrcaTransport;
use crate::types::{AlertQuery, AlertQueryPage, AlertRecord, DslFilter};

/// API path of the alert query endpoint.
pub const QUERY_ALERTS_PATH: &str = "/query/alerts";

/// Default number of alerts requested per page.
pub const DEFAULT_PAGE_SIZE: u32 = 1000;

/// Client for the POST-based Orca `/query/alerts` endpoint.
pub struct OrcaClient {
    transport: Arc<OrcaTransport>,
}

impl OrcaClient {
    /// Create a new query client.
    pub fn new(transport: Arc<OrcaTransport>) -> Self {
        Self { transport }
    }

    /// Start a paged query for alerts matching `dsl_filter`.
    ///
    /// The returned pager is a finite, non-restartable sequence: every
    /// [`AlertPager::next_page`] call is one side-effecting POST, and pages
    /// cannot be replayed once consumed.
    #[must_use]
    pub fn query(&self, dsl_filter: DslFilter, page_size: u32) -> AlertPager {
        AlertPager {
            transport: Arc::clone(&self.transport),
            body: AlertQuery {
                limit: page_size,
                dsl_filter,
                next_page_token: None,
            },
            total_items: None,
            done: false,
        }
    }
}

/// Lazy pull-based pager over an Orca alert query.
///
/// Continuation is driven by the `next_page_token` the server returns with
/// each page; a page without one is the last.
pub struct AlertPager {
    transport: Arc<OrcaTransport>,
    body: AlertQuery,
    total_items: Option<u64>,
    done: bool,
}

impl AlertPager {
    /// Fetch the next page of alerts, or `None` once the query is drained.
    ///
    /// A non-200 response ends the pager and surfaces as [`Error::Fetch`];
    /// whatever pages were already consumed remain with the caller.
    pub async fn next_page(&mut self) -> Result<Option<Vec<AlertRecord>>, Error> {
        if self.done {
            return Ok(None);
        }

        let response = self.transport.post_json(QUERY_ALERTS_PATH, &self.body).await?;
        let status = response.status();

        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            self.done = true;
            return Err(Error::Fetch {
                status: status.as_u16(),
                body,
            });
        }

        let page: AlertQueryPage = response
            .json()
            .await
            .map_err(|e| Error::Http(format!("failed to parse query page: {e}")))?;

        if self.total_items.is_none() {
            self.total_items = page.total_items;
        }

        match page.next_page_token {
            Some(token) => self.body.next_page_token = Some(token),
            None => self.done = true,
        }

        Ok(Some(page.data))
    }

    /// Server-reported total for the query, when a page has carried one.
    #[must_use]
    pub fn total_items(&self) -> Option<u64> {
        self.total_items
    }
}
