//! Alert records, filters, and wire envelopes shared by both clients.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single security alert as returned by either service.
///
/// Alerts are heterogeneous field-name to value maps; nothing beyond the
/// identifying fields is interpreted. HSDB keeps `alert_id` and `status` at
/// the top level, Orca nests them under `state` — the accessors handle both.
/// Records are immutable once fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlertRecord(Map<String, Value>);

impl AlertRecord {
    /// The alert's identity within its source.
    #[must_use]
    pub fn alert_id(&self) -> Option<&str> {
        self.lookup("alert_id")
    }

    /// The alert's lifecycle status (e.g. "open", "in_progress").
    #[must_use]
    pub fn status(&self) -> Option<&str> {
        self.lookup("status")
    }

    /// All fields exactly as received.
    #[must_use]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    fn lookup(&self, key: &str) -> Option<&str> {
        if let Some(value) = self.0.get(key).and_then(Value::as_str) {
            return Some(value);
        }
        self.0
            .get("state")
            .and_then(Value::as_object)
            .and_then(|state| state.get(key))
            .and_then(Value::as_str)
    }
}

impl From<Map<String, Value>> for AlertRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

/// Optional equality filters for the HSDB alert listing.
///
/// Absent filters impose no constraint. `query_pairs` emits exactly the
/// parameters whose values were provided, in a stable order.
#[derive(Debug, Clone, Default)]
pub struct AlertFilters {
    pub status: Option<String>,
    pub alert_id: Option<String>,
    pub type_string: Option<String>,
    pub cloud_id: Option<String>,
    pub orca_score: Option<String>,
    pub risk_level: Option<String>,
}

impl AlertFilters {
    /// Query parameters for the provided filters, in declaration order.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(&'static str, &str)> {
        let mut pairs = Vec::new();
        if let Some(value) = self.status.as_deref() {
            pairs.push(("status", value));
        }
        if let Some(value) = self.alert_id.as_deref() {
            pairs.push(("alert_id", value));
        }
        if let Some(value) = self.type_string.as_deref() {
            pairs.push(("type_string", value));
        }
        if let Some(value) = self.cloud_id.as_deref() {
            pairs.push(("cloud_id", value));
        }
        if let Some(value) = self.orca_score.as_deref() {
            pairs.push(("orca_score", value));
        }
        if let Some(value) = self.risk_level.as_deref() {
            pairs.push(("risk_level", value));
        }
        pairs
    }
}

/// One clause of an Orca DSL filter: `field` must take one of `includes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterClause {
    pub field: String,
    pub includes: Vec<String>,
}

/// Declarative Orca query filter; clauses are combined with logical AND.
///
/// The fetch layer never mutates a filter it is handed. Extension is
/// non-destructive: [`DslFilter::including`] returns a new filter with the
/// extra clause appended.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DslFilter {
    pub filter: Vec<FilterClause>,
}

impl DslFilter {
    /// The standing reconciliation filter: only alerts raised by
    /// custom-sourced rules.
    #[must_use]
    pub fn custom_rules() -> Self {
        Self {
            filter: vec![FilterClause {
                field: "state.rule_source".to_string(),
                includes: vec!["Custom".to_string()],
            }],
        }
    }

    /// A copy of this filter with one more clause appended.
    #[must_use]
    pub fn including<I, S>(&self, field: &str, includes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut extended = self.clone();
        extended.filter.push(FilterClause {
            field: field.to_string(),
            includes: includes.into_iter().map(Into::into).collect(),
        });
        extended
    }
}

/// One page of the HSDB alert listing.
#[derive(Debug, Deserialize)]
pub struct AlertPage {
    /// Alerts on this page, in server order.
    #[serde(default)]
    pub results: Vec<AlertRecord>,
    /// Full URL of the next page; `None` ends the listing.
    #[serde(default)]
    pub next: Option<String>,
}

/// Request body for the Orca `/query/alerts` endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct AlertQuery {
    pub limit: u32,
    pub dsl_filter: DslFilter,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

/// One page of an Orca alert query.
#[derive(Debug, Deserialize)]
pub struct AlertQueryPage {
    /// Alerts on this page, in server order.
    #[serde(default)]
    pub data: Vec<AlertRecord>,
    /// Continuation token; its absence ends the query.
    #[serde(default)]
    pub next_page_token: Option<String>,
    /// Server-reported total for the whole query, when provided.
    #[serde(default)]
    pub total_items: Option<u64>,
}
