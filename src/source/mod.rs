//! Paged feature sources.
//!
//! The retriever talks to the remote service only through [`FeatureSource`],
//! so paging, retry and termination can be exercised without a network.

pub mod arcgis;

pub use arcgis::{ArcGisClient, DEFAULT_QUERY_URL};

use crate::error::FetchError;
use crate::models::FeaturePage;
use async_trait::async_trait;
use std::sync::Arc;

/// Where-clause meaning "no filter".
pub const MATCH_ALL: &str = "1=1";

/// Field selection meaning "every field".
pub const ALL_FIELDS: &str = "*";

/// One bounded slice request against a feature layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageQuery {
    pub where_clause: String,
    pub out_fields: String,
    pub offset: u64,
    pub limit: u64,
}

impl PageQuery {
    /// Query parameters in the order the service documents them.
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("where", self.where_clause.clone()),
            ("outFields", self.out_fields.clone()),
            ("f", "json".to_string()),
            ("resultOffset", self.offset.to_string()),
            ("resultRecordCount", self.limit.to_string()),
        ]
    }
}

/// Which planning authority to restrict a query to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AuthorityFilter {
    #[default]
    All,
    Authority(String),
}

impl AuthorityFilter {
    pub fn from_option(name: Option<String>) -> Self {
        match name {
            Some(name) => AuthorityFilter::Authority(name),
            None => AuthorityFilter::All,
        }
    }

    /// Renders the filter as a where-clause against `field`.
    pub fn where_clause(&self, field: &str) -> String {
        match self {
            AuthorityFilter::All => MATCH_ALL.to_string(),
            AuthorityFilter::Authority(name) => {
                format!("{}='{}'", field, name.replace('\'', "''"))
            }
        }
    }
}

/// A remote source that answers paged feature queries.
#[async_trait]
pub trait FeatureSource: Send + Sync {
    /// Fetch one page. A 429 must surface as [`FetchError::RateLimited`].
    async fn query(&self, query: &PageQuery) -> Result<FeaturePage, FetchError>;
}

#[async_trait]
impl<S: FeatureSource + ?Sized> FeatureSource for Box<S> {
    async fn query(&self, query: &PageQuery) -> Result<FeaturePage, FetchError> {
        (**self).query(query).await
    }
}

#[async_trait]
impl<S: FeatureSource + ?Sized> FeatureSource for Arc<S> {
    async fn query(&self, query: &PageQuery) -> Result<FeaturePage, FetchError> {
        (**self).query(query).await
    }
}
