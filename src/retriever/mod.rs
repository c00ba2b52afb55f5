//! Paginated retrieval of planning-application records.
//!
//! Each request is classified into a [`Step`]:
//! - `Advance`: records appended, offset moves forward, short pause
//! - `Exhausted`: an empty page, the table is complete
//! - `RateLimited`: long pause, same offset retried
//! - `Abort`: loop ends, everything accumulated so far is returned
//!
//! Retrieval never fails outright. Callers inspect [`Completion`] to learn
//! whether the returned table may be incomplete.

pub mod normalize;

pub use normalize::{DateFieldRule, Normalizer};

use crate::error::FetchError;
use crate::models::{Feature, FeaturePage, Table};
use crate::source::{AuthorityFilter, FeatureSource, PageQuery, ALL_FIELDS};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Paging and pacing settings for a retrieval run.
#[derive(Debug, Clone)]
pub struct RetrieveConfig {
    /// Records requested per page.
    pub page_size: u64,
    /// Pause after every successful page.
    pub page_delay: Duration,
    /// Pause after a rate-limit response before retrying.
    pub rate_limit_delay: Duration,
    /// Consecutive rate-limit responses tolerated at one offset. `None` retries forever.
    pub max_rate_limit_retries: Option<u32>,
    /// Field the authority filter applies to.
    pub authority_field: String,
}

impl Default for RetrieveConfig {
    fn default() -> Self {
        Self {
            page_size: 1000,
            page_delay: Duration::from_secs(1),
            rate_limit_delay: Duration::from_secs(10),
            max_rate_limit_retries: None,
            authority_field: "PlanningAuthority".to_string(),
        }
    }
}

/// Classification of one page request.
#[derive(Debug)]
pub enum Step {
    Advance(Vec<Feature>),
    Exhausted,
    RateLimited,
    Abort(FetchError),
}

impl Step {
    pub fn classify(result: Result<FeaturePage, FetchError>) -> Self {
        match result {
            Ok(page) if page.features.is_empty() => Step::Exhausted,
            Ok(page) => Step::Advance(page.features),
            Err(e) if e.is_rate_limit() => Step::RateLimited,
            Err(e) => Step::Abort(e),
        }
    }
}

/// How a paging run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    /// The service returned an empty page.
    Exhausted,
    /// An unrecoverable request failure cut the run short.
    Aborted(FetchError),
}

/// Snapshot handed to the progress callback after each page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageProgress {
    /// 1-based count of successful pages.
    pub page: usize,
    /// Offset the page was requested at.
    pub offset: u64,
    /// Features on this page.
    pub fetched: usize,
    /// Records accumulated so far.
    pub total: usize,
}

/// Result of a retrieval run.
#[derive(Debug, Clone)]
pub struct Retrieval {
    pub table: Table,
    pub pages: usize,
    pub completion: Completion,
}

impl Retrieval {
    pub fn is_complete(&self) -> bool {
        self.completion == Completion::Exhausted
    }
}

/// Result of a counting run.
#[derive(Debug, Clone, PartialEq)]
pub struct Count {
    pub records: u64,
    pub pages: usize,
    pub completion: Completion,
}

struct Paging {
    pages: usize,
    completion: Completion,
}

type ProgressCallback = Box<dyn Fn(&PageProgress) + Send + Sync>;

/// Drives paged queries against a [`FeatureSource`].
pub struct Retriever<S> {
    source: S,
    config: RetrieveConfig,
    normalizer: Normalizer,
    on_page: Option<ProgressCallback>,
}

impl<S: FeatureSource> Retriever<S> {
    pub fn new(source: S, config: RetrieveConfig) -> Self {
        Self {
            source,
            config,
            normalizer: Normalizer::default(),
            on_page: None,
        }
    }

    /// Replace the date-field rule used during normalization.
    pub fn with_date_rule(mut self, rule: DateFieldRule) -> Self {
        self.normalizer = Normalizer::new(rule);
        self
    }

    /// Register a callback invoked after every successful page.
    pub fn on_page<F>(mut self, callback: F) -> Self
    where
        F: Fn(&PageProgress) + Send + Sync + 'static,
    {
        self.on_page = Some(Box::new(callback));
        self
    }

    /// Fetch every matching record into a fresh table.
    pub async fn retrieve(&self, filter: &AuthorityFilter) -> Retrieval {
        self.retrieve_into(filter, Table::new()).await
    }

    /// Fetch every matching record, appending to `table`.
    pub async fn retrieve_into(&self, filter: &AuthorityFilter, mut table: Table) -> Retrieval {
        info!("About to begin fetching records (this could take a few minutes)");

        let template = self.page_template(filter, ALL_FIELDS);
        let paging = self
            .drive(template, |features| {
                for feature in features {
                    table.push(self.normalizer.normalize(feature));
                }
                table.len()
            })
            .await;

        info!(
            "Retrieved {} records over {} pages",
            table.len(),
            paging.pages
        );

        Retrieval {
            table,
            pages: paging.pages,
            completion: paging.completion,
        }
    }

    /// Count matching records without keeping them.
    ///
    /// Only the authority field is requested, which keeps pages small.
    pub async fn count(&self, filter: &AuthorityFilter) -> Count {
        let mut records: u64 = 0;
        let template = self.page_template(filter, &self.config.authority_field);
        let paging = self
            .drive(template, |features| {
                records += features.len() as u64;
                records as usize
            })
            .await;

        info!("Counted {} records over {} pages", records, paging.pages);

        Count {
            records,
            pages: paging.pages,
            completion: paging.completion,
        }
    }

    fn page_template(&self, filter: &AuthorityFilter, out_fields: &str) -> PageQuery {
        PageQuery {
            where_clause: filter.where_clause(&self.config.authority_field),
            out_fields: out_fields.to_string(),
            offset: 0,
            limit: self.config.page_size,
        }
    }

    /// Runs the paging loop, handing each non-empty page to `sink`.
    ///
    /// `sink` returns the running record total for progress reporting.
    async fn drive<F>(&self, template: PageQuery, mut sink: F) -> Paging
    where
        F: FnMut(Vec<Feature>) -> usize,
    {
        let mut offset: u64 = 0;
        let mut pages: usize = 0;
        let mut rate_limited: u32 = 0;

        loop {
            let query = PageQuery {
                offset,
                ..template.clone()
            };
            debug!("Requesting offset {}", offset);

            match Step::classify(self.source.query(&query).await) {
                Step::Exhausted => {
                    debug!("Empty page at offset {}, done", offset);
                    return Paging {
                        pages,
                        completion: Completion::Exhausted,
                    };
                }
                Step::Advance(features) => {
                    rate_limited = 0;
                    pages += 1;
                    let fetched = features.len();
                    let total = sink(features);

                    info!("Received {} records", total);
                    if let Some(ref callback) = self.on_page {
                        callback(&PageProgress {
                            page: pages,
                            offset,
                            fetched,
                            total,
                        });
                    }

                    offset += self.config.page_size;
                    pause(self.config.page_delay).await;
                }
                Step::RateLimited => {
                    rate_limited += 1;
                    if let Some(max) = self.config.max_rate_limit_retries {
                        if rate_limited > max {
                            warn!(
                                "Rate limited {} times at offset {}, giving up",
                                rate_limited, offset
                            );
                            return Paging {
                                pages,
                                completion: Completion::Aborted(FetchError::RateLimited),
                            };
                        }
                    }
                    warn!(
                        "Rate limit hit, waiting {:?} before retrying offset {}",
                        self.config.rate_limit_delay, offset
                    );
                    pause(self.config.rate_limit_delay).await;
                }
                Step::Abort(e) => {
                    warn!("Error fetching offset {}: {}. Returning partial results.", offset, e);
                    return Paging {
                        pages,
                        completion: Completion::Aborted(e),
                    };
                }
            }
        }
    }
}

async fn pause(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}
