//! Planning-application retrieval and decision statistics.
//!
//! - [`retriever`] pages through a feature service into a [`models::Table`]
//! - [`analysis`] reduces that table to per-year decision rates
//! - [`report`] renders or exports either of them

pub mod analysis;
pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod report;
pub mod retriever;
pub mod source;

pub use analysis::{aggregate, yearly_stats, StatFields};
pub use error::{CoercionError, FetchError};
pub use models::{Decision, Record, Table, YearlyStat};
pub use retriever::{Completion, Retrieval, RetrieveConfig, Retriever};
pub use source::{AuthorityFilter, FeatureSource};
