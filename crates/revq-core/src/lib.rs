//! revq: review-grounded product question answering.
//!
//! The crate is the whole answering pipeline behind the HTTP boundary:
//! identifier resolution, the answer cache, review fetching and ranking,
//! prompt assembly, generation post-processing, and best-effort persistence.
//! Every external collaborator sits behind a trait, so the full flow runs
//! against in-memory fakes in tests.
//!
//! Entry point: build a [`pipeline::Pipeline`] from the adapters in
//! [`reviews`], [`scrape`], [`generate`], [`store`] and a
//! [`cache::CacheGateway`], then call [`pipeline::Pipeline::answer`] with a
//! validated [`request::QARequest`].

pub mod cache;
pub mod config;
pub mod customers;
pub mod generate;
pub mod hashing;
pub mod pipeline;
pub mod prompt;
pub mod ranking;
pub mod request;
pub mod resolver;
pub mod response;
pub mod reviews;
pub mod scrape;
pub mod store;

pub use cache::CacheGateway;
pub use config::Config;
pub use generate::Confidence;
pub use pipeline::{Pipeline, PipelineError, RequestMeta};
pub use request::QARequest;
pub use response::{CacheStatus, QAResponse, REVQ_CACHE_HEADER};
