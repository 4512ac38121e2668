//! A client for a remote fuzzy c-means clustering service.
//!
//! The service accepts a dataset as delimited text, plus parameters that
//! depend on which flavor of fuzzy c-means you want: plain (unsupervised),
//! semi-supervised, or entropy-regularized. This library collects those
//! parameters, builds a request containing exactly the fields the chosen
//! variant accepts, submits it, and keeps the latest result around for
//! display.
//!
//! ```no_run
//! use fcm_client::{AlgorithmVariant, Client, Field, Session};
//!
//! # #[tokio::main]
//! # async fn main() -> fcm_client::Result<()> {
//! #
//! let client = Client::new("http://127.0.0.1:5000/run_fcm")?;
//!
//! let mut session = Session::new();
//! let input = session.collector_mut();
//! input.set_dataset_text("1,2\n1,3\n8,9\n9,9\n");
//! input.set_variant(AlgorithmVariant::SemiSupervised);
//! input.set_field(Field::Clusters, "2")?;
//! input.set_field(Field::Alpha, "0.3")?;
//! input.set_supervised_membership_text("[[1, 1, 0, 0], [0, 0, 1, 1]]");
//!
//! let result = session.submit(&client).await?;
//! println!("{}", result.as_json());
//! #
//! #   Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub use client::{Client, ClientOptions, Submit, DEFAULT_ENDPOINT, ENDPOINT_ENV_VAR};
pub use collector::{read_dataset, Field, FileSelection, InputCollector, RequestParameters};
pub use errors::*;
pub use payload::{build, ClusteringRequest, VariantFields};
pub use presenter::{ClusteringResult, ClusteringSummary, PresentedResult, ResultPresenter};
pub use session::{submit_shared, FailureReport, PendingSubmission, Session, SubmissionState};
pub use variant::AlgorithmVariant;

mod client;
pub mod collector;
mod errors;
pub mod payload;
mod presenter;
mod session;
mod variant;
