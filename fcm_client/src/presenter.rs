//! Holding on to the latest clustering result for display.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Whatever the clustering service sent back. We don't depend on its shape,
/// but see `ClusteringResult::summary` for the usual case.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ClusteringResult(pub Value);

impl ClusteringResult {
    /// The raw JSON value.
    pub fn as_json(&self) -> &Value {
        &self.0
    }

    /// Try to interpret this result as the service's usual response.
    /// Returns `None` if the response has some other shape.
    pub fn summary(&self) -> Option<ClusteringSummary> {
        serde_json::from_value(self.0.clone()).ok()
    }
}

/// The response produced by the reference clustering service.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ClusteringSummary {
    /// One row of coordinates per cluster.
    pub centers: Vec<Vec<f64>>,

    /// The final membership matrix: one row per cluster, one column per
    /// data point.
    pub updated_u: Vec<Vec<f64>>,

    /// The cluster each data point was finally assigned to, keyed by the
    /// point's index. JSON object keys are always strings, so the index
    /// arrives as one.
    pub data_point_cluster_map: BTreeMap<String, usize>,
}

impl ClusteringSummary {
    /// How many data points were assigned to each cluster.
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.centers.len()];
        for &cluster in self.data_point_cluster_map.values() {
            if cluster >= sizes.len() {
                sizes.resize(cluster + 1, 0);
            }
            sizes[cluster] += 1;
        }
        sizes
    }
}

/// A result, plus when we received it.
#[derive(Clone, Debug)]
pub struct PresentedResult {
    /// The result itself.
    pub result: ClusteringResult,
    /// When `ResultPresenter::show` was called.
    pub shown_at: DateTime<Utc>,
}

/// Holds the most recent successful result, if any.
#[derive(Clone, Debug, Default)]
pub struct ResultPresenter {
    current: Option<PresentedResult>,
}

impl ResultPresenter {
    /// Create an empty presenter.
    pub fn new() -> ResultPresenter {
        ResultPresenter::default()
    }

    /// Replace whatever we're showing with `result`.
    pub fn show(&mut self, result: ClusteringResult) -> &ClusteringResult {
        let presented = self.current.insert(PresentedResult {
            result,
            shown_at: Utc::now(),
        });
        &presented.result
    }

    /// Stop showing anything.
    pub fn clear(&mut self) {
        self.current = None;
    }

    /// The result we're showing, if any.
    pub fn current(&self) -> Option<&ClusteringResult> {
        self.current.as_ref().map(|presented| &presented.result)
    }

    /// The result we're showing, with its timestamp.
    pub fn presented(&self) -> Option<&PresentedResult> {
        self.current.as_ref()
    }

    /// Render the current result as indented JSON, or `None` if there is
    /// nothing to show.
    pub fn render(&self) -> Option<String> {
        self.current()
            .and_then(|result| serde_json::to_string_pretty(result.as_json()).ok())
    }
}

#[cfg(test)]
fn sample_response() -> Value {
    serde_json::json!({
        "centers": [[1.0, 2.0], [8.0, 9.0]],
        "updated_u": [[0.9, 0.8, 0.1], [0.1, 0.2, 0.9]],
        "data_point_cluster_map": {"0": 0, "1": 0, "2": 1},
    })
}

#[test]
fn show_replaces_and_clear_resets() {
    let mut presenter = ResultPresenter::new();
    assert!(presenter.current().is_none());
    assert!(presenter.render().is_none());

    presenter.show(ClusteringResult(serde_json::json!({"first": true})));
    presenter.show(ClusteringResult(sample_response()));
    assert_eq!(presenter.current().unwrap().as_json(), &sample_response());
    assert!(presenter.render().unwrap().contains("\"centers\""));

    presenter.clear();
    assert!(presenter.current().is_none());
}

#[test]
fn summary_reads_usual_response() {
    let summary = ClusteringResult(sample_response()).summary().unwrap();
    assert_eq!(summary.centers.len(), 2);
    assert_eq!(summary.updated_u[1], vec![0.1, 0.2, 0.9]);
    assert_eq!(summary.cluster_sizes(), vec![2, 1]);
}

#[test]
fn summary_is_optional() {
    let result = ClusteringResult(serde_json::json!({"status": "queued"}));
    assert!(result.summary().is_none());
}
