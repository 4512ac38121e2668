//! Collecting the dataset and tuning parameters entered by a user.
//!
//! An `InputCollector` is updated by discrete edits: a variant selection, a
//! numeric field typed as text, a file chosen from disk. It never throws away
//! values that the current variant doesn't use; the payload builder decides
//! what actually gets sent.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokio::fs;
use tracing::{debug, trace};

use crate::errors::*;
use crate::variant::AlgorithmVariant;

/// A numeric parameter that a user can edit.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Field {
    /// The number of clusters to find.
    Clusters,
    /// The fuzziness coefficient, `m`.
    Fuzziness,
    /// The convergence threshold, `eps`.
    Epsilon,
    /// The maximum number of iterations, `lmax`.
    MaxIterations,
    /// The weight given to supervised membership data.
    Alpha,
    /// The weight given to entropy regularization.
    Beta,
}

impl Field {
    /// Every editable numeric field.
    pub const ALL: [Field; 6] = [
        Field::Clusters,
        Field::Fuzziness,
        Field::Epsilon,
        Field::MaxIterations,
        Field::Alpha,
        Field::Beta,
    ];

    /// The key used for this field in a clustering request.
    pub fn wire_name(self) -> &'static str {
        match self {
            Field::Clusters => "clusters",
            Field::Fuzziness => "m",
            Field::Epsilon => "eps",
            Field::MaxIterations => "lmax",
            Field::Alpha => "alpha",
            Field::Beta => "beta",
        }
    }

    /// The inclusive range of values the service is designed for.
    pub fn range(self) -> (f64, f64) {
        match self {
            Field::Clusters => (2.0, 100.0),
            Field::Fuzziness => (1.1, 5.0),
            Field::Epsilon => (0.001, 0.1),
            Field::MaxIterations => (10.0, 100.0),
            Field::Alpha => (0.0, 1.0),
            Field::Beta => (0.0, 5.0),
        }
    }

    /// Is this field only meaningful for some variants?
    pub fn is_relevant_to(self, variant: AlgorithmVariant) -> bool {
        match self {
            Field::Alpha => variant.is_supervised(),
            Field::Beta => variant.is_entropy_regularized(),
            _ => true,
        }
    }

    fn is_integer(self) -> bool {
        matches!(self, Field::Clusters | Field::MaxIterations)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "{}", self.wire_name())
    }
}

impl FromStr for Field {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        match name.trim() {
            "clusters" => Ok(Field::Clusters),
            "m" | "fuzziness" => Ok(Field::Fuzziness),
            "eps" | "epsilon" => Ok(Field::Epsilon),
            "lmax" | "max_iterations" | "max-iterations" => Ok(Field::MaxIterations),
            "alpha" => Ok(Field::Alpha),
            "beta" => Ok(Field::Beta),
            _ => Err(Error::UnknownField {
                name: name.to_owned(),
            }),
        }
    }
}

/// Everything a user has entered, prior to building a request.
#[derive(Clone, Debug, PartialEq)]
pub struct RequestParameters {
    /// Delimited numeric data, usually the contents of a CSV file.
    pub dataset_text: String,
    /// The number of clusters to find.
    pub clusters: u32,
    /// The fuzziness coefficient, `m`.
    pub fuzziness: f64,
    /// The convergence threshold.
    pub epsilon: f64,
    /// The maximum number of iterations.
    pub max_iterations: u32,
    /// Weight for supervised information. Not used by unsupervised FCM.
    pub alpha: f64,
    /// Weight for entropy regularization. Only used by entropy-regularized
    /// FCM.
    pub beta: f64,
    /// A membership matrix encoded as JSON. Empty means "none". Not used by
    /// unsupervised FCM.
    pub supervised_membership_text: String,
}

impl RequestParameters {
    /// Get a numeric field as an `f64`.
    pub fn get(&self, field: Field) -> f64 {
        match field {
            Field::Clusters => f64::from(self.clusters),
            Field::Fuzziness => self.fuzziness,
            Field::Epsilon => self.epsilon,
            Field::MaxIterations => f64::from(self.max_iterations),
            Field::Alpha => self.alpha,
            Field::Beta => self.beta,
        }
    }

    /// Set a numeric field from raw text, coercing it to the field's type.
    ///
    /// Out-of-range values are accepted here; use `out_of_range` to report
    /// them. Text that isn't a finite number of the right type is rejected,
    /// and the field keeps its previous value.
    pub fn set_from_str(&mut self, field: Field, raw: &str) -> Result<()> {
        let text = raw.trim();
        if field.is_integer() {
            let value = text
                .parse::<u32>()
                .map_err(|_| Error::invalid_number(field, raw, "a whole number"))?;
            match field {
                Field::Clusters => self.clusters = value,
                _ => self.max_iterations = value,
            }
        } else {
            let value = text
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| Error::invalid_number(field, raw, "a finite number"))?;
            match field {
                Field::Fuzziness => self.fuzziness = value,
                Field::Epsilon => self.epsilon = value,
                Field::Alpha => self.alpha = value,
                _ => self.beta = value,
            }
        }
        trace!("set {} = {}", field, self.get(field));
        Ok(())
    }

    /// Report every field relevant to `variant` that lies outside its
    /// declared domain. These are advisory: nothing stops a user from
    /// submitting them anyway.
    pub fn out_of_range(&self, variant: AlgorithmVariant) -> Vec<Error> {
        Field::ALL
            .iter()
            .copied()
            .filter(|field| field.is_relevant_to(variant))
            .filter_map(|field| {
                let value = self.get(field);
                let (min, max) = field.range();
                if value >= min && value <= max {
                    None
                } else {
                    Some(Error::OutOfRange {
                        field,
                        value,
                        min,
                        max,
                    })
                }
            })
            .collect()
    }
}

impl Default for RequestParameters {
    fn default() -> Self {
        Self {
            dataset_text: String::new(),
            clusters: 2,
            fuzziness: 2.0,
            epsilon: 0.01,
            max_iterations: 50,
            alpha: 0.5,
            beta: 1.0,
            supervised_membership_text: String::new(),
        }
    }
}

/// A file read which has been started but not yet applied. Hand it back to
/// `InputCollector::complete_file_selection` once the read resolves.
#[derive(Debug)]
pub struct FileSelection {
    generation: u64,
    path: PathBuf,
}

impl FileSelection {
    /// The file being read.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Holds the current variant and parameters, updated by user edits.
#[derive(Clone, Debug, Default)]
pub struct InputCollector {
    variant: AlgorithmVariant,
    parameters: RequestParameters,
    /// The file whose contents are in `dataset_text`, if any.
    dataset_path: Option<PathBuf>,
    /// Bumped every time a new file is selected, so that stale reads can be
    /// recognized and dropped.
    selection_generation: u64,
}

impl InputCollector {
    /// Create a collector with the default variant and parameters.
    pub fn new() -> InputCollector {
        InputCollector::default()
    }

    /// The currently selected variant.
    pub fn variant(&self) -> AlgorithmVariant {
        self.variant
    }

    /// Choose a variant. Values for parameters the new variant doesn't use
    /// are kept, so switching back restores them.
    pub fn set_variant(&mut self, variant: AlgorithmVariant) {
        debug!("variant: {}", variant);
        self.variant = variant;
    }

    /// The parameters entered so far.
    pub fn parameters(&self) -> &RequestParameters {
        &self.parameters
    }

    /// Mutable access to the parameters, for callers which already have
    /// typed values.
    pub fn parameters_mut(&mut self) -> &mut RequestParameters {
        &mut self.parameters
    }

    /// Set a numeric field from text typed by the user.
    pub fn set_field(&mut self, field: Field, raw: &str) -> Result<()> {
        self.parameters.set_from_str(field, raw)
    }

    /// Set the supervised membership matrix, as JSON text. It isn't parsed
    /// until a request is built.
    pub fn set_supervised_membership_text<S: Into<String>>(&mut self, text: S) {
        self.parameters.supervised_membership_text = text.into();
    }

    /// Set the dataset directly from text. Any file read still in progress
    /// is superseded and will be discarded when it finishes.
    pub fn set_dataset_text<S: Into<String>>(&mut self, text: S) {
        self.selection_generation += 1;
        self.parameters.dataset_text = text.into();
        self.dataset_path = None;
    }

    /// The file the current dataset was loaded from, if any.
    pub fn dataset_path(&self) -> Option<&Path> {
        self.dataset_path.as_deref()
    }

    /// Advisory range checks for the current variant.
    pub fn validate(&self) -> Vec<Error> {
        self.parameters.out_of_range(self.variant)
    }

    /// Start selecting a new dataset file. Any selection that is still
    /// being read becomes stale.
    pub fn begin_file_selection<P: Into<PathBuf>>(&mut self, path: P) -> FileSelection {
        self.selection_generation += 1;
        let selection = FileSelection {
            generation: self.selection_generation,
            path: path.into(),
        };
        debug!(
            "selecting {} (generation {})",
            selection.path.display(),
            selection.generation,
        );
        selection
    }

    /// Apply the result of reading `selection`. Returns `Ok(true)` if the
    /// dataset was updated, and `Ok(false)` if a newer selection has been
    /// made since this one started. A failed read leaves the current dataset
    /// untouched.
    pub fn complete_file_selection(
        &mut self,
        selection: FileSelection,
        contents: Result<String>,
    ) -> Result<bool> {
        if selection.generation != self.selection_generation {
            debug!(
                "discarding stale read of {} (generation {}, current {})",
                selection.path.display(),
                selection.generation,
                self.selection_generation,
            );
            return Ok(false);
        }
        let text = contents?;
        debug!("loaded {} bytes from {}", text.len(), selection.path.display());
        self.parameters.dataset_text = text;
        self.dataset_path = Some(selection.path);
        Ok(true)
    }

    /// Read `path` and use its contents as the dataset.
    pub async fn select_file<P: Into<PathBuf>>(&mut self, path: P) -> Result<()> {
        let selection = self.begin_file_selection(path);
        let contents = read_dataset(selection.path()).await;
        self.complete_file_selection(selection, contents)?;
        Ok(())
    }
}

/// Read a delimited-text dataset fully into memory.
pub async fn read_dataset(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .await
        .map_err(|err| Error::could_not_read_file(path, err))
}

#[test]
fn defaults_match_form_initial_values() {
    let params = RequestParameters::default();
    assert_eq!(params.clusters, 2);
    assert_eq!(params.fuzziness, 2.0);
    assert_eq!(params.epsilon, 0.01);
    assert_eq!(params.max_iterations, 50);
    assert_eq!(params.alpha, 0.5);
    assert_eq!(params.beta, 1.0);
    assert!(params.dataset_text.is_empty());
    assert!(params.supervised_membership_text.is_empty());
    assert!(params.out_of_range(AlgorithmVariant::EntropyRegularized).is_empty());
}

#[test]
fn set_from_str_coerces_and_rejects() {
    let mut params = RequestParameters::default();
    params.set_from_str(Field::Clusters, " 7 ").unwrap();
    params.set_from_str(Field::Fuzziness, "1.5").unwrap();
    params.set_from_str(Field::MaxIterations, "80").unwrap();
    assert_eq!(params.clusters, 7);
    assert_eq!(params.fuzziness, 1.5);
    assert_eq!(params.max_iterations, 80);

    for &(field, raw) in &[
        (Field::Clusters, "3.5"),
        (Field::Clusters, "-2"),
        (Field::Epsilon, "NaN"),
        (Field::Beta, "inf"),
        (Field::Alpha, ""),
    ] {
        let err = params.set_from_str(field, raw).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation, "{} = {:?}", field, raw);
    }
    // Rejected edits leave the previous value alone.
    assert_eq!(params.clusters, 7);
    assert_eq!(params.epsilon, 0.01);
}

#[test]
fn out_of_range_is_advisory_and_variant_aware() {
    let mut params = RequestParameters::default();
    params.set_from_str(Field::Clusters, "500").unwrap();
    params.set_from_str(Field::Beta, "9").unwrap();
    assert_eq!(params.clusters, 500);

    let fields = |variant| {
        params
            .out_of_range(variant)
            .into_iter()
            .map(|err| match err {
                Error::OutOfRange { field, .. } => field,
                other => panic!("unexpected error {}", other),
            })
            .collect::<Vec<_>>()
    };
    assert_eq!(fields(AlgorithmVariant::Unsupervised), vec![Field::Clusters]);
    assert_eq!(fields(AlgorithmVariant::SemiSupervised), vec![Field::Clusters]);
    assert_eq!(
        fields(AlgorithmVariant::EntropyRegularized),
        vec![Field::Clusters, Field::Beta]
    );
}

#[test]
fn field_names_round_trip() {
    for &field in &Field::ALL {
        assert_eq!(field.wire_name().parse::<Field>().unwrap(), field);
    }
    assert_eq!("epsilon".parse::<Field>().unwrap(), Field::Epsilon);
    assert!("gamma".parse::<Field>().is_err());
}

#[test]
fn switching_variant_keeps_supervised_values() {
    let mut collector = InputCollector::new();
    collector.set_variant(AlgorithmVariant::EntropyRegularized);
    collector.set_field(Field::Alpha, "0.25").unwrap();
    collector.set_field(Field::Beta, "3").unwrap();
    collector.set_supervised_membership_text("[[1, 0]]");

    collector.set_variant(AlgorithmVariant::Unsupervised);
    assert_eq!(collector.parameters().alpha, 0.25);
    assert_eq!(collector.parameters().beta, 3.0);
    assert_eq!(collector.parameters().supervised_membership_text, "[[1, 0]]");
}

#[test]
fn stale_file_reads_are_discarded() {
    let mut collector = InputCollector::new();
    let first = collector.begin_file_selection("first.csv");
    let second = collector.begin_file_selection("second.csv");

    // The second read finishes first; the late first read must not win.
    assert!(collector
        .complete_file_selection(second, Ok("3,4\n".to_owned()))
        .unwrap());
    assert!(!collector
        .complete_file_selection(first, Ok("1,2\n".to_owned()))
        .unwrap());
    assert_eq!(collector.parameters().dataset_text, "3,4\n");
    assert_eq!(collector.dataset_path(), Some(Path::new("second.csv")));
}

#[test]
fn typed_dataset_supersedes_pending_read() {
    let mut collector = InputCollector::new();
    let selection = collector.begin_file_selection("slow.csv");
    collector.set_dataset_text("5,6\n");

    assert!(!collector
        .complete_file_selection(selection, Ok("1,2\n".to_owned()))
        .unwrap());
    assert_eq!(collector.parameters().dataset_text, "5,6\n");
    assert_eq!(collector.dataset_path(), None);
}

#[test]
fn failed_read_keeps_previous_dataset() {
    let mut collector = InputCollector::new();
    collector.set_dataset_text("1,2\n");
    let selection = collector.begin_file_selection("missing.csv");
    let err = collector
        .complete_file_selection(
            selection,
            Err(Error::could_not_read_file(
                "missing.csv",
                std::io::Error::from(std::io::ErrorKind::NotFound),
            )),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FileRead);
    assert_eq!(collector.parameters().dataset_text, "1,2\n");
}
