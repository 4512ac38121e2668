//! The fuzzy c-means algorithm variants offered by the service.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::*;

/// Which flavor of fuzzy c-means should the service run? This determines
/// which optional parameters are legal in a request.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum AlgorithmVariant {
    /// Plain fuzzy c-means, with no supervision.
    #[serde(rename = "Unsupervised FCM")]
    Unsupervised,
    /// Fuzzy c-means guided by a partial membership matrix, weighted by
    /// `alpha`.
    #[serde(rename = "Semi-Supervised FCM")]
    SemiSupervised,
    /// Semi-supervised fuzzy c-means with an additional entropy term
    /// weighted by `beta`.
    #[serde(rename = "Entropy Regularized FCM")]
    EntropyRegularized,
}

impl AlgorithmVariant {
    /// Every variant, in the order a user interface should list them.
    pub const ALL: [AlgorithmVariant; 3] = [
        AlgorithmVariant::Unsupervised,
        AlgorithmVariant::SemiSupervised,
        AlgorithmVariant::EntropyRegularized,
    ];

    /// The name the clustering service uses for this variant.
    pub fn wire_name(self) -> &'static str {
        match self {
            AlgorithmVariant::Unsupervised => "Unsupervised FCM",
            AlgorithmVariant::SemiSupervised => "Semi-Supervised FCM",
            AlgorithmVariant::EntropyRegularized => "Entropy Regularized FCM",
        }
    }

    /// Does this variant take `alpha` and supervised membership data?
    pub fn is_supervised(self) -> bool {
        self != AlgorithmVariant::Unsupervised
    }

    /// Does this variant take `beta`?
    pub fn is_entropy_regularized(self) -> bool {
        self == AlgorithmVariant::EntropyRegularized
    }
}

impl Default for AlgorithmVariant {
    fn default() -> Self {
        AlgorithmVariant::Unsupervised
    }
}

impl fmt::Display for AlgorithmVariant {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "{}", self.wire_name())
    }
}

/// Accepts the service's names, plus a few shorter spellings that are easier
/// to type on a command line.
impl FromStr for AlgorithmVariant {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        let normalized = name.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "unsupervised fcm" | "unsupervised" | "fcm" => {
                Ok(AlgorithmVariant::Unsupervised)
            }
            "semi-supervised fcm" | "semi-supervised" | "ssfcm" => {
                Ok(AlgorithmVariant::SemiSupervised)
            }
            "entropy regularized fcm" | "entropy-regularized" | "entropy"
            | "esfcm" => Ok(AlgorithmVariant::EntropyRegularized),
            _ => Err(Error::UnknownVariant {
                name: name.to_owned(),
            }),
        }
    }
}

#[test]
fn serializes_as_wire_name() {
    for &variant in &AlgorithmVariant::ALL {
        assert_eq!(
            serde_json::to_value(variant).unwrap(),
            serde_json::Value::String(variant.wire_name().to_owned())
        );
    }
}

#[test]
fn parses_wire_and_short_names() {
    for &variant in &AlgorithmVariant::ALL {
        assert_eq!(variant.wire_name().parse::<AlgorithmVariant>().unwrap(), variant);
    }
    assert_eq!(
        "entropy".parse::<AlgorithmVariant>().unwrap(),
        AlgorithmVariant::EntropyRegularized
    );
    assert_eq!(
        " Semi-Supervised ".parse::<AlgorithmVariant>().unwrap(),
        AlgorithmVariant::SemiSupervised
    );
    let err = "k-means".parse::<AlgorithmVariant>().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}
