//! Building clustering requests from collected parameters.
//!
//! Each algorithm variant accepts a different set of fields. Rather than
//! building a generic object and filtering out the irrelevant keys, we give
//! each variant its own shape, so a field a variant doesn't accept has no
//! place to live and can never be serialized, not even as `null`.

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::collector::{Field, RequestParameters};
use crate::errors::*;
use crate::variant::AlgorithmVariant;

/// A request to run fuzzy c-means, in the form the service expects.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClusteringRequest {
    /// The dataset, as delimited text.
    pub data: String,

    /// `fcm_type`, plus whichever fields that variant accepts. These are
    /// serialized at the top level of the request.
    #[serde(flatten)]
    pub variant: VariantFields,

    /// The number of clusters.
    pub clusters: u32,

    /// The fuzziness coefficient.
    pub m: f64,

    /// The convergence threshold.
    pub eps: f64,

    /// The maximum number of iterations.
    pub lmax: u32,
}

impl ClusteringRequest {
    /// Which variant this request is for.
    pub fn algorithm(&self) -> AlgorithmVariant {
        self.variant.algorithm()
    }
}

/// The variant-specific part of a request. Serialized with an `fcm_type`
/// tag holding the variant's name.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "fcm_type")]
pub enum VariantFields {
    /// No extra fields.
    #[serde(rename = "Unsupervised FCM")]
    Unsupervised,

    /// Supervision weight and an optional membership matrix.
    #[serde(rename = "Semi-Supervised FCM")]
    SemiSupervised {
        /// Weight for supervised information.
        alpha: f64,
        /// An a priori membership matrix.
        #[serde(skip_serializing_if = "Option::is_none")]
        u_supervised: Option<Value>,
    },

    /// Supervision and entropy weights and an optional membership matrix.
    #[serde(rename = "Entropy Regularized FCM")]
    EntropyRegularized {
        /// Weight for supervised information.
        alpha: f64,
        /// Weight for entropy regularization.
        beta: f64,
        /// An a priori membership matrix.
        #[serde(skip_serializing_if = "Option::is_none")]
        u_supervised: Option<Value>,
    },
}

impl VariantFields {
    /// Which variant these fields belong to.
    pub fn algorithm(&self) -> AlgorithmVariant {
        match self {
            VariantFields::Unsupervised => AlgorithmVariant::Unsupervised,
            VariantFields::SemiSupervised { .. } => AlgorithmVariant::SemiSupervised,
            VariantFields::EntropyRegularized { .. } => {
                AlgorithmVariant::EntropyRegularized
            }
        }
    }
}

/// Build a request for `variant` from `params`.
///
/// Fails with `Error::CouldNotParseMembership` if the variant is supervised
/// and the membership text is present but isn't JSON. The membership text
/// is ignored entirely for unsupervised requests.
pub fn build(
    variant: AlgorithmVariant,
    params: &RequestParameters,
) -> Result<ClusteringRequest> {
    let m = finite(Field::Fuzziness, params.fuzziness)?;
    let eps = finite(Field::Epsilon, params.epsilon)?;
    let variant_fields = match variant {
        AlgorithmVariant::Unsupervised => VariantFields::Unsupervised,
        AlgorithmVariant::SemiSupervised => VariantFields::SemiSupervised {
            alpha: finite(Field::Alpha, params.alpha)?,
            u_supervised: parse_membership(&params.supervised_membership_text)?,
        },
        AlgorithmVariant::EntropyRegularized => VariantFields::EntropyRegularized {
            alpha: finite(Field::Alpha, params.alpha)?,
            beta: finite(Field::Beta, params.beta)?,
            u_supervised: parse_membership(&params.supervised_membership_text)?,
        },
    };
    let request = ClusteringRequest {
        data: params.dataset_text.clone(),
        variant: variant_fields,
        clusters: params.clusters,
        m,
        eps,
        lmax: params.max_iterations,
    };
    debug!(
        "built {} request ({} bytes of data)",
        variant,
        request.data.len()
    );
    Ok(request)
}

/// Parse supervised membership text. Empty text, or a JSON `null`, means
/// "no matrix". Whitespace alone is not JSON, so it's a parse error.
pub fn parse_membership(text: &str) -> Result<Option<Value>> {
    if text.is_empty() {
        return Ok(None);
    }
    match serde_json::from_str(text) {
        Ok(Value::Null) => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(source) => Err(Error::CouldNotParseMembership { source }),
    }
}

/// JSON has no representation for NaN or infinity, and `serde_json` would
/// quietly write them as `null`.
fn finite(field: Field, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(Error::invalid_number(field, value.to_string(), "a finite number"))
    }
}

#[cfg(test)]
fn keys(request: &ClusteringRequest) -> Vec<String> {
    let value = serde_json::to_value(request).expect("request should serialize");
    let mut keys = value
        .as_object()
        .expect("request should be an object")
        .keys()
        .cloned()
        .collect::<Vec<_>>();
    keys.sort();
    keys
}

#[test]
fn unsupervised_scenario() {
    use serde_json::json;
    let params = RequestParameters {
        dataset_text: "1,2\n3,4".to_owned(),
        clusters: 3,
        fuzziness: 2.0,
        epsilon: 0.01,
        max_iterations: 50,
        // These must not leak into an unsupervised request.
        alpha: 0.9,
        beta: 4.0,
        supervised_membership_text: "[[0.5, 0.5]]".to_owned(),
    };
    let request = build(AlgorithmVariant::Unsupervised, &params).unwrap();
    assert_eq!(
        serde_json::to_value(&request).unwrap(),
        json!({
            "data": "1,2\n3,4",
            "fcm_type": "Unsupervised FCM",
            "clusters": 3,
            "m": 2.0,
            "eps": 0.01,
            "lmax": 50,
        })
    );
}

#[test]
fn entropy_regularized_scenario() {
    use serde_json::json;
    let params = RequestParameters {
        dataset_text: "1,2\n3,4".to_owned(),
        alpha: 0.5,
        beta: 1.0,
        supervised_membership_text: "[[0.1,0.9]]".to_owned(),
        ..RequestParameters::default()
    };
    let request = build(AlgorithmVariant::EntropyRegularized, &params).unwrap();
    let value = serde_json::to_value(&request).unwrap();
    assert_eq!(value["fcm_type"], json!("Entropy Regularized FCM"));
    assert_eq!(value["alpha"], json!(0.5));
    assert_eq!(value["beta"], json!(1.0));
    assert_eq!(value["u_supervised"], json!([[0.1, 0.9]]));
    assert_eq!(
        keys(&request),
        vec!["alpha", "beta", "clusters", "data", "eps", "fcm_type", "lmax", "m", "u_supervised"]
    );
}

#[test]
fn semi_supervised_without_membership_omits_key() {
    let params = RequestParameters {
        dataset_text: "1,2".to_owned(),
        supervised_membership_text: String::new(),
        ..RequestParameters::default()
    };
    let request = build(AlgorithmVariant::SemiSupervised, &params).unwrap();
    assert_eq!(
        keys(&request),
        vec!["alpha", "clusters", "data", "eps", "fcm_type", "lmax", "m"]
    );
    let json = serde_json::to_string(&request).unwrap();
    assert!(!json.contains("null"));
}

#[test]
fn malformed_membership_is_a_parse_error() {
    let params = RequestParameters {
        dataset_text: "1,2".to_owned(),
        supervised_membership_text: "{not json".to_owned(),
        ..RequestParameters::default()
    };
    for &variant in &[
        AlgorithmVariant::SemiSupervised,
        AlgorithmVariant::EntropyRegularized,
    ] {
        let err = build(variant, &params).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
    }
    // Unsupervised requests never look at the membership text.
    assert!(build(AlgorithmVariant::Unsupervised, &params).is_ok());
}

#[test]
fn empty_membership_counts_as_absent() {
    assert_eq!(parse_membership("").unwrap(), None);
    assert_eq!(
        parse_membership("[[1, 0], [0, 1]]").unwrap(),
        Some(serde_json::json!([[1, 0], [0, 1]]))
    );
}

#[test]
fn whitespace_membership_is_a_parse_error() {
    for text in &["   ", "  \n", "\t"] {
        let err = parse_membership(text).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
    }

    let params = RequestParameters {
        dataset_text: "1,2".to_owned(),
        supervised_membership_text: "   ".to_owned(),
        ..RequestParameters::default()
    };
    let err = build(AlgorithmVariant::SemiSupervised, &params).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parse);
}

#[test]
fn null_membership_is_omitted() {
    assert_eq!(parse_membership("null").unwrap(), None);
    assert_eq!(parse_membership(" null\n").unwrap(), None);

    let params = RequestParameters {
        dataset_text: "1,2".to_owned(),
        supervised_membership_text: "null".to_owned(),
        ..RequestParameters::default()
    };
    for &variant in &[
        AlgorithmVariant::SemiSupervised,
        AlgorithmVariant::EntropyRegularized,
    ] {
        let request = build(variant, &params).unwrap();
        assert!(!keys(&request).contains(&"u_supervised".to_owned()));
        let json = serde_json::to_string(&request).unwrap();
        assert!(!json.contains("null"));
    }
}

#[test]
fn non_finite_values_are_rejected() {
    let params = RequestParameters {
        fuzziness: f64::NAN,
        ..RequestParameters::default()
    };
    let err = build(AlgorithmVariant::Unsupervised, &params).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    // `beta` is only checked when it would be sent.
    let params = RequestParameters {
        beta: f64::INFINITY,
        ..RequestParameters::default()
    };
    assert!(build(AlgorithmVariant::SemiSupervised, &params).is_ok());
    assert!(build(AlgorithmVariant::EntropyRegularized, &params).is_err());
}

#[test]
fn request_knows_its_algorithm() {
    let params = RequestParameters::default();
    for &variant in &AlgorithmVariant::ALL {
        assert_eq!(build(variant, &params).unwrap().algorithm(), variant);
    }
}
