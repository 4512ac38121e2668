//! Field-set properties of built requests, checked over a grid of inputs.

use fcm_client::{build, AlgorithmVariant, ErrorKind, RequestParameters};
use serde_json::Value;
use std::collections::BTreeSet;

const BASE_KEYS: &[&str] = &["clusters", "data", "eps", "fcm_type", "lmax", "m"];

/// Membership texts to try, and whether each one is valid JSON.
const MEMBERSHIPS: &[(&str, bool)] = &[
    ("", true),
    ("   ", false),
    ("null", true),
    ("[[0.1, 0.9], [0.9, 0.1]]", true),
    ("[]", true),
    ("{not json", false),
    ("[[0.1, 0.9]", false),
];

/// A spread of parameter sets, including some outside the advisory ranges.
fn parameter_grid() -> Vec<RequestParameters> {
    let mut grid = vec![];
    for &(clusters, fuzziness) in &[(2, 1.1), (3, 2.0), (100, 5.0), (250, 0.5)] {
        for &(alpha, beta) in &[(0.0, 0.0), (0.5, 1.0), (1.0, 5.0), (3.0, -1.0)] {
            for &(membership, _) in MEMBERSHIPS {
                grid.push(RequestParameters {
                    dataset_text: format!("{},{}\n{},{}\n", clusters, alpha, beta, fuzziness),
                    clusters,
                    fuzziness,
                    epsilon: 0.001 * f64::from(clusters),
                    max_iterations: 10 + clusters,
                    alpha,
                    beta,
                    supervised_membership_text: membership.to_owned(),
                });
            }
        }
    }
    grid
}

fn is_valid_membership(text: &str) -> bool {
    MEMBERSHIPS
        .iter()
        .find(|&&(candidate, _)| candidate == text)
        .map(|&(_, valid)| valid)
        .unwrap()
}

fn has_membership(text: &str) -> bool {
    !text.is_empty() && text != "null"
}

fn key_set(value: &Value) -> BTreeSet<String> {
    value.as_object().unwrap().keys().cloned().collect()
}

fn expected_keys(extra: &[&str]) -> BTreeSet<String> {
    BASE_KEYS
        .iter()
        .chain(extra.iter())
        .map(|key| (*key).to_owned())
        .collect()
}

#[test]
fn unsupervised_requests_have_exactly_the_base_fields() {
    for params in parameter_grid() {
        let request = build(AlgorithmVariant::Unsupervised, &params).unwrap();
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(key_set(&value), expected_keys(&[]), "{:?}", params);
        assert_eq!(value["fcm_type"], "Unsupervised FCM");
    }
}

#[test]
fn semi_supervised_requests_never_carry_beta() {
    for params in parameter_grid() {
        let text = &params.supervised_membership_text;
        let built = build(AlgorithmVariant::SemiSupervised, &params);
        if !is_valid_membership(text) {
            assert_eq!(built.unwrap_err().kind(), ErrorKind::Parse);
            continue;
        }
        let value = serde_json::to_value(&built.unwrap()).unwrap();
        let expected = if has_membership(text) {
            expected_keys(&["alpha", "u_supervised"])
        } else {
            expected_keys(&["alpha"])
        };
        assert_eq!(key_set(&value), expected, "{:?}", params);
        assert_eq!(value["alpha"], params.alpha);
    }
}

#[test]
fn entropy_regularized_requests_carry_alpha_and_beta() {
    for params in parameter_grid() {
        let text = &params.supervised_membership_text;
        let built = build(AlgorithmVariant::EntropyRegularized, &params);
        if !is_valid_membership(text) {
            assert_eq!(built.unwrap_err().kind(), ErrorKind::Parse);
            continue;
        }
        let value = serde_json::to_value(&built.unwrap()).unwrap();
        let expected = if has_membership(text) {
            expected_keys(&["alpha", "beta", "u_supervised"])
        } else {
            expected_keys(&["alpha", "beta"])
        };
        assert_eq!(key_set(&value), expected, "{:?}", params);
        assert_eq!(value["beta"], params.beta);
    }
}

#[test]
fn requests_never_contain_null() {
    for params in parameter_grid() {
        for &variant in &AlgorithmVariant::ALL {
            if let Ok(request) = build(variant, &params) {
                let value = serde_json::to_value(&request).unwrap();
                assert!(
                    value.as_object().unwrap().values().all(|v| !v.is_null()),
                    "{} {:?}",
                    variant,
                    params
                );
            }
        }
    }
}

#[test]
fn building_is_deterministic() {
    for params in parameter_grid() {
        for &variant in &AlgorithmVariant::ALL {
            match (build(variant, &params), build(variant, &params)) {
                (Ok(first), Ok(second)) => {
                    assert_eq!(first, second);
                    assert_eq!(
                        serde_json::to_string(&first).unwrap(),
                        serde_json::to_string(&second).unwrap()
                    );
                }
                (Err(first), Err(second)) => assert_eq!(first.kind(), second.kind()),
                _ => panic!("non-deterministic build for {} {:?}", variant, params),
            }
        }
    }
}

#[test]
fn base_fields_pass_through_unchanged() {
    for params in parameter_grid() {
        let request = build(AlgorithmVariant::Unsupervised, &params).unwrap();
        assert_eq!(request.data, params.dataset_text);
        assert_eq!(request.clusters, params.clusters);
        assert_eq!(request.m, params.fuzziness);
        assert_eq!(request.eps, params.epsilon);
        assert_eq!(request.lmax, params.max_iterations);
    }
}
