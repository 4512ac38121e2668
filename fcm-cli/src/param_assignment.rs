//! `key=value` parameter assignments from the command line.

use anyhow::{format_err, Error, Result};
use fcm_client::Field;
use std::str::FromStr;

/// A parameter assignment, such as `clusters=3` or `m=1.8`.
#[derive(Debug)]
pub struct ParamAssignment {
    /// The parameter being set.
    pub field: Field,

    /// The raw text of the value. This is coerced to the field's type by
    /// `InputCollector::set_field`, so that command-line input and typed
    /// input go through the same checks.
    pub value: String,
}

/// Declare a `FromStr` implementation for `ParamAssignment` so that
/// `structopt` can parse command-line arguments directly into it.
impl FromStr for ParamAssignment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let split = s.splitn(2, '=').collect::<Vec<&str>>();
        if split.len() != 2 {
            return Err(format_err!("parameter {:?} must have form \"key=value\"", s));
        }
        let field = split[0].parse::<Field>()?;
        Ok(ParamAssignment {
            field,
            value: split[1].to_owned(),
        })
    }
}

#[test]
fn parses_known_keys() {
    let examples = &[
        ("clusters=3", Field::Clusters, "3"),
        ("m=1.8", Field::Fuzziness, "1.8"),
        ("epsilon=0.005", Field::Epsilon, "0.005"),
        ("lmax=75", Field::MaxIterations, "75"),
        ("alpha=0.25", Field::Alpha, "0.25"),
        ("beta=2", Field::Beta, "2"),
    ];
    for &(input, field, value) in examples {
        let parsed = input.parse::<ParamAssignment>().unwrap();
        assert_eq!(parsed.field, field);
        assert_eq!(parsed.value, value);
    }
}

#[test]
fn rejects_malformed_assignments() {
    assert!("clusters".parse::<ParamAssignment>().is_err());
    assert!("gamma=1".parse::<ParamAssignment>().is_err());
}
