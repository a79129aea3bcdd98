//! `/cal/sum`: adds a comma-separated list of integers.
//!
//! Stateless and free of fault parameters; it only shares the
//! `ErrNo`/`Msg`/`Data` envelope convention.

use axum::{
    extract::Extension,
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::http::context::RequestContext;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SumError {
    #[error("ids empty")]
    Empty,
    #[error("ids[{index}]={value:?} not int")]
    NotInt { index: usize, value: String },
    #[error("ids sum overflows")]
    Overflow,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SumData {
    #[serde(rename = "Sum")]
    pub sum: i64,
}

/// Response envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SumResult {
    #[serde(rename = "ErrNo")]
    pub err_no: u16,
    #[serde(rename = "Msg")]
    pub msg: String,
    #[serde(rename = "Data")]
    pub data: SumData,
}

impl SumResult {
    pub fn success(sum: i64) -> Self {
        Self {
            err_no: 0,
            msg: "success".to_string(),
            data: SumData { sum },
        }
    }

    pub fn failure(err: &SumError) -> Self {
        Self {
            err_no: StatusCode::BAD_REQUEST.as_u16(),
            msg: err.to_string(),
            data: SumData::default(),
        }
    }
}

/// Sum of the comma-separated integers in `ids`.
/// The first token that is not an integer stops the scan.
pub fn sum_ids(ids: &str) -> Result<i64, SumError> {
    if ids.is_empty() {
        return Err(SumError::Empty);
    }
    ids.split(',').enumerate().try_fold(0i64, |total, (index, token)| {
        let id: i64 = token.parse().map_err(|_| SumError::NotInt {
            index,
            value: token.to_string(),
        })?;
        total.checked_add(id).ok_or(SumError::Overflow)
    })
}

fn ids_param(uri: &Uri) -> String {
    uri.query()
        .and_then(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .find(|(k, _)| k == "ids")
                .map(|(_, v)| v.into_owned())
        })
        .unwrap_or_default()
}

pub async fn sum(Extension(ctx): Extension<RequestContext>, uri: Uri) -> Response {
    match sum_ids(&ids_param(&uri)) {
        Ok(total) => {
            ctx.add_field("Sum", total);
            Json(SumResult::success(total)).into_response()
        }
        Err(err) => {
            ctx.add_field("SumErr", err.to_string());
            (StatusCode::BAD_REQUEST, Json(SumResult::failure(&err))).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sums_valid_lists() {
        assert_eq!(sum_ids("123,456"), Ok(579));
        assert_eq!(sum_ids("7"), Ok(7));
        assert_eq!(sum_ids("-5,+2,3"), Ok(0));
    }

    #[test]
    fn empty_input_is_rejected() {
        assert_eq!(sum_ids(""), Err(SumError::Empty));
        assert_eq!(SumError::Empty.to_string(), "ids empty");
    }

    #[test]
    fn first_bad_token_is_reported() {
        let err = sum_ids("1,a,b").unwrap_err();
        assert_eq!(
            err,
            SumError::NotInt {
                index: 1,
                value: "a".into()
            }
        );
        assert_eq!(err.to_string(), "ids[1]=\"a\" not int");

        assert_eq!(sum_ids("1,,2").unwrap_err().to_string(), "ids[1]=\"\" not int");
    }

    #[test]
    fn overflow_is_an_error() {
        let input = format!("{},1", i64::MAX);
        assert_eq!(sum_ids(&input), Err(SumError::Overflow));
    }

    #[test]
    fn envelope_field_names() {
        let value = serde_json::to_value(SumResult::success(579)).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"ErrNo": 0, "Msg": "success", "Data": {"Sum": 579}})
        );

        let value = serde_json::to_value(SumResult::failure(&SumError::Empty)).unwrap();
        assert_eq!(value["ErrNo"], 400);
        assert_eq!(value["Msg"], "ids empty");
    }

    #[test]
    fn ids_come_from_the_query() {
        let uri: Uri = "/cal/sum?x=1&ids=1%2C2".parse().unwrap();
        assert_eq!(ids_param(&uri), "1,2");
        let uri: Uri = "/cal/sum".parse().unwrap();
        assert_eq!(ids_param(&uri), "");
    }
}
