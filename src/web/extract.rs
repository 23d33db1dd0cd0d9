//! Request extractors whose rejections use the API error shape, plus the
//! small field checks shared by handlers.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, Json, Query, Request};
use axum::http::request::Parts;
use serde::de::DeserializeOwned;
use serde_json::{Number, Value};

use crate::web::error::ApiError;

/// JSON body; malformed input is a 400 with the decoder's message.
pub struct Body<T>(pub T);

impl<S, T> FromRequest<S> for Body<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Body(value)),
            Err(rejection) => Err(json_rejection(rejection)),
        }
    }
}

fn json_rejection(rejection: JsonRejection) -> ApiError {
    ApiError::bad_request(rejection.body_text())
}

/// Query string; malformed input is a 400.
pub struct Params<T>(pub T);

impl<S, T> FromRequestParts<S> for Params<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(Params(value)),
            Err(rejection) => Err(query_rejection(rejection)),
        }
    }
}

fn query_rejection(rejection: QueryRejection) -> ApiError {
    ApiError::bad_request(rejection.body_text())
}

/// `Some` only for a string with non-whitespace content.
pub fn required(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// A strictly positive number, given as a JSON number or a numeric string.
///
/// Integers keep their integer representation so the backend sees `6`, not `6.0`.
pub fn positive_number(value: &Value) -> Option<Number> {
    let number = match value {
        Value::Number(n) => n.clone(),
        Value::String(s) => parse_number(s.trim())?,
        _ => return None,
    };
    number
        .as_f64()
        .filter(|n| n.is_finite() && *n > 0.0)
        .map(|_| number)
}

/// Like [`positive_number`], but anything absent or non-positive becomes `fallback`.
pub fn number_or(value: Option<&Value>, fallback: u64) -> Number {
    value
        .and_then(positive_number)
        .unwrap_or_else(|| Number::from(fallback))
}

fn parse_number(raw: &str) -> Option<Number> {
    if let Ok(int) = raw.parse::<u64>() {
        return Some(Number::from(int));
    }
    raw.parse::<f64>().ok().and_then(Number::from_f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_strings_are_accepted() {
        assert_eq!(positive_number(&json!("6")), Some(Number::from(6)));
        assert_eq!(positive_number(&json!(" 2.5 ")), Number::from_f64(2.5));
        assert_eq!(positive_number(&json!(10)), Some(Number::from(10)));
    }

    #[test]
    fn zero_negative_and_junk_are_rejected() {
        assert_eq!(positive_number(&json!(0)), None);
        assert_eq!(positive_number(&json!(-3)), None);
        assert_eq!(positive_number(&json!("")), None);
        assert_eq!(positive_number(&json!("lots")), None);
        assert_eq!(positive_number(&json!(null)), None);
        assert_eq!(positive_number(&json!(true)), None);
    }

    #[test]
    fn number_or_falls_back() {
        assert_eq!(number_or(None, 0), Number::from(0));
        assert_eq!(number_or(Some(&json!("x")), 0), Number::from(0));
        assert_eq!(number_or(Some(&json!(4)), 0), Number::from(4));
    }

    #[test]
    fn blank_strings_are_not_required_values() {
        assert_eq!(required(Some("  ".into())), None);
        assert_eq!(required(None), None);
        assert_eq!(required(Some("MIT".into())), Some("MIT".into()));
    }
}
