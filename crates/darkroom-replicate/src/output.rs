use serde_json::Value;

use crate::error::{ReplicateError, Result};

/// Pull the generated image URL out of a prediction output
///
/// Models disagree on output shape. Checked in order:
/// 1. a plain string
/// 2. an array; its first element that yields a URL by the rules below
/// 3. an object whose `url` is itself an object with an `href`
/// 4. an object with a `url` string
pub fn extract_image_url(output: &Value) -> Result<String> {
    match output {
        Value::Array(items) => items
            .iter()
            .find_map(scalar_url)
            .ok_or_else(|| unexpected(output)),
        other => scalar_url(other).ok_or_else(|| unexpected(output)),
    }
}

fn scalar_url(value: &Value) -> Option<String> {
    match value {
        Value::String(url) => non_empty(url),
        Value::Object(map) => match map.get("url") {
            Some(Value::Object(url)) => url.get("href").and_then(Value::as_str).and_then(non_empty),
            Some(Value::String(url)) => non_empty(url),
            _ => None,
        },
        _ => None,
    }
}

fn non_empty(url: &str) -> Option<String> {
    let url = url.trim();
    (!url.is_empty()).then(|| url.to_owned())
}

fn unexpected(output: &Value) -> ReplicateError {
    let shape = match output {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "empty string",
        Value::Array(items) if items.is_empty() => "empty array",
        Value::Array(_) => "array without image URLs",
        Value::Object(_) => "object without a url",
    };
    ReplicateError::UnexpectedOutput(shape.to_owned())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn plain_string() {
        let url = extract_image_url(&json!("https://replicate.delivery/a.png")).unwrap();
        assert_eq!(url, "https://replicate.delivery/a.png");
    }

    #[test]
    fn array_of_strings_takes_first() {
        let url = extract_image_url(&json!(["https://replicate.delivery/0.png", "https://replicate.delivery/1.png"]))
            .unwrap();
        assert_eq!(url, "https://replicate.delivery/0.png");
    }

    #[test]
    fn array_of_objects() {
        let url = extract_image_url(&json!([{"url": "https://replicate.delivery/0.webp"}])).unwrap();
        assert_eq!(url, "https://replicate.delivery/0.webp");
    }

    #[test]
    fn url_object_with_href() {
        let url = extract_image_url(&json!({"url": {"href": "https://replicate.delivery/h.jpg"}})).unwrap();
        assert_eq!(url, "https://replicate.delivery/h.jpg");
    }

    #[test]
    fn object_with_url_string() {
        let url = extract_image_url(&json!({"url": "https://replicate.delivery/u.jpg", "seed": 7})).unwrap();
        assert_eq!(url, "https://replicate.delivery/u.jpg");
    }

    #[test]
    fn unrecognized_shapes() {
        for output in [json!(null), json!(42), json!(""), json!([]), json!([1, 2]), json!({"image": "x"})] {
            let err = extract_image_url(&output).unwrap_err();
            assert!(err.to_string().starts_with("Unexpected output format"), "{output}");
        }
    }
}
