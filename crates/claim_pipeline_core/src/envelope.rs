//! Decoding of queued upload notifications.
//!
//! A queue message body is either a storage event (`{"Records": [...]}`) or a
//! pub/sub envelope whose `Message` field carries that storage event as a JSON
//! string. Anything else is unrecognized and skipped.

use std::fmt;

use serde::Deserialize;
use serde_json::Value;

use crate::contract::ObjectLocation;

#[derive(Debug, Clone, PartialEq)]
pub enum EnvelopeShape {
    DirectRecords(Vec<Value>),
    NestedMessage(String),
    Unrecognized,
}

impl EnvelopeShape {
    pub fn classify(payload: Value) -> Self {
        let Value::Object(mut object) = payload else {
            return Self::Unrecognized;
        };

        match object.remove("Records") {
            Some(Value::Array(records)) => return Self::DirectRecords(records),
            Some(_) => return Self::Unrecognized,
            None => {}
        }

        match object.remove("Message") {
            Some(Value::String(message)) => Self::NestedMessage(message),
            _ => Self::Unrecognized,
        }
    }
}

/// Why a whole queue message was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageSkip {
    MissingBody,
    MalformedBody(String),
    UnrecognizedEnvelope,
    MalformedNestedMessage(String),
    NoRecords,
}

impl fmt::Display for MessageSkip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingBody => f.write_str("message has no body"),
            Self::MalformedBody(error) => write!(f, "message body is not valid JSON: {error}"),
            Self::UnrecognizedEnvelope => f.write_str("message body has no record list"),
            Self::MalformedNestedMessage(error) => {
                write!(f, "nested message is not a storage event: {error}")
            }
            Self::NoRecords => f.write_str("record list is empty"),
        }
    }
}

/// Why a single inner record was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordSkip {
    MissingLocation(String),
    OutsideUploadPrefix(ObjectLocation),
}

impl fmt::Display for RecordSkip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingLocation(error) => write!(f, "record has no object location: {error}"),
            Self::OutsideUploadPrefix(location) => {
                write!(f, "{location} is outside the upload prefix")
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct StorageEventRecord {
    s3: StorageEntity,
}

#[derive(Debug, Deserialize)]
struct StorageEntity {
    bucket: BucketEntity,
    object: ObjectEntity,
}

#[derive(Debug, Deserialize)]
struct BucketEntity {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ObjectEntity {
    key: String,
}

/// Recovers the inner record list from a raw queue message body.
pub fn unwrap_message_body(body: &str) -> Result<Vec<Value>, MessageSkip> {
    let payload: Value = serde_json::from_str(body)
        .map_err(|error| MessageSkip::MalformedBody(error.to_string()))?;

    let records = match EnvelopeShape::classify(payload) {
        EnvelopeShape::DirectRecords(records) => records,
        EnvelopeShape::NestedMessage(message) => unwrap_nested_message(&message)?,
        EnvelopeShape::Unrecognized => return Err(MessageSkip::UnrecognizedEnvelope),
    };

    if records.is_empty() {
        return Err(MessageSkip::NoRecords);
    }
    Ok(records)
}

fn unwrap_nested_message(message: &str) -> Result<Vec<Value>, MessageSkip> {
    let inner: Value = serde_json::from_str(message)
        .map_err(|error| MessageSkip::MalformedNestedMessage(error.to_string()))?;

    // Only one level of indirection is accepted.
    match EnvelopeShape::classify(inner) {
        EnvelopeShape::DirectRecords(records) => Ok(records),
        EnvelopeShape::NestedMessage(_) | EnvelopeShape::Unrecognized => {
            Err(MessageSkip::UnrecognizedEnvelope)
        }
    }
}

/// Extracts the bucket and key exactly as they appear in the record.
pub fn extract_location(record: &Value) -> Result<ObjectLocation, RecordSkip> {
    let parsed = StorageEventRecord::deserialize(record)
        .map_err(|error| RecordSkip::MissingLocation(error.to_string()))?;

    if parsed.s3.bucket.name.is_empty() {
        return Err(RecordSkip::MissingLocation("bucket name is empty".to_string()));
    }
    if parsed.s3.object.key.is_empty() {
        return Err(RecordSkip::MissingLocation("object key is empty".to_string()));
    }

    Ok(ObjectLocation::new(parsed.s3.bucket.name, parsed.s3.object.key))
}

/// Decodes one message body into per-record locations, keeping skips in
/// record order.
pub fn locations_from_body(
    body: &str,
) -> Result<Vec<Result<ObjectLocation, RecordSkip>>, MessageSkip> {
    let records = unwrap_message_body(body)?;
    Ok(records.iter().map(extract_location).collect())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn storage_event(records: &[(&str, &str)]) -> Value {
        let records: Vec<Value> = records
            .iter()
            .map(|(bucket, key)| {
                json!({
                    "eventSource": "aws:s3",
                    "eventName": "ObjectCreated:Put",
                    "s3": {
                        "bucket": {"name": bucket, "arn": format!("arn:aws:s3:::{bucket}")},
                        "object": {"key": key, "size": 1024}
                    }
                })
            })
            .collect();
        json!({ "Records": records })
    }

    #[test]
    fn classifies_direct_nested_and_unknown_shapes() {
        assert!(matches!(
            EnvelopeShape::classify(json!({"Records": []})),
            EnvelopeShape::DirectRecords(records) if records.is_empty()
        ));
        assert_eq!(
            EnvelopeShape::classify(json!({"Type": "Notification", "Message": "{}"})),
            EnvelopeShape::NestedMessage("{}".to_string())
        );
        assert_eq!(
            EnvelopeShape::classify(json!({"Records": "not-a-list"})),
            EnvelopeShape::Unrecognized
        );
        assert_eq!(
            EnvelopeShape::classify(json!({"Message": {"Records": []}})),
            EnvelopeShape::Unrecognized
        );
        assert_eq!(
            EnvelopeShape::classify(json!(["Records"])),
            EnvelopeShape::Unrecognized
        );
    }

    #[test]
    fn direct_and_nested_envelopes_yield_identical_locations() {
        let event = storage_event(&[("claims-bucket", "claimcollectors11/a b+c.pdf")]);
        let direct_body = event.to_string();
        let nested_body = json!({
            "Type": "Notification",
            "MessageId": "sns-1",
            "Message": event.to_string()
        })
        .to_string();

        let direct = locations_from_body(&direct_body).expect("direct body should decode");
        let nested = locations_from_body(&nested_body).expect("nested body should decode");

        let expected = ObjectLocation::new("claims-bucket", "claimcollectors11/a b+c.pdf");
        assert_eq!(direct, vec![Ok(expected.clone())]);
        assert_eq!(nested, vec![Ok(expected)]);
    }

    #[test]
    fn skips_malformed_body() {
        let error = unwrap_message_body("{not json").expect_err("body should be rejected");
        assert!(matches!(error, MessageSkip::MalformedBody(_)));
    }

    #[test]
    fn skips_storage_test_event() {
        let body = json!({
            "Service": "Amazon S3",
            "Event": "s3:TestEvent",
            "Bucket": "claims-bucket"
        })
        .to_string();

        assert_eq!(
            unwrap_message_body(&body),
            Err(MessageSkip::UnrecognizedEnvelope)
        );
    }

    #[test]
    fn skips_nested_message_that_is_not_json() {
        let body = json!({"Message": "plain text"}).to_string();
        assert!(matches!(
            unwrap_message_body(&body),
            Err(MessageSkip::MalformedNestedMessage(_))
        ));
    }

    #[test]
    fn rejects_doubly_nested_message() {
        let innermost = storage_event(&[("b", "k")]).to_string();
        let middle = json!({"Message": innermost}).to_string();
        let body = json!({"Message": middle}).to_string();

        assert_eq!(
            unwrap_message_body(&body),
            Err(MessageSkip::UnrecognizedEnvelope)
        );
    }

    #[test]
    fn skips_empty_record_list() {
        assert_eq!(
            unwrap_message_body(r#"{"Records": []}"#),
            Err(MessageSkip::NoRecords)
        );
        let nested = json!({"Message": "{}"}).to_string();
        assert_eq!(
            unwrap_message_body(&nested),
            Err(MessageSkip::UnrecognizedEnvelope)
        );
    }

    #[test]
    fn malformed_record_is_skipped_without_dropping_neighbours() {
        let body = json!({
            "Records": [
                {"s3": {"bucket": {"name": "claims-bucket"}, "object": {"key": "one.pdf"}}},
                {"s3": {"bucket": {"name": "claims-bucket"}}},
                {"eventSource": "aws:s3"},
                {"s3": {"bucket": {"name": "claims-bucket"}, "object": {"key": "two.pdf"}}}
            ]
        })
        .to_string();

        let locations = locations_from_body(&body).expect("body should decode");
        assert_eq!(locations.len(), 4);
        assert_eq!(
            locations[0],
            Ok(ObjectLocation::new("claims-bucket", "one.pdf"))
        );
        assert!(matches!(locations[1], Err(RecordSkip::MissingLocation(_))));
        assert!(matches!(locations[2], Err(RecordSkip::MissingLocation(_))));
        assert_eq!(
            locations[3],
            Ok(ObjectLocation::new("claims-bucket", "two.pdf"))
        );
    }

    #[test]
    fn empty_key_is_a_missing_location() {
        let record = json!({"s3": {"bucket": {"name": "b"}, "object": {"key": ""}}});
        assert_eq!(
            extract_location(&record),
            Err(RecordSkip::MissingLocation("object key is empty".to_string()))
        );
    }
}
