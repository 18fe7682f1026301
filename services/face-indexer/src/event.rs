use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};

/// S3 event notification delivered to the function.
///
/// A payload without `Records` (such as the `s3:TestEvent` sent when a
/// notification is first configured) is an empty batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct S3Event {
    #[serde(rename = "Records", default)]
    pub records: Vec<S3EventRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3EventRecord {
    #[serde(rename = "eventName", default)]
    pub event_name: Option<String>,
    pub s3: S3Entity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Entity {
    pub bucket: S3Bucket,
    pub object: S3Object,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Bucket {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Object {
    /// Form-url-encoded object key
    pub key: String,
    #[serde(default)]
    pub size: Option<u64>,
}

/// One newly stored object that needs processing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeNotification {
    pub bucket: String,
    pub object_key: String,
}

impl ChangeNotification {
    pub fn new(bucket: impl Into<String>, object_key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            object_key: object_key.into(),
        }
    }
}

impl From<&S3EventRecord> for ChangeNotification {
    fn from(record: &S3EventRecord) -> Self {
        Self {
            bucket: record.s3.bucket.name.clone(),
            object_key: decode_object_key(&record.s3.object.key),
        }
    }
}

impl S3Event {
    /// Notifications in delivery order
    pub fn notifications(&self) -> Vec<ChangeNotification> {
        self.records.iter().map(ChangeNotification::from).collect()
    }
}

/// Decode an S3 event key (`+` for space, `%XX` escapes).
/// Keys that do not decode to UTF-8 are returned unchanged.
pub fn decode_object_key(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match percent_decode_str(&spaced).decode_utf8() {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => raw.to_string(),
    }
}

/// Map an object key onto the character set Rekognition accepts for
/// `ExternalImageId` (`[a-zA-Z0-9_.\-:]+`)
pub fn external_image_id(object_key: &str) -> String {
    object_key
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '_' | '.' | '-' | ':' => c,
            _ => '_',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_s3_event() {
        let json = r#"{
            "Records": [{
                "eventVersion": "2.1",
                "eventSource": "aws:s3",
                "eventName": "ObjectCreated:Put",
                "s3": {
                    "bucket": { "name": "imgs", "arn": "arn:aws:s3:::imgs" },
                    "object": { "key": "team/jane+doe%281%29.jpg", "size": 1024 }
                }
            }, {
                "s3": {
                    "bucket": { "name": "imgs" },
                    "object": { "key": "a.jpg" }
                }
            }]
        }"#;

        let event: S3Event = serde_json::from_str(json).unwrap();
        let notifications = event.notifications();

        assert_eq!(notifications.len(), 2);
        assert_eq!(
            notifications[0],
            ChangeNotification::new("imgs", "team/jane doe(1).jpg")
        );
        assert_eq!(notifications[1], ChangeNotification::new("imgs", "a.jpg"));
        assert_eq!(event.records[0].s3.object.size, Some(1024));
    }

    #[test]
    fn test_test_event_is_empty_batch() {
        let json = r#"{ "Service": "Amazon S3", "Event": "s3:TestEvent", "Bucket": "imgs" }"#;
        let event: S3Event = serde_json::from_str(json).unwrap();
        assert!(event.notifications().is_empty());
    }

    #[test]
    fn test_decode_object_key() {
        assert_eq!(decode_object_key("a.jpg"), "a.jpg");
        assert_eq!(decode_object_key("my+photo.png"), "my photo.png");
        assert_eq!(decode_object_key("caf%C3%A9.jpg"), "café.jpg");
        assert_eq!(decode_object_key("a%2Bb.jpg"), "a+b.jpg");
        assert_eq!(decode_object_key("bad%FF.jpg"), "bad%FF.jpg");
    }

    #[test]
    fn test_external_image_id() {
        assert_eq!(external_image_id("a.jpg"), "a.jpg");
        assert_eq!(external_image_id("2024-01-15:cam_1.png"), "2024-01-15:cam_1.png");
        assert_eq!(external_image_id("team/jane doe.jpg"), "team_jane_doe.jpg");
    }
}
