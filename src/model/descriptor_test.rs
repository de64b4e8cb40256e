#[cfg(test)]
mod tests {
    use crate::model::{Identity, Metadata, ServiceDescriptor};

    #[test]
    fn test_key_is_derived_from_identity() {
        let d = ServiceDescriptor::new("billing", "billing-1", "10.0.0.5:8080", 10);
        assert_eq!(d.key(), "/services/billing/billing-1");
        assert_eq!(d.identity(), Identity::new("billing", "billing-1"));
        assert_eq!(d.identity().to_string(), "billing/billing-1");
    }

    #[test]
    fn test_merge_metadata_last_write_wins() {
        let mut d = ServiceDescriptor::new("svc", "i", "addr", 5).with_metadata("zone", "a");

        let mut delta = Metadata::new();
        delta.insert("zone".to_string(), "b".to_string());
        delta.insert("shard".to_string(), "1".to_string());
        d.merge_metadata(delta);

        assert_eq!(d.metadata.len(), 2);
        assert_eq!(d.metadata.get("zone").map(String::as_str), Some("b"));
        assert_eq!(d.metadata.get("shard").map(String::as_str), Some("1"));
    }

    #[test]
    fn test_encoded_record_uses_named_fields() {
        let d = ServiceDescriptor::new("svc", "i-1", "127.0.0.1:9000", 15).with_metadata("zone", "a");
        let value: serde_json::Value = serde_json::from_slice(&d.to_bytes().unwrap()).unwrap();

        assert_eq!(value["service_name"], "svc");
        assert_eq!(value["instance_id"], "i-1");
        assert_eq!(value["address"], "127.0.0.1:9000");
        assert_eq!(value["ttl_seconds"], 15);
        assert_eq!(value["metadata"]["zone"], "a");
    }

    #[test]
    fn test_decode_tolerates_unknown_and_missing_fields() {
        let raw = br#"{
            "service_name": "svc",
            "instance_id": "i-1",
            "address": "host:1",
            "ttl_seconds": 30,
            "weight": 100
        }"#;
        let d = ServiceDescriptor::from_bytes(raw).unwrap();
        assert_eq!(d, ServiceDescriptor::new("svc", "i-1", "host:1", 30));
    }
}
