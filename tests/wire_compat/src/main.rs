fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use coachlib_protocol::envelope::Envelope;
    use coachlib_protocol::messages::{
        CompleteMultipartRequest, CompleteRequest, CompleteResponse, InitiateRequest,
        InitiateResponse, PartUrlRequest, PartUrlResponse,
    };
    use coachlib_protocol::types::{Category, UploadType};
    use coachlib_transfer::UploadSession;

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    fn load_raw(name: &str) -> String {
        let path = fixtures_dir().join(name);
        fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()))
    }

    /// Loads a fixture JSON file and returns it as a `serde_json::Value`.
    fn load_fixture(name: &str) -> serde_json::Value {
        serde_json::from_str(&load_raw(name))
            .unwrap_or_else(|e| panic!("failed to parse fixture {name}: {e}"))
    }

    /// Deserializes a fixture into a Rust type, re-serializes it, and compares
    /// the JSON values. The envelope's `success` flag is not part of the
    /// payload types and is dropped before comparing.
    fn roundtrip_test<T>(name: &str)
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let mut fixture = load_fixture(name);
        if let Some(map) = fixture.as_object_mut() {
            map.remove("success");
        }
        let parsed: T = serde_json::from_value(fixture.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized = serde_json::to_value(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));

        assert_eq!(
            fixture, reserialized,
            "roundtrip mismatch for {name}:\n  fixture: {fixture}\n  Rust:    {reserialized}"
        );
    }

    fn decode<T: serde::de::DeserializeOwned>(name: &str) -> Envelope<T> {
        Envelope::decode(load_raw(name).as_bytes())
            .unwrap_or_else(|e| panic!("failed to decode envelope {name}: {e}"))
    }

    // --- Requests ---

    #[test]
    fn fixture_initiate_request() {
        roundtrip_test::<InitiateRequest>("initiate_request.json");
    }

    #[test]
    fn fixture_part_url_request() {
        roundtrip_test::<PartUrlRequest>("part_url_request.json");
    }

    #[test]
    fn fixture_complete_request() {
        roundtrip_test::<CompleteRequest>("complete_request.json");
    }

    #[test]
    fn fixture_complete_multipart_request() {
        roundtrip_test::<CompleteMultipartRequest>("complete_multipart_request.json");
    }

    // --- Responses ---

    #[test]
    fn fixture_initiate_response_single() {
        roundtrip_test::<InitiateResponse>("initiate_response_single.json");

        let resp = decode::<InitiateResponse>("initiate_response_single.json")
            .into_result("Failed to initiate upload")
            .unwrap();
        assert_eq!(resp.upload_type, UploadType::Single);
        assert!(resp.presigned_url.is_some());
        assert_eq!(resp.expires_in, Some(3600));
    }

    #[test]
    fn fixture_initiate_response_multipart() {
        roundtrip_test::<InitiateResponse>("initiate_response_multipart.json");

        let resp = decode::<InitiateResponse>("initiate_response_multipart.json")
            .into_result("Failed to initiate upload")
            .unwrap();
        let session =
            UploadSession::from_initiate(resp, 230_686_720, "video/mp4", Category::Videos)
                .unwrap();
        assert_eq!(session.total_chunks(), 5);
        assert_eq!(session.part_range(5).unwrap().len(), 20 * 1024 * 1024);
        assert_eq!(session.part_range(1).unwrap().len(), 50 * 1024 * 1024);
    }

    #[test]
    fn fixture_part_url_response() {
        roundtrip_test::<PartUrlResponse>("part_url_response.json");
    }

    #[test]
    fn fixture_complete_response() {
        roundtrip_test::<CompleteResponse>("complete_response.json");

        let resp = decode::<CompleteResponse>("complete_response.json")
            .into_result("Failed to complete multipart upload")
            .unwrap();
        assert_eq!(resp.data.filename, "passing-drills.mp4");
        assert!(resp.data.record.contains_key("video"));
    }

    #[test]
    fn fixture_failure_uses_backend_reason() {
        let err = decode::<InitiateResponse>("failure_response.json")
            .into_result("Failed to initiate upload")
            .unwrap_err();
        assert_eq!(err, "File type not allowed for category");
    }

    #[test]
    fn fixture_bare_failure_uses_fallback() {
        let err = decode::<PartUrlResponse>("failure_response_bare.json")
            .into_result("Failed to get presigned URL for part 3")
            .unwrap_err();
        assert_eq!(err, "Failed to get presigned URL for part 3");
    }

    #[test]
    fn multipart_manifest_is_sorted() {
        let req: CompleteMultipartRequest =
            serde_json::from_value(load_fixture("complete_multipart_request.json")).unwrap();
        let numbers: Vec<u32> = req.parts.iter().map(|p| p.part_number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
        assert!(req.parts.iter().all(|p| !p.etag.contains('"')));
    }
}
