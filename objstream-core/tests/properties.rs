//! Property-based tests for objstream core

use objstream_core::*;
use proptest::prelude::*;

proptest! {
    #[test]
    fn props_printable_keys_are_accepted(key in "[a-zA-Z0-9/._ -]{1,200}") {
        let parsed = ObjectKey::new(&key).unwrap();
        prop_assert_eq!(parsed.as_str(), key.as_str());
    }

    #[test]
    fn props_valid_bucket_names_roundtrip(name in "[a-z0-9][a-z0-9.-]{1,61}[a-z0-9]") {
        let parsed: BucketName = name.parse().unwrap();
        prop_assert_eq!(parsed.to_string(), name);
    }

    #[test]
    fn props_session_sums_sizes_in_order(sizes in prop::collection::vec(0u64..10_000, 1..50)) {
        let mut session = MultipartSession::new(
            BucketName::new("test-bucket").unwrap(),
            ObjectKey::new("object").unwrap(),
            "upload",
        );

        for size in &sizes {
            let part_number = session.next_part_number();
            session
                .record_part(PartResult { part_number, e_tag: format!("etag-{}", part_number), size: *size })
                .unwrap();
        }

        prop_assert_eq!(session.total_size(), sizes.iter().sum::<u64>());
        for (i, part) in session.parts().iter().enumerate() {
            prop_assert_eq!(part.part_number as usize, i + 1);
        }
    }

    #[test]
    fn props_explicit_length_must_match(data in prop::collection::vec(any::<u8>(), 0..512), delta in 1u64..16) {
        let request = UploadRequest::new(
            BucketName::new("test-bucket").unwrap(),
            ObjectKey::new("object").unwrap(),
            data.clone(),
        );
        prop_assert_eq!(request.resolved_content_length().unwrap(), data.len() as u64);

        let wrong = request.with_content_length(data.len() as u64 + delta);
        prop_assert!(wrong.resolved_content_length().is_err());
    }
}
