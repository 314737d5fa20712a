use crate::workflows::verification::{PackageCatalog, PackageCredits, RequestId};

#[test]
fn request_ids_order_by_sequence_past_six_digits() {
    let before = RequestId::from_sequence(999_999);
    let after = RequestId::from_sequence(1_000_000);

    assert_eq!(after.0, "REQ-1000000");
    assert_eq!(after.sequence(), Some(1_000_000));
    assert!(after > before, "text order would put REQ-1000000 first");

    let mut ids = vec![
        after.clone(),
        RequestId::from_sequence(2),
        before.clone(),
        RequestId::from_sequence(10),
    ];
    ids.sort();
    let sequences: Vec<Option<u64>> = ids.iter().map(RequestId::sequence).collect();
    assert_eq!(
        sequences,
        vec![Some(2), Some(10), Some(999_999), Some(1_000_000)]
    );
}

#[test]
fn foreign_request_ids_sort_first_by_text() {
    let legacy_b = RequestId("legacy-b".to_string());
    let legacy_a = RequestId("legacy-a".to_string());
    let minted = RequestId::from_sequence(1);

    assert_eq!(legacy_a.sequence(), None);
    assert_eq!(RequestId("REQ-abc".to_string()).sequence(), None);

    let mut ids = vec![minted.clone(), legacy_b.clone(), legacy_a.clone()];
    ids.sort();
    assert_eq!(ids, vec![legacy_a, legacy_b, minted]);
}

#[test]
fn catalog_edits_keep_ids_unique() {
    let mut catalog = PackageCatalog::standard();
    let mut standard = catalog.find("STANDARD").cloned().expect("standard package");

    assert!(!catalog.add(standard.clone()));
    standard.credits = PackageCredits::Limited(2);
    assert!(catalog.replace(standard));
    assert_eq!(
        catalog.find("STANDARD").map(|package| package.credits),
        Some(PackageCredits::Limited(2))
    );

    let removed = catalog.remove("STANDARD").expect("removed");
    assert_eq!(removed.id, "STANDARD");
    assert!(catalog.find("STANDARD").is_none());
    assert!(catalog.remove("STANDARD").is_none());
    assert!(!catalog.replace(removed.clone()));
    assert!(catalog.add(removed));
}
