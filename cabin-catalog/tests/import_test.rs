use cabin_catalog::{CatalogError, CatalogImporter, SeatMapDocument};
use cabin_core::{CabinSegment, ReservationError, ReservationStore};
use cabin_store::MemoryReservationStore;
use std::sync::Arc;

const FIXTURE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/seat_map.json");

#[tokio::test]
async fn test_import_file_replaces_inventory() {
    let store = Arc::new(MemoryReservationStore::new());
    let importer = CatalogImporter::new(store.clone());

    let imported = importer.import_file(FIXTURE).await.unwrap();
    assert_eq!(imported.len(), 16);
    assert!(imported.iter().all(|s| s.available));

    let seats = store.all_seats().await.unwrap();
    assert_eq!(seats.len(), 16);
    assert_eq!(seats[0].code, "1A");
    assert_eq!(seats[0].segment, CabinSegment::First);
    assert_eq!(seats[0].price, 45000);

    let business: Vec<_> = seats.iter().filter(|s| s.segment == CabinSegment::Business).collect();
    assert_eq!(business.len(), 6);

    // Importing again is full-replace, not merge.
    let again = importer.import_file(FIXTURE).await.unwrap();
    let seats = store.all_seats().await.unwrap();
    assert_eq!(seats.len(), 16);
    assert!(seats.iter().all(|s| again.iter().any(|a| a.id == s.id)));
}

#[tokio::test]
async fn test_invalid_document_keeps_previous_inventory() {
    let store = Arc::new(MemoryReservationStore::new());
    let importer = CatalogImporter::new(store.clone());
    importer.import_file(FIXTURE).await.unwrap();

    let duplicated: SeatMapDocument = serde_json::from_str(
        r#"{"seatsItineraryParts":[{"segmentSeatMaps":[{"passengerSeatMaps":[{"seatMap":{
            "aircraft":"7M8","cabins":[{"seatRows":[{"rowNumber":9,"seats":[
              {"code":"9A","available":true,"storefrontSlotCode":"SEAT"},
              {"code":"9A","available":true,"storefrontSlotCode":"SEAT"}
            ]}]}]}}]}]}]}"#,
    )
    .unwrap();

    let err = importer.import_document(&duplicated).await.unwrap_err();
    assert!(matches!(err, CatalogError::Rejected(ReservationError::InvalidSeat(_))));
    assert_eq!(store.all_seats().await.unwrap().len(), 16);
}

#[tokio::test]
async fn test_missing_file_is_io_error() {
    let store = Arc::new(MemoryReservationStore::new());
    let importer = CatalogImporter::new(store);

    let err = importer.import_file("/nonexistent/seat_map.json").await.unwrap_err();
    assert!(matches!(err, CatalogError::Io(_)));
}
