use cabin_booking::{BookingQueries, ReservationEngine, RetryPolicy};
use cabin_core::{
    BookingId, BookingStatus, CabinSegment, NewSeat, Principal, ReservationError, ReservationStore,
    Seat,
};
use cabin_store::MemoryReservationStore;
use futures_util::future::join_all;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

fn row_of_seats(row: i32, letters: &str) -> Vec<NewSeat> {
    letters
        .chars()
        .map(|letter| NewSeat {
            code: format!("{row}{letter}"),
            available: true,
            price: 2500,
            currency: "USD".into(),
            row_number: row,
            segment: CabinSegment::for_row(row),
            is_window: letter == 'A' || letter == 'F',
            is_aisle: letter == 'C' || letter == 'D',
            aircraft: "7M8".into(),
            characteristics: BTreeSet::new(),
        })
        .collect()
}

async fn setup(records: Vec<NewSeat>) -> (Arc<MemoryReservationStore>, Arc<ReservationEngine>, Vec<Seat>) {
    let store = Arc::new(MemoryReservationStore::new());
    let seats = store.replace_inventory(records).await.unwrap();
    let engine = Arc::new(ReservationEngine::new(
        store.clone(),
        RetryPolicy::new(3, Duration::from_millis(1)),
    ));
    (store, engine, seats)
}

async fn assert_consistent(store: &MemoryReservationStore) {
    let ledger = store.ledger().await;
    for seat in store.all_seats().await.unwrap() {
        let held = ledger
            .iter()
            .filter(|b| b.seat_id == seat.id && b.status == BookingStatus::Confirmed)
            .count();
        assert!(held <= 1, "seat {} double-booked", seat.code);
        assert_eq!(seat.available, held == 0, "seat {} flag disagrees with ledger", seat.code);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_only_one_concurrent_claim_wins() {
    let (store, engine, seats) = setup(row_of_seats(12, "A")).await;
    let seat_id = seats[0].id;

    let attempts = (0..32).map(|n| {
        let engine = engine.clone();
        tokio::spawn(async move { engine.claim(&Principal::new(format!("user-{n}")), seat_id).await })
    });
    let results: Vec<_> = join_all(attempts).await.into_iter().map(|r| r.unwrap()).collect();

    let winners = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(ReservationError::SeatAlreadyBooked(id)) if *id == seat_id))
        .count();
    assert_eq!(winners, 1);
    assert_eq!(conflicts, 31);

    let confirmed = store.ledger().await.into_iter().filter(|b| b.is_confirmed()).count();
    assert_eq!(confirmed, 1);
    assert_consistent(&store).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_release_of_same_booking_succeeds_once() {
    let (store, engine, seats) = setup(row_of_seats(12, "A")).await;
    let owner = Principal::new("7");
    let booking_id = engine.claim(&owner, seats[0].id).await.unwrap().booking.id;

    let attempts = (0..8).map(|_| {
        let engine = engine.clone();
        let owner = owner.clone();
        tokio::spawn(async move { engine.release(&owner, booking_id).await })
    });
    let results: Vec<_> = join_all(attempts).await.into_iter().map(|r| r.unwrap()).collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, ReservationError::AlreadyCancelled(_))));
    assert_consistent(&store).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_claims_on_distinct_seats_do_not_interfere() {
    let (store, engine, seats) = setup(row_of_seats(14, "ABCDEF")).await;

    let attempts = seats.iter().enumerate().map(|(n, seat)| {
        let engine = engine.clone();
        let seat_id = seat.id;
        tokio::spawn(async move { engine.claim(&Principal::new(n.to_string()), seat_id).await })
    });
    let results = join_all(attempts).await;
    assert!(results.into_iter().all(|r| r.unwrap().is_ok()));

    let queries = BookingQueries::new(store.clone());
    assert!(queries.list_available_seats().await.unwrap().is_empty());
    assert_consistent(&store).await;
}

#[tokio::test]
async fn test_random_operation_sequence_keeps_ledger_and_flags_aligned() {
    let (store, engine, seats) = setup(row_of_seats(20, "ABC")).await;
    let principals: Vec<Principal> = (0..4).map(|n| Principal::new(n.to_string())).collect();
    let mut issued: Vec<(Principal, BookingId)> = Vec::new();
    let mut rng = StdRng::seed_from_u64(0x5EA7);

    for _ in 0..200 {
        if issued.is_empty() || rng.gen_bool(0.55) {
            let principal = &principals[rng.gen_range(0..principals.len())];
            let seat = &seats[rng.gen_range(0..seats.len())];
            match engine.claim(principal, seat.id).await {
                Ok(claimed) => issued.push((principal.clone(), claimed.booking.id)),
                Err(ReservationError::SeatAlreadyBooked(_)) => {}
                Err(other) => panic!("unexpected claim failure: {other}"),
            }
        } else {
            let (owner, booking_id) = issued[rng.gen_range(0..issued.len())].clone();
            let caller = if rng.gen_bool(0.8) {
                owner
            } else {
                principals[rng.gen_range(0..principals.len())].clone()
            };
            match engine.release(&caller, booking_id).await {
                Ok(_)
                | Err(ReservationError::AlreadyCancelled(_))
                | Err(ReservationError::BookingNotFound(_)) => {}
                Err(other) => panic!("unexpected release failure: {other}"),
            }
        }
        assert_consistent(&store).await;
    }
}
