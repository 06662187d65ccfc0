use super::*;

use std::time::Duration;

use chrono::{Datelike, NaiveDate};

use crate::model::*;
use crate::notify::Change;
use crate::remote::{MemoryRemote, Op, RemoteRecord};
use crate::time::{Period, TimeOfDay};

/// Thursday of the week starting Monday 2026-10-12.
fn thursday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 15).unwrap()
}

fn store_on(remote: Arc<MemoryRemote>) -> AppointmentStore {
    AppointmentStore::new(remote, Arc::new(NotifyHub::new())).with_clock(thursday)
}

fn t(clock: &str, period: Period) -> TimeOfDay {
    TimeOfDay::parse(clock, period).unwrap()
}

fn request(key: &str, clock: &str, period: Period) -> BookingRequest {
    BookingRequest::new(DateKey::parse(key).unwrap(), t(clock, period), "Ana", "Haircut", 25.0)
}

/// Appointment for pure ordering/conflict tests; `key` is a date or weekday.
fn appt(key: &str, clock: &str, period: Period) -> Appointment {
    let date_key = DateKey::parse(key).unwrap();
    Appointment {
        id: Ulid::new(),
        weekday_label: date_key.weekday_label(),
        iso_date: match date_key {
            DateKey::Date(d) => Some(d),
            DateKey::Weekday(_) => None,
        },
        time: t(clock, period),
        client: "Client".into(),
        service_name: "Haircut".into(),
        price: 25.0,
        status: Status::Pending,
    }
}

fn keys(list: &[Appointment]) -> Vec<String> {
    list.iter().map(|a| format!("{} {}", a.date_key(), a.time)).collect()
}

// ── Ordering ─────────────────────────────────────────────

#[test]
fn sorts_by_weekday_then_period_then_minutes() {
    let mut list = vec![
        appt("Tuesday", "09:00", Period::Am),
        appt("Monday", "01:00", Period::Pm),
        appt("Monday", "12:30", Period::Pm),
        appt("Monday", "11:00", Period::Am),
        appt("Monday", "12:15", Period::Am),
    ];
    sort_appointments(&mut list);
    assert_eq!(
        keys(&list),
        vec![
            "Monday 12:15 AM",
            "Monday 11:00 AM",
            "Monday 12:30 PM",
            "Monday 01:00 PM",
            "Tuesday 09:00 AM",
        ]
    );
}

#[test]
fn dates_compare_before_weekdays() {
    let mut list = vec![
        appt("2026-10-20", "09:00", Period::Am),
        appt("Monday", "09:00", Period::Am),
        appt("2026-10-13", "05:00", Period::Pm),
        appt("2026-10-13", "08:00", Period::Am),
    ];
    sort_appointments(&mut list);
    assert_eq!(
        keys(&list),
        vec![
            "2026-10-13 08:00 AM",
            "2026-10-13 05:00 PM",
            "2026-10-20 09:00 AM",
            "Monday 09:00 AM",
        ]
    );
}

#[test]
fn unknown_weekday_sorts_last() {
    let mut holiday = appt("Monday", "08:00", Period::Am);
    holiday.weekday_label = "Feriado".into();
    let mut list = vec![holiday, appt("Sunday", "11:00", Period::Pm)];
    sort_appointments(&mut list);
    assert_eq!(list[0].weekday_label, "Sunday");
    assert_eq!(list[1].weekday_label, "Feriado");
}

#[test]
fn sort_is_stable_and_idempotent() {
    let mut first = appt("Monday", "10:00", Period::Am);
    first.client = "first".into();
    let mut second = appt("Monday", "10:00", Period::Am);
    second.client = "second".into();
    let mut list = vec![appt("Friday", "10:00", Period::Am), first, second];

    sort_appointments(&mut list);
    let once = list.clone();
    sort_appointments(&mut list);
    assert_eq!(list, once);
    assert_eq!(list[0].client, "first");
    assert_eq!(list[1].client, "second");
}

// ── Conflict policy ──────────────────────────────────────

#[test]
fn pending_slot_conflicts_until_completed() {
    let mut existing = vec![appt("Monday", "10:00", Period::Am)];
    let slot = Slot {
        date_key: DateKey::Weekday("Monday".into()),
        time: t("10:00", Period::Am),
    };
    assert!(would_conflict(&slot, &existing));

    existing[0].status = Status::Completed;
    assert!(!would_conflict(&slot, &existing));
}

#[test]
fn adjacent_minutes_and_other_days_do_not_conflict() {
    let existing = vec![appt("2026-10-12", "09:00", Period::Am)];
    let date = DateKey::parse("2026-10-12").unwrap();
    let cases = [
        Slot { date_key: date.clone(), time: t("09:01", Period::Am) },
        Slot { date_key: date.clone(), time: t("09:00", Period::Pm) },
        Slot { date_key: DateKey::parse("2026-10-19").unwrap(), time: t("09:00", Period::Am) },
        Slot { date_key: DateKey::Weekday("Monday".into()), time: t("09:00", Period::Am) },
    ];
    for slot in cases {
        assert!(!would_conflict(&slot, &existing), "{slot} should be free");
    }
    let same = Slot { date_key: date, time: t("9", Period::Am) };
    assert!(would_conflict(&same, &existing));
}

// ── Booking ──────────────────────────────────────────────

#[tokio::test]
async fn book_then_reload_assigns_remote_id() {
    let remote = Arc::new(MemoryRemote::new());
    let store = store_on(remote.clone());

    let id = store.book(request("2026-10-13", "03:00", Period::Pm)).await.unwrap();

    let list = store.appointments().await;
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].id, id);
    assert_eq!(list[0].status, Status::Pending);
    assert_eq!(list[0].weekday_label, "Tuesday");

    let stored = remote.get(&id).unwrap();
    assert_eq!(stored.start_time.as_deref(), Some("2026-10-13T15:00:00"));
    assert_eq!(stored.date.as_deref(), Some("Tuesday"));
    assert_eq!(stored.time.as_deref(), Some("03:00"));
    assert_eq!(stored.period.as_deref(), Some("PM"));
}

#[tokio::test]
async fn duplicate_pending_slot_is_refused_without_remote_call() {
    let remote = Arc::new(MemoryRemote::new());
    let store = store_on(remote.clone());
    store.book(request("2026-10-12", "10:00", Period::Am)).await.unwrap();

    let result = store.book(request("2026-10-12", "10:00", Period::Am)).await;
    assert!(matches!(result, Err(StoreError::DuplicateSlot(_))));
    assert_eq!(store.len().await, 1);
    assert_eq!(remote.call_count(Op::Create), 1);
}

#[tokio::test]
async fn completed_slot_can_be_rebooked() {
    let remote = Arc::new(MemoryRemote::new());
    let store = store_on(remote);
    let first = store.book(request("2026-10-12", "10:00", Period::Am)).await.unwrap();
    store.toggle_status(first).await.unwrap();

    let second = store.book(request("2026-10-12", "10:00", Period::Am)).await.unwrap();
    assert_ne!(first, second);
    assert_eq!(store.len().await, 2);
}

#[tokio::test]
async fn weekday_booking_lands_in_current_week() {
    let remote = Arc::new(MemoryRemote::new());
    let store = store_on(remote);
    let id = store.book(request("Miércoles", "10:00", Period::Am)).await.unwrap();

    let booked = store.get(id).await.unwrap();
    assert_eq!(booked.iso_date, NaiveDate::from_ymd_opt(2026, 10, 14));
    assert_eq!(booked.iso_date.unwrap().weekday(), chrono::Weekday::Wed);

    for key in ["2026-10-14", "Wednesday"] {
        let again = store.book(request(key, "10:00", Period::Am)).await;
        assert!(matches!(again, Err(StoreError::DuplicateSlot(_))), "{key}");
    }
}

#[tokio::test]
async fn failed_booking_leaves_no_row() {
    let remote = Arc::new(MemoryRemote::new());
    remote.fail(Op::Create);
    let store = store_on(remote.clone());

    let result = store.book(request("2026-10-12", "10:00", Period::Am)).await;
    assert!(matches!(result, Err(StoreError::BookingFailed(_))));
    assert!(store.is_empty().await);
    assert!(remote.is_empty());
}

#[tokio::test]
async fn invalid_requests_never_reach_the_remote() {
    let remote = Arc::new(MemoryRemote::new());
    let store = store_on(remote.clone());

    let mut no_service = request("2026-10-12", "10:00", Period::Am);
    no_service.service_name.clear();
    tokio_test::assert_err!(store.book(no_service).await);

    let mut negative = request("2026-10-12", "10:00", Period::Am);
    negative.price = -1.0;
    assert_eq!(
        store.book(negative).await,
        Err(StoreError::LimitExceeded("price out of range"))
    );

    let mut unknown_day = request("2026-10-12", "10:00", Period::Am);
    unknown_day.date_key = DateKey::Weekday("Someday".into());
    assert!(matches!(
        store.book(unknown_day).await,
        Err(StoreError::MalformedDate(_))
    ));

    assert_eq!(remote.call_count(Op::Create), 0);
}

// ── Status toggle ────────────────────────────────────────

#[tokio::test]
async fn toggle_unknown_id_is_noop() {
    let remote = Arc::new(MemoryRemote::new());
    let store = store_on(remote.clone());
    store.book(request("2026-10-12", "10:00", Period::Am)).await.unwrap();
    let before = store.appointments().await;

    assert_eq!(store.toggle_status(Ulid::new()).await, Ok(None));
    assert_eq!(store.appointments().await, before);
    assert_eq!(remote.call_count(Op::Update), 0);
}

#[tokio::test]
async fn toggle_persists_and_flips_back() {
    let remote = Arc::new(MemoryRemote::new());
    let store = store_on(remote.clone());
    let id = store.book(request("2026-10-12", "10:00", Period::Am)).await.unwrap();

    let status = tokio_test::assert_ok!(store.toggle_status(id).await);
    assert_eq!(status, Some(Status::Completed));
    assert_eq!(remote.get(&id).unwrap().status.as_deref(), Some("completed"));

    assert_eq!(store.toggle_status(id).await, Ok(Some(Status::Pending)));
    assert_eq!(store.get(id).await.unwrap().status, Status::Pending);
}

#[tokio::test]
async fn failed_toggle_reverts_status() {
    let remote = Arc::new(MemoryRemote::new());
    let store = store_on(remote.clone());
    let id = store.book(request("2026-10-12", "10:00", Period::Am)).await.unwrap();
    let mut changes = store.changes();

    remote.fail(Op::Update);
    let result = store.toggle_status(id).await;
    assert!(matches!(result, Err(StoreError::UpdateFailed(_))));
    assert_eq!(store.get(id).await.unwrap().status, Status::Pending);
    assert_eq!(remote.get(&id).unwrap().status.as_deref(), Some("pending"));

    assert_eq!(
        changes.recv().await.unwrap(),
        Change::StatusChanged { id, status: Status::Completed }
    );
    assert_eq!(changes.recv().await.unwrap(), Change::Reverted { id });
}

#[tokio::test]
async fn second_mutation_while_in_flight_is_busy() {
    let remote = Arc::new(MemoryRemote::new().with_latency(Duration::from_millis(20)));
    let store = store_on(remote.clone());
    let id = store.book(request("2026-10-12", "10:00", Period::Am)).await.unwrap();

    let (first, second) = futures::join!(store.toggle_status(id), store.toggle_status(id));
    assert_eq!(first, Ok(Some(Status::Completed)));
    assert!(matches!(second, Err(StoreError::Busy(_))));

    let (toggle, delete) = futures::join!(store.toggle_status(id), store.delete(id));
    assert_eq!(toggle, Ok(Some(Status::Pending)));
    assert!(matches!(delete, Err(StoreError::Busy(_))));

    assert_eq!(remote.call_count(Op::Update), 2);
    assert_eq!(remote.call_count(Op::Delete), 0);
    assert!(store.in_flight.is_empty());
}

#[tokio::test]
async fn concurrent_bookings_of_one_slot_are_busy() {
    let remote = Arc::new(MemoryRemote::new().with_latency(Duration::from_millis(20)));
    let store = store_on(remote.clone());

    let (a, b) = futures::join!(
        store.book(request("2026-10-12", "10:00", Period::Am)),
        store.book(request("Monday", "10:00", Period::Am)),
    );
    assert!(a.is_ok());
    assert!(matches!(b, Err(StoreError::Busy(_))));
    assert_eq!(remote.call_count(Op::Create), 1);
    assert!(store.slots_in_flight.is_empty());
}

// ── Delete ───────────────────────────────────────────────

#[tokio::test]
async fn delete_removes_locally_and_remotely() {
    let remote = Arc::new(MemoryRemote::new());
    let store = store_on(remote.clone());
    let id = store.book(request("2026-10-12", "10:00", Period::Am)).await.unwrap();

    let removed = store.delete(id).await.unwrap().unwrap();
    assert_eq!(removed.id, id);
    assert!(store.is_empty().await);
    assert!(remote.is_empty());
}

#[tokio::test]
async fn delete_unknown_id_is_noop() {
    let remote = Arc::new(MemoryRemote::new());
    let store = store_on(remote.clone());
    assert_eq!(store.delete(Ulid::new()).await, Ok(None));
    assert_eq!(remote.call_count(Op::Delete), 0);
}

#[tokio::test]
async fn failed_delete_restores_sorted_position() {
    let remote = Arc::new(MemoryRemote::new());
    let store = store_on(remote.clone());
    for clock in ["09:00", "10:00", "11:00"] {
        store.book(request("2026-10-12", clock, Period::Am)).await.unwrap();
    }
    let before = store.appointments().await;
    let middle = before[1].id;

    remote.fail(Op::Delete);
    let result = store.delete(middle).await;
    assert!(matches!(result, Err(StoreError::DeleteFailed(_))));
    assert_eq!(store.appointments().await, before);
    assert_eq!(store.subscribe().borrow().appointments.as_slice(), before.as_slice());
}

#[tokio::test]
async fn failed_delete_restores_position_among_ties() {
    let remote = Arc::new(MemoryRemote::new());
    let store = store_on(remote.clone());
    let first = store.book(request("2026-10-12", "10:00", Period::Am)).await.unwrap();
    store.toggle_status(first).await.unwrap();
    let second = store.book(request("2026-10-12", "10:00", Period::Am)).await.unwrap();
    let before = store.appointments().await;
    assert_eq!(before.iter().map(|a| a.id).collect::<Vec<_>>(), vec![first, second]);

    remote.fail(Op::Delete);
    assert!(store.delete(first).await.is_err());
    assert_eq!(store.appointments().await, before);
}

// ── Load ─────────────────────────────────────────────────

#[tokio::test]
async fn failed_load_keeps_current_list() {
    let remote = Arc::new(MemoryRemote::new());
    let store = store_on(remote.clone());
    store.book(request("2026-10-12", "10:00", Period::Am)).await.unwrap();
    let before = store.appointments().await;

    remote.fail(Op::List);
    assert!(matches!(store.load().await, Err(StoreError::LoadFailed(_))));
    assert_eq!(store.appointments().await, before);
    assert!(!store.is_loading());
    assert!(!store.subscribe().borrow().loading);
}

#[tokio::test]
async fn load_drops_invalid_records_and_sorts() {
    let remote = Arc::new(MemoryRemote::new());
    let raw = |json: serde_json::Value| -> RemoteRecord {
        let mut value = json;
        value["id"] = serde_json::Value::String(Ulid::new().to_string());
        serde_json::from_value(value).unwrap()
    };
    remote.insert_raw(raw(serde_json::json!({
        "date": "Martes", "time": "09:00", "period": "AM", "service": "Beard", "price": 15.0,
    })));
    remote.insert_raw(raw(serde_json::json!({
        "start_time": "2026-10-12T16:00:00", "service": "Haircut", "price": 25.0,
        "status": "completed",
    })));
    remote.insert_raw(raw(serde_json::json!({
        "date": "Lunes", "time": "10:00", "period": "AM", "price": 15.0,
    })));
    remote.insert_raw(raw(serde_json::json!({ "service": "Haircut", "price": 25.0 })));

    let store = store_on(remote);
    assert_eq!(store.load().await, Ok(2));

    let list = store.appointments().await;
    assert_eq!(keys(&list), vec!["2026-10-12 04:00 PM", "Tuesday 09:00 AM"]);
    assert_eq!(list[0].status, Status::Completed);
}

#[tokio::test]
async fn by_date_key_and_next_pending() {
    let remote = Arc::new(MemoryRemote::new());
    let store = store_on(remote);
    let early = store.book(request("2026-10-12", "09:00", Period::Am)).await.unwrap();
    let later = store.book(request("2026-10-12", "02:00", Period::Pm)).await.unwrap();
    store.book(request("2026-10-13", "09:00", Period::Am)).await.unwrap();

    let monday = store.by_date_key(&DateKey::parse("2026-10-12").unwrap()).await;
    assert_eq!(monday.iter().map(|a| a.id).collect::<Vec<_>>(), vec![early, later]);

    store.toggle_status(early).await.unwrap();
    assert_eq!(store.next_pending().await.map(|a| a.id), Some(later));
}

// ── Reloads overlapping mutations ────────────────────────

fn slow_store() -> (Arc<MemoryRemote>, AppointmentStore) {
    let remote = Arc::new(MemoryRemote::new().with_latency(Duration::from_millis(20)));
    (remote.clone(), store_on(remote))
}

/// Starts `mutation` shortly after a reload has begun fetching, so the fetch
/// still sees the pre-mutation remote state.
async fn during_reload<T>(
    store: &AppointmentStore,
    mutation: impl std::future::Future<Output = T>,
) -> T {
    let (loaded, out) = futures::join!(store.load(), async {
        tokio::time::sleep(Duration::from_millis(5)).await;
        mutation.await
    });
    assert!(loaded.is_ok());
    out
}

#[tokio::test]
async fn reload_does_not_resurrect_confirmed_delete() {
    let (remote, store) = slow_store();
    let id = store.book(request("2026-10-12", "10:00", Period::Am)).await.unwrap();

    let deleted = during_reload(&store, store.delete(id)).await;
    assert!(deleted.unwrap().is_some());
    assert!(store.is_empty().await);
    assert!(remote.is_empty());
    assert!(store.subscribe().borrow().appointments.is_empty());
}

#[tokio::test]
async fn failed_delete_during_reload_restores_one_row() {
    let (remote, store) = slow_store();
    let id = store.book(request("2026-10-12", "10:00", Period::Am)).await.unwrap();
    remote.fail(Op::Delete);

    let deleted = during_reload(&store, store.delete(id)).await;
    assert!(matches!(deleted, Err(StoreError::DeleteFailed(_))));
    let ids: Vec<Ulid> = store.appointments().await.iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![id]);
    assert!(store.pending.is_empty());
}

#[tokio::test]
async fn reload_keeps_confirmed_toggle() {
    let (remote, store) = slow_store();
    let id = store.book(request("2026-10-12", "10:00", Period::Am)).await.unwrap();

    let toggled = during_reload(&store, store.toggle_status(id)).await;
    assert_eq!(toggled, Ok(Some(Status::Completed)));
    assert_eq!(store.get(id).await.unwrap().status, Status::Completed);
    assert_eq!(remote.get(&id).unwrap().status.as_deref(), Some("completed"));

    // A fetch started after confirmation already shows it; nothing is held.
    store.load().await.unwrap();
    assert_eq!(store.get(id).await.unwrap().status, Status::Completed);
    assert!(store.pending.is_empty());
}

#[tokio::test]
async fn toggle_while_delete_in_flight_is_busy() {
    let (remote, store) = slow_store();
    let id = store.book(request("2026-10-12", "10:00", Period::Am)).await.unwrap();
    remote.fail(Op::Delete);

    let (deleted, toggled) = futures::join!(store.delete(id), store.toggle_status(id));
    assert!(matches!(deleted, Err(StoreError::DeleteFailed(_))));
    assert!(matches!(toggled, Err(StoreError::Busy(_))));
    assert_eq!(store.get(id).await.unwrap().status, Status::Pending);
    assert_eq!(remote.call_count(Op::Update), 0);

    let (first, second) = futures::join!(store.delete(id), store.delete(id));
    assert!(first.is_err());
    assert!(matches!(second, Err(StoreError::Busy(_))));
}

#[tokio::test]
async fn confirmed_booking_holds_slot_when_refresh_fails() {
    let remote = Arc::new(MemoryRemote::new());
    let store = store_on(remote.clone());
    remote.fail(Op::List);

    let id = store.book(request("2026-10-12", "10:00", Period::Am)).await.unwrap();
    assert_eq!(store.get(id).await.map(|a| a.status), Some(Status::Pending));

    let again = store.book(request("Monday", "10:00", Period::Am)).await;
    assert!(matches!(again, Err(StoreError::DuplicateSlot(_))));
    assert_eq!(remote.call_count(Op::Create), 1);
}
