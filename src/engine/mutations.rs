use std::sync::atomic::Ordering;

use chrono::{Datelike, Duration, NaiveDate, NaiveTime};
use tracing::{debug, error, info, warn};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::notify::Change;
use crate::observability::{
    BUSY_REJECTIONS_TOTAL, DUPLICATE_SLOTS_TOTAL, RECORDS_DROPPED_TOTAL, REVERTS_TOTAL,
};
use crate::remote::{NewRecord, RecordPatch, RemoteError};
use crate::revenue::week_monday;

use super::conflict::would_conflict;
use super::ingest::parse_record;
use super::order::sort_appointments;
use super::{count_mutation, timed, AppointmentStore, InFlight, Intent, StoreError};

/// The calendar date a booking lands on. Weekday-only keys resolve to that
/// weekday in the Monday-based week containing `today`.
pub fn anchor_date(key: &DateKey, today: NaiveDate) -> Result<NaiveDate, StoreError> {
    match key {
        DateKey::Date(date) => Ok(*date),
        DateKey::Weekday(label) => {
            let day = parse_weekday(label)
                .ok_or_else(|| StoreError::MalformedDate(format!("unknown weekday {label:?}")))?;
            Ok(week_monday(today) + Duration::days(i64::from(day.num_days_from_monday())))
        }
    }
}

fn validate_request(req: &BookingRequest) -> Result<(), StoreError> {
    if req.service_name.is_empty() {
        return Err(StoreError::MissingService);
    }
    if req.service_name.len() > MAX_SERVICE_LEN {
        return Err(StoreError::LimitExceeded("service name too long"));
    }
    if req.client.len() > MAX_CLIENT_LEN {
        return Err(StoreError::LimitExceeded("client name too long"));
    }
    if !req.price.is_finite() || !(0.0..=MAX_PRICE).contains(&req.price) {
        return Err(StoreError::LimitExceeded("price out of range"));
    }
    Ok(())
}

fn busy(what: String) -> StoreError {
    metrics::counter!(BUSY_REJECTIONS_TOTAL).increment(1);
    debug!("rejecting mutation: {what} has a call in flight");
    StoreError::Busy(what)
}

impl AppointmentStore {
    /// Replace the list with the remote's current contents.
    ///
    /// Records that fail validation are dropped and logged. On a transport
    /// failure the existing list is kept as it was.
    pub async fn load(&self) -> Result<usize, StoreError> {
        self.loads_in_flight.fetch_add(1, Ordering::SeqCst);
        self.notify.set_loading(true);
        let result = self.load_inner().await;
        if self.loads_in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.notify.set_loading(false);
        }
        count_mutation("load", result.is_ok());
        result
    }

    async fn load_inner(&self) -> Result<usize, StoreError> {
        let _serial = self.load_lock.lock().await;
        let fetched_at = self.next_seq();
        let records = timed("list", self.remote().list_appointments())
            .await
            .map_err(|e| {
                error!("load failed: {e}");
                StoreError::LoadFailed(e.to_string())
            })?;

        let mut parsed = Vec::with_capacity(records.len());
        for record in &records {
            match parse_record(record) {
                Ok(appointment) => parsed.push(appointment),
                Err(reason) => {
                    warn!("dropping remote record {}: {reason}", record.id);
                    metrics::counter!(RECORDS_DROPPED_TOTAL).increment(1);
                }
            }
        }
        if parsed.len() > MAX_APPOINTMENTS {
            return Err(StoreError::LimitExceeded("too many appointments"));
        }

        // Remote order is arbitrary; ids are time-ordered, so ties settle in
        // creation order.
        parsed.sort_by_key(|a| a.id);
        sort_appointments(&mut parsed);

        let count = {
            let mut list = self.list.write().await;
            self.overlay_pending(&mut parsed, fetched_at);
            *list = parsed;
            self.publish(&list);
            list.len()
        };
        self.notify.send(Change::Loaded { count });
        info!(
            "loaded {count} appointments ({} dropped)",
            records.len() - count
        );
        Ok(count)
    }

    /// Book a slot. Nothing is added locally until the remote confirms; the
    /// list is then reloaded so the new row arrives with its real id.
    pub async fn book(&self, request: BookingRequest) -> Result<Ulid, StoreError> {
        let result = self.book_inner(request).await;
        count_mutation("book", result.is_ok());
        result
    }

    async fn book_inner(&self, request: BookingRequest) -> Result<Ulid, StoreError> {
        validate_request(&request)?;
        let date = anchor_date(&request.date_key, self.today())?;
        let slot = request.slot();
        let anchored = Slot {
            date_key: DateKey::Date(date),
            time: request.time.clone(),
        };

        let _guard = InFlight::claim(&self.slots_in_flight, anchored.clone())
            .ok_or_else(|| busy(format!("slot {anchored}")))?;

        {
            let list = self.list.read().await;
            if would_conflict(&slot, &list) || would_conflict(&anchored, &list) {
                metrics::counter!(DUPLICATE_SLOTS_TOTAL).increment(1);
                info!("slot {slot} already taken");
                return Err(StoreError::DuplicateSlot(slot));
            }
        }

        let minutes = u32::from(request.time.minutes());
        let start = NaiveTime::from_num_seconds_from_midnight_opt(minutes * 60, 0)
            .ok_or_else(|| StoreError::MalformedTime(request.time.to_string()))?;
        let fields = NewRecord {
            start_time: date.and_time(start).format("%Y-%m-%dT%H:%M:%S").to_string(),
            date: request.date_key.weekday_label(),
            time: request.time.clock().to_string(),
            period: request.time.period().to_string(),
            client: request.client.clone(),
            service: request.service_name.clone(),
            price: request.price,
            status: Status::Pending.to_string(),
        };

        let created = timed("create", self.remote().create_appointment(fields))
            .await
            .map_err(|e| {
                warn!("booking {slot} failed: {e}");
                StoreError::BookingFailed(e.to_string())
            })?;
        info!("booked {} for {slot}", created.id);

        // The booking is durable at this point. If the refresh fails, keep
        // the confirmed row so the slot stays taken.
        if let Err(e) = self.load().await {
            warn!("refresh after booking {} failed: {e}", created.id);
            match parse_record(&created) {
                Ok(appointment) => {
                    let mut list = self.list.write().await;
                    if !list.iter().any(|a| a.id == appointment.id) {
                        list.push(appointment);
                        sort_appointments(&mut list);
                        self.publish(&list);
                    }
                }
                Err(reason) => warn!("created record {} unreadable: {reason}", created.id),
            }
        }
        self.notify.send(Change::Booked { id: created.id });
        Ok(created.id)
    }

    /// Flip pending/completed. Returns the new status, or `None` when no
    /// appointment has this id (nothing is sent to the remote then).
    pub async fn toggle_status(&self, id: Ulid) -> Result<Option<Status>, StoreError> {
        // Claimed before the lookup: a row removed by an in-flight delete is
        // busy, not missing.
        let _guard =
            InFlight::claim(&self.in_flight, id).ok_or_else(|| busy(format!("appointment {id}")))?;

        let prior = {
            let mut list = self.list.write().await;
            let Some(appointment) = list.iter_mut().find(|a| a.id == id) else {
                return Ok(None);
            };
            let prior = appointment.status;
            appointment.status = prior.toggled();
            self.hold(id, Intent::Status(prior.toggled()));
            sort_appointments(&mut list);
            self.publish(&list);
            prior
        };
        let next = prior.toggled();
        self.notify.send(Change::StatusChanged { id, status: next });

        let patch = RecordPatch::status(next.as_str());
        match timed("update", self.remote().update_appointment(id, patch)).await {
            Ok(()) => {
                self.settle(id);
                count_mutation("toggle", true);
                debug!("appointment {id} is now {next}");
                Ok(Some(next))
            }
            Err(e) => {
                {
                    let mut list = self.list.write().await;
                    self.pending.remove(&id);
                    if let Some(appointment) = list.iter_mut().find(|a| a.id == id) {
                        appointment.status = prior;
                    }
                    sort_appointments(&mut list);
                    self.publish(&list);
                }
                self.notify.send(Change::Reverted { id });
                metrics::counter!(REVERTS_TOTAL, "op" => "toggle").increment(1);
                count_mutation("toggle", false);
                warn!("status update for {id} failed, reverted to {prior}: {e}");
                Err(StoreError::UpdateFailed(e.to_string()))
            }
        }
    }

    /// Remove an appointment. Returns the removed row, or `None` when no
    /// appointment has this id. If the remote refuses, the row is put back
    /// where it was.
    pub async fn delete(&self, id: Ulid) -> Result<Option<Appointment>, StoreError> {
        let _guard =
            InFlight::claim(&self.in_flight, id).ok_or_else(|| busy(format!("appointment {id}")))?;

        let (index, removed) = {
            let mut list = self.list.write().await;
            let Some(index) = list.iter().position(|a| a.id == id) else {
                return Ok(None);
            };
            let removed = list.remove(index);
            self.hold(id, Intent::Removed);
            self.publish(&list);
            (index, removed)
        };
        self.notify.send(Change::Deleted { id });

        match timed("delete", self.remote().delete_appointment(id)).await {
            Ok(()) => {
                self.settle(id);
                count_mutation("delete", true);
                debug!("deleted appointment {id}");
                Ok(Some(removed))
            }
            Err(RemoteError::NotFound(_)) => {
                // Already gone remotely: that is the state we wanted.
                self.settle(id);
                count_mutation("delete", true);
                warn!("appointment {id} was already deleted remotely");
                Ok(Some(removed))
            }
            Err(e) => {
                {
                    let mut list = self.list.write().await;
                    self.pending.remove(&id);
                    if !list.iter().any(|a| a.id == id) {
                        let at = index.min(list.len());
                        list.insert(at, removed);
                        sort_appointments(&mut list);
                    }
                    self.publish(&list);
                }
                self.notify.send(Change::Reverted { id });
                metrics::counter!(REVERTS_TOTAL, "op" => "delete").increment(1);
                count_mutation("delete", false);
                warn!("delete of {id} failed, restored: {e}");
                Err(StoreError::DeleteFailed(e.to_string()))
            }
        }
    }
}
