//! Blood unit inventory: counts, lifecycle transitions, reservation, expiry.
//!
//! Every write is a compare-and-swap on the unit's status. A precondition
//! checked here can still be invalidated by a concurrent writer between the
//! read and the write; that case surfaces as [`EngineError::Conflict`].

use chrono::{DateTime, Days, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::StockThresholds;
use crate::models::{BloodType, BloodUnit, UnitStatus};

use super::{Engine, EngineError, EngineResult};

/// Stock classification of one blood type by its ready-unit count.
/// Ordered from worst to best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockLevel {
    OutOfStock,
    LowStock,
    Moderate,
    Good,
}

impl StockLevel {
    pub fn from_ready_count(ready: u32, thresholds: &StockThresholds) -> Self {
        if ready == 0 {
            StockLevel::OutOfStock
        } else if ready < thresholds.low_stock_below {
            StockLevel::LowStock
        } else if ready < thresholds.moderate_below {
            StockLevel::Moderate
        } else {
            StockLevel::Good
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StockLevel::OutOfStock => "out_of_stock",
            StockLevel::LowStock => "low_stock",
            StockLevel::Moderate => "moderate",
            StockLevel::Good => "good",
        }
    }
}

/// Inventory figures for one blood type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryRow {
    pub blood_type: BloodType,
    pub collected: u32,
    pub testing: u32,
    pub ready: u32,
    pub reserved: u32,
    pub used: u32,
    pub expired: u32,
    pub rejected: u32,
    /// ready + testing + reserved
    pub total_active: u32,
    /// Volume of every unit of this type, whatever its status.
    pub total_ml: u64,
    pub ready_ml: u64,
    pub level: StockLevel,
}

impl InventoryRow {
    fn empty(blood_type: BloodType) -> Self {
        Self {
            blood_type,
            collected: 0,
            testing: 0,
            ready: 0,
            reserved: 0,
            used: 0,
            expired: 0,
            rejected: 0,
            total_active: 0,
            total_ml: 0,
            ready_ml: 0,
            level: StockLevel::OutOfStock,
        }
    }
}

/// A unit arriving at the bank.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitIntake {
    pub blood_type: BloodType,
    pub donor_id: Option<String>,
    pub collected_at: DateTime<Utc>,
    /// Defaults to `collected_at` plus the configured shelf life.
    pub expires_at: Option<DateTime<Utc>>,
    /// Defaults to the configured bag volume.
    pub quantity_ml: Option<u32>,
    /// Blood bank receiving the unit, if the host tracks banks.
    pub blood_bank_id: Option<String>,
    pub notes: String,
}

impl UnitIntake {
    pub fn new(blood_type: BloodType, collected_at: DateTime<Utc>) -> Self {
        Self {
            blood_type,
            donor_id: None,
            collected_at,
            expires_at: None,
            quantity_ml: None,
            blood_bank_id: None,
            notes: String::new(),
        }
    }
}

/// Inventory ledger over the `blood_units` table.
pub struct InventoryLedger<'a> {
    engine: Engine<'a>,
}

impl<'a> InventoryLedger<'a> {
    pub fn new(engine: Engine<'a>) -> Self {
        Self { engine }
    }

    pub fn count_by_type_and_status(
        &self,
        blood_type: BloodType,
        status: UnitStatus,
    ) -> EngineResult<u32> {
        Ok(self.engine.db.count_units(blood_type, status)?)
    }

    pub fn classify(&self, blood_type: BloodType) -> EngineResult<StockLevel> {
        let ready = self.count_by_type_and_status(blood_type, UnitStatus::Ready)?;
        Ok(StockLevel::from_ready_count(
            ready,
            &self.engine.config.stock,
        ))
    }

    /// Move a unit along one edge of the lifecycle graph.
    ///
    /// Fails with `InvalidTransition` if the unit is not in `from` or the edge
    /// does not exist. Reservation is not reachable from here: it needs a
    /// request and goes through [`reserve`](Self::reserve). Emits no
    /// notification.
    pub fn transition(
        &self,
        unit_id: &str,
        from: UnitStatus,
        to: UnitStatus,
    ) -> EngineResult<BloodUnit> {
        let unit = self.get(unit_id)?;
        if unit.status != from || to == UnitStatus::Reserved || !from.can_transition_to(to) {
            return Err(EngineError::InvalidTransition {
                entity: "unit",
                id: unit_id.to_string(),
                from: unit.status.to_string(),
                to: to.to_string(),
            });
        }

        // The request link survives into `used`; every other move drops it.
        let reserved_for = match to {
            UnitStatus::Used => unit.reserved_for.clone(),
            _ => None,
        };
        self.swap(unit, to, reserved_for)
    }

    /// Reserve a ready, unexpired unit for an open request.
    pub fn reserve(&self, unit_id: &str, request_id: &str) -> EngineResult<BloodUnit> {
        let unit = self.get(unit_id)?;
        let request = self
            .engine
            .db
            .get_request(request_id)?
            .ok_or_else(|| EngineError::not_found("request", request_id))?;

        if unit.status != UnitStatus::Ready {
            return Err(EngineError::UnitNotReady {
                unit_id: unit.unit_id,
                status: unit.status.to_string(),
            });
        }
        if unit.is_past_expiry(self.engine.clock.now()) {
            return Err(EngineError::UnitNotReady {
                unit_id: unit.unit_id,
                status: format!("{} (past expiry)", unit.status),
            });
        }
        let resolver = self.engine.resolver();
        if !resolver.can_satisfy(unit.blood_type, request.blood_type_needed) {
            return Err(EngineError::TypeMismatch {
                unit_id: unit.unit_id,
                unit_type: unit.blood_type.to_string(),
                needed: request.blood_type_needed.to_string(),
            });
        }
        if !request.status.is_open() {
            return Err(EngineError::InvalidState(format!(
                "request {} is {}",
                request_id, request.status
            )));
        }

        let unit = self.swap(unit, UnitStatus::Reserved, Some(request_id.to_string()))?;
        info!(unit_id, request_id, "unit reserved");
        Ok(unit)
    }

    /// Return a reserved unit to the ready pool.
    pub fn release(&self, unit_id: &str) -> EngineResult<BloodUnit> {
        let unit = self.transition(unit_id, UnitStatus::Reserved, UnitStatus::Ready)?;
        info!(unit_id, "unit released");
        Ok(unit)
    }

    /// Mark a reserved unit as transfused.
    pub fn consume(&self, unit_id: &str) -> EngineResult<BloodUnit> {
        let unit = self.transition(unit_id, UnitStatus::Reserved, UnitStatus::Used)?;
        info!(unit_id, "unit consumed");
        Ok(unit)
    }

    /// Register a newly collected unit.
    pub fn intake(&self, intake: UnitIntake) -> EngineResult<BloodUnit> {
        let config = self.engine.config;
        let quantity_ml = intake.quantity_ml.unwrap_or(config.default_unit_ml);
        if quantity_ml == 0 {
            return Err(EngineError::Validation(
                "unit quantity must be greater than 0 ml".into(),
            ));
        }

        let expires_at = match intake.expires_at {
            Some(expiry) => expiry,
            None => intake
                .collected_at
                .checked_add_days(Days::new(u64::from(config.unit_shelf_life_days)))
                .ok_or_else(|| EngineError::Validation("collection date out of range".into()))?,
        };
        if expires_at < intake.collected_at {
            return Err(EngineError::Validation(
                "unit cannot expire before it was collected".into(),
            ));
        }

        if let Some(donor_id) = intake.donor_id.as_deref() {
            if self.engine.db.get_donor(donor_id)?.is_none() {
                return Err(EngineError::not_found("donor", donor_id));
            }
        }
        if let Some(bank_id) = intake.blood_bank_id.as_deref() {
            if self.engine.db.get_blood_bank(bank_id)?.is_none() {
                return Err(EngineError::not_found("blood bank", bank_id));
            }
        }

        let mut unit = BloodUnit::new(
            intake.blood_type,
            intake.donor_id,
            intake.collected_at,
            Some(expires_at),
            quantity_ml,
            self.engine.clock.now(),
        );
        unit.notes = intake.notes;
        unit.blood_bank_id = intake.blood_bank_id;
        self.engine.db.insert_unit(&unit)?;

        info!(
            unit_id = %unit.unit_id,
            blood_type = %unit.blood_type,
            quantity_ml,
            "unit taken into inventory"
        );
        Ok(unit)
    }

    /// Expire every unit still in circulation whose expiry lies before `as_of`.
    ///
    /// Returns the IDs of the units expired by this call. A second run with
    /// the same `as_of` finds nothing left to do.
    pub fn expire_overdue(&self, as_of: DateTime<Utc>) -> EngineResult<Vec<String>> {
        let now = self.engine.clock.now();
        let mut expired = Vec::new();

        for unit in self.engine.db.list_overdue_units(as_of)? {
            let swapped = self.engine.db.update_unit_status(
                &unit.unit_id,
                unit.status,
                UnitStatus::Expired,
                None,
                now,
            )?;
            if swapped {
                debug!(unit_id = %unit.unit_id, from = %unit.status, "unit expired");
                expired.push(unit.unit_id);
            } else {
                debug!(unit_id = %unit.unit_id, "unit moved concurrently, skipped");
            }
        }

        if !expired.is_empty() {
            info!(count = expired.len(), "expired overdue units");
        }
        Ok(expired)
    }

    /// One row per blood type in enumeration order, across every bank.
    pub fn summary(&self) -> EngineResult<Vec<InventoryRow>> {
        self.summarize(None)
    }

    /// [`summary`](Self::summary) restricted to the units held by one bank.
    pub fn summary_for_bank(&self, blood_bank_id: &str) -> EngineResult<Vec<InventoryRow>> {
        if self.engine.db.get_blood_bank(blood_bank_id)?.is_none() {
            return Err(EngineError::not_found("blood bank", blood_bank_id));
        }
        self.summarize(Some(blood_bank_id))
    }

    fn summarize(&self, blood_bank_id: Option<&str>) -> EngineResult<Vec<InventoryRow>> {
        let mut rows: Vec<InventoryRow> =
            BloodType::ALL.into_iter().map(InventoryRow::empty).collect();

        for tally in self.engine.db.tally_units(blood_bank_id)? {
            let row = &mut rows[tally.blood_type.index()];
            row.total_ml += tally.total_ml;
            match tally.status {
                UnitStatus::Collected => row.collected += tally.units,
                UnitStatus::Testing => row.testing += tally.units,
                UnitStatus::Ready => {
                    row.ready += tally.units;
                    row.ready_ml += tally.total_ml;
                }
                UnitStatus::Reserved => row.reserved += tally.units,
                UnitStatus::Used => row.used += tally.units,
                UnitStatus::Expired => row.expired += tally.units,
                UnitStatus::Rejected => row.rejected += tally.units,
            }
        }

        let thresholds = &self.engine.config.stock;
        for row in &mut rows {
            row.total_active = row.ready + row.testing + row.reserved;
            row.level = StockLevel::from_ready_count(row.ready, thresholds);
        }
        Ok(rows)
    }

    /// Unexpired ready units able to satisfy `needed` under the configured
    /// rule, oldest collection first.
    pub fn ready_units_for(&self, needed: BloodType) -> EngineResult<Vec<BloodUnit>> {
        let now = self.engine.clock.now();
        let mut units = Vec::new();
        for donor_type in self.engine.resolver().compatible_donor_types(needed) {
            let ready = self.engine.db.list_units(donor_type, UnitStatus::Ready)?;
            units.extend(ready.into_iter().filter(|unit| !unit.is_past_expiry(now)));
        }
        units.sort_by(|a, b| a.collected_at.cmp(&b.collected_at));
        Ok(units)
    }

    pub(crate) fn get(&self, unit_id: &str) -> EngineResult<BloodUnit> {
        self.engine
            .db
            .get_unit(unit_id)?
            .ok_or_else(|| EngineError::not_found("unit", unit_id))
    }

    /// Write `to` if the unit is still in the status it was read in.
    fn swap(
        &self,
        mut unit: BloodUnit,
        to: UnitStatus,
        reserved_for: Option<String>,
    ) -> EngineResult<BloodUnit> {
        let now = self.engine.clock.now();
        let swapped = self.engine.db.update_unit_status(
            &unit.unit_id,
            unit.status,
            to,
            reserved_for.as_deref(),
            now,
        )?;
        if !swapped {
            return Err(EngineError::conflict("unit", &unit.unit_id));
        }

        unit.status = to;
        unit.reserved_for = reserved_for;
        unit.updated_at = now;
        Ok(unit)
    }
}
