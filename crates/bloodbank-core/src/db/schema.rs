//! SQLite schema definition.

/// Complete database schema for the blood bank engine.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Profiles (1:1 extensions of an external user identity)
-- ============================================================================

CREATE TABLE IF NOT EXISTS donors (
    donor_id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL UNIQUE,
    blood_type TEXT,                              -- NULL until lab-confirmed
    last_donation_date TEXT,
    is_eligible INTEGER NOT NULL DEFAULT 0,
    is_deferred INTEGER NOT NULL DEFAULT 0,
    health_status TEXT NOT NULL DEFAULT '',
    medical_conditions TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    CHECK (is_eligible = 0 OR blood_type IS NOT NULL)
);

CREATE INDEX IF NOT EXISTS idx_donors_type_eligible ON donors(blood_type, is_eligible);

CREATE TABLE IF NOT EXISTS patients (
    patient_id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL UNIQUE,
    blood_type_needed TEXT NOT NULL,
    urgency TEXT NOT NULL,
    units_needed INTEGER NOT NULL CHECK (units_needed >= 1),
    medical_condition TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- ============================================================================
-- Blood Units
-- ============================================================================

CREATE TABLE IF NOT EXISTS blood_banks (
    blood_bank_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    hospital TEXT NOT NULL,
    address TEXT NOT NULL DEFAULT '',
    phone TEXT NOT NULL DEFAULT '',
    email TEXT NOT NULL DEFAULT '',
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS blood_units (
    unit_id TEXT PRIMARY KEY,
    blood_type TEXT NOT NULL,
    donor_id TEXT REFERENCES donors(donor_id) ON DELETE SET NULL,
    collected_at TEXT NOT NULL,
    expires_at TEXT,
    quantity_ml INTEGER NOT NULL CHECK (quantity_ml > 0),
    status TEXT NOT NULL DEFAULT 'collected',     -- collected, testing, ready, reserved, used, expired, rejected
    reserved_for TEXT REFERENCES blood_requests(request_id) ON DELETE SET NULL,
    test_results TEXT NOT NULL DEFAULT '',
    notes TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    blood_bank_id TEXT REFERENCES blood_banks(blood_bank_id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_units_type_status ON blood_units(blood_type, status);
CREATE INDEX IF NOT EXISTS idx_units_expiry ON blood_units(expires_at);
CREATE INDEX IF NOT EXISTS idx_units_bank ON blood_units(blood_bank_id, blood_type, status);

-- ============================================================================
-- Requests & Matches
-- ============================================================================

CREATE TABLE IF NOT EXISTS blood_requests (
    request_id TEXT PRIMARY KEY,
    patient_id TEXT NOT NULL REFERENCES patients(patient_id) ON DELETE CASCADE,
    blood_type_needed TEXT NOT NULL,
    quantity_units INTEGER NOT NULL CHECK (quantity_units >= 1),
    urgency TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',       -- pending, approved, fulfilled, rejected, cancelled
    fulfillment_type TEXT,                        -- donor_match, blood_bank
    notes TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_requests_patient ON blood_requests(patient_id);
CREATE INDEX IF NOT EXISTS idx_requests_status ON blood_requests(status, urgency);

-- One match per (donor, request) pair, whatever its status: a pair that has
-- already been answered is never invited again.
CREATE TABLE IF NOT EXISTS donor_patient_matches (
    match_id TEXT PRIMARY KEY,
    donor_id TEXT NOT NULL REFERENCES donors(donor_id) ON DELETE CASCADE,
    patient_id TEXT NOT NULL REFERENCES patients(patient_id) ON DELETE CASCADE,
    request_id TEXT NOT NULL REFERENCES blood_requests(request_id) ON DELETE CASCADE,
    status TEXT NOT NULL DEFAULT 'pending',       -- pending, accepted, declined, completed, cancelled
    donor_response TEXT NOT NULL DEFAULT '',
    patient_response TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (donor_id, request_id)
);

CREATE INDEX IF NOT EXISTS idx_matches_request ON donor_patient_matches(request_id, status);
CREATE INDEX IF NOT EXISTS idx_matches_donor ON donor_patient_matches(donor_id);

-- ============================================================================
-- Appointments, Lab Tests, Transfusions
-- ============================================================================

CREATE TABLE IF NOT EXISTS appointments (
    appointment_id TEXT PRIMARY KEY,
    donor_id TEXT NOT NULL REFERENCES donors(donor_id) ON DELETE CASCADE,
    appointment_date TEXT NOT NULL,
    appointment_time TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'scheduled',     -- scheduled, confirmed, completed, cancelled, no_show
    notes TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_appointments_donor ON appointments(donor_id);

CREATE TABLE IF NOT EXISTS blood_tests (
    test_id TEXT PRIMARY KEY,
    unit_id TEXT REFERENCES blood_units(unit_id) ON DELETE CASCADE,
    donor_id TEXT REFERENCES donors(donor_id) ON DELETE CASCADE,
    test_type TEXT NOT NULL,                      -- pre_donation, post_collection
    status TEXT NOT NULL,                         -- pending, in_progress, completed, failed
    results TEXT NOT NULL DEFAULT '',
    lab_technician TEXT,
    tested_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_tests_donor ON blood_tests(donor_id);
CREATE INDEX IF NOT EXISTS idx_tests_unit ON blood_tests(unit_id);

CREATE TABLE IF NOT EXISTS transfusion_reports (
    report_id TEXT PRIMARY KEY,
    patient_id TEXT NOT NULL REFERENCES patients(patient_id) ON DELETE CASCADE,
    unit_id TEXT REFERENCES blood_units(unit_id) ON DELETE SET NULL,
    outcome TEXT NOT NULL,                        -- successful, complication, failed
    notes TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL
);

-- ============================================================================
-- Notifications
-- ============================================================================

CREATE TABLE IF NOT EXISTS notifications (
    notification_id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    category TEXT NOT NULL,
    title TEXT NOT NULL,
    message TEXT NOT NULL,
    priority TEXT NOT NULL DEFAULT 'medium',
    is_read INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_notifications_user ON notifications(user_id, is_read);
"#;
