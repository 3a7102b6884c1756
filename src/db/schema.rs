//! Database schema for Doru

pub const MIGRATIONS: &str = r#"
PRAGMA foreign_keys = ON;

-- Reference data
CREATE TABLE IF NOT EXISTS cities (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS countries (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);

-- Accounts (drugstores are users with user_type = 'DRUGSTORE')
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    phone_number TEXT NOT NULL,
    password_hash TEXT NOT NULL,
    user_type TEXT NOT NULL CHECK (user_type IN ('DRUGSTORE', 'CUSTOMER')),
    confirmation_code TEXT,
    confirmed INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL
);

-- Bearer tokens handed out at login
CREATE TABLE IF NOT EXISTS sessions (
    token TEXT PRIMARY KEY,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS drugstores (
    drugstore_id INTEGER PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
    drugstore_name TEXT NOT NULL,
    address TEXT NOT NULL,
    city_id INTEGER NOT NULL REFERENCES cities(id),
    latitude REAL NOT NULL,
    longitude REAL NOT NULL,
    drugstore_photo_path TEXT
);

-- One row per open weekday
CREATE TABLE IF NOT EXISTS drugstores_work_days (
    drugstore_id INTEGER NOT NULL REFERENCES drugstores(drugstore_id) ON DELETE CASCADE,
    work_day TEXT NOT NULL CHECK (work_day IN
        ('MONDAY', 'TUESDAY', 'WEDNESDAY', 'THURSDAY', 'FRIDAY', 'SATURDAY', 'SUNDAY')),
    time_start TEXT NOT NULL,
    time_end TEXT NOT NULL,
    PRIMARY KEY (drugstore_id, work_day)
);

-- Drug catalog
CREATE TABLE IF NOT EXISTS drugs (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    country_id INTEGER REFERENCES countries(id)
);

-- Stock per drugstore
CREATE TABLE IF NOT EXISTS drugstore_drugs (
    drugstore_id INTEGER NOT NULL REFERENCES drugstores(drugstore_id) ON DELETE CASCADE,
    drugs_id INTEGER NOT NULL REFERENCES drugs(id),
    price REAL NOT NULL CHECK (price >= 0),
    existence INTEGER NOT NULL DEFAULT 1,
    PRIMARY KEY (drugstore_id, drugs_id)
);

CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);
CREATE INDEX IF NOT EXISTS idx_drugstores_city ON drugstores(city_id);
CREATE INDEX IF NOT EXISTS idx_drugs_name ON drugs(name);
CREATE INDEX IF NOT EXISTS idx_drugstore_drugs_drug ON drugstore_drugs(drugs_id);
"#;
