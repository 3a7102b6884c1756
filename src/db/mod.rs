//! Database layer for Doru

mod models;
mod schema;

pub use models::*;

use crate::schedule::ScheduleGroup;
use anyhow::Result;
use rusqlite::functions::FunctionFlags;
use rusqlite::params_from_iter;
use std::sync::Arc;
use tokio_rusqlite::Connection;
use tracing::{debug, info};

/// Database handle for Doru
#[derive(Clone, Debug)]
pub struct Database {
    conn: Arc<Connection>,
}

impl Database {
    /// Create a new database connection
    pub async fn new(path: &str) -> Result<Self> {
        let conn = Connection::open(path).await?;
        Self::with_connection(conn).await
    }

    /// Open a private in-memory database
    pub async fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::with_connection(conn).await
    }

    async fn with_connection(conn: Connection) -> Result<Self> {
        conn.call(|conn| {
            register_functions(conn)?;
            Ok(())
        })
        .await?;
        Ok(Self {
            conn: Arc::new(conn),
        })
    }

    /// Run database migrations
    pub async fn migrate(&self) -> Result<()> {
        self.conn
            .call(|conn| {
                conn.execute_batch(schema::MIGRATIONS)?;
                Ok(())
            })
            .await?;
        info!("Database migrations complete");
        Ok(())
    }

    // ==================== Reference Data ====================

    /// Add a city, returning its id
    pub async fn add_city(&self, name: &str) -> Result<i64> {
        let name = name.to_string();
        self.conn
            .call(move |conn| {
                conn.execute("INSERT INTO cities (name) VALUES (?)", [&name])?;
                Ok(conn.last_insert_rowid())
            })
            .await
            .map_err(Into::into)
    }

    /// Check whether a city exists
    pub async fn city_exists(&self, city_id: i64) -> Result<bool> {
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare("SELECT 1 FROM cities WHERE id = ?")?;
                Ok(stmt.exists([city_id])?)
            })
            .await
            .map_err(Into::into)
    }

    /// Add a country, returning its id
    pub async fn add_country(&self, name: &str) -> Result<i64> {
        let name = name.to_string();
        self.conn
            .call(move |conn| {
                conn.execute("INSERT INTO countries (name) VALUES (?)", [&name])?;
                Ok(conn.last_insert_rowid())
            })
            .await
            .map_err(Into::into)
    }

    /// Add a drug to the catalog, returning its id
    pub async fn add_drug(
        &self,
        name: &str,
        description: &str,
        country_id: Option<i64>,
    ) -> Result<i64> {
        let name = name.to_string();
        let description = description.to_string();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO drugs (name, description, country_id) VALUES (?, ?, ?)",
                    rusqlite::params![name, description, country_id],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
            .map_err(Into::into)
    }

    /// Check whether a drug exists in the catalog
    pub async fn drug_exists(&self, drug_id: i64) -> Result<bool> {
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare("SELECT 1 FROM drugs WHERE id = ?")?;
                Ok(stmt.exists([drug_id])?)
            })
            .await
            .map_err(Into::into)
    }

    // ==================== Accounts ====================

    /// Check whether an account already uses this email
    pub async fn email_exists(&self, email: &str) -> Result<bool> {
        let email = email.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare("SELECT 1 FROM users WHERE email = ?")?;
                Ok(stmt.exists([&email])?)
            })
            .await
            .map_err(Into::into)
    }

    /// Insert user, drugstore and its work days in one transaction
    pub async fn create_drugstore(&self, drugstore: NewDrugstore, work_days: Vec<WorkDayRow>) -> Result<i64> {
        let now = chrono::Utc::now().timestamp();
        let id = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT INTO users
                     (name, email, phone_number, password_hash, user_type, confirmation_code, confirmed, created_at)
                     VALUES (?, ?, ?, ?, 'DRUGSTORE', ?, 0, ?)",
                    rusqlite::params![
                        drugstore.name,
                        drugstore.email,
                        drugstore.phone_number,
                        drugstore.password_hash,
                        drugstore.confirmation_code,
                        now,
                    ],
                )?;
                let user_id = tx.last_insert_rowid();

                tx.execute(
                    "INSERT INTO drugstores
                     (drugstore_id, drugstore_name, address, city_id, latitude, longitude, drugstore_photo_path)
                     VALUES (?, ?, ?, ?, ?, ?, ?)",
                    rusqlite::params![
                        user_id,
                        drugstore.drugstore_name,
                        drugstore.address,
                        drugstore.city_id,
                        drugstore.latitude,
                        drugstore.longitude,
                        drugstore.photo_path,
                    ],
                )?;

                insert_work_days(&tx, user_id, &work_days)?;
                tx.commit()?;
                Ok(user_id)
            })
            .await?;

        info!("Drugstore {} created", id);
        Ok(id)
    }

    /// Mark a user confirmed if the code matches; returns false otherwise
    pub async fn confirm_user(&self, email: &str, code: &str) -> Result<bool> {
        let email = email.to_string();
        let code = code.to_string();
        self.conn
            .call(move |conn| {
                let updated = conn.execute(
                    "UPDATE users SET confirmed = 1, confirmation_code = NULL
                     WHERE email = ? AND confirmation_code = ? AND confirmed = 0",
                    rusqlite::params![email, code],
                )?;
                Ok(updated == 1)
            })
            .await
            .map_err(Into::into)
    }

    /// Pending confirmation code of an unconfirmed user
    pub async fn get_confirmation_code(&self, email: &str) -> Result<Option<String>> {
        let email = email.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT confirmation_code FROM users WHERE email = ? AND confirmed = 0",
                )?;
                let result = stmt
                    .query_row([&email], |row| row.get::<_, Option<String>>(0))
                    .optional()?;
                Ok(result.flatten())
            })
            .await
            .map_err(Into::into)
    }

    /// Look up login credentials by email
    pub async fn get_credentials(&self, email: &str) -> Result<Option<Credentials>> {
        let email = email.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, password_hash, confirmed FROM users WHERE email = ?",
                )?;
                let result = stmt
                    .query_row([&email], |row| {
                        Ok(Credentials {
                            user_id: row.get(0)?,
                            password_hash: row.get(1)?,
                            confirmed: row.get(2)?,
                        })
                    })
                    .optional()?;
                Ok(result)
            })
            .await
            .map_err(Into::into)
    }

    /// Get a user's password hash
    pub async fn get_password_hash(&self, user_id: i64) -> Result<Option<String>> {
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare("SELECT password_hash FROM users WHERE id = ?")?;
                let result = stmt.query_row([user_id], |row| row.get(0)).optional()?;
                Ok(result)
            })
            .await
            .map_err(Into::into)
    }

    /// Replace a user's password hash
    pub async fn set_password_hash(&self, user_id: i64, password_hash: &str) -> Result<()> {
        let hash = password_hash.to_string();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE users SET password_hash = ? WHERE id = ?",
                    rusqlite::params![hash, user_id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    // ==================== Sessions ====================

    /// Store a new session token
    pub async fn create_session(&self, token: &str, user_id: i64) -> Result<()> {
        let token = token.to_string();
        let now = chrono::Utc::now().timestamp();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO sessions (token, user_id, created_at) VALUES (?, ?, ?)",
                    rusqlite::params![token, user_id, now],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Resolve a session token to its user
    pub async fn get_session_user(&self, token: &str) -> Result<Option<i64>> {
        let token = token.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare("SELECT user_id FROM sessions WHERE token = ?")?;
                let result = stmt.query_row([&token], |row| row.get(0)).optional()?;
                Ok(result)
            })
            .await
            .map_err(Into::into)
    }

    /// Delete a session token
    pub async fn delete_session(&self, token: &str) -> Result<()> {
        let token = token.to_string();
        self.conn
            .call(move |conn| {
                conn.execute("DELETE FROM sessions WHERE token = ?", [&token])?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    // ==================== Drugstores ====================

    /// Get the owner's view of a drugstore account
    pub async fn get_drugstore_account(&self, drugstore_id: i64) -> Result<Option<DrugstoreAccount>> {
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT u.name, d.drugstore_name, u.phone_number, d.address,
                            d.drugstore_photo_path, d.latitude, d.longitude, d.city_id
                     FROM users u
                     JOIN drugstores d ON u.id = d.drugstore_id
                     WHERE u.id = ?",
                )?;
                let result = stmt
                    .query_row([drugstore_id], |row| {
                        Ok(DrugstoreAccount {
                            name: row.get(0)?,
                            drugstore_name: row.get(1)?,
                            phone_number: row.get(2)?,
                            address: row.get(3)?,
                            drugstore_photo_path: row.get(4)?,
                            latitude: row.get(5)?,
                            longitude: row.get(6)?,
                            city_id: row.get(7)?,
                        })
                    })
                    .optional()?;
                Ok(result)
            })
            .await
            .map_err(Into::into)
    }

    /// Get the public profile of a drugstore
    pub async fn get_drugstore_profile(&self, drugstore_id: i64) -> Result<Option<DrugstoreProfile>> {
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT d.drugstore_name, d.address, d.drugstore_photo_path,
                            d.latitude, d.longitude, c.name, u.email, u.phone_number
                     FROM drugstores d
                     JOIN cities c ON d.city_id = c.id
                     JOIN users u ON d.drugstore_id = u.id
                     WHERE d.drugstore_id = ?",
                )?;
                let result = stmt
                    .query_row([drugstore_id], |row| {
                        Ok(DrugstoreProfile {
                            drugstore_name: row.get(0)?,
                            address: row.get(1)?,
                            drugstore_photo_path: row.get(2)?,
                            latitude: row.get(3)?,
                            longitude: row.get(4)?,
                            city_name: row.get(5)?,
                            email: row.get(6)?,
                            phone_number: row.get(7)?,
                        })
                    })
                    .optional()?;
                Ok(result)
            })
            .await
            .map_err(Into::into)
    }

    /// Update owner and drugstore fields, replace all work days and
    /// optionally record a new photo, in one transaction
    pub async fn update_drugstore_with_schedule(
        &self,
        drugstore_id: i64,
        update: DrugstoreUpdate,
        work_days: Vec<WorkDayRow>,
        photo_path: Option<String>,
    ) -> Result<()> {
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM drugstores_work_days WHERE drugstore_id = ?", [drugstore_id])?;
                insert_work_days(&tx, drugstore_id, &work_days)?;
                tx.execute(
                    "UPDATE users SET name = ?, phone_number = ? WHERE id = ?",
                    rusqlite::params![update.name, update.phone_number, drugstore_id],
                )?;
                tx.execute(
                    "UPDATE drugstores
                     SET drugstore_name = ?, address = ?, latitude = ?, longitude = ?, city_id = ?,
                         drugstore_photo_path = COALESCE(?, drugstore_photo_path)
                     WHERE drugstore_id = ?",
                    rusqlite::params![
                        update.drugstore_name,
                        update.address,
                        update.latitude,
                        update.longitude,
                        update.city_id,
                        photo_path,
                        drugstore_id,
                    ],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await?;
        debug!("Drugstore {} updated", drugstore_id);
        Ok(())
    }

    /// Remove a drugstore with its schedule, stock, sessions and account
    pub async fn delete_drugstore(&self, drugstore_id: i64) -> Result<()> {
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM drugstore_drugs WHERE drugstore_id = ?", [drugstore_id])?;
                tx.execute("DELETE FROM drugstores_work_days WHERE drugstore_id = ?", [drugstore_id])?;
                tx.execute("DELETE FROM drugstores WHERE drugstore_id = ?", [drugstore_id])?;
                tx.execute("DELETE FROM sessions WHERE user_id = ?", [drugstore_id])?;
                tx.execute("DELETE FROM users WHERE id = ?", [drugstore_id])?;
                tx.commit()?;
                Ok(())
            })
            .await?;
        info!("Drugstore {} deleted", drugstore_id);
        Ok(())
    }

    // ==================== Work Days ====================

    /// Get per-day rows of a drugstore in weekly order
    pub async fn get_work_days(&self, drugstore_id: i64) -> Result<Vec<WorkDayRow>> {
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT work_day, time_start, time_end
                     FROM drugstores_work_days WHERE drugstore_id = ?
                     ORDER BY CASE work_day
                         WHEN 'MONDAY' THEN 0 WHEN 'TUESDAY' THEN 1 WHEN 'WEDNESDAY' THEN 2
                         WHEN 'THURSDAY' THEN 3 WHEN 'FRIDAY' THEN 4 WHEN 'SATURDAY' THEN 5
                         ELSE 6 END",
                )?;
                let rows = stmt
                    .query_map([drugstore_id], |row| {
                        Ok(WorkDayRow {
                            day: row.get(0)?,
                            time_start: row.get(1)?,
                            time_end: row.get(2)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(Into::into)
    }

    /// Get a drugstore's work days grouped by identical opening hours
    pub async fn get_schedule_groups(&self, drugstore_id: i64) -> Result<Vec<ScheduleGroup>> {
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT time_start, time_end, GROUP_CONCAT(work_day, ',')
                     FROM drugstores_work_days
                     WHERE drugstore_id = ?
                     GROUP BY time_start, time_end
                     ORDER BY time_start, time_end",
                )?;
                let rows = stmt
                    .query_map([drugstore_id], |row| {
                        let days: String = row.get(2)?;
                        Ok(ScheduleGroup {
                            weekdays: days.split(',').map(str::to_string).collect(),
                            open_time: row.get(0)?,
                            close_time: row.get(1)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(Into::into)
    }

    // ==================== Stock ====================

    /// Get the stock entry of one drug in one drugstore
    pub async fn get_stock(&self, drugstore_id: i64, drug_id: i64) -> Result<Option<StockEntry>> {
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT drugs_id, price, existence FROM drugstore_drugs
                     WHERE drugstore_id = ? AND drugs_id = ?",
                )?;
                let result = stmt
                    .query_row([drugstore_id, drug_id], |row| {
                        Ok(StockEntry {
                            drug_id: row.get(0)?,
                            price: row.get(1)?,
                            existence: row.get(2)?,
                        })
                    })
                    .optional()?;
                Ok(result)
            })
            .await
            .map_err(Into::into)
    }

    /// Add a drug to a drugstore's stock
    pub async fn add_stock(&self, drugstore_id: i64, entry: StockEntry) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO drugstore_drugs (drugstore_id, drugs_id, price, existence)
                     VALUES (?, ?, ?, ?)",
                    rusqlite::params![drugstore_id, entry.drug_id, entry.price, entry.existence],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Update price and availability of a stocked drug; returns false if not stocked
    pub async fn update_stock(&self, drugstore_id: i64, entry: StockEntry) -> Result<bool> {
        self.conn
            .call(move |conn| {
                let updated = conn.execute(
                    "UPDATE drugstore_drugs SET price = ?, existence = ?
                     WHERE drugstore_id = ? AND drugs_id = ?",
                    rusqlite::params![entry.price, entry.existence, drugstore_id, entry.drug_id],
                )?;
                Ok(updated == 1)
            })
            .await
            .map_err(Into::into)
    }

    /// Catalog drugs whose name contains the fragment, with this drugstore's stock
    pub async fn find_catalog_drugs(&self, drugstore_id: i64, name: &str) -> Result<Vec<CatalogDrug>> {
        let pattern = like_pattern(&name.trim().to_lowercase());
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT dr.id, dr.name, dr.description, c.name, dd.price, dd.existence
                     FROM drugs dr
                     LEFT JOIN countries c ON dr.country_id = c.id
                     LEFT JOIN drugstore_drugs dd ON dd.drugs_id = dr.id AND dd.drugstore_id = ?
                     WHERE unicode_lower(dr.name) LIKE ? ESCAPE '\\'
                     ORDER BY dr.name, dr.id",
                )?;
                let rows = stmt
                    .query_map(rusqlite::params![drugstore_id, pattern], |row| {
                        Ok(CatalogDrug {
                            id: row.get(0)?,
                            name: row.get(1)?,
                            description: row.get(2)?,
                            country_name: row.get(3)?,
                            price: row.get(4)?,
                            existence: row.get(5)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(Into::into)
    }

    /// Details of the chosen drugs stocked by one drugstore
    pub async fn get_stocked_drugs(&self, drugstore_id: i64, drug_ids: &[i64]) -> Result<Vec<DrugInfo>> {
        let sql = format!(
            "SELECT dr.id, dr.name, dr.description, dd.price, dd.existence, c.name
             FROM drugstore_drugs dd
             JOIN drugs dr ON dd.drugs_id = dr.id
             LEFT JOIN countries c ON dr.country_id = c.id
             WHERE dd.drugstore_id = ? AND dd.drugs_id IN ({})
             ORDER BY dr.id",
            placeholders(drug_ids.len())
        );
        let mut params = vec![drugstore_id];
        params.extend_from_slice(drug_ids);

        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(params_from_iter(params.iter()), |row| {
                        Ok(DrugInfo {
                            id: row.get(0)?,
                            name: row.get(1)?,
                            description: row.get(2)?,
                            price: row.get(3)?,
                            existence: row.get(4)?,
                            country_name: row.get(5)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(Into::into)
    }

    // ==================== Search ====================

    /// Drugstores whose name or address contains any of the lowercase tokens
    pub async fn search_drugstores(&self, tokens: &[String]) -> Result<Vec<DrugstoreSummary>> {
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        let condition = vec![
            "unicode_lower(d.drugstore_name) LIKE ? ESCAPE '\\' OR unicode_lower(d.address) LIKE ? ESCAPE '\\'";
            tokens.len()
        ]
        .join(" OR ");
        let sql = format!(
            "SELECT d.drugstore_id, d.drugstore_name, d.address, d.latitude, d.longitude, u.phone_number
             FROM drugstores d
             JOIN users u ON d.drugstore_id = u.id
             WHERE {}
             ORDER BY d.drugstore_name, d.drugstore_id",
            condition
        );
        let params: Vec<String> = tokens
            .iter()
            .flat_map(|t| {
                let pattern = like_pattern(t);
                [pattern.clone(), pattern]
            })
            .collect();

        debug!("Searching drugstores with {} token(s)", tokens.len());

        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(params_from_iter(params.iter()), summary_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(Into::into)
    }

    /// Drugstores stocking every one of the drugs, cheapest total first
    pub async fn find_drugstores_with_all(&self, drug_ids: &[i64]) -> Result<Vec<DrugstoreSummary>> {
        if drug_ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT d.drugstore_id, d.drugstore_name, d.address, d.latitude, d.longitude, u.phone_number
             FROM drugstore_drugs dd
             JOIN drugstores d ON dd.drugstore_id = d.drugstore_id
             JOIN users u ON d.drugstore_id = u.id
             WHERE dd.drugs_id IN ({})
             GROUP BY d.drugstore_id
             HAVING COUNT(*) = ?
             ORDER BY SUM(dd.price), d.drugstore_id",
            placeholders(drug_ids.len())
        );
        let mut params = drug_ids.to_vec();
        params.push(drug_ids.len() as i64);

        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(params_from_iter(params.iter()), summary_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(Into::into)
    }

    /// The given drugstore, if it stocks any of the drugs
    pub async fn find_drugstore_with_any(
        &self,
        drugstore_id: i64,
        drug_ids: &[i64],
    ) -> Result<Vec<DrugstoreSummary>> {
        if drug_ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT d.drugstore_id, d.drugstore_name, d.address, d.latitude, d.longitude, u.phone_number
             FROM drugstore_drugs dd
             JOIN drugstores d ON dd.drugstore_id = d.drugstore_id
             JOIN users u ON d.drugstore_id = u.id
             WHERE dd.drugs_id IN ({}) AND dd.drugstore_id = ?
             GROUP BY d.drugstore_id",
            placeholders(drug_ids.len())
        );
        let mut params = drug_ids.to_vec();
        params.push(drugstore_id);

        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(params_from_iter(params.iter()), summary_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(Into::into)
    }
}

fn insert_work_days(tx: &rusqlite::Transaction<'_>, drugstore_id: i64, work_days: &[WorkDayRow]) -> rusqlite::Result<()> {
    let mut stmt = tx.prepare(
        "INSERT INTO drugstores_work_days (drugstore_id, work_day, time_start, time_end)
         VALUES (?, ?, ?, ?)",
    )?;
    for day in work_days {
        stmt.execute(rusqlite::params![drugstore_id, day.day, day.time_start, day.time_end])?;
    }
    Ok(())
}

fn summary_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DrugstoreSummary> {
    Ok(DrugstoreSummary {
        drugstore_id: row.get(0)?,
        name: row.get(1)?,
        address: row.get(2)?,
        latitude: row.get(3)?,
        longitude: row.get(4)?,
        phone_number: row.get(5)?,
    })
}

/// `%fragment%` with LIKE wildcards in the fragment escaped by `\\`
fn like_pattern(fragment: &str) -> String {
    let mut pattern = String::with_capacity(fragment.len() + 2);
    pattern.push('%');
    for c in fragment.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// SQLite's LOWER only folds ASCII
fn register_functions(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "unicode_lower",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let value: Option<String> = ctx.get(0)?;
            Ok(value.map(|v| v.to_lowercase()))
        },
    )
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

// Optional query_row results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>, rusqlite::Error>;
}

impl<T> OptionalExt<T> for Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>, rusqlite::Error> {
        match self {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn setup() -> (Database, i64) {
        let db = Database::in_memory().await.unwrap();
        db.migrate().await.unwrap();
        let city = db.add_city("Dushanbe").await.unwrap();
        (db, city)
    }

    fn new_drugstore(email: &str, name: &str, city_id: i64) -> NewDrugstore {
        NewDrugstore {
            name: "Owner".to_string(),
            email: email.to_string(),
            phone_number: "+992900000000".to_string(),
            password_hash: "hash".to_string(),
            confirmation_code: "code".to_string(),
            drugstore_name: name.to_string(),
            address: "Rudaki 1".to_string(),
            city_id,
            latitude: 38.56,
            longitude: 68.77,
            photo_path: None,
        }
    }

    fn row(day: &str, start: &str, end: &str) -> WorkDayRow {
        WorkDayRow {
            day: day.to_string(),
            time_start: start.to_string(),
            time_end: end.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_and_read_drugstore() {
        let (db, city) = setup().await;
        assert!(db.city_exists(city).await.unwrap());
        assert!(!db.city_exists(city + 1).await.unwrap());
        let id = db
            .create_drugstore(
                new_drugstore("a@doru.tj", "Apteka", city),
                vec![row("MONDAY", "08:00:00", "18:00:00")],
            )
            .await
            .unwrap();

        assert!(db.email_exists("a@doru.tj").await.unwrap());
        let account = db.get_drugstore_account(id).await.unwrap().unwrap();
        assert_eq!(account.drugstore_name, "Apteka");
        assert_eq!(account.city_id, city);

        let profile = db.get_drugstore_profile(id).await.unwrap().unwrap();
        assert_eq!(profile.city_name, "Dushanbe");
        assert_eq!(profile.email, "a@doru.tj");

        assert!(db.get_drugstore_profile(id + 100).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_schedule_groups_group_by_hours() {
        let (db, city) = setup().await;
        let id = db
            .create_drugstore(
                new_drugstore("b@doru.tj", "Apteka", city),
                vec![
                    row("MONDAY", "08:00:00", "18:00:00"),
                    row("TUESDAY", "08:00:00", "18:00:00"),
                    row("SATURDAY", "10:00:00", "14:00:00"),
                ],
            )
            .await
            .unwrap();

        let mut groups = db.get_schedule_groups(id).await.unwrap();
        assert_eq!(groups.len(), 2);
        groups[0].weekdays.sort();
        assert_eq!(groups[0].weekdays, vec!["MONDAY", "TUESDAY"]);
        assert_eq!(groups[0].open_time, "08:00:00");
        assert_eq!(groups[1].weekdays, vec!["SATURDAY"]);

        let days = db.get_work_days(id).await.unwrap();
        let names: Vec<_> = days.iter().map(|d| d.day.as_str()).collect();
        assert_eq!(names, vec!["MONDAY", "TUESDAY", "SATURDAY"]);
    }

    fn update_for(name: &str, city_id: i64) -> DrugstoreUpdate {
        DrugstoreUpdate {
            name: "Owner".to_string(),
            phone_number: "+992900000001".to_string(),
            drugstore_name: name.to_string(),
            address: "Rudaki 2".to_string(),
            latitude: 38.5,
            longitude: 68.7,
            city_id,
        }
    }

    #[tokio::test]
    async fn test_update_with_schedule() {
        let (db, city) = setup().await;
        let id = db
            .create_drugstore(
                new_drugstore("c@doru.tj", "Apteka", city),
                vec![row("MONDAY", "08:00:00", "18:00:00")],
            )
            .await
            .unwrap();

        db.update_drugstore_with_schedule(
            id,
            update_for("Apteka 2", city),
            vec![row("SUNDAY", "09:00:00", "12:00:00")],
            Some("photo1".to_string()),
        )
        .await
        .unwrap();

        assert_eq!(db.get_work_days(id).await.unwrap(), vec![row("SUNDAY", "09:00:00", "12:00:00")]);
        let account = db.get_drugstore_account(id).await.unwrap().unwrap();
        assert_eq!(account.drugstore_name, "Apteka 2");
        assert_eq!(account.drugstore_photo_path.as_deref(), Some("photo1"));

        // no new photo keeps the current one
        db.update_drugstore_with_schedule(id, update_for("Apteka 3", city), vec![], None)
            .await
            .unwrap();
        let account = db.get_drugstore_account(id).await.unwrap().unwrap();
        assert_eq!(account.drugstore_photo_path.as_deref(), Some("photo1"));
        assert!(db.get_work_days(id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_update_keeps_schedule() {
        let (db, city) = setup().await;
        let id = db
            .create_drugstore(
                new_drugstore("c2@doru.tj", "Apteka", city),
                vec![row("MONDAY", "08:00:00", "18:00:00")],
            )
            .await
            .unwrap();

        // unknown city violates the foreign key after the work days were rewritten
        let result = db
            .update_drugstore_with_schedule(
                id,
                update_for("Renamed", city + 100),
                vec![row("SUNDAY", "09:00:00", "12:00:00")],
                Some("photo1".to_string()),
            )
            .await;
        assert!(result.is_err());

        assert_eq!(db.get_work_days(id).await.unwrap(), vec![row("MONDAY", "08:00:00", "18:00:00")]);
        let account = db.get_drugstore_account(id).await.unwrap().unwrap();
        assert_eq!(account.drugstore_name, "Apteka");
        assert_eq!(account.drugstore_photo_path, None);
    }

    #[tokio::test]
    async fn test_confirm_user() {
        let (db, city) = setup().await;
        db.create_drugstore(new_drugstore("d@doru.tj", "Apteka", city), vec![])
            .await
            .unwrap();

        assert_eq!(db.get_confirmation_code("d@doru.tj").await.unwrap().as_deref(), Some("code"));
        assert!(!db.confirm_user("d@doru.tj", "wrong").await.unwrap());
        assert!(db.confirm_user("d@doru.tj", "code").await.unwrap());
        assert!(!db.confirm_user("d@doru.tj", "code").await.unwrap());
        assert_eq!(db.get_confirmation_code("d@doru.tj").await.unwrap(), None);

        let credentials = db.get_credentials("d@doru.tj").await.unwrap().unwrap();
        assert!(credentials.confirmed);
    }

    #[tokio::test]
    async fn test_sessions() {
        let (db, city) = setup().await;
        let id = db
            .create_drugstore(new_drugstore("e@doru.tj", "Apteka", city), vec![])
            .await
            .unwrap();

        db.create_session("token", id).await.unwrap();
        assert_eq!(db.get_session_user("token").await.unwrap(), Some(id));
        db.delete_session("token").await.unwrap();
        assert_eq!(db.get_session_user("token").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_search_matches_name_or_address() {
        let (db, city) = setup().await;
        db.create_drugstore(new_drugstore("f@doru.tj", "Shifo Pharm", city), vec![])
            .await
            .unwrap();
        let mut other = new_drugstore("g@doru.tj", "Apteka 36", city);
        other.address = "Shohmansur 12".to_string();
        db.create_drugstore(other, vec![]).await.unwrap();

        let found = db.search_drugstores(&["shifo".to_string()]).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Shifo Pharm");

        let found = db
            .search_drugstores(&["shifo".to_string(), "shohmansur".to_string()])
            .await
            .unwrap();
        assert_eq!(found.len(), 2);

        assert!(db.search_drugstores(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_folds_non_ascii_case() {
        let (db, city) = setup().await;
        let mut store = new_drugstore("m@doru.tj", "Аптека Шифо", city);
        store.address = "Проспект Рудаки 5".to_string();
        let store = db.create_drugstore(store, vec![]).await.unwrap();

        for token in ["аптека", "шифо", "рудаки"] {
            let found = db.search_drugstores(&[token.to_string()]).await.unwrap();
            assert_eq!(found.len(), 1, "token {:?}", token);
        }

        db.add_drug("Аспирин", "", None).await.unwrap();
        let catalog = db.find_catalog_drugs(store, "АСПИ").await.unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog[0].name, "Аспирин");
    }

    #[tokio::test]
    async fn test_search_treats_wildcards_literally() {
        let (db, city) = setup().await;
        let store = db.create_drugstore(new_drugstore("n@doru.tj", "Shifo", city), vec![]).await.unwrap();
        db.add_drug("Aspirin", "", None).await.unwrap();

        for token in ["%", "_", "\\"] {
            assert!(db.search_drugstores(&[token.to_string()]).await.unwrap().is_empty());
            assert!(db.find_catalog_drugs(store, token).await.unwrap().is_empty());
        }

        let percent = db.create_drugstore(new_drugstore("o@doru.tj", "100% Pharm", city), vec![]).await.unwrap();
        let found = db.search_drugstores(&["%".to_string()]).await.unwrap();
        let ids: Vec<_> = found.iter().map(|d| d.drugstore_id).collect();
        assert_eq!(ids, vec![percent]);
    }

    #[tokio::test]
    async fn test_drugstores_with_all_drugs_ordered_by_price() {
        let (db, city) = setup().await;
        let country = db.add_country("India").await.unwrap();
        let aspirin = db.add_drug("Aspirin", "Pain relief", Some(country)).await.unwrap();
        let ibuprofen = db.add_drug("Ibuprofen", "Anti-inflammatory", None).await.unwrap();

        let cheap = db.create_drugstore(new_drugstore("h@doru.tj", "Cheap", city), vec![]).await.unwrap();
        let pricey = db.create_drugstore(new_drugstore("i@doru.tj", "Pricey", city), vec![]).await.unwrap();
        let partial = db.create_drugstore(new_drugstore("j@doru.tj", "Partial", city), vec![]).await.unwrap();

        for (store, price) in [(cheap, 1.0), (pricey, 5.0)] {
            for drug in [aspirin, ibuprofen] {
                db.add_stock(store, StockEntry { drug_id: drug, price, existence: true })
                    .await
                    .unwrap();
            }
        }
        db.add_stock(partial, StockEntry { drug_id: aspirin, price: 0.5, existence: true })
            .await
            .unwrap();

        let found = db.find_drugstores_with_all(&[aspirin, ibuprofen]).await.unwrap();
        let ids: Vec<_> = found.iter().map(|d| d.drugstore_id).collect();
        assert_eq!(ids, vec![cheap, pricey]);

        let found = db.find_drugstore_with_any(partial, &[aspirin, ibuprofen]).await.unwrap();
        assert_eq!(found.len(), 1);

        let drugs = db.get_stocked_drugs(cheap, &[aspirin, ibuprofen]).await.unwrap();
        assert_eq!(drugs.len(), 2);
        assert_eq!(drugs[0].country_name.as_deref(), Some("India"));
        assert_eq!(drugs[1].country_name, None);
    }

    #[tokio::test]
    async fn test_stock_updates_and_catalog() {
        let (db, city) = setup().await;
        let aspirin = db.add_drug("Aspirin", "", None).await.unwrap();
        db.add_drug("Aspirin Cardio", "", None).await.unwrap();
        let store = db.create_drugstore(new_drugstore("k@doru.tj", "Store", city), vec![]).await.unwrap();

        let entry = StockEntry { drug_id: aspirin, price: 2.5, existence: true };
        assert!(!db.update_stock(store, entry).await.unwrap());
        db.add_stock(store, entry).await.unwrap();
        assert!(db
            .update_stock(store, StockEntry { price: 3.0, existence: false, ..entry })
            .await
            .unwrap());

        let stock = db.get_stock(store, aspirin).await.unwrap().unwrap();
        assert_eq!(stock.price, 3.0);
        assert!(!stock.existence);

        let catalog = db.find_catalog_drugs(store, "ASPIRIN").await.unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog[0].price, Some(3.0));
        assert_eq!(catalog[1].price, None);
    }

    #[tokio::test]
    async fn test_delete_drugstore_cascades() {
        let (db, city) = setup().await;
        let drug = db.add_drug("Aspirin", "", None).await.unwrap();
        let id = db
            .create_drugstore(
                new_drugstore("l@doru.tj", "Store", city),
                vec![row("MONDAY", "08:00:00", "18:00:00")],
            )
            .await
            .unwrap();
        db.add_stock(id, StockEntry { drug_id: drug, price: 1.0, existence: true })
            .await
            .unwrap();
        db.create_session("t", id).await.unwrap();

        db.delete_drugstore(id).await.unwrap();

        assert!(!db.email_exists("l@doru.tj").await.unwrap());
        assert!(db.get_work_days(id).await.unwrap().is_empty());
        assert!(db.get_session_user("t").await.unwrap().is_none());
        assert!(db.get_stock(id, drug).await.unwrap().is_none());
    }
}
