//! # Profile & Log Store
//!
//! Persistence boundary for user profiles and the immutable feeding and
//! moisture logs. The state machine only sees the [`ProfileStore`] trait;
//! production uses the Postgres implementation, tests the in-memory one.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::postgres::PgPool;
use sqlx::Row;
use tracing::info;

use crate::estimators::feed_model::CropType;

/// Persistent per-user profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: i64,
    pub username: String,
    pub password_hash: String,
    pub tank_volume_l: Option<f64>,
    pub soil_volume_l: Option<f64>,
    pub total_food_waste_kg: f64,
    pub selected_crop: Option<CropType>,
}

impl UserProfile {
    /// A profile is complete once both volumes are set.
    pub fn is_complete(&self) -> bool {
        self.tank_volume_l.is_some() && self.soil_volume_l.is_some()
    }
}

/// Immutable feeding record.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedingLogEntry {
    pub user_id: i64,
    pub greens_g: f64,
    pub browns_g: f64,
    pub water_g: f64,
    pub logged_at: DateTime<Utc>,
}

/// Immutable moisture reading.
#[derive(Debug, Clone, PartialEq)]
pub struct MoistureLogEntry {
    pub user_id: i64,
    pub moisture_pct: f64,
    pub logged_at: DateTime<Utc>,
}

/// SHA-256 digest of a raw password, hex encoded.
pub fn hash_password(raw: &str) -> String {
    let digest = Sha256::digest(raw.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Narrow persistence interface consumed by the state machine.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_profile(&self, user_id: i64) -> Result<Option<UserProfile>>;
    async fn get_profile_by_username(&self, username: &str) -> Result<Option<UserProfile>>;
    async fn create_profile(&self, profile: &UserProfile) -> Result<()>;
    /// Update the provided volumes, leaving `None` fields untouched.
    async fn update_volumes(
        &self,
        user_id: i64,
        tank_volume_l: Option<f64>,
        soil_volume_l: Option<f64>,
    ) -> Result<()>;
    async fn set_selected_crop(&self, user_id: i64, crop: CropType) -> Result<()>;
    async fn append_feeding_log(&self, entry: &FeedingLogEntry) -> Result<()>;
    async fn append_moisture_log(&self, entry: &MoistureLogEntry) -> Result<()>;
    /// Most recent moisture readings, newest first.
    async fn recent_moisture(&self, user_id: i64, limit: i64) -> Result<Vec<MoistureLogEntry>>;
    /// Add to the cumulative food-waste total, returning the new total.
    async fn add_food_waste(&self, user_id: i64, kg: f64) -> Result<f64>;
    async fn reset_food_waste(&self, user_id: i64) -> Result<()>;
    async fn total_food_waste(&self, user_id: i64) -> Result<f64>;
}

/// Postgres-backed store.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the schema if it does not exist yet.
    pub async fn init_schema(&self) -> Result<()> {
        info!("Initializing database schema...");

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS profiles (
                user_id BIGINT PRIMARY KEY,
                username TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                tank_volume_l DOUBLE PRECISION,
                soil_volume_l DOUBLE PRECISION,
                total_food_waste_kg DOUBLE PRECISION NOT NULL DEFAULT 0,
                selected_crop TEXT
            )",
        )
        .execute(&self.pool)
        .await
        .context("Failed to create profiles table")?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS feeding_logs (
                id BIGSERIAL PRIMARY KEY,
                user_id BIGINT NOT NULL,
                greens_g DOUBLE PRECISION NOT NULL,
                browns_g DOUBLE PRECISION NOT NULL,
                water_g DOUBLE PRECISION NOT NULL,
                logged_at TIMESTAMPTZ NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .context("Failed to create feeding_logs table")?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS moisture_logs (
                id BIGSERIAL PRIMARY KEY,
                user_id BIGINT NOT NULL,
                moisture_pct DOUBLE PRECISION NOT NULL,
                logged_at TIMESTAMPTZ NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .context("Failed to create moisture_logs table")?;

        info!("Database schema initialized successfully");
        Ok(())
    }

    fn profile_from_row(row: &sqlx::postgres::PgRow) -> Result<UserProfile> {
        let crop_label: Option<String> = row.try_get("selected_crop")?;
        let selected_crop = match crop_label {
            Some(label) => Some(
                CropType::parse(&label)
                    .map_err(|e| anyhow::anyhow!("stored crop unparseable: {e}"))?,
            ),
            None => None,
        };
        Ok(UserProfile {
            user_id: row.try_get("user_id")?,
            username: row.try_get("username")?,
            password_hash: row.try_get("password_hash")?,
            tank_volume_l: row.try_get("tank_volume_l")?,
            soil_volume_l: row.try_get("soil_volume_l")?,
            total_food_waste_kg: row.try_get("total_food_waste_kg")?,
            selected_crop,
        })
    }
}

#[async_trait]
impl ProfileStore for PgStore {
    async fn get_profile(&self, user_id: i64) -> Result<Option<UserProfile>> {
        let row = sqlx::query("SELECT * FROM profiles WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to read profile")?;
        row.map(|r| Self::profile_from_row(&r)).transpose()
    }

    async fn get_profile_by_username(&self, username: &str) -> Result<Option<UserProfile>> {
        let row = sqlx::query("SELECT * FROM profiles WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to read profile by username")?;
        row.map(|r| Self::profile_from_row(&r)).transpose()
    }

    async fn create_profile(&self, profile: &UserProfile) -> Result<()> {
        sqlx::query(
            "INSERT INTO profiles
                (user_id, username, password_hash, tank_volume_l, soil_volume_l,
                 total_food_waste_kg, selected_crop)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(profile.user_id)
        .bind(&profile.username)
        .bind(&profile.password_hash)
        .bind(profile.tank_volume_l)
        .bind(profile.soil_volume_l)
        .bind(profile.total_food_waste_kg)
        .bind(profile.selected_crop.map(|c| c.label().to_string()))
        .execute(&self.pool)
        .await
        .context("Failed to create profile")?;
        info!(user_id = profile.user_id, "Profile created");
        Ok(())
    }

    async fn update_volumes(
        &self,
        user_id: i64,
        tank_volume_l: Option<f64>,
        soil_volume_l: Option<f64>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE profiles
             SET tank_volume_l = COALESCE($2, tank_volume_l),
                 soil_volume_l = COALESCE($3, soil_volume_l)
             WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(tank_volume_l)
        .bind(soil_volume_l)
        .execute(&self.pool)
        .await
        .context("Failed to update volumes")?;
        Ok(())
    }

    async fn set_selected_crop(&self, user_id: i64, crop: CropType) -> Result<()> {
        sqlx::query("UPDATE profiles SET selected_crop = $2 WHERE user_id = $1")
            .bind(user_id)
            .bind(crop.label())
            .execute(&self.pool)
            .await
            .context("Failed to update selected crop")?;
        Ok(())
    }

    async fn append_feeding_log(&self, entry: &FeedingLogEntry) -> Result<()> {
        sqlx::query(
            "INSERT INTO feeding_logs (user_id, greens_g, browns_g, water_g, logged_at)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(entry.user_id)
        .bind(entry.greens_g)
        .bind(entry.browns_g)
        .bind(entry.water_g)
        .bind(entry.logged_at)
        .execute(&self.pool)
        .await
        .context("Failed to append feeding log")?;
        Ok(())
    }

    async fn append_moisture_log(&self, entry: &MoistureLogEntry) -> Result<()> {
        sqlx::query(
            "INSERT INTO moisture_logs (user_id, moisture_pct, logged_at)
             VALUES ($1, $2, $3)",
        )
        .bind(entry.user_id)
        .bind(entry.moisture_pct)
        .bind(entry.logged_at)
        .execute(&self.pool)
        .await
        .context("Failed to append moisture log")?;
        Ok(())
    }

    async fn recent_moisture(&self, user_id: i64, limit: i64) -> Result<Vec<MoistureLogEntry>> {
        let rows = sqlx::query(
            "SELECT user_id, moisture_pct, logged_at FROM moisture_logs
             WHERE user_id = $1 ORDER BY logged_at DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to read moisture history")?;
        rows.iter()
            .map(|r| {
                Ok(MoistureLogEntry {
                    user_id: r.try_get("user_id")?,
                    moisture_pct: r.try_get("moisture_pct")?,
                    logged_at: r.try_get("logged_at")?,
                })
            })
            .collect()
    }

    async fn add_food_waste(&self, user_id: i64, kg: f64) -> Result<f64> {
        let row = sqlx::query(
            "UPDATE profiles
             SET total_food_waste_kg = total_food_waste_kg + $2
             WHERE user_id = $1
             RETURNING total_food_waste_kg",
        )
        .bind(user_id)
        .bind(kg)
        .fetch_one(&self.pool)
        .await
        .context("Failed to add food waste")?;
        Ok(row.try_get("total_food_waste_kg")?)
    }

    async fn reset_food_waste(&self, user_id: i64) -> Result<()> {
        sqlx::query("UPDATE profiles SET total_food_waste_kg = 0 WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .context("Failed to reset food waste")?;
        Ok(())
    }

    async fn total_food_waste(&self, user_id: i64) -> Result<f64> {
        let row = sqlx::query("SELECT total_food_waste_kg FROM profiles WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to read food waste total")?;
        Ok(row
            .map(|r| r.try_get::<f64, _>("total_food_waste_kg"))
            .transpose()?
            .unwrap_or(0.0))
    }
}

/// In-memory store used by unit and integration tests.
#[derive(Default)]
pub struct MemoryStore {
    profiles: Mutex<HashMap<i64, UserProfile>>,
    feeding_logs: Mutex<Vec<FeedingLogEntry>>,
    moisture_logs: Mutex<Vec<MoistureLogEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feeding_log_count(&self) -> usize {
        self.feeding_logs.lock().unwrap().len()
    }

    pub fn moisture_log_count(&self) -> usize {
        self.moisture_logs.lock().unwrap().len()
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn get_profile(&self, user_id: i64) -> Result<Option<UserProfile>> {
        Ok(self.profiles.lock().unwrap().get(&user_id).cloned())
    }

    async fn get_profile_by_username(&self, username: &str) -> Result<Option<UserProfile>> {
        Ok(self
            .profiles
            .lock()
            .unwrap()
            .values()
            .find(|p| p.username == username)
            .cloned())
    }

    async fn create_profile(&self, profile: &UserProfile) -> Result<()> {
        let mut profiles = self.profiles.lock().unwrap();
        if profiles.values().any(|p| p.username == profile.username) {
            anyhow::bail!("username already taken");
        }
        profiles.insert(profile.user_id, profile.clone());
        Ok(())
    }

    async fn update_volumes(
        &self,
        user_id: i64,
        tank_volume_l: Option<f64>,
        soil_volume_l: Option<f64>,
    ) -> Result<()> {
        let mut profiles = self.profiles.lock().unwrap();
        let profile = profiles
            .get_mut(&user_id)
            .context("profile does not exist")?;
        if tank_volume_l.is_some() {
            profile.tank_volume_l = tank_volume_l;
        }
        if soil_volume_l.is_some() {
            profile.soil_volume_l = soil_volume_l;
        }
        Ok(())
    }

    async fn set_selected_crop(&self, user_id: i64, crop: CropType) -> Result<()> {
        let mut profiles = self.profiles.lock().unwrap();
        let profile = profiles
            .get_mut(&user_id)
            .context("profile does not exist")?;
        profile.selected_crop = Some(crop);
        Ok(())
    }

    async fn append_feeding_log(&self, entry: &FeedingLogEntry) -> Result<()> {
        self.feeding_logs.lock().unwrap().push(entry.clone());
        Ok(())
    }

    async fn append_moisture_log(&self, entry: &MoistureLogEntry) -> Result<()> {
        self.moisture_logs.lock().unwrap().push(entry.clone());
        Ok(())
    }

    async fn recent_moisture(&self, user_id: i64, limit: i64) -> Result<Vec<MoistureLogEntry>> {
        let logs = self.moisture_logs.lock().unwrap();
        Ok(logs
            .iter()
            .rev()
            .filter(|e| e.user_id == user_id)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn add_food_waste(&self, user_id: i64, kg: f64) -> Result<f64> {
        let mut profiles = self.profiles.lock().unwrap();
        let profile = profiles
            .get_mut(&user_id)
            .context("profile does not exist")?;
        profile.total_food_waste_kg += kg;
        Ok(profile.total_food_waste_kg)
    }

    async fn reset_food_waste(&self, user_id: i64) -> Result<()> {
        let mut profiles = self.profiles.lock().unwrap();
        let profile = profiles
            .get_mut(&user_id)
            .context("profile does not exist")?;
        profile.total_food_waste_kg = 0.0;
        Ok(())
    }

    async fn total_food_waste(&self, user_id: i64) -> Result<f64> {
        Ok(self
            .profiles
            .lock()
            .unwrap()
            .get(&user_id)
            .map(|p| p.total_food_waste_kg)
            .unwrap_or(0.0))
    }
}
