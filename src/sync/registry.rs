//! Device registry
//!
//! One row per (user, device) pair. Devices are registered implicitly on
//! their first sync and explicitly through the devices API; they are
//! deactivated rather than deleted so their sync history stays attributable.

use std::sync::Arc;

use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::{self, Device};
use crate::store::{now_timestamp, Filter, Query, Row, Store};

#[derive(Clone)]
pub struct DeviceRegistry {
    store: Arc<dyn Store>,
}

impl DeviceRegistry {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Record that a device checked in: first contact inserts the row,
    /// anything later refreshes `last_sync` and reactivates. Name and type
    /// are only written when given, so a bare sync never blanks them.
    pub async fn register_or_touch(
        &self,
        user_id: &str,
        device_id: &str,
        device_name: Option<&str>,
        device_type: Option<&str>,
    ) -> Result<Device> {
        if device_id.trim().is_empty() {
            return Err(AppError::BadRequest("device_id must not be empty".to_string()));
        }

        let mut row = Row::new();
        row.insert("user_id".to_string(), Value::String(user_id.to_string()));
        row.insert("device_id".to_string(), Value::String(device_id.to_string()));
        if let Some(name) = device_name {
            row.insert("device_name".to_string(), Value::String(name.to_string()));
        }
        if let Some(kind) = device_type {
            row.insert("device_type".to_string(), Value::String(kind.to_string()));
        }
        row.insert("is_active".to_string(), Value::Bool(true));
        row.insert("last_sync".to_string(), Value::String(now_timestamp()));

        self.store
            .upsert("user_devices", vec![row], &["user_id", "device_id"])
            .await?;

        self.get(user_id, device_id).await?.ok_or_else(|| {
            AppError::Internal(format!("device {} missing after upsert", device_id))
        })
    }

    pub async fn get(&self, user_id: &str, device_id: &str) -> Result<Option<Device>> {
        let rows = self
            .store
            .select(
                "user_devices",
                Query::new().eq("user_id", user_id).eq("device_id", device_id),
            )
            .await?;
        rows.into_iter().next().map(models::from_row).transpose()
    }

    /// All devices of a user, most recently synced first.
    pub async fn list(&self, user_id: &str) -> Result<Vec<Device>> {
        let rows = self
            .store
            .select(
                "user_devices",
                Query::new().eq("user_id", user_id).order("last_sync", true),
            )
            .await?;
        rows.into_iter().map(models::from_row).collect()
    }

    /// Apply explicit attribute changes to a known device.
    pub async fn update(&self, user_id: &str, device_id: &str, changes: Row) -> Result<Device> {
        if changes.is_empty() {
            return Err(AppError::BadRequest("no fields to update".to_string()));
        }

        let affected = self
            .store
            .update("user_devices", changes, Self::key_filters(user_id, device_id))
            .await?;
        if affected == 0 {
            return Err(AppError::NotFound("Device not found".to_string()));
        }

        self.get(user_id, device_id).await?.ok_or_else(|| {
            AppError::Internal(format!("device {} missing after update", device_id))
        })
    }

    /// Explicit sync-ping: refresh `last_sync` and reactivate.
    pub async fn touch(&self, user_id: &str, device_id: &str) -> Result<Device> {
        let mut changes = Row::new();
        changes.insert("last_sync".to_string(), Value::String(now_timestamp()));
        changes.insert("is_active".to_string(), Value::Bool(true));
        self.update(user_id, device_id, changes).await
    }

    /// Mark a device inactive. The row and its sync history stay.
    pub async fn deactivate(&self, user_id: &str, device_id: &str) -> Result<()> {
        let mut changes = Row::new();
        changes.insert("is_active".to_string(), Value::Bool(false));

        let affected = self
            .store
            .update("user_devices", changes, Self::key_filters(user_id, device_id))
            .await?;
        if affected == 0 {
            return Err(AppError::NotFound("Device not found".to_string()));
        }
        Ok(())
    }

    fn key_filters(user_id: &str, device_id: &str) -> Vec<Filter> {
        vec![Filter::eq("user_id", user_id), Filter::eq("device_id", device_id)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn registry() -> DeviceRegistry {
        DeviceRegistry::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn first_contact_registers_the_device() {
        let registry = registry();

        let device = registry
            .register_or_touch("u1", "phone-1", Some("Pixel"), Some("mobile"))
            .await
            .unwrap();

        assert_eq!(device.device_id, "phone-1");
        assert_eq!(device.device_name.as_deref(), Some("Pixel"));
        assert!(device.is_active);
        assert!(device.last_sync.is_some());
    }

    #[tokio::test]
    async fn bare_checkin_keeps_name_and_type() {
        let registry = registry();

        registry
            .register_or_touch("u1", "phone-1", Some("Pixel"), Some("mobile"))
            .await
            .unwrap();
        let first = registry.get("u1", "phone-1").await.unwrap().unwrap();

        let touched = registry
            .register_or_touch("u1", "phone-1", None, None)
            .await
            .unwrap();

        assert_eq!(touched.device_name.as_deref(), Some("Pixel"));
        assert_eq!(touched.device_type.as_deref(), Some("mobile"));
        assert!(touched.last_sync >= first.last_sync);
    }

    #[tokio::test]
    async fn checkin_reactivates_a_deactivated_device() {
        let registry = registry();

        registry
            .register_or_touch("u1", "tablet", None, None)
            .await
            .unwrap();
        registry.deactivate("u1", "tablet").await.unwrap();
        assert!(!registry.get("u1", "tablet").await.unwrap().unwrap().is_active);

        let device = registry
            .register_or_touch("u1", "tablet", None, None)
            .await
            .unwrap();
        assert!(device.is_active);
    }

    #[tokio::test]
    async fn empty_device_id_is_rejected() {
        let registry = registry();
        let err = registry
            .register_or_touch("u1", "  ", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn list_orders_by_most_recent_sync() {
        let registry = registry();
        let store = registry.store.clone();

        for (device_id, last_sync) in [
            ("old", "2026-01-01T00:00:00.000000Z"),
            ("new", "2026-02-01T00:00:00.000000Z"),
        ] {
            let mut row = Row::new();
            row.insert("user_id".to_string(), Value::String("u1".to_string()));
            row.insert("device_id".to_string(), Value::String(device_id.to_string()));
            row.insert("is_active".to_string(), Value::Bool(true));
            row.insert("last_sync".to_string(), Value::String(last_sync.to_string()));
            store.insert("user_devices", vec![row]).await.unwrap();
        }

        let devices = registry.list("u1").await.unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].device_id, "new");
        assert_eq!(devices[1].device_id, "old");
    }

    #[tokio::test]
    async fn operations_on_unknown_devices_return_not_found() {
        let registry = registry();

        let err = registry.touch("u1", "ghost").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let err = registry.deactivate("u1", "ghost").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn devices_are_scoped_to_their_user() {
        let registry = registry();

        registry
            .register_or_touch("u1", "shared-name", None, None)
            .await
            .unwrap();

        assert!(registry.get("u2", "shared-name").await.unwrap().is_none());
        let err = registry.touch("u2", "shared-name").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
