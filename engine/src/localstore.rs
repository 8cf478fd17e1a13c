//! Durable client-local flags: delivery-decision markers, the last
//! order placed from this device, the device token, and the staff
//! session flag. This is an advisory cache only; nothing here is ever
//! trusted over a live document read.

use std::collections::BTreeMap;
use std::path::PathBuf;

use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::warn;

#[derive(Debug)]
pub struct LocalFlags {
    path: Option<PathBuf>,
    values: BTreeMap<String, String>,
}

fn flags_path(profile: &str) -> PathBuf {
    let cache = dirs::cache_dir().unwrap_or_else(|| PathBuf::from("/tmp"));
    cache.join("kiosk").join(profile).join("flags.json")
}

impl LocalFlags {
    /// Open the flag file for a named profile, creating state lazily.
    /// Unreadable or corrupt files start empty; losing these flags
    /// only costs a redundant prompt or two.
    pub fn open(profile: &str) -> Self {
        let path = flags_path(profile);
        let values = std::fs::read_to_string(&path)
            .ok()
            .and_then(|data| serde_json::from_str(&data).ok())
            .unwrap_or_default();
        LocalFlags {
            path: Some(path),
            values,
        }
    }

    /// Non-persistent instance for tests and one-shot tools.
    pub fn in_memory() -> Self {
        LocalFlags {
            path: None,
            values: BTreeMap::new(),
        }
    }

    fn persist(&self) {
        let Some(path) = &self.path else {
            return;
        };
        let write = || -> std::io::Result<()> {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let data = serde_json::to_string_pretty(&self.values)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
            std::fs::write(path, data)
        };
        if let Err(e) = write() {
            warn!(path = %path.display(), error = %e, "failed to persist local flags");
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_owned(), value.to_owned());
        self.persist();
    }

    pub fn remove(&mut self, key: &str) {
        if self.values.remove(key).is_some() {
            self.persist();
        }
    }

    // ─── Typed accessors ────────────────────────────────────────────

    /// The delivery answer recorded on this device for an order, if
    /// any: `Some(true)` confirmed, `Some(false)` denied.
    pub fn delivery_decision(&self, order_id: &str) -> Option<bool> {
        if self.get(&confirmed_key(order_id)).is_some() {
            Some(true)
        } else if self.get(&denied_key(order_id)).is_some() {
            Some(false)
        } else {
            None
        }
    }

    /// Record a delivery answer, replacing any opposite marker.
    pub fn set_delivery_decision(&mut self, order_id: &str, confirmed: bool) {
        let (set, clear) = if confirmed {
            (confirmed_key(order_id), denied_key(order_id))
        } else {
            (denied_key(order_id), confirmed_key(order_id))
        };
        self.values.remove(&clear);
        self.values.insert(set, "1".to_owned());
        self.persist();
    }

    pub fn last_order_id(&self) -> Option<&str> {
        self.get("last_order_id")
    }

    pub fn set_last_order_id(&mut self, order_id: &str) {
        self.set("last_order_id", order_id);
    }

    /// Stable token identifying this device to the support channel,
    /// generated on first use.
    pub fn device_id(&mut self) -> String {
        if let Some(id) = self.get("device_id") {
            return id.to_owned();
        }
        let id: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(20)
            .map(char::from)
            .collect();
        self.set("device_id", &id);
        id
    }

    pub fn admin_session(&self) -> bool {
        self.get("admin_session") == Some("1")
    }

    pub fn set_admin_session(&mut self, active: bool) {
        if active {
            self.set("admin_session", "1");
        } else {
            self.remove("admin_session");
        }
    }
}

fn confirmed_key(order_id: &str) -> String {
    format!("delivered_confirmed_{order_id}")
}

fn denied_key(order_id: &str) -> String {
    format!("delivered_denied_{order_id}")
}
