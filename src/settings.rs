use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{InvoicerError, Result};
use crate::tax::{TaxPolicy, DEFAULT_GST_RATES};

pub const DB_FILE: &str = "invoicer.db";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data_dir: String,
    pub bind_addr: String,
    pub default_theme: String,
    pub gst_rates: Vec<u32>,
    pub log_json: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().to_string(),
            bind_addr: "127.0.0.1:5000".to_string(),
            default_theme: "default".to_string(),
            gst_rates: DEFAULT_GST_RATES.to_vec(),
            log_json: false,
        }
    }
}

impl Settings {
    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join(DB_FILE)
    }

    pub fn tax_policy(&self) -> TaxPolicy {
        if self.gst_rates.is_empty() {
            TaxPolicy::default()
        } else {
            TaxPolicy::new(&self.gst_rates)
        }
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("invoicer")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("invoicer")
}

pub fn load_settings() -> Settings {
    let path = settings_path();
    if path.exists() {
        let content = std::fs::read_to_string(&path).unwrap_or_default();
        serde_json::from_str(&content).unwrap_or_default()
    } else {
        Settings::default()
    }
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| InvoicerError::Settings(e.to_string()))?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    Ok(())
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SaleType;
    use crate::tax::LineInput;
    use rust_decimal::Decimal;

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = Settings {
            data_dir: "/tmp/test".to_string(),
            bind_addr: "0.0.0.0:8080".to_string(),
            default_theme: "classic".to_string(),
            gst_rates: vec![0, 5, 12, 18, 28],
            log_json: true,
        };
        let json = serde_json::to_string_pretty(&settings).unwrap();
        std::fs::write(&path, &json).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let loaded: Settings = serde_json::from_str(&content).unwrap();
        assert_eq!(loaded.data_dir, "/tmp/test");
        assert_eq!(loaded.bind_addr, "0.0.0.0:8080");
        assert_eq!(loaded.gst_rates, vec![0, 5, 12, 18, 28]);
        assert!(loaded.log_json);
    }

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert_eq!(s.bind_addr, "127.0.0.1:5000");
        assert_eq!(s.default_theme, "default");
        assert_eq!(s.gst_rates, vec![0, 5, 12, 18]);
        assert!(s.db_path().ends_with(DB_FILE));
    }

    #[test]
    fn test_load_merges_with_defaults() {
        let json = r#"{"data_dir": "/tmp/test"}"#;
        let s: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(s.data_dir, "/tmp/test");
        assert_eq!(s.bind_addr, "127.0.0.1:5000");
        assert!(!s.log_json);
    }

    #[test]
    fn test_tax_policy_from_rates() {
        let s = Settings {
            gst_rates: vec![0, 28],
            ..Settings::default()
        };
        let line = |rate: u32| LineInput {
            quantity: 1,
            free_quantity: 0,
            price_per_unit: Decimal::from(100),
            discount: Decimal::ZERO,
            gst_rate: Decimal::from(rate),
        };
        let policy = s.tax_policy();
        assert!(policy.compute(&[line(28)], SaleType::IntraState).is_ok());
        assert!(policy.compute(&[line(18)], SaleType::IntraState).is_err());

        let empty = Settings {
            gst_rates: vec![],
            ..Settings::default()
        };
        let policy = empty.tax_policy();
        assert!(policy.compute(&[line(18)], SaleType::IntraState).is_ok());
        assert!(policy.compute(&[line(28)], SaleType::IntraState).is_err());
    }
}
