//! Builder patterns for creating test data programmatically.

#![allow(dead_code)]

use boxreview::BatchManifest;

/// Builder for creating `BatchManifest` instances.
pub struct BatchBuilder {
    tenant_id: String,
    box_number: String,
    batch_id: String,
    filename: Option<String>,
    page_count: u32,
}

impl BatchBuilder {
    /// Create a new builder: tenant `acme`, box `001`, one page.
    pub fn new(batch_id: &str) -> Self {
        Self {
            tenant_id: "acme".to_string(),
            box_number: "001".to_string(),
            batch_id: batch_id.to_string(),
            filename: None,
            page_count: 1,
        }
    }

    pub fn tenant(mut self, tenant_id: &str) -> Self {
        self.tenant_id = tenant_id.to_string();
        self
    }

    pub fn box_number(mut self, box_number: &str) -> Self {
        self.box_number = box_number.to_string();
        self
    }

    pub fn filename(mut self, filename: &str) -> Self {
        self.filename = Some(filename.to_string());
        self
    }

    pub fn pages(mut self, page_count: u32) -> Self {
        self.page_count = page_count;
        self
    }

    pub fn build(self) -> BatchManifest {
        let filename = self
            .filename
            .unwrap_or_else(|| format!("{}.pdf", self.batch_id));
        BatchManifest {
            tenant_id: self.tenant_id,
            box_number: self.box_number,
            batch_id: self.batch_id,
            filename,
            page_count: self.page_count,
        }
    }
}

/// Builder for config file JSON.
pub struct ConfigJsonBuilder {
    database_path: Option<String>,
    lease_seconds: Option<u32>,
    scan_page_size: Option<u32>,
    release_prior_locks: Option<bool>,
    log_level: Option<String>,
    log_format: Option<String>,
}

impl ConfigJsonBuilder {
    pub fn new() -> Self {
        Self {
            database_path: None,
            lease_seconds: None,
            scan_page_size: None,
            release_prior_locks: None,
            log_level: None,
            log_format: None,
        }
    }

    pub fn database_path(mut self, path: &str) -> Self {
        self.database_path = Some(path.to_string());
        self
    }

    pub fn lease_seconds(mut self, secs: u32) -> Self {
        self.lease_seconds = Some(secs);
        self
    }

    pub fn scan_page_size(mut self, size: u32) -> Self {
        self.scan_page_size = Some(size);
        self
    }

    pub fn release_prior_locks(mut self, release: bool) -> Self {
        self.release_prior_locks = Some(release);
        self
    }

    pub fn log_level(mut self, level: &str) -> Self {
        self.log_level = Some(level.to_string());
        self
    }

    pub fn log_format(mut self, format: &str) -> Self {
        self.log_format = Some(format.to_string());
        self
    }

    pub fn build(self) -> String {
        let mut root = serde_json::json!({ "version": "1.0" });
        if let Some(path) = self.database_path {
            root["database_path"] = serde_json::json!(path);
        }

        let mut queue = serde_json::Map::new();
        if let Some(v) = self.lease_seconds {
            queue.insert("lease_seconds".into(), v.into());
        }
        if let Some(v) = self.scan_page_size {
            queue.insert("scan_page_size".into(), v.into());
        }
        if let Some(v) = self.release_prior_locks {
            queue.insert("release_prior_locks".into(), v.into());
        }
        if !queue.is_empty() {
            root["queue"] = serde_json::Value::Object(queue);
        }

        let mut logging = serde_json::Map::new();
        if let Some(v) = self.log_level {
            logging.insert("level".into(), v.into());
        }
        if let Some(v) = self.log_format {
            logging.insert("format".into(), v.into());
        }
        if !logging.is_empty() {
            root["logging"] = serde_json::Value::Object(logging);
        }

        serde_json::to_string_pretty(&root).expect("Failed to serialize config")
    }
}

impl Default for ConfigJsonBuilder {
    fn default() -> Self {
        Self::new()
    }
}
