use serde::{Deserialize, Serialize};

use super::status::BootStatus;

/// Append-only host log.
///
/// Bootstrap logs arrive cumulatively (every poll returns the full log so far), so the
/// last reported bootstrap log is remembered and only its unseen suffix is appended.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct BootLog {
    text: String,
    last_bootstrap_report: String,
}

impl BootLog {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Append a line, separated from existing content by a newline.
    pub fn append_line(&mut self, line: &str) {
        if line.is_empty() {
            return;
        }
        if !self.text.is_empty() && !self.text.ends_with('\n') {
            self.text.push('\n');
        }
        self.text.push_str(line);
    }

    /// Absorb a cumulative bootstrap log. Returns true if anything was appended.
    pub fn absorb_bootstrap(&mut self, reported: &str) -> bool {
        if reported.is_empty() || reported == self.last_bootstrap_report {
            return false;
        }
        match reported.strip_prefix(self.last_bootstrap_report.as_str()) {
            Some(suffix) if !self.last_bootstrap_report.is_empty() => {
                self.text.push_str(suffix);
            }
            _ => self.append_line(reported),
        }
        self.last_bootstrap_report = reported.to_string();
        true
    }

    /// Forget the last bootstrap report so a relaunched bootstrap log is appended in full.
    pub fn restart_bootstrap(&mut self) {
        self.last_bootstrap_report.clear();
    }
}

impl From<String> for BootLog {
    fn from(text: String) -> Self {
        Self {
            text,
            last_bootstrap_report: String::new(),
        }
    }
}

impl From<BootLog> for String {
    fn from(log: BootLog) -> Self {
        log.text
    }
}

/// One mounted filesystem as reported by the host agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiskInfo {
    #[serde(default)]
    pub mountpoint: String,
    #[serde(rename = "type", default)]
    pub fs_type: String,
    /// Remaining agent fields (size, used, available, device, ...)
    #[serde(flatten)]
    pub details: serde_json::Map<String, serde_json::Value>,
}

/// Per-host state tracked through one provisioning attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostRecord {
    pub name: String,
    #[serde(rename = "bootStatus")]
    pub boot_status: BootStatus,
    #[serde(rename = "bootLog", default)]
    pub boot_log: BootLog,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<u32>,
    #[serde(rename = "memoryKb", default, skip_serializing_if = "Option::is_none")]
    pub memory_kb: Option<u64>,
    #[serde(rename = "diskInfo", default, skip_serializing_if = "Option::is_none")]
    pub disk_info: Option<Vec<DiskInfo>>,
    #[serde(skip)]
    pub is_checked: bool,
}

impl HostRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_status(name, BootStatus::Pending)
    }

    pub fn with_status(name: impl Into<String>, boot_status: BootStatus) -> Self {
        Self {
            name: name.into(),
            boot_status,
            boot_log: BootLog::default(),
            cpu: None,
            memory_kb: None,
            disk_info: None,
            is_checked: false,
        }
    }

    pub fn has_hardware_facts(&self) -> bool {
        self.cpu.is_some() || self.memory_kb.is_some() || self.disk_info.is_some()
    }
}
