//! Orchestrator value objects

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::errors::ScanError;

/// Scan families supported by the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ScanType {
    /// Port and service discovery (nmap)
    NetworkScan,
    /// Web application crawl and probe (OWASP ZAP)
    WebScan,
    /// SQL injection probing (sqlmap)
    InjectionScan,
}

impl ScanType {
    pub const ALL: [ScanType; 3] = [Self::NetworkScan, Self::WebScan, Self::InjectionScan];

    /// Resolve the `{scan_type}` path segment, accepting tool names as aliases.
    pub fn from_path_segment(segment: &str) -> Option<Self> {
        match segment.trim().to_ascii_lowercase().as_str() {
            "network" | "nmap" | "network_scan" => Some(Self::NetworkScan),
            "web" | "zap" | "web_scan" => Some(Self::WebScan),
            "injection" | "sqlmap" | "injection_scan" => Some(Self::InjectionScan),
            _ => None,
        }
    }

    /// Prefix used for raw artifact keys
    pub fn artifact_prefix(&self) -> &'static str {
        match self {
            Self::NetworkScan => "networkscan",
            Self::WebScan => "webscan",
            Self::InjectionScan => "injectionscan",
        }
    }

    pub fn artifact_extension(&self) -> &'static str {
        match self {
            Self::NetworkScan => "xml",
            Self::WebScan => "json",
            Self::InjectionScan => "txt",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::NetworkScan => "application/xml",
            Self::WebScan => "application/json",
            Self::InjectionScan => "text/plain",
        }
    }

    /// Name of the external tool driving this scan type
    pub fn tool(&self) -> &'static str {
        match self {
            Self::NetworkScan => "nmap",
            Self::WebScan => "zap",
            Self::InjectionScan => "sqlmap",
        }
    }
}

impl fmt::Display for ScanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NetworkScan => write!(f, "network_scan"),
            Self::WebScan => write!(f, "web_scan"),
            Self::InjectionScan => write!(f, "injection_scan"),
        }
    }
}

/// Web scan depth
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ScanMode {
    /// Crawl followed by active probing
    Active,
    /// Crawl only
    Passive,
}

impl ScanMode {
    /// Parse the web scan options field; blank means active.
    pub fn parse(options: &str) -> Result<Self, ScanError> {
        match options.trim().to_ascii_lowercase().as_str() {
            "" | "active" => Ok(Self::Active),
            "passive" => Ok(Self::Passive),
            other => Err(ScanError::Validation(format!(
                "Unsupported web scan mode '{}', expected 'active' or 'passive'",
                other
            ))),
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Passive => "Passive",
        }
    }
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Passive => write!(f, "passive"),
        }
    }
}

/// Finding severity, spelled the way the vulnerability manager expects it
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Critical => "Critical",
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
            Self::Info => "Info",
        };
        f.write_str(label)
    }
}
