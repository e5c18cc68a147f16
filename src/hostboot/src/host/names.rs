//! Host-name input from the host entry screen.

use crate::error::{HostBootError, Result};

/// Host names may not start or end with '-'.
pub fn is_valid_host_name(name: &str) -> bool {
    !name.is_empty() && !name.starts_with('-') && !name.ends_with('-')
}

/// Split whitespace-separated host names, dropping duplicates but keeping input order.
pub fn parse_host_names(input: &str) -> Result<Vec<String>> {
    let mut names: Vec<String> = Vec::new();
    for name in input.split_whitespace() {
        if !is_valid_host_name(name) {
            return Err(HostBootError::InvalidHostName(name.to_string()));
        }
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    if names.is_empty() {
        return Err(HostBootError::NoHosts);
    }
    Ok(names)
}
