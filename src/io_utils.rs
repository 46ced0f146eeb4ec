use std::fs;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};

pub fn is_dash(path: &Path) -> bool {
    path.as_os_str() == "-"
}

/// Reads CSV text from a file path, or from stdin when the path is `-`.
pub fn read_input(path: &Path) -> Result<String> {
    if is_dash(path) {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Reading CSV from stdin")?;
        Ok(buffer)
    } else {
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))
    }
}
