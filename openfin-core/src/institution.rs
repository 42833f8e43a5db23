//! Supported statement issuers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Institution {
    #[serde(rename = "nubank")]
    NuBank,
    #[serde(rename = "itau")]
    Itau,
    #[serde(rename = "davivienda")]
    Davivienda,
}

impl Institution {
    pub const ALL: [Institution; 3] = [Institution::NuBank, Institution::Itau, Institution::Davivienda];

    /// Stable tag written on every normalized row
    pub fn tag(&self) -> &'static str {
        match self {
            Institution::NuBank => "nubank",
            Institution::Itau => "itau",
            Institution::Davivienda => "davivienda",
        }
    }
}

impl fmt::Display for Institution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown institution `{0}` (expected one of: nubank, itau, davivienda)")]
pub struct UnknownInstitution(pub String);

impl FromStr for Institution {
    type Err = UnknownInstitution;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "nubank" | "nu_bank" | "nu-bank" | "nu" => Ok(Institution::NuBank),
            "itau" | "itaú" => Ok(Institution::Itau),
            "davivienda" => Ok(Institution::Davivienda),
            _ => Err(UnknownInstitution(s.to_string())),
        }
    }
}
