use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PreviewError;

/// Marketplace whose upload template the workbook follows
///
/// Each template carries a block of instruction/header rows at the top that
/// must keep their original height, otherwise the marketplace rejects or
/// misreads the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Marketplace {
    #[default]
    Walmart,
    Target,
    Ebay,
    Amazon,
}

impl Marketplace {
    pub const ALL: [Marketplace; 4] = [
        Marketplace::Walmart,
        Marketplace::Target,
        Marketplace::Ebay,
        Marketplace::Amazon,
    ];

    /// Number of template rows at the top of each sheet
    pub fn header_rows(self) -> u32 {
        match self {
            Marketplace::Walmart => 6,
            Marketplace::Target => 2,
            Marketplace::Ebay => 1,
            Marketplace::Amazon => 4,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Marketplace::Walmart => "Walmart",
            Marketplace::Target => "Target/Mirakl",
            Marketplace::Ebay => "eBay",
            Marketplace::Amazon => "Amazon",
        }
    }
}

impl fmt::Display for Marketplace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Marketplace {
    type Err = PreviewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "walmart" => Ok(Marketplace::Walmart),
            "target" | "mirakl" | "target/mirakl" => Ok(Marketplace::Target),
            "ebay" => Ok(Marketplace::Ebay),
            "amazon" => Ok(Marketplace::Amazon),
            other => Err(PreviewError::InvalidOption(format!(
                "unknown marketplace '{}'",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_rows_per_marketplace() {
        assert_eq!(Marketplace::Walmart.header_rows(), 6);
        assert_eq!(Marketplace::Target.header_rows(), 2);
        assert_eq!(Marketplace::Ebay.header_rows(), 1);
        assert_eq!(Marketplace::Amazon.header_rows(), 4);
    }

    #[test]
    fn parses_labels_case_insensitively() {
        for m in Marketplace::ALL {
            assert_eq!(m.label().parse::<Marketplace>().unwrap(), m);
        }
        assert_eq!("MIRAKL".parse::<Marketplace>().unwrap(), Marketplace::Target);
        assert!("etsy".parse::<Marketplace>().is_err());
    }
}
