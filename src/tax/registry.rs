//! Current tax regime of a company
//!
//! The regime a company is registered under lives in an external management
//! spreadsheet keyed by CNPJ. Its free-text "tributação" column is
//! normalized here.

use anyhow::Result;

use crate::db::models::Regime;

/// Source of the free-text regime registered for a tax id
pub trait RegimeRegistry: Send + Sync {
    /// `tax_id_digits` contains only the digits of the CNPJ
    fn raw_regime(&self, tax_id_digits: &str) -> Result<Option<String>>;
}

/// Keep only the digits of a CNPJ
pub fn tax_id_digits(tax_id: &str) -> String {
    tax_id.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Map spreadsheet text ("SN", "Lucro Presumido", "LR - trimestral", ...) to
/// a regime; anything unrecognized is `None`.
pub fn normalize_regime(text: &str) -> Option<Regime> {
    let value = text.trim().to_lowercase();
    if value.is_empty() {
        return None;
    }
    if let Ok(regime) = value.parse::<Regime>() {
        return Some(regime);
    }

    let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    if value.contains("simples") || compact.starts_with("sn") {
        Some(Regime::Simples)
    } else if value.contains("presum") || compact.starts_with("lp") {
        Some(Regime::Presumido)
    } else if value.contains("real") || compact.starts_with("lr") {
        Some(Regime::Real)
    } else {
        None
    }
}
