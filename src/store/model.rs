//! Persisted per-contact record.

use serde::{Deserialize, Serialize};

/// One record per distinct sender, keyed by the normalized sender id.
///
/// Field aliases accept files written by earlier versions of the bot
/// (`whatsapp`, `nome`, `opcoes_escolhidas`); saves always use the
/// canonical names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactRecord {
    #[serde(alias = "whatsapp")]
    pub id: String,
    #[serde(alias = "nome")]
    pub display_name: String,
    /// Reserved. Nothing collects it yet.
    #[serde(default)]
    pub email: Option<String>,
    /// Option tokens in selection order. Append-only; duplicates allowed.
    #[serde(default, alias = "opcoes_escolhidas")]
    pub chosen_options: Vec<String>,
}

impl ContactRecord {
    /// A fresh record with no choices.
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            email: None,
            chosen_options: Vec::new(),
        }
    }
}
