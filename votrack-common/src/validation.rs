//! Persona form validation

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Editable data fields of a persona
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonaData {
    pub documento: String,
    pub nombres: String,
    pub apellidos: String,
    #[serde(default)]
    pub telefono: Option<String>,
    #[serde(default)]
    pub direccion: Option<String>,
    #[serde(default)]
    pub barrio: Option<String>,
    #[serde(default)]
    pub municipio: Option<String>,
    #[serde(default)]
    pub puesto_votacion: Option<String>,
    #[serde(default)]
    pub mesa: Option<String>,
}

/// Trim, and treat blank as absent
fn clean_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn require(field: &str, value: &str) -> Result<String> {
    let v = value.trim();
    if v.is_empty() {
        return Err(Error::InvalidInput(format!("{} is required", field)));
    }
    if v.chars().count() > 120 {
        return Err(Error::InvalidInput(format!("{} is too long", field)));
    }
    Ok(v.to_string())
}

fn all_digits_between(value: &str, min: usize, max: usize) -> bool {
    (min..=max).contains(&value.len()) && value.chars().all(|c| c.is_ascii_digit())
}

impl PersonaData {
    /// Validate and normalize the submitted fields
    ///
    /// - documento: 5-15 digits (dots, dashes and spaces are stripped)
    /// - nombres / apellidos: non-empty after trimming
    /// - telefono: optional, 7-15 digits once separators are stripped
    /// - remaining fields: optional, blank becomes absent
    pub fn normalized(self) -> Result<PersonaData> {
        let documento: String = self
            .documento
            .chars()
            .filter(|c| !matches!(c, '.' | '-' | ' '))
            .collect();
        if !all_digits_between(&documento, 5, 15) {
            return Err(Error::InvalidInput(
                "documento must contain 5 to 15 digits".to_string(),
            ));
        }

        let telefono = match clean_optional(self.telefono) {
            Some(t) => {
                let digits: String = t
                    .chars()
                    .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '+'))
                    .collect();
                if !all_digits_between(&digits, 7, 15) {
                    return Err(Error::InvalidInput(
                        "telefono must contain 7 to 15 digits".to_string(),
                    ));
                }
                Some(digits)
            }
            None => None,
        };

        Ok(PersonaData {
            documento,
            nombres: require("nombres", &self.nombres)?,
            apellidos: require("apellidos", &self.apellidos)?,
            telefono,
            direccion: clean_optional(self.direccion),
            barrio: clean_optional(self.barrio),
            municipio: clean_optional(self.municipio),
            puesto_votacion: clean_optional(self.puesto_votacion),
            mesa: clean_optional(self.mesa),
        })
    }
}

/// Free-text note fields (novedad descriptions, revert reasons)
pub fn require_text(field: &str, value: &str) -> Result<String> {
    let v = value.trim();
    if v.is_empty() {
        return Err(Error::InvalidInput(format!("{} is required", field)));
    }
    if v.chars().count() > 2000 {
        return Err(Error::InvalidInput(format!("{} is too long", field)));
    }
    Ok(v.to_string())
}
