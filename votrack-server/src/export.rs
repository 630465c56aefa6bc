//! CSV export of personas
//!
//! Output is meant to open directly in spreadsheet software configured for
//! Spanish locales: UTF-8 with BOM, `;` separator, `\n` line endings.

use std::borrow::Cow;
use votrack_common::db::Persona;

const BOM: &str = "\u{feff}";
const SEPARATOR: char = ';';

pub const PERSONA_COLUMNS: [&str; 12] = [
    "documento",
    "nombres",
    "apellidos",
    "telefono",
    "direccion",
    "barrio",
    "municipio",
    "puesto_votacion",
    "mesa",
    "estado",
    "lider",
    "created_at",
];

/// Quote a field when it contains the separator, a quote or a line break
fn escape_field(value: &str) -> Cow<'_, str> {
    if value.contains(|c: char| c == SEPARATOR || c == '"' || c == '\n' || c == '\r') {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}

fn push_row<'a>(out: &mut String, fields: impl IntoIterator<Item = &'a str>) {
    for (i, field) in fields.into_iter().enumerate() {
        if i > 0 {
            out.push(SEPARATOR);
        }
        out.push_str(&escape_field(field));
    }
    out.push('\n');
}

/// Render personas as CSV
pub fn personas_csv(personas: &[Persona]) -> String {
    let mut out = String::from(BOM);
    push_row(&mut out, PERSONA_COLUMNS);

    for p in personas {
        let created_at = votrack_common::time::to_db(&p.created_at);
        push_row(
            &mut out,
            [
                p.documento.as_str(),
                p.nombres.as_str(),
                p.apellidos.as_str(),
                p.telefono.as_deref().unwrap_or(""),
                p.direccion.as_deref().unwrap_or(""),
                p.barrio.as_deref().unwrap_or(""),
                p.municipio.as_deref().unwrap_or(""),
                p.puesto_votacion.as_deref().unwrap_or(""),
                p.mesa.as_deref().unwrap_or(""),
                p.estado.as_str(),
                p.lider_nombre.as_str(),
                created_at.as_str(),
            ],
        );
    }

    out
}
