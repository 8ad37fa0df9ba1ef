// Wire records for the reservation server.
//
// These mirror the server's JSON shapes one-to-one. Status fields stay
// as strings here; `tablero-core` validates them into closed enums so
// unknown values are rejected at the domain boundary, not silently
// coerced during deserialization.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Server-assigned modification stamp.
///
/// The server emits either a counter/epoch integer or a naive ISO-8601
/// date-time string (`isoformat()`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UpdatedAt {
    Counter(i64),
    Timestamp(String),
}

/// Capacity class attached to a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TipoMesaRecord {
    pub id_tipo_mesa: i64,
    #[serde(default)]
    pub descripcion: Option<String>,
    #[serde(default)]
    pub cantidad_sillas: Option<u32>,
}

/// A table as returned by `GET mesas/` and pushed in `mesa_update`.
///
/// Every field except the id is optional because stream events may
/// carry a partial view of the entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MesaRecord {
    pub id_mesa: i64,
    #[serde(default)]
    pub numero_mesa: Option<i64>,
    #[serde(default)]
    pub id_tipo_mesa: Option<i64>,
    #[serde(default)]
    pub estado: Option<String>,
    #[serde(default)]
    pub personas_actuales: Option<u32>,
    #[serde(default)]
    pub updated_at: Option<UpdatedAt>,
    #[serde(default)]
    pub tipo_mesa: Option<TipoMesaRecord>,
}

/// Body for `PUT mesas/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MesaUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estado: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_tipo_mesa: Option<i64>,
}

/// A reservation as returned by `GET admin/reservaciones`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservacionRecord {
    pub id_reserva: i64,
    #[serde(default)]
    pub nombre: Option<String>,
    #[serde(default)]
    pub apellido: Option<String>,
    #[serde(default)]
    pub correo: Option<String>,
    #[serde(default)]
    pub telefono: Option<String>,
    #[serde(default)]
    pub cantidad_personas: Option<u32>,
    /// `YYYY-MM-DD`.
    #[serde(default)]
    pub fecha: Option<String>,
    /// `HH:MM` or `HH:MM:SS`.
    #[serde(default)]
    pub hora: Option<String>,
    #[serde(default)]
    pub id_mesa: Option<i64>,
    #[serde(default)]
    pub estado: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<UpdatedAt>,
}

/// Body for `PUT admin/reservaciones/{id}`. Absent fields are unchanged.
///
/// `id_mesa` is double-wrapped so that "unassign" (`null`) can be told
/// apart from "leave as is" (omitted).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReservacionUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nombre: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apellido: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telefono: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cantidad_personas: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fecha: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hora: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_mesa: Option<Option<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estado: Option<String>,
}

/// Query filter for `GET admin/reservaciones`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReservacionQuery {
    pub estado: Option<String>,
    /// `YYYY-MM-DD`.
    pub fecha: Option<String>,
}

/// Aggregate counts from `GET admin/dashboard/estadisticas`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EstadisticasRecord {
    #[serde(default)]
    pub total_reservaciones: u64,
    #[serde(default)]
    pub reservaciones_hoy: u64,
    #[serde(default)]
    pub reservaciones_pendientes: u64,
    #[serde(default)]
    pub reservaciones_confirmadas_hoy: u64,
    #[serde(default)]
    pub reservaciones_por_estado: BTreeMap<String, u64>,
    #[serde(default)]
    pub total_mesas: u64,
    #[serde(default)]
    pub mesas_disponibles: u64,
    #[serde(default)]
    pub mesas_ocupadas: u64,
    #[serde(default)]
    pub mesas_reservadas: u64,
}

/// FastAPI error body: `{"detail": "..."}`.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorDetail {
    pub detail: serde_json::Value,
}

impl ErrorDetail {
    pub(crate) fn message(&self) -> String {
        match &self.detail {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}
