// ── API-to-domain type conversions ──
//
// Bridges raw `tablero-api` records into canonical `tablero-core`
// types. Status strings are validated here: a value outside the closed
// sets is a `CoreError::Parse`, never a silent default.

use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use tablero_api::{
    EstadisticasRecord, MesaRecord, MesaUpdate, ReservacionQuery, ReservacionRecord,
    ReservacionUpdate, TipoMesaRecord,
};

use crate::command::ReservationChanges;
use crate::error::CoreError;
use crate::model::{
    Record, Reservation, ReservationFilter, ReservationId, ReservationPatch, ReservationStatus,
    Revision, ServerStats, Table, TableId, TablePatch, TableStatus, TableType, Update,
};

const DATE_FORMAT: &str = "%Y-%m-%d";

fn parse_error(message: String) -> CoreError {
    CoreError::Parse { message }
}

pub(crate) fn parse_table_status(raw: &str) -> Result<TableStatus, CoreError> {
    TableStatus::from_str(raw).map_err(|_| parse_error(format!("unknown table status {raw:?}")))
}

pub(crate) fn parse_reservation_status(raw: &str) -> Result<ReservationStatus, CoreError> {
    ReservationStatus::from_str(raw)
        .map_err(|_| parse_error(format!("unknown reservation status {raw:?}")))
}

fn parse_date(raw: &str) -> Result<NaiveDate, CoreError> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|e| parse_error(format!("invalid date {raw:?}: {e}")))
}

/// Accepts `HH:MM`, `HH:MM:SS` and `HH:MM:SS.ffffff`.
fn parse_time(raw: &str) -> Result<NaiveTime, CoreError> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .map_err(|e| parse_error(format!("invalid time {raw:?}: {e}")))
}

fn parse_created_at(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| {
            chrono::DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.naive_local())
        })
}

// ── Tables ───────────────────────────────────────────────────────────

impl From<TipoMesaRecord> for TableType {
    fn from(t: TipoMesaRecord) -> Self {
        Self {
            id: t.id_tipo_mesa,
            description: t.descripcion,
            seats: t.cantidad_sillas,
        }
    }
}

impl TryFrom<MesaRecord> for Update<Table> {
    type Error = CoreError;

    fn try_from(m: MesaRecord) -> Result<Self, Self::Error> {
        let status = m.estado.as_deref().map(parse_table_status).transpose()?;
        Ok(Self {
            id: TableId(m.id_mesa),
            revision: Revision::from_wire(m.updated_at.as_ref())?,
            patch: TablePatch {
                number: m.numero_mesa,
                type_id: m.id_tipo_mesa,
                table_type: m.tipo_mesa.map(TableType::from),
                status,
                occupants: m.personas_actuales,
            },
        })
    }
}

/// A listed table must be complete.
impl TryFrom<MesaRecord> for Table {
    type Error = CoreError;

    fn try_from(m: MesaRecord) -> Result<Self, Self::Error> {
        let update = Update::<Table>::try_from(m)?;
        Table::from_patch(update.id, &update.patch, update.revision)
            .ok_or_else(|| parse_error(format!("table {} has no estado", update.id)))
    }
}

// ── Reservations ─────────────────────────────────────────────────────

impl TryFrom<ReservacionRecord> for Update<Reservation> {
    type Error = CoreError;

    fn try_from(r: ReservacionRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: ReservationId(r.id_reserva),
            revision: Revision::from_wire(r.updated_at.as_ref())?,
            patch: ReservationPatch {
                first_name: r.nombre,
                last_name: r.apellido,
                email: r.correo,
                phone: r.telefono,
                party_size: r.cantidad_personas,
                date: r.fecha.as_deref().map(parse_date).transpose()?,
                time: r.hora.as_deref().map(parse_time).transpose()?,
                table_id: r.id_mesa.map(TableId),
                status: r
                    .estado
                    .as_deref()
                    .map(parse_reservation_status)
                    .transpose()?,
                created_at: r.created_at.as_deref().and_then(parse_created_at),
            },
        })
    }
}

/// A listed reservation must carry its schedule, party size and status.
impl TryFrom<ReservacionRecord> for Reservation {
    type Error = CoreError;

    fn try_from(r: ReservacionRecord) -> Result<Self, Self::Error> {
        let update = Update::<Reservation>::try_from(r)?;
        Reservation::from_patch(update.id, &update.patch, update.revision).ok_or_else(|| {
            parse_error(format!(
                "reservation {} is missing fecha, hora, cantidad_personas or estado",
                update.id
            ))
        })
    }
}

impl From<&ReservationFilter> for ReservacionQuery {
    fn from(f: &ReservationFilter) -> Self {
        Self {
            estado: f.status.map(|s| s.to_string()),
            fecha: f.date.map(|d| d.format(DATE_FORMAT).to_string()),
        }
    }
}

impl From<&ReservationChanges> for ReservacionUpdate {
    fn from(c: &ReservationChanges) -> Self {
        Self {
            nombre: c.first_name.clone(),
            apellido: c.last_name.clone(),
            correo: c.email.clone(),
            telefono: c.phone.clone(),
            cantidad_personas: c.party_size,
            fecha: c.date.map(|d| d.format(DATE_FORMAT).to_string()),
            hora: c.time.map(|t| t.format("%H:%M:%S").to_string()),
            id_mesa: c.table.map(|t| t.map(TableId::get)),
            estado: c.status.map(|s| s.to_string()),
        }
    }
}

pub(crate) fn table_update_body(status: TableStatus) -> MesaUpdate {
    MesaUpdate {
        estado: Some(status.to_string()),
        id_tipo_mesa: None,
    }
}

// ── Statistics ───────────────────────────────────────────────────────

impl From<EstadisticasRecord> for ServerStats {
    fn from(s: EstadisticasRecord) -> Self {
        Self {
            total_reservations: s.total_reservaciones,
            reservations_today: s.reservaciones_hoy,
            pending_reservations: s.reservaciones_pendientes,
            confirmed_today: s.reservaciones_confirmadas_hoy,
            reservations_by_status: s.reservaciones_por_estado,
            total_tables: s.total_mesas,
            available_tables: s.mesas_disponibles,
            occupied_tables: s.mesas_ocupadas,
            reserved_tables: s.mesas_reservadas,
        }
    }
}

/// Convert a full listing. One invalid entity fails the whole batch so
/// that a full replace never prunes an entity it merely failed to read.
pub(crate) fn convert_all<R, T>(records: Vec<R>) -> Result<Vec<T>, CoreError>
where
    T: TryFrom<R, Error = CoreError>,
{
    records.into_iter().map(T::try_from).collect()
}
