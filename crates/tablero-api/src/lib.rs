// tablero-api: Async Rust client for the restaurant reservation server (REST + SSE)

pub mod auth;
pub mod client;
pub mod error;
pub mod models;
pub mod stream;
pub mod transport;

pub use auth::{StaticToken, TokenProvider};
pub use client::RestClient;
pub use error::Error;
pub use models::{
    EstadisticasRecord, MesaRecord, MesaUpdate, ReservacionQuery, ReservacionRecord,
    ReservacionUpdate, TipoMesaRecord, UpdatedAt,
};
pub use stream::{EventStreamHandle, ReconnectConfig, StreamMessage, StreamStatus};
pub use transport::{TlsMode, TransportConfig};
