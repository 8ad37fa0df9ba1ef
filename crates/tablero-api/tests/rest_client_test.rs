#![allow(clippy::unwrap_used)]
// Integration tests for `RestClient` using wiremock.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tablero_api::{
    Error, MesaUpdate, ReservacionQuery, ReservacionUpdate, RestClient, StaticToken,
    TransportConfig, UpdatedAt,
};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, RestClient) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&format!("{}/api/v1", server.uri())).unwrap();
    let tokens = Arc::new(StaticToken::new(SecretString::from("t0ken".to_string())));
    let client = RestClient::with_client(reqwest::Client::new(), base_url, tokens);
    (server, client)
}

fn reservation(id: i64) -> serde_json::Value {
    json!({
        "id_reserva": id,
        "nombre": "Ana",
        "apellido": "Pérez",
        "correo": "ana@example.com",
        "telefono": null,
        "cantidad_personas": 2,
        "fecha": "2024-01-01",
        "hora": "19:00:00",
        "id_mesa": null,
        "estado": "pendiente",
        "created_at": "2023-12-30T10:00:00",
        "updated_at": "2023-12-30T10:00:00"
    })
}

// ── Tables ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_list_tables_sends_bearer_token() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/mesas/"))
        .and(header("authorization", "Bearer t0ken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id_mesa": 1,
                "id_tipo_mesa": 2,
                "estado": "disponible",
                "updated_at": "2024-01-01T12:00:00",
                "tipo_mesa": {"id_tipo_mesa": 2, "descripcion": "Familiar", "cantidad_sillas": 6}
            }
        ])))
        .mount(&server)
        .await;

    let tables = client.list_tables().await.unwrap();
    assert_eq!(tables.len(), 1);
    assert_eq!(tables[0].estado.as_deref(), Some("disponible"));
    assert_eq!(
        tables[0].updated_at,
        Some(UpdatedAt::Timestamp("2024-01-01T12:00:00".into()))
    );
}

#[tokio::test]
async fn test_update_table_puts_status() {
    let (server, client) = setup().await;

    Mock::given(method("PUT"))
        .and(path("/api/v1/mesas/4"))
        .and(body_json(json!({"estado": "reservada"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id_mesa": 4,
            "id_tipo_mesa": 1,
            "estado": "reservada",
            "updated_at": 200
        })))
        .expect(1)
        .mount(&server)
        .await;

    let body = MesaUpdate {
        estado: Some("reservada".into()),
        ..Default::default()
    };
    let table = client.update_table(4, &body).await.unwrap();
    assert_eq!(table.updated_at, Some(UpdatedAt::Counter(200)));
}

#[tokio::test]
async fn test_unauthorized_maps_to_authentication() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/mesas/"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"detail": "Could not validate credentials"})),
        )
        .mount(&server)
        .await;

    let result = client.list_tables().await;
    assert!(
        matches!(result, Err(Error::Authentication { ref message }) if message.contains("validate")),
        "expected Authentication error, got: {result:?}"
    );
}

#[tokio::test]
async fn test_server_error_keeps_detail() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/admin/dashboard/estadisticas"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"detail": "boom"})))
        .mount(&server)
        .await;

    let err = client.get_statistics().await.unwrap_err();
    assert!(
        matches!(err, Error::Api { status: 500, ref message } if message == "boom"),
        "got {err:?}"
    );
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_malformed_body_is_deserialization_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/mesas/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy</html>"))
        .mount(&server)
        .await;

    let err = client.list_tables().await.unwrap_err();
    assert!(matches!(err, Error::Deserialization { ref body, .. } if body.contains("proxy")));
}

#[tokio::test]
async fn test_timeout_reports_the_configured_limit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/mesas/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([]))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let transport = TransportConfig {
        timeout: Duration::from_millis(200),
        ..TransportConfig::default()
    };
    let client = RestClient::new(
        Url::parse(&format!("{}/api/v1/", server.uri())).unwrap(),
        Arc::new(StaticToken::anonymous()),
        &transport,
    )
    .unwrap();

    let err = client.list_tables().await.unwrap_err();
    assert!(matches!(err, Error::Timeout { timeout_secs: 1 }), "got {err:?}");
    assert_eq!(err.to_string(), "Request timed out after 1s");
}

// ── Reservations ────────────────────────────────────────────────────

#[tokio::test]
async fn test_list_reservations_passes_filter() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/admin/reservaciones"))
        .and(query_param("estado", "pendiente"))
        .and(query_param("fecha", "2024-01-01"))
        .and(query_param("skip", "0"))
        .and(query_param("limit", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([reservation(1)])))
        .expect(1)
        .mount(&server)
        .await;

    let query = ReservacionQuery {
        estado: Some("pendiente".into()),
        fecha: Some("2024-01-01".into()),
    };
    let all = client.list_reservations(&query).await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].nombre.as_deref(), Some("Ana"));
}

#[tokio::test]
async fn test_list_reservations_follows_pages() {
    let (server, client) = setup().await;

    let first: Vec<_> = (1..=100).map(reservation).collect();
    let second: Vec<_> = (101..=103).map(reservation).collect();

    Mock::given(method("GET"))
        .and(path("/api/v1/admin/reservaciones"))
        .and(query_param("skip", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(first))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/admin/reservaciones"))
        .and(query_param("skip", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(second))
        .expect(1)
        .mount(&server)
        .await;

    let all = client
        .list_reservations(&ReservacionQuery::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 103);
    assert_eq!(all.last().unwrap().id_reserva, 103);
}

#[tokio::test]
async fn test_update_reservation_sends_only_changed_fields() {
    let (server, client) = setup().await;

    let mut updated = reservation(9);
    updated["estado"] = json!("confirmada");

    Mock::given(method("PUT"))
        .and(path("/api/v1/admin/reservaciones/9"))
        .and(body_json(json!({"estado": "confirmada"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(updated))
        .expect(1)
        .mount(&server)
        .await;

    let body = ReservacionUpdate {
        estado: Some("confirmada".into()),
        ..Default::default()
    };
    let r = client.update_reservation(9, &body).await.unwrap();
    assert_eq!(r.estado.as_deref(), Some("confirmada"));
}

#[tokio::test]
async fn test_delete_reservation() {
    let (server, client) = setup().await;

    Mock::given(method("DELETE"))
        .and(path("/api/v1/admin/reservaciones/9"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    client.delete_reservation(9).await.unwrap();
}

#[tokio::test]
async fn test_delete_missing_reservation_is_not_found() {
    let (server, client) = setup().await;

    Mock::given(method("DELETE"))
        .and(path("/api/v1/admin/reservaciones/9"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({"detail": "Reservación no encontrada"})),
        )
        .mount(&server)
        .await;

    let err = client.delete_reservation(9).await.unwrap_err();
    assert!(err.is_not_found(), "got {err:?}");
    assert!(
        matches!(err, Error::NotFound { ref message, .. } if message == "Reservación no encontrada")
    );
}

// ── Statistics ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_get_statistics() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/admin/dashboard/estadisticas"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total_reservaciones": 12,
            "reservaciones_hoy": 3,
            "reservaciones_pendientes": 4,
            "reservaciones_confirmadas_hoy": 2,
            "reservaciones_por_estado": {"pendiente": 4, "confirmada": 6, "cancelada": 2},
            "total_mesas": 10,
            "mesas_disponibles": 6,
            "mesas_ocupadas": 3,
            "mesas_reservadas": 1
        })))
        .mount(&server)
        .await;

    let stats = client.get_statistics().await.unwrap();
    assert_eq!(stats.total_mesas, 10);
    assert_eq!(stats.reservaciones_por_estado.get("confirmada"), Some(&6));
}
