// REST client for the reservation server
//
// Wraps `reqwest::Client` with base-URL joining, bearer-token injection,
// and status mapping. Endpoint methods return wire records; conversion
// into domain types happens in `tablero-core`.

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};
use url::Url;

use crate::auth::{TokenProvider, bearer_header};
use crate::error::Error;
use crate::models::{
    ErrorDetail, EstadisticasRecord, MesaRecord, MesaUpdate, ReservacionQuery, ReservacionRecord,
    ReservacionUpdate,
};
use crate::transport::TransportConfig;

/// Server-side cap on `limit` for the admin reservation listing.
pub const RESERVATION_PAGE_SIZE: usize = 100;

/// HTTP client for the reservation server's REST surface.
///
/// Cheap to clone: the underlying `reqwest::Client` and token provider
/// are both reference-counted.
#[derive(Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: Url,
    tokens: Arc<dyn TokenProvider>,
    /// Request timeout the client was built with, when known.
    timeout: Option<Duration>,
}

impl RestClient {
    /// Create a client from a `TransportConfig`.
    ///
    /// `base_url` is the API root, e.g. `http://localhost:8000/api/v1/`.
    /// A trailing slash is added if missing so relative joins keep the
    /// last path segment.
    pub fn new(
        base_url: Url,
        tokens: Arc<dyn TokenProvider>,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        let mut client = Self::with_client(http, base_url, tokens);
        client.timeout = Some(transport.timeout);
        Ok(client)
    }

    /// Create a client around a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            http,
            base_url: normalize_base(base_url),
            tokens,
            timeout: None,
        }
    }

    /// The API root this client resolves paths against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The token provider shared with the event-stream transport.
    pub fn tokens(&self) -> Arc<dyn TokenProvider> {
        Arc::clone(&self.tokens)
    }

    /// Resolve a path relative to the API root.
    pub fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    // ── Tables ───────────────────────────────────────────────────────

    /// `GET mesas/`: every table with its capacity class.
    pub async fn list_tables(&self) -> Result<Vec<MesaRecord>, Error> {
        let url = self.url("mesas/")?;
        self.get(url).await
    }

    /// `PUT mesas/{id}`: returns the updated table.
    pub async fn update_table(&self, id: i64, body: &MesaUpdate) -> Result<MesaRecord, Error> {
        let url = self.url(&format!("mesas/{id}"))?;
        self.put(url, body).await
    }

    // ── Reservations ─────────────────────────────────────────────────

    /// `GET admin/reservaciones`, following `skip`/`limit` pages until a
    /// short page is returned.
    pub async fn list_reservations(
        &self,
        query: &ReservacionQuery,
    ) -> Result<Vec<ReservacionRecord>, Error> {
        let mut all = Vec::new();
        let mut skip: usize = 0;

        loop {
            let mut url = self.url("admin/reservaciones")?;
            {
                let mut pairs = url.query_pairs_mut();
                if let Some(ref estado) = query.estado {
                    pairs.append_pair("estado", estado);
                }
                if let Some(ref fecha) = query.fecha {
                    pairs.append_pair("fecha", fecha);
                }
                pairs.append_pair("skip", &skip.to_string());
                pairs.append_pair("limit", &RESERVATION_PAGE_SIZE.to_string());
            }

            let page: Vec<ReservacionRecord> = self.get(url).await?;
            let page_len = page.len();
            all.extend(page);

            if page_len < RESERVATION_PAGE_SIZE {
                break;
            }
            skip += RESERVATION_PAGE_SIZE;
            trace!(skip, "fetching next reservation page");
        }

        Ok(all)
    }

    /// `PUT admin/reservaciones/{id}`: returns the updated reservation.
    pub async fn update_reservation(
        &self,
        id: i64,
        body: &ReservacionUpdate,
    ) -> Result<ReservacionRecord, Error> {
        let url = self.url(&format!("admin/reservaciones/{id}"))?;
        self.put(url, body).await
    }

    /// `DELETE admin/reservaciones/{id}`. A missing id is `Error::NotFound`.
    pub async fn delete_reservation(&self, id: i64) -> Result<(), Error> {
        let url = self.url(&format!("admin/reservaciones/{id}"))?;
        debug!("DELETE {}", url);

        let builder = self.authorize(self.http.delete(url.clone()));
        let resp = builder.send().await.map_err(|e| self.transport_error(e))?;
        check_status(&url, resp).await.map(drop)
    }

    // ── Statistics ───────────────────────────────────────────────────

    /// `GET admin/dashboard/estadisticas`.
    pub async fn get_statistics(&self) -> Result<EstadisticasRecord, Error> {
        let url = self.url("admin/dashboard/estadisticas")?;
        self.get(url).await
    }

    // ── Request helpers ──────────────────────────────────────────────

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.tokens.bearer_token() {
            Some(token) => builder.header(reqwest::header::AUTHORIZATION, bearer_header(&token)),
            None => builder,
        }
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!("GET {}", url);

        let builder = self.authorize(self.http.get(url.clone()));
        let resp = builder.send().await.map_err(|e| self.transport_error(e))?;

        parse_json(&url, resp).await.map_err(|e| self.timed_out(e))
    }

    async fn put<T: DeserializeOwned>(
        &self,
        url: Url,
        body: &(impl Serialize + Sync),
    ) -> Result<T, Error> {
        debug!("PUT {}", url);

        let builder = self.authorize(self.http.put(url.clone()).json(body));
        let resp = builder.send().await.map_err(|e| self.transport_error(e))?;

        parse_json(&url, resp).await.map_err(|e| self.timed_out(e))
    }

    fn transport_error(&self, err: reqwest::Error) -> Error {
        self.timed_out(Error::Transport(err))
    }

    /// Report a request that hit the client's timeout as
    /// `Error::Timeout` carrying that limit.
    fn timed_out(&self, err: Error) -> Error {
        match (err, self.timeout) {
            (Error::Transport(e), Some(limit)) if e.is_timeout() => Error::Timeout {
                timeout_secs: whole_seconds(limit),
            },
            (err, _) => err,
        }
    }
}

/// Seconds rounded up, so a sub-second limit never reads as zero.
fn whole_seconds(limit: Duration) -> u64 {
    limit.as_secs() + u64::from(limit.subsec_nanos() > 0)
}

fn normalize_base(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

/// Map non-2xx statuses into typed errors, passing successes through.
async fn check_status(url: &Url, resp: reqwest::Response) -> Result<reqwest::Response, Error> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorDetail>(&body)
        .map(|d| d.message())
        .unwrap_or_else(|_| body.chars().take(200).collect());

    Err(match status {
        StatusCode::UNAUTHORIZED => Error::Authentication {
            message: if message.is_empty() {
                "token expired or invalid".into()
            } else {
                message
            },
        },
        StatusCode::NOT_FOUND => Error::NotFound {
            path: url.path().to_owned(),
            message,
        },
        _ => Error::Api {
            status: status.as_u16(),
            message,
        },
    })
}

async fn parse_json<T: DeserializeOwned>(url: &Url, resp: reqwest::Response) -> Result<T, Error> {
    let resp = check_status(url, resp).await?;
    let body = resp.text().await.map_err(Error::Transport)?;

    serde_json::from_str(&body).map_err(|e| {
        let preview: String = body.chars().take(200).collect();
        Error::Deserialization {
            message: format!("{e} (body preview: {preview:?})"),
            body,
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::auth::StaticToken;

    fn client(base: &str) -> RestClient {
        RestClient::with_client(
            reqwest::Client::new(),
            Url::parse(base).unwrap(),
            Arc::new(StaticToken::anonymous()),
        )
    }

    #[test]
    fn base_without_trailing_slash_keeps_last_segment() {
        let c = client("http://localhost:8000/api/v1");
        assert_eq!(
            c.url("mesas/").unwrap().as_str(),
            "http://localhost:8000/api/v1/mesas/"
        );
    }

    #[test]
    fn leading_slash_in_path_is_relative() {
        let c = client("http://localhost:8000/api/v1/");
        assert_eq!(
            c.url("/admin/reservaciones/4").unwrap().as_str(),
            "http://localhost:8000/api/v1/admin/reservaciones/4"
        );
    }

    #[test]
    fn timeout_seconds_round_up() {
        assert_eq!(whole_seconds(Duration::from_secs(30)), 30);
        assert_eq!(whole_seconds(Duration::from_millis(200)), 1);
        assert_eq!(whole_seconds(Duration::from_millis(1500)), 2);
    }
}
