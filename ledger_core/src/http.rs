//! HTTP implementation of [`WalletService`] over a pooled reqwest client.
//!
//! | Method | Path                  | Body                      |
//! |--------|-----------------------|---------------------------|
//! | POST   | `/wallets`            | `{balance, userId}`       |
//! | POST   | `/wallets/{id}/debit` | `{amount}`                |
//! | POST   | `/wallets/{id}/credit`| `{amount}`                |
//! | GET    | `/wallets/{id}`       | -                         |
//!
//! Amounts and balances always travel as decimal strings.

use crate::config::{ConfigError, HttpConfig};

use async_trait::async_trait;
use ledger_env::{AmountRequest, Leg, NewWallet, ServiceError, WalletId, WalletService};
use reqwest::{Client, Response, Url};
use rust_decimal::Decimal;
use serde_json::Value;
use std::error::Error as StdError;
use std::io;
use std::str::FromStr;
use std::time::Duration;
use tracing::trace;

/// Wallet service reached over HTTP.
///
/// One instance is shared by every worker; the underlying client pools
/// connections and is safe for concurrent use.
#[derive(Debug, Clone)]
pub struct HttpWalletService {
    /// Service root, without trailing slash
    base_url: String,
    
    /// Pooled client
    client: Client,
    
    /// Request timeout (reported in timeout errors)
    request_timeout: Duration,
}

impl HttpWalletService {
    /// Builds the client.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL does not parse or the client fails to build.
    pub fn new(config: &HttpConfig) -> Result<Self, ConfigError> {
        Url::parse(&config.base_url).map_err(|e| ConfigError::InvalidBaseUrl {
            url: config.base_url.clone(),
            reason: e.to_string(),
        })?;
        
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .build()
            .map_err(|e| ConfigError::Client(e.to_string()))?;
        
        Ok(Self {
            base_url: config.base_url.clone(),
            client,
            request_timeout: config.request_timeout,
        })
    }
    
    fn wallet_url(&self, wallet: &WalletId) -> String {
        format!("{}/wallets/{}", self.base_url, wallet)
    }
    
    /// Maps a transport error onto the service taxonomy.
    fn classify(&self, err: reqwest::Error) -> ServiceError {
        if err.is_timeout() {
            ServiceError::Timeout(self.request_timeout.as_millis() as u64)
        } else if err.is_connect() || is_connection_loss(&err) {
            ServiceError::exhausted(err.to_string())
        } else if err.is_decode() {
            ServiceError::malformed(err.to_string())
        } else {
            ServiceError::Request(err.to_string())
        }
    }
    
    /// Turns a non-2xx response into an error.
    async fn check(&self, response: Response) -> Result<Response, ServiceError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ServiceError::Status {
            status: status.as_u16(),
            body,
        })
    }
    
    async fn json_body(&self, response: Response) -> Result<Value, ServiceError> {
        response.json::<Value>().await.map_err(|e| self.classify(e))
    }
    
    async fn move_balance(&self, leg: Leg, wallet: &WalletId, amount: Decimal) -> Result<(), ServiceError> {
        let url = format!("{}/{}", self.wallet_url(wallet), leg.name());
        let body = AmountRequest::new(amount);
        trace!(%url, amount = %body.amount, "JSON data sent");
        
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.classify(e))?;
        self.check(response).await?;
        Ok(())
    }
}

/// True if the error chain bottoms out in a dropped or refused connection.
fn is_connection_loss(err: &(dyn StdError + 'static)) -> bool {
    let mut source: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(e) = source {
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            if matches!(
                io_err.kind(),
                io::ErrorKind::ConnectionRefused
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof
            ) {
                return true;
            }
        }
        source = e.source();
    }
    false
}

/// Reads a decimal that may arrive as a string or a JSON number.
fn decimal_field(body: &Value, field: &str) -> Result<Decimal, ServiceError> {
    let text = match body.get(field) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => return Err(ServiceError::malformed(format!("missing `{}` in {}", field, body))),
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|e| ServiceError::malformed(format!("bad `{}` {:?}: {}", field, text, e)))
}

#[async_trait]
impl WalletService for HttpWalletService {
    async fn create_wallet(&self, wallet: &NewWallet) -> Result<WalletId, ServiceError> {
        let response = self
            .client
            .post(format!("{}/wallets", self.base_url))
            .json(wallet)
            .send()
            .await
            .map_err(|e| self.classify(e))?;
        let body = self.json_body(self.check(response).await?).await?;
        
        match body.get("id") {
            Some(Value::String(id)) => Ok(WalletId::new(id.clone())),
            Some(Value::Number(id)) => Ok(WalletId::new(id.to_string())),
            _ => Err(ServiceError::malformed(format!("missing `id` in {}", body))),
        }
    }
    
    async fn debit(&self, wallet: &WalletId, amount: Decimal) -> Result<(), ServiceError> {
        self.move_balance(Leg::Debit, wallet, amount).await
    }
    
    async fn credit(&self, wallet: &WalletId, amount: Decimal) -> Result<(), ServiceError> {
        self.move_balance(Leg::Credit, wallet, amount).await
    }
    
    async fn balance(&self, wallet: &WalletId) -> Result<Decimal, ServiceError> {
        let response = self
            .client
            .get(self.wallet_url(wallet))
            .send()
            .await
            .map_err(|e| self.classify(e))?;
        let body = self.json_body(self.check(response).await?).await?;
        decimal_field(&body, "balance")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::{Path, State},
        http::StatusCode,
        routing::{get, post},
        Json, Router,
    };
    use ledger_env::{FailureKind, UserId};
    use serde_json::json;
    use std::collections::HashMap;
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;
    
    type Wallets = Arc<Mutex<HashMap<String, Decimal>>>;
    
    async fn start_test_server(router: Router) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }
    
    fn string_decimal(body: &Value, field: &str) -> Option<Decimal> {
        body.get(field)?.as_str().and_then(|s| Decimal::from_str(s).ok())
    }
    
    async fn create(State(wallets): State<Wallets>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
        let Some(balance) = string_decimal(&body, "balance") else {
            return (StatusCode::BAD_REQUEST, Json(json!({"error": "balance"})));
        };
        if body.get("userId").and_then(Value::as_str).is_none() {
            return (StatusCode::BAD_REQUEST, Json(json!({"error": "userId"})));
        }
        let mut wallets = wallets.lock().unwrap();
        let id = format!("wallet-{}", wallets.len() + 1);
        wallets.insert(id.clone(), balance);
        (StatusCode::CREATED, Json(json!({"id": id, "balance": balance.to_string()})))
    }
    
    fn adjust(wallets: &Wallets, id: &str, body: &Value, sign: Decimal) -> StatusCode {
        let Some(amount) = string_decimal(body, "amount") else {
            return StatusCode::BAD_REQUEST;
        };
        match wallets.lock().unwrap().get_mut(id) {
            Some(balance) => {
                *balance += sign * amount;
                StatusCode::OK
            }
            None => StatusCode::NOT_FOUND,
        }
    }
    
    async fn debit(State(w): State<Wallets>, Path(id): Path<String>, Json(body): Json<Value>) -> StatusCode {
        adjust(&w, &id, &body, Decimal::NEGATIVE_ONE)
    }
    
    async fn credit(State(w): State<Wallets>, Path(id): Path<String>, Json(body): Json<Value>) -> StatusCode {
        adjust(&w, &id, &body, Decimal::ONE)
    }
    
    async fn read(State(w): State<Wallets>, Path(id): Path<String>) -> (StatusCode, Json<Value>) {
        match w.lock().unwrap().get(&id) {
            Some(balance) => (StatusCode::OK, Json(json!({"id": id, "balance": balance.to_string()}))),
            None => (StatusCode::NOT_FOUND, Json(json!({}))),
        }
    }
    
    fn ledger_router() -> Router {
        let wallets: Wallets = Arc::default();
        Router::new()
            .route("/wallets", post(create))
            .route("/wallets/{id}", get(read))
            .route("/wallets/{id}/debit", post(debit))
            .route("/wallets/{id}/credit", post(credit))
            .with_state(wallets)
    }
    
    fn service(addr: SocketAddr) -> HttpWalletService {
        HttpWalletService::new(&HttpConfig::new(format!("http://{addr}/"))).unwrap()
    }
    
    #[tokio::test]
    async fn test_round_trip_against_server() {
        let addr = start_test_server(ledger_router()).await;
        let svc = service(addr);
        
        let a = svc
            .create_wallet(&NewWallet::new(Decimal::new(1000, 1), UserId::new()))
            .await
            .unwrap();
        let b = svc
            .create_wallet(&NewWallet::new(Decimal::new(1000, 1), UserId::new()))
            .await
            .unwrap();
        assert_eq!(a, WalletId::new("wallet-1"));
        
        svc.debit(&a, Decimal::new(1000, 2)).await.unwrap();
        svc.credit(&b, Decimal::new(1000, 2)).await.unwrap();
        
        assert_eq!(svc.balance(&a).await.unwrap(), Decimal::new(90, 0));
        assert_eq!(svc.balance(&b).await.unwrap(), Decimal::new(110, 0));
    }
    
    #[tokio::test]
    async fn test_non_success_status_is_other_failure() {
        let addr = start_test_server(ledger_router()).await;
        let svc = service(addr);
        
        let err = svc.debit(&WalletId::new("missing"), Decimal::ONE).await.unwrap_err();
        assert!(matches!(err, ServiceError::Status { status: 404, .. }));
        assert_eq!(err.kind(), FailureKind::Other);
    }
    
    #[tokio::test]
    async fn test_timeout_is_other_failure() {
        let router = Router::new().route(
            "/wallets/{id}/debit",
            post(|| async {
                tokio::time::sleep(Duration::from_millis(500)).await;
                StatusCode::OK
            }),
        );
        let addr = start_test_server(router).await;
        let config = HttpConfig::new(format!("http://{addr}")).with_request_timeout(Duration::from_millis(50));
        let svc = HttpWalletService::new(&config).unwrap();
        
        let err = svc.debit(&WalletId::new("a"), Decimal::ONE).await.unwrap_err();
        assert!(matches!(err, ServiceError::Timeout(50)));
        assert_eq!(err.kind(), FailureKind::Other);
    }
    
    #[tokio::test]
    async fn test_refused_connection_is_exhaustion() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        
        let err = service(addr).credit(&WalletId::new("a"), Decimal::ONE).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::ConnectionExhausted);
    }
    
    #[tokio::test]
    async fn test_reset_connection_is_exhaustion() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = stream.read(&mut buf).await;
            // Zero linger turns the close into a RST
            #[allow(deprecated)]
            stream.set_linger(Some(Duration::ZERO)).unwrap();
            drop(stream);
        });
        
        let err = service(addr).debit(&WalletId::new("a"), Decimal::ONE).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::ConnectionExhausted, "{err}");
    }
    
    #[derive(Debug)]
    struct Wrapped(io::Error);
    
    impl std::fmt::Display for Wrapped {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "request failed")
        }
    }
    
    impl StdError for Wrapped {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            Some(&self.0)
        }
    }
    
    #[test]
    fn test_connection_loss_walks_source_chain() {
        for kind in [
            io::ErrorKind::ConnectionReset,
            io::ErrorKind::ConnectionAborted,
            io::ErrorKind::BrokenPipe,
            io::ErrorKind::UnexpectedEof,
        ] {
            assert!(is_connection_loss(&Wrapped(io::Error::from(kind))), "{kind:?}");
        }
        
        assert!(!is_connection_loss(&Wrapped(io::Error::from(io::ErrorKind::PermissionDenied))));
        assert!(!is_connection_loss(&io::Error::other("plain")));
    }
    
    #[tokio::test]
    async fn test_missing_balance_is_malformed() {
        let router = Router::new().route("/wallets/{id}", get(|| async { Json(json!({"id": "a"})) }));
        let addr = start_test_server(router).await;
        
        let err = service(addr).balance(&WalletId::new("a")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Malformed(_)));
    }
    
    #[test]
    fn test_numeric_balance_is_parsed_exactly() {
        let body = json!({"balance": 1000.25});
        assert_eq!(decimal_field(&body, "balance").unwrap(), Decimal::new(100025, 2));
        
        // More digits than an f64 can hold
        let body: Value = serde_json::from_str(r#"{"balance": 12345678901234.56789}"#).unwrap();
        assert_eq!(
            decimal_field(&body, "balance").unwrap(),
            Decimal::from_str("12345678901234.56789").unwrap()
        );
        
        let body = json!({"balance": "0.10000"});
        assert_eq!(decimal_field(&body, "balance").unwrap().to_string(), "0.10000");
    }
    
    #[test]
    fn test_invalid_base_url_rejected() {
        assert!(matches!(
            HttpWalletService::new(&HttpConfig::new("not a url")),
            Err(ConfigError::InvalidBaseUrl { .. })
        ));
    }
}
