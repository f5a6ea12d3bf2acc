use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde_json::{json, Value};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

/// A stand-in for the deployed demo-request endpoint, configurable to accept,
/// reject or fail each submission. Binds an ephemeral port so tests can run
/// concurrently.
#[derive(Clone)]
pub struct FakeApiGateway {
    behaviour: Behaviour,
    hits: Arc<AtomicUsize>,
}

#[derive(Clone)]
enum Behaviour {
    Accept { message_id: String },
    Reject { message: String },
    Fail,
}

impl FakeApiGateway {
    pub fn accepting(message_id: impl Into<String>) -> Self {
        Self::new(Behaviour::Accept {
            message_id: message_id.into(),
        })
    }

    pub fn rejecting(message: impl Into<String>) -> Self {
        Self::new(Behaviour::Reject {
            message: message.into(),
        })
    }

    pub fn failing() -> Self {
        Self::new(Behaviour::Fail)
    }

    fn new(behaviour: Behaviour) -> Self {
        Self {
            behaviour,
            hits: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// How many submissions reached the endpoint.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    /// Starts serving in the background and returns the endpoint URL.
    pub async fn start(&self) -> String {
        let app = Router::new()
            .route("/contact", post(respond))
            .with_state(self.clone());
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0))
            .await
            .unwrap();
        let url = format!("http://{}/contact", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        url
    }
}

async fn respond(
    State(state): State<FakeApiGateway>,
    Json(_payload): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.hits.fetch_add(1, Ordering::SeqCst);
    match &state.behaviour {
        Behaviour::Accept { message_id } => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": "Email enviado correctamente",
                "messageId": message_id,
            })),
        ),
        Behaviour::Reject { message } => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "success": false,
                "message": message,
            })),
        ),
        Behaviour::Fail => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "success": false,
                "message": "Error al procesar la solicitud",
                "error": "simulated provider failure",
            })),
        ),
    }
}
