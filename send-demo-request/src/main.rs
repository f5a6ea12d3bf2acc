mod email_body;
mod secrets;

use async_once_cell::OnceCell;
use demo_request_form::{ApiResponse, SubmissionPayload, ValidationError};
use lambda_http::{
    http::{Method, StatusCode},
    run, service_fn, Body, Error, Request, Response,
};
use lettre::{
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::{Credentials, Mechanism},
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use secrets::{AwsSecretsManagerSecretRepository, SecretRepository};
use serde::{Deserialize, Serialize};
use std::{borrow::Cow, fmt::Display};
use tracing::{error, info};

const FROM_ADDRESS: &str = "Stora <info@storaapp.com>";
const TO_ADDRESS: &str = "Stora <info@storaapp.com>";

const SMTP_URL: &str = "smtps://email-smtp.us-east-1.amazonaws.com";
const SMTP_CREDENTIALS_NAME: &str = "smtp-ses-credentials";

// Every response carries these, so the browser accepts both the preflight and
// the POST from any origin.
const CORS_HEADERS: [(&str, &str); 3] = [
    ("Access-Control-Allow-Origin", "*"),
    ("Access-Control-Allow-Headers", "Content-Type"),
    ("Access-Control-Allow-Methods", "OPTIONS,POST"),
];

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .without_time()
        .init();

    let handler = DemoRequestHandler::<AwsSecretsManagerSecretRepository>::new().await;
    run(service_fn(|event| handler.handle(event))).await
}

struct DemoRequestHandler<SecretRepositoryT: SecretRepository> {
    secrets_repository: SecretRepositoryT,
    mailer: OnceCell<AsyncSmtpTransport<Tokio1Executor>>,
}

impl<SecretRepositoryT: SecretRepository> DemoRequestHandler<SecretRepositoryT> {
    async fn new() -> Self {
        Self {
            secrets_repository: SecretRepositoryT::open().await,
            mailer: Default::default(),
        }
    }

    async fn handle(&self, event: Request) -> Result<Response<Body>, Error> {
        if event.method() == Method::OPTIONS {
            return Ok(json_response(
                StatusCode::OK,
                &serde_json::json!({"message": "OK"}),
            ));
        }
        match self.process(event).await {
            Ok(message_id) => Ok(json_response(
                StatusCode::OK,
                &ApiResponse {
                    success: true,
                    message: "Email enviado correctamente".into(),
                    message_id: Some(message_id),
                    error: None,
                },
            )),
            Err(error) => {
                error.log();
                Ok(error.into_response())
            }
        }
    }

    async fn process(&self, event: Request) -> Result<String, DemoRequestError> {
        let payload = parse_payload(event.body())?;
        let submission = payload.validate().map_err(DemoRequestError::Validation)?;
        let email = construct_email(&submission)?;
        self.send_email(email).await
    }

    async fn send_email(&self, email: Message) -> Result<String, DemoRequestError> {
        let mailer = self
            .mailer
            .get_or_try_init(self.initialise_mailer())
            .await
            .map_err(|e| DemoRequestError::Delivery {
                description: format!("Unable to connect to SMTP server: {e}"),
            })?;
        match mailer.send(email).await {
            Ok(response) => {
                let message_id = response
                    .first_line()
                    .map(str::to_string)
                    .unwrap_or_else(|| response.code().to_string());
                info!("Email sent: {message_id}");
                Ok(message_id)
            }
            Err(error) => Err(DemoRequestError::Delivery {
                description: format!("Error sending message: {error}"),
            }),
        }
    }

    async fn initialise_mailer(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, Error> {
        let smtp_url = smtp_url();
        info!("initialise_mailer: Connecting to {smtp_url}");
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::from_url(&smtp_url)?
            .authentication(vec![Mechanism::Plain]);

        // Sending credentials over a non-TLS connection is risky, so we only set the credentials
        // when the connection URL is over TLS. If the environment is misconfigured so that
        // the credentials are not sent, the connection will be rejected. This is better than a
        // security breach.
        if smtp_url.starts_with("smtps://") {
            let parsed_credentials: SmtpCredentials = self
                .secrets_repository
                .get_secret(SMTP_CREDENTIALS_NAME)
                .await?;
            builder = builder.credentials(Credentials::new(
                parsed_credentials.username,
                parsed_credentials.password,
            ));
        }

        Ok(builder.build())
    }
}

fn parse_payload(body: &Body) -> Result<SubmissionPayload, DemoRequestError> {
    let parsed = match body {
        Body::Text(text) => serde_json::from_str(text),
        Body::Binary(bytes) => serde_json::from_slice(bytes),
        Body::Empty => serde_json::from_str(""),
    };
    parsed.map_err(|error| DemoRequestError::Parse(error.to_string()))
}

fn construct_email(
    submission: &demo_request_form::Submission,
) -> Result<Message, DemoRequestError> {
    let from: Mailbox = parse_address(&from_address())?;
    let to: Mailbox = parse_address(&to_address())?;
    // The shape check has already passed, so a parse failure here means the
    // address is not deliverable after all.
    let Ok(reply_to) = submission.email.parse::<Mailbox>() else {
        return Err(DemoRequestError::Validation(ValidationError::InvalidEmail));
    };
    let timestamp = email_body::current_timestamp();
    Message::builder()
        .from(from)
        .reply_to(reply_to)
        .to(to)
        .subject(email_body::subject(submission))
        .multipart(MultiPart::alternative_plain_html(
            email_body::render_text_body(submission, &timestamp),
            email_body::render_html_body(submission, &timestamp),
        ))
        .map_err(|error| DemoRequestError::Delivery {
            description: format!("Error building message: {error}"),
        })
}

fn parse_address(address: &str) -> Result<Mailbox, DemoRequestError> {
    address
        .parse()
        .map_err(|error| DemoRequestError::Delivery {
            description: format!("Invalid configured address {address}: {error}"),
        })
}

fn smtp_url() -> Cow<'static, str> {
    std::env::var("SMTP_URL")
        .map(Cow::Owned)
        .unwrap_or(SMTP_URL.into())
}

fn from_address() -> Cow<'static, str> {
    std::env::var("FROM_ADDRESS")
        .map(Cow::Owned)
        .unwrap_or(FROM_ADDRESS.into())
}

fn to_address() -> Cow<'static, str> {
    std::env::var("TO_ADDRESS")
        .map(Cow::Owned)
        .unwrap_or(TO_ADDRESS.into())
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Body> {
    let mut builder = Response::builder()
        .status(status)
        .header("Content-Type", "application/json");
    for (name, value) in CORS_HEADERS {
        builder = builder.header(name, value);
    }
    builder
        .body(serde_json::to_string(body).unwrap().into())
        .unwrap()
}

#[derive(Deserialize)]
struct SmtpCredentials {
    #[serde(rename = "SMTP_USERNAME")]
    username: String,
    #[serde(rename = "SMTP_PASSWORD")]
    password: String,
}

#[derive(Debug)]
enum DemoRequestError {
    Parse(String),
    Validation(ValidationError),
    Delivery { description: String },
}

impl DemoRequestError {
    fn log(&self) {
        match self {
            DemoRequestError::Parse(description) => {
                error!("Could not parse demo request body: {description}");
            }
            DemoRequestError::Validation(error) => {
                error!("Rejected demo request: {error}");
            }
            DemoRequestError::Delivery { description } => {
                error!("Error sending demo request email: {description}");
            }
        }
    }

    fn into_response(self) -> Response<Body> {
        match self {
            DemoRequestError::Parse(_) => json_response(
                StatusCode::BAD_REQUEST,
                &ApiResponse {
                    success: false,
                    message: "Invalid request format".into(),
                    message_id: None,
                    error: None,
                },
            ),
            DemoRequestError::Validation(error) => json_response(
                StatusCode::BAD_REQUEST,
                &ApiResponse {
                    success: false,
                    message: error.to_string(),
                    message_id: None,
                    error: None,
                },
            ),
            DemoRequestError::Delivery { description } => json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &ApiResponse {
                    success: false,
                    message: "Error al procesar la solicitud".into(),
                    message_id: None,
                    error: Some(description),
                },
            ),
        }
    }
}

impl Display for DemoRequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DemoRequestError::Parse(description) => write!(f, "Parse error: {description}"),
            DemoRequestError::Validation(error) => write!(f, "Validation error: {error}"),
            DemoRequestError::Delivery { description } => {
                write!(f, "Delivery error: {description}")
            }
        }
    }
}

impl std::error::Error for DemoRequestError {}

#[derive(Debug)]
enum EnvironmentError {
    MissingSecret(&'static str),
}

impl Display for EnvironmentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnvironmentError::MissingSecret(key) => write!(f, "Missing secret {key}"),
        }
    }
}

impl std::error::Error for EnvironmentError {}
