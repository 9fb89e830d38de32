use axum::extract::Multipart;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use docchat_core::document::PDF_MEDIA_TYPE;
use docchat_core::{
    ChatService, Config, Document, ErrorKind, HttpChatService, PendingOperation, Role,
    SessionController, SessionError,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

async fn spawn_server(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Answers with a description of the multipart form it received.
async fn echo(mut multipart: Multipart) -> Json<Value> {
    let mut file = String::new();
    let mut question = String::new();

    while let Some(field) = multipart.next_field().await.unwrap() {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "file" => {
                let name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().unwrap_or_default().to_string();
                let bytes = field.bytes().await.unwrap();
                file = format!("{} {} {}", name, content_type, bytes.len());
            }
            "question" => question = field.text().await.unwrap(),
            _ => {}
        }
    }

    Json(json!({ "answer": format!("{} | {}", file, question) }))
}

fn report_pdf() -> Document {
    Document::new("report.pdf", PDF_MEDIA_TYPE, b"%PDF-1.4 report body".to_vec())
}

#[tokio::test]
async fn test_sends_file_and_question_as_multipart() {
    let base_url = spawn_server(Router::new().route("/chat", post(echo))).await;
    let service = HttpChatService::new(&base_url);

    let answer = service.chat(&report_pdf(), "What is the total?").await.unwrap();
    assert_eq!(answer, "report.pdf application/pdf 20 | What is the total?");
}

#[tokio::test]
async fn test_server_error_carries_detail() {
    let router = Router::new().route(
        "/chat",
        post(|| async {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "could not parse PDF" })),
            )
        }),
    );
    let base_url = spawn_server(router).await;
    let service = HttpChatService::new(&base_url);

    let err = service.chat(&report_pdf(), "q").await.unwrap_err();
    assert_eq!(
        err,
        SessionError::Status {
            status: 500,
            detail: "could not parse PDF".into()
        }
    );
    assert_eq!(err.kind(), ErrorKind::Transport);
}

#[tokio::test]
async fn test_missing_answer_is_malformed() {
    let router = Router::new().route("/chat", post(|| async { Json(json!({ "result": "ok" })) }));
    let base_url = spawn_server(router).await;
    let service = HttpChatService::new(&base_url);

    let err = service.chat(&report_pdf(), "q").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedResponse);
}

#[tokio::test]
async fn test_unknown_route_is_transport_error() {
    let base_url = spawn_server(Router::new()).await;
    let service = HttpChatService::new(&base_url);

    let err = service.chat(&report_pdf(), "q").await.unwrap_err();
    assert!(matches!(err, SessionError::Status { status: 404, .. }));
}

#[tokio::test]
async fn test_connection_refused_is_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let service = HttpChatService::new(&format!("http://{}", addr));
    let err = service.chat(&report_pdf(), "q").await.unwrap_err();
    assert!(matches!(err, SessionError::Transport(_)));
}

#[tokio::test]
async fn test_timeout_is_transport_error() {
    let router = Router::new().route(
        "/chat",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Json(json!({ "answer": "too late" }))
        }),
    );
    let base_url = spawn_server(router).await;
    let service = HttpChatService::with_timeout(&base_url, Duration::from_millis(100)).unwrap();

    let err = service.chat(&report_pdf(), "q").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
}

#[tokio::test]
async fn test_session_over_http() {
    let base_url = spawn_server(Router::new().route("/chat", post(echo))).await;
    let service = HttpChatService::with_timeout(&base_url, Config::default().request_timeout()).unwrap();
    let mut controller = SessionController::new(Arc::new(service));

    controller.ingest_document(report_pdf()).await.unwrap();
    controller.ask("Who signed it?").await.unwrap();

    let session = controller.session();
    assert_eq!(session.pending(), PendingOperation::None);
    let messages = session.transcript().messages();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0].content(), "report.pdf application/pdf 20 | start");
    assert_eq!(messages[1].role(), Role::User);
    assert_eq!(messages[2].content(), "report.pdf application/pdf 20 | Who signed it?");
}
