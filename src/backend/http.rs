use super::{
    BackendError, DataSourceScope, FileDescriptor, LogAnalysis, Reply, SupportBackend, UploadAck,
};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HttpBackendConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl Default for HttpBackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            api_key: None,
            timeout: Duration::from_secs(30),
        }
    }
}

/// `SupportBackend` over the service's form-data endpoints.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    config: HttpBackendConfig,
}

impl HttpBackend {
    pub fn new(config: HttpBackendConfig) -> Result<Self, BackendError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        form: Form,
    ) -> Result<T, BackendError> {
        let mut req = self.client.post(self.url(path)).multipart(form);

        if let Some(key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) {
            req = req.header("Authorization", format!("Bearer {}", key));
        }

        let resp = req.send().await.map_err(|e| {
            if e.is_timeout() {
                BackendError::Timeout(self.config.timeout)
            } else {
                BackendError::Http(e)
            }
        })?;
        read_json(resp).await
    }

    fn file_form(file: &FileDescriptor) -> Result<Form, BackendError> {
        let mut part = Part::bytes(file.content.to_vec()).file_name(file.name.clone());
        if !file.media_type.is_empty() {
            part = part.mime_str(&file.media_type)?;
        }
        Ok(Form::new().part("file", part))
    }
}

async fn read_json<T: DeserializeOwned>(resp: Response) -> Result<T, BackendError> {
    if !resp.status().is_success() {
        let status = resp.status().as_u16();
        let text = resp.text().await.unwrap_or_default();
        return Err(BackendError::Api {
            status,
            message: text,
        });
    }

    let text = resp.text().await?;
    serde_json::from_str(&text).map_err(|e| BackendError::Parse(e.to_string()))
}

#[async_trait]
impl SupportBackend for HttpBackend {
    async fn generate_reply(
        &self,
        question: &str,
        scope: DataSourceScope,
    ) -> Result<Reply, BackendError> {
        let form = Form::new()
            .text("question", question.to_string())
            .text("data_source", scope.as_str());
        self.post_form("/chatbot/chat", form).await
    }

    async fn upload_document(&self, file: &FileDescriptor) -> Result<UploadAck, BackendError> {
        self.post_form("/documents/upload", Self::file_form(file)?).await
    }

    async fn analyze_log(&self, file: &FileDescriptor) -> Result<LogAnalysis, BackendError> {
        self.post_form("/analyze/analyze", Self::file_form(file)?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn backend_for(server: &mockito::ServerGuard, api_key: Option<&str>) -> HttpBackend {
        HttpBackend::new(HttpBackendConfig {
            base_url: server.url(),
            api_key: api_key.map(String::from),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_generate_reply_posts_question_and_scope() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chatbot/chat")
            .match_header("authorization", "Bearer secret-key")
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex("How do I reset my password".into()),
                Matcher::Regex("chats".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"answer": "Use the reset link.", "sources": ["User_Guide.docx"]}"#)
            .create_async()
            .await;

        let backend = backend_for(&server, Some("secret-key"));
        let reply = backend
            .generate_reply("How do I reset my password?", DataSourceScope::ChatHistory)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(reply.answer, "Use the reset link.");
        assert_eq!(reply.sources, vec!["User_Guide.docx"]);
    }

    #[tokio::test]
    async fn test_upload_document_sends_file_part() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/documents/upload")
            .match_body(Matcher::Regex("filename=\"faq.txt\"".into()))
            .with_status(201)
            .with_body(r#"{"id": "doc-1"}"#)
            .create_async()
            .await;

        let backend = backend_for(&server, None);
        let file = FileDescriptor::from_name("faq.txt", b"Q: hours? A: 9-5".to_vec());
        let ack = backend.upload_document(&file).await.unwrap();

        mock.assert_async().await;
        assert_eq!(ack.document_id.as_deref(), Some("doc-1"));
    }

    #[tokio::test]
    async fn test_non_success_status_is_api_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/analyze/analyze")
            .with_status(415)
            .with_body("unsupported log format")
            .create_async()
            .await;

        let backend = backend_for(&server, None);
        let file = FileDescriptor::from_name("chat.log", b"...".to_vec());
        let err = backend.analyze_log(&file).await.unwrap_err();

        match err {
            BackendError::Api { status, message } => {
                assert_eq!(status, 415);
                assert_eq!(message, "unsupported log format");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_body_is_parse_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chatbot/chat")
            .with_status(200)
            .with_body("<html>oops</html>")
            .create_async()
            .await;

        let backend = backend_for(&server, None);
        let err = backend
            .generate_reply("hi", DataSourceScope::Both)
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Parse(_)));
    }

    #[test]
    fn test_url_joins_without_double_slash() {
        let backend = HttpBackend::new(HttpBackendConfig {
            base_url: "http://localhost:8000/".into(),
            ..HttpBackendConfig::default()
        })
        .unwrap();
        assert_eq!(backend.url("/chatbot/chat"), "http://localhost:8000/chatbot/chat");
    }
}
