use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::sync::Mutex;

use crate::errors::EndpointError;
use crate::models::message::Message;
use crate::providers::base::{
    ApiExchange, ApiFailure, ApiRequest, ApiResponse, MessagesRequest, Provider,
};
use crate::providers::utils::message_to_response_body;

/// A mock provider that returns pre-configured responses for testing
pub struct MockProvider {
    responses: Arc<Mutex<Vec<Result<Message, EndpointError>>>>,
    requests: Arc<Mutex<Vec<MessagesRequest>>>,
    caching: bool,
}

impl MockProvider {
    /// Create a new mock provider with a sequence of responses
    pub fn new(responses: Vec<Message>) -> Self {
        Self::with_results(responses.into_iter().map(Ok).collect())
    }

    /// Create a mock provider whose calls may fail
    pub fn with_results(responses: Vec<Result<Message, EndpointError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            requests: Arc::new(Mutex::new(Vec::new())),
            caching: false,
        }
    }

    pub fn with_prompt_caching(mut self) -> Self {
        self.caching = true;
        self
    }

    /// Handle on the requests received so far, usable after the provider is boxed
    pub fn requests(&self) -> Arc<Mutex<Vec<MessagesRequest>>> {
        Arc::clone(&self.requests)
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn supports_prompt_caching(&self) -> bool {
        self.caching
    }

    async fn send(&self, request: &MessagesRequest) -> Result<ApiExchange, ApiFailure> {
        self.requests.lock().unwrap().push(request.clone());

        let api_request = ApiRequest {
            method: "POST".to_string(),
            url: "mock://v1/messages".to_string(),
            headers: Vec::new(),
            body: json!({"model": request.model}),
        };

        let next = {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                // Return empty response if no more pre-configured responses
                Ok(Message::assistant().with_text(""))
            } else {
                responses.remove(0)
            }
        };

        match next {
            Ok(message) => Ok(ApiExchange {
                request: api_request,
                response: ApiResponse {
                    status: 200,
                    headers: Vec::new(),
                    body: message_to_response_body(&message),
                },
            }),
            Err(error) => Err(ApiFailure {
                request: api_request,
                response: None,
                error,
            }),
        }
    }
}
