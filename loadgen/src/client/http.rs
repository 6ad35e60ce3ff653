//! reqwest-backed implementation of [`QueueApi`]

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{self, BoxStream, Stream, StreamExt};
use reqwest::header::{ACCEPT, HeaderName};
use reqwest::{StatusCode, Url};
use std::collections::VecDeque;
use std::fmt::Display;
use std::time::Duration;
use tracing::debug;

use super::service::{QueueApi, StatusStream};
use super::sse::SseDecoder;
use super::types::{ClientError, Endpoint, SetupError};
use crate::config::{HttpConfig, TargetConfig};
use crate::protocol::{EntryRequest, EntryTicket};

/// Queue client sharing one pooled `reqwest::Client` across all sessions
#[derive(Debug, Clone)]
pub struct HttpQueueClient {
    http: reqwest::Client,
    entry_url: Url,
    stream_url: Url,
    verify_url: Url,
    token_header: HeaderName,
    request_timeout: Duration,
}

impl HttpQueueClient {
    pub fn new(target: &TargetConfig, http: &HttpConfig) -> Result<Self, SetupError> {
        let entry_url = parse_url("entry", &target.entry_url())?;
        let stream_url = parse_url("stream", &target.stream_url())?;
        let verify_url = parse_url("verify", &target.verify_url())?;
        let token_header = HeaderName::from_bytes(target.token_header.as_bytes())
            .map_err(|_| SetupError::InvalidHeader(target.token_header.clone()))?;

        // No client-wide timeout: it would also cut off the status stream body
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(http.pool_max_idle_per_host)
            .connect_timeout(http.connect_timeout)
            .build()?;

        Ok(Self {
            http: client,
            entry_url,
            stream_url,
            verify_url,
            token_header,
            request_timeout: http.request_timeout,
        })
    }
}

fn parse_url(name: &'static str, url: &str) -> Result<Url, SetupError> {
    Url::parse(url).map_err(|e| SetupError::InvalidUrl {
        name,
        url: url.to_string(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl QueueApi for HttpQueueClient {
    async fn enter_or_check(
        &self,
        action_id: i64,
        destination_url: &str,
    ) -> Result<EntryTicket, ClientError> {
        let body = EntryRequest {
            action_id,
            destination_url: destination_url.to_string(),
        };

        let resp = self
            .http
            .post(self.entry_url.clone())
            .timeout(self.request_timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| ClientError::from_transport(Endpoint::Entry, e))?;

        let status = resp.status();
        if status != StatusCode::OK {
            return Err(ClientError::Rejected {
                endpoint: Endpoint::Entry,
                status: status.as_u16(),
            });
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| ClientError::from_transport(Endpoint::Entry, e))?;

        serde_json::from_slice(&bytes).map_err(|e| ClientError::Malformed {
            endpoint: Endpoint::Entry,
            reason: e.to_string(),
        })
    }

    async fn open_status_stream(
        &self,
        action_id: i64,
        customer_id: &str,
    ) -> Result<StatusStream, ClientError> {
        let mut url = self.stream_url.clone();
        url.query_pairs_mut()
            .append_pair("actionId", &action_id.to_string())
            .append_pair("customerId", customer_id);

        let resp = self
            .http
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| ClientError::from_transport(Endpoint::Stream, e))?;

        let status = resp.status();
        if status != StatusCode::OK {
            return Err(ClientError::Rejected {
                endpoint: Endpoint::Stream,
                status: status.as_u16(),
            });
        }

        Ok(StatusStream::new(message_payloads(resp.bytes_stream())))
    }

    async fn verify(&self, token: &str) -> Result<(), ClientError> {
        let resp = self
            .http
            .post(self.verify_url.clone())
            .timeout(self.request_timeout)
            .header(self.token_header.clone(), token)
            .send()
            .await
            .map_err(|e| ClientError::from_transport(Endpoint::Verify, e))?;

        let status = resp.status();
        // Drain so the connection can go back to the pool
        let body = resp.bytes().await.unwrap_or_default();
        debug!(status = status.as_u16(), body_len = body.len(), "verify response");

        if status == StatusCode::OK {
            Ok(())
        } else {
            Err(ClientError::Rejected {
                endpoint: Endpoint::Verify,
                status: status.as_u16(),
            })
        }
    }
}

/// Turn a raw event-stream body into the data of its `message` events
pub fn message_payloads<S, E>(body: S) -> BoxStream<'static, Result<String, ClientError>>
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + Send,
{
    let state = (Box::pin(body), SseDecoder::new(), VecDeque::new());

    stream::unfold(Some(state), |state| async move {
        let (mut body, mut decoder, mut ready) = state?;
        loop {
            if let Some(data) = ready.pop_front() {
                return Some((Ok(data), Some((body, decoder, ready))));
            }

            match body.next().await {
                Some(Ok(chunk)) => ready.extend(
                    decoder
                        .feed(&chunk)
                        .into_iter()
                        .filter(|event| event.is_message())
                        .map(|event| event.data),
                ),
                Some(Err(e)) => return Some((Err(ClientError::Stream(e.to_string())), None)),
                None => return None,
            }
        }
    })
    .boxed()
}
