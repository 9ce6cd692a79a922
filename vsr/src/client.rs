use anyhow::Result;
use reqwest::{Client, Proxy};
use std::future::Future;
use vsr_core::{CandidateRequest, RawResponse, Transport, TransportError};

/// [`Transport`] over a shared reqwest client.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(proxy: Option<Proxy>, no_certificate_checks: bool) -> Result<Self> {
        let mut builder = Client::builder()
            .cookie_store(true)
            .danger_accept_invalid_certs(no_certificate_checks);

        if let Some(proxy) = proxy {
            builder = builder.proxy(proxy);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }
}

impl Transport for HttpTransport {
    fn fetch(
        &self,
        request: &CandidateRequest,
    ) -> impl Future<Output = Result<RawResponse, TransportError>> + Send {
        let mut builder = self.client.get(request.url.clone());

        for (key, value) in &request.headers {
            builder = builder.header(key, value);
        }

        async move {
            let response = builder.send().await.map_err(|e| check_reqwest_error(&e))?;
            let status = response.status().as_u16();
            let url = response.url().clone();
            let body = response
                .bytes()
                .await
                .map_err(|e| check_reqwest_error(&e))?;

            log::trace!("{} answered {} with {} bytes", url, status, body.len());

            Ok(RawResponse {
                status,
                body: body.to_vec(),
                url: Some(url),
            })
        }
    }
}

fn check_reqwest_error(error: &reqwest::Error) -> TransportError {
    let url = error
        .url()
        .map(|x| x.to_string())
        .unwrap_or_else(|| "request".to_owned());

    if let Some(status) = error.status() {
        return TransportError::Status {
            status: status.as_u16(),
        };
    }

    TransportError::Request(if error.is_connect() {
        format!("{url} (connection error)")
    } else if error.is_timeout() {
        format!("{url} (timeout)")
    } else if error.is_builder() {
        format!("{url} (invalid request: {error})")
    } else {
        format!("{url} ({error})")
    })
}
