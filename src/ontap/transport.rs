//! HTTP plumbing shared by the ONTAP resource helpers.

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::backend::Job;

use super::wire::{Accepted, Collection, ErrorEnvelope};
use super::{API_ROOT, OntapBackend, OntapBackendError};

impl OntapBackend {
    pub(super) fn endpoint(&self, path: &str) -> String {
        format!("{}{API_ROOT}{path}", self.origin)
    }

    async fn dispatch(
        &self,
        request: RequestBuilder,
        method: &Method,
        url: &str,
    ) -> Result<Response, OntapBackendError> {
        debug!(%method, url, "sending request");
        let response = request
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .map_err(|err| OntapBackendError::from_reqwest(&err))?;

        let status = response.status();
        debug!(%method, url, status = status.as_u16(), "received response");
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(parse_error(status, &body))
    }

    pub(super) async fn get<T>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, OntapBackendError>
    where
        T: DeserializeOwned,
    {
        let url = self.endpoint(path);
        let response = self
            .dispatch(self.http.get(&url).query(query), &Method::GET, &url)
            .await?;
        decode(response).await
    }

    /// Reads every page of a collection, keeping the controller's order.
    pub(super) async fn get_collection<T>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>, OntapBackendError>
    where
        T: DeserializeOwned,
    {
        let mut page: Collection<T> = self.get(path, query).await?;
        let mut records = Vec::new();
        loop {
            let next = page.next_href().map(|href| next_page_url(&self.origin, href));
            records.append(&mut page.records);
            let Some(url) = next else {
                return Ok(records);
            };
            let response = self
                .dispatch(self.http.get(&url), &Method::GET, &url)
                .await?;
            page = decode(response).await?;
        }
    }

    /// Sends a JSON body and returns the job handle when the controller
    /// accepted the request for background processing.
    pub(super) async fn send_body<B>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<Option<Job>, OntapBackendError>
    where
        B: Serialize + ?Sized,
    {
        let url = self.endpoint(path);
        let request = self.http.request(method.clone(), &url).json(body);
        let response = self.dispatch(request, &method, &url).await?;
        accepted_job(response).await
    }

    pub(super) async fn send_delete(&self, path: &str) -> Result<Option<Job>, OntapBackendError> {
        let url = self.endpoint(path);
        let response = self
            .dispatch(self.http.delete(&url), &Method::DELETE, &url)
            .await?;
        accepted_job(response).await
    }

    /// Waits for the job, if any, so the change is visible on return.
    pub(super) async fn settle(&self, job: Option<Job>) -> Result<(), OntapBackendError> {
        let Some(pending) = job else {
            return Ok(());
        };
        self.wait_for_job(&pending).await
    }
}

async fn accepted_job(response: Response) -> Result<Option<Job>, OntapBackendError> {
    if response.status() != StatusCode::ACCEPTED {
        return Ok(None);
    }
    let accepted: Accepted = decode(response).await?;
    Ok(accepted.job.map(|link| Job { uuid: link.uuid }))
}

async fn decode<T>(response: Response) -> Result<T, OntapBackendError>
where
    T: DeserializeOwned,
{
    let bytes = response
        .bytes()
        .await
        .map_err(|err| OntapBackendError::from_reqwest(&err))?;
    decode_slice(&bytes)
}

pub(super) fn decode_slice<T>(bytes: &[u8]) -> Result<T, OntapBackendError>
where
    T: DeserializeOwned,
{
    serde_json::from_slice(bytes).map_err(|err| OntapBackendError::Decode {
        message: err.to_string(),
    })
}

/// Resolves a `_links.next` reference against the controller origin. The
/// controller sends paths such as `/api/storage/volumes?start.uuid=...`.
pub(super) fn next_page_url(origin: &str, href: &str) -> String {
    if href.starts_with("https://") || href.starts_with("http://") {
        return href.to_owned();
    }
    format!("{origin}{href}")
}

/// Converts an error response into an [`OntapBackendError::Api`].
pub(super) fn parse_error(status: StatusCode, body: &str) -> OntapBackendError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => OntapBackendError::api(status, envelope.error.code, envelope.error.message),
        Err(_) => OntapBackendError::api(status, None, Some(body.trim().to_owned())),
    }
}
