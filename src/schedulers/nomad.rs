use async_trait::async_trait;
use bytes::Buf;
use futures::stream::{Stream, StreamExt};
use log::debug;
use std::io;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tokio_util::codec::{FramedRead, LinesCodec};
use tokio_util::io::StreamReader;

use crate::models::event::{EventBatch, Topic};
use crate::models::job::{Deployment, Job, JobListStub, JobRegisterResponse, Namespace};
use crate::models::job_diff::JobPlanResponse;
use crate::schedulers::scheduler::{
    EventStream, QueryOptions, Scheduler, SchedulerError, WriteOptions,
};
use crate::utils::config::Config;
use crate::utils::error::Error;

const INDEX_HEADER: &str = "X-Nomad-Index";
const TOKEN_HEADER: &str = "X-Nomad-Token";

// a single event frame carries whole job definitions
const MAX_EVENT_LINE: usize = 16 * 1024 * 1024;

/// Scheduler backed by the Nomad HTTP API.
pub struct NomadClient {
    client: Client,
    base_url: Url,
    url: String,
    token: Option<String>,
    region: Option<String>,
}

impl NomadClient {
    pub fn new(config: &Config) -> Result<NomadClient, Error> {
        let base_url = Url::parse(&config.nomad_addr).map_err(|err| {
            Error::ConfigurationError(format!("invalid NOMAD_ADDR '{}': {}", config.nomad_addr, err))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(Error::ConfigurationError(format!(
                "NOMAD_ADDR '{}' is not an http address",
                config.nomad_addr
            )));
        }

        // no request timeout, the event stream is long lived
        let client = Client::builder()
            .build()
            .map_err(|err| Error::ConfigurationError(format!("cannot build HTTP client: {}", err)))?;

        Ok(NomadClient {
            client,
            base_url,
            url: config.nomad_addr.clone(),
            token: config.nomad_token.clone(),
            region: config.nomad_region.clone(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn scope(&self, namespace: &Option<String>, region: &Option<String>) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(namespace) = namespace {
            params.push(("namespace", namespace.clone()));
        }
        if let Some(region) = region.as_ref().or(self.region.as_ref()) {
            params.push(("region", region.clone()));
        }
        params
    }

    fn request(&self, method: Method, segments: &[&str], params: &[(&str, String)]) -> RequestBuilder {
        let url = self.endpoint(segments);
        debug!("nomad {} {}", method, url);

        let mut builder = self.client.request(method, url).query(params);
        if let Some(token) = &self.token {
            builder = builder.header(TOKEN_HEADER, token.as_str());
        }
        builder
    }

    async fn send_json<B: Serialize + ?Sized>(
        &self,
        method: Method,
        segments: &[&str],
        params: &[(&str, String)],
        body: &B,
    ) -> Result<Response, SchedulerError> {
        let response = self.request(method, segments, params).json(body).send().await?;
        check_status(response).await
    }

    async fn get(&self, segments: &[&str], params: &[(&str, String)]) -> Result<Response, SchedulerError> {
        let response = self.request(Method::GET, segments, params).send().await?;
        check_status(response).await
    }
}

async fn check_status(response: Response) -> Result<Response, SchedulerError> {
    let status = response.status();

    if status.is_success() {
        Ok(response)
    } else if status == StatusCode::NOT_FOUND {
        Err(SchedulerError::NotFound(response.text().await.unwrap_or_default()))
    } else {
        let message = response.text().await.unwrap_or_default();
        Err(SchedulerError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, SchedulerError> {
    let body = response.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}

fn last_index(response: &Response) -> u64 {
    response
        .headers()
        .get(INDEX_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(0)
}

/// Splits a chunked body into newline delimited JSON values.
///
/// Blank lines are dropped; a line that fails to decode yields an error item
/// and the stream carries on with the next line. A line longer than
/// `max_length` or a transport error ends the stream after its error item.
pub fn ndjson<S, B, T>(chunks: S, max_length: usize) -> impl Stream<Item = Result<T, SchedulerError>>
where
    S: Stream<Item = Result<B, io::Error>>,
    B: Buf,
    T: DeserializeOwned,
{
    FramedRead::new(StreamReader::new(chunks), LinesCodec::new_with_max_length(max_length))
        .filter_map(|line| async move {
            match line {
                Ok(line) if line.trim().is_empty() => None,
                Ok(line) => Some(serde_json::from_str::<T>(&line).map_err(SchedulerError::from)),
                Err(err) => Some(Err(SchedulerError::from(err))),
            }
        })
}

#[async_trait]
impl Scheduler for NomadClient {
    fn url(&self) -> &str {
        &self.url
    }

    async fn list_jobs(&self, opts: &QueryOptions) -> Result<Vec<JobListStub>, SchedulerError> {
        let response = self.get(&["v1", "jobs"], &self.scope(&opts.namespace, &opts.region)).await?;
        decode(response).await
    }

    async fn last_job_index(&self) -> Result<u64, SchedulerError> {
        let response = self.get(&["v1", "jobs"], &self.scope(&None, &None)).await?;
        Ok(last_index(&response))
    }

    async fn job_info(&self, job_id: &str, opts: &QueryOptions) -> Result<Job, SchedulerError> {
        let response = self
            .get(&["v1", "job", job_id], &self.scope(&opts.namespace, &opts.region))
            .await?;
        decode(response).await
    }

    async fn parse_job(&self, hcl: &str) -> Result<Job, SchedulerError> {
        let body = json!({ "JobHCL": hcl, "Canonicalize": true });
        let response = self
            .send_json(Method::POST, &["v1", "jobs", "parse"], &self.scope(&None, &None), &body)
            .await?;
        decode(response).await
    }

    async fn register_namespace(
        &self,
        namespace: &Namespace,
        opts: &WriteOptions,
    ) -> Result<(), SchedulerError> {
        self.send_json(
            Method::POST,
            &["v1", "namespace"],
            &self.scope(&opts.namespace, &opts.region),
            namespace,
        )
        .await?;
        Ok(())
    }

    async fn plan_job(
        &self,
        job: &Job,
        diff: bool,
        opts: &WriteOptions,
    ) -> Result<JobPlanResponse, SchedulerError> {
        let job_id = job.id().unwrap_or_default();
        let body = json!({ "Job": job, "Diff": diff });
        let response = self
            .send_json(
                Method::POST,
                &["v1", "job", job_id, "plan"],
                &self.scope(&opts.namespace, &opts.region),
                &body,
            )
            .await?;
        decode(response).await
    }

    async fn register_job(
        &self,
        job: &Job,
        opts: &WriteOptions,
    ) -> Result<JobRegisterResponse, SchedulerError> {
        let body = json!({ "Job": job });
        let response = self
            .send_json(Method::POST, &["v1", "jobs"], &self.scope(&opts.namespace, &opts.region), &body)
            .await?;
        decode(response).await
    }

    async fn deregister_job(
        &self,
        job_id: &str,
        purge: bool,
        opts: &WriteOptions,
    ) -> Result<(), SchedulerError> {
        let mut params = self.scope(&opts.namespace, &opts.region);
        params.push(("purge", purge.to_string()));

        let response = self
            .request(Method::DELETE, &["v1", "job", job_id], &params)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn latest_deployment(
        &self,
        job_id: &str,
        opts: &QueryOptions,
    ) -> Result<Option<Deployment>, SchedulerError> {
        let response = self
            .get(
                &["v1", "job", job_id, "deployment"],
                &self.scope(&opts.namespace, &opts.region),
            )
            .await?;
        decode(response).await
    }

    async fn event_stream(
        &self,
        topics: &[(Topic, String)],
        index: u64,
        opts: &QueryOptions,
    ) -> Result<EventStream, SchedulerError> {
        let mut params = self.scope(&opts.namespace, &opts.region);
        for (topic, filter) in topics {
            params.push(("topic", format!("{}:{}", topic, filter)));
        }
        params.push(("index", index.to_string()));

        let response = self.get(&["v1", "event", "stream"], &params).await?;

        let chunks = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|err| io::Error::new(io::ErrorKind::Other, err)));

        Ok(ndjson::<_, _, EventBatch>(chunks, MAX_EVENT_LINE).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::config::DEFAULT_EVENT_BUFFER;
    use bytes::Bytes;
    use futures::stream;

    fn config(addr: &str) -> Config {
        Config {
            nomad_addr: addr.to_string(),
            nomad_token: None,
            nomad_region: Some("global".to_string()),
            sources_path: None,
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }

    fn chunks(parts: &[&str]) -> impl Stream<Item = Result<Bytes, io::Error>> {
        let parts: Vec<Result<Bytes, io::Error>> = parts
            .iter()
            .map(|part| Ok(Bytes::from(part.to_string())))
            .collect();
        stream::iter(parts)
    }

    #[test]
    fn endpoints_escape_segments() {
        let client = NomadClient::new(&config("http://nomad.local:4646/")).unwrap();

        let url = client.endpoint(&["v1", "job", "web api", "plan"]);

        assert_eq!(url.as_str(), "http://nomad.local:4646/v1/job/web%20api/plan");
        assert_eq!(client.url(), "http://nomad.local:4646/");
    }

    #[test]
    fn scope_falls_back_to_configured_region() {
        let client = NomadClient::new(&config("http://127.0.0.1:4646")).unwrap();

        let params = client.scope(&Some("ns1".to_string()), &None);

        assert_eq!(
            params,
            vec![("namespace", "ns1".to_string()), ("region", "global".to_string())]
        );
    }

    #[test]
    fn rejects_invalid_address() {
        match NomadClient::new(&config("not a url")) {
            Err(Error::ConfigurationError(_)) => {}
            _ => panic!("expected configuration error"),
        }
    }

    #[tokio::test]
    async fn ndjson_reassembles_split_lines() {
        let body = chunks(&[
            "{}\n{\"Index\": 5, \"Eve",
            "nts\": []}\n\n",
            "{\"Index\": 6}",
        ]);

        let batches: Vec<Result<EventBatch, SchedulerError>> = ndjson::<_, _, EventBatch>(body, MAX_EVENT_LINE)
            .collect()
            .await;

        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].as_ref().unwrap().is_heartbeat(), true);
        assert_eq!(batches[1].as_ref().unwrap().index, 5);
        assert_eq!(batches[2].as_ref().unwrap().index, 6);
    }

    #[tokio::test]
    async fn ndjson_keeps_going_after_bad_line() {
        let body = chunks(&["not json\n{\"Index\": 7}\n"]);

        let batches: Vec<Result<EventBatch, SchedulerError>> = ndjson::<_, _, EventBatch>(body, MAX_EVENT_LINE)
            .collect()
            .await;

        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].is_err(), true);
        assert_eq!(batches[1].as_ref().unwrap().index, 7);
    }

    #[tokio::test]
    async fn ndjson_stops_at_oversized_line() {
        let body = chunks(&["{\"Index\": 3}\n", "xxxxxxxxxxxxxxxxxxxxxxxx\n{\"Index\": 4}\n"]);

        let batches: Vec<Result<EventBatch, SchedulerError>> = ndjson::<_, _, EventBatch>(body, 16)
            .collect()
            .await;

        assert_eq!(batches[0].as_ref().unwrap().index, 3);
        match &batches[1] {
            Err(SchedulerError::Stream { .. }) => {}
            other => panic!("expected line length error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn ndjson_surfaces_transport_errors() {
        let body = stream::iter(vec![
            Ok(Bytes::from("{\"Index\": 8}\n")),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset")),
        ]);

        let batches: Vec<Result<EventBatch, SchedulerError>> = ndjson::<_, _, EventBatch>(body, MAX_EVENT_LINE)
            .collect()
            .await;

        assert_eq!(batches[0].as_ref().unwrap().index, 8);
        assert_eq!(batches[1].is_err(), true);
    }
}
