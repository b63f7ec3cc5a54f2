use std::{io::Read, path::PathBuf};

use chrono::{DateTime, Local};
use color_eyre::{
    Result,
    eyre::{bail, eyre},
};
use log::{info, warn};
use tokio::time::{Instant, sleep};

use crate::{
    FluxError,
    args::Args,
    artifacts::{ArtifactSet, to_pretty_json},
    config::{Config, Settings},
    prompt::PromptInput,
    request::GenerationRequest,
    service::{FluxService, JobStatus, PollResponse, StartResponse},
};

/// Files left behind by a successful run
#[derive(Debug, Clone)]
pub struct Artifacts {
    pub request: PathBuf,
    pub result: PathBuf,
    pub image: PathBuf,
}

/// One invocation of the client: resolve the configuration, read the prompt,
/// build the request and run it.
///
/// The API key is looked up before stdin is touched, so a missing key fails
/// without waiting for input and without any request going out.
pub async fn execute<S, R>(
    args: &Args,
    settings: &Settings,
    env: impl Fn(&str) -> Option<String>,
    input: PromptInput<R>,
    service: &S,
    started: DateTime<Local>,
) -> Result<Artifacts>
where
    S: FluxService + ?Sized,
    R: Read,
{
    let config = Config::resolve(args, settings, env)?;
    let prompt = input.read()?;
    let request = GenerationRequest::new(prompt, &args.generation)?;
    let artifacts = ArtifactSet::new(&config.output_dir, started);
    run(&config, &request, &artifacts, service).await
}

/// Submits `request`, waits for the job and stores the artifacts.
///
/// The request file is written right after the service accepted the job, the
/// result and image files only once the image has been downloaded.
pub async fn run<S: FluxService + ?Sized>(
    config: &Config,
    request: &GenerationRequest,
    artifacts: &ArtifactSet,
    service: &S,
) -> Result<Artifacts> {
    if config.verbose {
        println!("Request JSON:\n{}", to_pretty_json(request)?);
    }

    let job = service.submit(&config.api_key, request).await?;
    info!("Submitted job {}", job.id);
    let request_path = artifacts.write_request(request)?;

    if config.verbose {
        println!("Response from POST request:\n{}", to_pretty_json(&job)?);
    }

    let result = wait_until_ready(config, &job, service).await?;
    let url = result
        .sample_url()
        .ok_or_else(|| eyre!(FluxError::generation("No image URL found in the result")))?;
    let image = service.fetch_image(url).await?;

    let result_path = artifacts.write_result(&result)?;
    let image_path = artifacts.write_image(&image)?;
    println!("Image saved to {}", image_path.display());

    Ok(Artifacts {
        request: request_path,
        result: result_path,
        image: image_path,
    })
}

async fn wait_until_ready<S: FluxService + ?Sized>(
    config: &Config,
    job: &StartResponse,
    service: &S,
) -> Result<PollResponse> {
    let deadline = Instant::now() + config.timeout;

    loop {
        sleep(config.poll_interval).await;
        if Instant::now() >= deadline {
            bail!(FluxError::generation(format!(
                "timed out after {}s waiting for job {}",
                config.timeout.as_secs(),
                job.id
            )));
        }

        let response = match service.poll(&config.api_key, job).await {
            Ok(response) => response,
            Err(e) if e.downcast_ref::<FluxError>().is_some() => return Err(e),
            Err(e) => {
                warn!("Polling job {} failed: {e:#}", job.id);
                println!("Error during GET request: {e}");
                continue;
            }
        };

        if config.verbose {
            println!("Result Response:\n{}", to_pretty_json(&response)?);
        }

        if response.status == JobStatus::Ready {
            println!("Result is ready.");
            return Ok(response);
        }
        if response.status.is_failure() {
            bail!(FluxError::generation(response.failure_details()));
        }
        println!("Status: {}", response.status);
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        fs,
        path::Path,
        sync::{
            Mutex,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    };

    use serde_json::{Value, json};
    use tempfile::TempDir;

    use super::*;
    use crate::{args::GenerationArgs, request::Seed, service::ServiceFuture};

    const IMAGE: &[u8] = b"\xff\xd8\xff\xe0JFIF";
    const TRANSIENT: &str = "<connection reset>";

    /// Answers polls from a script, `Pending` once the script runs out
    #[derive(Default)]
    struct MockService {
        script: Mutex<VecDeque<Value>>,
        reject_submit: bool,
        sent: Mutex<Option<Value>>,
        submits: AtomicUsize,
        polls: AtomicUsize,
        fetches: AtomicUsize,
    }

    impl MockService {
        fn with_statuses(statuses: &[&str]) -> Self {
            let script = statuses
                .iter()
                .map(|status| match *status {
                    "Ready" => json!({
                        "id": "job-1",
                        "status": "Ready",
                        "result": {"sample": "https://cdn.example/job-1.jpg", "seed": 42},
                    }),
                    other => json!({"id": "job-1", "status": other}),
                })
                .collect();
            Self {
                script: Mutex::new(script),
                ..Self::default()
            }
        }

        fn with_script(script: Vec<Value>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                ..Self::default()
            }
        }

        fn calls(&self) -> (usize, usize, usize) {
            (
                self.submits.load(Ordering::SeqCst),
                self.polls.load(Ordering::SeqCst),
                self.fetches.load(Ordering::SeqCst),
            )
        }
    }

    impl FluxService for MockService {
        fn submit<'a>(
            &'a self,
            _api_key: &'a str,
            request: &'a GenerationRequest,
        ) -> ServiceFuture<'a, StartResponse> {
            Box::pin(async move {
                self.submits.fetch_add(1, Ordering::SeqCst);
                *self.sent.lock().unwrap() = Some(serde_json::to_value(request)?);
                if self.reject_submit {
                    bail!(FluxError::submission("402 Payment Required - no credits"));
                }
                Ok(StartResponse {
                    id: "job-1".into(),
                    ..StartResponse::default()
                })
            })
        }

        fn poll<'a>(
            &'a self,
            _api_key: &'a str,
            _job: &'a StartResponse,
        ) -> ServiceFuture<'a, PollResponse> {
            Box::pin(async move {
                self.polls.fetch_add(1, Ordering::SeqCst);
                let next = self.script.lock().unwrap().pop_front();
                let body = match next {
                    Some(Value::String(s)) if s == TRANSIENT => bail!("connection reset"),
                    Some(body) => body,
                    None => json!({"id": "job-1", "status": "Pending"}),
                };
                let response: PollResponse = serde_json::from_value(body)?;
                Ok(response)
            })
        }

        fn fetch_image<'a>(&'a self, url: &'a str) -> ServiceFuture<'a, Vec<u8>> {
            Box::pin(async move {
                self.fetches.fetch_add(1, Ordering::SeqCst);
                assert_eq!(url, "https://cdn.example/job-1.jpg");
                Ok(IMAGE.to_vec())
            })
        }
    }

    fn config(dir: &Path) -> Config {
        Config {
            api_key: "test-key".into(),
            output_dir: dir.join("output"),
            poll_interval: Duration::ZERO,
            timeout: Duration::from_secs(30),
            verbose: false,
        }
    }

    fn request() -> GenerationRequest {
        let args = GenerationArgs {
            seed: Seed::Fixed(7),
            ..GenerationArgs::default()
        };
        GenerationRequest::new("a lighthouse in a storm", &args).unwrap()
    }

    fn files_in(dir: &Path) -> Vec<String> {
        if !dir.exists() {
            return vec![];
        }
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    fn generation_message(err: &color_eyre::Report) -> String {
        match err.downcast_ref::<FluxError>() {
            Some(FluxError::Generation { message }) => message.clone(),
            other => panic!("expected a generation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn ready_on_first_poll_writes_three_files() -> Result<()> {
        let tmp = TempDir::new()?;
        let cfg = config(tmp.path());
        let artifacts = ArtifactSet::new(&cfg.output_dir, Local::now());
        let service = MockService::with_statuses(&["Ready"]);

        let written = run(&cfg, &request(), &artifacts, &service).await?;

        let stamp = artifacts.stamp();
        assert_eq!(
            files_in(&cfg.output_dir),
            vec![
                format!("{stamp}_request.json"),
                format!("{stamp}_result.jpg"),
                format!("{stamp}_result.json"),
            ]
        );

        let on_disk: Value = serde_json::from_str(&fs::read_to_string(&written.request)?)?;
        assert_eq!(Some(on_disk), service.sent.lock().unwrap().clone());

        let result: Value = serde_json::from_str(&fs::read_to_string(&written.result)?)?;
        assert_eq!(result["status"], "Ready");
        assert_eq!(fs::read(&written.image)?, IMAGE);
        assert_eq!(service.calls(), (1, 1, 1));
        Ok(())
    }

    #[tokio::test]
    async fn pending_twice_then_ready() -> Result<()> {
        let tmp = TempDir::new()?;
        let cfg = config(tmp.path());
        let artifacts = ArtifactSet::new(&cfg.output_dir, Local::now());
        let service = MockService::with_statuses(&["Pending", "Pending", "Ready"]);

        run(&cfg, &request(), &artifacts, &service).await?;

        assert_eq!(service.calls(), (1, 3, 1));
        Ok(())
    }

    #[tokio::test]
    async fn failure_on_first_poll_keeps_only_the_request() -> Result<()> {
        let tmp = TempDir::new()?;
        let cfg = config(tmp.path());
        let artifacts = ArtifactSet::new(&cfg.output_dir, Local::now());
        let service = MockService::with_script(vec![json!({
            "id": "job-1",
            "status": "Error",
            "details": "GPU fell over",
        })]);

        let err = run(&cfg, &request(), &artifacts, &service)
            .await
            .unwrap_err();

        assert!(generation_message(&err).contains("GPU fell over"));
        assert!(artifacts.request_path().exists());
        assert!(!artifacts.result_path().exists());
        assert!(!artifacts.image_path().exists());
        assert_eq!(service.calls(), (1, 1, 0));
        Ok(())
    }

    #[tokio::test]
    async fn moderated_request_is_a_failure() -> Result<()> {
        let tmp = TempDir::new()?;
        let cfg = config(tmp.path());
        let artifacts = ArtifactSet::new(&cfg.output_dir, Local::now());
        let service = MockService::with_statuses(&["Pending", "Request Moderated"]);

        let err = run(&cfg, &request(), &artifacts, &service)
            .await
            .unwrap_err();

        assert!(generation_message(&err).contains("Request Moderated"));
        assert_eq!(service.calls(), (1, 2, 0));
        Ok(())
    }

    #[tokio::test]
    async fn rejected_submission_writes_nothing() -> Result<()> {
        let tmp = TempDir::new()?;
        let cfg = config(tmp.path());
        let artifacts = ArtifactSet::new(&cfg.output_dir, Local::now());
        let service = MockService {
            reject_submit: true,
            ..MockService::default()
        };

        let err = run(&cfg, &request(), &artifacts, &service)
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<FluxError>(),
            Some(FluxError::Submission { .. })
        ));
        assert!(!cfg.output_dir.exists());
        assert_eq!(service.calls(), (1, 0, 0));
        Ok(())
    }

    #[tokio::test]
    async fn transient_poll_errors_are_retried() -> Result<()> {
        let tmp = TempDir::new()?;
        let cfg = config(tmp.path());
        let artifacts = ArtifactSet::new(&cfg.output_dir, Local::now());
        let service = MockService::with_script(vec![
            json!(TRANSIENT),
            json!({"id": "job-1", "status": "Pending"}),
            json!({
                "id": "job-1",
                "status": "Ready",
                "result": {"sample": "https://cdn.example/job-1.jpg"},
            }),
        ]);

        run(&cfg, &request(), &artifacts, &service).await?;

        assert_eq!(service.calls(), (1, 3, 1));
        Ok(())
    }

    #[tokio::test]
    async fn gives_up_at_the_deadline() -> Result<()> {
        let tmp = TempDir::new()?;
        let cfg = Config {
            timeout: Duration::ZERO,
            ..config(tmp.path())
        };
        let artifacts = ArtifactSet::new(&cfg.output_dir, Local::now());
        let service = MockService::default();

        let err = run(&cfg, &request(), &artifacts, &service)
            .await
            .unwrap_err();

        assert!(generation_message(&err).contains("timed out"));
        assert!(artifacts.request_path().exists());
        assert!(!artifacts.result_path().exists());
        Ok(())
    }

    #[tokio::test]
    async fn ready_without_image_url() -> Result<()> {
        let tmp = TempDir::new()?;
        let cfg = config(tmp.path());
        let artifacts = ArtifactSet::new(&cfg.output_dir, Local::now());
        let service =
            MockService::with_script(vec![json!({"id": "job-1", "status": "Ready", "result": {}})]);

        let err = run(&cfg, &request(), &artifacts, &service)
            .await
            .unwrap_err();

        assert!(generation_message(&err).contains("No image URL"));
        assert!(!artifacts.result_path().exists());
        assert_eq!(service.calls(), (1, 1, 0));
        Ok(())
    }

    #[tokio::test]
    async fn missing_api_key_makes_no_requests() -> Result<()> {
        let tmp = TempDir::new()?;
        let args = Args {
            output_dir: Some(tmp.path().join("output")),
            ..Args::default()
        };
        let service = MockService::with_statuses(&["Ready"]);

        let err = execute(
            &args,
            &Settings::default(),
            |_| None,
            PromptInput::new(&b"a cat"[..], false),
            &service,
            Local::now(),
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<FluxError>(),
            Some(FluxError::Configuration { message }) if message.contains("API key not found")
        ));
        assert_eq!(service.calls(), (0, 0, 0));
        assert!(files_in(&tmp.path().join("output")).is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn empty_prompt_makes_no_requests() -> Result<()> {
        let tmp = TempDir::new()?;
        let args = Args {
            output_dir: Some(tmp.path().join("output")),
            ..Args::default()
        };
        let service = MockService::with_statuses(&["Ready"]);

        let err = execute(
            &args,
            &Settings::default(),
            |_| Some("key".into()),
            PromptInput::new(&b"\n"[..], false),
            &service,
            Local::now(),
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<FluxError>(),
            Some(FluxError::Validation { .. })
        ));
        assert_eq!(service.calls(), (0, 0, 0));
        Ok(())
    }

    #[tokio::test]
    async fn execute_end_to_end() -> Result<()> {
        let tmp = TempDir::new()?;
        let mut args = Args {
            output_dir: Some(tmp.path().join("output")),
            verbose: true,
            ..Args::default()
        };
        args.generation.seed = Seed::Null;
        let service = MockService::with_statuses(&["Pending", "Ready"]);

        let written = execute(
            &args,
            &Settings::default(),
            |name| (name == "BFL_API_KEY").then(|| "key".to_string()),
            PromptInput::new(&b"  a cat wearing a hat \n"[..], false),
            &service,
            Local::now(),
        )
        .await?;

        let sent: Value = serde_json::from_str(&fs::read_to_string(&written.request)?)?;
        assert_eq!(sent["prompt"], "a cat wearing a hat");
        assert!(sent.get("seed").is_none());
        assert_eq!(service.calls(), (1, 2, 1));
        Ok(())
    }
}
