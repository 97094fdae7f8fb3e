use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use cert_common::{
    api::Directory,
    config::{EnvMsDuration, LookupConfig},
    debounce::LookupPhase,
    error::{ClientError, SubmitError},
    form::{Field, IssueWorkflow},
    models::{Certificate, CreateCertificate, Mention, Subject},
};
use tokio::time::sleep;

#[derive(Default)]
struct FakeDirectory {
    mentions: HashMap<String, Mention>,
    subjects: HashMap<String, Subject>,
    latency: HashMap<String, Duration>,
    failing: Vec<String>,
    subject_calls: Mutex<Vec<String>>,
    issued: Mutex<Vec<(CreateCertificate, Option<String>)>>,
}

impl FakeDirectory {
    fn with_mention(mut self, mention: Mention) -> Self {
        self.mentions.insert(mention.nro.clone(), mention);
        self
    }

    fn with_subject(mut self, key: &str, full_name: &str) -> Self {
        self.subjects.insert(
            key.to_string(),
            Subject {
                subject_key: key.to_string(),
                full_name: full_name.to_string(),
                ..Default::default()
            },
        );
        self
    }

    fn with_latency(mut self, key: &str, latency: Duration) -> Self {
        self.latency.insert(key.to_string(), latency);
        self
    }

    fn calls(&self) -> Vec<String> {
        self.subject_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Directory for FakeDirectory {
    async fn mention(&self, nro: &str) -> Result<Option<Mention>, ClientError> {
        if self.failing.iter().any(|f| f == nro) {
            return Err(ClientError::Timeout);
        }
        Ok(self.mentions.get(nro).cloned())
    }

    async fn subject(&self, subject_key: &str) -> Result<Option<Subject>, ClientError> {
        self.subject_calls
            .lock()
            .unwrap()
            .push(subject_key.to_string());
        if let Some(latency) = self.latency.get(subject_key) {
            sleep(*latency).await;
        }
        if self.failing.iter().any(|f| f == subject_key) {
            return Err(ClientError::Timeout);
        }
        Ok(self.subjects.get(subject_key).cloned())
    }

    async fn issue(
        &self,
        request: &CreateCertificate,
        mention_nro: Option<&str>,
    ) -> Result<Certificate, ClientError> {
        if self.failing.iter().any(|f| *f == request.course) {
            return Err(ClientError::Timeout);
        }
        self.issued
            .lock()
            .unwrap()
            .push((request.clone(), mention_nro.map(str::to_string)));
        Ok(Certificate {
            code: "SERVER000001".to_string(),
            first_names: request.first_names.clone(),
            last_names: request.last_names.clone(),
            course: request.course.clone(),
            ..Default::default()
        })
    }
}

fn lookup_config() -> LookupConfig {
    LookupConfig {
        quiet_period: EnvMsDuration(Duration::from_millis(1000)),
        min_length: 4,
    }
}

fn mention() -> Mention {
    Mention {
        nro: "M-001".to_string(),
        specialty: "Educación".to_string(),
        certificate_title: "Didáctica de la Matemática".to_string(),
        mention: "Nivel Primaria".to_string(),
        hours: "120".to_string(),
        start_date: String::new(),
        end_date: String::new(),
        issue_date: "2025-07-11".to_string(),
    }
}

/// Types `value` one character at a time, `gap` apart.
async fn type_slowly<D: Directory + 'static>(
    workflow: &mut IssueWorkflow<D>,
    value: &str,
    gap: Duration,
) {
    let mut typed = String::new();
    for c in value.chars() {
        typed.push(c);
        workflow.input_subject_key(&typed);
        sleep(gap).await;
    }
}

#[test_log::test(tokio::test(start_paused = true))]
async fn code_tracks_selection_and_subject() {
    let directory = Arc::new(FakeDirectory::default().with_mention(mention()));
    let mut workflow = IssueWorkflow::new(directory, &lookup_config());

    workflow.select_mention("M-001").await.unwrap();
    workflow.input_subject_key("12345678");
    assert_eq!(workflow.snapshot().code(), "k70bM0U4suDe");

    workflow.input_subject_key("87654321");
    assert_eq!(workflow.snapshot().code(), "2y3ApmYP5cjz");

    workflow.input_subject_key("12345678");
    assert_eq!(workflow.snapshot().code(), "k70bM0U4suDe");

    workflow.select_mention("").await.unwrap();
    let form = workflow.snapshot();
    assert_eq!(form.code(), "");
    assert_eq!(form.course(), "");
    assert!(!form.is_locked(Field::Course));
}

#[test_log::test(tokio::test(start_paused = true))]
async fn typing_fires_one_lookup_and_locks_the_name() {
    let directory = Arc::new(
        FakeDirectory::default()
            .with_mention(mention())
            .with_subject("12345678", "Ana María Quispe"),
    );
    let mut workflow = IssueWorkflow::new(directory.clone(), &lookup_config());

    type_slowly(&mut workflow, "12345678", Duration::from_millis(150)).await;
    assert_eq!(workflow.subject_lookup_phase(), LookupPhase::Pending);
    workflow.settled().await;

    assert_eq!(directory.calls(), vec!["12345678"]);
    let form = workflow.snapshot();
    assert_eq!(form.full_name(), "Ana María Quispe");
    assert!(form.is_locked(Field::FullName));
    assert!(workflow
        .edit(|form| form.set_field(Field::FullName, "Otra"))
        .is_err());

    // Backspacing below the minimum length drops the match
    workflow.input_subject_key("123");
    let form = workflow.snapshot();
    assert_eq!(form.full_name(), "");
    assert!(!form.is_locked(Field::FullName));
}

#[test_log::test(tokio::test(start_paused = true))]
async fn slow_stale_answer_never_overwrites_newer_one() {
    let directory = Arc::new(
        FakeDirectory::default()
            .with_subject("11111111", "Persona Vieja")
            .with_subject("22222222", "Persona Nueva")
            .with_latency("11111111", Duration::from_secs(5)),
    );
    let mut workflow = IssueWorkflow::new(directory.clone(), &lookup_config());

    workflow.input_subject_key("11111111");
    sleep(Duration::from_millis(1100)).await;
    assert_eq!(workflow.subject_lookup_phase(), LookupPhase::InFlight);

    workflow.input_subject_key("22222222");
    workflow.settled().await;
    assert_eq!(workflow.snapshot().full_name(), "Persona Nueva");

    sleep(Duration::from_secs(10)).await;
    assert_eq!(directory.calls(), vec!["11111111", "22222222"]);
    assert_eq!(workflow.snapshot().full_name(), "Persona Nueva");
}

#[test_log::test(tokio::test(start_paused = true))]
async fn unknown_subject_and_failures() {
    let directory = Arc::new(FakeDirectory {
        failing: vec!["99999999".to_string(), "M-404".to_string()],
        ..FakeDirectory::default().with_subject("12345678", "Ana María Quispe")
    });
    let mut workflow = IssueWorkflow::new(directory, &lookup_config());

    workflow.input_subject_key("12345678");
    workflow.settled().await;
    assert!(workflow.snapshot().is_locked(Field::FullName));

    workflow.input_subject_key("00000000");
    workflow.settled().await;
    let form = workflow.snapshot();
    assert_eq!(form.full_name(), "");
    assert_eq!(form.banner(), None);

    workflow.input_subject_key("99999999");
    workflow.settled().await;
    assert!(workflow.snapshot().banner().is_some());

    assert!(workflow.select_mention("M-404").await.is_err());
    assert_eq!(workflow.snapshot().mention(), None);
    assert_eq!(workflow.select_mention("M-002").await.unwrap(), None);
}

#[test_log::test(tokio::test(start_paused = true))]
async fn dropping_the_workflow_cancels_pending_lookup() {
    let directory = Arc::new(FakeDirectory::default().with_subject("12345678", "Ana"));
    let mut workflow = IssueWorkflow::new(directory.clone(), &lookup_config());

    workflow.input_subject_key("12345678");
    sleep(Duration::from_millis(400)).await;
    drop(workflow);

    sleep(Duration::from_secs(5)).await;
    assert!(directory.calls().is_empty());
}

#[test_log::test(tokio::test(start_paused = true))]
async fn autofilled_form_submits() {
    let directory = Arc::new(
        FakeDirectory::default()
            .with_mention(mention())
            .with_subject("12345678", "Ana María Quispe"),
    );
    let mut workflow = IssueWorkflow::new(directory, &lookup_config());

    workflow.select_mention("M-001").await.unwrap();
    workflow.input_subject_key("12345678");
    workflow.settled().await;

    let plan = workflow.submit_plan().unwrap();
    assert_eq!(plan.mention_nro.as_deref(), Some("M-001"));
    assert_eq!(plan.request.code, "k70bM0U4suDe");
    assert_eq!(plan.request.first_names, "Ana María");
    assert_eq!(plan.request.last_names, "Quispe");
    assert_eq!(plan.request.course, "Didáctica de la Matemática");
    assert_eq!(plan.request.issue_date, "2025-07-11");
}

#[test_log::test(tokio::test(start_paused = true))]
async fn submit_issues_and_starts_over() {
    let directory = Arc::new(
        FakeDirectory::default()
            .with_mention(mention())
            .with_subject("12345678", "Ana María Quispe"),
    );
    let mut workflow = IssueWorkflow::new(directory.clone(), &lookup_config());

    workflow.select_mention("M-001").await.unwrap();
    workflow.input_subject_key("12345678");
    workflow.settled().await;

    let certificate = workflow.submit().await.unwrap();
    assert_eq!(certificate.code, "SERVER000001");

    let issued = directory.issued.lock().unwrap().clone();
    assert_eq!(issued.len(), 1);
    assert_eq!(issued[0].0.code, "k70bM0U4suDe");
    assert_eq!(issued[0].1.as_deref(), Some("M-001"));

    let form = workflow.snapshot();
    assert_eq!(form.mention(), None);
    assert_eq!(form.full_name(), "");
    assert_eq!(form.code(), "");
}

#[test_log::test(tokio::test(start_paused = true))]
async fn invalid_or_failed_submit_keeps_the_form() {
    let directory = Arc::new(FakeDirectory {
        failing: vec!["Curso caído".to_string()],
        ..FakeDirectory::default()
    });
    let mut workflow = IssueWorkflow::new(directory.clone(), &lookup_config());

    assert!(matches!(
        workflow.submit().await,
        Err(SubmitError::Invalid(_))
    ));

    workflow.edit(|form| {
        form.set_field(Field::FullName, "Luis Rojas").unwrap();
        form.set_field(Field::Course, "Curso caído").unwrap();
    });
    assert!(matches!(
        workflow.submit().await,
        Err(SubmitError::Client(ClientError::Timeout))
    ));

    let form = workflow.snapshot();
    assert_eq!(form.full_name(), "Luis Rojas");
    assert!(form.banner().is_some());
    assert!(directory.issued.lock().unwrap().is_empty());
}
