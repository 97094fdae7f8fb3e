//! The certificate issuance form.
//!
//! [`IssueForm`] holds the field values and the locking rules tying them to the selected
//! mention and the matched subject. [`IssueWorkflow`] drives it: it resolves mentions,
//! debounces subject lookups and applies their results.

use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::{
    api::Directory,
    codegen::generate_code,
    config::LookupConfig,
    dates,
    debounce::{Debouncer, LookupPhase},
    error::{ClientError, FormError, InvalidForm, SubmitError},
    models::{Certificate, CertificateStatus, CreateCertificate, Mention, Subject},
};

/// Fields a user can type into directly. The subject key goes through
/// [`IssueWorkflow::input_subject_key`] instead, since it drives a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    FullName,
    Course,
    Hours,
    IssueDate,
    Code,
    Status,
}

impl Field {
    pub fn label(&self) -> &'static str {
        match self {
            Field::FullName => "full name",
            Field::Course => "course",
            Field::Hours => "hours",
            Field::IssueDate => "issue date",
            Field::Code => "code",
            Field::Status => "status",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueForm {
    code: String,
    full_name: String,
    subject_key: String,
    course: String,
    issue_date: String,
    hours: String,
    status: CertificateStatus,
    mention: Option<Mention>,
    matched_subject: Option<Subject>,
    /// Whether `full_name` holds what the matched subject supplied.
    name_from_lookup: bool,
    banner: Option<String>,
}

impl Default for IssueForm {
    fn default() -> Self {
        Self::new()
    }
}

impl IssueForm {
    pub fn new() -> Self {
        Self {
            code: String::new(),
            full_name: String::new(),
            subject_key: String::new(),
            course: String::new(),
            issue_date: dates::today(),
            hours: String::new(),
            status: CertificateStatus::Valid,
            mention: None,
            matched_subject: None,
            name_from_lookup: false,
            banner: None,
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn subject_key(&self) -> &str {
        &self.subject_key
    }

    pub fn course(&self) -> &str {
        &self.course
    }

    pub fn issue_date(&self) -> &str {
        &self.issue_date
    }

    pub fn hours(&self) -> &str {
        &self.hours
    }

    pub fn status(&self) -> &CertificateStatus {
        &self.status
    }

    pub fn mention(&self) -> Option<&Mention> {
        self.mention.as_ref()
    }

    pub fn matched_subject(&self) -> Option<&Subject> {
        self.matched_subject.as_ref()
    }

    /// Error message to show above the form, if any.
    pub fn banner(&self) -> Option<&str> {
        self.banner.as_deref()
    }

    pub fn dismiss_banner(&mut self) {
        self.banner = None;
    }

    pub fn is_locked(&self, field: Field) -> bool {
        self.lock_source(field).is_some()
    }

    fn lock_source(&self, field: Field) -> Option<&'static str> {
        match field {
            Field::Course | Field::Hours | Field::IssueDate if self.mention.is_some() => {
                Some("mention")
            }
            Field::FullName if self.name_from_lookup => Some("subject"),
            _ => None,
        }
    }

    fn recompute_code(&mut self) {
        let selection = self.mention.as_ref().map(|m| m.nro.as_str()).unwrap_or("");
        self.code = generate_code(selection, &self.subject_key);
    }

    /// Selects a mention, copying its course data into the form and locking those fields, or
    /// clears the selection, unlocking and resetting them.
    pub fn select_mention(&mut self, mention: Option<Mention>) {
        match mention {
            Some(mention) => {
                self.course = mention.certificate_title.clone();
                self.hours = mention.hours.clone();
                if let Some(date) = dates::normalize_issue_date(&mention.issue_date) {
                    self.issue_date = date;
                }
                self.mention = Some(mention);
            }
            None => {
                self.mention = None;
                self.course.clear();
                self.hours.clear();
                self.issue_date = dates::today();
            }
        }
        self.recompute_code();
    }

    pub fn set_subject_key(&mut self, subject_key: &str) {
        self.subject_key = subject_key.to_string();
        self.recompute_code();
    }

    /// Drops whatever a previous subject lookup filled in.
    pub fn clear_subject_match(&mut self) {
        self.matched_subject = None;
        if self.name_from_lookup {
            self.full_name.clear();
            self.name_from_lookup = false;
        }
    }

    /// Applies the result of a subject lookup.
    ///
    /// A match with a name fills and locks the full name; a match without one leaves the field
    /// editable. Not-found silently clears the previous match. Any other failure clears it too
    /// and raises the banner.
    pub fn apply_subject_lookup(&mut self, outcome: Result<Option<Subject>, ClientError>) {
        match outcome {
            Ok(Some(subject)) => {
                self.clear_subject_match();
                if !subject.full_name.trim().is_empty() {
                    self.full_name = subject.full_name.clone();
                    self.name_from_lookup = true;
                }
                self.matched_subject = Some(subject);
            }
            Ok(None) => self.clear_subject_match(),
            Err(err) => {
                self.clear_subject_match();
                self.banner = Some(format!("Error looking up subject: {err}"));
            }
        }
    }

    pub fn set_field(&mut self, field: Field, value: &str) -> Result<(), FormError> {
        if let Some(source_name) = self.lock_source(field) {
            return Err(FormError::Locked {
                field: field.label(),
                source_name,
            });
        }

        let value = value.to_string();
        match field {
            Field::FullName => self.full_name = value,
            Field::Course => self.course = value,
            Field::Hours => self.hours = value,
            Field::IssueDate => self.issue_date = value,
            Field::Code => self.code = value,
            Field::Status => self.status = CertificateStatus::from(value.as_str()),
        }
        Ok(())
    }

    /// Every problem that would make the backend reject the form.
    pub fn validate(&self) -> Vec<FormError> {
        let mut errors = Vec::new();

        if self.full_name.trim().is_empty() {
            errors.push(FormError::Missing(Field::FullName.label()));
        }
        if self.course.trim().is_empty() {
            errors.push(FormError::Missing(Field::Course.label()));
        }
        let issue_date = self.issue_date.trim();
        if issue_date.is_empty() {
            errors.push(FormError::Missing(Field::IssueDate.label()));
        } else if NaiveDate::parse_from_str(issue_date, "%Y-%m-%d").is_err() {
            errors.push(FormError::InvalidDate(issue_date.to_string()));
        }
        let code = self.code.trim();
        if code.chars().any(char::is_whitespace) {
            errors.push(FormError::InvalidCode(code.to_string()));
        }

        errors
    }

    /// Builds the creation request, or returns every field error.
    pub fn submit_plan(&self) -> Result<SubmitPlan, InvalidForm> {
        let errors = self.validate();
        if !errors.is_empty() {
            return Err(InvalidForm(errors));
        }

        let full_name = self.full_name.trim().to_string();
        let (first_names, last_names) = split_full_name(&full_name);

        let request = CreateCertificate {
            code: self.code.trim().to_string(),
            first_names: if first_names.is_empty() {
                full_name.clone()
            } else {
                first_names
            },
            last_names,
            subject_key: non_empty(&self.subject_key),
            course: self.course.trim().to_string(),
            issue_date: self.issue_date.trim().to_string(),
            hours: non_empty(&self.hours),
            status: self.status.clone(),
            full_name: Some(full_name),
        };

        Ok(SubmitPlan {
            request,
            mention_nro: self.mention.as_ref().map(|m| m.nro.clone()),
        })
    }
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Splits a full name into first names (every word but the last) and last name (the last
/// word). A single word is all first names.
pub fn split_full_name(full_name: &str) -> (String, String) {
    let parts: Vec<&str> = full_name.split_whitespace().collect();
    match parts.as_slice() {
        [] => (String::new(), String::new()),
        [only] => (only.to_string(), String::new()),
        [first @ .., last] => (first.join(" "), last.to_string()),
    }
}

/// What to send to the backend to create the certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitPlan {
    pub request: CreateCertificate,
    pub mention_nro: Option<String>,
}

/// Drives an [`IssueForm`] against a [`Directory`].
///
/// Dropping the workflow cancels any pending subject lookup and discards any lookup result
/// still on its way.
pub struct IssueWorkflow<D: Directory + 'static> {
    directory: Arc<D>,
    form: Arc<Mutex<IssueForm>>,
    subject_lookup: Debouncer,
}

impl<D: Directory + 'static> IssueWorkflow<D> {
    pub fn new(directory: Arc<D>, lookup: &LookupConfig) -> Self {
        Self::with_debouncer(
            directory,
            Debouncer::new("subject_key", lookup.quiet_period.0, lookup.min_length),
        )
    }

    pub fn with_debouncer(directory: Arc<D>, subject_lookup: Debouncer) -> Self {
        Self {
            directory,
            form: Arc::new(Mutex::new(IssueForm::new())),
            subject_lookup,
        }
    }

    /// A copy of the form as it is right now.
    pub fn snapshot(&self) -> IssueForm {
        self.form.lock().unwrap().clone()
    }

    pub fn edit<R>(&self, f: impl FnOnce(&mut IssueForm) -> R) -> R {
        f(&mut *self.form.lock().unwrap())
    }

    pub fn subject_lookup_phase(&self) -> LookupPhase {
        self.subject_lookup.phase()
    }

    /// Selects the mention `nro`, or clears the selection when `nro` is blank.
    ///
    /// An unknown mention clears the selection without error. A failing backend clears it,
    /// raises the banner and returns the error.
    pub async fn select_mention(&self, nro: &str) -> Result<Option<Mention>, ClientError> {
        let nro = nro.trim();
        if nro.is_empty() {
            self.edit(|form| form.select_mention(None));
            return Ok(None);
        }

        match self.directory.mention(nro).await {
            Ok(mention) => {
                if mention.is_none() {
                    info!("mention {nro} not found, clearing selection");
                }
                self.edit(|form| {
                    form.dismiss_banner();
                    form.select_mention(mention.clone())
                });
                Ok(mention)
            }
            Err(err) => {
                warn!("failed to load mention {nro}: {err}");
                self.edit(|form| {
                    form.select_mention(None);
                    form.banner = Some(format!("Error loading mention: {err}"));
                });
                Err(err)
            }
        }
    }

    /// Records a keystroke-level change of the subject key.
    pub fn input_subject_key(&mut self, value: &str) {
        self.edit(|form| form.set_subject_key(value));

        let directory = self.directory.clone();
        let form = self.form.clone();
        let scheduled = self.subject_lookup.schedule(
            value,
            move |subject_key| async move { directory.subject(&subject_key).await },
            move |outcome: Result<Option<Subject>, ClientError>| {
                form.lock().unwrap().apply_subject_lookup(outcome)
            },
        );

        if !scheduled {
            debug!("subject key too short for a lookup");
            self.edit(|form| form.clear_subject_match());
        }
    }

    /// Waits for the pending subject lookup, if any, to land.
    pub async fn settled(&self) {
        self.subject_lookup.settled().await
    }

    pub fn submit_plan(&self) -> Result<SubmitPlan, InvalidForm> {
        self.form.lock().unwrap().submit_plan()
    }

    /// Validates the form and issues the certificate.
    ///
    /// On success the form starts over and the stored certificate is returned; its code is the
    /// backend's, which may differ from the derived one. A backend failure keeps the form as it
    /// was and raises the banner.
    pub async fn submit(&mut self) -> Result<Certificate, SubmitError> {
        let plan = self.submit_plan()?;

        match self
            .directory
            .issue(&plan.request, plan.mention_nro.as_deref())
            .await
        {
            Ok(certificate) => {
                if certificate.code != plan.request.code {
                    info!(
                        derived = %plan.request.code,
                        stored = %certificate.code,
                        "backend assigned a different code"
                    );
                }
                self.subject_lookup.cancel();
                self.edit(|form| *form = IssueForm::new());
                Ok(certificate)
            }
            Err(err) => {
                warn!("failed to issue certificate: {err}");
                self.edit(|form| form.banner = Some(format!("Error issuing certificate: {err}")));
                Err(err.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mention() -> Mention {
        Mention {
            nro: "M-001".to_string(),
            specialty: "Educación".to_string(),
            certificate_title: "Didáctica de la Matemática".to_string(),
            mention: "Nivel Primaria".to_string(),
            hours: "120".to_string(),
            start_date: "1 de abril del 2025".to_string(),
            end_date: "30 de junio del 2025".to_string(),
            issue_date: "11 de julio del 2025".to_string(),
        }
    }

    fn subject() -> Subject {
        Subject {
            subject_key: "12345678".to_string(),
            full_name: "Ana María Quispe".to_string(),
            phone: None,
            email: None,
        }
    }

    #[test]
    fn selecting_a_mention_fills_and_locks_course_fields() {
        let mut form = IssueForm::new();
        form.select_mention(Some(mention()));

        assert_eq!(form.course(), "Didáctica de la Matemática");
        assert_eq!(form.hours(), "120");
        assert_eq!(form.issue_date(), "2025-07-11");
        assert!(form.is_locked(Field::Course));
        assert_eq!(
            form.set_field(Field::Hours, "200"),
            Err(FormError::Locked {
                field: "hours",
                source_name: "mention"
            })
        );
        assert_eq!(form.hours(), "120");
    }

    #[test]
    fn clearing_the_mention_unlocks_and_resets() {
        let mut form = IssueForm::new();
        form.select_mention(Some(mention()));
        form.select_mention(None);

        assert_eq!(form.course(), "");
        assert_eq!(form.hours(), "");
        assert_eq!(form.issue_date(), dates::today());
        assert!(!form.is_locked(Field::Course));
        form.set_field(Field::Course, "Curso libre").unwrap();
        assert_eq!(form.course(), "Curso libre");
    }

    #[test]
    fn unparseable_mention_date_keeps_previous_date() {
        let mut form = IssueForm::new();
        form.set_field(Field::IssueDate, "2024-12-01").unwrap();
        form.select_mention(Some(Mention {
            issue_date: "por definir".to_string(),
            ..mention()
        }));
        assert_eq!(form.issue_date(), "2024-12-01");
    }

    #[test]
    fn code_follows_selection_and_subject() {
        let mut form = IssueForm::new();
        form.set_subject_key("12345678");
        assert_eq!(form.code(), "");

        form.select_mention(Some(mention()));
        assert_eq!(form.code(), "k70bM0U4suDe");

        form.set_subject_key("87654321");
        assert_eq!(form.code(), "2y3ApmYP5cjz");

        form.set_subject_key("12345678");
        assert_eq!(form.code(), "k70bM0U4suDe");

        form.set_subject_key("");
        assert_eq!(form.code(), "");

        form.set_subject_key("12345678");
        form.select_mention(None);
        assert_eq!(form.code(), "");
    }

    #[test]
    fn lookup_match_locks_name_and_not_found_clears_it() {
        let mut form = IssueForm::new();
        form.apply_subject_lookup(Ok(Some(subject())));
        assert_eq!(form.full_name(), "Ana María Quispe");
        assert!(form.is_locked(Field::FullName));
        assert!(form.set_field(Field::FullName, "Otra Persona").is_err());

        form.apply_subject_lookup(Ok(None));
        assert_eq!(form.full_name(), "");
        assert!(!form.is_locked(Field::FullName));
        assert_eq!(form.banner(), None);
    }

    #[test]
    fn match_without_name_leaves_name_editable() {
        let mut form = IssueForm::new();
        form.apply_subject_lookup(Ok(Some(Subject {
            full_name: String::new(),
            ..subject()
        })));

        assert!(form.matched_subject().is_some());
        assert!(!form.is_locked(Field::FullName));
        form.set_field(Field::FullName, "Ana Quispe").unwrap();
        assert_eq!(form.full_name(), "Ana Quispe");

        // A later nameless match or a not-found keeps what was typed
        form.apply_subject_lookup(Ok(Some(Subject {
            full_name: String::new(),
            ..subject()
        })));
        form.apply_subject_lookup(Ok(None));
        assert_eq!(form.full_name(), "Ana Quispe");
    }

    #[test]
    fn nameless_match_drops_name_of_previous_match() {
        let mut form = IssueForm::new();
        form.apply_subject_lookup(Ok(Some(subject())));
        form.apply_subject_lookup(Ok(Some(Subject {
            subject_key: "87654321".to_string(),
            full_name: String::new(),
            ..subject()
        })));

        assert_eq!(form.full_name(), "");
        assert!(!form.is_locked(Field::FullName));
    }

    #[test]
    fn hand_assigned_codes_are_accepted() {
        let mut form = IssueForm::new();
        form.set_field(Field::FullName, "Luis Rojas").unwrap();
        form.set_field(Field::Course, "Gestión Escolar").unwrap();
        form.set_field(Field::IssueDate, "2024-03-01").unwrap();
        form.set_field(Field::Code, "CERT-2024-001").unwrap();

        let plan = form.submit_plan().unwrap();
        assert_eq!(plan.request.code, "CERT-2024-001");
    }

    #[test]
    fn not_found_keeps_a_typed_name() {
        let mut form = IssueForm::new();
        form.set_field(Field::FullName, "Nombre Escrito").unwrap();
        form.apply_subject_lookup(Ok(None));
        assert_eq!(form.full_name(), "Nombre Escrito");
    }

    #[test]
    fn lookup_failure_raises_banner() {
        let mut form = IssueForm::new();
        form.apply_subject_lookup(Ok(Some(subject())));
        form.apply_subject_lookup(Err(ClientError::Timeout));

        assert_eq!(form.matched_subject(), None);
        assert_eq!(form.full_name(), "");
        assert!(form.banner().unwrap().contains("did not answer in time"));

        form.dismiss_banner();
        assert_eq!(form.banner(), None);
    }

    #[test]
    fn validation_reports_every_field() {
        let mut form = IssueForm::new();
        form.set_field(Field::IssueDate, "11/07/2025").unwrap();
        form.set_field(Field::Code, "CERT 2024").unwrap();

        let Err(InvalidForm(errors)) = form.submit_plan() else {
            panic!("expected validation errors");
        };
        assert_eq!(
            errors,
            vec![
                FormError::Missing("full name"),
                FormError::Missing("course"),
                FormError::InvalidDate("11/07/2025".to_string()),
                FormError::InvalidCode("CERT 2024".to_string()),
            ]
        );
    }

    #[test]
    fn submit_plan_splits_names_and_carries_mention() {
        let mut form = IssueForm::new();
        form.select_mention(Some(mention()));
        form.set_subject_key(" 12345678 ");
        form.set_field(Field::FullName, "Ana María Quispe").unwrap();

        let plan = form.submit_plan().unwrap();
        assert_eq!(plan.mention_nro.as_deref(), Some("M-001"));
        assert_eq!(plan.request.first_names, "Ana María");
        assert_eq!(plan.request.last_names, "Quispe");
        assert_eq!(plan.request.subject_key.as_deref(), Some("12345678"));
        assert_eq!(plan.request.hours.as_deref(), Some("120"));
        assert_eq!(plan.request.full_name.as_deref(), Some("Ana María Quispe"));
        assert_eq!(plan.request.code, generate_code("M-001", " 12345678 "));
    }

    #[test]
    fn submit_plan_without_mention_or_subject() {
        let mut form = IssueForm::new();
        form.set_field(Field::FullName, "Cher").unwrap();
        form.set_field(Field::Course, "Canto").unwrap();
        form.set_field(Field::IssueDate, "2025-01-15").unwrap();

        let plan = form.submit_plan().unwrap();
        assert_eq!(plan.mention_nro, None);
        assert_eq!(plan.request.code, "");
        assert_eq!(plan.request.first_names, "Cher");
        assert_eq!(plan.request.last_names, "");
        assert_eq!(plan.request.subject_key, None);
        assert_eq!(plan.request.hours, None);
    }

    #[test]
    fn full_name_splitting() {
        assert_eq!(split_full_name(""), (String::new(), String::new()));
        assert_eq!(split_full_name("Cher"), ("Cher".to_string(), String::new()));
        assert_eq!(
            split_full_name("  Ana   María Quispe "),
            ("Ana María".to_string(), "Quispe".to_string())
        );
    }
}
