use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client, Method, RequestBuilder, Response, StatusCode,
};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    config::Config,
    error::ClientError,
    models::{
        AnnulRequest, Certificate, CreateCertificate, LoginResponse, Lookup, Mention, MentionList,
        SearchRequest, Subject,
    },
    session::{Session, SessionContext},
};

/// The backend calls the issuance form depends on. Implemented by [`ApiClient`]; tests
/// substitute their own.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn mention(&self, nro: &str) -> Result<Option<Mention>, ClientError>;
    async fn subject(&self, subject_key: &str) -> Result<Option<Subject>, ClientError>;
    async fn issue(
        &self,
        request: &CreateCertificate,
        mention_nro: Option<&str>,
    ) -> Result<Certificate, ClientError>;
}

/// HTTP client for the certificates backend.
#[derive(Clone)]
pub struct ApiClient {
    base_url: Url,
    client: Client,
    session: Arc<SessionContext>,
}

impl ApiClient {
    pub fn from_config(config: &Config, session: Arc<SessionContext>) -> Result<Self, ClientError> {
        let base_url = Url::parse(&config.api_url)
            .map_err(|e| ClientError::InvalidUrl(format!("{e} {}", config.api_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(config.api_url.clone()));
        }
        let client = Self::build_client(config.request_timeout.0, config.skip_ssl)?;
        Ok(Self {
            base_url,
            client,
            session,
        })
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    fn build_client(timeout: Duration, skip_ssl: bool) -> reqwest::Result<Client> {
        Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(skip_ssl)
            .default_headers(Self::build_headers())
            .build()
    }

    fn build_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Accept", HeaderValue::from_static("application/json"));
        headers.insert(
            "User-Agent",
            HeaderValue::from_static(concat!("certdesk/", env!("CARGO_PKG_VERSION"))),
        );
        headers
    }

    /// Builds `<base>/<segments...>`, percent-encoding each segment.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(format!("{} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn create_request(&self, method: Method, url: Url) -> RequestBuilder {
        debug!("building request for {method} {url}");
        let request = self.client.request(method, url);
        match self.session.token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    pub async fn send_request<F: FnOnce(RequestBuilder) -> RequestBuilder>(
        &self,
        method: Method,
        url: Url,
        builder: F,
    ) -> Result<Response, ClientError> {
        let request = builder(self.create_request(method, url));
        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::UNAUTHORIZED {
            warn!("backend rejected our credentials, clearing session");
            if let Err(err) = self.session.clear() {
                warn!("failed to clear session: {err:#}");
            }
            return Err(ClientError::Unauthorized);
        }

        let url = Box::new(response.url().clone());
        let body = response.text().await?;
        Err(ClientError::ApiError(status.as_u16(), url, body))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ClientError> {
        let response = self.send_request(Method::GET, url, |req| req).await?;
        Ok(response.json().await?)
    }

    /// GET that treats a 404 as a normal negative answer.
    async fn get_optional<T: DeserializeOwned>(&self, url: Url) -> Result<Option<T>, ClientError> {
        match self.get_json(url).await {
            Ok(value) => Ok(Some(value)),
            Err(ClientError::ApiError(404, url, _)) => {
                debug!("{url} not found");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Exchanges operator credentials for a session. The caller decides whether to persist it.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, ClientError> {
        let url = self.endpoint(&["auth", "login"])?;
        debug!("building request for POST {url}");
        let response = self
            .client
            .post(url)
            .form(&[("username", email), ("password", password)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            // Wrong credentials come back as 401 too, which is not an expired session
            let url = Box::new(response.url().clone());
            let body = response.text().await?;
            return Err(ClientError::ApiError(status.as_u16(), url, body));
        }

        let login: LoginResponse = response.json().await?;
        info!("logged in as {} ({})", login.email, login.role);
        Ok(Session {
            token: login.access_token,
            email: login.email,
            role: login.role,
        })
    }

    pub async fn list_mentions(&self) -> Result<Vec<Mention>, ClientError> {
        let url = self.endpoint(&["admin", "menciones"])?;
        let response = self
            .send_request(Method::GET, url, |req| req.query(&[("source", "sheets")]))
            .await?;
        let list: MentionList = response.json().await?;
        Ok(list.menciones)
    }

    pub async fn get_mention(&self, nro: &str) -> Result<Option<Mention>, ClientError> {
        let url = self.endpoint(&["admin", "menciones", nro])?;
        self.get_optional(url).await
    }

    pub async fn lookup_subject(&self, subject_key: &str) -> Result<Option<Subject>, ClientError> {
        let url = self.endpoint(&["admin", "clientes", subject_key])?;
        self.get_optional(url).await
    }

    pub async fn list_certificates(&self) -> Result<Vec<Certificate>, ClientError> {
        let url = self.endpoint(&["admin", "certificados"])?;
        self.get_json(url).await
    }

    /// Creates a certificate, optionally tied to a mention. Returns what the backend stored,
    /// whose code is authoritative over the one we sent.
    pub async fn create_certificate(
        &self,
        body: &CreateCertificate,
        mention_nro: Option<&str>,
    ) -> Result<Certificate, ClientError> {
        let url = self.endpoint(&["admin", "certificados"])?;
        let response = self
            .send_request(Method::POST, url, |req| {
                let req = req.json(body);
                match mention_nro {
                    Some(nro) => req.query(&[("mencion_nro", nro)]),
                    None => req,
                }
            })
            .await?;
        let lookup: Lookup = response.json().await?;
        let mut certificate = lookup.certificate.unwrap_or_default();
        if certificate.code.is_empty() {
            certificate.code = body.code.clone();
        }
        info!("created certificate {}", certificate.code);
        Ok(certificate)
    }

    /// Annuls a certificate. `None` when the backend reports no certificate with that code.
    pub async fn annul_certificate(
        &self,
        code: &str,
        reason: Option<&str>,
    ) -> Result<Option<Certificate>, ClientError> {
        let url = self.endpoint(&["admin", "certificados", code, "anular"])?;
        let response = self
            .send_request(Method::POST, url, |req| req.json(&AnnulRequest { reason }))
            .await?;
        let lookup: Lookup = response.json().await?;
        match &lookup.certificate {
            Some(_) => info!("annulled certificate {code}"),
            None => warn!("no certificate {code} to annul"),
        }
        Ok(lookup.certificate)
    }

    /// PNG of the certificate's QR code.
    pub async fn certificate_qr(&self, code: &str) -> Result<Vec<u8>, ClientError> {
        let url = self.endpoint(&["admin", "certificados", code, "qr"])?;
        let response = self.send_request(Method::GET, url, |req| req).await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Public search by code. `None` when no certificate carries it.
    pub async fn verify(&self, code: &str) -> Result<Option<Certificate>, ClientError> {
        let url = self.endpoint(&["public", "buscar"])?;
        let response = self
            .send_request(Method::POST, url, |req| req.json(&SearchRequest { code }))
            .await?;
        let lookup: Lookup = response.json().await?;
        Ok(lookup.certificate)
    }

    pub async fn public_certificate(&self, code: &str) -> Result<Option<Certificate>, ClientError> {
        let url = self.endpoint(&["public", "certificados", code])?;
        let lookup: Option<Lookup> = self.get_optional(url).await?;
        Ok(lookup.and_then(|l| l.certificate))
    }

    pub fn pdf_url(&self, code: &str, download: bool) -> Result<Url, ClientError> {
        let mut url = self.endpoint(&["public", "certificados", code, "pdf"])?;
        if download {
            url.query_pairs_mut().append_pair("download", "true");
        }
        Ok(url)
    }

    /// The certificate's PDF, rendered by the backend. `None` for unknown codes.
    pub async fn certificate_pdf(
        &self,
        code: &str,
        download: bool,
    ) -> Result<Option<Vec<u8>>, ClientError> {
        let url = self.pdf_url(code, download)?;
        match self.send_request(Method::GET, url, |req| req).await {
            Ok(response) => Ok(Some(response.bytes().await?.to_vec())),
            Err(ClientError::ApiError(404, _, _)) => Ok(None),
            Err(err) => Err(err),
        }
    }
}

#[async_trait]
impl Directory for ApiClient {
    async fn mention(&self, nro: &str) -> Result<Option<Mention>, ClientError> {
        self.get_mention(nro).await
    }

    async fn subject(&self, subject_key: &str) -> Result<Option<Subject>, ClientError> {
        self.lookup_subject(subject_key).await
    }

    async fn issue(
        &self,
        request: &CreateCertificate,
        mention_nro: Option<&str>,
    ) -> Result<Certificate, ClientError> {
        self.create_certificate(request, mention_nro).await
    }
}
