//! Blocking HTTP clients for the attendance service and the form-data service

use reqwest::{
    blocking::{Client, RequestBuilder},
    header::AUTHORIZATION,
    Method, StatusCode,
};
use serde::Deserialize;

use crate::{
    errors::Error,
    forms::{FormApi, FormLine},
    types::{AttendanceId, AttendanceRecord, Student},
};

/// Root of the attendance service used when none is configured
pub const DEFAULT_BASE_URL: &str = "https://cheese2school.gnucoop.io/api";

/// Form-data endpoint used when none is configured
pub const DEFAULT_FORM_URL: &str = "https://fptt.dewco.io/api/reports/form_data/";

/// An interface to the remote attendance service.
///
/// Every call either succeeds with the status it expects or fails; nothing is retried.
pub trait AttendanceApi {
    /// Lists every student known to the service
    fn students(&self) -> Result<Vec<Student>, Error>;

    /// Lists every attendance record, of every class
    fn attendances(&self) -> Result<Vec<AttendanceRecord>, Error>;

    /// Creates a record that has no remote identifier yet
    fn create_attendance(&self, record: &AttendanceRecord) -> Result<(), Error>;

    /// Replaces the record stored under `id`
    fn update_attendance(&self, id: AttendanceId, record: &AttendanceRecord) -> Result<(), Error>;
}

/// Envelope of the service's list endpoints
#[derive(Deserialize, Debug)]
struct Page<T> {
    results: Vec<T>,
}

/// Client for the attendance service's REST API
#[derive(Debug, Clone)]
pub struct HttpAttendanceApi {
    http: Client,
    base_url: String,
    /// Sent verbatim as the `Authorization` header of every request
    authorization: Option<String>,
}

impl HttpAttendanceApi {
    /// Creates a client for the service rooted at `base_url`.
    /// An empty `authorization` sends no header at all.
    pub fn new(base_url: impl Into<String>, authorization: Option<String>) -> Result<Self, Error> {
        Ok(Self {
            http: Client::builder().build()?,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            authorization: authorization.filter(|value| !value.is_empty()),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .http
            .request(method, format!("{}{path}", self.base_url));
        match &self.authorization {
            Some(value) => builder.header(AUTHORIZATION, value),
            None => builder,
        }
    }

    fn list<T>(&self, path: &str) -> Result<Vec<T>, Error>
    where
        T: for<'de> Deserialize<'de>,
    {
        let body = send(self.request(Method::GET, path), StatusCode::OK)?;
        let page: Page<T> = serde_json::from_str(&body)?;
        Ok(page.results)
    }
}

impl AttendanceApi for HttpAttendanceApi {
    fn students(&self) -> Result<Vec<Student>, Error> {
        self.list("/student")
    }

    fn attendances(&self) -> Result<Vec<AttendanceRecord>, Error> {
        self.list("/attendance")
    }

    fn create_attendance(&self, record: &AttendanceRecord) -> Result<(), Error> {
        let request = self.request(Method::POST, "/attendance").json(record);
        send(request, StatusCode::CREATED).map(drop)
    }

    fn update_attendance(&self, id: AttendanceId, record: &AttendanceRecord) -> Result<(), Error> {
        let request = self
            .request(Method::PATCH, &format!("/attendance/{id}"))
            .json(record);
        send(request, StatusCode::OK).map(drop)
    }
}

/// Client for the form-data service
#[derive(Debug, Clone)]
pub struct HttpFormApi {
    http: Client,
    url: String,
    /// Sent as `Authorization: Token <token>`
    token: Option<String>,
}

impl HttpFormApi {
    /// Creates a client posting to `url`. An empty `token` sends no header at all.
    pub fn new(url: impl Into<String>, token: Option<String>) -> Result<Self, Error> {
        Ok(Self {
            http: Client::builder().build()?,
            url: url.into(),
            token: token.filter(|token| !token.is_empty()),
        })
    }
}

impl FormApi for HttpFormApi {
    fn submit(&self, line: &FormLine) -> Result<(), Error> {
        let mut request = self.http.post(&self.url).json(line);
        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("Token {token}"));
        }
        send(request, StatusCode::CREATED).map(drop)
    }
}

/// Sends a request and returns the response body, if the response has the expected status
fn send(request: RequestBuilder, expected: StatusCode) -> Result<String, Error> {
    let response = request.send()?;
    let status = response.status();
    let body = response.text()?;
    if status != expected {
        return Err(Error::UnexpectedStatus {
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}
