//! CalDAV-backed store.
//!
//! Each record is one `.ics` resource in a single calendar collection:
//! `<server_url>/<id>.ics`. Listing uses a calendar-query REPORT filtered to
//! the record's component type.

use std::time::Duration;

use anyhow::{Context, Result};
use caldav_rpc_core::Config;
use caldav_rpc_core::error::StoreError;
use caldav_rpc_core::ics::NativeRecord;
use caldav_rpc_core::kind::ResourceKind;
use caldav_rpc_core::store::Store;
use reqwest::header::{CONTENT_TYPE, IF_NONE_MATCH};
use reqwest::{Method, RequestBuilder, StatusCode, Url};
use tracing::debug;
use uuid::Uuid;

const CALENDAR_CONTENT_TYPE: &str = "text/calendar; charset=utf-8";
const XML_CONTENT_TYPE: &str = "application/xml; charset=utf-8";

pub struct CalDavStore {
    client: reqwest::Client,
    calendar_url: Url,
    username: String,
    password: String,
}

/// A resource returned in a multistatus response.
#[derive(Debug, PartialEq)]
struct CalendarResource {
    href: String,
    data: String,
}

impl CalDavStore {
    pub fn new(config: &Config) -> Result<Self> {
        let calendar_url = Url::parse(&config.server_url)
            .with_context(|| format!("Invalid server URL: {}", config.server_url))?;

        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(10))
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            calendar_url,
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    pub fn calendar_url(&self) -> &Url {
        &self.calendar_url
    }

    /// PROPFIND the calendar collection to check that it is reachable and the
    /// credentials are accepted.
    pub async fn check_connection(&self) -> Result<(), StoreError> {
        let body = r#"<?xml version="1.0" encoding="UTF-8"?>
<d:propfind xmlns:d="DAV:">
  <d:prop>
    <d:resourcetype/>
  </d:prop>
</d:propfind>"#;

        let response = self
            .request(dav_method(b"PROPFIND")?, self.calendar_url.clone())
            .header(CONTENT_TYPE, XML_CONTENT_TYPE)
            .header("Depth", "0")
            .body(body)
            .send()
            .await
            .map_err(transport("connect"))?;

        check_status(response.status(), "connect")
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .basic_auth(&self.username, Some(&self.password))
    }

    fn resource_url(&self, id: &str) -> Result<Url, StoreError> {
        resource_url(&self.calendar_url, id)
    }
}

impl Store for CalDavStore {
    async fn put(
        &mut self,
        kind: ResourceKind,
        native: &NativeRecord,
        id: Option<&str>,
    ) -> Result<String, StoreError> {
        let (id, creating) = match id {
            Some(id) => (id.to_string(), false),
            None => (Uuid::new_v4().to_string(), true),
        };
        let body = native.with_uid(&id).into_string();

        let mut request = self
            .request(Method::PUT, self.resource_url(&id)?)
            .header(CONTENT_TYPE, CALENDAR_CONTENT_TYPE)
            .body(body);
        // Fails instead of overwriting if the id is somehow taken
        if creating {
            request = request.header(IF_NONE_MATCH, "*");
        }

        let response = request.send().await.map_err(transport("PUT"))?;
        check_status(response.status(), "PUT")?;
        debug!("Stored {} {}", kind, id);

        Ok(id)
    }

    async fn get(&self, kind: ResourceKind, id: &str) -> Result<Option<NativeRecord>, StoreError> {
        let response = self
            .request(Method::GET, self.resource_url(id)?)
            .send()
            .await
            .map_err(transport("GET"))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        check_status(response.status(), "GET")?;

        let body = response.text().await.map_err(transport("GET"))?;
        let native = NativeRecord::new(body);
        if native.component() != Some(kind) {
            debug!("Resource {} holds {:?}, not a {}", id, native.component(), kind);
            return Ok(None);
        }
        Ok(Some(native))
    }

    async fn delete(&mut self, kind: ResourceKind, id: &str) -> Result<bool, StoreError> {
        let response = self
            .request(Method::DELETE, self.resource_url(id)?)
            .send()
            .await
            .map_err(transport("DELETE"))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        check_status(response.status(), "DELETE")?;
        debug!("Deleted {} {}", kind, id);

        Ok(true)
    }

    async fn list_all(&self, kind: ResourceKind) -> Result<Vec<NativeRecord>, StoreError> {
        let body = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<C:calendar-query xmlns="DAV:" xmlns:C="urn:ietf:params:xml:ns:caldav">
    <prop>
        <getetag/>
        <C:calendar-data/>
    </prop>
    <C:filter>
        <C:comp-filter name="VCALENDAR">
            <C:comp-filter name="{}"/>
        </C:comp-filter>
    </C:filter>
</C:calendar-query>"#,
            kind.component_name()
        );

        let response = self
            .request(dav_method(b"REPORT")?, self.calendar_url.clone())
            .header(CONTENT_TYPE, XML_CONTENT_TYPE)
            .header("Depth", "1")
            .body(body)
            .send()
            .await
            .map_err(transport("REPORT"))?;
        check_status(response.status(), "REPORT")?;

        let text = response.text().await.map_err(transport("REPORT"))?;
        let resources = parse_multistatus(&text)?;
        debug!("REPORT returned {} {} resources", resources.len(), kind);

        // Records are addressed by resource name, which other clients may
        // have chosen independently of the UID
        Ok(resources
            .into_iter()
            .map(|resource| {
                let native = NativeRecord::new(resource.data);
                match resource_id(&resource.href) {
                    Some(id) => native.with_uid(&id),
                    None => native,
                }
            })
            .filter(|native| native.component() == Some(kind))
            .collect())
    }
}

/// `<calendar_url>/<id>.ics`, with `id` percent-encoded as one path segment.
fn resource_url(calendar_url: &Url, id: &str) -> Result<Url, StoreError> {
    let mut url = calendar_url.clone();
    url.path_segments_mut()
        .map_err(|_| StoreError::Backend(format!("Not a collection URL: {calendar_url}")))?
        .pop_if_empty()
        .push(&format!("{id}.ics"));
    Ok(url)
}

/// The id part of `.../<id>.ics`, percent-decoded so that `resource_url`
/// maps it back to the same href.
fn resource_id(href: &str) -> Option<String> {
    let segment = href.trim_end_matches('/').rsplit('/').next()?;
    let id = urlencoding::decode(segment).ok()?;
    let id = id.strip_suffix(".ics")?;
    if id.is_empty() || id.chars().any(char::is_control) {
        return None;
    }
    Some(id.to_string())
}

/// Parse calendar resources from a CalDAV multistatus response.
fn parse_multistatus(body: &str) -> Result<Vec<CalendarResource>, StoreError> {
    let doc = roxmltree::Document::parse(body)
        .map_err(|e| StoreError::Backend(format!("Invalid multistatus response: {e}")))?;

    let mut resources = Vec::new();
    for response in doc
        .root_element()
        .descendants()
        .filter(|n| n.tag_name().name() == "response")
    {
        let Some(href) = response
            .descendants()
            .find(|n| n.tag_name().name() == "href")
            .and_then(|n| n.text())
        else {
            continue;
        };

        // Only include resources that have calendar data
        let data = response
            .descendants()
            .find(|n| n.tag_name().name() == "calendar-data")
            .and_then(|n| n.text());
        if let Some(data) = data {
            resources.push(CalendarResource {
                href: href.trim().to_string(),
                data: data.to_string(),
            });
        }
    }

    Ok(resources)
}

fn check_status(status: StatusCode, action: &str) -> Result<(), StoreError> {
    match status.as_u16() {
        401 | 403 => Err(StoreError::Auth(format!(
            "{action} rejected by server (status {status})"
        ))),
        _ if status.is_success() => Ok(()),
        _ => Err(StoreError::Backend(format!("{action} failed (status {status})"))),
    }
}

fn transport(action: &'static str) -> impl Fn(reqwest::Error) -> StoreError {
    move |e| StoreError::Backend(format!("{action} request failed: {e}"))
}

fn dav_method(name: &'static [u8]) -> Result<Method, StoreError> {
    Method::from_bytes(name).map_err(|e| StoreError::Backend(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MULTISTATUS: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:multistatus xmlns:d="DAV:" xmlns:cal="urn:ietf:params:xml:ns:caldav">
  <d:response>
    <d:href>/calendars/alice/personal/abc.ics</d:href>
    <d:propstat>
      <d:prop>
        <d:getetag>"1"</d:getetag>
        <cal:calendar-data>BEGIN:VCALENDAR&#13;
BEGIN:VTODO&#13;
UID:abc&#13;
SUMMARY:Buy milk&#13;
END:VTODO&#13;
END:VCALENDAR&#13;
</cal:calendar-data>
      </d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
  <d:response>
    <d:href>/calendars/alice/personal/</d:href>
    <d:propstat>
      <d:prop><d:getetag/></d:prop>
      <d:status>HTTP/1.1 404 Not Found</d:status>
    </d:propstat>
  </d:response>
</d:multistatus>"#;

    #[test]
    fn test_parse_multistatus_keeps_resources_with_data() {
        let resources = parse_multistatus(MULTISTATUS).unwrap();

        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].href, "/calendars/alice/personal/abc.ics");
        assert!(resources[0].data.contains("SUMMARY:Buy milk"));
    }

    #[test]
    fn test_parse_multistatus_rejects_garbage() {
        assert!(matches!(
            parse_multistatus("<not closed"),
            Err(StoreError::Backend(_))
        ));
    }

    #[test]
    fn test_resource_url() {
        let base = Url::parse("https://dav.example.com/calendars/alice/personal/").unwrap();
        assert_eq!(
            resource_url(&base, "abc-123").unwrap().as_str(),
            "https://dav.example.com/calendars/alice/personal/abc-123.ics"
        );

        let no_slash = Url::parse("https://dav.example.com/cal").unwrap();
        assert_eq!(
            resource_url(&no_slash, "a/b").unwrap().as_str(),
            "https://dav.example.com/cal/a%2Fb.ics"
        );
    }

    #[test]
    fn test_resource_id() {
        assert_eq!(resource_id("/calendars/alice/personal/abc.ics").as_deref(), Some("abc"));
        assert_eq!(resource_id("/calendars/alice/personal/"), None);
        assert_eq!(resource_id("/calendars/alice/.ics"), None);
        assert_eq!(resource_id("/cal/bad%0D%0Aid.ics"), None);
    }

    #[test]
    fn test_encoded_href_maps_back_to_same_url() {
        let base = Url::parse("https://dav.example.com/cal/").unwrap();

        let id = resource_id("/cal/foo%40bar.ics").unwrap();
        assert_eq!(id, "foo@bar");
        assert_eq!(
            resource_url(&base, &id).unwrap().as_str(),
            "https://dav.example.com/cal/foo@bar.ics"
        );

        let id = resource_id("/cal/team%20notes.ics").unwrap();
        assert_eq!(id, "team notes");
        assert_eq!(
            resource_url(&base, &id).unwrap().as_str(),
            "https://dav.example.com/cal/team%20notes.ics"
        );
    }

    #[test]
    fn test_check_status() {
        assert!(check_status(StatusCode::CREATED, "PUT").is_ok());
        assert!(check_status(StatusCode::MULTI_STATUS, "REPORT").is_ok());
        assert!(matches!(
            check_status(StatusCode::UNAUTHORIZED, "GET"),
            Err(StoreError::Auth(_))
        ));
        assert!(matches!(
            check_status(StatusCode::PRECONDITION_FAILED, "PUT"),
            Err(StoreError::Backend(_))
        ));
    }

    #[test]
    fn test_new_rejects_bad_url() {
        let config = Config {
            server_url: "not a url".into(),
            ..Config::default()
        };
        assert!(CalDavStore::new(&config).is_err());
    }
}
