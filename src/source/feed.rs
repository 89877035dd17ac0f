//! NuGet v2 feed pages: HTTP transport and Atom parsing.
//!
//! A v2 feed answers OData queries with an Atom document. Each `<entry>` is one
//! package version; the interesting fields live under `<m:properties>`:
//!
//! ```xml
//! <feed xml:base="https://www.nuget.org/api/v2">
//!   <entry>
//!     <title type="text">Foo</title>
//!     <content type="application/zip" src="https://www.nuget.org/api/v2/package/Foo/1.0.0" />
//!     <m:properties>
//!       <d:Id>Foo</d:Id>
//!       <d:Version>1.0.0</d:Version>
//!       <d:Dependencies>Bar:[1.0,2.0):net45|Baz:1.0:</d:Dependencies>
//!     </m:properties>
//!   </entry>
//!   <link rel="next" href="https://www.nuget.org/api/v2/FindPackagesById?id='Foo'&amp;$skiptoken=..." />
//! </feed>
//! ```
//!
//! The `Dependencies` property packs every framework group into one string:
//! `Id:Range:TargetFramework` triples separated by `|`. A triple with an empty
//! id declares a framework group with no dependencies.

use quick_xml::events::Event;
use quick_xml::reader::Reader;
use std::time::Duration;
use thiserror::Error;
use tracing::trace;

use crate::cache::Credentials;
use crate::package::nuspec::{attribute, local_name};
use crate::package::{FrameworkGroup, Package, PackageIdentifier, PackageOrigin};

/// One page of a feed response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedPage {
    /// Packages on this page, in feed order
    pub packages: Vec<Package>,
    /// URL of the next page, if the feed declared one
    pub next: Option<String>,
}

/// Failure fetching or parsing a feed page.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeedError {
    /// The endpoint answered 404: the feed does not implement this method
    #[error("{url} answered 404 Not Found")]
    NotFound {
        /// Requested URL
        url: String,
    },

    /// Connection failure, timeout or non-success status
    #[error("request to {url} failed: {reason}")]
    Network {
        /// Requested URL
        url: String,
        /// Failure description
        reason: String,
    },

    /// The body is not a valid Atom feed
    #[error("invalid feed document from {url}: {reason}")]
    Parse {
        /// Requested URL
        url: String,
        /// Parser message
        reason: String,
    },
}

/// Fetches feed pages. Remote sources are tested against in-memory implementations.
pub trait FeedTransport {
    /// Fetches and parses the page at `url`.
    fn get_page(&self, url: &str, credentials: Option<&Credentials>) -> Result<FeedPage, FeedError>;
}

/// [`FeedTransport`] over a blocking HTTP client.
#[derive(Debug, Clone)]
pub struct HttpFeedTransport {
    client: reqwest::blocking::Client,
}

impl HttpFeedTransport {
    /// Creates a transport whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("nupm/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
        })
    }
}

impl FeedTransport for HttpFeedTransport {
    fn get_page(&self, url: &str, credentials: Option<&Credentials>) -> Result<FeedPage, FeedError> {
        let network = |reason: String| FeedError::Network {
            url: url.to_string(),
            reason,
        };

        let mut request =
            self.client.get(url).header(reqwest::header::ACCEPT, "application/atom+xml");
        if let Some(credentials) = credentials {
            request = request.basic_auth(&credentials.username, Some(&credentials.password));
        }

        let response = request.send().map_err(|e| network(e.to_string()))?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FeedError::NotFound {
                url: url.to_string(),
            });
        }
        if !status.is_success() {
            return Err(network(format!("server answered {status}")));
        }

        let body = response.text().map_err(|e| network(e.to_string()))?;
        parse_feed(&body, url)
    }
}

#[derive(Default)]
struct EntryBuilder {
    title: Option<String>,
    id: Option<String>,
    version: Option<String>,
    download_url: Option<String>,
    author: Option<String>,
    dependencies: Option<String>,
    package: Package,
}

impl EntryBuilder {
    fn set_property(&mut self, name: &str, value: String) {
        let optional = || (!value.is_empty()).then(|| value.clone());
        match name {
            "Id" => self.id = optional(),
            "Version" => self.version = optional(),
            "Title" => self.package.title = optional(),
            "Description" => self.package.description = optional(),
            "Summary" => self.package.summary = optional(),
            "ReleaseNotes" => self.package.release_notes = optional(),
            "Authors" => self.package.authors = optional(),
            "LicenseUrl" => self.package.license_url = optional(),
            "ProjectUrl" => self.package.project_url = optional(),
            "IconUrl" => self.package.icon_url = optional(),
            "Dependencies" => self.dependencies = optional(),
            _ => {}
        }
    }

    fn build(self, feed_url: &str) -> Result<Package, FeedError> {
        let parse_error = |reason: &str| FeedError::Parse {
            url: feed_url.to_string(),
            reason: reason.to_string(),
        };

        let id = self.id.or(self.title).ok_or_else(|| parse_error("entry without package id"))?;
        let version = self.version.ok_or_else(|| parse_error("entry without version"))?;

        let mut package = self.package;
        package.identity = PackageIdentifier::new(id, version);
        if package.authors.is_none() {
            package.authors = self.author;
        }
        if let Some(dependencies) = self.dependencies {
            for group in parse_dependencies(&dependencies) {
                package.add_dependency_group(group);
            }
        }
        package.origin = self.download_url.map(|url| PackageOrigin::Remote {
            source: String::new(),
            url,
        });
        Ok(package)
    }
}

/// Parses an Atom feed document. `url` is only used in error messages.
///
/// Entries without a download link get no origin; the caller fills one in.
pub fn parse_feed(xml: &str, url: &str) -> Result<FeedPage, FeedError> {
    let parse_error = |reason: String| FeedError::Parse {
        url: url.to_string(),
        reason,
    };

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut page = FeedPage::default();
    let mut stack: Vec<String> = Vec::new();
    let mut text = String::new();
    let mut entry: Option<EntryBuilder> = None;
    let mut saw_feed = false;

    loop {
        let event = reader.read_event().map_err(|e| parse_error(e.to_string()))?;
        match event {
            Event::Start(e) => {
                let name = local_name(&e);
                match name.as_str() {
                    "feed" => saw_feed = true,
                    "entry" => entry = Some(EntryBuilder::default()),
                    "content" => read_content_src(&e, entry.as_mut()).map_err(&parse_error)?,
                    "link" => read_next_link(&e, &stack, &mut page).map_err(&parse_error)?,
                    _ => {}
                }
                stack.push(name);
                text.clear();
            }
            Event::Empty(e) => match local_name(&e).as_str() {
                "feed" => saw_feed = true,
                "content" => read_content_src(&e, entry.as_mut()).map_err(&parse_error)?,
                "link" => read_next_link(&e, &stack, &mut page).map_err(&parse_error)?,
                _ => {}
            },
            Event::Text(t) => {
                text.push_str(&t.unescape().map_err(|e| parse_error(e.to_string()))?);
            }
            Event::CData(c) => text.push_str(&String::from_utf8_lossy(&c.into_inner())),
            Event::End(_) => {
                let name = stack.pop().unwrap_or_default();
                let parent = stack.last().map(String::as_str).unwrap_or_default();
                let value = std::mem::take(&mut text).trim().to_string();
                if name == "entry" {
                    if let Some(builder) = entry.take() {
                        page.packages.push(builder.build(url)?);
                    }
                } else if let Some(builder) = entry.as_mut() {
                    match (parent, name.as_str()) {
                        ("properties", property) => builder.set_property(property, value),
                        ("entry", "title") if !value.is_empty() => builder.title = Some(value),
                        ("author", "name") if !value.is_empty() => builder.author = Some(value),
                        _ => {}
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_feed {
        return Err(parse_error("document has no <feed> element".to_string()));
    }
    if let Some(open) = stack.last() {
        return Err(parse_error(format!("document ends inside <{open}>")));
    }
    trace!(url, packages = page.packages.len(), next = ?page.next, "Parsed feed page");
    Ok(page)
}

/// Parses the v2 `Dependencies` property into framework groups.
///
/// `Bar:[1.0,2.0):net45|Baz:1.0:|::net20` yields a `net45` group with Bar, an
/// any-framework group with Baz and an empty `net20` group. A missing range
/// accepts any version.
#[must_use]
pub fn parse_dependencies(value: &str) -> Vec<FrameworkGroup> {
    let mut groups: Vec<FrameworkGroup> = Vec::new();

    for item in value.split('|').map(str::trim).filter(|s| !s.is_empty()) {
        let mut parts = item.splitn(3, ':');
        let id = parts.next().unwrap_or_default().trim();
        let range = parts.next().unwrap_or_default().trim();
        let framework = parts.next().unwrap_or_default().trim();

        let index = match groups
            .iter()
            .position(|g| g.target_framework.eq_ignore_ascii_case(framework))
        {
            Some(index) => index,
            None => {
                groups.push(FrameworkGroup::new(framework, Vec::new()));
                groups.len() - 1
            }
        };

        if !id.is_empty() {
            let range = if range.is_empty() { "0.0.0" } else { range };
            groups[index].dependencies.push(PackageIdentifier::new(id, range));
        }
    }

    groups
}

fn read_content_src(
    e: &quick_xml::events::BytesStart<'_>,
    entry: Option<&mut EntryBuilder>,
) -> Result<(), String> {
    if let Some(entry) = entry {
        if let Some(src) = attribute(e, "src")? {
            entry.download_url = Some(src);
        }
    }
    Ok(())
}

fn read_next_link(
    e: &quick_xml::events::BytesStart<'_>,
    stack: &[String],
    page: &mut FeedPage,
) -> Result<(), String> {
    if stack.last().map(String::as_str) == Some("feed")
        && attribute(e, "rel")?.as_deref() == Some("next")
    {
        page.next = attribute(e, "href")?;
    }
    Ok(())
}
