//! Remote NuGet v2 feeds.
//!
//! Queries are OData method calls under the feed root:
//!
//! | operation              | request                                                    |
//! |------------------------|------------------------------------------------------------|
//! | find by id             | `FindPackagesById()?id='Foo'`                              |
//! | search                 | `Search()?searchTerm='foo'&includePrerelease=false&$skip=0&$top=30` |
//! | updates                | `GetUpdates()?packageIds='A\|B'&versions='1.0\|2.0'&...`     |
//!
//! Responses may be paged; every page can name the next one and pages are
//! followed until none remain or a link points back at a page already
//! fetched. A page whose body cannot be parsed is fetched
//! again a few times before the query fails.

use anyhow::{Context, Result};
use reqwest::Url;
use std::collections::HashSet;
use std::ops::ControlFlow;
use std::rc::Rc;
use tracing::{debug, warn};

use super::feed::{FeedError, FeedPage, FeedTransport};
use super::{
    PackageSource, PackageSourceConfig, SearchQuery, accepts_prerelease, choose_greater,
    newer_than, pick_updates,
};
use crate::cache::{CredentialStore, Credentials};
use crate::constants::{FEED_PARSE_RETRIES, UPDATE_BATCH_SIZE};
use crate::core::NupmError;
use crate::package::{Package, PackageIdentifier, PackageOrigin};

/// A NuGet v2 HTTP feed.
pub struct RemoteSource {
    name: String,
    root: Url,
    transport: Box<dyn FeedTransport>,
    credentials: Option<Credentials>,
    credential_store: Rc<CredentialStore>,
    include_prerelease: bool,
}

impl RemoteSource {
    /// Creates a source for the feed at `config.path`.
    ///
    /// # Errors
    ///
    /// Fails with [`NupmError::ConfigError`] when the path is not a valid URL.
    pub fn new(
        config: &PackageSourceConfig,
        transport: Box<dyn FeedTransport>,
        credential_store: Rc<CredentialStore>,
        include_prerelease: bool,
    ) -> Result<Self> {
        let mut root_text = config.path.clone();
        if !root_text.ends_with('/') {
            root_text.push('/');
        }
        let root = Url::parse(&root_text).map_err(|e| NupmError::ConfigError {
            message: format!("source '{}' has an invalid URL '{}': {e}", config.name, config.path),
        })?;

        Ok(Self {
            name: config.name.clone(),
            root,
            transport,
            credentials: config.credentials.clone(),
            credential_store,
            include_prerelease,
        })
    }

    fn method_url(&self, method: &str, params: &[(&str, String)]) -> Result<String> {
        let mut url = self
            .root
            .join(method)
            .with_context(|| format!("Failed to build {method} URL for source '{}'", self.name))?;
        url.query_pairs_mut().extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())));
        Ok(url.into())
    }

    /// Fetches one page, retrying bodies that fail to parse.
    fn fetch_page(&self, url: &str) -> Result<FeedPage> {
        let looked_up;
        let credentials = match &self.credentials {
            Some(c) => Some(c),
            None => {
                looked_up = self.credential_store.lookup(url);
                looked_up.as_ref()
            }
        };

        let mut attempt = 0;
        loop {
            match self.transport.get_page(url, credentials) {
                Ok(mut page) => {
                    for package in &mut page.packages {
                        self.adopt(package);
                    }
                    return Ok(page);
                }
                Err(FeedError::Parse { reason, .. }) if attempt < FEED_PARSE_RETRIES => {
                    attempt += 1;
                    warn!(source = %self.name, attempt, "Retrying feed page that failed to parse: {reason}");
                }
                Err(FeedError::Parse { url, reason }) => {
                    return Err(NupmError::FeedParse { url, reason }.into());
                }
                Err(FeedError::NotFound { url }) => {
                    return Err(NupmError::FeedMethodNotSupported { url }.into());
                }
                Err(FeedError::Network { url, reason }) => {
                    return Err(NupmError::Network {
                        operation: format!("querying {url}"),
                        reason,
                    }
                    .into());
                }
            }
        }
    }

    /// Hands the packages of every page starting at `url` to `visit` until it
    /// breaks or no page is left. A `next` link to a page already fetched ends
    /// the walk.
    fn walk_pages(
        &self,
        url: String,
        mut visit: impl FnMut(Vec<Package>) -> ControlFlow<()>,
    ) -> Result<()> {
        let mut fetched = HashSet::new();
        let mut next = Some(url);
        while let Some(page_url) = next {
            if !fetched.insert(page_url.clone()) {
                warn!(source = %self.name, url = %page_url, "Feed links back to a page already fetched, stopping");
                break;
            }
            let page = self.fetch_page(&page_url)?;
            if visit(page.packages).is_break() {
                break;
            }
            next = page.next;
        }
        Ok(())
    }

    /// Every package on every page starting at `url`.
    fn collect_pages(&self, url: String) -> Result<Vec<Package>> {
        let mut packages = Vec::new();
        self.walk_pages(url, |page| {
            packages.extend(page);
            ControlFlow::Continue(())
        })?;
        Ok(packages)
    }

    /// Stamps the source name on a package and fills in the conventional
    /// download URL when the feed did not give one.
    fn adopt(&self, package: &mut Package) {
        match &mut package.origin {
            Some(PackageOrigin::Remote { source, .. }) => source.clone_from(&self.name),
            _ => {
                let path = format!("package/{}/{}", package.id(), package.version());
                let url = self.root.join(&path).map(String::from).unwrap_or_else(|_| {
                    format!("{}{path}", self.root)
                });
                package.origin = Some(PackageOrigin::Remote {
                    source: self.name.clone(),
                    url,
                });
            }
        }
    }

    fn find_url(&self, id: &str) -> Result<String> {
        self.method_url("FindPackagesById()", &[("id", quote(id))])
    }

    fn update_fallback(
        &self,
        batch: &[PackageIdentifier],
        include_prerelease: bool,
        include_all_versions: bool,
    ) -> Result<Vec<Package>> {
        let mut updates = Vec::new();
        for installed in batch {
            let candidates = self.find_packages_by_id(&newer_than(installed))?;
            updates.extend(pick_updates(
                installed,
                candidates,
                include_prerelease,
                include_all_versions,
            ));
        }
        Ok(updates)
    }
}

impl PackageSource for RemoteSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_local(&self) -> bool {
        false
    }

    fn find_packages_by_id(&self, request: &PackageIdentifier) -> Result<Vec<Package>> {
        let packages = self.collect_pages(self.find_url(&request.id)?)?;
        Ok(packages
            .into_iter()
            .filter(|p| request.same_id(p.id()))
            .filter(|p| request.version.is_empty() || request.satisfies(p.version()))
            .collect())
    }

    fn get_specific_package(&self, request: &PackageIdentifier) -> Result<Option<Package>> {
        let mut best: Option<Package> = None;
        let mut exact: Option<Package> = None;

        self.walk_pages(self.find_url(&request.id)?, |page| {
            for candidate in page {
                if !request.same_id(candidate.id())
                    || !accepts_prerelease(request, &candidate, self.include_prerelease)
                {
                    continue;
                }
                if request.matches_exactly(candidate.version()) {
                    debug!(source = %self.name, id = %candidate.id(), version = %candidate.version(), "Exact match");
                    exact = Some(candidate);
                    return ControlFlow::Break(());
                }
                if request.satisfies(candidate.version()) {
                    best = Some(choose_greater(best.take(), candidate));
                }
            }
            ControlFlow::Continue(())
        })?;

        Ok(exact.or(best))
    }

    fn search(&self, query: &SearchQuery) -> Result<Vec<Package>> {
        let mut params = vec![
            ("searchTerm", quote(&query.term)),
            ("targetFramework", "''".to_string()),
            ("includePrerelease", query.include_prerelease.to_string()),
            ("$skip", query.skip.to_string()),
            ("$top", query.count.to_string()),
        ];
        if !query.include_all_versions {
            let filter =
                if query.include_prerelease { "IsAbsoluteLatestVersion" } else { "IsLatestVersion" };
            params.push(("$filter", filter.to_string()));
        }

        let mut page = self.fetch_page(&self.method_url("Search()", &params)?)?;
        page.packages.truncate(query.count);
        Ok(page.packages)
    }

    fn get_updates(
        &self,
        installed: &[PackageIdentifier],
        include_prerelease: bool,
        include_all_versions: bool,
    ) -> Result<Vec<Package>> {
        let mut updates = Vec::new();
        let mut endpoint_supported = true;

        for batch in installed.chunks(UPDATE_BATCH_SIZE) {
            if endpoint_supported {
                let ids = batch.iter().map(|p| p.id.as_str()).collect::<Vec<_>>().join("|");
                let versions =
                    batch.iter().map(|p| p.version.as_str()).collect::<Vec<_>>().join("|");
                let url = self.method_url(
                    "GetUpdates()",
                    &[
                        ("packageIds", quote(&ids)),
                        ("versions", quote(&versions)),
                        ("includePrerelease", include_prerelease.to_string()),
                        ("includeAllVersions", include_all_versions.to_string()),
                        ("targetFrameworks", "''".to_string()),
                        ("versionConstraints", "''".to_string()),
                    ],
                )?;

                match self.collect_pages(url) {
                    Ok(packages) => {
                        updates.extend(packages);
                        continue;
                    }
                    Err(e)
                        if matches!(
                            e.downcast_ref::<NupmError>(),
                            Some(NupmError::FeedMethodNotSupported { .. })
                        ) =>
                    {
                        debug!(source = %self.name, "GetUpdates not supported, querying packages one by one");
                        endpoint_supported = false;
                    }
                    Err(e) => return Err(e),
                }
            }

            updates.extend(self.update_fallback(batch, include_prerelease, include_all_versions)?);
        }

        Ok(updates)
    }
}

/// OData string literal: single quotes, embedded quotes doubled.
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    /// Serves pages by URL substring and records every request.
    #[derive(Default)]
    struct MockTransport {
        routes: Vec<(String, Result<FeedPage, FeedError>)>,
        parse_failures: Cell<u32>,
        requests: Rc<RefCell<Vec<String>>>,
    }

    impl MockTransport {
        fn route(mut self, pattern: &str, response: Result<FeedPage, FeedError>) -> Self {
            self.routes.push((pattern.to_string(), response));
            self
        }
    }

    impl FeedTransport for MockTransport {
        fn get_page(
            &self,
            url: &str,
            _credentials: Option<&Credentials>,
        ) -> Result<FeedPage, FeedError> {
            self.requests.borrow_mut().push(url.to_string());
            if self.parse_failures.get() > 0 {
                self.parse_failures.set(self.parse_failures.get() - 1);
                return Err(FeedError::Parse {
                    url: url.to_string(),
                    reason: "truncated body".to_string(),
                });
            }
            self.routes
                .iter()
                .find(|(pattern, _)| url.contains(pattern.as_str()))
                .map(|(_, response)| response.clone())
                .unwrap_or(Err(FeedError::NotFound {
                    url: url.to_string(),
                }))
        }
    }

    fn page(versions: &[&str], next: Option<&str>) -> Result<FeedPage, FeedError> {
        Ok(FeedPage {
            packages: versions.iter().map(|v| Package::new("R", *v)).collect(),
            next: next.map(str::to_string),
        })
    }

    fn source(transport: MockTransport) -> RemoteSource {
        let config =
            PackageSourceConfig::new("remote", "https://feed.example.com/api/v2", None, true)
                .unwrap();
        RemoteSource::new(&config, Box::new(transport), Rc::new(CredentialStore::default()), false)
            .unwrap()
    }

    #[test]
    fn test_exact_match_short_circuits_paging() {
        let transport = MockTransport::default()
            .route("FindPackagesById", page(&["1.0.0", "1.5.0"], Some("https://feed.example.com/api/v2/page2")))
            .route("page2", page(&["2.1.0"], None));
        let requests = Rc::clone(&transport.requests);
        let remote = source(transport);

        let found = remote.get_specific_package(&PackageIdentifier::new("R", "1.5.0")).unwrap();
        assert_eq!(found.unwrap().version(), "1.5.0");
        assert_eq!(requests.borrow().len(), 1);
        assert!(requests.borrow()[0].contains("id=%27R%27"));
    }

    #[test]
    fn test_best_candidate_tracked_across_pages() {
        let transport = MockTransport::default()
            .route("FindPackagesById", page(&["1.0.0", "2.1.0"], Some("https://feed.example.com/api/v2/page2")))
            .route("page2", page(&["1.5.0", "3.0.0-beta"], None));
        let remote = source(transport);

        let found =
            remote.get_specific_package(&PackageIdentifier::new("R", "[1.0,3.0)")).unwrap().unwrap();
        assert_eq!(found.version(), "2.1.0");
        assert_eq!(
            found.origin,
            Some(PackageOrigin::Remote {
                source: "remote".to_string(),
                url: "https://feed.example.com/api/v2/package/R/2.1.0".to_string(),
            })
        );
    }

    #[test]
    fn test_parse_failures_are_retried() {
        let transport = MockTransport::default().route("FindPackagesById", page(&["1.0.0"], None));
        transport.parse_failures.set(FEED_PARSE_RETRIES);
        let remote = source(transport);
        assert!(remote.get_specific_package(&PackageIdentifier::new("R", "1.0.0")).unwrap().is_some());

        let transport = MockTransport::default().route("FindPackagesById", page(&["1.0.0"], None));
        transport.parse_failures.set(FEED_PARSE_RETRIES + 1);
        let remote = source(transport);
        let err = remote.get_specific_package(&PackageIdentifier::new("R", "1.0.0")).unwrap_err();
        assert!(matches!(err.downcast_ref::<NupmError>(), Some(NupmError::FeedParse { .. })));
    }

    #[test]
    fn test_paging_stops_at_repeated_next_link() {
        let transport = MockTransport::default()
            .route("FindPackagesById", page(&["1.0.0"], Some("https://feed.example.com/api/v2/page2")))
            .route("page2", page(&["1.1.0"], Some("https://feed.example.com/api/v2/page2")));
        let requests = Rc::clone(&transport.requests);
        let remote = source(transport);

        let found = remote.find_packages_by_id(&PackageIdentifier::new("R", "")).unwrap();
        let versions: Vec<&str> = found.iter().map(Package::version).collect();
        assert_eq!(versions, vec!["1.0.0", "1.1.0"]);
        assert_eq!(requests.borrow().len(), 2);

        let best = remote.get_specific_package(&PackageIdentifier::new("R", "[1.0,2.0)")).unwrap();
        assert_eq!(best.unwrap().version(), "1.1.0");
        assert_eq!(requests.borrow().len(), 4);
    }

    #[test]
    fn test_get_updates_falls_back_to_find_by_id() {
        let transport = MockTransport::default()
            .route("FindPackagesById", page(&["1.0.0", "1.2.0", "1.1.0"], None));
        let requests = Rc::clone(&transport.requests);
        let remote = source(transport);
        let installed: Vec<PackageIdentifier> =
            (0..12).map(|_| PackageIdentifier::new("R", "1.0.0")).collect();

        let updates = remote.get_updates(&installed, false, false).unwrap();
        assert_eq!(updates.len(), 12);
        assert!(updates.iter().all(|p| p.version() == "1.2.0"));

        // the unsupported endpoint is only tried for the first batch
        let update_calls =
            requests.borrow().iter().filter(|u| u.contains("GetUpdates")).count();
        assert_eq!(update_calls, 1);
    }

    #[test]
    fn test_get_updates_batches_by_ten() {
        let transport = MockTransport::default().route("GetUpdates", page(&["9.9.9"], None));
        let requests = Rc::clone(&transport.requests);
        let remote = source(transport);
        let installed: Vec<PackageIdentifier> =
            (0..25).map(|i| PackageIdentifier::new(format!("P{i}"), "1.0.0")).collect();

        remote.get_updates(&installed, false, false).unwrap();
        assert_eq!(requests.borrow().len(), 3);
    }

    #[test]
    fn test_quote_escapes_single_quotes() {
        assert_eq!(quote("it's"), "'it''s'");
    }
}
