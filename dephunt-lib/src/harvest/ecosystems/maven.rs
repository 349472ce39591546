//! Maven Central: artifacts found by searching well-known groups; records combine
//! the resolved version with its POM.

use super::{Discovery, RegistryClient, endpoint_url};
use crate::Result;
use crate::harvest::{FetchOutcome, IndexSnapshot, MavenCoordinate, PackageId};
use ohno::{IntoAppError, app_err};
use serde::Deserialize;
use serde_json::{Value, json};

/// Groups whose artifacts seed discovery, in crawl order.
const SEED_GROUPS: &[&str] = &[
    "org.apache",
    "com.google",
    "org.springframework",
    "io.quarkus",
    "org.hibernate",
    "com.fasterxml.jackson",
    "org.junit",
    "io.micronaut",
    "org.slf4j",
];

const SEARCH_ROWS: usize = 1000;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    response: SearchResults,
}

#[derive(Debug, Default, Deserialize)]
struct SearchResults {
    #[serde(default)]
    docs: Vec<SearchDoc>,
}

#[derive(Debug, Deserialize)]
struct SearchDoc {
    g: Option<String>,
    a: Option<String>,
}

/// The subset of `maven-metadata.xml` needed to pick a version.
#[derive(Debug, Deserialize)]
struct ArtifactMetadata {
    versioning: Option<Versioning>,
}

#[derive(Debug, Deserialize)]
struct Versioning {
    release: Option<String>,
    latest: Option<String>,
    #[serde(default)]
    versions: Versions,
}

#[derive(Debug, Default, Deserialize)]
struct Versions {
    #[serde(default)]
    version: Vec<String>,
}

/// Pick the version to describe: the release, else the latest, else the last listed.
fn resolve_version(xml: &str) -> Result<String> {
    let metadata: ArtifactMetadata = quick_xml::de::from_str(xml).into_app_err("malformed maven-metadata.xml")?;
    let versioning = metadata.versioning.ok_or_else(|| app_err!("maven-metadata.xml has no <versioning> element"))?;

    [versioning.release, versioning.latest, versioning.versions.version.into_iter().last()]
        .into_iter()
        .flatten()
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
        .ok_or_else(|| app_err!("maven-metadata.xml lists no versions"))
}

/// The seed groups still to be searched after `cursor`, the last group fully searched.
fn remaining_groups(cursor: Option<&str>) -> &'static [&'static str] {
    let start = cursor
        .and_then(|c| SEED_GROUPS.iter().position(|g| *g == c))
        .map_or(0, |pos| pos + 1);
    &SEED_GROUPS[start..]
}

/// Each group is searched in a single request, so a crawl resumes at group granularity.
pub(super) async fn discover(discovery: &mut Discovery<'_>, snapshot: &mut IndexSnapshot) -> Result<()> {
    for group in remaining_groups(snapshot.cursor.as_deref()) {
        if snapshot.packages.len() >= discovery.limit {
            return Ok(());
        }

        let mut url = discovery.client.endpoints.maven_search.clone();
        _ = url
            .query_pairs_mut()
            .append_pair("q", &format!("g:{group}"))
            .append_pair("rows", &SEARCH_ROWS.to_string())
            .append_pair("wt", "json");

        discovery.next_page().await;
        let results: SearchResponse = discovery.client.fetcher.fetch_json(&url).await.into_result()?;

        snapshot.packages.extend(results.response.docs.into_iter().filter_map(|doc| match (doc.g, doc.a) {
            (Some(g), Some(a)) if !g.is_empty() && !a.is_empty() => Some(PackageId::from(format!("{g}:{a}"))),
            _ => None,
        }));
        snapshot.cursor = Some((*group).to_string());
        discovery.checkpoint(snapshot)?;
    }

    snapshot.complete = true;
    discovery.checkpoint(snapshot)
}

pub(super) async fn fetch_metadata(client: &RegistryClient, id: &PackageId) -> FetchOutcome<Value> {
    let coord = match id.as_str().parse::<MavenCoordinate>() {
        Ok(coord) => coord,
        Err(e) => return FetchOutcome::PermanentError(e),
    };

    let group_path = coord.group_path();
    let mut artifact_dir: Vec<&str> = group_path.split('/').collect();
    artifact_dir.push(&coord.artifact_id);

    let metadata_url = {
        let mut segments = artifact_dir.clone();
        segments.push("maven-metadata.xml");
        match endpoint_url(&client.endpoints.maven_repository, &segments) {
            Ok(url) => url,
            Err(e) => return FetchOutcome::PermanentError(e),
        }
    };

    let version = match client.fetcher.fetch_text(&metadata_url).await {
        FetchOutcome::Success(xml) => match resolve_version(&xml) {
            Ok(version) => version,
            Err(e) => return FetchOutcome::PermanentError(e),
        },
        other => return other.map(|_| Value::Null),
    };

    let pom_url = {
        let pom_name = format!("{}-{version}.pom", coord.artifact_id);
        let mut segments = artifact_dir;
        segments.push(&version);
        segments.push(&pom_name);
        match endpoint_url(&client.endpoints.maven_repository, &segments) {
            Ok(url) => url,
            Err(e) => return FetchOutcome::PermanentError(e),
        }
    };

    client.fetcher.fetch_text(&pom_url).await.map(|pom| {
        json!({
            "group_id": coord.group_id,
            "artifact_id": coord.artifact_id,
            "latest_version": version,
            "pom_content": pom,
        })
    })
}
