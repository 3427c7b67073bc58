use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use std::time::Duration;

use crate::models::{Difficulty, Profile, Submission};

const GRAPHQL_ENDPOINT: &str = "https://leetcode.com/graphql";
const REFERER: &str = "https://leetcode.com";

const USER_PROFILE_QUERY: &str = include_str!("lcapi/user_profile.graphql");
const RECENT_SUBMISSIONS_QUERY: &str = include_str!("lcapi/recent_submissions.graphql");
const PROBLEM_DIFFICULTY_QUERY: &str = include_str!("lcapi/problem_difficulty.graphql");

/// Read access to a remote coding-practice platform.
///
/// Every call may fail for network or remote-side reasons; callers treat an `Err`
/// as "no data this time", never as fatal. Unknown users and problems are not
/// errors: they come back as `Ok(None)` and `Ok(Difficulty::Unknown)`.
#[async_trait]
pub trait ActivitySource: Send + Sync {
    async fn fetch_profile(&self, username: &str) -> Result<Option<Profile>>;

    /// Most recent submissions, newest first as the remote returns them.
    async fn fetch_recent_submissions(&self, username: &str, limit: usize) -> Result<Vec<Submission>>;

    async fn fetch_problem_difficulty(&self, slug: &str) -> Result<Difficulty>;
}

#[derive(Serialize)]
struct RequestBody<'a> {
    query: &'a str,
    variables: Value,
}

#[derive(Deserialize)]
struct QueryResponse {
    data: Option<Value>,
    errors: Option<Value>,
}

/// LeetCode's public GraphQL endpoint.
#[derive(Clone)]
pub struct LeetCodeClient {
    http: Client,
}

impl LeetCodeClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let headers = HeaderMap::from_iter([
            (header::CONTENT_TYPE, HeaderValue::from_static("application/json")),
            (HeaderName::from_static("referer"), HeaderValue::from_static(REFERER)),
        ]);

        let http = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .context("Couldn't build the LeetCode HTTP client.")?;

        Ok(Self { http })
    }

    /// Runs a GraphQL query and returns its `data` object.
    async fn query(&self, query: &str, variables: Value) -> Result<Value> {
        let response = self.http
            .post(GRAPHQL_ENDPOINT)
            .json(&RequestBody { query, variables })
            .send()
            .await?
            .error_for_status()?
            .json::<QueryResponse>()
            .await?;

        match (response.data, response.errors) {
            (Some(data), _) => Ok(data),
            (None, Some(errors)) => Err(anyhow!("LeetCode returned errors: {errors}")),
            (None, None) => Err(anyhow!("No data found in the response.")),
        }
    }
}

#[async_trait]
impl ActivitySource for LeetCodeClient {
    async fn fetch_profile(&self, username: &str) -> Result<Option<Profile>> {
        log::trace!("[fetch_profile] Fetching profile for {username}...");
        let data = self.query(USER_PROFILE_QUERY, serde_json::json!({ "username": username }))
            .await
            .with_context(|| format!("Couldn't query profile for {username}"))?;

        parse_profile(&data, username)
    }

    async fn fetch_recent_submissions(&self, username: &str, limit: usize) -> Result<Vec<Submission>> {
        log::trace!("[fetch_recent_submissions] Fetching {limit} submissions for {username}...");
        let variables = serde_json::json!({ "username": username, "limit": limit });
        let data = self.query(RECENT_SUBMISSIONS_QUERY, variables)
            .await
            .with_context(|| format!("Couldn't query recent submissions for {username}"))?;

        parse_submissions(&data, username)
    }

    async fn fetch_problem_difficulty(&self, slug: &str) -> Result<Difficulty> {
        log::trace!("[fetch_problem_difficulty] Fetching difficulty for {slug}...");
        let data = self.query(PROBLEM_DIFFICULTY_QUERY, serde_json::json!({ "titleSlug": slug }))
            .await
            .with_context(|| format!("Couldn't query difficulty for {slug}"))?;

        Ok(parse_difficulty(&data))
    }
}

/// Returns an error message for when a JSON attribute can't be obtained.
fn err_cant_get(attribute: &str, username: &str) -> String {
    format!("Couldn't get {} for {}", attribute, username)
}

fn extract_u64_from_json(value: &Value, key: &str) -> Result<u64> {
    value.get(key)
        .with_context(|| format!("Missing key: {}", key))?
        .as_u64().context("Could not convert json integer into u64")
}

fn non_null(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

pub(crate) fn parse_profile(data: &Value, username: &str) -> Result<Option<Profile>> {
    // A missing matchedUser is LeetCode's way of saying "no such user"
    let Some(user) = non_null(data.get("matchedUser")) else {
        log::debug!("[parse_profile] No LeetCode user named {username}");
        return Ok(None);
    };

    let solved = user
        .get("submitStats").context(err_cant_get("submission statistics", username))?
        .get("acSubmissionNum").context("Couldn't retrieve submission statistics.")?
        .as_array().context("Malformed submission data; check JSON schema.")?;

    let solved_for = |label: &str| -> Result<u64> {
        solved.iter()
            .find(|entry| entry.get("difficulty").and_then(Value::as_str) == Some(label))
            .with_context(|| err_cant_get(&format!("{label} solve count"), username))
            .and_then(|entry| extract_u64_from_json(entry, "count"))
    };

    let profile = user.get("profile").context(err_cant_get("profile", username))?;

    // Unranked accounts report a null ranking
    let ranking = profile.get("ranking").and_then(Value::as_u64).unwrap_or(0);
    let avatar_url = non_null(profile.get("userAvatar"))
        .and_then(Value::as_str)
        .map(String::from);

    let streak = non_null(user.get("userCalendar"))
        .and_then(|calendar| calendar.get("streak"))
        .and_then(Value::as_u64)
        .unwrap_or(0);

    Ok(Some(Profile {
        username: user.get("username")
            .and_then(Value::as_str)
            .unwrap_or(username)
            .to_string(),
        ranking,
        avatar_url,
        streak,
        total_solved: solved_for("All")?,
        easy_solved: solved_for("Easy")?,
        medium_solved: solved_for("Medium")?,
        hard_solved: solved_for("Hard")?,
    }))
}

/// LeetCode sends timestamps as strings, but tolerate plain integers too.
#[derive(Deserialize)]
#[serde(untagged)]
enum Timestamp {
    Text(String),
    Number(i64),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSubmission {
    title: String,
    title_slug: String,
    timestamp: Timestamp,
    status_display: String,
    lang: String,
}

impl TryFrom<RawSubmission> for Submission {
    type Error = anyhow::Error;

    fn try_from(raw: RawSubmission) -> Result<Self> {
        let timestamp = match raw.timestamp {
            Timestamp::Number(ts) => ts,
            Timestamp::Text(ts) => ts.trim().parse()
                .with_context(|| format!("Malformed submission timestamp: {ts}"))?,
        };

        Ok(Self {
            title: raw.title,
            slug: raw.title_slug,
            timestamp,
            status: raw.status_display,
            language: raw.lang,
        })
    }
}

pub(crate) fn parse_submissions(data: &Value, username: &str) -> Result<Vec<Submission>> {
    // Unknown users come back with a null list rather than an error
    let Some(raw_submissions) = non_null(data.get("recentSubmissionList")) else {
        return Ok(Vec::new());
    };

    let raw_submissions = raw_submissions
        .as_array()
        .context("Couldn't deserialize recentSubmissionList into an array.")?;

    raw_submissions
        .iter()
        .map(|val| {
            serde_json::from_value::<RawSubmission>(val.clone())
                .with_context(|| err_cant_get("a well-formed submission", username))
                .and_then(Submission::try_from)
        })
        .collect()
}

pub(crate) fn parse_difficulty(data: &Value) -> Difficulty {
    non_null(data.get("question"))
        .and_then(|question| question.get("difficulty"))
        .and_then(Value::as_str)
        .and_then(|label| label.parse::<Difficulty>().ok())
        .unwrap_or_default()
}
