//! Endpoint wrappers over [`Session`]

use std::sync::Arc;

use schema::{Record, Value};
use serde_json::{Map, Value as JsonValue, json};
use session::{Request, Session, SessionConfig};
use tracing::debug;

use crate::error::{Error, Result};
use crate::schemas::{self, list_params};

/// Destination of a problem transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferTarget {
    /// The logged-in user's personal problem set.
    Personal,
    Team(u64),
}

impl TransferTarget {
    fn body(self) -> Map<String, JsonValue> {
        let mut body = Map::new();
        match self {
            TransferTarget::Personal => {
                body.insert("type".into(), json!("U"));
            }
            TransferTarget::Team(tid) => {
                body.insert("type".into(), json!("T"));
                body.insert("teamID".into(), json!(tid));
            }
        }
        body
    }
}

/// Typed wrappers for the Luogu endpoints this crate knows about.
#[derive(Clone)]
pub struct LuoguClient {
    session: Session,
}

impl LuoguClient {
    /// Build a session over the Luogu registry.
    pub fn new(config: SessionConfig) -> Result<Self> {
        let registry = Arc::new(schemas::registry()?);
        Ok(Self::from_session(Session::new(config, registry)?))
    }

    /// Wrap an existing session. Its registry must contain the Luogu schemas.
    pub fn from_session(session: Session) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// `problem/list` filtered by a `ProblemListParams` record.
    pub async fn get_problem_list(&self, params: &Record) -> Result<Record> {
        let query = self.session.registry().encode_query(params)?;
        let request = Request::get("problem/list").query_pairs(query);
        Ok(self.session.call(request, "ProblemListResponse").await?)
    }

    /// Problems created by the logged-in user.
    pub async fn get_created_problem_list(&self, page: Option<i64>) -> Result<Record> {
        self.paged("api/user/createdProblems".to_owned(), page).await
    }

    pub async fn get_team_problem_list(&self, tid: u64, page: Option<i64>) -> Result<Record> {
        self.paged(format!("api/team/problems/{tid}"), page).await
    }

    async fn paged(&self, endpoint: String, page: Option<i64>) -> Result<Record> {
        let params = list_params().with("page", page);
        let query = self.session.registry().encode_query(&params)?;
        let request = Request::get(endpoint).query_pairs(query);
        Ok(self.session.call(request, "ProblemListResponse").await?)
    }

    pub async fn get_problem(&self, pid: &str, contest_id: Option<u64>) -> Result<Record> {
        let mut request = Request::get(format!("problem/{pid}"));
        if let Some(contest_id) = contest_id {
            request = request.query("contestId", contest_id);
        }
        Ok(self.session.call(request, "ProblemDataResponse").await?)
    }

    /// Editable settings of a problem.
    ///
    /// The edit page spreads settings over `problem`, `setting` and the test
    /// case keys; they are regrouped into `ProblemSettingsResponse` before
    /// decoding.
    pub async fn get_problem_settings(&self, pid: &str) -> Result<Record> {
        let endpoint = format!("problem/edit/{pid}");
        let payload = self.session.send(Request::get(endpoint.as_str())).await?;
        let reshaped = reshape_settings(&endpoint, payload)?;
        Ok(self
            .session
            .registry()
            .decode("ProblemSettingsResponse", &reshaped)?)
    }

    /// Replace a problem's settings with the writable fields of `settings`.
    pub async fn update_problem_settings(&self, pid: &str, settings: &Record) -> Result<Record> {
        let body = self.settings_body(settings, JsonValue::Null, settings_provider(settings))?;
        let request = Request::post(format!("fe/api/problem/edit/{pid}")).json(body);
        Ok(self.session.call(request, "ProblemModifiedResponse").await?)
    }

    /// Create a problem, personal when `tid` is `None`, otherwise owned by the team.
    pub async fn create_problem(&self, settings: &Record, tid: Option<u64>) -> Result<Record> {
        let kind = if tid.is_some() { "T" } else { "U" };
        let body = self.settings_body(settings, json!(kind), json!(tid))?;
        let request = Request::post("fe/api/problem/new").json(body);
        Ok(self.session.call(request, "ProblemModifiedResponse").await?)
    }

    fn settings_body(
        &self,
        settings: &Record,
        kind: JsonValue,
        provider: JsonValue,
    ) -> Result<JsonValue> {
        let encoded = self.session.registry().encode(settings)?;
        Ok(json!({
            "settings": encoded,
            "type": kind,
            "providerID": provider,
            "comment": settings.get_str("comment"),
        }))
    }

    /// Delete a problem. Returns the server's `_empty` flag.
    pub async fn delete_problem(&self, pid: &str) -> Result<bool> {
        let endpoint = format!("fe/api/problem/delete/{pid}");
        let payload = self
            .session
            .send(Request::post(endpoint.as_str()).json(json!({})))
            .await?;
        payload
            .get("_empty")
            .and_then(JsonValue::as_bool)
            .ok_or_else(|| Error::UnexpectedPayload {
                endpoint,
                detail: "missing boolean `_empty`".into(),
            })
    }

    /// Replace a problem's test case configuration with the writable fields
    /// of a `TestCaseSettings` record. Returns the raw payload.
    pub async fn update_testcases_settings(&self, pid: &str, settings: &Record) -> Result<JsonValue> {
        let body = self.session.registry().encode(settings)?;
        let request = Request::post(format!("fe/api/problem/editTestCase/{pid}")).json(body);
        Ok(self.session.send(request).await?)
    }

    /// Move or copy a problem to `target`.
    pub async fn transfer_problem(
        &self,
        pid: &str,
        target: TransferTarget,
        clone: bool,
    ) -> Result<Record> {
        let mut body = target.body();
        if clone {
            body.insert("operation".into(), json!("clone"));
        }
        let request = Request::post(format!("fe/api/problem/transfer/{pid}")).json(JsonValue::Object(body));
        Ok(self.session.call(request, "ProblemModifiedResponse").await?)
    }

    pub async fn get_tags(&self) -> Result<Record> {
        Ok(self.session.call(Request::get("_lfe/tags"), "TagsResponse").await?)
    }

    pub async fn get_user(&self, uid: u64) -> Result<Record> {
        Ok(self
            .session
            .call(Request::get(format!("user/{uid}")), "UserDataResponse")
            .await?)
    }

    /// `UserDetails` from the lighter `api/user/info` endpoint.
    pub async fn get_user_info(&self, uid: u64) -> Result<Record> {
        let endpoint = format!("api/user/info/{uid}");
        let response = self
            .session
            .call(Request::get(endpoint.as_str()), "UserDataResponse")
            .await?;
        take_user(&endpoint, response)
    }

    pub async fn get_user_followings(&self, uid: u64, page: Option<i64>) -> Result<Vec<Record>> {
        self.user_list("api/user/followings", uid, page).await
    }

    pub async fn get_user_followers(&self, uid: u64, page: Option<i64>) -> Result<Vec<Record>> {
        self.user_list("api/user/followers", uid, page).await
    }

    pub async fn get_user_blacklist(&self, uid: u64, page: Option<i64>) -> Result<Vec<Record>> {
        self.user_list("api/user/blacklist", uid, page).await
    }

    async fn user_list(&self, endpoint: &str, uid: u64, page: Option<i64>) -> Result<Vec<Record>> {
        let params = Record::new("UserListParams")
            .with("user", uid as i64)
            .with("page", page);
        let query = self.session.registry().encode_query(&params)?;
        let response = self
            .session
            .call(Request::get(endpoint).query_pairs(query), "UserListResponse")
            .await?;
        let users = response
            .get_record("users")
            .and_then(|page| page.get_list("result"))
            .ok_or_else(|| Error::UnexpectedPayload {
                endpoint: endpoint.to_owned(),
                detail: "missing `users.result`".into(),
            })?;
        Ok(records(users))
    }

    /// Users whose name matches `keyword`.
    pub async fn search_user(&self, keyword: &str) -> Result<Vec<Record>> {
        let params = Record::new("UserSearchParams").with("keyword", keyword);
        let query = self.session.registry().encode_query(&params)?;
        let response = self
            .session
            .call(Request::get("api/user/search").query_pairs(query), "UserSearchResponse")
            .await?;
        Ok(response.get_list("users").map(records).unwrap_or_default())
    }

    /// Details of the logged-in user, identified by the `_uid` cookie.
    pub async fn me(&self) -> Result<Record> {
        let uid = self.session.user_id().await.ok_or(Error::NotLoggedIn)?;
        debug!(uid, "fetching own profile");
        let response = self.get_user(uid).await?;
        take_user(&format!("user/{uid}"), response)
    }
}

/// Pull the `user` record out of a `UserDataResponse`.
fn take_user(endpoint: &str, mut response: Record) -> Result<Record> {
    match response.remove("user") {
        Value::Record(user) => Ok(user),
        other => Err(Error::UnexpectedPayload {
            endpoint: endpoint.to_owned(),
            detail: format!("expected `user` record, found {}", other.type_name()),
        }),
    }
}

/// Nested records of a decoded list; null entries are skipped.
fn records(values: &[Value]) -> Vec<Record> {
    values
        .iter()
        .filter_map(Value::as_record)
        .cloned()
        .collect()
}

/// Provider id sent alongside edited settings.
fn settings_provider(settings: &Record) -> JsonValue {
    settings
        .get_i64("providerID")
        .map_or(JsonValue::Null, JsonValue::from)
}

/// Regroup the edit page payload into the `ProblemSettingsResponse` layout.
fn reshape_settings(endpoint: &str, mut payload: JsonValue) -> Result<JsonValue> {
    let unexpected = |detail: &str| Error::UnexpectedPayload {
        endpoint: endpoint.to_owned(),
        detail: detail.to_owned(),
    };

    let raw = payload
        .as_object_mut()
        .ok_or_else(|| unexpected("payload is not an object"))?;
    let problem = raw
        .remove("problem")
        .ok_or_else(|| unexpected("missing `problem`"))?;
    let mut settings = match raw.remove("setting") {
        Some(JsonValue::Object(settings)) => settings,
        _ => return Err(unexpected("missing `setting` object")),
    };

    let comment = problem.get("comment").cloned().unwrap_or(JsonValue::Null);
    settings.insert("comment".into(), comment);

    // User providers carry `uid`, team providers `id`
    let provider = problem.get("provider");
    let provider_id = provider
        .and_then(|p| p.get("uid"))
        .filter(|id| !id.is_null())
        .or_else(|| provider.and_then(|p| p.get("id")))
        .cloned()
        .unwrap_or(JsonValue::Null);
    settings.insert("providerID".into(), provider_id);

    let mut take = |key: &str| raw.remove(key).unwrap_or(JsonValue::Null);
    let test_cases = json!({
        "cases": take("testCases"),
        "scoringStrategy": take("scoringStrategy"),
        "subtaskScoringStrategies": take("subtaskScoringStrategies"),
        "showSubtask": take("showSubtask"),
    });

    Ok(json!({
        "problemDetails": problem,
        "problemSettings": settings,
        "testCaseSettings": test_cases,
        "privilegedTeams": take("privilegedTeams"),
    }))
}
