// Copyright (C) 2020-2026  The Blockhouse Technology Limited (TBTL).
//
// This program is free software: you can redistribute it and/or modify it
// under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or (at your
// option) any later version.
//
// This program is distributed in the hope that it will be useful, but
// WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public
// License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Scripted HTTP client for the flow tests.

use std::{collections::HashMap, convert::Infallible, sync::Mutex};

use bh_jws_utils::HttpGetClient;
use serde_json::{json, Value};

use crate::HttpClient;

/// A request received by the [`StubHttpClient`].
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RecordedRequest {
    Get {
        url: String,
    },
    Form {
        url: String,
        form: Vec<(String, String)>,
    },
    Json {
        url: String,
        body: Value,
        bearer_token: Option<String>,
    },
}

impl RecordedRequest {
    pub(crate) fn url(&self) -> &str {
        match self {
            Self::Get { url } | Self::Form { url, .. } | Self::Json { url, .. } => url,
        }
    }

    pub(crate) fn form_value(&self, name: &str) -> Option<&str> {
        match self {
            Self::Form { form, .. } => form
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str()),
            _ => None,
        }
    }

    pub(crate) fn json_body(&self) -> Option<&Value> {
        match self {
            Self::Json { body, .. } => Some(body),
            _ => None,
        }
    }
}

/// Answers every request to a routed URL with a fixed JSON response, and
/// everything else with `404 Not Found`.
#[derive(Debug, Default)]
pub(crate) struct StubHttpClient {
    routes: HashMap<String, (u16, Value)>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl StubHttpClient {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn route(mut self, url: &str, status: u16, body: Value) -> Self {
        self.routes.insert(url.to_owned(), (status, body));
        self
    }

    pub(crate) fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn respond(&self, request: RecordedRequest) -> reqwest::Response {
        let (status, body) = self
            .routes
            .get(request.url())
            .cloned()
            .unwrap_or_else(|| (404, json!({ "error": "not_found" })));
        self.requests.lock().unwrap().push(request);

        json_response(status, body)
    }
}

impl HttpGetClient for StubHttpClient {
    type Err = Infallible;

    async fn get(&self, url: &str) -> Result<reqwest::Response, Infallible> {
        Ok(self.respond(RecordedRequest::Get {
            url: url.to_owned(),
        }))
    }
}

impl HttpClient for StubHttpClient {
    async fn post_form(
        &self,
        url: &str,
        form: &[(&str, &str)],
    ) -> Result<reqwest::Response, Infallible> {
        Ok(self.respond(RecordedRequest::Form {
            url: url.to_owned(),
            form: form
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
        }))
    }

    async fn post_json(
        &self,
        url: &str,
        body: &Value,
        bearer_token: Option<&str>,
    ) -> Result<reqwest::Response, Infallible> {
        Ok(self.respond(RecordedRequest::Json {
            url: url.to_owned(),
            body: body.clone(),
            bearer_token: bearer_token.map(str::to_owned),
        }))
    }
}

pub(crate) fn json_response(status: u16, body: Value) -> reqwest::Response {
    reqwest::Response::from(
        http::Response::builder()
            .status(status)
            .header("Content-type", "application/json")
            .body(body.to_string())
            .unwrap(),
    )
}
