// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Topic addressing for calls and replies.
//!
//! # Topic Naming
//!
//! For endpoint `Driver`, service `math`, method `add` and caller `cli-1`,
//! under the default prefix `/rpc/v1`:
//! - Announcement (retained marker): `/rpc/v1/Driver/math/add`
//! - Server subscription: `/rpc/v1/Driver/math/add/+`
//! - Call topic: `/rpc/v1/Driver/math/add/cli-1`
//! - Reply topic: `/rpc/v1/Driver/math/add/cli-1/reply`
//! - Caller subscription: `/rpc/v1/+/+/+/cli-1/reply`

/// Default namespace and version marker.
pub const DEFAULT_PREFIX: &str = "/rpc/v1";

/// Last level of every reply topic.
pub const REPLY_SUFFIX: &str = "reply";

/// Hierarchical level separator.
pub const SEPARATOR: char = '/';

/// Single-level wildcard.
pub const WILDCARD_ONE: &str = "+";

/// Multi-level wildcard.
pub const WILDCARD_ALL: &str = "#";

/// Identifiers decoded from a call or reply topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallAddress {
    pub endpoint: String,
    pub service: String,
    pub method: String,
    pub caller: String,
}

/// Builds and parses topics under one prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicScheme {
    prefix: String,
}

impl TopicScheme {
    /// Scheme rooted at `prefix`. A trailing separator is ignored.
    pub fn new(prefix: impl Into<String>) -> Self {
        let mut prefix = prefix.into();
        while prefix.len() > 1 && prefix.ends_with(SEPARATOR) {
            prefix.pop();
        }
        Self { prefix }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Bare call topic a server publishes its retained marker on.
    pub fn announce_topic(&self, endpoint: &str, service: &str, method: &str) -> String {
        format!("{}/{}/{}/{}", self.prefix, endpoint, service, method)
    }

    /// Pattern a server subscribes to in order to accept calls from any caller.
    pub fn call_subscription(&self, endpoint: &str, service: &str, method: &str) -> String {
        format!(
            "{}/{}",
            self.announce_topic(endpoint, service, method),
            WILDCARD_ONE
        )
    }

    /// Topic a caller publishes a call on.
    pub fn call_topic(&self, endpoint: &str, service: &str, method: &str, caller: &str) -> String {
        format!(
            "{}/{}",
            self.announce_topic(endpoint, service, method),
            caller
        )
    }

    /// Topic the server answers a call on.
    pub fn reply_topic(&self, endpoint: &str, service: &str, method: &str, caller: &str) -> String {
        format!(
            "{}/{}",
            self.call_topic(endpoint, service, method, caller),
            REPLY_SUFFIX
        )
    }

    /// Pattern matching every reply addressed to `caller`.
    pub fn reply_subscription(&self, caller: &str) -> String {
        format!(
            "{}/+/+/+/{}/{}",
            self.prefix, caller, REPLY_SUFFIX
        )
    }

    /// Decode a reply topic (`<prefix>/<endpoint>/<service>/<method>/<caller>/reply`).
    pub fn parse_reply(&self, topic: &str) -> Option<CallAddress> {
        let levels = self.levels(topic)?;
        match levels.as_slice() {
            [endpoint, service, method, caller, suffix] if *suffix == REPLY_SUFFIX => {
                Self::address(endpoint, service, method, caller)
            }
            _ => None,
        }
    }

    /// Decode a call topic (`<prefix>/<endpoint>/<service>/<method>/<caller>`).
    pub fn parse_call(&self, topic: &str) -> Option<CallAddress> {
        let levels = self.levels(topic)?;
        match levels.as_slice() {
            [endpoint, service, method, caller] => {
                Self::address(endpoint, service, method, caller)
            }
            _ => None,
        }
    }

    fn levels<'a>(&self, topic: &'a str) -> Option<Vec<&'a str>> {
        let rest = topic.strip_prefix(self.prefix.as_str())?;
        let rest = rest.strip_prefix(SEPARATOR)?;
        Some(rest.split(SEPARATOR).collect())
    }

    fn address(endpoint: &str, service: &str, method: &str, caller: &str) -> Option<CallAddress> {
        let all_valid = [endpoint, service, method, caller]
            .iter()
            .all(|level| is_valid_component(level));
        if !all_valid {
            return None;
        }
        Some(CallAddress {
            endpoint: endpoint.to_string(),
            service: service.to_string(),
            method: method.to_string(),
            caller: caller.to_string(),
        })
    }
}

impl Default for TopicScheme {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

/// True if `id` can be used as a single topic level.
pub fn is_valid_component(id: &str) -> bool {
    !id.is_empty() && !id.contains(|c| matches!(c, '/' | '+' | '#'))
}

/// Substitute characters that are illegal inside one topic level.
pub fn sanitize_component(id: &str) -> String {
    let sanitized: String = id
        .chars()
        .map(|c| match c {
            '/' | '+' | '#' => '_',
            c => c,
        })
        .collect();
    if sanitized.is_empty() {
        "_".to_string()
    } else {
        sanitized
    }
}

/// MQTT topic filter matching.
///
/// `+` matches exactly one level, a trailing `#` matches any number of
/// remaining levels (including none).
pub fn topic_matches(pattern: &str, topic: &str) -> bool {
    let mut pattern_levels = pattern.split(SEPARATOR);
    let mut topic_levels = topic.split(SEPARATOR);

    loop {
        match (pattern_levels.next(), topic_levels.next()) {
            (Some(WILDCARD_ALL), _) => return true,
            (Some(WILDCARD_ONE), Some(_)) => {}
            (Some(p), Some(t)) if p == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

/// True if `pattern` is a well-formed subscription filter.
pub fn is_valid_pattern(pattern: &str) -> bool {
    if pattern.is_empty() {
        return false;
    }
    let levels: Vec<&str> = pattern.split(SEPARATOR).collect();
    let last = levels.len() - 1;
    levels.iter().enumerate().all(|(i, level)| {
        if *level == WILDCARD_ALL {
            i == last
        } else {
            *level == WILDCARD_ONE || !level.contains(|c| matches!(c, '+' | '#'))
        }
    })
}

/// True if `topic` can be published to (no wildcards).
pub fn is_valid_topic(topic: &str) -> bool {
    !topic.is_empty() && !topic.contains(|c| matches!(c, '+' | '#'))
}
