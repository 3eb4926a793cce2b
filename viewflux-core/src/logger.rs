//! Action logging with pattern filtering and an optional in-memory history
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use viewflux_core::logger::{ActionLogConfig, ActionLoggerConfig, ActionLoggerMiddleware};
//! use viewflux_core::{Action, Middleware};
//!
//! let mut logger = ActionLoggerMiddleware::with_log(ActionLogConfig::new(
//!     10,
//!     ActionLoggerConfig::new(Some("user.*"), None),
//! ));
//!
//! let save = Action::new("user.save", json!({ "id": 1 }));
//! logger.before(&save);
//! logger.after(&save, true);
//!
//! let entry = logger.log().unwrap().recent(1).next().unwrap();
//! assert_eq!(entry.action_type, "user.save");
//! assert_eq!(entry.reduced, Some(true));
//! ```

use std::collections::VecDeque;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::store::Middleware;
use crate::Action;

const SUMMARY_LIMIT: usize = 80;

/// Include/exclude filter over action types
///
/// Patterns are globs: `*` matches any run of characters, `?` exactly one.
/// An empty include list admits everything; excludes are applied after.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionLoggerConfig {
    #[serde(default)]
    pub include_patterns: Vec<String>,
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
}

fn split_patterns(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect()
}

impl ActionLoggerConfig {
    /// Build from comma-separated pattern lists
    ///
    /// ```
    /// use viewflux_core::logger::ActionLoggerConfig;
    ///
    /// let config = ActionLoggerConfig::new(Some("user.*, session.open"), Some("*.poll"));
    /// assert!(config.should_log("user.save"));
    /// assert!(config.should_log("session.open"));
    /// assert!(!config.should_log("user.poll"));
    /// assert!(!config.should_log("cart.add"));
    /// ```
    pub fn new(include: Option<&str>, exclude: Option<&str>) -> Self {
        Self {
            include_patterns: include.map(split_patterns).unwrap_or_default(),
            exclude_patterns: exclude.map(split_patterns).unwrap_or_default(),
        }
    }

    pub fn with_patterns(include: Vec<String>, exclude: Vec<String>) -> Self {
        Self {
            include_patterns: include,
            exclude_patterns: exclude,
        }
    }

    pub fn should_log(&self, action_type: &str) -> bool {
        let included = self.include_patterns.is_empty()
            || self
                .include_patterns
                .iter()
                .any(|p| glob_match(p, action_type));

        included
            && !self
                .exclude_patterns
                .iter()
                .any(|p| glob_match(p, action_type))
    }
}

/// One recorded action
#[derive(Debug, Clone)]
pub struct ActionLogEntry {
    pub action_type: String,
    /// Payload rendered as compact JSON, truncated
    pub summary: String,
    pub timestamp: Instant,
    /// Monotonic position in the log, starting at zero
    pub sequence: u64,
    /// Whether the reducer ran; `Some(false)` for schema rejections
    pub reduced: Option<bool>,
}

impl ActionLogEntry {
    pub fn new(action: &Action, sequence: u64) -> Self {
        Self {
            action_type: action.action_type.clone(),
            summary: summarize(action),
            timestamp: Instant::now(),
            sequence,
            reduced: None,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.timestamp.elapsed()
    }

    /// Elapsed time as `150ms` or `2.3s`
    pub fn elapsed_display(&self) -> String {
        let elapsed = self.elapsed();
        if elapsed < Duration::from_secs(1) {
            format!("{}ms", elapsed.as_millis())
        } else {
            format!("{:.1}s", elapsed.as_secs_f64())
        }
    }
}

fn summarize(action: &Action) -> String {
    let data = action.data.to_string();
    if data.chars().count() <= SUMMARY_LIMIT {
        return data;
    }
    let mut cut: String = data.chars().take(SUMMARY_LIMIT).collect();
    cut.push('…');
    cut
}

/// Sizing and filtering of an [`ActionLog`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionLogConfig {
    pub capacity: usize,
    pub filter: ActionLoggerConfig,
}

impl Default for ActionLogConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            filter: ActionLoggerConfig::default(),
        }
    }
}

impl ActionLogConfig {
    pub fn new(capacity: usize, filter: ActionLoggerConfig) -> Self {
        Self { capacity, filter }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Default::default()
        }
    }
}

/// Ring buffer of recent actions, oldest dropped first
#[derive(Debug, Clone)]
pub struct ActionLog {
    entries: VecDeque<ActionLogEntry>,
    config: ActionLogConfig,
    next_sequence: u64,
}

impl Default for ActionLog {
    fn default() -> Self {
        Self::new(ActionLogConfig::default())
    }
}

impl ActionLog {
    pub fn new(config: ActionLogConfig) -> Self {
        Self {
            entries: VecDeque::with_capacity(config.capacity),
            config,
            next_sequence: 0,
        }
    }

    /// Record an action if the filter admits it
    pub fn record(&mut self, action: &Action) -> Option<&ActionLogEntry> {
        if self.config.capacity == 0 || !self.config.filter.should_log(action.name()) {
            return None;
        }

        while self.entries.len() >= self.config.capacity {
            self.entries.pop_front();
        }
        self.entries
            .push_back(ActionLogEntry::new(action, self.next_sequence));
        self.next_sequence += 1;
        self.entries.back()
    }

    /// Set the outcome of the newest entry
    pub fn mark_last(&mut self, reduced: bool) {
        if let Some(entry) = self.entries.back_mut() {
            entry.reduced = Some(reduced);
        }
    }

    /// Oldest first
    pub fn entries(&self) -> impl Iterator<Item = &ActionLogEntry> {
        self.entries.iter()
    }

    /// Newest first, at most `count`
    pub fn recent(&self, count: usize) -> impl Iterator<Item = &ActionLogEntry> {
        self.entries.iter().rev().take(count)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn config(&self) -> &ActionLogConfig {
        &self.config
    }
}

/// Middleware that traces reduced actions and optionally keeps an [`ActionLog`]
#[derive(Debug, Clone)]
pub struct ActionLoggerMiddleware {
    filter: ActionLoggerConfig,
    log: Option<ActionLog>,
    recorded_current: bool,
    active: bool,
}

impl Default for ActionLoggerMiddleware {
    fn default() -> Self {
        Self::new(ActionLoggerConfig::default())
    }
}

impl ActionLoggerMiddleware {
    /// Tracing only
    pub fn new(filter: ActionLoggerConfig) -> Self {
        Self {
            filter,
            log: None,
            recorded_current: false,
            active: true,
        }
    }

    /// Tracing plus in-memory history
    pub fn with_log(config: ActionLogConfig) -> Self {
        Self {
            filter: config.filter.clone(),
            log: Some(ActionLog::new(config)),
            recorded_current: false,
            active: true,
        }
    }

    /// Turn the middleware into a no-op, e.g. behind a `--debug` flag
    pub fn active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn log(&self) -> Option<&ActionLog> {
        self.log.as_ref()
    }

    pub fn log_mut(&mut self) -> Option<&mut ActionLog> {
        self.log.as_mut()
    }

    pub fn filter(&self) -> &ActionLoggerConfig {
        &self.filter
    }
}

impl Middleware for ActionLoggerMiddleware {
    fn before(&mut self, action: &Action) {
        if !self.active {
            return;
        }

        if self.filter.should_log(action.name()) {
            tracing::debug!(action = %action.name(), data = %summarize(action), "action");
        }

        self.recorded_current = self
            .log
            .as_mut()
            .is_some_and(|log| log.record(action).is_some());
    }

    fn after(&mut self, _action: &Action, reduced: bool) {
        if !self.active || !self.recorded_current {
            return;
        }
        if let Some(log) = self.log.as_mut() {
            log.mark_last(reduced);
        }
    }
}

/// Glob match supporting `*` and `?`
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let (mut p, mut t) = (0, 0);
    // Position of the last `*` and the text index it currently absorbs up to
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some('*') => {
                backtrack = Some((p, t));
                p += 1;
            }
            Some(&c) if c == '?' || c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match backtrack {
                Some((star, absorbed)) => {
                    p = star + 1;
                    t = absorbed + 1;
                    backtrack = Some((star, absorbed + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}
