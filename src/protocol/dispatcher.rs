//! Command registry and request dispatch
//!
//! Commands are registered as regular expressions over the whole request
//! line. The first registered pattern that matches wins; its named capture
//! groups are handed to the handler as [`Args`].
//!
//! A request goes through, in order: command list buffering, the empty
//! request check, the authentication gate, pattern dispatch, then the
//! trailing `OK` for top-level requests.

use regex::{Captures, Regex};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::str::FromStr;
use std::sync::Arc;

use super::error::AckError;
use super::response::Response;
use crate::bus::{Mailbox, Subsystem};
use crate::engine::Core;

pub type HandlerResult = Result<Response, AckError>;
pub type Handler = fn(&mut Context<'_>, &Args<'_>) -> HandlerResult;

pub const COMMAND_LIST_END: &str = "command_list_end";

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("pattern registered twice: {0}")]
    Duplicate(String),
    #[error("invalid pattern {pattern}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("pattern names no command: {0}")]
    Unnamed(String),
}

// =============================================================================
// Per-connection state seen by handlers
// =============================================================================

/// Commands queued between `command_list_begin` and `command_list_end`
#[derive(Debug, Clone, Default)]
pub struct CommandList {
    pub items: Vec<String>,
    /// Emit `list_OK` after each successful item
    pub list_ok: bool,
}

#[derive(Debug)]
pub struct SessionState {
    pub authenticated: bool,
    pub command_list: Option<CommandList>,
    /// Set while the items of a command list execute
    pub in_command_list: bool,
    pub subscriptions: BTreeSet<Subsystem>,
    pub close_requested: bool,
    pub mailbox: Arc<Mailbox>,
}

impl SessionState {
    pub fn new(mailbox: Arc<Mailbox>, authenticated: bool) -> Self {
        Self {
            authenticated,
            command_list: None,
            in_command_list: false,
            subscriptions: BTreeSet::new(),
            close_requested: false,
            mailbox,
        }
    }

    pub fn is_idle(&self) -> bool {
        !self.subscriptions.is_empty()
    }

    pub fn end_idle(&mut self) {
        self.subscriptions.clear();
    }
}

/// Everything a handler may touch while the core is locked
pub struct Context<'a> {
    pub core: &'a mut Core,
    pub session: &'a mut SessionState,
    pub registry: &'a CommandRegistry,
    pub password: Option<&'a str>,
}

// =============================================================================
// Handler arguments
// =============================================================================

/// Named captures of the matched pattern
pub struct Args<'t> {
    captures: Captures<'t>,
}

impl<'t> Args<'t> {
    pub fn get(&self, name: &str) -> Option<&'t str> {
        self.captures.name(name).map(|m| m.as_str())
    }

    pub fn required(&self, name: &str) -> Result<&'t str, AckError> {
        self.get(name)
            .ok_or_else(|| AckError::arg(format!("missing argument: {}", name)))
    }

    /// Parse an optional numeric argument
    pub fn parse<T: FromStr>(&self, name: &str) -> Result<Option<T>, AckError> {
        self.get(name)
            .map(|raw| {
                raw.parse::<T>()
                    .map_err(|_| AckError::arg(format!("Integer expected: {}", raw)))
            })
            .transpose()
    }

    pub fn int<T: FromStr>(&self, name: &str) -> Result<T, AckError> {
        self.parse(name)?
            .ok_or_else(|| AckError::arg(format!("missing argument: {}", name)))
    }

    /// `0`/`1` flag
    pub fn flag(&self, name: &str) -> Result<Option<bool>, AckError> {
        match self.get(name) {
            None => Ok(None),
            Some("0") => Ok(Some(false)),
            Some("1") => Ok(Some(true)),
            Some(other) => Err(AckError::arg(format!("Boolean (0/1) expected: {}", other))),
        }
    }
}

// =============================================================================
// Registry
// =============================================================================

struct Route {
    pattern: Regex,
    name: String,
    handler: Handler,
}

#[derive(Default)]
pub struct CommandRegistry {
    routes: Vec<Route>,
    sources: HashSet<String>,
    /// Command name -> whether it needs authentication
    commands: BTreeMap<String, bool>,
}

/// First lowercase word of a pattern, e.g. `playlistinfo` in `^playlistinfo "(?P<songpos>-?\d+)"$`
fn pattern_name(pattern: &str) -> Option<&str> {
    let start = pattern.find(|c: char| c.is_ascii_lowercase() || c == '_')?;
    let rest = &pattern[start..];
    let end = rest
        .find(|c: char| !(c.is_ascii_lowercase() || c == '_'))
        .unwrap_or(rest.len());
    Some(&rest[..end])
}

/// Leading token of a request line
fn request_name(request: &str) -> &str {
    request.split(' ').next().unwrap_or_default()
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command that requires authentication
    pub fn register(&mut self, pattern: &str, handler: Handler) -> Result<(), RegistryError> {
        self.add(pattern, handler, true)
    }

    /// Register a command reachable before authentication
    pub fn register_open(&mut self, pattern: &str, handler: Handler) -> Result<(), RegistryError> {
        self.add(pattern, handler, false)
    }

    fn add(&mut self, pattern: &str, handler: Handler, auth_required: bool) -> Result<(), RegistryError> {
        if !self.sources.insert(pattern.to_string()) {
            return Err(RegistryError::Duplicate(pattern.to_string()));
        }
        let name = pattern_name(pattern)
            .ok_or_else(|| RegistryError::Unnamed(pattern.to_string()))?
            .to_string();
        let compiled = Regex::new(pattern).map_err(|source| RegistryError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;

        let required = self.commands.entry(name.clone()).or_insert(auth_required);
        if *required != auth_required {
            tracing::warn!("Command {} registered with mixed auth requirements", name);
        }
        self.routes.push(Route {
            pattern: compiled,
            name,
            handler,
        });
        Ok(())
    }

    /// All command names with their auth requirement, sorted by name
    pub fn commands(&self) -> impl Iterator<Item = (&str, bool)> {
        self.commands.iter().map(|(name, auth)| (name.as_str(), *auth))
    }

    pub fn is_known(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Handle one request line and return the lines to send back.
    ///
    /// Returns nothing while a command list is buffering, when the session
    /// entered idle, and when the session asked to close.
    pub fn handle_request(&self, ctx: &mut Context<'_>, request: &str) -> Vec<String> {
        if let Some(list) = ctx.session.command_list.as_mut() {
            if request != COMMAND_LIST_END {
                list.items.push(request.to_string());
                return Vec::new();
            }
            let list = ctx.session.command_list.take().unwrap_or_default();
            return self.run_command_list(ctx, list);
        }

        match self.call(ctx, request, 0) {
            Ok(response) => {
                let mut lines = response.into_lines();
                let session = &ctx.session;
                if session.command_list.is_none() && !session.is_idle() && !session.close_requested {
                    lines.push("OK".to_string());
                }
                lines
            }
            Err(ack) => vec![ack.to_string()],
        }
    }

    fn run_command_list(&self, ctx: &mut Context<'_>, list: CommandList) -> Vec<String> {
        tracing::debug!("Running command list of {} commands", list.items.len());
        let mut lines = Vec::new();
        ctx.session.in_command_list = true;
        for (index, item) in list.items.iter().enumerate() {
            match self.call(ctx, item, index) {
                Ok(response) => {
                    lines.extend(response.into_lines());
                    if list.list_ok {
                        lines.push("list_OK".to_string());
                    }
                }
                Err(ack) => {
                    lines.push(ack.to_string());
                    ctx.session.in_command_list = false;
                    return lines;
                }
            }
            if ctx.session.close_requested {
                break;
            }
        }
        ctx.session.in_command_list = false;
        if !ctx.session.close_requested {
            lines.push("OK".to_string());
        }
        lines
    }

    /// Run one request through the auth gate and the pattern table
    fn call(&self, ctx: &mut Context<'_>, request: &str, index: usize) -> HandlerResult {
        let result = if request.trim().is_empty() {
            Err(AckError::no_command())
        } else {
            self.check_auth(ctx, request)
                .and_then(|()| self.dispatch(ctx, request))
        };
        result.map_err(|ack| {
            tracing::debug!("Request {:?} failed: {}", request, ack);
            ack.at_index(index)
        })
    }

    fn check_auth(&self, ctx: &Context<'_>, request: &str) -> Result<(), AckError> {
        if ctx.session.authenticated {
            return Ok(());
        }
        let name = request_name(request);
        match self.commands.get(name) {
            Some(false) => Ok(()),
            _ => Err(AckError::permission(name)),
        }
    }

    fn dispatch(&self, ctx: &mut Context<'_>, request: &str) -> HandlerResult {
        for route in &self.routes {
            if let Some(captures) = route.pattern.captures(request) {
                tracing::trace!("Request {:?} matched {}", request, route.pattern.as_str());
                let args = Args { captures };
                return (route.handler)(ctx, &args).map_err(|ack| ack.attribute_to(&route.name));
            }
        }

        let name = request_name(request);
        if self.is_known(name) {
            Err(AckError::arg("incorrect arguments").with_command(name))
        } else {
            Err(AckError::unknown_command(name))
        }
    }
}
