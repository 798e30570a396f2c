// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Tracing runtime control.

use ordermap::{OrderMap, OrderSet};
use std::fmt::Display;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, OnceLock};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, Registry, filter::LevelFilter, prelude::*, reload};

use crate::{targets::TRACING_TARGETS, trace_target};

trace_target!("tracectl", LevelFilter::INFO, &[]);

/// Errors when reconfiguring tracing
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TraceCtlError {
    #[error("Invalid syntax '{0}': expected tag=level")]
    Syntax(String),
    #[error("Invalid level '{0}'")]
    Level(String),
    #[error("Unknown tag '{0}'")]
    UnknownTag(String),
}

#[derive(Debug, Clone)]
pub struct TargetCfg {
    pub target: &'static str,
    pub name: &'static str,
    pub level: LevelFilter,
    pub tags: Vec<&'static str>,
}

#[derive(Debug)]
struct TargetDb {
    default: LevelFilter,
    targets: OrderMap<&'static str, TargetCfg>,
    tags: OrderMap<&'static str, OrderSet<&'static str>>,
}

impl TargetDb {
    fn load(default: LevelFilter) -> Self {
        let mut db = Self {
            default,
            targets: OrderMap::new(),
            tags: OrderMap::new(),
        };
        for declared in TRACING_TARGETS {
            // the target name doubles as a tag
            let mut tags = declared.tags.to_vec();
            if !tags.contains(&declared.name) {
                tags.push(declared.name);
            }
            for tag in &tags {
                db.tags.entry(tag).or_default().insert(declared.target);
            }
            let cfg = TargetCfg {
                target: declared.target,
                name: declared.name,
                level: declared.level,
                tags,
            };
            if db.targets.insert(declared.target, cfg).is_some() {
                warn!("Tracing target {} declared more than once", declared.target);
            }
        }
        db
    }

    fn env_filter(&self) -> EnvFilter {
        self.targets.values().fold(
            EnvFilter::default().add_directive(self.default.into()),
            |filter, cfg| match format!("{}={}", cfg.target, cfg.level).parse() {
                Ok(directive) => filter.add_directive(directive),
                Err(_) => filter,
            },
        )
    }

    fn set_tag_level(&mut self, tag: &str, level: LevelFilter) -> Result<usize, TraceCtlError> {
        let targets = self
            .tags
            .get(tag)
            .ok_or_else(|| TraceCtlError::UnknownTag(tag.to_string()))?;
        let mut changed = 0;
        for target in targets {
            if let Some(cfg) = self.targets.get_mut(target)
                && cfg.level != level
            {
                cfg.level = level;
                changed += 1;
            }
        }
        Ok(changed)
    }
}

impl Display for TargetDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{:>40} │ {:>8} │ TAGS", "TARGET", "LEVEL")?;
        for cfg in self.targets.values() {
            writeln!(f, "{:>40} │ {:>8} │ {}", cfg.target, cfg.level, cfg.tags.join(","))?;
        }
        write!(f, "{:>40} │ {:>8} │ --", "(default)", self.default)
    }
}

/// Owner of the tracing subscriber and of the per-target levels.
pub struct TracingControl {
    db: Mutex<TargetDb>,
    reload_filter: reload::Handle<EnvFilter, Registry>,
}

impl TracingControl {
    fn new() -> Self {
        let db = TargetDb::load(LevelFilter::INFO);
        let (filter, reload_filter) = reload::Layer::new(db.env_filter());
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_line_number(true)
            .with_target(true)
            .with_thread_names(true)
            .with_level(true);
        if let Err(e) = tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()
        {
            // Another subscriber (e.g. a test harness) owns the process; levels set
            // here are still recorded.
            warn!("Tracing subscriber not installed: {e}");
        }
        Self {
            db: Mutex::new(db),
            reload_filter,
        }
    }

    fn db(&self) -> MutexGuard<'_, TargetDb> {
        self.db.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn reload(&self, db: &TargetDb) {
        if let Err(e) = self.reload_filter.reload(db.env_filter()) {
            warn!("Failed to reload tracing filter: {e}");
        }
    }

    /// Install the subscriber, if not done yet.
    pub fn init() {
        get_trace_ctl();
    }

    /// Set the level of every target carrying `tag`.
    ///
    /// # Errors
    ///
    /// Fails if no target carries `tag`.
    pub fn set_tag_level(&self, tag: &str, level: LevelFilter) -> Result<(), TraceCtlError> {
        let mut db = self.db();
        let changed = db.set_tag_level(tag, level)?;
        if changed > 0 {
            self.reload(&db);
        }
        info!("Log level for tag '{tag}' is now {level} ({changed} targets changed)");
        Ok(())
    }

    /// Set the level used by targets not declared with `trace_target!`.
    pub fn set_default_level(&self, level: LevelFilter) {
        let mut db = self.db();
        if db.default != level {
            db.default = level;
            self.reload(&db);
        }
    }

    #[must_use]
    pub fn default_level(&self) -> LevelFilter {
        self.db().default
    }

    #[must_use]
    pub fn target(&self, target: &str) -> Option<TargetCfg> {
        self.db().targets.get(target).cloned()
    }

    #[must_use]
    pub fn targets_by_tag(&self, tag: &str) -> Vec<TargetCfg> {
        let db = self.db();
        db.tags
            .get(tag)
            .map(|targets| {
                targets
                    .iter()
                    .filter_map(|t| db.targets.get(t).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Configure levels from a string like `default=warn,vtn=debug,mactable=trace`.
    ///
    /// # Errors
    ///
    /// Fails on bad syntax, unknown levels or unknown tags. Nothing is changed then.
    pub fn setup_from_string(&self, input: &str) -> Result<(), TraceCtlError> {
        let mut config = OrderMap::new();
        for item in input.split(',').map(str::trim).filter(|i| !i.is_empty()) {
            let (tag, level) = item
                .split_once('=')
                .ok_or_else(|| TraceCtlError::Syntax(item.to_string()))?;
            let level = LevelFilter::from_str(level.trim())
                .map_err(|_| TraceCtlError::Level(level.trim().to_string()))?;
            config.insert(tag.trim(), level);
        }
        let mut db = self.db();
        if let Some(unknown) = config
            .keys()
            .find(|tag| **tag != "default" && !db.tags.contains_key(**tag))
        {
            return Err(TraceCtlError::UnknownTag((*unknown).to_string()));
        }
        for (tag, level) in config {
            if tag == "default" {
                db.default = level;
            } else {
                db.set_tag_level(tag, level)?;
            }
        }
        self.reload(&db);
        Ok(())
    }

    /// Log the current configuration.
    pub fn dump(&self) {
        info!("\n{}", *self.db());
    }
}

/// Get the process-wide [`TracingControl`], installing the subscriber on first use.
pub fn get_trace_ctl() -> &'static TracingControl {
    static TRACING_CTL: OnceLock<TracingControl> = OnceLock::new();
    TRACING_CTL.get_or_init(TracingControl::new)
}

#[cfg(test)]
mod tests {
    use super::{TraceCtlError, get_trace_ctl};
    use crate::{LevelFilter, trace_target};
    use serial_test::serial;

    mod first {
        use crate::{LevelFilter, trace_target};
        trace_target!("test-first", LevelFilter::DEBUG, &["test-common"]);
    }
    mod second {
        use crate::{LevelFilter, trace_target};
        trace_target!("test-second", LevelFilter::ERROR, &["test-common"]);
    }
    trace_target!("test-root", LevelFilter::WARN, &[]);

    #[test]
    #[serial]
    fn declared_targets_are_loaded() {
        let tctl = get_trace_ctl();
        let root = tctl.target(module_path!()).unwrap();
        assert_eq!(root.name, "test-root");
        assert!(root.tags.contains(&"test-root"));
        let common: Vec<_> = tctl
            .targets_by_tag("test-common")
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert!(common.contains(&"test-first"));
        assert!(common.contains(&"test-second"));
    }

    #[test]
    #[serial]
    fn tag_level_applies_to_all_its_targets() {
        let tctl = get_trace_ctl();
        tctl.set_tag_level("test-common", LevelFilter::OFF).unwrap();
        for target in tctl.targets_by_tag("test-common") {
            assert_eq!(target.level, LevelFilter::OFF);
        }
        assert_eq!(
            tctl.set_tag_level("no-such-tag", LevelFilter::OFF),
            Err(TraceCtlError::UnknownTag("no-such-tag".to_string()))
        );
    }

    #[test]
    #[serial]
    fn setup_from_string() {
        let tctl = get_trace_ctl();
        tctl.setup_from_string("default=warn, test-first=trace,test-root=error")
            .unwrap();
        assert_eq!(tctl.default_level(), LevelFilter::WARN);
        assert_eq!(
            tctl.targets_by_tag("test-first")[0].level,
            LevelFilter::TRACE
        );
        assert_eq!(tctl.target(module_path!()).unwrap().level, LevelFilter::ERROR);

        assert!(matches!(
            tctl.setup_from_string("test-root=loud"),
            Err(TraceCtlError::Level(_))
        ));
        assert!(matches!(
            tctl.setup_from_string("test-root=info, oops"),
            Err(TraceCtlError::Syntax(_))
        ));
        // nothing changed by the failed attempts
        assert_eq!(tctl.target(module_path!()).unwrap().level, LevelFilter::ERROR);
    }
}
