//! The JSON approval matcher: one matching decision per invocation.
//!
//! A match runs these phases in order, each reported at `debug` level:
//!
//! 1. detect cyclic types in the actual value;
//! 2. build the serialization profile and canonicalize the actual value;
//! 3. filter the actual tree and ensure an artifact exists (otherwise write a
//!    not-approved candidate and fail);
//! 4. load the approved tree and run the custom field matchers;
//! 5. filter the approved tree the same way and compare.
//!
//! On mismatch the approved artifact is overwritten only when the caller passes
//! `update_in_place`; the match then counts as passed.
//!
//! ## Usage
//! ```rust,no_run
//! use snapgate::matcher::{custom, JsonMatcher};
//! use snapgate::test_meta;
//!
//! #[derive(serde::Serialize)]
//! struct Order { id: u32, created_at: String }
//!
//! let order = Order { id: 7, created_at: "2024-05-01T10:00:00Z".into() };
//! JsonMatcher::new(test_meta!())
//!     .ignoring("created_at")
//!     .with("id", custom::not_null())
//!     .assert_approved(&order);
//! ```

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::canonical::Node;
use crate::compare::{compare, describe};
use crate::config::Settings;
use crate::cycles::{detect_cyclic_types, CycleSkip};
use crate::diagnostics::{render_report, Comparison};
use crate::encode::{canonicalize, canonicalize_plain};
use crate::filter::{Filter, PathSpec};
use crate::profile::{build_profile, SerializationProfile};
use crate::store::{
    ensure_artifact, load_approved, overwrite_approved, Ensured, Naming, SnapshotIdentity,
    TestMeta,
};
use crate::value::{to_value, TypeName, Value};
use crate::ApprovalError;

pub mod custom;

use custom::{Binding, FieldMatcher};

/// Successful outcome of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Actual and approved agree.
    Passed,
    /// They disagreed and the approved artifact was replaced.
    Updated,
}

/// Everything a matcher was told to ignore, check or encode specially.
#[derive(Clone, Default)]
pub struct MatcherConfiguration {
    pub ignored: Vec<PathSpec>,
    pub bindings: Vec<Binding>,
    pub cycle_skips: Vec<CycleSkip>,
    pub profile: Option<SerializationProfile>,
    pub naming: Naming,
}

impl fmt::Debug for MatcherConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatcherConfiguration")
            .field("ignored", &self.ignored)
            .field("bindings", &self.bindings)
            .field("cycle_skips", &self.cycle_skips.len())
            .field("profile", &self.profile)
            .field("naming", &self.naming)
            .finish()
    }
}

/// Compares a value against the approved JSON snapshot of one test.
#[derive(Debug, Clone)]
pub struct JsonMatcher {
    meta: TestMeta,
    config: MatcherConfiguration,
    settings: Settings,
}

impl JsonMatcher {
    pub fn new(meta: TestMeta) -> Self {
        Self {
            meta,
            config: MatcherConfiguration::default(),
            settings: Settings::default(),
        }
    }

    // ------------------------------------------------------------------------
    // Builders
    // ------------------------------------------------------------------------

    /// Excludes the field at a dot-delimited path.
    pub fn ignoring(mut self, path: impl Into<String>) -> Self {
        self.config.ignored.push(PathSpec::path(path));
        self
    }

    pub fn ignoring_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config
            .ignored
            .extend(paths.into_iter().map(PathSpec::path));
        self
    }

    /// Excludes every value whose runtime type is `T`.
    pub fn ignoring_type<T: ?Sized>(self) -> Self {
        self.ignoring_type_named(TypeName::of::<T>())
    }

    pub fn ignoring_type_named(mut self, type_name: impl Into<TypeName>) -> Self {
        self.config.ignored.push(PathSpec::type_rule(type_name));
        self
    }

    /// Excludes every field whose name fully matches `pattern`.
    pub fn ignoring_pattern(mut self, pattern: &str) -> Result<Self, ApprovalError> {
        self.config.ignored.push(PathSpec::pattern(pattern)?);
        Ok(self)
    }

    /// Checks the value at `path` with `matcher` instead of comparing it.
    pub fn with(mut self, path: impl Into<String>, matcher: impl FieldMatcher + 'static) -> Self {
        let path = path.into();
        self.config.ignored.push(PathSpec::path(path.clone()));
        self.config.bindings.push(Binding {
            path,
            matcher: Arc::new(matcher),
        });
        self
    }

    /// Keeps cycle detection out of values matching `skip`.
    ///
    /// Pair this with a custom encoder for those values in [`with_profile`](Self::with_profile).
    pub fn skip_cycle_check<F>(mut self, skip: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.config.cycle_skips.push(Arc::new(skip));
        self
    }

    pub fn with_profile(mut self, profile: SerializationProfile) -> Self {
        self.config.profile = Some(profile);
        self
    }

    /// Distinguishes the snapshots of a parameterized test.
    pub fn with_unique_id(mut self, id: impl Into<String>) -> Self {
        self.config.naming.unique_id = Some(id.into());
        self
    }

    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.config.naming.file_name = Some(name.into());
        self
    }

    pub fn with_path_name(mut self, dir: impl Into<std::path::PathBuf>) -> Self {
        self.config.naming.path_name = Some(dir.into());
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.config.naming.extension = extension.into();
        self
    }

    /// Applies loaded settings: artifact root, extension and the update default.
    ///
    /// A relative root resolves against the working directory, which is the
    /// package root under `cargo test`.
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.meta.root = settings.root.clone();
        self.config.naming.extension = settings.extension.clone();
        self.settings = settings;
        self
    }

    pub fn identity(&self) -> SnapshotIdentity {
        SnapshotIdentity::resolve(&self.meta, &self.config.naming)
    }

    // ------------------------------------------------------------------------
    // Matching
    // ------------------------------------------------------------------------

    pub fn matches<T: Serialize + ?Sized>(
        &self,
        actual: &T,
        update_in_place: bool,
    ) -> Result<Verdict, ApprovalError> {
        self.matches_value(&to_value(actual)?, update_in_place)
    }

    /// Matches JSON text; the text is parsed, not compared as a string.
    pub fn matches_json(&self, actual: &str, update_in_place: bool) -> Result<Verdict, ApprovalError> {
        self.matches_value(&Value::from_json_str(actual)?, update_in_place)
    }

    pub fn matches_value(
        &self,
        actual: &Value,
        update_in_place: bool,
    ) -> Result<Verdict, ApprovalError> {
        let id = self.identity();
        debug!(test = %id.comment_line(), "detecting cycles");
        let cyclic = detect_cyclic_types(actual, &self.config.cycle_skips);
        if !cyclic.is_empty() {
            debug!(types = ?cyclic, "cyclic types will be stubbed");
        }

        debug!("building serialization profile");
        let profile = build_profile(&cyclic, self.config.profile.as_ref());
        let actual_tree = canonicalize(actual, &profile)?;

        let filter = Filter::new(&self.config.ignored);
        let filtered_actual = filter.apply(&actual_tree);

        if ensure_artifact(&id, &filtered_actual.node)? == Ensured::Created {
            return Err(self.approval_missing(&id));
        }

        debug!(path = %id.approved_path().display(), "loading approved artifact");
        let approved = load_approved(&id)?;

        let failures = self.check_bindings(actual)?;
        if !failures.is_empty() {
            if update_in_place {
                return self.overwrite(&id, &filtered_actual.node);
            }
            warn!(test = %id.comment_line(), count = failures.len(), "custom matcher mismatch");
            return Err(custom_mismatch(failures));
        }

        debug!("comparing filtered trees");
        let expected = filter.apply_mirrored(&approved, &filtered_actual.excluded);
        let differences = compare(&expected, &filtered_actual.node);
        if differences.is_empty() {
            debug!(test = %id.comment_line(), "snapshot matches");
            return Ok(Verdict::Passed);
        }
        if update_in_place {
            return self.overwrite(&id, &filtered_actual.node);
        }

        warn!(test = %id.comment_line(), count = differences.len(), "snapshot mismatch");
        Err(ApprovalError::StructuralMismatch {
            comparison: Comparison {
                expected: expected.to_pretty_string(),
                actual: filtered_actual.node.to_pretty_string(),
                message: format!(
                    "Expected file {}\n{}",
                    id.display(&id.approved_file_name()),
                    describe(&differences)
                ),
            },
            help: Some(format!(
                "If the new output is correct, rerun with {}=true to update the approved file.",
                crate::config::UPDATE_IN_PLACE_ENV
            )),
        })
    }

    /// Like [`matches`](Self::matches) but panics with a rendered report on failure.
    ///
    /// The update-in-place flag is resolved at call time: the environment
    /// first, then the settings given to [`with_settings`](Self::with_settings).
    pub fn assert_approved<T: Serialize + ?Sized>(&self, actual: &T) {
        let result = self.matches(actual, self.settings.update_in_place_now());
        if let Err(error) = result {
            panic!("{}", render_report(error));
        }
    }

    pub fn assert_value(&self, actual: &Value) {
        let result = self.matches_value(actual, self.settings.update_in_place_now());
        if let Err(error) = result {
            panic!("{}", render_report(error));
        }
    }

    pub fn assert_json(&self, actual: &str) {
        let result = self.matches_json(actual, self.settings.update_in_place_now());
        if let Err(error) = result {
            panic!("{}", render_report(error));
        }
    }

    /// The filtered approved JSON, followed by one line per custom matcher.
    pub fn describe(&self) -> Result<String, ApprovalError> {
        let id = self.identity();
        let mut out = if id.approved_path().is_file() {
            let approved = load_approved(&id)?;
            Filter::new(&self.config.ignored)
                .apply(&approved)
                .node
                .to_pretty_string()
        } else {
            format!("<no approved file {}>", id.display(&id.approved_file_name()))
        };
        for binding in &self.config.bindings {
            out.push_str(&format!("\nand {} {}", binding.path, binding.matcher.describe()));
        }
        Ok(out)
    }

    // ------------------------------------------------------------------------
    // Phases
    // ------------------------------------------------------------------------

    fn approval_missing(&self, id: &SnapshotIdentity) -> ApprovalError {
        let created = id.not_approved_path();
        info!(path = %created.display(), "approval required");
        ApprovalError::ApprovalMissing {
            message: format!(
                "Not approved file created: '{}'; please verify its contents and rename it to '{}'.",
                id.display(&id.not_approved_file_name()),
                id.approved_file_name()
            ),
            created,
            approved: id.approved_path(),
            help: Some("Or run `snapgate approve` to promote every pending file.".to_string()),
        }
    }

    /// Runs every binding in declaration order and collects all failures.
    fn check_bindings(&self, actual: &Value) -> Result<Vec<BindingFailure>, ApprovalError> {
        let mut failures = Vec::new();
        for binding in &self.config.bindings {
            let value = actual.find_at(&binding.path);
            if binding.matcher.matches(&value) {
                continue;
            }
            debug!(path = %binding.path, "custom matcher rejected value");
            failures.push(BindingFailure {
                path: binding.path.clone(),
                description: binding.matcher.describe(),
                mismatch: binding.matcher.describe_mismatch(&value),
                snippet: canonicalize_plain(&value)?,
            });
        }
        Ok(failures)
    }

    fn overwrite(&self, id: &SnapshotIdentity, content: &Node) -> Result<Verdict, ApprovalError> {
        overwrite_approved(id, content)?;
        info!(test = %id.comment_line(), "approved snapshot updated in place");
        Ok(Verdict::Updated)
    }
}

struct BindingFailure {
    path: String,
    description: String,
    mismatch: String,
    snippet: Node,
}

fn custom_mismatch(failures: Vec<BindingFailure>) -> ApprovalError {
    let mut message = Vec::with_capacity(failures.len());
    let mut expected = Vec::with_capacity(failures.len());
    let mut actual = Vec::with_capacity(failures.len());
    for failure in &failures {
        let mut line = format!("{} {}: {}", failure.path, failure.description, failure.mismatch);
        if !failure.snippet.is_primitive_or_null() {
            line.push('\n');
            line.push_str(&failure.snippet.to_pretty_string());
        }
        message.push(line);
        expected.push(format!("{} {}", failure.path, failure.description));
        actual.push(format!("{} {}", failure.path, failure.snippet));
    }
    ApprovalError::CustomMatcherMismatch {
        comparison: Comparison {
            expected: expected.join("\n"),
            actual: actual.join("\n"),
            message: message.join("\n"),
        },
        help: None,
    }
}
