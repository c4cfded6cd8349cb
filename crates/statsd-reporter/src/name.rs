//! Structured metric names and their flat dotted form.

use std::fmt;

use error_stack::Report;

use crate::error::ReporterError;
use crate::error::ReporterResult;

/// Hierarchical metric identifier: `group`, `type`, optional `scope`, `name`.
///
/// Ordering is field-wise, which is the iteration order of a registry snapshot.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MetricName {
    group: String,
    kind: String,
    scope: Option<String>,
    name: String,
}

impl MetricName {
    /// Create a name without scope.
    ///
    /// # Errors
    ///
    /// Returns [`ReporterError::InvalidMetricName`] when any component is empty.
    pub fn new(
        group: impl Into<String>,
        kind: impl Into<String>,
        name: impl Into<String>,
    ) -> ReporterResult<Self> {
        let metric_name = Self {
            group: group.into(),
            kind: kind.into(),
            scope: None,
            name: name.into(),
        };
        metric_name.validate()?;
        Ok(metric_name)
    }

    /// Create a name with a scope.
    pub fn scoped(
        group: impl Into<String>,
        kind: impl Into<String>,
        name: impl Into<String>,
        scope: impl Into<String>,
    ) -> ReporterResult<Self> {
        Self::new(group, kind, name)?.with_scope(scope)
    }

    /// Derive `group` and `type` from the module path and simple name of `T`.
    ///
    /// `my_app::db::Pool` becomes group `my_app.db`, type `Pool`.
    pub fn for_type<T: ?Sized>(name: impl Into<String>) -> ReporterResult<Self> {
        let full = std::any::type_name::<T>();
        // strip generic parameters before splitting the path
        let path = full.split('<').next().unwrap_or(full);
        match path.rsplit_once("::") {
            Some((module, simple)) => Self::new(module.replace("::", "."), simple, name),
            None => Self::new("", path, name),
        }
    }

    /// Attach a scope, replacing any existing one.
    pub fn with_scope(mut self, scope: impl Into<String>) -> ReporterResult<Self> {
        let scope = scope.into();
        if scope.is_empty() {
            return Err(Report::new(ReporterError::invalid_name("scope is empty")));
        }
        self.scope = Some(scope);
        Ok(self)
    }

    fn validate(&self) -> ReporterResult<()> {
        for (field, value) in [
            ("group", &self.group),
            ("type", &self.kind),
            ("name", &self.name),
        ] {
            if value.is_empty() {
                return Err(Report::new(ReporterError::invalid_name(format!(
                    "{field} is empty"
                )))
                .attach_printable(format!("{self:?}")));
            }
        }
        Ok(())
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Flatten to `group.type[.scope].name`.
    ///
    /// Components are not escaped: a component containing `.` makes the
    /// result ambiguous.
    pub fn sanitize(&self) -> String {
        let scope_len = self.scope.as_ref().map_or(0, |s| s.len() + 1);
        let mut out =
            String::with_capacity(self.group.len() + self.kind.len() + self.name.len() + 2 + scope_len);
        out.push_str(&self.group);
        out.push('.');
        out.push_str(&self.kind);
        out.push('.');
        if let Some(scope) = &self.scope {
            out.push_str(scope);
            out.push('.');
        }
        out.push_str(&self.name);
        out
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sanitize())
    }
}

/// Free-function form of [`MetricName::sanitize`].
pub fn sanitize(name: &MetricName) -> String {
    name.sanitize()
}
