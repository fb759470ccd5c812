//! Column role resolution.
//!
//! Maps the labels of a [`RawTable`](crate::raw::RawTable) onto the canonical
//! roles the pipeline understands. Each role is described by a [`RoleRule`]:
//! a ranked keyword list searched as case-sensitive substrings, optional
//! exclusion tokens, and a positional fallback for required roles.
//!
//! Resolution is pure. The first column in table order matching the
//! highest-ranked keyword wins. A required role with no keyword match falls
//! back to its positional index; if that index is past the last column the
//! whole binding fails with a [`StructuralError`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::StructuralError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Company,
    PeriodLabel,
    Metric,
    Month,
    Year,
    Numerator,
    Denominator,
}

impl Role {
    pub const REQUIRED: [Role; 5] = [
        Role::Company,
        Role::PeriodLabel,
        Role::Metric,
        Role::Month,
        Role::Year,
    ];

    pub const OPTIONAL: [Role; 2] = [Role::Numerator, Role::Denominator];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Company => "company",
            Role::PeriodLabel => "period_label",
            Role::Metric => "metric",
            Role::Month => "month",
            Role::Year => "year",
            Role::Numerator => "numerator",
            Role::Denominator => "denominator",
        }
    }

    pub fn is_required(self) -> bool {
        Role::REQUIRED.contains(&self)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRule {
    pub role: Role,
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_index: Option<usize>,
}

impl RoleRule {
    fn new(role: Role, keywords: &[&str], exclude: &[&str], fallback_index: Option<usize>) -> Self {
        Self {
            role,
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            exclude: exclude.iter().map(|k| k.to_string()).collect(),
            fallback_index,
        }
    }

    fn excludes(&self, label: &str) -> bool {
        let lowered = label.to_lowercase();
        self.exclude
            .iter()
            .any(|token| lowered.contains(&token.to_lowercase()))
    }

    /// Returns the matched column index and the keyword that matched it.
    fn search<'a>(&'a self, labels: &[String], taken: &[usize]) -> Option<(usize, &'a str)> {
        self.keywords.iter().find_map(|keyword| {
            labels
                .iter()
                .enumerate()
                .find(|(idx, label)| {
                    !taken.contains(idx) && label.contains(keyword.as_str()) && !self.excludes(label)
                })
                .map(|(idx, _)| (idx, keyword.as_str()))
        })
    }
}

/// The layout observed across the published usage sheets.
pub fn default_rules() -> Vec<RoleRule> {
    vec![
        RoleRule::new(Role::Company, &["Empresa", "Nombre"], &[], Some(0)),
        RoleRule::new(Role::PeriodLabel, &["Semana"], &[], Some(1)),
        RoleRule::new(Role::Metric, &["%", "Usabilidad", "Engagement"], &[], Some(7)),
        RoleRule::new(Role::Month, &["Mes"], &["total"], Some(9)),
        RoleRule::new(Role::Year, &["Año", "Anio"], &[], Some(11)),
        RoleRule::new(Role::Numerator, &["Usos", "Usuarios activos"], &[], None),
        RoleRule::new(Role::Denominator, &["Elegibles", "Población", "Poblacion"], &[], None),
    ]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "via", rename_all = "snake_case")]
pub enum Resolution {
    Keyword { keyword: String },
    Positional { index: usize },
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Keyword { keyword } => write!(f, "keyword '{keyword}'"),
            Resolution::Positional { index } => write!(f, "position {index}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoundColumn {
    pub role: Role,
    pub label: String,
    pub index: usize,
    pub resolution: Resolution,
}

/// A complete binding: every required role has a column, optional roles may
/// be absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnBinding {
    pub company: BoundColumn,
    pub period_label: BoundColumn,
    pub metric: BoundColumn,
    pub month: BoundColumn,
    pub year: BoundColumn,
    pub numerator: Option<BoundColumn>,
    pub denominator: Option<BoundColumn>,
}

impl ColumnBinding {
    pub fn get(&self, role: Role) -> Option<&BoundColumn> {
        match role {
            Role::Company => Some(&self.company),
            Role::PeriodLabel => Some(&self.period_label),
            Role::Metric => Some(&self.metric),
            Role::Month => Some(&self.month),
            Role::Year => Some(&self.year),
            Role::Numerator => self.numerator.as_ref(),
            Role::Denominator => self.denominator.as_ref(),
        }
    }

    /// Bound columns in role order, skipping unbound optional roles.
    pub fn iter(&self) -> impl Iterator<Item = &BoundColumn> {
        Role::REQUIRED
            .into_iter()
            .chain(Role::OPTIONAL)
            .filter_map(|role| self.get(role))
    }

    pub fn supports_weighting(&self) -> bool {
        self.denominator.is_some()
    }
}

/// Resolves every role in `rules` against `labels`.
///
/// Rules for roles missing from `rules` fall back to [`default_rules`].
pub fn resolve_binding(
    labels: &[String],
    rules: &[RoleRule],
) -> Result<ColumnBinding, StructuralError> {
    if labels.is_empty() {
        return Err(StructuralError::NoColumns);
    }
    let defaults = default_rules();
    let rule_for = |role: Role| -> RoleRule {
        rules
            .iter()
            .find(|rule| rule.role == role)
            .or_else(|| defaults.iter().find(|rule| rule.role == role))
            .cloned()
            .unwrap_or_else(|| RoleRule::new(role, &[], &[], None))
    };

    let company = resolve_required(labels, &rule_for(Role::Company))?;
    let period_label = resolve_required(labels, &rule_for(Role::PeriodLabel))?;
    let metric = resolve_required(labels, &rule_for(Role::Metric))?;
    let month = resolve_required(labels, &rule_for(Role::Month))?;
    let year = resolve_required(labels, &rule_for(Role::Year))?;

    let taken = [
        company.index,
        period_label.index,
        metric.index,
        month.index,
        year.index,
    ];
    let numerator = resolve_optional(labels, &rule_for(Role::Numerator), &taken);
    let denominator = resolve_optional(labels, &rule_for(Role::Denominator), &taken);

    Ok(ColumnBinding {
        company,
        period_label,
        metric,
        month,
        year,
        numerator,
        denominator,
    })
}

fn resolve_required(labels: &[String], rule: &RoleRule) -> Result<BoundColumn, StructuralError> {
    if let Some((index, keyword)) = rule.search(labels, &[]) {
        return Ok(BoundColumn {
            role: rule.role,
            label: labels[index].clone(),
            index,
            resolution: Resolution::Keyword {
                keyword: keyword.to_string(),
            },
        });
    }
    let index = rule.fallback_index.unwrap_or(usize::MAX);
    match labels.get(index) {
        Some(label) => Ok(BoundColumn {
            role: rule.role,
            label: label.clone(),
            index,
            resolution: Resolution::Positional { index },
        }),
        None => Err(StructuralError::MissingRole {
            role: rule.role,
            index,
            available: labels.len(),
        }),
    }
}

fn resolve_optional(labels: &[String], rule: &RoleRule, taken: &[usize]) -> Option<BoundColumn> {
    rule.search(labels, taken).map(|(index, keyword)| BoundColumn {
        role: rule.role,
        label: labels[index].clone(),
        index,
        resolution: Resolution::Keyword {
            keyword: keyword.to_string(),
        },
    })
}
