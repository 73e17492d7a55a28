//! The rule catalog: groups, rules, and the command patterns under them.
//!
//! The catalog is edited by the dashboard's CRUD layer. The engine never
//! caches it across requests -- each query loads a fresh [`CatalogSnapshot`]
//! from storage so that edits are visible on the next call.

use serde::{Deserialize, Serialize};

/// A plain substring matched against log text. Not a regex, not a glob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandPattern {
    pub id: i64,
    pub pattern: String,
    /// Notification template bound directly to this pattern, if any.
    #[serde(default)]
    pub template_id: Option<i64>,
}

/// A named rule holding one or more command patterns. Belongs to exactly
/// one group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub template_id: Option<i64>,
    pub commands: Vec<CommandPattern>,
}

/// A named container of rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleGroup {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub template_id: Option<i64>,
    pub rules: Vec<Rule>,
}

/// One command pattern in its full group/rule context.
#[derive(Debug, Clone, Copy)]
pub struct CommandRef<'a> {
    pub group: &'a RuleGroup,
    pub rule: &'a Rule,
    pub command: &'a CommandPattern,
}

impl CommandRef<'_> {
    /// Notification template for this pattern: the pattern's own binding
    /// wins, then the rule's, then the group's.
    pub fn template_id(&self) -> Option<i64> {
        self.command
            .template_id
            .or(self.rule.template_id)
            .or(self.group.template_id)
    }
}

/// Read-only view of the full group -> rule -> command tree, loaded once per
/// request. Holding it as a value (rather than a shared cache) is what makes
/// concurrent rule edits safe: each request sees one consistent snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    pub groups: Vec<RuleGroup>,
}

impl CatalogSnapshot {
    pub fn new(groups: Vec<RuleGroup>) -> Self {
        Self { groups }
    }

    /// True when no usable (non-blank) pattern exists anywhere in the tree.
    pub fn is_empty(&self) -> bool {
        self.commands().next().is_none()
    }

    /// Iterate every non-blank command pattern with its group/rule context.
    /// Blank patterns are skipped here so no match path ever sees one.
    pub fn commands(&self) -> impl Iterator<Item = CommandRef<'_>> {
        self.groups.iter().flat_map(|group| {
            group.rules.iter().flat_map(move |rule| {
                rule.commands
                    .iter()
                    .filter(|c| !c.pattern.trim().is_empty())
                    .map(move |command| CommandRef {
                        group,
                        rule,
                        command,
                    })
            })
        })
    }

    /// Narrow the snapshot to the given group and/or rule ids. An empty id
    /// slice means "no constraint" for that level; unknown ids simply select
    /// nothing -- absence of rules is a valid steady state, not a fault.
    pub fn filtered(&self, group_ids: &[i64], rule_ids: &[i64]) -> CatalogSnapshot {
        let groups = self
            .groups
            .iter()
            .filter(|g| group_ids.is_empty() || group_ids.contains(&g.id))
            .map(|g| {
                let rules = g
                    .rules
                    .iter()
                    .filter(|r| rule_ids.is_empty() || rule_ids.contains(&r.id))
                    .cloned()
                    .collect();
                RuleGroup {
                    id: g.id,
                    name: g.name.clone(),
                    template_id: g.template_id,
                    rules,
                }
            })
            .collect();
        CatalogSnapshot { groups }
    }

    /// Every command pattern under the selected groups/rules, used to build
    /// compound filter predicates.
    pub fn flatten_commands(&self, group_ids: &[i64], rule_ids: &[i64]) -> Vec<String> {
        self.filtered(group_ids, rule_ids)
            .commands()
            .map(|c| c.command.pattern.clone())
            .collect()
    }
}
