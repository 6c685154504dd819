//! Transfer rules
//!
//! Map every source mailbox to its destination mailboxes, plus an optional
//! global mailbox applied to every transferred message. Rules are prepared
//! before a run starts and only read during it.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::provider::TargetProvider;
use super::types::{Mailbox, Message};
use crate::error::Result;
use crate::remote::labels;

/// Destinations of one source mailbox
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRule {
    pub active: bool,
    pub source: Mailbox,
    pub targets: Vec<Mailbox>,
}

/// Resolved rule table of a transfer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransferRules {
    rules: Vec<TransferRule>,
    global_mailbox: Option<Mailbox>,
}

impl TransferRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn global_mailbox(&self) -> Option<&Mailbox> {
        self.global_mailbox.as_ref()
    }

    pub fn set_global_mailbox(&mut self, mailbox: Option<Mailbox>) {
        self.global_mailbox = mailbox;
    }

    /// Set (or replace) the active rule of a source mailbox
    pub fn set_rule(&mut self, source: Mailbox, targets: Vec<Mailbox>) {
        match self.rules.iter_mut().find(|r| r.source.name == source.name) {
            Some(rule) => {
                rule.active = true;
                rule.source = source;
                rule.targets = targets;
            }
            None => self.rules.push(TransferRule {
                active: true,
                source,
                targets,
            }),
        }
    }

    /// Deactivate the rule of a source mailbox, keeping its targets
    pub fn unset_rule(&mut self, source_name: &str) {
        if let Some(rule) = self.rules.iter_mut().find(|r| r.source.name == source_name) {
            rule.active = false;
        }
    }

    /// Active rule of a source mailbox
    pub fn rule_for(&self, source_name: &str) -> Option<&TransferRule> {
        self.rules
            .iter()
            .find(|r| r.active && r.source.name == source_name)
    }

    pub fn active_rules(&self) -> impl Iterator<Item = &TransferRule> {
        self.rules.iter().filter(|r| r.active)
    }

    /// Create a rule for every source mailbox without one.
    ///
    /// A source maps to the existing destination with the same name
    /// (case-insensitive), otherwise to the provider's default mailboxes.
    pub fn set_default_rules(
        &mut self,
        sources: &[Mailbox],
        existing: &[Mailbox],
        provider: &dyn TargetProvider,
    ) {
        for source in sources {
            if self.rules.iter().any(|r| r.source.name == source.name) {
                continue;
            }

            let targets = match existing
                .iter()
                .find(|m| m.name.eq_ignore_ascii_case(&source.name))
            {
                Some(matching) => vec![matching.clone()],
                None => provider.default_mailboxes(source),
            };

            debug!(
                source = %source.name,
                targets = ?targets.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
                "Default rule"
            );
            self.set_rule(source.clone(), targets);
        }
    }

    /// Create every referenced mailbox that has no remote ID yet.
    ///
    /// Each mailbox is created once, keyed by name, and the assigned ID is
    /// written into every rule and the global mailbox right after creation,
    /// so a failure leaves the mailboxes created so far resolved. Returns the
    /// number of created mailboxes.
    pub async fn create_missing_mailboxes(&mut self, provider: &dyn TargetProvider) -> Result<usize> {
        let pending = self
            .rules
            .iter()
            .filter(|r| r.active)
            .flat_map(|r| r.targets.iter())
            .chain(self.global_mailbox.iter())
            .filter(|m| !m.is_created())
            .cloned()
            .collect::<Vec<Mailbox>>();

        let mut created = 0;
        for mailbox in pending {
            // Same name already resolved, by an earlier iteration or a rule
            if let Some(id) = self.resolved_id(&mailbox.name).map(str::to_string) {
                self.patch_mailbox_id(&mailbox.name, &id);
                continue;
            }
            let name = mailbox.name.clone();
            let mailbox = provider.create_mailbox(mailbox).await?;
            info!(name = %name, id = %mailbox.id, "Created mailbox");
            self.patch_mailbox_id(&name, &mailbox.id);
            created += 1;
        }

        Ok(created)
    }

    fn resolved_id(&self, name: &str) -> Option<&str> {
        self.rules
            .iter()
            .flat_map(|r| r.targets.iter())
            .chain(self.global_mailbox.iter())
            .find(|m| m.name == name && m.is_created())
            .map(|m| m.id.as_str())
    }

    fn patch_mailbox_id(&mut self, name: &str, id: &str) {
        let patch = |mailbox: &mut Mailbox| {
            if !mailbox.is_created() && mailbox.name == name {
                mailbox.id = id.to_string();
            }
        };
        for rule in self.rules.iter_mut() {
            rule.targets.iter_mut().for_each(patch);
        }
        if let Some(global) = self.global_mailbox.as_mut() {
            patch(global);
        }
    }

    /// Destination IDs of a message.
    ///
    /// Keeps the message's target order, drops duplicates and the all-mail
    /// mailbox (the service derives it), and appends the global mailbox once.
    pub fn resolve_targets(&self, message: &Message) -> Vec<String> {
        let mut label_ids: Vec<String> = Vec::with_capacity(message.targets.len() + 1);

        for target in &message.targets {
            if target.id == labels::ALL_MAIL || label_ids.contains(&target.id) {
                continue;
            }
            label_ids.push(target.id.clone());
        }

        if let Some(global) = &self.global_mailbox {
            if !label_ids.contains(&global.id) {
                label_ids.push(global.id.clone());
            }
        }

        label_ids
    }
}
