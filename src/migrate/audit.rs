//! Vault integrity audit: dead links, unknown anchors, duplicate labels,
//! header/filename id mismatches.

use std::collections::HashMap;

use serde::Serialize;

use crate::error::Result;
use crate::resolver::Resolver;
use crate::slug::is_valid_id;
use crate::vault::Vault;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditFinding {
    pub note_id: String,
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<usize>,
}

#[derive(Debug, Default, Serialize)]
pub struct AuditReport {
    pub findings: Vec<AuditFinding>,
    pub total_notes: usize,
    pub total_links: usize,
    pub dead_links: usize,
    pub unknown_anchors: usize,
    pub duplicate_labels: usize,
    pub unmigrated_links: usize,
}

impl AuditReport {
    pub fn has_errors(&self) -> bool {
        self.findings.iter().any(|f| f.severity == Severity::Error)
    }
}

/// Check every note against the resolver. With `strict`, unmigrated
/// (non-id) link targets are errors instead of informational findings.
pub fn audit_vault(vault: &Vault, resolver: &dyn Resolver, strict: bool) -> Result<AuditReport> {
    let mut report = AuditReport::default();

    for id in vault.list_ids()? {
        let Some(note) = vault.get(&id)? else {
            continue;
        };
        report.total_notes += 1;

        // Header id is advisory, but a contradicting one is a bug magnet.
        if let Some(meta_id) = note.meta_str("id") {
            if meta_id != id {
                report.findings.push(AuditFinding {
                    note_id: id.clone(),
                    severity: Severity::Error,
                    message: format!("header id '{meta_id}' does not match filename '{id}'"),
                    start: None,
                });
            }
        }

        let mut label_counts: HashMap<&str, usize> = HashMap::new();
        for block in &note.body.blocks {
            if let Some(name) = block.label_name() {
                *label_counts.entry(name).or_insert(0) += 1;
            }
        }
        for (label, count) in label_counts {
            if count > 1 {
                report.duplicate_labels += 1;
                report.findings.push(AuditFinding {
                    note_id: id.clone(),
                    severity: Severity::Error,
                    message: format!("label '^{label}' defined {count} times"),
                    start: None,
                });
            }
        }

        for link in &note.body.links {
            report.total_links += 1;
            let target = &link.target;

            if !is_valid_id(&target.id) {
                report.unmigrated_links += 1;
                report.findings.push(AuditFinding {
                    note_id: id.clone(),
                    severity: if strict { Severity::Error } else { Severity::Info },
                    message: format!("unmigrated link target '{}'", target.id),
                    start: Some(link.range.start),
                });
                continue;
            }

            if !resolver.exists(target)? {
                report.dead_links += 1;
                report.findings.push(AuditFinding {
                    note_id: id.clone(),
                    severity: Severity::Error,
                    message: format!("dead link to '{}'", target.id),
                    start: Some(link.range.start),
                });
            } else if !resolver.anchor_ok(target)? {
                report.unknown_anchors += 1;
                let anchor = target.anchor.as_ref().expect("anchor_ok only fails with one");
                report.findings.push(AuditFinding {
                    note_id: id.clone(),
                    severity: Severity::Warning,
                    message: format!("unknown anchor '{}#{anchor}'", target.id),
                    start: Some(link.range.start),
                });
            }
        }
    }

    Ok(report)
}
