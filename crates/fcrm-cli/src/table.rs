//! `fcrm table`: print a kind's transition table.

use anyhow::Result;
use clap::Args;
use fcrm_core::EntityKind;
use fcrm_state::{
    AgreementStatus, EdgeClass, FieldRule, LeadStatus, LifecycleStatus, OrderStatus, QuoteStatus,
    SideEffect, StatusClass,
};
use serde::Serialize;

/// Arguments for `fcrm table`.
#[derive(Args, Debug)]
pub struct TableArgs {
    /// Entity kind (lead, quote, order, agreement).
    pub kind: EntityKind,

    /// Emit JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
pub struct StatusRow {
    pub status: &'static str,
    pub class: StatusClass,
    pub edges: Vec<EdgeRow>,
}

#[derive(Debug, Serialize)]
pub struct EdgeRow {
    pub to: &'static str,
    pub class: EdgeClass,
    pub required: Vec<String>,
    pub effects: Vec<String>,
}

/// Execute `fcrm table`.
pub fn run_table(args: &TableArgs) -> Result<u8> {
    let rows = rows_for(args.kind);
    if args.json {
        crate::print_json(&rows)?;
        return Ok(0);
    }
    for row in &rows {
        println!("{} ({:?})", row.status, row.class);
        for edge in &row.edges {
            println!("  -> {:<20} {:?}", edge.to, edge.class);
            if !edge.required.is_empty() {
                println!("       requires: {}", edge.required.join(", "));
            }
            if !edge.effects.is_empty() {
                println!("       writes:   {}", edge.effects.join(", "));
            }
        }
    }
    Ok(0)
}

/// Table rows for `kind`, statuses in column order.
pub fn rows_for(kind: EntityKind) -> Vec<StatusRow> {
    match kind {
        EntityKind::Lead => rows::<LeadStatus>(),
        EntityKind::Quote => rows::<QuoteStatus>(),
        EntityKind::Order => rows::<OrderStatus>(),
        EntityKind::Agreement => rows::<AgreementStatus>(),
    }
}

fn rows<S: LifecycleStatus>() -> Vec<StatusRow> {
    S::ALL
        .iter()
        .map(|status| StatusRow {
            status: status.as_str(),
            class: status.class(),
            edges: status
                .edges_from()
                .iter()
                .map(|edge| EdgeRow {
                    to: edge.to.as_str(),
                    class: edge.class,
                    required: edge
                        .required
                        .iter()
                        .map(|f| match f.rule {
                            FieldRule::FutureTimestamp => format!("{} (future timestamp)", f.key),
                            FieldRule::Timestamp => format!("{} (timestamp)", f.key),
                            FieldRule::OneOf(codes) => format!("{} ({})", f.key, codes.join("|")),
                            FieldRule::NonEmptyText => format!("{} (text)", f.key),
                        })
                        .collect(),
                    effects: edge.effects.iter().map(describe).collect(),
                })
                .collect(),
        })
        .collect()
}

fn describe(effect: &SideEffect) -> String {
    match *effect {
        SideEffect::StampNow(column) => format!("{column} = now"),
        SideEffect::CopyPayload { from, to } => format!("{to} = payload.{from}"),
        SideEffect::Increment(column) => format!("{column} += 1"),
        SideEffect::Clear(column) => format!("{column} = null"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_status_gets_a_row() {
        for kind in EntityKind::all() {
            assert_eq!(rows_for(*kind).len(), fcrm_state::AnyStatus::all(*kind).len());
        }
    }

    #[test]
    fn demo_edge_lists_its_requirement() {
        let rows = rows_for(EntityKind::Lead);
        let new = rows.iter().find(|r| r.status == "new").unwrap();
        let demo = new.edges.iter().find(|e| e.to == "demo").unwrap();
        assert_eq!(demo.required, vec!["demo_date (future timestamp)".to_string()]);
        assert!(demo.effects.contains(&"demo_scheduled_for = payload.demo_date".to_string()));
    }
}
