//! Console and JSON rendering of routing tables.

use chrono::{DateTime, Utc};
use crossterm::style::{style, Color, Stylize};
use serde::Serialize;
use std::fmt::{self, Write};

use crate::network::Network;
use crate::protocol::RoutingEntry;
use crate::router::Router;
use crate::{LinkLocalAddress, RouterId};

const PALETTE: [Color; 6] = [
    Color::Red,
    Color::Green,
    Color::Blue,
    Color::Yellow,
    Color::Cyan,
    Color::Magenta,
];

/// Display tag for a router, chosen by its position in the network.
pub fn router_color(position: usize) -> Color {
    PALETTE[position % PALETTE.len()]
}

#[derive(Debug, Clone, Copy)]
pub struct TableStyle {
    pub color: Option<Color>,
}

impl TableStyle {
    pub fn plain() -> Self {
        Self { color: None }
    }

    pub fn colored(color: Color) -> Self {
        Self { color: Some(color) }
    }

    fn line(&self, out: &mut impl Write, text: &str) -> fmt::Result {
        match self.color {
            Some(color) => writeln!(out, "{}", style(text).with(color)),
            None => writeln!(out, "{}", text),
        }
    }
}

pub fn write_routing_table(
    out: &mut impl Write,
    router: &Router,
    now: DateTime<Utc>,
    style: TableStyle,
) -> fmt::Result {
    let status = if router.is_active() { "" } else { " (offline)" };
    style.line(out, &format!("Routing Table for {}{}:", router.id(), status))?;
    style.line(out, &"-".repeat(65))?;
    style.line(
        out,
        &format!(
            "{:<20}{:<20}{:<10}{:<15}",
            "Destination Prefix", "Next Hop", "Metric", "Route Lifetime"
        ),
    )?;

    for entry in router.routing_table().iter() {
        let next_hop = entry
            .next_hop
            .map(|hop| hop.to_string())
            .unwrap_or_else(|| "-".to_string());
        style.line(
            out,
            &format!(
                "{:<20}{:<20}{:<10}{:<15}",
                entry.destination,
                next_hop,
                entry.metric.display_value(),
                lifetime(entry, now)
            ),
        )?;
    }
    writeln!(out)
}

pub fn render_routing_table(router: &Router, now: DateTime<Utc>, style: TableStyle) -> String {
    let mut output = String::new();
    // Writing into a String cannot fail.
    let _ = write_routing_table(&mut output, router, now, style);
    output
}

fn lifetime(entry: &RoutingEntry, now: DateTime<Utc>) -> String {
    if !entry.is_reachable() {
        return "∞".to_string();
    }
    format!("{:.2}", age_secs(entry, now))
}

fn age_secs(entry: &RoutingEntry, now: DateTime<Utc>) -> f64 {
    entry.age(now).num_milliseconds() as f64 / 1000.0
}

#[derive(Debug, Clone, Serialize)]
pub struct RouteReport {
    pub destination: RouterId,
    pub next_hop: Option<LinkLocalAddress>,
    /// `None` when the destination is unreachable
    pub metric: Option<u32>,
    pub age_secs: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableReport {
    pub router: RouterId,
    pub link_local_address: LinkLocalAddress,
    pub active: bool,
    pub converged: bool,
    pub routes: Vec<RouteReport>,
}

impl TableReport {
    pub fn from_router(router: &Router, now: DateTime<Utc>) -> Self {
        Self {
            router: router.id().to_string(),
            link_local_address: router.link_local_address(),
            active: router.is_active(),
            converged: router.has_converged(),
            routes: router
                .routing_table()
                .iter()
                .map(|entry| RouteReport {
                    destination: entry.destination.clone(),
                    next_hop: entry.next_hop,
                    metric: entry.metric.value(),
                    age_secs: age_secs(entry, now),
                })
                .collect(),
        }
    }
}

/// One record of the driver's JSON Lines output: every table at a named step.
#[derive(Debug, Clone, Serialize)]
pub struct PhaseReport {
    pub phase: String,
    pub tables: Vec<TableReport>,
}

impl PhaseReport {
    /// Compact encoding, always a single line.
    pub fn to_json_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

pub fn network_report(network: &Network, now: DateTime<Utc>) -> Vec<TableReport> {
    network
        .routers()
        .iter()
        .map(|router| TableReport::from_router(router, now))
        .collect()
}
