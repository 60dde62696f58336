// Telegram message text (HTML parse mode).

use crate::delta::totals;
use crate::models::DeltaRecord;
use crate::ranking::{RankedEntry, rank};
use std::collections::BTreeSet;

const SKIPPED_SHOWN: usize = 30;

/// 1536 -> "1.50 KiB"; plain integer below 1 KiB.
pub fn human_bytes(n: u64) -> String {
    const UNITS: [&str; 6] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB"];
    if n < 1024 {
        return format!("{} B", n);
    }
    let mut x = n as f64;
    let mut unit = 0;
    while x >= 1024.0 && unit < UNITS.len() - 1 {
        x /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", x, UNITS[unit])
}

pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn medal(rank: usize) -> String {
    format!("{}.", rank)
}

pub fn top_lines(deltas: &DeltaRecord, n: usize) -> Vec<String> {
    match rank(deltas, n) {
        None => vec!["(no data)".to_string()],
        Some(entries) if entries.is_empty() => vec!["(no data)".to_string()],
        Some(entries) => entries
            .iter()
            .enumerate()
            .map(|(i, e)| top_line(i + 1, e))
            .collect(),
    }
}

fn top_line(position: usize, e: &RankedEntry) -> String {
    format!(
        "{} <b>{}</b>: {} (⬇️ {} / ⬆️ {})",
        medal(position),
        escape_html(&e.name),
        human_bytes(e.total),
        human_bytes(e.down),
        human_bytes(e.up)
    )
}

fn push_warnings(lines: &mut Vec<String>, resets: &BTreeSet<String>, skipped: &[String]) {
    if !skipped.is_empty() {
        lines.push(String::new());
        lines.push("⚠️ <b>Skipped nodes (fetch failed)</b>:".into());
        let shown: Vec<String> = skipped
            .iter()
            .take(SKIPPED_SHOWN)
            .map(|s| escape_html(s))
            .collect();
        let more = if skipped.len() > SKIPPED_SHOWN { " …" } else { "" };
        lines.push(format!("{}{}", shown.join(", "), more));
    }
    if !resets.is_empty() {
        lines.push(String::new());
        lines.push("⚠️ <b>Counter reset detected</b> (counted from zero):".into());
        let names: Vec<String> = resets.iter().map(|s| escape_html(s)).collect();
        lines.push(names.join(", "));
    }
}

/// Full report: every node, fleet totals, top-N, then warnings.
pub fn report(
    title: &str,
    period_label: &str,
    deltas: &DeltaRecord,
    resets: &BTreeSet<String>,
    skipped: &[String],
    top_n: usize,
) -> String {
    let mut lines = vec![
        format!("📊 <b>{}</b> ({})", escape_html(title), escape_html(period_label)),
        String::new(),
    ];

    let mut nodes: Vec<(&String, &crate::models::NodeCounter)> = deltas.iter().collect();
    nodes.sort_by_key(|(id, n)| n.display_name(id).to_lowercase());
    for (id, node) in nodes {
        lines.push(format!(
            "🖥 <b>{}</b>\n⬇️ Down: {}\n⬆️ Up: {}\n",
            escape_html(node.display_name(id)),
            human_bytes(node.counter.down),
            human_bytes(node.counter.up)
        ));
    }

    let sum = totals(deltas);
    lines.push("----------".into());
    lines.push(format!("📦 <b>Total down</b>: {}", human_bytes(sum.down)));
    lines.push(format!("📦 <b>Total up</b>: {}", human_bytes(sum.up)));
    lines.push(format!("📦 <b>Total</b>: {}", human_bytes(sum.total())));

    lines.push(String::new());
    lines.push(format!("🔥 <b>Top {}</b> (up + down)", top_n));
    lines.extend(top_lines(deltas, top_n));

    push_warnings(&mut lines, resets, skipped);
    lines.join("\n")
}

/// Top-N only, for /top.
pub fn top_only(
    period_label: &str,
    deltas: &DeltaRecord,
    resets: &BTreeSet<String>,
    skipped: &[String],
    top_n: usize,
) -> String {
    let mut lines = vec![
        format!("🔥 <b>Top {}</b> (up + down)", top_n),
        format!("⏱ {}", escape_html(period_label)),
        String::new(),
    ];
    lines.extend(top_lines(deltas, top_n));
    push_warnings(&mut lines, resets, skipped);
    lines.join("\n")
}

pub fn daily_baseline_missing(day: &str) -> String {
    format!(
        "⚠️ <b>Daily baseline missing</b> ({}).\n\
         Current counters were saved as that day's baseline.\n\
         Daily reports are regular from the next midnight run.",
        escape_html(day)
    )
}

pub fn period_baseline_missing(tag: &str) -> String {
    format!(
        "⚠️ No start snapshot found ({}).\n\
         Current counters were saved as the new start.\n\
         Send the command again later for a meaningful figure.",
        escape_html(tag)
    )
}

pub fn insufficient_history(hours: u32) -> String {
    format!(
        "⚠️ Not enough sample history for this window yet.\n\
         Keep the bot running for a while, then retry: /top {}h",
        hours
    )
}

pub fn bootstrap_done() -> String {
    "✅ Week and month start snapshots saved: /week /month /top week /top month work now.".into()
}

pub fn archive_done(archived: usize, dropped: usize) -> String {
    format!(
        "✅ History archived ({} day(s) compressed, {} day(s) expired)",
        archived, dropped
    )
}

pub fn top_usage() -> String {
    "Usage: /top  or  /top today|week|month  or  /top 6h (N &gt; 0)".into()
}

pub fn help() -> String {
    [
        "Commands:",
        "/today  /week  /month",
        "/top  (defaults to today)",
        "/top today|week|month",
        "/top 6h  (any N hours)",
        "Admin: /archive; initial setup: run `bootstrap`",
    ]
    .join("\n")
}

const TRACE_TAIL: usize = 1500;

/// Failure alert with host, time, location, command and the error chain tail.
pub fn failure_alert(host: &str, at: &str, location: &str, cmd: &str, error: &anyhow::Error) -> String {
    let chain = format!("{:?}", error);
    let tail_start = chain
        .char_indices()
        .rev()
        .nth(TRACE_TAIL.saturating_sub(1))
        .map(|(i, _)| i)
        .unwrap_or(0);
    format!(
        "❌ <b>Traffic job failed</b>\n🕒 {}\n🖥 {}\n📍 {}\n🧩 cmd: <code>{}</code>\n🧨 error: <code>{}</code>\n\n<b>details (tail)</b>\n<pre>{}</pre>",
        escape_html(at),
        escape_html(host),
        escape_html(location),
        escape_html(cmd),
        escape_html(&format!("{:#}", error)),
        escape_html(&chain[tail_start..])
    )
}
