//! Turning command-line flags or menu answers into a document query.

use std::io;

use anyhow::{bail, Result};
use chrono::NaiveDate;
use freee_core::auth::Interaction;
use freee_core::services::{DocumentQuery, DocumentSchema, MAX_LIMIT};

pub const RECENT_LIMIT: usize = 10;
const DATE_FORMAT: &str = "%Y-%m-%d";

/// A query plus the human-readable filter line shown in the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub query: DocumentQuery,
    pub description: String,
}

/// Filters given on the command line.
#[derive(Debug, Clone, Default)]
pub struct FilterFlags {
    pub status: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub limit: Option<usize>,
    pub recent: bool,
}

impl FilterFlags {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.from.is_none()
            && self.to.is_none()
            && self.limit.is_none()
            && !self.recent
    }

    pub fn into_selection(self, schema: &DocumentSchema) -> Result<Selection> {
        if let Some(status) = &self.status {
            if !schema.is_known_status(status) {
                let known: Vec<&str> = schema.statuses.iter().map(|s| s.code).collect();
                bail!(
                    "unknown status '{status}' (expected one of: {})",
                    known.join(", ")
                );
            }
        }
        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from > to {
                bail!("--from {from} is after --to {to}");
            }
        }

        let plural = schema.plural.to_lowercase();
        let query = DocumentQuery {
            limit: match (self.limit, self.recent) {
                (Some(limit), _) => limit,
                (None, true) => RECENT_LIMIT,
                (None, false) => MAX_LIMIT,
            },
            start_date: self.from,
            end_date: self.to,
            status: self.status.clone(),
        };
        let limit = query.effective_limit();

        let mut parts = Vec::new();
        if let Some(status) = &self.status {
            parts.push(format!("Status: {}", schema.status_label(status)));
        }
        match (self.from, self.to) {
            (Some(from), Some(to)) => parts.push(format!("Period: {from} to {to}")),
            (Some(from), None) => parts.push(format!("From {from}")),
            (None, Some(to)) => parts.push(format!("Until {to}")),
            (None, None) => {}
        }
        if self.recent {
            parts.push(format!("Recent {plural} ({limit})"));
        } else if self.limit.is_some() {
            parts.push(format!("Up to {limit} {plural}"));
        }
        let description = if parts.is_empty() {
            format!("All {plural}")
        } else {
            parts.join(", ")
        };

        Ok(Selection { query, description })
    }
}

/// Parse `--limit`, accepting only page sizes the API honours.
pub fn parse_limit(raw: &str) -> Result<usize, String> {
    let limit: usize = raw
        .trim()
        .parse()
        .map_err(|_| format!("'{raw}' is not a number"))?;
    if (1..=MAX_LIMIT).contains(&limit) {
        Ok(limit)
    } else {
        Err(format!("limit must be between 1 and {MAX_LIMIT}"))
    }
}

/// Run the interactive menu. `Ok(None)` means the answer was not a valid choice.
pub fn prompt_selection(
    schema: &DocumentSchema,
    interaction: &mut dyn Interaction,
) -> io::Result<Option<Selection>> {
    let plural = schema.plural.to_lowercase();
    let menu = format!(
        "1. All {plural}\n2. Filter by status\n3. Filter by date range\n4. Recent {plural} ({RECENT_LIMIT})\nSelect (1-4): "
    );

    let selection = match interaction.prompt(&menu)?.trim() {
        "1" => Some(Selection {
            query: DocumentQuery::recent(MAX_LIMIT),
            description: format!("All {plural}"),
        }),
        "2" => prompt_status(schema, interaction)?,
        "3" => prompt_period(interaction)?,
        "4" => Some(Selection {
            query: DocumentQuery::recent(RECENT_LIMIT),
            description: format!("Recent {plural} ({RECENT_LIMIT})"),
        }),
        _ => None,
    };
    Ok(selection)
}

fn prompt_status(
    schema: &DocumentSchema,
    interaction: &mut dyn Interaction,
) -> io::Result<Option<Selection>> {
    let mut message = String::from("Status:\n");
    for (index, status) in schema.statuses.iter().enumerate() {
        message.push_str(&format!("{}. {} ({})\n", index + 1, status.label, status.code));
    }
    message.push_str(&format!("Select (1-{}): ", schema.statuses.len()));

    let answer = interaction.prompt(&message)?;
    let chosen = answer
        .trim()
        .parse::<usize>()
        .ok()
        .and_then(|index| index.checked_sub(1))
        .and_then(|index| schema.statuses.get(index));

    Ok(chosen.map(|status| Selection {
        query: DocumentQuery {
            limit: MAX_LIMIT,
            status: Some(status.code.to_owned()),
            ..DocumentQuery::default()
        },
        description: format!("Status: {}", status.label),
    }))
}

fn prompt_period(interaction: &mut dyn Interaction) -> io::Result<Option<Selection>> {
    let start = interaction.prompt("Start date (YYYY-MM-DD): ")?;
    let end = interaction.prompt("End date (YYYY-MM-DD): ")?;
    let parse = |raw: &str| NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).ok();

    let (Some(start), Some(end)) = (parse(&start), parse(&end)) else {
        return Ok(None);
    };
    Ok(Some(Selection {
        query: DocumentQuery {
            limit: MAX_LIMIT,
            start_date: Some(start),
            end_date: Some(end),
            ..DocumentQuery::default()
        },
        description: format!("Period: {start} to {end}"),
    }))
}

/// Ask a yes/no question; anything but `y`/`yes` is no.
pub fn confirm(interaction: &mut dyn Interaction, question: &str) -> io::Result<bool> {
    let answer = interaction.prompt(&format!("{question} (y/n): "))?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
