//! Markdown rendering of document listings.

use std::collections::BTreeMap;

use chrono::{DateTime, Local};
use freee_core::api::ApiError;
use freee_core::services::{lookup_label, Document, DocumentSchema, Field, TaxColumn};

const MISSING: &str = "N/A";

/// Everything needed to render one report file.
pub struct Report<'a> {
    pub schema: &'static DocumentSchema,
    pub generated_at: DateTime<Local>,
    pub company: &'a str,
    pub filter: &'a str,
    pub documents: &'a [Document],
    /// Detail per listed document, in listing order; `None` when not requested.
    pub details: Option<&'a [Option<Document>]>,
    pub diagnostic: Option<&'a ApiError>,
}

impl Report<'_> {
    pub fn render(&self) -> String {
        let mut out = title(self.schema);
        out.push_str(&format!(
            "**Generated:** {}\n\n",
            self.generated_at.format("%Y-%m-%d %H:%M:%S")
        ));
        out.push_str(&format!("**Company:** {}\n\n", self.company));
        out.push_str(&format!("**Filter:** {}\n\n", self.filter));
        out.push_str("---\n\n");

        if self.documents.is_empty() {
            self.render_empty(&mut out);
            return out;
        }

        out.push_str(&statistics(self.schema, self.documents));
        out.push('\n');
        out.push_str(&format!("## {}\n\n", self.schema.plural));
        out.push_str(&summary_table(self.schema, self.documents));
        out.push_str("\n\n");

        if let Some(details) = self.details {
            out.push_str("## Details\n\n");
            for (index, document) in self.documents.iter().enumerate() {
                let number = document
                    .text(self.schema.number.key)
                    .unwrap_or_else(|| MISSING.to_owned());
                out.push_str(&format!("### {}. {}\n\n", index + 1, number));
                if let Some(Some(detail)) = details.get(index) {
                    out.push_str(&detail_section(self.schema, detail));
                }
                if index + 1 < self.documents.len() {
                    out.push('\n');
                }
            }
        }
        out
    }

    fn render_empty(&self, out: &mut String) {
        let plural = self.schema.plural.to_lowercase();
        out.push_str("## Result\n\n");
        out.push_str(&format!("No {plural} matched the given filter.\n\n"));
        out.push_str("### Possible causes\n\n");
        out.push_str(&format!("1. No {plural} are registered for this company\n"));
        out.push_str(&format!("2. The application lacks access to the {plural} endpoint\n"));
        out.push_str("3. The endpoint is not available on this plan\n\n");

        if let Some(diagnostic) = self.diagnostic {
            out.push_str("### Last API response\n\n");
            out.push_str(&format!("```\n{diagnostic}\n```\n\n"));
            for hint in diagnostic.hints() {
                out.push_str(&format!("- {hint}\n"));
            }
            if !diagnostic.hints().is_empty() {
                out.push('\n');
            }
        }

        out.push_str("**How to check:**\n");
        out.push_str("- freee: https://secure.freee.co.jp/\n");
        out.push_str("- Application settings: https://app.secure.freee.co.jp/developers/applications\n");
    }
}

/// Report written when the company list could not be fetched.
pub fn render_missing_company(schema: &DocumentSchema) -> String {
    let mut out = title(schema);
    out.push_str("**Error:** company information could not be retrieved.\n");
    out
}

/// Report written when the run fails after authentication.
pub fn render_error(schema: &DocumentSchema, error: &anyhow::Error) -> String {
    let mut out = title(schema);
    out.push_str("## An error occurred\n\n");
    out.push_str(&format!("```\n{error:#}\n```\n"));
    out
}

fn title(schema: &DocumentSchema) -> String {
    format!("# {} report\n\n", schema.singular)
}

/// Format an amount as whole yen with thousands separators, e.g. `¥1,234,567`.
pub fn format_yen(amount: f64) -> String {
    let rounded = amount.round() as i64;
    let digits = rounded.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    if rounded < 0 {
        format!("-¥{grouped}")
    } else {
        format!("¥{grouped}")
    }
}

fn amount(document: &Document, key: &str) -> f64 {
    document.number(key).unwrap_or(0.0)
}

fn field_value(document: &Document, field: &Field) -> String {
    match (document.text(field.key), field.vocabulary) {
        (Some(code), Some(vocabulary)) => lookup_label(vocabulary, &code).to_owned(),
        (Some(text), None) => text,
        (None, _) => MISSING.to_owned(),
    }
}

fn cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

fn statistics(schema: &DocumentSchema, documents: &[Document]) -> String {
    let mut by_status: BTreeMap<String, (usize, f64)> = BTreeMap::new();
    for document in documents {
        let entry = by_status
            .entry(field_value(document, &schema.status))
            .or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += amount(document, schema.total_key);
    }
    let grand_total: f64 = documents
        .iter()
        .map(|document| amount(document, schema.total_key))
        .sum();

    let mut out = String::from("### Statistics\n\n");
    out.push_str(&format!(
        "**Total {}:** {}\n\n",
        schema.plural.to_lowercase(),
        documents.len()
    ));
    out.push_str(&format!("#### By {}\n\n", schema.status.label.to_lowercase()));
    out.push_str(&format!("| {} | Count | Total |\n", schema.status.label));
    out.push_str("|:---|---:|---:|\n");
    for (label, (count, total)) in &by_status {
        out.push_str(&format!(
            "| {} | {} | {} |\n",
            cell(label),
            count,
            format_yen(*total)
        ));
    }
    out.push('\n');
    out.push_str(&format!("**Grand total:** {}\n\n", format_yen(grand_total)));
    out
}

fn summary_table(schema: &DocumentSchema, documents: &[Document]) -> String {
    let mut lines = vec![
        format!(
            "| No | {} | Partner | {} | {} | {} | Total |",
            schema.number.label, schema.date.label, schema.due.label, schema.status.label
        ),
        "|:---:|:---|:---|:---:|:---:|:---:|---:|".to_owned(),
    ];
    for (index, document) in documents.iter().enumerate() {
        let partner = document
            .first_text(schema.partner_keys)
            .unwrap_or_else(|| MISSING.to_owned());
        lines.push(format!(
            "| {} | {} | {} | {} | {} | {} | {} |",
            index + 1,
            cell(&field_value(document, &schema.number)),
            cell(&partner),
            field_value(document, &schema.date),
            field_value(document, &schema.due),
            cell(&field_value(document, &schema.status)),
            format_yen(amount(document, schema.total_key)),
        ));
    }
    lines.join("\n")
}

fn detail_section(schema: &DocumentSchema, document: &Document) -> String {
    let mut out = String::new();
    out.push_str("#### Basic information\n\n");
    for field in schema.basic_fields {
        out.push_str(&format!(
            "- **{}:** {}\n",
            field.label,
            field_value(document, field)
        ));
    }
    out.push('\n');

    out.push_str("#### Partner\n\n");
    let partner = document
        .first_text(schema.partner_keys)
        .unwrap_or_else(|| MISSING.to_owned());
    out.push_str(&format!("- **Name:** {partner}\n"));
    let partner_id = document
        .text("partner_id")
        .unwrap_or_else(|| MISSING.to_owned());
    out.push_str(&format!("- **ID:** {partner_id}\n"));
    if let Some(code) = document.text("partner_code") {
        out.push_str(&format!("- **Code:** {code}\n"));
    }
    out.push('\n');

    out.push_str("#### Amounts\n\n");
    for field in schema.amount_fields {
        out.push_str(&format!(
            "- **{}:** {}\n",
            field.label,
            format_yen(amount(document, field.key))
        ));
    }
    out.push('\n');

    let items = document.items(schema.line_items.key);
    if !items.is_empty() {
        out.push_str(&line_items(schema, &items));
        out.push('\n');
    }

    for field in schema.note_fields {
        if let Some(note) = document.text(field.key) {
            out.push_str(&format!("#### {}\n\n{}\n\n", field.label, note));
        }
    }
    out.push_str("---\n");
    out
}

fn line_items(schema: &DocumentSchema, items: &[Document]) -> String {
    let columns = &schema.line_items;
    let tax_header = match columns.tax {
        TaxColumn::EntryMethod { .. } => "Tax",
        TaxColumn::Rate { .. } => "Tax rate",
    };
    let mut out = String::from("#### Line items\n\n");
    out.push_str(&format!("| No | Item | Quantity | Unit price | {tax_header} | Amount |\n"));
    out.push_str("|:---:|:---|---:|---:|:---:|---:|\n");

    for (index, item) in items.iter().enumerate() {
        let description = item.text(columns.description).unwrap_or_default();
        let is_text_row = columns
            .kind
            .and_then(|key| item.text(key))
            .is_some_and(|kind| kind == "text");
        if is_text_row {
            out.push_str(&format!(
                "| {} | {} | - | - | - | - |\n",
                index + 1,
                cell(&description)
            ));
            continue;
        }

        let description = if description.is_empty() {
            MISSING.to_owned()
        } else {
            description
        };
        let quantity = item.text(columns.quantity).unwrap_or_else(|| "0".to_owned());
        let tax = match columns.tax {
            TaxColumn::EntryMethod { key, vocabulary } => item
                .text(key)
                .map(|code| lookup_label(vocabulary, &code).to_owned())
                .unwrap_or_else(|| MISSING.to_owned()),
            TaxColumn::Rate { key, reduced_flag } => {
                let rate = item.text(key).unwrap_or_else(|| "0".to_owned());
                let reduced = matches!(item.get(reduced_flag), Some(serde_json::Value::Bool(true)));
                if reduced {
                    format!("{rate}% (reduced)")
                } else {
                    format!("{rate}%")
                }
            }
        };
        out.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} |\n",
            index + 1,
            cell(&description),
            quantity,
            format_yen(amount(item, columns.unit_price)),
            tax,
            format_yen(amount(item, columns.amount))
        ));
    }
    out
}
