//! Static descriptions of the document kinds served by the freee API.
//!
//! Everything that differs between invoices and quotations lives here: endpoint paths,
//! response keys, filter parameter names, status vocabularies and the field names the
//! report reads. The fetch logic in [`super::documents`] is shared.

use std::fmt;

/// A machine status code paired with its human-readable label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusLabel {
    pub code: &'static str,
    pub label: &'static str,
}

const fn status(code: &'static str, label: &'static str) -> StatusLabel {
    StatusLabel { code, label }
}

/// A document field shown in reports, optionally translated through a vocabulary.
#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub label: &'static str,
    pub key: &'static str,
    pub vocabulary: Option<&'static [StatusLabel]>,
}

const fn field(label: &'static str, key: &'static str) -> Field {
    Field {
        label,
        key,
        vocabulary: None,
    }
}

const fn coded(label: &'static str, key: &'static str, vocabulary: &'static [StatusLabel]) -> Field {
    Field {
        label,
        key,
        vocabulary: Some(vocabulary),
    }
}

/// How the tax column of a line item is derived.
#[derive(Debug, Clone, Copy)]
pub enum TaxColumn {
    /// A coded entry method such as `tax_included`.
    EntryMethod {
        key: &'static str,
        vocabulary: &'static [StatusLabel],
    },
    /// A numeric rate, with an optional flag marking the reduced rate.
    Rate {
        key: &'static str,
        reduced_flag: &'static str,
    },
}

/// Field names of the line items nested in a document detail.
#[derive(Debug, Clone, Copy)]
pub struct LineItemSchema {
    pub key: &'static str,
    pub description: &'static str,
    pub quantity: &'static str,
    pub unit_price: &'static str,
    pub amount: &'static str,
    /// Rows whose `type` equals `text` carry only a description.
    pub kind: Option<&'static str>,
    pub tax: TaxColumn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Invoice,
    Quotation,
}

impl DocumentKind {
    pub fn schema(self) -> &'static DocumentSchema {
        match self {
            DocumentKind::Invoice => &INVOICES,
            DocumentKind::Quotation => &QUOTATIONS,
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            DocumentKind::Invoice => "invoice",
            DocumentKind::Quotation => "quotation",
        };
        write!(f, "{value}")
    }
}

/// Strategy value adapting the generic document service and report to one kind.
#[derive(Debug)]
pub struct DocumentSchema {
    pub kind: DocumentKind,
    /// Human-readable singular and plural names.
    pub singular: &'static str,
    pub plural: &'static str,
    /// Collection path; the detail path is `{path}/{id}`.
    pub path: &'static str,
    pub list_key: &'static str,
    pub detail_key: &'static str,
    pub start_date_param: &'static str,
    pub end_date_param: &'static str,
    pub status_param: &'static str,
    pub statuses: &'static [StatusLabel],

    pub number: Field,
    pub partner_keys: &'static [&'static str],
    pub date: Field,
    pub due: Field,
    pub status: Field,
    pub total_key: &'static str,
    pub basic_fields: &'static [Field],
    pub amount_fields: &'static [Field],
    pub line_items: LineItemSchema,
    pub note_fields: &'static [Field],
}

impl DocumentSchema {
    /// Label for a status code, falling back to the code itself.
    pub fn status_label<'a>(&self, code: &'a str) -> &'a str {
        lookup_label(self.statuses, code)
    }

    pub fn is_known_status(&self, code: &str) -> bool {
        self.statuses.iter().any(|s| s.code == code)
    }
}

/// Translate `code` through `vocabulary`, returning the code when it is not listed.
pub fn lookup_label<'a>(vocabulary: &[StatusLabel], code: &'a str) -> &'a str {
    vocabulary
        .iter()
        .find(|entry| entry.code == code)
        .map(|entry| entry.label)
        .unwrap_or(code)
}

pub const INVOICE_STATUSES: &[StatusLabel] = &[
    status("draft", "Draft"),
    status("unsubmitted", "Awaiting submission"),
    status("confirmed", "Confirmed"),
    status("sent", "Sent"),
    status("paid", "Paid"),
    status("cancelled", "Cancelled"),
];

pub const SENDING_STATUSES: &[StatusLabel] = &[
    status("sent", "Sent"),
    status("unsent", "Awaiting sending"),
];

pub const CANCEL_STATUSES: &[StatusLabel] = &[
    status("canceled", "Cancelled"),
    status("uncanceled", "Active"),
];

pub const TAX_ENTRY_METHODS: &[StatusLabel] = &[
    status("tax_included", "Tax included"),
    status("tax_excluded", "Tax excluded"),
    status("non_taxable", "Non-taxable"),
    status("tax_exemption", "Tax exempt"),
];

pub static INVOICES: DocumentSchema = DocumentSchema {
    kind: DocumentKind::Invoice,
    singular: "Invoice",
    plural: "Invoices",
    path: "/api/1/invoices",
    list_key: "invoices",
    detail_key: "invoice",
    start_date_param: "start_issue_date",
    end_date_param: "end_issue_date",
    status_param: "invoice_status",
    statuses: INVOICE_STATUSES,

    number: field("Invoice number", "invoice_number"),
    partner_keys: &["partner_name"],
    date: field("Issue date", "issue_date"),
    due: field("Payment due", "payment_date"),
    status: coded("Status", "invoice_status", INVOICE_STATUSES),
    total_key: "total_amount",
    basic_fields: &[
        field("Invoice ID", "id"),
        field("Invoice number", "invoice_number"),
        coded("Status", "invoice_status", INVOICE_STATUSES),
        field("Issue date", "issue_date"),
        field("Payment due", "payment_date"),
        field("Title", "title"),
    ],
    amount_fields: &[
        field("Subtotal", "sub_total"),
        field("Tax", "tax"),
        field("Total", "total_amount"),
    ],
    line_items: LineItemSchema {
        key: "invoice_contents",
        description: "description",
        quantity: "qty",
        unit_price: "unit_price",
        amount: "amount",
        kind: None,
        tax: TaxColumn::EntryMethod {
            key: "tax_entry_method",
            vocabulary: TAX_ENTRY_METHODS,
        },
    },
    note_fields: &[field("Notes", "notes")],
};

pub static QUOTATIONS: DocumentSchema = DocumentSchema {
    kind: DocumentKind::Quotation,
    singular: "Quotation",
    plural: "Quotations",
    path: "/iv/quotations",
    list_key: "quotations",
    detail_key: "quotation",
    start_date_param: "start_quotation_date",
    end_date_param: "end_quotation_date",
    status_param: "sending_status",
    statuses: SENDING_STATUSES,

    number: field("Quotation number", "quotation_number"),
    partner_keys: &["partner_name", "partner_display_name"],
    date: field("Quotation date", "quotation_date"),
    due: field("Expires", "expiration_date"),
    status: coded("Sending", "sending_status", SENDING_STATUSES),
    total_key: "total_amount",
    basic_fields: &[
        field("Quotation ID", "id"),
        field("Quotation number", "quotation_number"),
        coded("Sending status", "sending_status", SENDING_STATUSES),
        coded("Cancel status", "cancel_status", CANCEL_STATUSES),
        field("Quotation date", "quotation_date"),
        field("Expires", "expiration_date"),
        field("Delivery deadline", "delivery_deadline"),
        field("Delivery location", "delivery_location"),
        field("Subject", "subject"),
    ],
    amount_fields: &[
        field("Subtotal (excl. tax)", "amount_excluding_tax"),
        field("Tax", "amount_tax"),
        field("Amount incl. tax", "amount_including_tax"),
        field("Withholding tax", "amount_withholding_tax"),
        field("Total", "total_amount"),
    ],
    line_items: LineItemSchema {
        key: "lines",
        description: "description",
        quantity: "quantity",
        unit_price: "unit_price",
        amount: "amount_excluding_tax",
        kind: Some("type"),
        tax: TaxColumn::Rate {
            key: "tax_rate",
            reduced_flag: "reduced_tax_rate",
        },
    },
    note_fields: &[field("Notes", "quotation_note"), field("Internal memo", "memo")],
};
