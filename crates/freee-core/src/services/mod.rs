mod companies;
mod document;
mod documents;
mod schema;

pub use companies::{Company, CompanySelector, SelectionError, COMPANIES_PATH};
pub use document::Document;
pub use documents::{DocumentQuery, DocumentService, Listing, MAX_LIMIT};
pub use schema::{
    lookup_label, DocumentKind, DocumentSchema, Field, LineItemSchema, StatusLabel, TaxColumn,
    INVOICES, QUOTATIONS,
};
