use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::api::{json_body, ApiClient, ApiError, ApiResult, RequestOptions};
use crate::auth::utils::truncate_body;
use crate::auth::{AuthError, CompanyId, Interaction};

pub const COMPANIES_PATH: &str = "/api/1/companies";

/// A company (tenant) the authorized user can act on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub id: CompanyId,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl Company {
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or("N/A")
    }
}

#[derive(Debug, Deserialize)]
struct CompaniesEnvelope {
    #[serde(default)]
    companies: Vec<Company>,
}

/// Errors raised while binding the session to a company.
#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("no companies are available to this account")]
    NoTenant,
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("failed to read company selection: {0}")]
    Io(#[from] io::Error),
}

/// Resolves which company the session works against.
#[derive(Clone)]
pub struct CompanySelector {
    client: ApiClient,
}

impl CompanySelector {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Fetch every company visible to the current token.
    pub async fn companies(&self) -> ApiResult<Vec<Company>> {
        let response = self
            .client
            .get(COMPANIES_PATH, &RequestOptions::light())
            .await?;
        let value = json_body(response).await?;
        let envelope: CompaniesEnvelope =
            serde_json::from_value(value.clone()).map_err(|source| ApiError::Decode {
                source,
                body: truncate_body(&value.to_string()),
            })?;
        debug!(count = envelope.companies.len(), "fetched companies");
        Ok(envelope.companies)
    }

    /// Return the bound company, choosing and persisting one if none is bound yet.
    ///
    /// A single company is picked without asking; with several the user is prompted
    /// until a valid 1-based index is entered.
    pub async fn ensure(
        &self,
        interaction: &mut dyn Interaction,
    ) -> Result<CompanyId, SelectionError> {
        if let Some(company_id) = self.client.session().lock().await.company_id() {
            debug!(%company_id, "using company bound to credential");
            return Ok(company_id);
        }

        let companies = self.companies().await?;
        let chosen = choose_company(&companies, interaction)?;
        self.client
            .session()
            .lock()
            .await
            .bind_company(chosen.id)?;
        info!(company_id = %chosen.id, name = chosen.label(), "selected company");
        Ok(chosen.id)
    }
}

fn choose_company<'a>(
    companies: &'a [Company],
    interaction: &mut dyn Interaction,
) -> Result<&'a Company, SelectionError> {
    match companies {
        [] => Err(SelectionError::NoTenant),
        [only] => Ok(only),
        _ => {
            let count = companies.len();
            let mut message = String::new();
            for (index, company) in companies.iter().enumerate() {
                message.push_str(&format!(
                    "{}. {} (ID: {})\n",
                    index + 1,
                    company.label(),
                    company.id
                ));
            }
            message.push_str(&format!("Select a company (1-{count}): "));

            loop {
                let answer = interaction.prompt(&message)?;
                match answer.trim().parse::<usize>() {
                    Ok(choice) if (1..=count).contains(&choice) => {
                        return Ok(&companies[choice - 1]);
                    }
                    Ok(_) => message = format!("Enter a number between 1 and {count}: "),
                    Err(_) => message = format!("Please enter a number (1-{count}): "),
                }
            }
        }
    }
}
